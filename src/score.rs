//! Priority scorer.
//!
//! `score = severity_weight + fix_type_weight + keyword_bonus`, clamped to
//! [0, 100]. Table driven so every point is auditable.

use crate::classify::words;
use crate::issue::{FixType, Issue, Severity};

/// Upper bound of a priority score.
pub const MAX_SCORE: u8 = 100;

/// Weight contributed by severity.
pub fn severity_weight(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 40,
        Severity::High => 30,
        Severity::Medium => 20,
        Severity::Low => 10,
    }
}

/// Weight contributed by the remediation strategy.
pub fn fix_type_weight(fix_type: FixType) -> u32 {
    match fix_type {
        FixType::SecurityPatch => 30,
        FixType::Authentication | FixType::PermissionLogic => 25,
        FixType::DatabaseConstraint => 20,
        FixType::ModelFieldValidation | FixType::DdRequirement => 15,
        FixType::BusinessRule | FixType::DjangoPattern | FixType::PerformanceOptimization => 10,
        FixType::CodeStyle | FixType::Unknown => 5,
    }
}

/// Additive keyword bonuses over description words.
///
/// Words are split on non-alphanumeric characters and matched by prefix, so
/// `authenticated` and `database` count but `rapid` does not count as `api`.
const KEYWORD_BONUSES: &[(&str, u32)] = &[("authenticat", 15), ("data", 10), ("api", 10)];

/// Bonus contributed by contextual keywords; each keyword counts at most once.
pub fn keyword_bonus(description: &str) -> u32 {
    let words = words(description);
    KEYWORD_BONUSES
        .iter()
        .filter(|(prefix, _)| words.iter().any(|w| w.starts_with(prefix)))
        .map(|(_, bonus)| bonus)
        .sum()
}

/// Computes the priority score of an issue.
///
/// Unclassified issues score with the `unknown` fix-type weight.
pub fn score(issue: &Issue) -> u8 {
    let raw = severity_weight(issue.severity)
        + fix_type_weight(issue.fix_type_or_default())
        + keyword_bonus(&issue.description);
    raw.min(MAX_SCORE as u32) as u8
}

/// Scores every issue that does not yet carry a score.
///
/// A score is immutable for the planning run once set.
pub fn score_all(issues: &mut [Issue]) {
    for issue in issues.iter_mut() {
        if issue.priority_score.is_none() {
            issue.priority_score = Some(score(issue));
        }
    }
}
