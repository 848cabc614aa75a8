//! Phase planner.
//!
//! Buckets scored issues into priority bands, estimates a timeline and
//! assesses rollback risk.

use std::fmt;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PlannerConfig;
use crate::issue::{Issue, Severity};

/// A priority band. Phases always execute in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseName {
    Critical,
    High,
    Medium,
    Low,
}

impl PhaseName {
    /// All phases in execution order.
    pub const ORDER: [PhaseName; 4] = [
        PhaseName::Critical,
        PhaseName::High,
        PhaseName::Medium,
        PhaseName::Low,
    ];

    /// Returns the band a score falls into.
    pub fn for_score(score: u8) -> Self {
        match score {
            70..=u8::MAX => PhaseName::Critical,
            50..=69 => PhaseName::High,
            30..=49 => PhaseName::Medium,
            _ => PhaseName::Low,
        }
    }

    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseName::Critical => "critical",
            PhaseName::High => "high",
            PhaseName::Medium => "medium",
            PhaseName::Low => "low",
        }
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estimated execution window of a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PhaseWindow {
    /// Length of the window in whole days.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// An ordered priority band of issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub name: PhaseName,
    /// Descending score, ties by discovery order.
    pub issues: Vec<Issue>,
    /// `None` for empty phases.
    pub window: Option<PhaseWindow>,
    /// Hint only; execution within a phase is always sequential.
    pub parallel_eligible: bool,
}

impl Phase {
    /// Returns true if the phase holds no issues.
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Rollback complexity of the whole plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollbackComplexity {
    Low,
    Medium,
    High,
}

/// Risk flags raised across all planned issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Issues with critical severity.
    pub high_risk: Vec<String>,
    /// Issues whose category touches an API/serializer surface.
    pub breaking_changes: Vec<String>,
    /// Issues whose category touches models or the database.
    pub migrations: Vec<String>,
    pub rollback_complexity: RollbackComplexity,
}

impl RiskAssessment {
    /// Scans issues for risk flags.
    pub fn assess<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> Self {
        let mut high_risk = Vec::new();
        let mut breaking_changes = Vec::new();
        let mut migrations = Vec::new();

        for issue in issues {
            if issue.severity == Severity::Critical {
                high_risk.push(issue.id.clone());
            }
            let category = issue.category_or_default();
            if category.touches_api() {
                breaking_changes.push(issue.id.clone());
            }
            if category.touches_schema() {
                migrations.push(issue.id.clone());
            }
        }

        let rollback_complexity = if !high_risk.is_empty() || !migrations.is_empty() {
            RollbackComplexity::High
        } else if !breaking_changes.is_empty() {
            RollbackComplexity::Medium
        } else {
            RollbackComplexity::Low
        };

        Self {
            high_risk,
            breaking_changes,
            migrations,
            rollback_complexity,
        }
    }
}

/// Estimated overall timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_days: i64,
}

/// A complete remediation plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationPlan {
    /// All four bands in execution order, including empty ones.
    pub phases: Vec<Phase>,
    pub timeline: Timeline,
    pub risk: RiskAssessment,
}

impl RemediationPlan {
    /// Total number of planned issues.
    pub fn issue_count(&self) -> usize {
        self.phases.iter().map(|p| p.issues.len()).sum()
    }

    /// Returns the phase with the given name.
    pub fn phase(&self, name: PhaseName) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Iterates issues in execution order.
    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.phases.iter().flat_map(|p| p.issues.iter())
    }
}

/// Builds a plan from scored issues.
///
/// The first non-empty phase gets a `first_phase_days` window starting at
/// `now`; each later non-empty phase gets `later_phase_days` immediately after
/// its predecessor. The first `parallel_eligible_phases` non-empty phases are
/// flagged parallel-eligible.
pub fn build_plan(issues: Vec<Issue>, config: &PlannerConfig, now: DateTime<Utc>) -> RemediationPlan {
    let risk = RiskAssessment::assess(issues.iter());

    let mut buckets: Vec<Vec<Issue>> = vec![Vec::new(); PhaseName::ORDER.len()];
    for issue in issues {
        let band = PhaseName::for_score(issue.score());
        let slot = PhaseName::ORDER
            .iter()
            .position(|name| *name == band)
            .unwrap_or(PhaseName::ORDER.len() - 1);
        buckets[slot].push(issue);
    }

    let mut phases = Vec::with_capacity(PhaseName::ORDER.len());
    let mut cursor = now;
    let mut non_empty_seen = 0usize;

    for (name, mut bucket) in PhaseName::ORDER.into_iter().zip(buckets) {
        // Stable sort keeps discovery order for equal scores.
        bucket.sort_by_key(|issue| issue.discovery_index);
        bucket.sort_by(|a, b| b.score().cmp(&a.score()));

        let (window, parallel_eligible) = if bucket.is_empty() {
            (None, false)
        } else {
            let days = if non_empty_seen == 0 {
                config.first_phase_days
            } else {
                config.later_phase_days
            };
            let end = cursor + ChronoDuration::days(i64::from(days));
            let window = PhaseWindow { start: cursor, end };
            cursor = end;
            let eligible = non_empty_seen < config.parallel_eligible_phases;
            non_empty_seen += 1;
            (Some(window), eligible)
        };

        phases.push(Phase {
            name,
            issues: bucket,
            window,
            parallel_eligible,
        });
    }

    let timeline = Timeline {
        start: now,
        end: cursor,
        total_days: (cursor - now).num_days(),
    };

    tracing::info!(
        issues = phases.iter().map(|p| p.issues.len()).sum::<usize>(),
        total_days = timeline.total_days,
        rollback = ?risk.rollback_complexity,
        "built remediation plan"
    );

    RemediationPlan {
        phases,
        timeline,
        risk,
    }
}

/// Renders a plan as markdown.
pub fn render_plan_markdown(plan: &RemediationPlan) -> String {
    let mut md = String::new();

    md.push_str("# Remediation Plan\n\n");
    md.push_str(&format!(
        "- **Issues**: {}\n- **Timeline**: {} → {} ({} days)\n\n",
        plan.issue_count(),
        plan.timeline.start.format("%Y-%m-%d"),
        plan.timeline.end.format("%Y-%m-%d"),
        plan.timeline.total_days
    ));

    for (number, phase) in plan.phases.iter().filter(|p| !p.is_empty()).enumerate() {
        md.push_str(&format!(
            "## Phase {}: {} ({} issues)\n\n",
            number + 1,
            phase.name,
            phase.issues.len()
        ));
        if let Some(window) = &phase.window {
            md.push_str(&format!(
                "- **Window**: {} → {}\n",
                window.start.format("%Y-%m-%d %H:%M"),
                window.end.format("%Y-%m-%d %H:%M")
            ));
        }
        if phase.parallel_eligible {
            md.push_str("- **Parallel execution**: eligible *(not enabled)*\n");
        }
        md.push('\n');

        md.push_str("| Score | Issue | Severity | Category | Fix type |\n");
        md.push_str("|-------|-------|----------|----------|----------|\n");
        for issue in &phase.issues {
            md.push_str(&format!(
                "| {} | {} | {:?} | {} | {} |\n",
                issue.score(),
                issue.id,
                issue.severity,
                issue.category_or_default(),
                issue.fix_type_or_default()
            ));
        }
        md.push('\n');
    }

    md.push_str("## Risk Assessment\n\n");
    md.push_str(&format!(
        "- **Rollback complexity**: {:?}\n",
        plan.risk.rollback_complexity
    ));
    for (label, ids) in [
        ("High-risk changes", &plan.risk.high_risk),
        ("Potential breaking changes", &plan.risk.breaking_changes),
        ("Possible migrations", &plan.risk.migrations),
    ] {
        if ids.is_empty() {
            md.push_str(&format!("- **{}**: none\n", label));
        } else {
            md.push_str(&format!("- **{}**: {}\n", label, ids.join(", ")));
        }
    }

    md
}
