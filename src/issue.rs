//! Issue representation shared by every pipeline stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a finding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSource {
    /// Failing test from a test runner.
    UnitTest,
    /// Static code-review finding.
    CodeReview,
    /// Security scanner finding.
    SecurityScan,
}

impl IssueSource {
    /// Returns the snake_case name used in issue ids and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSource::UnitTest => "unit_test",
            IssueSource::CodeReview => "code_review",
            IssueSource::SecurityScan => "security_scan",
        }
    }
}

impl fmt::Display for IssueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a finding, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    #[default]
    Low,
}

impl Severity {
    /// Parses a severity string, accepting common scanner aliases.
    ///
    /// Returns `None` for unrecognised values.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "critical" | "blocker" | "fatal" => Some(Severity::Critical),
            "high" | "error" | "major" => Some(Severity::High),
            "medium" | "moderate" | "warning" | "warn" => Some(Severity::Medium),
            "low" | "minor" | "info" | "note" => Some(Severity::Low),
            _ => None,
        }
    }
}

/// Domain tag assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ModelValidation,
    PermissionLogic,
    Authentication,
    SecurityPatch,
    DatabaseIntegrity,
    ApiContract,
    PerformanceOptimization,
    BusinessLogic,
    CodeStyle,
}

impl Category {
    /// Returns the snake_case name, also used to scope test subsets.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ModelValidation => "model_validation",
            Category::PermissionLogic => "permission_logic",
            Category::Authentication => "authentication",
            Category::SecurityPatch => "security_patch",
            Category::DatabaseIntegrity => "database_integrity",
            Category::ApiContract => "api_contract",
            Category::PerformanceOptimization => "performance_optimization",
            Category::BusinessLogic => "business_logic",
            Category::CodeStyle => "code_style",
        }
    }

    /// Categories whose fixes may change an externally visible API.
    pub fn touches_api(&self) -> bool {
        matches!(self, Category::ApiContract)
    }

    /// Categories whose fixes may require a schema migration.
    pub fn touches_schema(&self) -> bool {
        matches!(self, Category::ModelValidation | Category::DatabaseIntegrity)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remediation strategy key used to dispatch to a fix routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixType {
    SecurityPatch,
    Authentication,
    PermissionLogic,
    DatabaseConstraint,
    ModelFieldValidation,
    /// Requirement traced back to the design document.
    DdRequirement,
    BusinessRule,
    /// Framework convention violation.
    DjangoPattern,
    PerformanceOptimization,
    CodeStyle,
    Unknown,
}

impl FixType {
    /// Returns the snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FixType::SecurityPatch => "security_patch",
            FixType::Authentication => "authentication",
            FixType::PermissionLogic => "permission_logic",
            FixType::DatabaseConstraint => "database_constraint",
            FixType::ModelFieldValidation => "model_field_validation",
            FixType::DdRequirement => "dd_requirement",
            FixType::BusinessRule => "business_rule",
            FixType::DjangoPattern => "django_pattern",
            FixType::PerformanceOptimization => "performance_optimization",
            FixType::CodeStyle => "code_style",
            FixType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FixType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final status of a fix attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Fix applied, validated and committed.
    Success,
    /// Transformation, validation or commit failed; workspace discarded.
    Failed,
    /// Never attempted (phase aborted or run cancelled).
    Skipped,
    /// No registered strategy; left for a human.
    ManualReview,
}

/// A single normalized finding requiring remediation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Stable identifier, e.g. `security_scan:B608@app/db.py:42`.
    pub id: String,
    /// Where the finding came from.
    pub source: IssueSource,
    /// Domain tag; `None` until classified.
    #[serde(default)]
    pub category: Option<Category>,
    /// Strategy key; `None` until classified.
    #[serde(default)]
    pub fix_type: Option<FixType>,
    /// Supplied or defaulted severity.
    #[serde(default)]
    pub severity: Severity,
    /// Diagnostic message.
    pub description: String,
    /// File/line or test name.
    #[serde(default)]
    pub location: Option<String>,
    /// Urgency score in [0, 100]; set once per planning run.
    #[serde(default)]
    pub priority_score: Option<u8>,
    /// Position in ingest order, used to break score ties.
    #[serde(default)]
    pub discovery_index: usize,
    /// Appended once execution completes.
    #[serde(default)]
    pub outcome: Option<AttemptStatus>,
}

impl Issue {
    /// Creates an unclassified, unscored issue.
    pub fn new(id: impl Into<String>, source: IssueSource, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source,
            category: None,
            fix_type: None,
            severity: Severity::default(),
            description: description.into(),
            location: None,
            priority_score: None,
            discovery_index: 0,
            outcome: None,
        }
    }

    /// Sets the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets category and fix type directly, bypassing the classifier.
    pub fn with_classification(mut self, category: Category, fix_type: FixType) -> Self {
        self.category = Some(category);
        self.fix_type = Some(fix_type);
        self
    }

    /// Sets the discovery index.
    pub fn with_discovery_index(mut self, index: usize) -> Self {
        self.discovery_index = index;
        self
    }

    /// Returns the score, treating an unscored issue as zero.
    pub fn score(&self) -> u8 {
        self.priority_score.unwrap_or(0)
    }

    /// Returns the category, falling back to the generic bucket.
    pub fn category_or_default(&self) -> Category {
        self.category.unwrap_or(Category::BusinessLogic)
    }

    /// Returns the fix type, falling back to `Unknown`.
    pub fn fix_type_or_default(&self) -> FixType {
        self.fix_type.unwrap_or(FixType::Unknown)
    }

    /// Returns the file path part of the location, if it names a file.
    ///
    /// `app/models.py:42` yields `app/models.py`; a dotted test name such as
    /// `tests.test_models.UserTest.test_email` yields `None`.
    pub fn file_path(&self) -> Option<&str> {
        let location = self.location.as_deref()?.trim();
        let path = match location.rsplit_once(':') {
            Some((path, line)) if !line.is_empty() && line.chars().all(|c| c.is_ascii_digit()) => {
                path
            }
            _ => location,
        };
        if path.is_empty() {
            return None;
        }
        let looks_like_file = path.contains('/')
            || path
                .rsplit_once('.')
                .map(|(_, ext)| (1..=4).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_lowercase()))
                .unwrap_or(false);
        let looks_like_test = !path.contains('/') && path.matches('.').count() > 1;
        if looks_like_file && !looks_like_test {
            Some(path)
        } else {
            None
        }
    }

    /// Returns the line number part of the location, if any.
    pub fn line(&self) -> Option<u32> {
        let (_, line) = self.location.as_deref()?.trim().rsplit_once(':')?;
        line.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_builder_works() {
        let issue = Issue::new("code_review:E501", IssueSource::CodeReview, "line too long")
            .with_severity(Severity::Medium)
            .with_location("app/views.py:12")
            .with_discovery_index(4);

        assert_eq!(issue.id, "code_review:E501");
        assert_eq!(issue.severity, Severity::Medium);
        assert_eq!(issue.discovery_index, 4);
        assert!(issue.category.is_none());
        assert!(issue.priority_score.is_none());
        assert!(issue.outcome.is_none());
    }

    #[test]
    fn severity_parses_aliases() {
        assert_eq!(Severity::parse("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::parse("error"), Some(Severity::High));
        assert_eq!(Severity::parse(" warning "), Some(Severity::Medium));
        assert_eq!(Severity::parse("info"), Some(Severity::Low));
        assert_eq!(Severity::parse("whatever"), None);
    }

    #[test]
    fn severity_defaults_to_low() {
        assert_eq!(Severity::default(), Severity::Low);
    }

    #[test]
    fn file_path_strips_line_number() {
        let issue = Issue::new("a", IssueSource::CodeReview, "x").with_location("app/models.py:42");
        assert_eq!(issue.file_path(), Some("app/models.py"));
        assert_eq!(issue.line(), Some(42));
    }

    #[test]
    fn file_path_accepts_bare_file_name() {
        let issue = Issue::new("a", IssueSource::CodeReview, "x").with_location("settings.py");
        assert_eq!(issue.file_path(), Some("settings.py"));
        assert_eq!(issue.line(), None);
    }

    #[test]
    fn file_path_rejects_test_names() {
        let issue = Issue::new("a", IssueSource::UnitTest, "x")
            .with_location("tests.test_models.UserModelTest.test_email");
        assert_eq!(issue.file_path(), None);

        let bare = Issue::new("b", IssueSource::UnitTest, "x");
        assert_eq!(bare.file_path(), None);
    }

    #[test]
    fn enums_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&IssueSource::SecurityScan).unwrap(),
            "\"security_scan\""
        );
        assert_eq!(
            serde_json::to_string(&FixType::DdRequirement).unwrap(),
            "\"dd_requirement\""
        );
        assert_eq!(
            serde_json::to_string(&AttemptStatus::ManualReview).unwrap(),
            "\"manual_review\""
        );
        assert_eq!(
            serde_json::to_string(&Category::PermissionLogic).unwrap(),
            "\"permission_logic\""
        );
    }

    #[test]
    fn as_str_matches_serde_names() {
        for fix in [FixType::SecurityPatch, FixType::DjangoPattern, FixType::Unknown] {
            assert_eq!(
                serde_json::to_string(&fix).unwrap(),
                format!("\"{}\"", fix.as_str())
            );
        }
    }
}
