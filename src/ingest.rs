//! Issue source adapter.
//!
//! Normalizes raw findings from test runners and static/security scanners into
//! [`Issue`] records. A report that cannot be parsed at all is a
//! [`Error::MalformedReport`]; individual bad entries are skipped and counted.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::issue::{Issue, IssueSource, Severity};

/// One raw report as produced by an external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReport {
    /// Which kind of tool produced the report.
    pub source: IssueSource,
    /// Optional tool name, used only in diagnostics.
    #[serde(default)]
    pub tool: Option<String>,
    /// Entries are kept untyped so one bad entry cannot reject the report.
    #[serde(default)]
    pub entries: Vec<serde_json::Value>,
}

impl RawReport {
    /// Creates an empty report for the given source.
    pub fn new(source: IssueSource) -> Self {
        Self {
            source,
            tool: None,
            entries: Vec::new(),
        }
    }

    /// Appends an entry.
    pub fn with_entry(mut self, entry: serde_json::Value) -> Self {
        self.entries.push(entry);
        self
    }

    fn origin(&self) -> String {
        match &self.tool {
            Some(tool) => format!("{} ({})", self.source, tool),
            None => self.source.to_string(),
        }
    }
}

/// Minimal required shape of a raw entry.
#[derive(Debug, Clone, Deserialize)]
struct RawEntry {
    #[serde(alias = "id", alias = "check_id", alias = "test", alias = "name")]
    identifier: String,
    #[serde(alias = "description", alias = "msg")]
    message: String,
    #[serde(default, alias = "file", alias = "path")]
    location: Option<String>,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default, alias = "level", alias = "issue_severity")]
    severity: Option<String>,
}

impl RawEntry {
    fn full_location(&self) -> Option<String> {
        let location = self.location.as_deref().map(str::trim).filter(|l| !l.is_empty())?;
        match self.line {
            Some(line) if !location.ends_with(&format!(":{}", line)) => {
                Some(format!("{}:{}", location, line))
            }
            _ => Some(location.to_string()),
        }
    }
}

/// Counters describing one ingest pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Reports that parsed.
    pub reports_parsed: usize,
    /// Reports rejected as malformed.
    pub reports_malformed: usize,
    /// Entries turned into issues.
    pub entries_accepted: usize,
    /// Entries skipped as unparsable.
    pub entries_skipped: usize,
    /// Entries whose severity was absent or unrecognised and defaulted to low.
    pub severities_defaulted: usize,
}

/// Output of [`ingest`]: normalized issues plus counters.
#[derive(Debug, Clone, Default)]
pub struct IngestOutput {
    pub issues: Vec<Issue>,
    pub summary: IngestSummary,
}

/// Loads a raw report from a JSON or YAML file.
pub fn load_report(path: &Path) -> Result<RawReport> {
    let content = std::fs::read_to_string(path)?;
    let origin = path.display().to_string();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| {
            Error::MalformedReport {
                origin,
                reason: e.to_string(),
            }
        }),
        _ => parse_report(&content, &origin),
    }
}

/// Parses a JSON raw report.
pub fn parse_report(content: &str, origin: &str) -> Result<RawReport> {
    serde_json::from_str(content).map_err(|e| Error::MalformedReport {
        origin: origin.to_string(),
        reason: e.to_string(),
    })
}

/// Normalizes every entry of every report into an unclassified [`Issue`].
///
/// Issues are numbered in discovery order across reports. Ids take the form
/// `<source>:<identifier>[@<location>]`; exact duplicates get `#2`, `#3`, ...
pub fn ingest(reports: &[RawReport]) -> IngestOutput {
    let mut output = IngestOutput::default();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for report in reports {
        output.summary.reports_parsed += 1;

        for (position, value) in report.entries.iter().enumerate() {
            let entry: RawEntry = match serde_json::from_value(value.clone()) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(
                        origin = %report.origin(),
                        position,
                        error = %e,
                        "skipping unparsable report entry"
                    );
                    output.summary.entries_skipped += 1;
                    continue;
                }
            };

            let identifier = entry.identifier.trim();
            if identifier.is_empty() {
                tracing::warn!(origin = %report.origin(), position, "skipping entry with empty identifier");
                output.summary.entries_skipped += 1;
                continue;
            }

            let severity = match entry.severity.as_deref().map(Severity::parse) {
                Some(Some(severity)) => severity,
                _ => {
                    output.summary.severities_defaulted += 1;
                    Severity::Low
                }
            };

            let location = entry.full_location();
            let base_id = match &location {
                Some(loc) => format!("{}:{}@{}", report.source, identifier, loc),
                None => format!("{}:{}", report.source, identifier),
            };
            let occurrences = seen.entry(base_id.clone()).or_insert(0);
            *occurrences += 1;
            let id = if *occurrences == 1 {
                base_id
            } else {
                format!("{}#{}", base_id, occurrences)
            };

            let mut issue = Issue::new(id, report.source, entry.message.trim())
                .with_severity(severity)
                .with_discovery_index(output.issues.len());
            issue.location = location;

            output.issues.push(issue);
            output.summary.entries_accepted += 1;
        }
    }

    output
}

/// Loads and ingests report files.
///
/// Malformed files are logged and counted. Fails with
/// [`Error::NoUsableReports`] only when every file is malformed.
pub fn ingest_files<P: AsRef<Path>>(paths: &[P]) -> Result<IngestOutput> {
    let mut reports = Vec::new();
    let mut malformed = 0;

    for path in paths {
        match load_report(path.as_ref()) {
            Ok(report) => reports.push(report),
            Err(e) => {
                tracing::warn!(path = ?path.as_ref(), error = %e, "rejecting malformed report");
                malformed += 1;
            }
        }
    }

    if reports.is_empty() && !paths.is_empty() {
        return Err(Error::NoUsableReports(paths.len()));
    }

    let mut output = ingest(&reports);
    output.summary.reports_malformed = malformed;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn ingest_normalizes_entries() {
        let report = RawReport::new(IssueSource::SecurityScan).with_entry(json!({
            "check_id": "B608",
            "message": "SQL injection in query builder",
            "file": "app/db.py",
            "line": 42,
            "severity": "HIGH"
        }));

        let output = ingest(&[report]);

        assert_eq!(output.issues.len(), 1);
        let issue = &output.issues[0];
        assert_eq!(issue.id, "security_scan:B608@app/db.py:42");
        assert_eq!(issue.severity, Severity::High);
        assert_eq!(issue.location.as_deref(), Some("app/db.py:42"));
        assert_eq!(issue.description, "SQL injection in query builder");
        assert!(issue.category.is_none());
        assert_eq!(output.summary.entries_accepted, 1);
    }

    #[test]
    fn missing_severity_defaults_to_low() {
        let report = RawReport::new(IssueSource::UnitTest).with_entry(json!({
            "test": "tests.test_models.UserTest.test_email",
            "message": "AssertionError"
        }));

        let output = ingest(&[report]);

        assert_eq!(output.issues[0].severity, Severity::Low);
        assert_eq!(output.summary.severities_defaulted, 1);
    }

    #[test]
    fn unparsable_entries_are_skipped_not_fatal() {
        let report = RawReport::new(IssueSource::CodeReview)
            .with_entry(json!({"identifier": "E501", "message": "line too long"}))
            .with_entry(json!({"message": "no identifier"}))
            .with_entry(json!("just a string"))
            .with_entry(json!({"identifier": "  ", "message": "blank id"}))
            .with_entry(json!({"identifier": "W291", "message": "trailing whitespace"}));

        let output = ingest(&[report]);

        assert_eq!(output.issues.len(), 2);
        assert_eq!(output.summary.entries_skipped, 3);
        assert_eq!(output.issues[1].discovery_index, 1);
    }

    #[test]
    fn duplicate_ids_get_suffixes() {
        let entry = json!({"identifier": "E501", "message": "line too long", "location": "a.py:1"});
        let report = RawReport::new(IssueSource::CodeReview)
            .with_entry(entry.clone())
            .with_entry(entry);

        let output = ingest(&[report]);

        assert_eq!(output.issues[0].id, "code_review:E501@a.py:1");
        assert_eq!(output.issues[1].id, "code_review:E501@a.py:1#2");
    }

    #[test]
    fn discovery_order_spans_reports() {
        let a = RawReport::new(IssueSource::UnitTest)
            .with_entry(json!({"identifier": "t1", "message": "m"}));
        let b = RawReport::new(IssueSource::CodeReview)
            .with_entry(json!({"identifier": "r1", "message": "m"}));

        let output = ingest(&[a, b]);

        assert_eq!(output.issues[0].discovery_index, 0);
        assert_eq!(output.issues[1].discovery_index, 1);
        assert_eq!(output.summary.reports_parsed, 2);
    }

    #[test]
    fn parse_report_rejects_garbage() {
        let result = parse_report("not json", "inline");
        assert!(matches!(result, Err(Error::MalformedReport { .. })));
    }

    #[test]
    fn load_report_reads_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("review.yaml");
        std::fs::write(
            &path,
            "source: code_review\nentries:\n  - identifier: W291\n    message: trailing whitespace\n",
        )
        .unwrap();

        let report = load_report(&path).unwrap();
        assert_eq!(report.source, IssueSource::CodeReview);
        assert_eq!(report.entries.len(), 1);
    }

    #[test]
    fn ingest_files_tolerates_some_malformed_reports() {
        let temp = TempDir::new().unwrap();
        let good = temp.path().join("tests.json");
        let bad = temp.path().join("broken.json");
        std::fs::write(
            &good,
            r#"{"source": "unit_test", "entries": [{"identifier": "t", "message": "m"}]}"#,
        )
        .unwrap();
        std::fs::write(&bad, "{ nope").unwrap();

        let output = ingest_files(&[good, bad]).unwrap();
        assert_eq!(output.issues.len(), 1);
        assert_eq!(output.summary.reports_malformed, 1);
        assert_eq!(output.summary.reports_parsed, 1);
    }

    #[test]
    fn ingest_files_fails_when_nothing_parses() {
        let temp = TempDir::new().unwrap();
        let bad = temp.path().join("broken.json");
        std::fs::write(&bad, "[]").unwrap();

        let result = ingest_files(&[bad]);
        assert!(matches!(result, Err(Error::NoUsableReports(1))));
    }
}
