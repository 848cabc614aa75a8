//! Validation of fix attempts.
//!
//! Three checks run for every attempt, and all of them run even when one
//! fails:
//!
//! 1. Well-formedness of every modified artifact (built in, see [`check_well_formed`]).
//! 2. A test subset scoped to the issue category ([`Toolchain::run_subset`]).
//! 3. A security scan of the modified artifacts, only for `security_patch`
//!    fixes ([`Toolchain::run_security_scan`]).
//!
//! A tool that errors or exceeds its timeout yields `false` for its check.

mod syntax;
mod toolchain;

pub use syntax::check_well_formed;
pub use toolchain::CommandToolchain;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::issue::{Category, FixType, Issue};
use crate::workspace::{FileChange, Workspace};

/// Result of running a category-scoped test subset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubsetOutcome {
    pub passed: bool,
    /// Tool output worth showing on failure.
    pub detail: String,
}

/// Result of a targeted security scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanOutcome {
    pub clean: bool,
    pub findings: Vec<String>,
}

/// Test and scan collaborator consumed by the [`Validator`].
///
/// Implementations run against the workspace checkout; the validator never
/// shells out itself.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Runs the tests relevant to `category`.
    async fn run_subset(&self, workspace: &Workspace, category: Category) -> Result<SubsetOutcome>;

    /// Scans only the given workspace-relative paths.
    async fn run_security_scan(&self, workspace: &Workspace, paths: &[String]) -> Result<ScanOutcome>;
}

/// Verdict for one fix attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub syntax_valid: bool,
    pub tests_pass: bool,
    pub security_clean: bool,
    /// AND of the three checks.
    pub overall: bool,
    /// Diagnostics from failed or errored checks.
    #[serde(default)]
    pub messages: Vec<String>,
}

impl ValidationResult {
    /// Combines three check verdicts.
    pub fn from_checks(syntax_valid: bool, tests_pass: bool, security_clean: bool) -> Self {
        Self {
            syntax_valid,
            tests_pass,
            security_clean,
            overall: syntax_valid && tests_pass && security_clean,
            messages: Vec::new(),
        }
    }

    /// A result where every check is vacuously satisfied.
    pub fn vacuous() -> Self {
        Self::from_checks(true, true, true)
    }

    fn with_messages(mut self, messages: Vec<String>) -> Self {
        self.messages = messages;
        self
    }
}

/// Runs the three checks against a staged workspace.
#[derive(Clone)]
pub struct Validator {
    toolchain: Arc<dyn Toolchain>,
    check_timeout: Duration,
}

impl Validator {
    /// Creates a validator; `check_timeout` bounds each tool check separately.
    pub fn new(toolchain: Arc<dyn Toolchain>, check_timeout: Duration) -> Self {
        Self {
            toolchain,
            check_timeout,
        }
    }

    /// Validates `changes` for `issue` as staged in `workspace`.
    pub async fn validate(
        &self,
        issue: &Issue,
        workspace: &Workspace,
        changes: &[FileChange],
    ) -> ValidationResult {
        let mut messages = Vec::new();

        let mut syntax_valid = true;
        for change in changes {
            if let Err(problem) = check_well_formed(&change.path, &change.contents) {
                syntax_valid = false;
                messages.push(format!("syntax: {}", problem));
            }
        }

        let category = issue.category_or_default();
        let paths: Vec<String> = changes.iter().map(|c| c.path.clone()).collect();
        let needs_scan = issue.fix_type_or_default() == FixType::SecurityPatch;

        let tests = bounded(
            "test subset",
            self.check_timeout,
            self.toolchain.run_subset(workspace, category),
        );
        let scan = async {
            if needs_scan {
                Some(
                    bounded(
                        "security scan",
                        self.check_timeout,
                        self.toolchain.run_security_scan(workspace, &paths),
                    )
                    .await,
                )
            } else {
                None
            }
        };
        let (tests, scan) = tokio::join!(tests, scan);

        let tests_pass = match tests {
            Ok(outcome) => {
                if !outcome.passed {
                    messages.push(format!("tests ({}): {}", category, outcome.detail.trim()));
                }
                outcome.passed
            }
            Err(e) => {
                messages.push(format!("tests ({}): {}", category, e));
                false
            }
        };

        let security_clean = match scan {
            None => true,
            Some(Ok(outcome)) => {
                for finding in &outcome.findings {
                    messages.push(format!("scan: {}", finding));
                }
                outcome.clean
            }
            Some(Err(e)) => {
                messages.push(format!("scan: {}", e));
                false
            }
        };

        let result =
            ValidationResult::from_checks(syntax_valid, tests_pass, security_clean).with_messages(messages);

        tracing::debug!(
            issue_id = %issue.id,
            syntax_valid,
            tests_pass,
            security_clean,
            overall = result.overall,
            "validation finished"
        );

        result
    }
}

/// Applies `limit` to a suspension point, mapping expiry to [`Error::Timeout`].
pub(crate) async fn bounded<T>(
    operation: &'static str,
    limit: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            operation,
            elapsed: limit,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeToolchain {
        tests_fail: bool,
        tests_error: bool,
        scan_dirty: bool,
        hang: bool,
        scans: AtomicUsize,
    }

    #[async_trait]
    impl Toolchain for FakeToolchain {
        async fn run_subset(&self, _: &Workspace, _: Category) -> Result<SubsetOutcome> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.tests_error {
                return Err(Error::ValidationTool {
                    tool: "pytest".to_string(),
                    reason: "not installed".to_string(),
                });
            }
            Ok(SubsetOutcome {
                passed: !self.tests_fail,
                detail: "1 failed".to_string(),
            })
        }

        async fn run_security_scan(&self, _: &Workspace, paths: &[String]) -> Result<ScanOutcome> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            Ok(ScanOutcome {
                clean: !self.scan_dirty,
                findings: if self.scan_dirty {
                    paths.iter().map(|p| format!("{}: B105", p)).collect()
                } else {
                    Vec::new()
                },
            })
        }
    }

    fn issue(fix_type: FixType) -> Issue {
        Issue::new("security_scan:B105", IssueSource::SecurityScan, "hardcoded password")
            .with_classification(Category::SecurityPatch, fix_type)
    }

    fn changes(contents: &str) -> Vec<FileChange> {
        vec![FileChange::new("app/settings.py", "patch", contents)]
    }

    fn validator(toolchain: FakeToolchain) -> (Validator, Arc<FakeToolchain>) {
        let toolchain = Arc::new(toolchain);
        (
            Validator::new(toolchain.clone(), Duration::from_secs(5)),
            toolchain,
        )
    }

    #[test]
    fn overall_is_conjunction() {
        assert!(ValidationResult::vacuous().overall);
        assert!(!ValidationResult::from_checks(true, false, true).overall);
        assert!(!ValidationResult::from_checks(false, true, true).overall);
    }

    #[tokio::test]
    async fn all_checks_pass() {
        let (validator, toolchain) = validator(FakeToolchain::default());
        let result = validator
            .validate(&issue(FixType::SecurityPatch), &Workspace::new("ws"), &changes("DEBUG = False\n"))
            .await;

        assert!(result.overall);
        assert!(result.messages.is_empty());
        assert_eq!(toolchain.scans.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn scan_only_runs_for_security_patches() {
        let (validator, toolchain) = validator(FakeToolchain {
            scan_dirty: true,
            ..Default::default()
        });
        let result = validator
            .validate(&issue(FixType::CodeStyle), &Workspace::new("ws"), &changes("x = 1\n"))
            .await;

        assert!(result.security_clean);
        assert!(result.overall);
        assert_eq!(toolchain.scans.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn checks_do_not_short_circuit() {
        let (validator, toolchain) = validator(FakeToolchain {
            tests_fail: true,
            scan_dirty: true,
            ..Default::default()
        });
        let result = validator
            .validate(&issue(FixType::SecurityPatch), &Workspace::new("ws"), &changes("f(\n"))
            .await;

        assert!(!result.syntax_valid);
        assert!(!result.tests_pass);
        assert!(!result.security_clean);
        assert!(!result.overall);
        assert_eq!(toolchain.scans.load(Ordering::SeqCst), 1);
        assert!(result.messages.iter().any(|m| m.starts_with("syntax:")));
        assert!(result.messages.iter().any(|m| m.contains("1 failed")));
        assert!(result.messages.iter().any(|m| m.contains("B105")));
    }

    #[tokio::test]
    async fn tool_error_counts_as_failure() {
        let (validator, _) = validator(FakeToolchain {
            tests_error: true,
            ..Default::default()
        });
        let result = validator
            .validate(&issue(FixType::CodeStyle), &Workspace::new("ws"), &changes("x = 1\n"))
            .await;

        assert!(!result.tests_pass);
        assert!(!result.overall);
        assert!(result.messages[0].contains("not installed"));
    }

    #[tokio::test(start_paused = true)]
    async fn tool_timeout_counts_as_failure() {
        let toolchain = Arc::new(FakeToolchain {
            hang: true,
            ..Default::default()
        });
        let validator = Validator::new(toolchain, Duration::from_secs(1));
        let result = validator
            .validate(&issue(FixType::CodeStyle), &Workspace::new("ws"), &changes("x = 1\n"))
            .await;

        assert!(!result.tests_pass);
        assert!(result.messages[0].contains("timed out"));
    }

    #[test]
    fn validation_result_serializes() {
        let result = ValidationResult::from_checks(true, false, true);
        let json = serde_json::to_string(&result).unwrap();
        let back: ValidationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
