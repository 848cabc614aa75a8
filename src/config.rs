//! Configuration for remediation runs.
//!
//! Loaded from TOML; every field has a default so an empty file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Placeholder substituted with the issue category in `test_command`.
pub const CATEGORY_PLACEHOLDER: &str = "{category}";

/// Placeholder substituted with the modified paths in `scan_command`.
pub const PATHS_PLACEHOLDER: &str = "{paths}";

/// Configuration for the fix executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Consecutive failures in the critical phase that abort it.
    #[serde(default = "default_abort_threshold")]
    pub abort_after_consecutive_failures: u32,
    /// Prefix for workspace branch names.
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
}

fn default_abort_threshold() -> u32 {
    3
}

fn default_branch_prefix() -> String {
    "fix".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            abort_after_consecutive_failures: default_abort_threshold(),
            branch_prefix: default_branch_prefix(),
        }
    }
}

/// Timeouts for each suspension point of a fix attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Workspace creation.
    #[serde(default = "default_workspace_secs")]
    pub workspace_secs: u64,
    /// Strategy transformation.
    #[serde(default = "default_transform_secs")]
    pub transform_secs: u64,
    /// Each of the three validation checks.
    #[serde(default = "default_validation_secs")]
    pub validation_secs: u64,
    /// Commit or discard.
    #[serde(default = "default_commit_secs")]
    pub commit_secs: u64,
}

fn default_workspace_secs() -> u64 {
    60
}

fn default_transform_secs() -> u64 {
    30
}

fn default_validation_secs() -> u64 {
    600 // test subsets can be slow
}

fn default_commit_secs() -> u64 {
    60
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            workspace_secs: default_workspace_secs(),
            transform_secs: default_transform_secs(),
            validation_secs: default_validation_secs(),
            commit_secs: default_commit_secs(),
        }
    }
}

impl TimeoutsConfig {
    /// Returns the workspace creation timeout.
    pub fn workspace(&self) -> Duration {
        Duration::from_secs(self.workspace_secs)
    }

    /// Returns the transformation timeout.
    pub fn transform(&self) -> Duration {
        Duration::from_secs(self.transform_secs)
    }

    /// Returns the per-check validation timeout.
    pub fn validation(&self) -> Duration {
        Duration::from_secs(self.validation_secs)
    }

    /// Returns the commit/discard timeout.
    pub fn commit(&self) -> Duration {
        Duration::from_secs(self.commit_secs)
    }
}

/// Configuration for the phase planner timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Window length of the first non-empty phase.
    #[serde(default = "default_first_phase_days")]
    pub first_phase_days: u32,
    /// Window length of each later non-empty phase.
    #[serde(default = "default_later_phase_days")]
    pub later_phase_days: u32,
    /// How many leading non-empty phases are flagged parallel-eligible.
    #[serde(default = "default_parallel_eligible_phases")]
    pub parallel_eligible_phases: usize,
}

fn default_first_phase_days() -> u32 {
    1
}

fn default_later_phase_days() -> u32 {
    2
}

fn default_parallel_eligible_phases() -> usize {
    2
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            first_phase_days: default_first_phase_days(),
            later_phase_days: default_later_phase_days(),
            parallel_eligible_phases: default_parallel_eligible_phases(),
        }
    }
}

/// Shell commands backing the test/scan collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Runs the test subset for a category, e.g. `pytest -m {category}`.
    #[serde(default)]
    pub test_command: Option<String>,
    /// Scans modified paths, e.g. `bandit -q {paths}`.
    #[serde(default)]
    pub scan_command: Option<String>,
}

/// Configuration for report output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Directory receiving `<run_id>.json` and `<run_id>.md`.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".remediation/reports")
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

/// Top-level remediation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemediationConfig {
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

impl RemediationConfig {
    /// Loads and validates a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RemediationConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        for warning in config.validate().into_result()? {
            tracing::warn!(path = ?path, "{}", warning);
        }

        Ok(config)
    }
}

/// Validation findings for a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Fatal problems.
    pub errors: Vec<String>,
    /// Non-fatal problems.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Returns true if there are no errors.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds an error.
    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Adds a warning.
    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Merges another report into this one.
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Converts to a Result, returning the warnings on success.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    /// Validates the configuration and returns any problems found.
    fn validate(&self) -> ValidationReport;
}

impl Validate for ExecutorConfig {
    fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if self.abort_after_consecutive_failures == 0 {
            report.add_error("abort_after_consecutive_failures must be at least 1");
        }

        let prefix = self.branch_prefix.trim();
        if prefix.is_empty() {
            report.add_error("branch_prefix cannot be empty");
        } else if prefix.contains(char::is_whitespace) || prefix.contains("..") {
            report.add_error(format!("branch_prefix '{}' is not a valid ref name", prefix));
        }

        report
    }
}

impl Validate for TimeoutsConfig {
    fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        for (name, secs) in [
            ("workspace_secs", self.workspace_secs),
            ("transform_secs", self.transform_secs),
            ("validation_secs", self.validation_secs),
            ("commit_secs", self.commit_secs),
        ] {
            if secs == 0 {
                report.add_error(format!("{} must be greater than zero", name));
            }
        }

        if self.validation_secs > 7200 {
            report.add_warning("validation_secs over 2 hours may indicate a misconfiguration");
        }

        report
    }
}

impl Validate for PlannerConfig {
    fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if self.first_phase_days == 0 || self.later_phase_days == 0 {
            report.add_error("phase windows must be at least one day");
        }

        if self.parallel_eligible_phases > 2 {
            report.add_warning(
                "more than two parallel-eligible phases; parallel execution is not implemented",
            );
        }

        report
    }
}

impl Validate for ToolchainConfig {
    fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if let Some(cmd) = &self.test_command {
            if cmd.trim().is_empty() {
                report.add_error("test_command cannot be empty");
            } else if !cmd.contains(CATEGORY_PLACEHOLDER) {
                report.add_warning(format!(
                    "test_command has no {} placeholder; every category runs the same tests",
                    CATEGORY_PLACEHOLDER
                ));
            }
        } else {
            report.add_warning("no test_command configured; regression checks pass vacuously");
        }

        if let Some(cmd) = &self.scan_command {
            if cmd.trim().is_empty() {
                report.add_error("scan_command cannot be empty");
            } else if !cmd.contains(PATHS_PLACEHOLDER) {
                report.add_error(format!(
                    "scan_command must contain {} to restrict the scan to modified files",
                    PATHS_PLACEHOLDER
                ));
            }
        }

        report
    }
}

impl Validate for RemediationConfig {
    fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        report.merge(self.executor.validate());
        report.merge(self.timeouts.validate());
        report.merge(self.planner.validate());
        report.merge(self.toolchain.validate());
        report
    }
}
