//! Remediation Drive - prioritized, phased remediation of code issues
//!
//! This library ingests findings from test, review and security-scan reports,
//! scores them into priority phases, applies automated fixes in isolated git
//! workspaces, validates each fix and reports the outcome of the whole run.

pub mod classify;
pub mod config;
pub mod error;
pub mod executor;
pub mod ingest;
pub mod issue;
pub mod orchestrator;
pub mod planner;
pub mod report;
pub mod score;
pub mod strategy;
pub mod validator;
pub mod workspace;

pub use error::{Error, Result};

pub use classify::{classification_of, classify, classify_all};
pub use config::{RemediationConfig, Validate, ValidationReport};
pub use executor::{AttemptState, CancelHandle, FixAttempt, FixExecutor, PhaseExecution};
pub use ingest::{ingest, ingest_files, load_report, IngestOutput, IngestSummary, RawReport};
pub use issue::{AttemptStatus, Category, FixType, Issue, IssueSource, Severity};
pub use orchestrator::{Orchestrator, RunContext};
pub use planner::{
    build_plan, render_plan_markdown, Phase, PhaseName, PhaseWindow, RemediationPlan,
    RiskAssessment, RollbackComplexity, Timeline,
};
pub use report::{
    render_markdown, write_reports, OutcomeCounts, PhaseSummary, Recommendation, ReportPaths,
    RunReport,
};
pub use score::score;
pub use strategy::{Dispatch, FixInput, StrategyFn, StrategyRegistry};
pub use validator::{
    check_well_formed, CommandToolchain, ScanOutcome, SubsetOutcome, Toolchain, ValidationResult,
    Validator,
};
pub use workspace::{workspace_name, FileChange, GitWorkspaces, VersionControl, Workspace};
