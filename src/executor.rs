//! Fix executor.
//!
//! Runs the issues of one phase strictly in order. Each issue gets its own
//! workspace and walks the attempt state machine:
//!
//! ```text
//! pending -> workspace_acquired -> fix_applied -> validating -> committed
//!                  |                    |              |
//!                  +--------------------+--------------+-----> rolled_back
//! ```
//!
//! Every suspension point is bounded by a timeout; a timeout is a failure.
//! Per-issue errors never escape an attempt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ExecutorConfig, RemediationConfig, TimeoutsConfig};
use crate::error::{Error, Result};
use crate::issue::{AttemptStatus, Issue};
use crate::planner::{Phase, PhaseName};
use crate::strategy::{Dispatch, FixInput, StrategyFn, StrategyRegistry};
use crate::validator::{bounded, ValidationResult, Validator};
use crate::workspace::{workspace_name, FileChange, VersionControl, Workspace};

/// Position of an attempt in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Pending,
    WorkspaceAcquired,
    FixApplied,
    Validating,
    Committed,
    RolledBack,
}

impl AttemptState {
    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: AttemptState) -> bool {
        use AttemptState::*;
        matches!(
            (self, next),
            (Pending, WorkspaceAcquired)
                | (WorkspaceAcquired, FixApplied)
                | (WorkspaceAcquired, RolledBack)
                | (FixApplied, Validating)
                | (FixApplied, RolledBack)
                | (Validating, Committed)
                | (Validating, RolledBack)
        )
    }

    /// Returns true for states with no successor.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Committed | AttemptState::RolledBack)
    }
}

/// One executor run against one issue. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixAttempt {
    pub issue_id: String,
    pub phase: PhaseName,
    /// Workspace (branch) name, once one was created.
    pub workspace_ref: Option<String>,
    pub status: AttemptStatus,
    /// Edits produced by the strategy.
    #[serde(default)]
    pub changes: Vec<FileChange>,
    pub committed: bool,
    pub commit_id: Option<String>,
    pub validation: Option<ValidationResult>,
    /// Why the attempt failed or was skipped.
    pub error: Option<String>,
    /// Last state reached.
    pub final_state: AttemptState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl FixAttempt {
    fn begin(issue: &Issue, phase: PhaseName) -> Self {
        let now = Utc::now();
        Self {
            issue_id: issue.id.clone(),
            phase,
            workspace_ref: None,
            status: AttemptStatus::Failed,
            changes: Vec::new(),
            committed: false,
            commit_id: None,
            validation: None,
            error: None,
            final_state: AttemptState::Pending,
            started_at: now,
            finished_at: now,
        }
    }

    /// Records an issue that was never attempted.
    pub fn skipped(issue: &Issue, phase: PhaseName, reason: impl Into<String>) -> Self {
        let mut attempt = Self::begin(issue, phase);
        attempt.status = AttemptStatus::Skipped;
        attempt.error = Some(reason.into());
        attempt
    }

    fn advance(&mut self, next: AttemptState) {
        debug_assert!(
            self.final_state.can_transition_to(next),
            "illegal attempt transition {:?} -> {:?}",
            self.final_state,
            next
        );
        tracing::trace!(issue_id = %self.issue_id, from = ?self.final_state, to = ?next, "attempt transition");
        self.final_state = next;
    }

    fn finish(mut self, status: AttemptStatus) -> Self {
        self.status = status;
        self.finished_at = Utc::now();
        self
    }

    fn fail(mut self, error: &Error) -> Self {
        self.error = Some(error.to_string());
        self.finish(AttemptStatus::Failed)
    }
}

/// Run-level cancellation flag, honored between issues.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; in-flight attempts still complete.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Outcome of executing one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseExecution {
    pub name: PhaseName,
    /// One attempt per issue, in execution order.
    pub attempts: Vec<FixAttempt>,
    /// Abort reason, if the failure budget was exhausted.
    pub aborted: Option<String>,
    /// True if cancellation stopped the phase early.
    #[serde(default)]
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PhaseExecution {
    /// Counts attempts with `status`.
    pub fn count(&self, status: AttemptStatus) -> usize {
        self.attempts.iter().filter(|a| a.status == status).count()
    }
}

/// Applies fixes inside isolated workspaces.
pub struct FixExecutor {
    vcs: Arc<dyn VersionControl>,
    validator: Validator,
    registry: StrategyRegistry,
    config: ExecutorConfig,
    timeouts: TimeoutsConfig,
}

impl FixExecutor {
    pub fn new(
        vcs: Arc<dyn VersionControl>,
        validator: Validator,
        registry: StrategyRegistry,
        config: &RemediationConfig,
    ) -> Self {
        Self {
            vcs,
            validator,
            registry,
            config: config.executor.clone(),
            timeouts: config.timeouts.clone(),
        }
    }

    /// Executes every issue of `phase` in order.
    ///
    /// Stops early when the critical phase exhausts its failure budget or
    /// when `cancel` is tripped; the issues not reached are recorded as
    /// skipped.
    pub async fn run_phase(&self, phase: &Phase, cancel: &CancelHandle) -> PhaseExecution {
        let started_at = Utc::now();
        let mut attempts = Vec::with_capacity(phase.issues.len());
        let mut aborted = None;
        let mut cancelled = false;
        let mut consecutive_failures = 0u32;

        tracing::info!(phase = %phase.name, issues = phase.issues.len(), "starting phase");

        for (index, issue) in phase.issues.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                tracing::warn!(
                    phase = %phase.name,
                    remaining = phase.issues.len() - index,
                    "run cancelled, skipping remaining issues"
                );
                attempts.extend(
                    phase.issues[index..]
                        .iter()
                        .map(|i| FixAttempt::skipped(i, phase.name, "run cancelled")),
                );
                break;
            }

            let attempt = self.attempt(issue, phase.name).await;
            if attempt.status == AttemptStatus::Failed {
                consecutive_failures += 1;
            } else {
                consecutive_failures = 0;
            }
            attempts.push(attempt);

            if let Err(e) = self.check_failure_budget(phase.name, consecutive_failures) {
                tracing::error!(
                    phase = %phase.name,
                    error = %e,
                    skipped = phase.issues.len() - index - 1,
                    "phase aborted"
                );
                let reason = e.to_string();
                attempts.extend(
                    phase.issues[index + 1..]
                        .iter()
                        .map(|i| FixAttempt::skipped(i, phase.name, reason.clone())),
                );
                aborted = Some(reason);
                break;
            }
        }

        PhaseExecution {
            name: phase.name,
            attempts,
            aborted,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Fails with [`Error::PhaseAborted`] once the critical phase has seen too
    /// many consecutive failures.
    fn check_failure_budget(&self, phase: PhaseName, consecutive_failures: u32) -> Result<()> {
        let limit = self.config.abort_after_consecutive_failures;
        if phase == PhaseName::Critical && consecutive_failures >= limit {
            return Err(Error::PhaseAborted {
                phase: phase.to_string(),
                failures: consecutive_failures,
            });
        }
        Ok(())
    }

    /// Runs one issue through the attempt state machine.
    async fn attempt(&self, issue: &Issue, phase: PhaseName) -> FixAttempt {
        let mut attempt = FixAttempt::begin(issue, phase);
        let name = workspace_name(&self.config.branch_prefix, &issue.id, attempt.started_at);

        let workspace = match bounded(
            "workspace creation",
            self.timeouts.workspace(),
            self.vcs.create_branch(&name),
        )
        .await
        {
            Ok(workspace) => workspace,
            Err(e) => {
                tracing::warn!(issue_id = %issue.id, workspace = %name, error = %e, "workspace creation failed");
                return attempt.fail(&e);
            }
        };
        attempt.workspace_ref = Some(workspace.name.clone());
        attempt.advance(AttemptState::WorkspaceAcquired);
        tracing::info!(issue_id = %issue.id, workspace = %workspace.name, "workspace acquired");

        let fix_type = issue.fix_type_or_default();
        let strategy = match self.registry.dispatch(fix_type) {
            Dispatch::Apply(strategy) => strategy,
            Dispatch::ManualReview => {
                tracing::info!(issue_id = %issue.id, fix_type = %fix_type, "no strategy registered, manual review");
                return attempt.finish(AttemptStatus::ManualReview);
            }
        };

        let changes = match bounded(
            "transformation",
            self.timeouts.transform(),
            self.transform(strategy, issue, &workspace),
        )
        .await
        {
            Ok(changes) => changes,
            Err(e) => {
                if e.is_attempt_scoped() {
                    tracing::warn!(issue_id = %issue.id, error = %e, "transformation failed");
                } else {
                    tracing::error!(issue_id = %issue.id, error = %e, "transformation hit an infrastructure error");
                }
                return self.roll_back(attempt, &workspace, e).await;
            }
        };
        attempt.changes = changes;
        attempt.advance(AttemptState::FixApplied);

        attempt.advance(AttemptState::Validating);
        let validation = self.validator.validate(issue, &workspace, &attempt.changes).await;
        let passed = validation.overall;
        let problems = validation.messages.join("; ");
        attempt.validation = Some(validation);

        if !passed {
            tracing::warn!(issue_id = %issue.id, problems = %problems, "validation failed");
            let e = Error::Transformation {
                issue_id: issue.id.clone(),
                reason: format!("validation failed: {}", problems),
            };
            return self.roll_back(attempt, &workspace, e).await;
        }

        let message = commit_message(issue);
        match bounded(
            "commit",
            self.timeouts.commit(),
            self.vcs.commit(&workspace, &message),
        )
        .await
        {
            Ok(commit_id) => {
                attempt.advance(AttemptState::Committed);
                attempt.committed = true;
                attempt.commit_id = Some(commit_id);
                tracing::info!(issue_id = %issue.id, workspace = %workspace.name, "fix committed");
                attempt.finish(AttemptStatus::Success)
            }
            Err(e) => {
                tracing::warn!(issue_id = %issue.id, error = %e, "commit failed");
                self.roll_back(attempt, &workspace, e).await
            }
        }
    }

    /// Reads the target, runs the strategy and stages its edits.
    async fn transform(
        &self,
        strategy: StrategyFn,
        issue: &Issue,
        workspace: &Workspace,
    ) -> Result<Vec<FileChange>> {
        let path = issue.file_path().map(str::to_string);
        let contents = match &path {
            Some(p) => self.vcs.read_file(workspace, p).await?,
            None => None,
        };

        let input = FixInput {
            issue: issue.clone(),
            path,
            contents,
        };
        let changes = strategy(&input)?;
        if changes.is_empty() {
            return Err(input.fail("strategy produced no changes"));
        }

        self.vcs.stage(workspace, &changes).await?;
        Ok(changes)
    }

    /// Discards the workspace and marks the attempt failed.
    async fn roll_back(&self, mut attempt: FixAttempt, workspace: &Workspace, cause: Error) -> FixAttempt {
        attempt.advance(AttemptState::RolledBack);
        attempt.error = Some(cause.to_string());

        if let Err(e) = bounded("rollback", self.timeouts.commit(), self.vcs.discard(workspace)).await {
            tracing::warn!(
                issue_id = %attempt.issue_id,
                workspace = %workspace.name,
                error = %e,
                "failed to discard workspace, may need manual cleanup"
            );
            attempt.error = Some(format!("{}; discard failed: {}", cause, e));
        } else {
            tracing::warn!(issue_id = %attempt.issue_id, workspace = %workspace.name, "workspace rolled back");
        }

        attempt.finish(AttemptStatus::Failed)
    }
}

fn commit_message(issue: &Issue) -> String {
    let summary = issue.description.lines().next().unwrap_or_default().trim();
    format!(
        "fix({}): {}\n\nIssue: {}",
        issue.fix_type_or_default(),
        summary,
        issue.id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{Category, FixType, IssueSource, Severity};
    use crate::validator::{ScanOutcome, SubsetOutcome, Toolchain};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MemoryVcs {
        files: HashMap<String, String>,
        fail_commit: bool,
        hang_create: bool,
        hang_read: bool,
        hang_commit: bool,
        log: Mutex<Vec<String>>,
    }

    impl MemoryVcs {
        fn with_file(mut self, path: &str, contents: &str) -> Self {
            self.files.insert(path.to_string(), contents.to_string());
            self
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VersionControl for MemoryVcs {
        async fn create_branch(&self, name: &str) -> Result<Workspace> {
            if self.hang_create {
                std::future::pending::<()>().await;
            }
            self.log.lock().unwrap().push(format!("create {}", name));
            Ok(Workspace::new(name))
        }

        async fn read_file(&self, _: &Workspace, path: &str) -> Result<Option<String>> {
            if self.hang_read {
                std::future::pending::<()>().await;
            }
            Ok(self.files.get(path).cloned())
        }

        async fn stage(&self, workspace: &Workspace, changes: &[FileChange]) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("stage {} {}", workspace.name, changes.len()));
            Ok(())
        }

        async fn commit(&self, workspace: &Workspace, _: &str) -> Result<String> {
            if self.hang_commit {
                std::future::pending::<()>().await;
            }
            if self.fail_commit {
                return Err(Error::Git("commit rejected".to_string()));
            }
            self.log.lock().unwrap().push(format!("commit {}", workspace.name));
            Ok("abc123".to_string())
        }

        async fn discard(&self, workspace: &Workspace) -> Result<()> {
            self.log.lock().unwrap().push(format!("discard {}", workspace.name));
            Ok(())
        }
    }

    struct PassingToolchain;

    #[async_trait]
    impl Toolchain for PassingToolchain {
        async fn run_subset(&self, _: &Workspace, _: Category) -> Result<SubsetOutcome> {
            Ok(SubsetOutcome {
                passed: true,
                detail: String::new(),
            })
        }

        async fn run_security_scan(&self, _: &Workspace, _: &[String]) -> Result<ScanOutcome> {
            Ok(ScanOutcome {
                clean: true,
                findings: Vec::new(),
            })
        }
    }

    fn executor(vcs: Arc<MemoryVcs>) -> FixExecutor {
        let validator = Validator::new(Arc::new(PassingToolchain), Duration::from_secs(5));
        FixExecutor::new(
            vcs,
            validator,
            StrategyRegistry::builtin(),
            &RemediationConfig::default(),
        )
    }

    fn security_issue(n: usize, file: &str) -> Issue {
        Issue::new(
            format!("security_scan:B{}@{}", n, file),
            IssueSource::SecurityScan,
            "insecure setting",
        )
        .with_severity(Severity::Critical)
        .with_location(file)
        .with_classification(Category::SecurityPatch, FixType::SecurityPatch)
        .with_discovery_index(n)
    }

    fn phase(name: PhaseName, issues: Vec<Issue>) -> Phase {
        Phase {
            name,
            issues,
            window: None,
            parallel_eligible: false,
        }
    }

    #[test]
    fn state_machine_transitions() {
        use AttemptState::*;
        assert!(Pending.can_transition_to(WorkspaceAcquired));
        assert!(Validating.can_transition_to(Committed));
        assert!(Validating.can_transition_to(RolledBack));
        assert!(!Pending.can_transition_to(Committed));
        assert!(!Committed.can_transition_to(RolledBack));
        assert!(!RolledBack.can_transition_to(Committed));
        assert!(Committed.is_terminal());
        assert!(!FixApplied.is_terminal());
    }

    #[tokio::test]
    async fn successful_fix_is_committed() {
        let vcs = Arc::new(MemoryVcs::default().with_file("settings.py", "DEBUG = True\n"));
        let exec = executor(vcs.clone());

        let result = exec
            .run_phase(&phase(PhaseName::Critical, vec![security_issue(1, "settings.py")]), &CancelHandle::new())
            .await;

        let attempt = &result.attempts[0];
        assert_eq!(attempt.status, AttemptStatus::Success);
        assert!(attempt.committed);
        assert_eq!(attempt.commit_id.as_deref(), Some("abc123"));
        assert_eq!(attempt.final_state, AttemptState::Committed);
        assert!(attempt.validation.as_ref().unwrap().overall);
        assert_eq!(attempt.changes.len(), 1);
        assert!(vcs.log().iter().any(|l| l.starts_with("commit ")));
    }

    #[tokio::test]
    async fn transformation_failure_rolls_back() {
        let vcs = Arc::new(MemoryVcs::default().with_file("db.py", "cursor.execute(q % a)\n"));
        let exec = executor(vcs.clone());

        let result = exec
            .run_phase(&phase(PhaseName::High, vec![security_issue(1, "db.py")]), &CancelHandle::new())
            .await;

        let attempt = &result.attempts[0];
        assert_eq!(attempt.status, AttemptStatus::Failed);
        assert!(!attempt.committed);
        assert_eq!(attempt.final_state, AttemptState::RolledBack);
        assert!(attempt.error.as_ref().unwrap().contains("no known insecure pattern"));
        assert!(vcs.log().iter().any(|l| l.starts_with("discard ")));
    }

    #[tokio::test]
    async fn failed_validation_rolls_back() {
        let vcs = Arc::new(MemoryVcs::default().with_file("app.py", "DEBUG = True\nf(\n"));
        let exec = executor(vcs.clone());

        let result = exec
            .run_phase(&phase(PhaseName::High, vec![security_issue(1, "app.py")]), &CancelHandle::new())
            .await;

        let attempt = &result.attempts[0];
        assert_eq!(attempt.status, AttemptStatus::Failed);
        assert!(!attempt.committed);
        assert!(!attempt.validation.as_ref().unwrap().syntax_valid);
    }

    #[tokio::test]
    async fn commit_failure_marks_attempt_failed() {
        let vcs = Arc::new(MemoryVcs {
            fail_commit: true,
            ..MemoryVcs::default().with_file("settings.py", "DEBUG = True\n")
        });
        let exec = executor(vcs.clone());

        let result = exec
            .run_phase(&phase(PhaseName::High, vec![security_issue(1, "settings.py")]), &CancelHandle::new())
            .await;

        let attempt = &result.attempts[0];
        assert_eq!(attempt.status, AttemptStatus::Failed);
        assert!(!attempt.committed);
        assert!(attempt.validation.as_ref().unwrap().overall);
        assert!(attempt.error.as_ref().unwrap().contains("commit rejected"));
    }

    #[tokio::test(start_paused = true)]
    async fn commit_timeout_rolls_back() {
        let vcs = Arc::new(MemoryVcs {
            hang_commit: true,
            ..MemoryVcs::default().with_file("settings.py", "DEBUG = True\n")
        });
        let exec = executor(vcs.clone());

        let result = exec
            .run_phase(&phase(PhaseName::High, vec![security_issue(1, "settings.py")]), &CancelHandle::new())
            .await;

        let attempt = &result.attempts[0];
        assert_eq!(attempt.status, AttemptStatus::Failed);
        assert!(!attempt.committed);
        assert!(attempt.commit_id.is_none());
        assert_eq!(attempt.final_state, AttemptState::RolledBack);
        assert!(attempt.error.as_ref().unwrap().contains("commit timed out after 60s"));
        assert!(vcs.log().iter().any(|l| l.starts_with("discard ")));
        assert!(!vcs.log().iter().any(|l| l.starts_with("commit ")));
    }

    #[tokio::test(start_paused = true)]
    async fn transformation_timeout_rolls_back() {
        let vcs = Arc::new(MemoryVcs {
            hang_read: true,
            ..MemoryVcs::default().with_file("settings.py", "DEBUG = True\n")
        });
        let exec = executor(vcs.clone());

        let result = exec
            .run_phase(&phase(PhaseName::High, vec![security_issue(1, "settings.py")]), &CancelHandle::new())
            .await;

        let attempt = &result.attempts[0];
        assert_eq!(attempt.status, AttemptStatus::Failed);
        assert_eq!(attempt.final_state, AttemptState::RolledBack);
        assert!(attempt.changes.is_empty());
        assert!(attempt.error.as_ref().unwrap().contains("transformation timed out"));
        assert!(vcs.log().iter().any(|l| l.starts_with("discard ")));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_workspace_creation_aborts_critical_phase() {
        let vcs = Arc::new(MemoryVcs {
            hang_create: true,
            ..MemoryVcs::default().with_file("settings.py", "DEBUG = True\n")
        });
        let exec = executor(vcs.clone());
        let issues: Vec<Issue> = (0..5).map(|n| security_issue(n, "settings.py")).collect();

        let result = exec
            .run_phase(&phase(PhaseName::Critical, issues), &CancelHandle::new())
            .await;

        assert_eq!(result.attempts.len(), 5);
        for attempt in &result.attempts[..3] {
            assert_eq!(attempt.status, AttemptStatus::Failed);
            assert_eq!(attempt.final_state, AttemptState::Pending);
            assert!(attempt.workspace_ref.is_none());
            assert!(attempt
                .error
                .as_ref()
                .unwrap()
                .contains("workspace creation timed out"));
        }
        assert!(result.attempts[3..]
            .iter()
            .all(|a| a.status == AttemptStatus::Skipped));
        assert_eq!(result.count(AttemptStatus::Skipped), 2);
        assert!(result.aborted.as_ref().unwrap().contains("3 consecutive failures"));
        assert!(vcs.log().is_empty());
    }

    #[tokio::test]
    async fn unsupported_fix_type_goes_to_manual_review() {
        let vcs = Arc::new(MemoryVcs::default());
        let exec = executor(vcs.clone());
        let issue = Issue::new("unit_test:slow_query", IssueSource::UnitTest, "query too slow")
            .with_classification(Category::PerformanceOptimization, FixType::PerformanceOptimization);

        let result = exec
            .run_phase(&phase(PhaseName::Low, vec![issue]), &CancelHandle::new())
            .await;

        let attempt = &result.attempts[0];
        assert_eq!(attempt.status, AttemptStatus::ManualReview);
        assert!(attempt.changes.is_empty());
        assert!(attempt.workspace_ref.is_some());
        assert_eq!(attempt.final_state, AttemptState::WorkspaceAcquired);
        // Created, never staged or discarded.
        assert_eq!(vcs.log().len(), 1);
    }

    #[tokio::test]
    async fn critical_phase_aborts_after_three_consecutive_failures() {
        let vcs = Arc::new(MemoryVcs::default());
        let exec = executor(vcs);
        let issues: Vec<Issue> = (0..6).map(|n| security_issue(n, "missing.py")).collect();

        let result = exec
            .run_phase(&phase(PhaseName::Critical, issues), &CancelHandle::new())
            .await;

        assert_eq!(result.count(AttemptStatus::Failed), 3);
        assert_eq!(result.count(AttemptStatus::Skipped), 3);
        assert!(result.aborted.as_ref().unwrap().contains("3 consecutive failures"));
        assert!(result.attempts[3..]
            .iter()
            .all(|a| a.status == AttemptStatus::Skipped && a.workspace_ref.is_none()));
    }

    #[tokio::test]
    async fn success_resets_failure_streak() {
        let vcs = Arc::new(MemoryVcs::default().with_file("ok.py", "DEBUG = True\n"));
        let exec = executor(vcs);
        let issues = vec![
            security_issue(0, "missing.py"),
            security_issue(1, "missing.py"),
            security_issue(2, "ok.py"),
            security_issue(3, "missing.py"),
            security_issue(4, "missing.py"),
        ];

        let result = exec
            .run_phase(&phase(PhaseName::Critical, issues), &CancelHandle::new())
            .await;

        assert!(result.aborted.is_none());
        assert_eq!(result.count(AttemptStatus::Failed), 4);
        assert_eq!(result.count(AttemptStatus::Success), 1);
    }

    #[tokio::test]
    async fn non_critical_phases_never_abort() {
        let vcs = Arc::new(MemoryVcs::default());
        let exec = executor(vcs);
        let issues: Vec<Issue> = (0..5).map(|n| security_issue(n, "missing.py")).collect();

        let result = exec
            .run_phase(&phase(PhaseName::High, issues), &CancelHandle::new())
            .await;

        assert!(result.aborted.is_none());
        assert_eq!(result.count(AttemptStatus::Failed), 5);
    }

    #[tokio::test]
    async fn cancellation_skips_unstarted_issues() {
        let vcs = Arc::new(MemoryVcs::default());
        let exec = executor(vcs.clone());
        let cancel = CancelHandle::new();
        cancel.cancel();

        let result = exec
            .run_phase(&phase(PhaseName::Medium, vec![security_issue(0, "a.py")]), &cancel)
            .await;

        assert!(result.cancelled);
        assert_eq!(result.count(AttemptStatus::Skipped), 1);
        assert!(vcs.log().is_empty());
    }

    #[test]
    fn commit_message_names_issue() {
        let msg = commit_message(&security_issue(7, "settings.py"));
        assert!(msg.starts_with("fix(security_patch): insecure setting"));
        assert!(msg.contains("Issue: security_scan:B7@settings.py"));
    }
}
