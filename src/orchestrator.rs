//! Run orchestration.
//!
//! One run: ingest, classify, score, plan, then execute the phases strictly
//! in priority order and aggregate everything into a [`RunReport`]. All state
//! for the run lives in a [`RunContext`].

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::classify::classify_all;
use crate::config::RemediationConfig;
use crate::error::Result;
use crate::executor::{CancelHandle, FixExecutor, PhaseExecution};
use crate::ingest::{ingest, ingest_files, IngestOutput, IngestSummary, RawReport};
use crate::planner::{build_plan, RemediationPlan};
use crate::report::RunReport;
use crate::score::score_all;
use crate::strategy::StrategyRegistry;
use crate::validator::{Toolchain, Validator};
use crate::workspace::VersionControl;

/// Everything one run owns, from ingest to report.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ingest: IngestSummary,
    pub plan: RemediationPlan,
    /// Executed phases, in execution order.
    pub executions: Vec<PhaseExecution>,
}

impl RunContext {
    /// Classifies, scores and plans freshly ingested issues.
    pub fn prepare(output: IngestOutput, config: &RemediationConfig, now: DateTime<Utc>) -> Self {
        let IngestOutput { mut issues, summary } = output;
        classify_all(&mut issues);
        score_all(&mut issues);
        let plan = build_plan(issues, &config.planner, now);

        tracing::info!(
            issues = plan.issue_count(),
            rollback_complexity = ?plan.risk.rollback_complexity,
            "remediation plan ready"
        );

        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            ingest: summary,
            plan,
            executions: Vec::new(),
        }
    }

    /// Stores a phase execution and appends outcomes to the planned issues.
    fn record(&mut self, execution: PhaseExecution) {
        if let Some(phase) = self.plan.phases.iter_mut().find(|p| p.name == execution.name) {
            for attempt in &execution.attempts {
                if let Some(issue) = phase.issues.iter_mut().find(|i| i.id == attempt.issue_id) {
                    issue.outcome = Some(attempt.status);
                }
            }
        }
        self.executions.push(execution);
    }

    /// Consumes the context into its report.
    pub fn into_report(self) -> RunReport {
        RunReport::build(
            self.run_id,
            self.started_at,
            self.ingest,
            &self.plan,
            self.executions,
        )
    }
}

/// Drives remediation runs against a repository.
pub struct Orchestrator {
    config: RemediationConfig,
    vcs: Arc<dyn VersionControl>,
    toolchain: Arc<dyn Toolchain>,
    registry: StrategyRegistry,
}

impl Orchestrator {
    /// Creates an orchestrator with the built-in strategies.
    pub fn new(
        config: RemediationConfig,
        vcs: Arc<dyn VersionControl>,
        toolchain: Arc<dyn Toolchain>,
    ) -> Self {
        Self {
            config,
            vcs,
            toolchain,
            registry: StrategyRegistry::builtin(),
        }
    }

    /// Replaces the strategy registry.
    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RemediationConfig {
        &self.config
    }

    /// Plans already-parsed reports without executing anything.
    pub fn plan(&self, reports: &[RawReport]) -> RunContext {
        RunContext::prepare(ingest(reports), &self.config, Utc::now())
    }

    /// Loads report files and plans them.
    ///
    /// Fails only when no file could be parsed.
    pub fn plan_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<RunContext> {
        let output = ingest_files(paths)?;
        Ok(RunContext::prepare(output, &self.config, Utc::now()))
    }

    /// Executes a planned run and always returns its report.
    ///
    /// Phases run strictly in order; a phase starts only after the previous
    /// one has finished, aborted or been cancelled.
    pub async fn execute(&self, mut ctx: RunContext, cancel: &CancelHandle) -> RunReport {
        let executor = FixExecutor::new(
            self.vcs.clone(),
            Validator::new(self.toolchain.clone(), self.config.timeouts.validation()),
            self.registry.clone(),
            &self.config,
        );

        let phases = ctx.plan.phases.clone();
        for phase in &phases {
            if phase.is_empty() {
                ctx.record(PhaseExecution {
                    name: phase.name,
                    attempts: Vec::new(),
                    aborted: None,
                    cancelled: false,
                    started_at: Utc::now(),
                    finished_at: Utc::now(),
                });
                continue;
            }
            let execution = executor.run_phase(phase, cancel).await;
            ctx.record(execution);
        }

        let report = ctx.into_report();
        tracing::info!(
            run_id = %report.run_id,
            total = report.totals.total,
            successful = report.totals.successful,
            failed = report.totals.failed,
            skipped = report.totals.skipped,
            manual_review = report.totals.manual_review,
            success_rate = report.overall_success_rate,
            recommendation = report.recommendation.as_str(),
            "remediation run finished"
        );
        report
    }

    /// Plans and executes parsed reports.
    pub async fn run(&self, reports: &[RawReport], cancel: &CancelHandle) -> RunReport {
        let ctx = self.plan(reports);
        self.execute(ctx, cancel).await
    }

    /// Loads, plans and executes report files.
    pub async fn run_files<P: AsRef<Path>>(&self, paths: &[P], cancel: &CancelHandle) -> Result<RunReport> {
        let ctx = self.plan_files(paths)?;
        Ok(self.execute(ctx, cancel).await)
    }
}
