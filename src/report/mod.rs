//! Run reports.
//!
//! A [`RunReport`] aggregates every phase execution of one run. JSON is the
//! canonical form; markdown is a rendering of it.

mod render;

pub use render::render_markdown;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::executor::{FixAttempt, PhaseExecution};
use crate::ingest::IngestSummary;
use crate::issue::{AttemptStatus, Issue};
use crate::planner::{PhaseName, PhaseWindow, RemediationPlan, RiskAssessment, RollbackComplexity, Timeline};

/// Success rate at or above which a run may proceed.
pub const PROCEED_THRESHOLD: f64 = 90.0;

/// Success rate at or above which manual review is advised instead of a halt.
pub const REVIEW_THRESHOLD: f64 = 70.0;

/// Attempt counts for a phase or a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub manual_review: usize,
}

impl OutcomeCounts {
    /// Tallies attempt statuses.
    pub fn tally<'a>(attempts: impl IntoIterator<Item = &'a FixAttempt>) -> Self {
        let mut counts = Self::default();
        for attempt in attempts {
            counts.total += 1;
            match attempt.status {
                AttemptStatus::Success => counts.successful += 1,
                AttemptStatus::Failed => counts.failed += 1,
                AttemptStatus::Skipped => counts.skipped += 1,
                AttemptStatus::ManualReview => counts.manual_review += 1,
            }
        }
        counts
    }

    /// Adds another set of counts.
    pub fn add(&mut self, other: &OutcomeCounts) {
        self.total += other.total;
        self.successful += other.successful;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.manual_review += other.manual_review;
    }

    /// Returns the success rate as a percentage; 100 when nothing ran.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.successful as f64 / self.total as f64) * 100.0
    }
}

/// What the caller should do with the run's results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Proceed,
    ManualReview,
    HaltAndReplan,
}

impl Recommendation {
    /// Maps an overall success rate to a recommendation.
    pub fn for_rate(rate: f64) -> Self {
        if rate >= PROCEED_THRESHOLD {
            Recommendation::Proceed
        } else if rate >= REVIEW_THRESHOLD {
            Recommendation::ManualReview
        } else {
            Recommendation::HaltAndReplan
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Proceed => "proceed",
            Recommendation::ManualReview => "manual review advised",
            Recommendation::HaltAndReplan => "halt and re-plan",
        }
    }
}

/// Summary and attempts of one executed phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub name: PhaseName,
    pub window: Option<PhaseWindow>,
    #[serde(flatten)]
    pub counts: OutcomeCounts,
    /// Abort reason, if the phase stopped early.
    pub aborted: Option<String>,
    pub attempts: Vec<FixAttempt>,
}

/// Aggregate outcome of one orchestration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ingest: IngestSummary,
    pub timeline: Timeline,
    pub risk: RiskAssessment,
    /// Planned issues with their outcomes, in execution order.
    pub issues: Vec<Issue>,
    pub phases: Vec<PhaseSummary>,
    pub totals: OutcomeCounts,
    pub overall_success_rate: f64,
    pub recommendation: Recommendation,
    /// Human-readable follow-ups.
    pub recommendations: Vec<String>,
    /// True if the run was cancelled before every issue was attempted.
    #[serde(default)]
    pub cancelled: bool,
}

impl RunReport {
    /// Aggregates phase executions against the plan they came from.
    pub fn build(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        ingest: IngestSummary,
        plan: &RemediationPlan,
        executions: Vec<PhaseExecution>,
    ) -> Self {
        let mut totals = OutcomeCounts::default();
        let mut cancelled = false;
        let mut phases = Vec::with_capacity(executions.len());

        for execution in executions {
            let counts = OutcomeCounts::tally(&execution.attempts);
            totals.add(&counts);
            cancelled |= execution.cancelled;
            phases.push(PhaseSummary {
                name: execution.name,
                window: plan.phase(execution.name).and_then(|p| p.window.clone()),
                counts,
                aborted: execution.aborted,
                attempts: execution.attempts,
            });
        }

        let overall_success_rate = totals.success_rate();
        let recommendation = Recommendation::for_rate(overall_success_rate);
        let mut report = Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            ingest,
            timeline: plan.timeline.clone(),
            risk: plan.risk.clone(),
            issues: plan.issues().cloned().collect(),
            phases,
            totals,
            overall_success_rate,
            recommendation,
            recommendations: Vec::new(),
            cancelled,
        };
        report.recommendations = report.follow_ups();
        report
    }

    fn follow_ups(&self) -> Vec<String> {
        let mut notes = vec![match self.recommendation {
            Recommendation::Proceed => format!(
                "Success rate {:.1}% meets the {:.0}% bar; committed workspaces can be promoted.",
                self.overall_success_rate, PROCEED_THRESHOLD
            ),
            Recommendation::ManualReview => format!(
                "Success rate {:.1}% is below {:.0}%; review committed workspaces before promoting them.",
                self.overall_success_rate, PROCEED_THRESHOLD
            ),
            Recommendation::HaltAndReplan => format!(
                "Success rate {:.1}% is below {:.0}%; halt and re-plan before further automated fixes.",
                self.overall_success_rate, REVIEW_THRESHOLD
            ),
        }];

        for phase in &self.phases {
            if let Some(reason) = &phase.aborted {
                notes.push(format!(
                    "The {} phase was aborted ({}); investigate before re-running.",
                    phase.name, reason
                ));
            }
        }
        if self.totals.manual_review > 0 {
            notes.push(format!(
                "{} issue(s) have no automated strategy and need manual review.",
                self.totals.manual_review
            ));
        }
        if self.totals.failed > 0 {
            notes.push(format!(
                "{} fix attempt(s) failed and were rolled back.",
                self.totals.failed
            ));
        }
        if self.risk.rollback_complexity == RollbackComplexity::High {
            notes.push("Rollback complexity is high; stage promotion of committed fixes.".to_string());
        }
        if !self.risk.migrations.is_empty() {
            notes.push(format!(
                "{} issue(s) may require a schema migration.",
                self.risk.migrations.len()
            ));
        }
        if self.ingest.reports_malformed > 0 || self.ingest.entries_skipped > 0 {
            notes.push(format!(
                "Ingest skipped {} malformed report(s) and {} unusable entries.",
                self.ingest.reports_malformed, self.ingest.entries_skipped
            ));
        }
        if self.cancelled {
            notes.push("The run was cancelled; skipped issues were never attempted.".to_string());
        }
        notes
    }

    /// Returns all attempts in execution order.
    pub fn attempts(&self) -> impl Iterator<Item = &FixAttempt> {
        self.phases.iter().flat_map(|p| p.attempts.iter())
    }

    /// Looks up a planned issue by id.
    pub fn issue(&self, id: &str) -> Option<&Issue> {
        self.issues.iter().find(|i| i.id == id)
    }

    /// Returns the summary of a phase.
    pub fn phase(&self, name: PhaseName) -> Option<&PhaseSummary> {
        self.phases.iter().find(|p| p.name == name)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a report previously written by [`write_reports`].
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Paths of the artifacts written for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

/// Writes `<run_id>.json` and `<run_id>.md` into `dir`.
pub fn write_reports(report: &RunReport, dir: &Path) -> Result<ReportPaths> {
    std::fs::create_dir_all(dir)?;

    let json = dir.join(format!("{}.json", report.run_id));
    std::fs::write(&json, report.to_json()?)?;

    let markdown = dir.join(format!("{}.md", report.run_id));
    std::fs::write(&markdown, render_markdown(report))?;

    tracing::info!(json = ?json, markdown = ?markdown, "wrote run report");
    Ok(ReportPaths { json, markdown })
}
