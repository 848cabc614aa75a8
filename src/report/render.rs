//! Markdown rendering of run reports.

use crate::issue::AttemptStatus;

use super::RunReport;

fn status_label(status: AttemptStatus) -> &'static str {
    match status {
        AttemptStatus::Success => "✓ success",
        AttemptStatus::Failed => "✗ failed",
        AttemptStatus::Skipped => "skipped",
        AttemptStatus::ManualReview => "manual review",
    }
}

/// Escapes text for a markdown table cell.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Renders a run report as markdown.
pub fn render_markdown(report: &RunReport) -> String {
    let mut md = String::new();

    md.push_str("# Remediation Run Report\n\n");
    md.push_str(&format!("- **Run**: `{}`\n", report.run_id));
    md.push_str(&format!(
        "- **Started**: {}\n- **Finished**: {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!(
        "- **Success rate**: {:.1}%\n- **Recommendation**: {}\n",
        report.overall_success_rate,
        report.recommendation.as_str()
    ));
    if report.cancelled {
        md.push_str("- **Cancelled**: yes\n");
    }
    md.push('\n');

    // Totals
    md.push_str("## Summary\n\n");
    md.push_str("| Phase | Total | Successful | Failed | Skipped | Manual review |\n");
    md.push_str("|-------|-------|------------|--------|---------|---------------|\n");
    for phase in &report.phases {
        let c = &phase.counts;
        let name = if phase.aborted.is_some() {
            format!("{} *(aborted)*", phase.name)
        } else {
            phase.name.to_string()
        };
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            name, c.total, c.successful, c.failed, c.skipped, c.manual_review
        ));
    }
    let t = &report.totals;
    md.push_str(&format!(
        "| **all** | {} | {} | {} | {} | {} |\n\n",
        t.total, t.successful, t.failed, t.skipped, t.manual_review
    ));

    // Per-phase attempts
    for phase in report.phases.iter().filter(|p| p.counts.total > 0) {
        md.push_str(&format!("## Phase: {} ({} issues)\n\n", phase.name, phase.counts.total));
        if let Some(reason) = &phase.aborted {
            md.push_str(&format!("> Aborted: {}\n\n", reason));
        }
        md.push_str("| Score | Issue | Status | Workspace | Changes | Notes |\n");
        md.push_str("|-------|-------|--------|-----------|---------|-------|\n");
        for attempt in &phase.attempts {
            let changes = if attempt.changes.is_empty() {
                "-".to_string()
            } else {
                attempt
                    .changes
                    .iter()
                    .map(|c| format!("`{}`: {}", c.path, c.description))
                    .collect::<Vec<_>>()
                    .join("<br>")
            };
            let score = report
                .issue(&attempt.issue_id)
                .and_then(|i| i.priority_score)
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                score,
                cell(&attempt.issue_id),
                status_label(attempt.status),
                attempt.workspace_ref.as_deref().unwrap_or("-"),
                cell(&changes),
                cell(attempt.error.as_deref().unwrap_or("-"))
            ));
        }
        md.push('\n');
    }

    // Risk
    md.push_str("## Risk Assessment\n\n");
    md.push_str(&format!(
        "- **Rollback complexity**: {:?}\n- **High-risk changes**: {}\n- **Potential breaking changes**: {}\n- **Possible migrations**: {}\n\n",
        report.risk.rollback_complexity,
        report.risk.high_risk.len(),
        report.risk.breaking_changes.len(),
        report.risk.migrations.len()
    ));

    // Ingest
    let ingest = &report.ingest;
    md.push_str("<details>\n");
    md.push_str("<summary>Ingest</summary>\n\n");
    md.push_str(&format!(
        "- Reports parsed: {}\n- Reports malformed: {}\n- Entries accepted: {}\n- Entries skipped: {}\n",
        ingest.reports_parsed, ingest.reports_malformed, ingest.entries_accepted, ingest.entries_skipped
    ));
    md.push_str("\n</details>\n\n");

    md.push_str("## Recommendations\n\n");
    for note in &report.recommendations {
        md.push_str(&format!("- {}\n", note));
    }

    md
}
