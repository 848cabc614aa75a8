//! Remediation Drive CLI
//!
//! Plans and executes phased remediation of findings from test, review and
//! security-scan reports.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};

use remediation_drive::{
    ingest_files, render_markdown, render_plan_markdown, write_reports, CancelHandle,
    CommandToolchain, GitWorkspaces, Orchestrator, Recommendation, RemediationConfig, Result,
    RunContext, RunReport,
};

/// Exit code for a run whose success rate calls for a halt.
const EXIT_HALT: i32 = 2;

#[derive(Parser)]
#[command(name = "remediation-drive")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Prioritized, phased remediation of test, review and scan findings", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify, score and phase findings without changing anything
    Plan {
        /// Raw reports (JSON or YAML), one per source
        #[arg(required = true)]
        reports: Vec<PathBuf>,

        /// Print the plan as JSON instead of markdown
        #[arg(long)]
        json: bool,
    },

    /// Plan and execute fixes in isolated git worktrees
    Run {
        /// Repository to fix
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Directory for run reports (default: from config)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Directory for workspace worktrees (default: system temp dir)
        #[arg(long)]
        worktrees: Option<PathBuf>,

        /// Raw reports (JSON or YAML), one per source
        #[arg(required = true)]
        reports: Vec<PathBuf>,
    },

    /// Render a saved JSON run report as markdown
    Render {
        /// Path to `<run_id>.json`
        report: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn dispatch(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => RemediationConfig::load(path)?,
        None => RemediationConfig::default(),
    };

    match cli.command {
        Commands::Plan { reports, json } => {
            let ctx = RunContext::prepare(ingest_files(&reports)?, &config, Utc::now());
            if json {
                println!("{}", serde_json::to_string_pretty(&ctx.plan)?);
            } else {
                print!("{}", render_plan_markdown(&ctx.plan));
            }
            Ok(0)
        }
        Commands::Run {
            repo,
            out,
            worktrees,
            reports,
        } => {
            let repo = std::fs::canonicalize(&repo)?;
            let worktrees = worktrees.map(|dir| absolute(&dir)).transpose()?;
            let out = out.unwrap_or_else(|| config.report.output_dir.clone());

            let orchestrator = Orchestrator::new(
                config.clone(),
                Arc::new(GitWorkspaces::new(repo.clone(), worktrees)),
                Arc::new(CommandToolchain::new(config.toolchain.clone())),
            );

            let cancel = CancelHandle::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, stopping after the current attempt");
                    on_interrupt.cancel();
                }
            });

            tracing::info!(repo = ?repo, reports = reports.len(), "starting remediation run");
            let report = orchestrator.run_files(&reports, &cancel).await?;
            let paths = write_reports(&report, &out)?;

            print_summary(&report);
            println!("JSON report: {}", paths.json.display());
            println!("Markdown report: {}", paths.markdown.display());

            if report.recommendation == Recommendation::HaltAndReplan {
                Ok(EXIT_HALT)
            } else {
                Ok(0)
            }
        }
        Commands::Render { report } => {
            let report = RunReport::load(&report)?;
            print!("{}", render_markdown(&report));
            Ok(0)
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn print_summary(report: &RunReport) {
    let t = &report.totals;
    println!("\n{}", "=".repeat(60));
    println!("Remediation Run Complete: {}", report.run_id);
    println!("{}", "=".repeat(60));
    println!();
    println!(
        "Attempts: {} total, {} successful, {} failed, {} skipped, {} manual review",
        t.total, t.successful, t.failed, t.skipped, t.manual_review
    );
    println!("Success rate: {:.1}%", report.overall_success_rate);
    println!("Recommendation: {}", report.recommendation.as_str());
    if report.cancelled {
        println!("Run was cancelled before all issues were attempted.");
    }
    println!();
    for note in &report.recommendations {
        println!("  - {}", note);
    }
    println!();
}
