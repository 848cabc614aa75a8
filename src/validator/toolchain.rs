//! Shell-command test/scan collaborator.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::{ToolchainConfig, CATEGORY_PLACEHOLDER, PATHS_PLACEHOLDER};
use crate::error::{Error, Result};
use crate::issue::Category;
use crate::workspace::Workspace;

use super::{ScanOutcome, SubsetOutcome, Toolchain};

/// Lines of tool output kept in a failure detail.
const DETAIL_LINES: usize = 20;

/// Runs the configured commands through `sh -c` inside the workspace checkout.
///
/// An unconfigured command is a vacuously satisfied check.
#[derive(Debug, Clone, Default)]
pub struct CommandToolchain {
    config: ToolchainConfig,
}

/// Captured result of one shell command.
struct CommandOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl CommandToolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    async fn run_command(tool: &str, cwd: &Path, cmd: &str) -> Result<CommandOutput> {
        tracing::debug!(tool, cwd = ?cwd, cmd, "running validation command");

        let output = Command::new("sh")
            .args(["-c", cmd])
            .current_dir(cwd)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::ValidationTool {
                tool: tool.to_string(),
                reason: e.to_string(),
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn checkout<'a>(tool: &str, workspace: &'a Workspace) -> Result<&'a Path> {
        workspace.root.as_deref().ok_or_else(|| Error::ValidationTool {
            tool: tool.to_string(),
            reason: format!("workspace {} has no checkout directory", workspace.name),
        })
    }
}

/// Quotes a path for `sh`.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[async_trait]
impl Toolchain for CommandToolchain {
    async fn run_subset(&self, workspace: &Workspace, category: Category) -> Result<SubsetOutcome> {
        let Some(template) = &self.config.test_command else {
            return Ok(SubsetOutcome {
                passed: true,
                detail: "no test command configured".to_string(),
            });
        };

        let cwd = Self::checkout("tests", workspace)?;
        let cmd = template.replace(CATEGORY_PLACEHOLDER, category.as_str());
        let output = Self::run_command("tests", cwd, &cmd).await?;

        let detail = if output.success {
            String::new()
        } else {
            let combined = format!("{}\n{}", output.stdout, output.stderr);
            tail(combined.trim(), DETAIL_LINES)
        };

        Ok(SubsetOutcome {
            passed: output.success,
            detail,
        })
    }

    async fn run_security_scan(&self, workspace: &Workspace, paths: &[String]) -> Result<ScanOutcome> {
        let Some(template) = &self.config.scan_command else {
            return Ok(ScanOutcome {
                clean: true,
                findings: Vec::new(),
            });
        };
        if paths.is_empty() {
            return Ok(ScanOutcome {
                clean: true,
                findings: Vec::new(),
            });
        }

        let cwd = Self::checkout("scan", workspace)?;
        let quoted: Vec<String> = paths.iter().map(|p| shell_quote(p)).collect();
        let cmd = template.replace(PATHS_PLACEHOLDER, &quoted.join(" "));
        let output = Self::run_command("scan", cwd, &cmd).await?;

        let findings = if output.success {
            Vec::new()
        } else {
            let source = if output.stdout.trim().is_empty() {
                &output.stderr
            } else {
                &output.stdout
            };
            tail(source.trim(), DETAIL_LINES)
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect()
        };

        Ok(ScanOutcome {
            clean: output.success,
            findings,
        })
    }
}
