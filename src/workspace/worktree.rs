//! Git worktree-backed workspaces.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Error, Result};

use super::provider::{ensure_relative, FileChange, VersionControl, Workspace};

/// Version-control collaborator backed by git worktrees.
///
/// Each workspace is a fresh branch checked out in its own worktree, so fixes
/// never touch the main working directory. Committed workspaces release their
/// worktree but keep the branch for the caller to promote.
#[derive(Debug, Clone)]
pub struct GitWorkspaces {
    /// Path to the git repository.
    repo_path: PathBuf,
    /// Base directory for worktrees. If None, uses a temp directory.
    base_dir: Option<PathBuf>,
}

impl GitWorkspaces {
    /// Creates a worktree-backed collaborator for the repository at `repo_path`.
    pub fn new(repo_path: PathBuf, base_dir: Option<PathBuf>) -> Self {
        Self {
            repo_path,
            base_dir,
        }
    }

    /// Returns the repository root.
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn worktree_path(&self, name: &str) -> Result<PathBuf> {
        let base = match &self.base_dir {
            Some(dir) => dir.clone(),
            None => std::env::temp_dir().join("remediation-drive-workspaces"),
        };
        std::fs::create_dir_all(&base)?;
        Ok(base.join(name))
    }

    fn root_of<'a>(&self, workspace: &'a Workspace) -> Result<&'a Path> {
        workspace.root.as_deref().ok_or_else(|| Error::Workspace {
            workspace: workspace.name.clone(),
            reason: "workspace has no checkout directory".to_string(),
        })
    }

    /// Runs git in `cwd`, returning trimmed stdout.
    async fn git(&self, cwd: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .current_dir(cwd)
            .args(args)
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn remove_worktree(&self, root: &Path) -> Result<()> {
        if !root.exists() {
            return Ok(());
        }
        let root_str = root.to_string_lossy();
        self.git(&self.repo_path, &["worktree", "remove", "--force", &root_str])
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl VersionControl for GitWorkspaces {
    async fn create_branch(&self, name: &str) -> Result<Workspace> {
        let path = self.worktree_path(name)?;
        let path_str = path.to_string_lossy();

        self.git(
            &self.repo_path,
            &["worktree", "add", "-b", name, &path_str, "HEAD"],
        )
        .await
        .map_err(|e| Error::Workspace {
            workspace: name.to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(path = ?path, branch = %name, "created workspace worktree");

        Ok(Workspace::new(name).with_root(path))
    }

    async fn read_file(&self, workspace: &Workspace, path: &str) -> Result<Option<String>> {
        let full = self.root_of(workspace)?.join(ensure_relative(path)?);
        if !full.exists() {
            return Ok(None);
        }
        Ok(Some(tokio::fs::read_to_string(&full).await?))
    }

    async fn stage(&self, workspace: &Workspace, changes: &[FileChange]) -> Result<()> {
        let root = self.root_of(workspace)?;
        for change in changes {
            let full = root.join(ensure_relative(&change.path)?);
            if let Some(parent) = full.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&full, &change.contents).await?;
        }
        Ok(())
    }

    async fn commit(&self, workspace: &Workspace, message: &str) -> Result<String> {
        let root = self.root_of(workspace)?;

        self.git(root, &["add", "-A"]).await?;
        self.git(root, &["commit", "-m", message]).await?;
        let commit_id = self.git(root, &["rev-parse", "HEAD"]).await?;

        // The branch keeps the commit; the checkout is no longer needed.
        if let Err(e) = self.remove_worktree(root).await {
            tracing::warn!(
                branch = %workspace.name,
                error = %e,
                "failed to release committed worktree, may need manual cleanup"
            );
        }

        tracing::info!(branch = %workspace.name, commit = %commit_id, "committed workspace");
        Ok(commit_id)
    }

    async fn discard(&self, workspace: &Workspace) -> Result<()> {
        if let Some(root) = &workspace.root {
            self.remove_worktree(root)
                .await
                .map_err(|e| Error::Workspace {
                    workspace: workspace.name.clone(),
                    reason: e.to_string(),
                })?;
        }

        if let Err(e) = self
            .git(&self.repo_path, &["branch", "-D", &workspace.name])
            .await
        {
            // Worktree is already gone; a stale branch is harmless.
            tracing::warn!(
                branch = %workspace.name,
                error = %e,
                "failed to delete workspace branch, may need manual cleanup"
            );
        }

        tracing::info!(branch = %workspace.name, "discarded workspace");
        Ok(())
    }
}
