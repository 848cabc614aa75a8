//! Version-control collaborator trait and workspace types.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Longest issue-derived slug kept in a workspace name.
const MAX_SLUG_LEN: usize = 48;

/// An isolated unit of repository mutation scoped to one fix attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    /// Branch (or changeset) name.
    pub name: String,
    /// Checkout directory, when the backend has one.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl Workspace {
    /// Creates a workspace reference without a checkout directory.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: None,
        }
    }

    /// Sets the checkout directory.
    pub fn with_root(mut self, root: PathBuf) -> Self {
        self.root = Some(root);
        self
    }
}

/// A single file edit produced by a fix strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Path relative to the workspace root.
    pub path: String,
    /// Human-readable summary of the edit.
    pub description: String,
    /// Full new contents; not persisted in reports.
    #[serde(skip)]
    pub contents: String,
}

impl FileChange {
    /// Creates a change replacing `path` with `contents`.
    pub fn new(
        path: impl Into<String>,
        description: impl Into<String>,
        contents: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            description: description.into(),
            contents: contents.into(),
        }
    }
}

/// The executor's only write surface onto the shared repository.
///
/// Every write happens inside a workspace created by `create_branch`; nothing
/// here touches the integration branch. Promoting a committed workspace is the
/// caller's job.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Creates an isolated workspace named `name`.
    async fn create_branch(&self, name: &str) -> Result<Workspace>;

    /// Reads a file as seen from the workspace; `Ok(None)` if it does not exist.
    async fn read_file(&self, workspace: &Workspace, path: &str) -> Result<Option<String>>;

    /// Writes changes into the workspace without committing them.
    async fn stage(&self, workspace: &Workspace, changes: &[FileChange]) -> Result<()>;

    /// Commits staged changes, returning the commit id.
    async fn commit(&self, workspace: &Workspace, message: &str) -> Result<String>;

    /// Throws the workspace and everything in it away.
    async fn discard(&self, workspace: &Workspace) -> Result<()>;
}

/// Hex characters of the issue-id digest carried in a workspace name.
const ID_DIGEST_LEN: usize = 8;

/// Builds a deterministic workspace name from an issue id and a timestamp.
///
/// The slug is readable but lossy, so a SHA-256 prefix of the full id keeps
/// names of distinct issues apart. `fix` + `security_scan:B608@app/db.py:42`
/// at 2026-01-05 09:00:00 becomes
/// `fix-security-scan-b608-app-db-py-42-97345c01-20260105090000`.
pub fn workspace_name(prefix: &str, issue_id: &str, at: DateTime<Utc>) -> String {
    let mut slug = String::with_capacity(issue_id.len());
    for c in issue_id.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let mut slug = slug.trim_matches('-').to_string();
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        slug = slug.trim_end_matches('-').to_string();
    }
    if slug.is_empty() {
        slug.push_str("issue");
    }

    let digest = hex::encode(Sha256::digest(issue_id.as_bytes()));
    format!(
        "{}-{}-{}-{}",
        prefix,
        slug,
        &digest[..ID_DIGEST_LEN],
        at.format("%Y%m%d%H%M%S")
    )
}

/// Rejects paths that would escape the workspace root.
pub(crate) fn ensure_relative(path: &str) -> Result<&Path> {
    let candidate = Path::new(path);
    let escapes = path.is_empty()
        || candidate.is_absolute()
        || candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(Error::InvalidPath(candidate.to_path_buf()));
    }
    Ok(candidate)
}
