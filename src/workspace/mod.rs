//! Isolated workspaces for fix attempts.
//!
//! This module provides the [`VersionControl`] trait, the executor's only write
//! surface, and the [`GitWorkspaces`] implementation using git worktrees.

mod provider;
mod worktree;

pub use provider::{workspace_name, FileChange, VersionControl, Workspace};
pub use worktree::GitWorkspaces;
