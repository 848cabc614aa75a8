//! Fix strategies.
//!
//! A strategy is a pure transformation over file contents that returns the
//! edits it wants to make. The [`StrategyRegistry`] maps the closed [`FixType`]
//! enum to strategy functions; fix types without an entry are routed to manual
//! review by the executor.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::issue::{FixType, Issue};
use crate::workspace::FileChange;

/// Everything a strategy may look at.
#[derive(Debug, Clone)]
pub struct FixInput {
    pub issue: Issue,
    /// File named by the issue location, if any.
    pub path: Option<String>,
    /// Current contents of `path` in the workspace; `None` if absent.
    pub contents: Option<String>,
}

impl FixInput {
    /// Returns the target path and contents, or a transformation error.
    pub fn target(&self) -> Result<(&str, &str)> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| self.fail("issue has no file location"))?;
        let contents = self
            .contents
            .as_deref()
            .ok_or_else(|| self.fail(format!("{} does not exist in the workspace", path)))?;
        Ok((path, contents))
    }

    /// Builds a transformation error for this input.
    pub fn fail(&self, reason: impl Into<String>) -> Error {
        Error::Transformation {
            issue_id: self.issue.id.clone(),
            reason: reason.into(),
        }
    }
}

/// A registered fix routine.
pub type StrategyFn = fn(&FixInput) -> Result<Vec<FileChange>>;

/// Result of looking up a fix type.
#[derive(Clone, Copy)]
pub enum Dispatch {
    /// A strategy is registered.
    Apply(StrategyFn),
    /// No strategy; a human has to look at it.
    ManualReview,
}

/// Maps fix types to strategy functions.
#[derive(Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<FixType, StrategyFn>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StrategyRegistry {
    /// Creates a registry with no strategies.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Creates a registry holding the built-in strategies.
    pub fn builtin() -> Self {
        Self::empty()
            .with(FixType::CodeStyle, fix_code_style)
            .with(FixType::SecurityPatch, fix_security_patch)
            .with(FixType::PermissionLogic, fix_permission_logic)
            .with(FixType::Authentication, fix_authentication)
    }

    /// Registers (or replaces) the strategy for a fix type.
    pub fn with(mut self, fix_type: FixType, strategy: StrategyFn) -> Self {
        self.strategies.insert(fix_type, strategy);
        self
    }

    /// Removes the strategy for a fix type.
    pub fn without(mut self, fix_type: FixType) -> Self {
        self.strategies.remove(&fix_type);
        self
    }

    /// Looks up how to handle a fix type.
    pub fn dispatch(&self, fix_type: FixType) -> Dispatch {
        match self.strategies.get(&fix_type) {
            Some(strategy) => Dispatch::Apply(*strategy),
            None => Dispatch::ManualReview,
        }
    }

    /// Returns true if the fix type has a strategy.
    pub fn supports(&self, fix_type: FixType) -> bool {
        self.strategies.contains_key(&fix_type)
    }
}

/// A literal rewrite: `from` becomes `to`.
struct Rewrite {
    from: &'static str,
    to: &'static str,
    summary: &'static str,
}

const SECURITY_REWRITES: &[Rewrite] = &[
    Rewrite {
        from: "DEBUG = True",
        to: "DEBUG = False",
        summary: "disable debug mode",
    },
    Rewrite {
        from: "ALLOWED_HOSTS = ['*']",
        to: "ALLOWED_HOSTS = []",
        summary: "stop accepting any host",
    },
    Rewrite {
        from: "CORS_ORIGIN_ALLOW_ALL = True",
        to: "CORS_ORIGIN_ALLOW_ALL = False",
        summary: "stop allowing every CORS origin",
    },
    Rewrite {
        from: "verify=False",
        to: "verify=True",
        summary: "enable TLS certificate verification",
    },
    Rewrite {
        from: "shell=True",
        to: "shell=False",
        summary: "avoid shell invocation",
    },
    Rewrite {
        from: "yaml.load(",
        to: "yaml.safe_load(",
        summary: "use the safe YAML loader",
    },
    Rewrite {
        from: "import md5",
        to: "import sha256",
        summary: "import SHA-256 instead of MD5",
    },
    Rewrite {
        from: "md5(",
        to: "sha256(",
        summary: "replace MD5 with SHA-256",
    },
];

const PERMISSION_REWRITES: &[Rewrite] = &[Rewrite {
    from: "AllowAny",
    to: "IsAuthenticated",
    summary: "require an authenticated user instead of allowing anyone",
}];

const AUTHENTICATION_REWRITES: &[Rewrite] = &[
    Rewrite {
        from: "authentication_classes = []",
        to: "authentication_classes = api_settings.DEFAULT_AUTHENTICATION_CLASSES",
        summary: "restore the default authentication classes",
    },
    Rewrite {
        from: "permission_classes = []",
        to: "permission_classes = [IsAuthenticated]",
        summary: "require authentication on empty permission list",
    },
    Rewrite {
        from: "permission_classes = ()",
        to: "permission_classes = (IsAuthenticated,)",
        summary: "require authentication on empty permission tuple",
    },
    Rewrite {
        from: "login_required = False",
        to: "login_required = True",
        summary: "require login",
    },
];

fn apply_rewrites(input: &FixInput, rewrites: &[Rewrite], what: &str) -> Result<Vec<FileChange>> {
    let (path, contents) = input.target()?;

    let mut updated = contents.to_string();
    let mut applied = Vec::new();
    for rewrite in rewrites {
        let occurrences = updated.matches(rewrite.from).count();
        if occurrences > 0 {
            updated = updated.replace(rewrite.from, rewrite.to);
            applied.push(format!("{} ({}x)", rewrite.summary, occurrences));
        }
    }

    if applied.is_empty() {
        return Err(input.fail(format!("no known {} pattern in {}", what, path)));
    }

    Ok(vec![FileChange::new(path, applied.join("; "), updated)])
}

/// Rewrites known insecure idioms.
pub fn fix_security_patch(input: &FixInput) -> Result<Vec<FileChange>> {
    apply_rewrites(input, SECURITY_REWRITES, "insecure")
}

/// Replaces open permission classes.
pub fn fix_permission_logic(input: &FixInput) -> Result<Vec<FileChange>> {
    apply_rewrites(input, PERMISSION_REWRITES, "permissive")
}

/// Requires authentication where it was left open.
pub fn fix_authentication(input: &FixInput) -> Result<Vec<FileChange>> {
    apply_rewrites(input, AUTHENTICATION_REWRITES, "unauthenticated")
}

/// Normalizes whitespace: trailing spaces, leading tabs, final newline.
pub fn fix_code_style(input: &FixInput) -> Result<Vec<FileChange>> {
    let (path, contents) = input.target()?;

    let mut trimmed_lines = 0usize;
    let mut expanded_lines = 0usize;
    let mut lines: Vec<String> = Vec::new();

    for line in contents.lines() {
        let without_trailing = line.trim_end_matches([' ', '\t']);
        if without_trailing.len() != line.len() {
            trimmed_lines += 1;
        }

        let indent_len = without_trailing.len() - without_trailing.trim_start_matches([' ', '\t']).len();
        let (indent, rest) = without_trailing.split_at(indent_len);
        if indent.contains('\t') {
            expanded_lines += 1;
            lines.push(format!("{}{}", indent.replace('\t', "    "), rest));
        } else {
            lines.push(without_trailing.to_string());
        }
    }

    while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    let mut updated = lines.join("\n");
    if !updated.is_empty() {
        updated.push('\n');
    }

    if updated == contents {
        return Err(input.fail(format!("{} already conforms to style rules", path)));
    }

    let mut summary = Vec::new();
    if trimmed_lines > 0 {
        summary.push(format!("strip trailing whitespace on {} lines", trimmed_lines));
    }
    if expanded_lines > 0 {
        summary.push(format!("expand tab indentation on {} lines", expanded_lines));
    }
    if summary.is_empty() {
        summary.push("normalize end of file".to_string());
    }

    Ok(vec![FileChange::new(path, summary.join("; "), updated)])
}
