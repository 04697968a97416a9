//! Source repository reference.

use serde::{Deserialize, Serialize};

/// Repository to deploy. Always fetched shallow (depth 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Clone URL (e.g., "https://github.com/Veloera/Veloera.git")
    pub url: String,
    /// Branch to clone; `None` means the remote default branch
    pub branch: Option<String>,
}

impl SourceRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Parse a source string.
    ///
    /// Supports formats:
    /// - `https://github.com/org/repo.git` (any URL or path git accepts)
    /// - `github:org/repo`
    /// - `github:org/repo@branch`
    pub fn parse(source: &str) -> anyhow::Result<Self> {
        let source = source.trim();
        if source.is_empty() {
            anyhow::bail!("Source URL must not be empty");
        }
        // Would be read by git as an option.
        if source.starts_with('-') {
            anyhow::bail!("Source URL must not start with '-': {}", source);
        }

        let Some(shorthand) = source.strip_prefix("github:") else {
            return Ok(Self::new(source));
        };

        let (repo, branch) = match shorthand.split_once('@') {
            Some((repo, branch)) if !branch.is_empty() => (repo, Some(branch)),
            Some(_) => anyhow::bail!("Missing branch after '@' in source: {}", source),
            None => (shorthand, None),
        };
        let parts: Vec<&str> = repo.split('/').collect();
        if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
            anyhow::bail!("Invalid GitHub shorthand (expected github:org/repo): {}", source);
        }

        let spec = Self::new(format!("https://github.com/{}/{}.git", parts[0], parts[1]));
        Ok(match branch {
            Some(branch) => spec.with_branch(branch),
            None => spec,
        })
    }
}
