//! Shallow clone of the application source.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use tokio::process::Command;

use super::SourceRef;

/// Variables that would point git at some other repository.
const GIT_ENV_OVERRIDES: [&str; 4] = [
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_COMMON_DIR",
];

/// Transfers slower than this (bytes/s) for the stall window are aborted.
const LOW_SPEED_LIMIT: &str = "1000";

/// Result of a successful fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Working copy of the source
    pub tree_dir: PathBuf,
    /// Commit SHA checked out at HEAD
    pub commit_sha: String,
}

/// Clones source repositories at depth 1.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    stall_timeout: Duration,
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl GitFetcher {
    /// Create a fetcher that gives up on clones stalled for `stall_timeout`.
    pub fn new(stall_timeout: Duration) -> Self {
        Self { stall_timeout }
    }

    /// Clone `source` into `dest`, which must not exist yet.
    ///
    /// Dropping the returned future kills the running git process.
    pub async fn fetch(&self, source: &SourceRef, dest: &Path) -> anyhow::Result<FetchResult> {
        if dest.exists() {
            anyhow::bail!("Clone destination already exists: {}", dest.display());
        }
        let dest_str = dest
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid clone destination: {}", dest.display()))?;

        let mut args = vec!["clone", "--depth", "1", "--single-branch"];
        if let Some(branch) = &source.branch {
            args.extend(["--branch", branch.as_str()]);
        }
        // Everything after `--` is positional, even if it starts with '-'.
        args.extend(["--", source.url.as_str(), dest_str]);

        self.run_git(None, &args)
            .await
            .with_context(|| format!("Failed to clone {}", source.url))?;

        let commit_sha = self.git_rev_parse(dest, "HEAD").await?;
        Ok(FetchResult {
            tree_dir: dest.to_path_buf(),
            commit_sha,
        })
    }

    fn git_command(&self) -> Command {
        let mut cmd = Command::new("git");
        for key in GIT_ENV_OVERRIDES {
            cmd.env_remove(key);
        }
        cmd.env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_HTTP_LOW_SPEED_LIMIT", LOW_SPEED_LIMIT)
            .env(
                "GIT_HTTP_LOW_SPEED_TIME",
                self.stall_timeout.as_secs().max(1).to_string(),
            )
            .kill_on_drop(true);
        cmd
    }

    /// Run a git command.
    async fn run_git(&self, cwd: Option<&Path>, args: &[&str]) -> anyhow::Result<()> {
        let mut cmd = self.git_command();
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to run git {:?}", args))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Git command failed {:?}: {}", args, stderr.trim());
        }
        Ok(())
    }

    /// Run git rev-parse and return the result.
    async fn git_rev_parse(&self, cwd: &Path, rev: &str) -> anyhow::Result<String> {
        let output = self
            .git_command()
            .args(["rev-parse", rev])
            .current_dir(cwd)
            .output()
            .await
            .with_context(|| format!("Failed to run git rev-parse {}", rev))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git rev-parse {} failed: {}", rev, stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
