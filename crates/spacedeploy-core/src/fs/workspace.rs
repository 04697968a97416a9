//! Scratch workspace for one deployment run.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tempfile::TempDir;

const PREFIX: &str = "spacedeploy-";

/// Uniquely named temporary directory owned by a single run.
///
/// Removed when dropped; [`Workspace::close`] removes it and reports
/// failures instead of ignoring them.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a workspace under `root`, or the system temp dir when `None`.
    pub fn create(root: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root).with_context(|| {
                    format!("Failed to create workspace root: {}", root.display())
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .context("Failed to create scratch workspace")?;

        tracing::debug!(path = %dir.path().display(), "Created scratch workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Clone destination inside the workspace. Not created here.
    pub fn source_dir(&self) -> PathBuf {
        self.dir.path().join("source")
    }

    pub fn close(self) -> anyhow::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .with_context(|| format!("Failed to remove scratch workspace: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Removed scratch workspace");
        Ok(())
    }
}
