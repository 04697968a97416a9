//! Overlay of local deployment assets onto the fetched source tree.

use std::path::Path;

use anyhow::Context;
use filetime::FileTime;
use tracing::{info, warn};

/// Which assets were copied and which were absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub copied: Vec<String>,
    pub missing: Vec<String>,
}

/// Copy each asset in `assets` from `asset_dir` into `tree`.
///
/// Existing files in `tree` are overwritten. A missing asset is logged and
/// recorded, never an error. Permissions and timestamps are preserved.
pub fn merge_assets(
    asset_dir: &Path,
    tree: &Path,
    assets: &[String],
) -> anyhow::Result<MergeReport> {
    let mut report = MergeReport::default();

    for name in assets {
        let src = asset_dir.join(name);
        if !src.is_file() {
            warn!(asset = %name, "Deployment asset not found, skipping");
            report.missing.push(name.clone());
            continue;
        }

        let dst = tree.join(name);
        copy_preserving(&src, &dst)?;
        info!(asset = %name, "Copied deployment asset");
        report.copied.push(name.clone());
    }

    Ok(report)
}

/// `fs::copy` plus access/modification times.
fn copy_preserving(src: &Path, dst: &Path) -> anyhow::Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    // A directory in the way would make fs::copy fail with a confusing error.
    if dst.is_dir() {
        anyhow::bail!(
            "Cannot overwrite directory with deployment asset: {}",
            dst.display()
        );
    }

    std::fs::copy(src, dst).with_context(|| {
        format!("Failed to copy {} to {}", src.display(), dst.display())
    })?;

    let meta = std::fs::metadata(src)
        .with_context(|| format!("Failed to stat asset: {}", src.display()))?;
    filetime::set_file_times(
        dst,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )
    .with_context(|| format!("Failed to set file times on {}", dst.display()))?;
    Ok(())
}
