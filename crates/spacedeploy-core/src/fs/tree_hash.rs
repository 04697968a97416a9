//! Upload-set collection and deterministic tree hashing
//!
//! The publisher uploads exactly the files [`collect_files`] returns, and
//! logs [`hash_files`] over the same list so two runs can be compared.

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

/// Directories never uploaded.
const SKIPPED_DIRS: [&str; 1] = [".git"];

/// A regular file inside the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFile {
    /// `/`-separated path relative to the tree root
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub size: u64,
}

/// Collect every regular file under `root`, sorted by relative path.
///
/// # Notes
/// - `.git` directories are skipped at any depth
/// - Symlinks to files inside `root` are followed; symlinks leaving `root`,
///   symlinks to directories and dangling symlinks are skipped
pub fn collect_files(root: &Path) -> anyhow::Result<Vec<TreeFile>> {
    let canonical_root = fs::canonicalize(root)
        .with_context(|| format!("Failed to resolve tree root: {}", root.display()))?;
    let mut files = Vec::new();
    collect_recursive(root, "", &canonical_root, &mut files)?;
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

fn collect_recursive(
    dir: &Path,
    base: &str,
    canonical_root: &Path,
    out: &mut Vec<TreeFile>,
) -> anyhow::Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    for entry in entries {
        let entry = entry
            .with_context(|| format!("Failed to read directory entries: {}", dir.display()))?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        let rel_path = if base.is_empty() {
            name_str.to_string()
        } else {
            format!("{}/{}", base, name_str)
        };
        let path = entry.path();

        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat file: {}", path.display()))?;

        if ty.is_dir() {
            if SKIPPED_DIRS.contains(&name_str.as_ref()) {
                continue;
            }
            collect_recursive(&path, &rel_path, canonical_root, out)?;
        } else if ty.is_file() {
            let size = entry
                .metadata()
                .with_context(|| format!("Failed to stat file: {}", path.display()))?
                .len();
            out.push(TreeFile {
                rel_path,
                abs_path: path,
                size,
            });
        } else if ty.is_symlink() {
            match symlink_target_in_tree(&path, canonical_root) {
                Some(size) => out.push(TreeFile {
                    rel_path,
                    abs_path: path,
                    size,
                }),
                None => tracing::warn!(path = %rel_path, "Skipping symlink"),
            }
        }
    }

    Ok(())
}

/// Size of the file behind `link` when it resolves to a regular file under
/// `canonical_root`.
fn symlink_target_in_tree(link: &Path, canonical_root: &Path) -> Option<u64> {
    let target = fs::canonicalize(link).ok()?;
    if !target.starts_with(canonical_root) {
        return None;
    }
    let meta = fs::metadata(&target).ok()?;
    meta.is_file().then(|| meta.len())
}

/// Compute a deterministic hash of a collected file list
///
/// # Algorithm
/// - Files in the order given (sorted by [`collect_files`])
/// - Hash format: `blake3(relative_path || 0x00 || content || 0xFF ...)`
/// - Output: hex string
pub fn hash_files(files: &[TreeFile]) -> anyhow::Result<String> {
    let mut hasher = blake3::Hasher::new();
    for file in files {
        hasher.update(file.rel_path.as_bytes());
        hasher.update(&[0x00]);
        let content = fs::read(&file.abs_path)
            .with_context(|| format!("Failed to read file: {}", file.abs_path.display()))?;
        hasher.update(&content);
        hasher.update(&[0xFF]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hash everything [`collect_files`] would upload from `root`.
pub fn hash_tree(root: &Path) -> anyhow::Result<String> {
    hash_files(&collect_files(root)?)
}
