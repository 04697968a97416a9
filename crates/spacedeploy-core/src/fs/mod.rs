//! Filesystem primitives shared across the pipeline.

pub mod tree_hash;
pub mod workspace;

pub use tree_hash::{TreeFile, collect_files, hash_files, hash_tree};
pub use workspace::Workspace;
