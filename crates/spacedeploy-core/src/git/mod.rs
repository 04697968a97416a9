//! Git operations for fetching the application source.

mod fetcher;
mod spec;

pub use fetcher::{FetchResult, GitFetcher};
pub use spec::SourceRef;
