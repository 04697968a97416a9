//! On-disk shape of `spacedeploy.toml`.
//!
//! Every field is optional; anything left out falls back to the built-in
//! defaults in [`crate::config::defaults`].

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Destination Space, `owner/name`.
    pub target_unit: Option<String>,
    /// Git URL of the application to deploy.
    pub source_url: Option<String>,
    /// Branch to clone instead of the remote default.
    pub source_branch: Option<String>,
    /// Deployment asset file names, relative to `asset_dir`.
    pub assets: Option<Vec<String>>,
    /// Directory holding the deployment assets.
    pub asset_dir: Option<PathBuf>,
    pub commit_message: Option<String>,
    /// Parent directory for the scratch workspace.
    pub workspace_root: Option<PathBuf>,

    #[serde(default)]
    pub space: SpaceSection,
    #[serde(default)]
    pub hub: HubSection,
    #[serde(default)]
    pub git: GitSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpaceSection {
    pub sdk: Option<String>,
    pub private: Option<bool>,
    pub revision: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubSection {
    pub endpoint: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub upload_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitSection {
    /// Abort a clone that transfers under 1 KB/s for this many seconds.
    pub fetch_stall_secs: Option<u64>,
}
