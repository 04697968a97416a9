//! Hugging Face Hub access.
//!
//! The pipeline talks to the Hub only through the [`HubApi`] trait, so the
//! provisioner and publisher can be exercised against an in-memory fake.
//! [`HubClient`] is the reqwest-backed implementation used by the CLI.

pub mod client;
pub mod commit;
mod repo_id;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

pub use client::{HubClient, HubSettings};
pub use commit::{CommitOperation, CommitPayload};
pub use repo_id::RepoId;

/// Errors returned by Hub API calls.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("the Hub rejected the access token (HTTP 401)")]
    Unauthorized,

    #[error("repository not found: {0}")]
    NotFound(String),

    #[error("repository already exists: {0}")]
    Conflict(String),

    #[error("Hub request to {url} failed with HTTP {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Hub request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected Hub response: {0}")]
    Decode(String),
}

/// Access token for the Hub.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Account behind the access token, as reported by `whoami-v2`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub name: String,
}

/// Subset of the Space metadata returned by `GET /api/spaces/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpaceInfo {
    pub id: String,
    #[serde(default)]
    pub sdk: Option<String>,
    #[serde(default)]
    pub private: Option<bool>,
}

/// Parameters used when a Space has to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceSpec {
    pub repo_id: RepoId,
    pub sdk: String,
    pub private: bool,
}

/// One file entry sent to the pre-upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreuploadFile {
    pub path: String,
    /// Base64 of the first 512 bytes.
    pub sample: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    Regular,
    Lfs,
}

/// The Hub's verdict for one pre-uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreuploadVerdict {
    pub path: String,
    pub upload_mode: UploadMode,
    #[serde(default)]
    pub should_ignore: bool,
}

/// An LFS object identified by its SHA-256 and size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LfsObject {
    pub oid: String,
    pub size: u64,
}

/// Transfer instructions for one LFS object.
///
/// `upload` is `None` when the Hub already stores the object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LfsTransfer {
    pub oid: String,
    pub upload: Option<LfsAction>,
    pub verify: Option<LfsAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct LfsAction {
    pub href: String,
    #[serde(default)]
    pub header: std::collections::BTreeMap<String, String>,
}

impl LfsAction {
    /// Multipart transfers carry a `chunk_size` header.
    pub fn is_multipart(&self) -> bool {
        self.header.contains_key("chunk_size")
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    #[serde(default)]
    pub commit_url: Option<String>,
    #[serde(default)]
    pub commit_oid: Option<String>,
}

/// Operations the deployment pipeline needs from the Hub.
pub trait HubApi {
    /// Cheap identity check used to validate the access token.
    fn whoami(&self) -> impl Future<Output = Result<Identity, HubError>>;

    /// Look up a Space; [`HubError::NotFound`] when it does not exist.
    fn space_info(&self, repo_id: &RepoId) -> impl Future<Output = Result<SpaceInfo, HubError>>;

    fn create_space(&self, spec: &SpaceSpec) -> impl Future<Output = Result<(), HubError>>;

    fn preupload(
        &self,
        repo_id: &RepoId,
        revision: &str,
        files: &[PreuploadFile],
    ) -> impl Future<Output = Result<Vec<PreuploadVerdict>, HubError>>;

    fn lfs_batch(
        &self,
        repo_id: &RepoId,
        revision: &str,
        objects: &[LfsObject],
    ) -> impl Future<Output = Result<Vec<LfsTransfer>, HubError>>;

    /// Upload one LFS object and run its verify action, if any.
    fn lfs_upload(
        &self,
        transfer: &LfsTransfer,
        object: &LfsObject,
        content: Vec<u8>,
    ) -> impl Future<Output = Result<(), HubError>>;

    fn commit(
        &self,
        repo_id: &RepoId,
        revision: &str,
        payload: &CommitPayload,
    ) -> impl Future<Output = Result<CommitInfo, HubError>>;
}
