//! reqwest-backed [`HubApi`] implementation.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{
    CommitInfo, CommitPayload, Credential, HubApi, HubError, Identity, LfsAction, LfsObject,
    LfsTransfer, PreuploadFile, PreuploadVerdict, RepoId, SpaceInfo, SpaceSpec,
};

const LFS_CONTENT_TYPE: &str = "application/vnd.git-lfs+json";
const MAX_ERROR_MESSAGE: usize = 500;

/// Connection settings for the Hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubSettings {
    /// Base URL, e.g. `https://huggingface.co`.
    pub endpoint: String,
    pub connect_timeout: Duration,
    /// Timeout for metadata calls.
    pub request_timeout: Duration,
    /// Timeout for commit and LFS transfer calls.
    pub upload_timeout: Duration,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://huggingface.co".to_string(),
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            upload_timeout: Duration::from_secs(1800),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    settings: HubSettings,
    token: Credential,
}

impl HubClient {
    pub fn new(settings: HubSettings, token: Credential) -> Result<Self, HubError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("spacedeploy/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(settings.connect_timeout)
            .build()?;
        Ok(Self {
            http,
            settings,
            token,
        })
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/{}",
            self.settings.endpoint.trim_end_matches('/'),
            path
        )
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        debug!(method = "GET", url, "Hub request");
        self.http
            .get(url)
            .bearer_auth(self.token.expose())
            .timeout(self.settings.request_timeout)
    }

    fn post(&self, url: &str, timeout: Duration) -> reqwest::RequestBuilder {
        debug!(method = "POST", url, "Hub request");
        self.http
            .post(url)
            .bearer_auth(self.token.expose())
            .timeout(timeout)
    }
}

/// Map a non-success response to a [`HubError`].
async fn check(response: reqwest::Response) -> Result<reqwest::Response, HubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let error_code = response
        .headers()
        .get("x-error-code")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);

    if error_code.as_deref() == Some("RepoNotFound") || status.as_u16() == 404 {
        return Err(HubError::NotFound(message));
    }
    match status.as_u16() {
        401 => Err(HubError::Unauthorized),
        409 => Err(HubError::Conflict(message)),
        code => Err(HubError::Status {
            url,
            status: code,
            message,
        }),
    }
}

/// Pull `{"error": "..."}` out of a Hub error body, falling back to raw text.
fn error_message(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    if message.len() > MAX_ERROR_MESSAGE {
        let mut cut = MAX_ERROR_MESSAGE;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &message[..cut])
    } else {
        message
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T, HubError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| HubError::Decode(format!("{}: {}", what, e)))
}

fn action_headers(action: &LfsAction) -> Result<HeaderMap, HubError> {
    let mut headers = HeaderMap::new();
    for (key, value) in &action.header {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| HubError::Decode(format!("LFS header name {}: {}", key, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| HubError::Decode(format!("LFS header value for {}: {}", key, e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

#[derive(Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadVerdict>,
}

#[derive(Deserialize)]
struct BatchResponse {
    objects: Vec<BatchObject>,
}

#[derive(Deserialize)]
struct BatchObject {
    oid: String,
    #[serde(default)]
    actions: Option<BatchActions>,
    #[serde(default)]
    error: Option<BatchObjectError>,
}

#[derive(Deserialize)]
struct BatchActions {
    #[serde(default)]
    upload: Option<LfsAction>,
    #[serde(default)]
    verify: Option<LfsAction>,
}

#[derive(Deserialize)]
struct BatchObjectError {
    code: u16,
    message: String,
}

impl HubApi for HubClient {
    async fn whoami(&self) -> Result<Identity, HubError> {
        let url = self.api_url("whoami-v2");
        let response = check(self.get(&url).send().await?).await?;
        decode(response, "whoami").await
    }

    async fn space_info(&self, repo_id: &RepoId) -> Result<SpaceInfo, HubError> {
        let url = self.api_url(&format!("spaces/{}", repo_id));
        let response = check(self.get(&url).send().await?).await?;
        decode(response, "space info").await
    }

    async fn create_space(&self, spec: &SpaceSpec) -> Result<(), HubError> {
        let url = self.api_url("repos/create");
        let body = json!({
            "type": "space",
            "name": spec.repo_id.name(),
            "organization": spec.repo_id.owner(),
            "private": spec.private,
            "sdk": spec.sdk,
        });
        let request = self.post(&url, self.settings.request_timeout).json(&body);
        check(request.send().await?).await?;
        Ok(())
    }

    async fn preupload(
        &self,
        repo_id: &RepoId,
        revision: &str,
        files: &[PreuploadFile],
    ) -> Result<Vec<PreuploadVerdict>, HubError> {
        let url = self.api_url(&format!("spaces/{}/preupload/{}", repo_id, revision));
        let request = self
            .post(&url, self.settings.request_timeout)
            .json(&json!({ "files": files }));
        let response = check(request.send().await?).await?;
        let parsed: PreuploadResponse = decode(response, "preupload").await?;
        Ok(parsed.files)
    }

    async fn lfs_batch(
        &self,
        repo_id: &RepoId,
        revision: &str,
        objects: &[LfsObject],
    ) -> Result<Vec<LfsTransfer>, HubError> {
        let url = format!(
            "{}/spaces/{}.git/info/lfs/objects/batch",
            self.settings.endpoint.trim_end_matches('/'),
            repo_id
        );
        let body = json!({
            "operation": "upload",
            "transfers": ["basic"],
            "objects": objects,
            "hash_algo": "sha256",
            "ref": { "name": revision },
        });
        let request = self
            .post(&url, self.settings.request_timeout)
            .header("Accept", LFS_CONTENT_TYPE)
            .header(CONTENT_TYPE, LFS_CONTENT_TYPE)
            .body(body.to_string());
        let response = check(request.send().await?).await?;
        let parsed: BatchResponse = decode(response, "LFS batch").await?;

        parsed
            .objects
            .into_iter()
            .map(|object| {
                if let Some(err) = object.error {
                    return Err(HubError::Status {
                        url: url.clone(),
                        status: err.code,
                        message: format!("LFS object {}: {}", object.oid, err.message),
                    });
                }
                let (upload, verify) = match object.actions {
                    Some(actions) => (actions.upload, actions.verify),
                    None => (None, None),
                };
                Ok(LfsTransfer {
                    oid: object.oid,
                    upload,
                    verify,
                })
            })
            .collect()
    }

    async fn lfs_upload(
        &self,
        transfer: &LfsTransfer,
        object: &LfsObject,
        content: Vec<u8>,
    ) -> Result<(), HubError> {
        let Some(upload) = &transfer.upload else {
            return Ok(());
        };

        // Pre-signed storage URL: no bearer token.
        debug!(method = "PUT", oid = %object.oid, "LFS upload");
        let request = self
            .http
            .put(&upload.href)
            .headers(action_headers(upload)?)
            .timeout(self.settings.upload_timeout)
            .body(content);
        check(request.send().await?).await?;

        if let Some(verify) = &transfer.verify {
            let request = self
                .post(&verify.href, self.settings.request_timeout)
                .headers(action_headers(verify)?)
                .header(CONTENT_TYPE, LFS_CONTENT_TYPE)
                .body(json!({ "oid": object.oid, "size": object.size }).to_string());
            check(request.send().await?).await?;
        }
        Ok(())
    }

    async fn commit(
        &self,
        repo_id: &RepoId,
        revision: &str,
        payload: &CommitPayload,
    ) -> Result<CommitInfo, HubError> {
        let url = self.api_url(&format!("spaces/{}/commit/{}", repo_id, revision));
        let request = self
            .post(&url, self.settings.upload_timeout)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(payload.to_ndjson());
        let response = check(request.send().await?).await?;
        decode(response, "commit").await
    }
}
