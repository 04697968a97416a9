//! Access-token validation against the Hub.

use tracing::info;

use crate::hub::{Credential, HubApi, HubClient, HubError, HubSettings, Identity};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no Hugging Face access token (set HF_TOKEN or pass --token)")]
    MissingToken,

    #[error("the Hub rejected the access token")]
    Rejected,

    #[error("could not verify the access token")]
    Unverified(#[source] HubError),
}

/// Build an HTTP client for `settings`, failing fast when no token is set.
pub fn connect(settings: &HubSettings, token: Option<&Credential>) -> Result<HubClient, AuthError> {
    let token = token.ok_or(AuthError::MissingToken)?;
    HubClient::new(settings.clone(), token.clone()).map_err(AuthError::Unverified)
}

/// Verify the token with a `whoami` call.
pub async fn authenticate<A: HubApi>(api: &A) -> Result<Identity, AuthError> {
    match api.whoami().await {
        Ok(identity) => {
            info!(user = %identity.name, "Authenticated with the Hub");
            Ok(identity)
        }
        Err(HubError::Unauthorized) => Err(AuthError::Rejected),
        Err(err) => Err(AuthError::Unverified(err)),
    }
}
