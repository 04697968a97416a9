//! Ensure the target Space exists.

use tracing::{info, warn};

use crate::hub::{HubApi, HubError, SpaceSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The Space was created by this run.
    Created,
    /// The Space already existed and will be updated in place.
    Existing,
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("failed to look up Space {repo_id}")]
    Lookup {
        repo_id: String,
        #[source]
        source: HubError,
    },

    #[error("failed to create Space {repo_id}")]
    Create {
        repo_id: String,
        #[source]
        source: HubError,
    },
}

/// Look up `spec.repo_id` and create it when the Hub reports it missing.
///
/// Never recreates or reconfigures an existing Space, so repeated calls
/// are idempotent.
pub async fn provision_space<A: HubApi>(
    api: &A,
    spec: &SpaceSpec,
) -> Result<ProvisionOutcome, ProvisionError> {
    let repo_id = spec.repo_id.to_string();

    match api.space_info(&spec.repo_id).await {
        Ok(info) => {
            warn!(space = %repo_id, "Space already exists, updating it in place");
            if let Some(sdk) = info.sdk.as_deref()
                && sdk != spec.sdk
            {
                warn!(
                    space = %repo_id,
                    existing = sdk,
                    wanted = %spec.sdk,
                    "Existing Space uses a different SDK"
                );
            }
            return Ok(ProvisionOutcome::Existing);
        }
        Err(HubError::NotFound(_)) => {}
        Err(source) => return Err(ProvisionError::Lookup { repo_id, source }),
    }

    match api.create_space(spec).await {
        Ok(()) => {
            info!(space = %repo_id, sdk = %spec.sdk, private = spec.private, "Created Space");
            Ok(ProvisionOutcome::Created)
        }
        // Someone created it between lookup and create.
        Err(HubError::Conflict(_)) => {
            warn!(space = %repo_id, "Space appeared during creation, updating it in place");
            Ok(ProvisionOutcome::Existing)
        }
        Err(source) => Err(ProvisionError::Create { repo_id, source }),
    }
}
