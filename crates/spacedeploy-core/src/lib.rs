//! spacedeploy core library
//!
//! Deploys a third-party web application to a Hugging Face Space: shallow
//! clone of the source, overlay of local deployment assets, Space
//! provisioning, single-commit upload and operator instructions.

pub mod auth;
pub mod config;
pub mod deploy;
pub mod fs;
pub mod git;
pub mod hub;
pub mod merge;
pub mod notify;
pub mod provision;
pub mod publish;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigError, ConfigOverrides, DeployConfig};

    // Pipeline
    pub use crate::deploy::{DeployError, DeployReport, DeployStage, Deployer};

    // Hub
    pub use crate::hub::{Credential, HubApi, HubClient, HubError, RepoId};

    // Components
    pub use crate::auth::AuthError;
    pub use crate::merge::MergeReport;
    pub use crate::provision::{ProvisionError, ProvisionOutcome};
    pub use crate::publish::{PublishError, PublishReport};
}
