//! Deployment pipeline.
//!
//! Runs Authenticate → Fetch → Merge → Provision → Publish → Notify,
//! stopping at the first failure. Stages never run twice and nothing is
//! retried. The scratch workspace lives only inside [`Deployer::run`] and
//! is gone by the time it returns, whatever the outcome.
//!
//! Components report typed errors; turning a [`DeployError`] into a process
//! exit status is left to the caller via [`DeployError::exit_code`].
//! [`Deployer::run_until`] cancels the run when a shutdown future fires; the
//! workspace and any running git process are dropped with the run.

use std::fmt;
use std::future::Future;
use std::io::Write;

use tracing::{error, info, warn};

use crate::auth::{AuthError, authenticate};
use crate::config::{ConfigError, DeployConfig};
use crate::fs::{Workspace, hash_tree};
use crate::git::{FetchResult, GitFetcher};
use crate::hub::HubApi;
use crate::merge::{MergeReport, merge_assets};
use crate::notify::{NextSteps, write_next_steps};
use crate::provision::{ProvisionError, ProvisionOutcome, provision_space};
use crate::publish::{PublishError, PublishReport, PublishRequest, publish_tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStage {
    Init,
    Authenticated,
    Fetched,
    Merged,
    Provisioned,
    Published,
    Notified,
    Failed,
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeployStage::Init => "init",
            DeployStage::Authenticated => "authenticated",
            DeployStage::Fetched => "fetched",
            DeployStage::Merged => "merged",
            DeployStage::Provisioned => "provisioned",
            DeployStage::Published => "published",
            DeployStage::Notified => "notified",
            DeployStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("invalid configuration")]
    Config(#[source] ConfigError),

    #[error("authentication failed")]
    Auth(#[source] AuthError),

    #[error("failed to prepare the scratch workspace: {0:#}")]
    Workspace(anyhow::Error),

    #[error("failed to fetch source: {0:#}")]
    Fetch(anyhow::Error),

    #[error("failed to merge deployment assets: {0:#}")]
    Merge(anyhow::Error),

    #[error("failed to provision the Space")]
    Provision(#[source] ProvisionError),

    #[error("failed to publish to the Space")]
    Publish(#[source] PublishError),

    #[error("failed to write instructions")]
    Output(#[source] std::io::Error),

    #[error("deployment interrupted")]
    Interrupted,
}

impl DeployError {
    /// Process exit status for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::Workspace(_) | DeployError::Merge(_) | DeployError::Output(_) => 1,
            DeployError::Config(_) => 2,
            DeployError::Auth(_) => 3,
            DeployError::Fetch(_) => 4,
            DeployError::Provision(_) => 5,
            DeployError::Publish(_) => 6,
            DeployError::Interrupted => 130,
        }
    }
}

impl From<ConfigError> for DeployError {
    fn from(err: ConfigError) -> Self {
        DeployError::Config(err)
    }
}

/// Merged tree summary for `--dry-run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunSummary {
    pub digest: String,
}

#[derive(Debug, Clone)]
pub struct DeployReport {
    pub user: String,
    pub source_commit: String,
    pub merge: MergeReport,
    /// `None` on a dry run.
    pub provision: Option<ProvisionOutcome>,
    /// `None` on a dry run.
    pub publish: Option<PublishReport>,
    pub dry_run: Option<DryRunSummary>,
}

/// Drives one deployment against a [`HubApi`].
pub struct Deployer<'a, A: HubApi> {
    config: &'a DeployConfig,
    api: &'a A,
    fetcher: GitFetcher,
    stage: DeployStage,
}

impl<'a, A: HubApi> Deployer<'a, A> {
    pub fn new(config: &'a DeployConfig, api: &'a A) -> Self {
        Self {
            config,
            api,
            fetcher: GitFetcher::new(config.fetch_stall),
            stage: DeployStage::Init,
        }
    }

    /// Last stage reached; [`DeployStage::Failed`] after an error.
    pub fn stage(&self) -> DeployStage {
        self.stage
    }

    /// Run the pipeline, writing operator instructions to `out` on success.
    pub async fn run(&mut self, out: &mut impl Write) -> Result<DeployReport, DeployError> {
        info!(
            space = %self.config.target_unit,
            source = %self.config.source.url,
            "Starting deployment"
        );

        match self.run_stages(out).await {
            Ok(report) => Ok(report),
            Err(err) => {
                error!(stage = %self.stage, error = %error_chain(&err), "Deployment failed");
                self.stage = DeployStage::Failed;
                Err(err)
            }
        }
    }

    /// Like [`Deployer::run`], but abandons the run once `shutdown` completes.
    ///
    /// The scratch workspace is removed before this returns
    /// [`DeployError::Interrupted`].
    pub async fn run_until(
        &mut self,
        out: &mut impl Write,
        shutdown: impl Future<Output = ()>,
    ) -> Result<DeployReport, DeployError> {
        let result = tokio::select! {
            result = self.run(out) => result,
            () = shutdown => Err(DeployError::Interrupted),
        };
        if matches!(result, Err(DeployError::Interrupted)) {
            warn!(stage = %self.stage, "Deployment interrupted, scratch workspace removed");
            self.stage = DeployStage::Failed;
        }
        result
    }

    async fn run_stages(&mut self, out: &mut impl Write) -> Result<DeployReport, DeployError> {
        let identity = authenticate(self.api).await.map_err(DeployError::Auth)?;
        self.advance(DeployStage::Authenticated);

        let workspace = Workspace::create(self.config.workspace_root.as_deref())
            .map_err(DeployError::Workspace)?;
        let result = self.run_in_workspace(&workspace, identity.name).await;
        if let Err(err) = workspace.close() {
            warn!(error = %format!("{:#}", err), "Scratch workspace cleanup failed");
        }
        let report = result?;

        if report.publish.is_some() {
            write_next_steps(out, &NextSteps::for_config(self.config))
                .map_err(DeployError::Output)?;
            self.advance(DeployStage::Notified);
        }
        Ok(report)
    }

    async fn run_in_workspace(
        &mut self,
        workspace: &Workspace,
        user: String,
    ) -> Result<DeployReport, DeployError> {
        let config = self.config;

        info!(source = %config.source.url, "Cloning source");
        let FetchResult {
            tree_dir,
            commit_sha,
        } = self
            .fetcher
            .fetch(&config.source, &workspace.source_dir())
            .await
            .map_err(DeployError::Fetch)?;
        info!(commit = %commit_sha, "Source cloned");
        self.advance(DeployStage::Fetched);

        let merge = merge_assets(&config.asset_dir, &tree_dir, &config.assets)
            .map_err(DeployError::Merge)?;
        info!(
            copied = merge.copied.len(),
            missing = merge.missing.len(),
            "Deployment assets merged"
        );
        self.advance(DeployStage::Merged);

        if config.dry_run {
            let digest = hash_tree(&tree_dir).map_err(DeployError::Merge)?;
            info!(digest = %digest, "Dry run: skipping provisioning and upload");
            return Ok(DeployReport {
                user,
                source_commit: commit_sha,
                merge,
                provision: None,
                publish: None,
                dry_run: Some(DryRunSummary { digest }),
            });
        }

        let provision = provision_space(self.api, &config.space_spec())
            .await
            .map_err(DeployError::Provision)?;
        self.advance(DeployStage::Provisioned);

        let request = PublishRequest {
            repo_id: &config.target_unit,
            revision: &config.revision,
            tree: &tree_dir,
            summary: &config.commit_message,
            description: format!("Source: {} @ {}", config.source.url, commit_sha),
        };
        let publish = publish_tree(self.api, &request)
            .await
            .map_err(DeployError::Publish)?;
        self.advance(DeployStage::Published);

        Ok(DeployReport {
            user,
            source_commit: commit_sha,
            merge,
            provision: Some(provision),
            publish: Some(publish),
            dry_run: None,
        })
    }

    fn advance(&mut self, next: DeployStage) {
        tracing::debug!(from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
    }
}

/// `top: cause: cause` rendering of an error and its sources.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
