//! spacedeploy - deploy a web application to a Hugging Face Space
//!
//! Usage:
//!   spacedeploy                      # Deploy using spacedeploy.toml / defaults
//!   spacedeploy --target org/space   # Override the destination Space
//!   spacedeploy --dry-run            # Fetch and merge only, no upload

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spacedeploy_core::auth;
use spacedeploy_core::prelude::*;

#[derive(Parser)]
#[command(name = "spacedeploy", version)]
#[command(about = "Deploy a web application to a Hugging Face Space", long_about = None)]
struct Cli {
    /// Config file (default: ./spacedeploy.toml if present)
    #[arg(long, short, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Destination Space (owner/name)
    #[arg(long, short, value_name = "OWNER/NAME")]
    target: Option<String>,

    /// Source repository URL or github:org/repo[@branch]
    #[arg(long, short, value_name = "URL")]
    source: Option<String>,

    /// Branch to clone instead of the remote default
    #[arg(long, short)]
    branch: Option<String>,

    /// Directory containing the deployment assets
    #[arg(long, value_name = "DIR")]
    asset_dir: Option<PathBuf>,

    /// Hugging Face access token (default: $HF_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Commit message for the upload
    #[arg(long, short)]
    message: Option<String>,

    /// Hub endpoint (default: $HF_ENDPOINT or https://huggingface.co)
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Fetch and merge only; skip provisioning and upload
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_path: self.config.clone(),
            target_unit: self.target.clone(),
            source_url: self.source.clone(),
            source_branch: self.branch.clone(),
            asset_dir: self.asset_dir.clone(),
            token: self.token.clone(),
            commit_message: self.message.clone(),
            endpoint: self.endpoint.clone(),
            dry_run: self.dry_run,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "spacedeploy=debug,spacedeploy_core=debug,info"
    } else {
        "spacedeploy=info,spacedeploy_core=info,warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Every scoped resource is released inside run() before exiting.
    let code = match run(&cli) {
        Ok(()) => 0,
        Err(err) => {
            print_error(&err);
            err.downcast_ref::<DeployError>()
                .map(DeployError::exit_code)
                .unwrap_or(1)
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<()> {
    let config = DeployConfig::load(cli.overrides()).map_err(DeployError::Config)?;
    tracing::info!(space = %config.target_unit, "Deploying to Hugging Face Spaces");

    let client =
        auth::connect(&config.hub, config.token.as_ref()).map_err(DeployError::Auth)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let mut deployer = Deployer::new(&config, &client);
    let report = {
        let mut stdout = std::io::stdout().lock();
        runtime.block_on(deployer.run_until(&mut stdout, interrupted()))?
    };

    if let Some(dry_run) = &report.dry_run {
        println!(
            "Dry run complete: source {} merged ({} assets copied, {} missing), tree digest {}",
            report.source_commit,
            report.merge.copied.len(),
            report.merge.missing.len(),
            dry_run.digest
        );
    }
    Ok(())
}

/// Completes on Ctrl-C. Never completes if the handler cannot be installed.
async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

fn print_error(err: &anyhow::Error) {
    let mut chain = err.chain();
    if let Some(top) = chain.next() {
        eprintln!("error: {}", top);
    }
    for cause in chain {
        eprintln!("  caused by: {}", cause);
    }
}
