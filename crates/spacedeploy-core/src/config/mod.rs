//! Deployment configuration.
//!
//! Values are layered, later layers winning:
//! 1. Built-in defaults ([`defaults`])
//! 2. `spacedeploy.toml` (explicit path, then the working directory, then
//!    the user config directory)
//! 3. Environment (`HF_TOKEN`, `HF_ENDPOINT`)
//! 4. Command-line overrides
//!
//! The result is a [`DeployConfig`] built once and passed by reference.

pub mod parser;
pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::git::SourceRef;
use crate::hub::{Credential, HubSettings, RepoId, SpaceSpec};

pub use schema::FileConfig;

pub const CONFIG_FILE_NAME: &str = "spacedeploy.toml";

/// Built-in deployment target.
pub mod defaults {
    pub const TARGET_UNIT: &str = "mariahlamb/velana";
    pub const SOURCE_URL: &str = "https://github.com/Veloera/Veloera.git";
    pub const COMMIT_MESSAGE: &str = "Deploy Veloera to Hugging Face Spaces";
    pub const ASSETS: [&str; 5] = [
        "Dockerfile",
        "README.md",
        ".env",
        ".dockerignore",
        "DEPLOYMENT_GUIDE.md",
    ];
    pub const SDK: &str = "docker";
    pub const REVISION: &str = "main";
    pub const ENDPOINT: &str = "https://huggingface.co";
    pub const CONNECT_TIMEOUT_SECS: u64 = 30;
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;
    pub const UPLOAD_TIMEOUT_SECS: u64 = 1800;
    pub const FETCH_STALL_SECS: u64 = 60;
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}:\n{message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl std::fmt::Display) -> Self {
        ConfigError::Invalid {
            field,
            message: message.to_string(),
        }
    }
}

/// Values supplied on the command line. `None` keeps the lower layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub target_unit: Option<String>,
    pub source_url: Option<String>,
    pub source_branch: Option<String>,
    pub asset_dir: Option<PathBuf>,
    pub token: Option<String>,
    pub commit_message: Option<String>,
    pub endpoint: Option<String>,
    pub dry_run: bool,
}

/// Fully resolved deployment configuration.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub target_unit: RepoId,
    pub source: SourceRef,
    pub assets: Vec<String>,
    pub asset_dir: PathBuf,
    pub commit_message: String,
    /// Parent of the scratch workspace; system temp dir when `None`.
    pub workspace_root: Option<PathBuf>,
    pub sdk: String,
    pub private: bool,
    pub revision: String,
    pub hub: HubSettings,
    pub fetch_stall: Duration,
    /// Never read from the config file.
    pub token: Option<Credential>,
    pub dry_run: bool,
}

impl DeployConfig {
    /// Load configuration from disk and the process environment.
    pub fn load(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir()
            .map_err(|e| ConfigError::invalid("working directory", e))?;
        let user_dir = dirs::config_dir().map(|d| d.join("spacedeploy"));

        let file = match locate_config_file(&overrides, &cwd, user_dir.as_deref()) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading config file");
                parser::parse_config_toml(&path)?
            }
            None => FileConfig::default(),
        };

        Self::resolve(file, |key| std::env::var(key).ok(), overrides, &cwd)
    }

    /// Merge the layers without touching the filesystem or environment.
    ///
    /// Relative `asset_dir` and `workspace_root` values resolve against `cwd`.
    pub fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
        overrides: ConfigOverrides,
        cwd: &Path,
    ) -> Result<Self, ConfigError> {
        let target_raw = overrides
            .target_unit
            .or(file.target_unit)
            .unwrap_or_else(|| defaults::TARGET_UNIT.to_string());
        let target_unit: RepoId = target_raw
            .parse()
            .map_err(|e| ConfigError::invalid("target_unit", e))?;

        let source_raw = overrides
            .source_url
            .or(file.source_url)
            .unwrap_or_else(|| defaults::SOURCE_URL.to_string());
        let mut source =
            SourceRef::parse(&source_raw).map_err(|e| ConfigError::invalid("source_url", e))?;
        if let Some(branch) = overrides.source_branch.or(file.source_branch) {
            if branch.is_empty() || branch.starts_with('-') {
                return Err(ConfigError::invalid("source_branch", branch));
            }
            source = source.with_branch(branch);
        }

        let assets = file
            .assets
            .unwrap_or_else(|| defaults::ASSETS.iter().map(|s| s.to_string()).collect());
        for asset in &assets {
            validate_asset_name(asset)?;
        }

        let asset_dir = overrides
            .asset_dir
            .or(file.asset_dir)
            .map(|p| absolutize(cwd, p))
            .unwrap_or_else(|| cwd.to_path_buf());
        let workspace_root = file.workspace_root.map(|p| absolutize(cwd, p));

        let commit_message = overrides
            .commit_message
            .or(file.commit_message)
            .unwrap_or_else(|| defaults::COMMIT_MESSAGE.to_string());
        if commit_message.trim().is_empty() {
            return Err(ConfigError::invalid("commit_message", "must not be empty"));
        }

        let sdk = file.space.sdk.unwrap_or_else(|| defaults::SDK.to_string());
        let revision = file
            .space
            .revision
            .unwrap_or_else(|| defaults::REVISION.to_string());

        let endpoint = overrides
            .endpoint
            .or_else(|| env("HF_ENDPOINT"))
            .or(file.hub.endpoint)
            .unwrap_or_else(|| defaults::ENDPOINT.to_string());
        let endpoint = validate_endpoint(&endpoint)?;

        let hub = HubSettings {
            endpoint,
            connect_timeout: seconds(
                "hub.connect_timeout_secs",
                file.hub.connect_timeout_secs,
                defaults::CONNECT_TIMEOUT_SECS,
            )?,
            request_timeout: seconds(
                "hub.request_timeout_secs",
                file.hub.request_timeout_secs,
                defaults::REQUEST_TIMEOUT_SECS,
            )?,
            upload_timeout: seconds(
                "hub.upload_timeout_secs",
                file.hub.upload_timeout_secs,
                defaults::UPLOAD_TIMEOUT_SECS,
            )?,
        };
        let fetch_stall = seconds(
            "git.fetch_stall_secs",
            file.git.fetch_stall_secs,
            defaults::FETCH_STALL_SECS,
        )?;

        let token = overrides
            .token
            .or_else(|| env("HF_TOKEN"))
            .map(Credential::new)
            .filter(|t| !t.is_blank());

        Ok(Self {
            target_unit,
            source,
            assets,
            asset_dir,
            commit_message,
            workspace_root,
            sdk,
            private: file.space.private.unwrap_or(false),
            revision,
            hub,
            fetch_stall,
            token,
            dry_run: overrides.dry_run,
        })
    }

    pub fn space_spec(&self) -> SpaceSpec {
        SpaceSpec {
            repo_id: self.target_unit.clone(),
            sdk: self.sdk.clone(),
            private: self.private,
        }
    }

    /// Public page of the target Space.
    pub fn space_url(&self) -> String {
        format!(
            "{}/spaces/{}",
            self.hub.endpoint.trim_end_matches('/'),
            self.target_unit
        )
    }
}

fn locate_config_file(
    overrides: &ConfigOverrides,
    cwd: &Path,
    user_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = &overrides.config_path {
        return Some(path.clone());
    }
    let local = cwd.join(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    user_dir
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}

fn absolutize(cwd: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}

/// Asset names are copied to `<tree>/<name>`; keep them inside the tree.
fn validate_asset_name(name: &str) -> Result<(), ConfigError> {
    let path = Path::new(name);
    if name.is_empty() || path.is_absolute() {
        return Err(ConfigError::invalid("assets", format!("bad asset name '{}'", name)));
    }
    if path
        .components()
        .any(|c| !matches!(c, std::path::Component::Normal(_)))
    {
        return Err(ConfigError::invalid(
            "assets",
            format!("asset '{}' must stay inside the source tree", name),
        ));
    }
    Ok(())
}

fn validate_endpoint(raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::invalid("hub.endpoint", e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            "hub.endpoint",
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn seconds(field: &'static str, value: Option<u64>, default: u64) -> Result<Duration, ConfigError> {
    match value.unwrap_or(default) {
        0 => Err(ConfigError::invalid(field, "must be greater than zero")),
        secs => Ok(Duration::from_secs(secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn resolve(file: FileConfig, overrides: ConfigOverrides) -> Result<DeployConfig, ConfigError> {
        DeployConfig::resolve(file, no_env, overrides, Path::new("/work"))
    }

    #[test]
    fn defaults_target_the_built_in_space() {
        let config = resolve(FileConfig::default(), ConfigOverrides::default()).unwrap();
        assert_eq!(config.target_unit.to_string(), "mariahlamb/velana");
        assert_eq!(config.source.url, defaults::SOURCE_URL);
        assert_eq!(config.source.branch, None);
        assert_eq!(config.assets.len(), 5);
        assert_eq!(config.asset_dir, PathBuf::from("/work"));
        assert_eq!(config.sdk, "docker");
        assert!(!config.private);
        assert_eq!(config.revision, "main");
        assert_eq!(config.hub.request_timeout, Duration::from_secs(60));
        assert!(config.token.is_none());
        assert!(!config.dry_run);
    }

    #[test]
    fn overrides_beat_file_values() {
        let file = FileConfig {
            target_unit: Some("file/space".to_string()),
            commit_message: Some("from file".to_string()),
            ..FileConfig::default()
        };
        let overrides = ConfigOverrides {
            target_unit: Some("cli/space".to_string()),
            ..ConfigOverrides::default()
        };
        let config = resolve(file, overrides).unwrap();
        assert_eq!(config.target_unit.to_string(), "cli/space");
        assert_eq!(config.commit_message, "from file");
    }

    #[test]
    fn token_and_endpoint_come_from_env() {
        let env: HashMap<&str, &str> = [
            ("HF_TOKEN", "hf_abc"),
            ("HF_ENDPOINT", "https://mirror.example.com/"),
        ]
        .into_iter()
        .collect();
        let config = DeployConfig::resolve(
            FileConfig::default(),
            |key| env.get(key).map(|v| v.to_string()),
            ConfigOverrides::default(),
            Path::new("/work"),
        )
        .unwrap();
        assert_eq!(config.token.as_ref().unwrap().expose(), "hf_abc");
        assert_eq!(config.hub.endpoint, "https://mirror.example.com");
        assert_eq!(
            config.space_url(),
            "https://mirror.example.com/spaces/mariahlamb/velana"
        );
    }

    #[test]
    fn blank_token_is_treated_as_missing() {
        let overrides = ConfigOverrides {
            token: Some("   ".to_string()),
            ..ConfigOverrides::default()
        };
        let config = resolve(FileConfig::default(), overrides).unwrap();
        assert!(config.token.is_none());
    }

    #[test]
    fn invalid_target_unit_is_rejected() {
        let overrides = ConfigOverrides {
            target_unit: Some("no-slash".to_string()),
            ..ConfigOverrides::default()
        };
        let err = resolve(FileConfig::default(), overrides).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "target_unit", .. }));
    }

    #[test]
    fn escaping_asset_names_are_rejected() {
        for bad in ["../secrets.env", "/etc/passwd", ""] {
            let file = FileConfig {
                assets: Some(vec![bad.to_string()]),
                ..FileConfig::default()
            };
            assert!(resolve(file, ConfigOverrides::default()).is_err(), "{bad}");
        }
    }

    #[test]
    fn nested_asset_names_are_allowed() {
        let file = FileConfig {
            assets: Some(vec!["deploy/nginx.conf".to_string()]),
            ..FileConfig::default()
        };
        assert!(resolve(file, ConfigOverrides::default()).is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut file = FileConfig::default();
        file.hub.upload_timeout_secs = Some(0);
        let err = resolve(file, ConfigOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("hub.upload_timeout_secs"));
    }

    #[test]
    fn non_http_endpoint_is_rejected() {
        let overrides = ConfigOverrides {
            endpoint: Some("ftp://hub.example.com".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(resolve(FileConfig::default(), overrides).is_err());
    }

    #[test]
    fn branch_applies_to_source() {
        let overrides = ConfigOverrides {
            source_url: Some("github:acme/chat".to_string()),
            source_branch: Some("release".to_string()),
            ..ConfigOverrides::default()
        };
        let config = resolve(FileConfig::default(), overrides).unwrap();
        assert_eq!(config.source.url, "https://github.com/acme/chat.git");
        assert_eq!(config.source.branch.as_deref(), Some("release"));
    }

    #[test]
    fn relative_paths_resolve_against_cwd() {
        let file = FileConfig {
            asset_dir: Some(PathBuf::from("deploy")),
            workspace_root: Some(PathBuf::from("/scratch")),
            ..FileConfig::default()
        };
        let config = resolve(file, ConfigOverrides::default()).unwrap();
        assert_eq!(config.asset_dir, PathBuf::from("/work/deploy"));
        assert_eq!(config.workspace_root, Some(PathBuf::from("/scratch")));
    }

    #[test]
    fn explicit_config_path_wins() {
        let overrides = ConfigOverrides {
            config_path: Some(PathBuf::from("/etc/spacedeploy.toml")),
            ..ConfigOverrides::default()
        };
        let found = locate_config_file(&overrides, Path::new("/nonexistent"), None);
        assert_eq!(found, Some(PathBuf::from("/etc/spacedeploy.toml")));
    }

    #[test]
    fn local_config_file_is_found() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join(CONFIG_FILE_NAME), "").unwrap();
        let found = locate_config_file(&ConfigOverrides::default(), temp.path(), None);
        assert_eq!(found, Some(temp.path().join(CONFIG_FILE_NAME)));
    }
}
