use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE_STEM: &str = "roam-depot-publisher";
pub const ENV_PREFIX: &str = "ROAM_DEPOT_PUBLISHER";

/// Main configuration structure for the publisher
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PublisherConfig {
    /// Central extension registry settings
    pub registry: RegistryConfig,
    /// Settings for the extension's own repository
    pub extension: ExtensionRepoConfig,
    /// Local layout relative to the invocation directory
    pub workspace: WorkspaceConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RegistryConfig {
    /// `<owner>/<name>` of the registry repository
    pub repo: String,
    /// Branch pull requests target
    pub base_branch: String,
    /// Directory inside the registry holding per-author metadata
    pub metadata_dir: String,
    /// Name of the user's fork
    pub fork_name: String,
    /// Remote name of the fork inside its local clone
    pub fork_remote: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ExtensionRepoConfig {
    /// Branch the extension is published from
    pub default_branch: String,
    /// Remote name pointing at the hosted extension repository
    pub remote: String,
    /// `public` or `private`
    pub visibility: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct WorkspaceConfig {
    /// Directory holding checkpoint files
    pub state_dir: String,
    /// Default folder name for the registry fork clone
    pub depot_folder: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub json_logs: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig {
                repo: "Roam-Research/roam-depot".to_string(),
                base_branch: "main".to_string(),
                metadata_dir: "extensions".to_string(),
                fork_name: "roam-depot".to_string(),
                fork_remote: "origin".to_string(),
            },
            extension: ExtensionRepoConfig {
                default_branch: "master".to_string(),
                remote: "upstream".to_string(),
                visibility: "public".to_string(),
            },
            workspace: WorkspaceConfig {
                state_dir: ".roam-depot-publisher".to_string(),
                depot_folder: "roam-depot".to_string(),
            },
            observability: ObservabilityConfig {
                log_level: "warn".to_string(),
                json_logs: false,
            },
        }
    }
}

impl PublisherConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. `roam-depot-publisher.toml` in `dir`
    /// 3. Environment variables (prefixed with `ROAM_DEPOT_PUBLISHER__`)
    pub fn load(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&PublisherConfig::default())?);

        let file = dir.join(format!("{CONFIG_FILE_STEM}.toml"));
        if file.exists() {
            builder = builder.add_source(File::from(file.as_path()));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;
        let publisher_config: PublisherConfig = config
            .try_deserialize()
            .context("Failed to parse configuration")?;

        publisher_config.validate()?;
        Ok(publisher_config)
    }

    fn validate(&self) -> Result<()> {
        if !matches!(self.extension.visibility.as_str(), "public" | "private") {
            anyhow::bail!(
                "extension.visibility must be 'public' or 'private', got '{}'",
                self.extension.visibility
            );
        }
        if self.registry.repo.split('/').count() != 2 {
            anyhow::bail!("registry.repo must be '<owner>/<name>', got '{}'", self.registry.repo);
        }
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file(dir: &Path) -> Result<()> {
        let env_file = dir.join(".env");
        if env_file.exists() {
            dotenvy::from_path(&env_file)?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
