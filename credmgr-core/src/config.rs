//! Credential manager configuration.
//!
//! Configuration is read from `config.toml` in the platform configuration
//! directory (`~/.config/credmgr/config.toml` on Linux). A missing file yields
//! the defaults: volatile memory storage and no providers.
//!
//! ```toml
//! [storage]
//! backend = "json_file"
//! path = "/var/lib/credmgr/credentials.json"
//!
//! [[providers]]
//! name = "twitch"
//! type = "oauth2"
//! user_info_url = "https://id.twitch.tv/oauth2/userinfo"
//!
//! [[providers]]
//! name = "irc"
//! type = "static"
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::provider::OAUTH2_PROVIDER_TYPE;

/// Error loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration directory not available.
    #[error("configuration directory not available")]
    ConfigDirUnavailable,

    /// I/O error reading the configuration file.
    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but is not usable.
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// Which storage backend to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Volatile in-memory storage.
    #[default]
    Memory,

    /// JSON document on disk.
    JsonFile,

    /// OS keyring entry.
    Keyring,
}

/// Storage backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend to use.
    pub backend: BackendKind,

    /// File path for the `json_file` backend. Defaults to the platform
    /// configuration directory.
    pub path: Option<PathBuf>,

    /// Keyring service name for the `keyring` backend.
    pub keyring_service: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            path: None,
            keyring_service: "credmgr".to_string(),
        }
    }
}

/// An identity provider declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderEntry {
    /// Unique provider name (compared case-insensitively).
    pub name: String,

    /// Provider type discriminator. `"oauth2"` providers can enrich OAuth2
    /// credentials; any other value registers a plain provider.
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// Userinfo endpoint used to resolve the token owner.
    #[serde(default)]
    pub user_info_url: Option<Url>,
}

fn default_provider_type() -> String {
    OAUTH2_PROVIDER_TYPE.to_string()
}

/// Explicit wiring for a [`CredentialManager`](crate::CredentialManager).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialManagerConfig {
    /// Storage backend settings.
    pub storage: StorageConfig,

    /// Identity providers registered at build time.
    pub providers: Vec<ProviderEntry>,
}

impl CredentialManagerConfig {
    /// Default location of the configuration file.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = project_dirs().ok_or(ConfigError::ConfigDirUnavailable)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from the default location or fall back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(&Self::default_path()?)
    }

    /// Load configuration from a specific file.
    ///
    /// A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(entry) = self.providers.iter().find(|p| p.name.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                message: format!("provider of type '{}' has an empty name", entry.provider_type),
            });
        }

        if let Some(entry) = self
            .providers
            .iter()
            .find(|p| p.user_info_url.is_some() && p.provider_type != OAUTH2_PROVIDER_TYPE)
        {
            return Err(ConfigError::Invalid {
                message: format!(
                    "provider '{}' sets user_info_url but is not of type '{}'",
                    entry.name, OAUTH2_PROVIDER_TYPE
                ),
            });
        }

        Ok(())
    }
}

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "credmgr", "credmgr")
}
