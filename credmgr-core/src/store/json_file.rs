//! JSON file credential storage.
//!
//! Credentials are stored as a single versioned document:
//!
//! ```json
//! { "version": 1, "credentials": [ { "kind": "oauth2", ... } ] }
//! ```
//!
//! The default location is `~/.config/credmgr/credentials.json` on Linux,
//! the equivalent application support directory on macOS and
//! `%APPDATA%\credmgr\credentials.json` on Windows.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{oauth2_identity_filter, OAuth2StorageBackend, StorageBackend, StorageError};
use crate::config::project_dirs;
use crate::credential::Credential;

const FORMAT_VERSION: u32 = 1;

/// On-disk document layout.
#[derive(Debug, Serialize, Deserialize)]
struct CredentialDocument {
    /// Version of the file format (for future migrations).
    version: u32,

    /// All stored credentials, in working-set order.
    credentials: Vec<Credential>,
}

/// Disk-backed credential store.
///
/// A missing file loads as an empty set. Saves write a sibling temporary file
/// and rename it over the target so readers never observe a partial document.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Create a backend for a specific file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a backend at the platform default location.
    pub fn at_default_path() -> Result<Self, StorageError> {
        Ok(Self::new(Self::default_path()?))
    }

    /// Default storage path for the credentials file.
    pub fn default_path() -> Result<PathBuf, StorageError> {
        let dirs = project_dirs().ok_or_else(|| StorageError::Unavailable {
            message: "configuration directory not available".to_string(),
        })?;
        Ok(dirs.config_dir().join("credentials.json"))
    }

    /// Get the storage path for this backend.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, action: &str, e: std::io::Error) -> StorageError {
        StorageError::Unavailable {
            message: format!("failed to {} {:?}: {}", action, self.path, e),
        }
    }
}

#[async_trait]
impl StorageBackend for JsonFileBackend {
    async fn load_credentials(&self) -> Result<Vec<Credential>, StorageError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No credential file at {:?}, starting empty", self.path);
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.unavailable("read", e)),
        };

        let document: CredentialDocument = serde_json::from_str(&contents)?;
        if document.version != FORMAT_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: document.version,
                expected: FORMAT_VERSION,
            });
        }

        Ok(document.credentials)
    }

    async fn save_credentials(&self, credentials: &[Credential]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.unavailable("create parent directory of", e))?;
        }

        let document = CredentialDocument {
            version: FORMAT_VERSION,
            credentials: credentials.to_vec(),
        };
        let contents = serde_json::to_string_pretty(&document)?;

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, contents)
            .await
            .map_err(|e| self.unavailable("write", e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.unavailable("replace", e))?;

        tracing::debug!("Saved {} credentials to {:?}", credentials.len(), self.path);
        Ok(())
    }

    async fn filter(
        &self,
        identity_provider: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Vec<Credential>, StorageError> {
        oauth2_identity_filter(self, identity_provider, user_id).await
    }
}

impl OAuth2StorageBackend for JsonFileBackend {}
