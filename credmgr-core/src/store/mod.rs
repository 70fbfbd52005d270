//! Credential storage abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for token values that prevents accidental logging
//! - [`StorageBackend`] - Trait for loading and saving the full credential set
//! - [`OAuth2StorageBackend`] - Extension adding typed OAuth2 views and filtering
//! - [`OAuth2Filter`] - Multi-field filter over OAuth2 credentials
//! - [`MemoryBackend`] - Volatile in-memory implementation
//! - [`JsonFileBackend`] - JSON document on disk
//! - [`KeyringBackend`] - OS keyring entry (with `keyring-store` feature)
//! - [`create_backend`] - Helper to select a backend from configuration
//!
//! # Filtering
//!
//! Backend filters always operate on a fresh [`load_credentials`] call. Every
//! `None` argument is a wildcard; supplied arguments are combined with logical
//! AND and compared exactly (case-sensitive).
//!
//! [`load_credentials`]: StorageBackend::load_credentials
//!
//! # Example
//!
//! ```rust,ignore
//! use credmgr_core::store::{MemoryBackend, OAuth2StorageBackend, StorageBackend};
//! use credmgr_core::OAuth2Credential;
//!
//! let backend = MemoryBackend::new();
//! let credential = OAuth2Credential::new("twitch", "token")?.with_user_id("42");
//! backend.save_credentials(&[credential.into()]).await?;
//!
//! let found = backend.filter(Some("twitch"), Some("42")).await?;
//! assert_eq!(found.len(), 1);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::{BackendKind, StorageConfig};
use crate::credential::{Credential, OAuth2Credential};

mod json_file;
#[cfg(feature = "keyring-store")]
mod keyring;
mod memory;

pub use json_file::JsonFileBackend;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringBackend;
pub use memory::MemoryBackend;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the buffer is wiped when dropped.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for storage backend operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be read from or written to.
    #[error("storage unavailable: {message}")]
    Unavailable { message: String },

    /// Stored data could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data uses a format version this build does not understand.
    #[error("unsupported storage format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Persistence boundary for the ordered credential sequence.
///
/// Implementations must report failures as errors rather than returning an
/// empty sequence. `save_credentials` replaces the stored contents wholesale.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Load every stored credential, in stored order.
    async fn load_credentials(&self) -> Result<Vec<Credential>, StorageError>;

    /// Replace the stored credentials with `credentials`.
    async fn save_credentials(&self, credentials: &[Credential]) -> Result<(), StorageError>;

    /// Find all credentials matching the given provider and user id.
    ///
    /// `None` accepts any value.
    async fn filter(
        &self,
        identity_provider: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Vec<Credential>, StorageError> {
        Ok(self
            .load_credentials()
            .await?
            .into_iter()
            .filter(|c| c.matches_identity(identity_provider, user_id))
            .collect())
    }

    /// First credential belonging to `user_id`, if any.
    async fn get_credential_by_user_id(
        &self,
        user_id: &str,
    ) -> Result<Option<Credential>, StorageError> {
        Ok(self.filter(None, Some(user_id)).await?.into_iter().next())
    }
}

/// Multi-field filter over OAuth2 credentials.
///
/// Unset fields are wildcards. `scopes` is a containment check: a credential
/// matches when it was granted at least the requested scopes.
///
/// # Example
///
/// ```
/// use credmgr_core::{OAuth2Credential, OAuth2Filter};
///
/// let credential = OAuth2Credential::new("twitch", "token")
///     .unwrap()
///     .with_user_id("42")
///     .with_scopes(["chat:read", "chat:edit"]);
///
/// let filter = OAuth2Filter::new()
///     .with_identity_provider("twitch")
///     .with_scopes(["chat:read"]);
/// assert!(filter.matches(&credential));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuth2Filter {
    pub identity_provider: Option<String>,
    pub user_id: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user_name: Option<String>,
    pub scopes: Option<Vec<String>>,
}

impl OAuth2Filter {
    /// Create a filter that matches every OAuth2 credential.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity_provider(mut self, identity_provider: impl Into<String>) -> Self {
        self.identity_provider = Some(identity_provider.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    /// Require at least these scopes.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    /// Check a credential against every supplied field.
    pub fn matches(&self, credential: &OAuth2Credential) -> bool {
        fn field_matches(wanted: Option<&String>, actual: Option<&str>) -> bool {
            wanted.is_none_or(|w| actual == Some(w.as_str()))
        }

        field_matches(
            self.identity_provider.as_ref(),
            Some(credential.identity_provider.as_str()),
        ) && field_matches(self.user_id.as_ref(), credential.user_id.as_deref())
            && field_matches(
                self.access_token.as_ref(),
                Some(credential.access_token.expose()),
            )
            && field_matches(
                self.refresh_token.as_ref(),
                credential.refresh_token.as_ref().map(Secret::expose),
            )
            && field_matches(self.user_name.as_ref(), credential.user_name.as_deref())
            && self
                .scopes
                .as_ref()
                .is_none_or(|scopes| credential.has_scopes(scopes.as_slice()))
    }
}

/// Storage backend with typed OAuth2 views.
///
/// Backends implementing this trait should route [`StorageBackend::filter`]
/// through [`oauth2_identity_filter`] so the base filter only yields OAuth2
/// credentials. Every built-in backend does.
#[async_trait]
pub trait OAuth2StorageBackend: StorageBackend {
    /// Load only the OAuth2 credentials, in stored order.
    async fn load_oauth2_credentials(&self) -> Result<Vec<OAuth2Credential>, StorageError> {
        Ok(self
            .load_credentials()
            .await?
            .into_iter()
            .filter_map(Credential::into_oauth2)
            .collect())
    }

    /// Replace the stored credentials with `credentials`.
    async fn save_oauth2_credentials(
        &self,
        credentials: &[OAuth2Credential],
    ) -> Result<(), StorageError> {
        let credentials: Vec<Credential> =
            credentials.iter().cloned().map(Credential::from).collect();
        self.save_credentials(&credentials).await
    }

    /// Find all OAuth2 credentials matching `filter`.
    async fn filter_oauth2(
        &self,
        filter: &OAuth2Filter,
    ) -> Result<Vec<OAuth2Credential>, StorageError> {
        Ok(self
            .load_oauth2_credentials()
            .await?
            .into_iter()
            .filter(|c| filter.matches(c))
            .collect())
    }

    /// Filter by identity fields and scopes, ignoring token values.
    async fn filter_oauth2_by(
        &self,
        identity_provider: Option<&str>,
        user_id: Option<&str>,
        user_name: Option<&str>,
        scopes: Option<&[String]>,
    ) -> Result<Vec<OAuth2Credential>, StorageError> {
        let filter = OAuth2Filter {
            identity_provider: identity_provider.map(str::to_owned),
            user_id: user_id.map(str::to_owned),
            access_token: None,
            refresh_token: None,
            user_name: user_name.map(str::to_owned),
            scopes: scopes.map(<[String]>::to_vec),
        };
        self.filter_oauth2(&filter).await
    }
}

/// Base provider/user-id filter for OAuth2 backends.
///
/// Yields only OAuth2 credentials, wrapped back into [`Credential`].
pub async fn oauth2_identity_filter<B>(
    backend: &B,
    identity_provider: Option<&str>,
    user_id: Option<&str>,
) -> Result<Vec<Credential>, StorageError>
where
    B: OAuth2StorageBackend + ?Sized,
{
    Ok(backend
        .filter_oauth2_by(identity_provider, user_id, None, None)
        .await?
        .into_iter()
        .map(Credential::from)
        .collect())
}

/// Create a storage backend from configuration.
///
/// Every built-in backend is an OAuth2 backend, so the result can be used
/// for typed OAuth2 queries or passed on as a plain [`StorageBackend`].
///
/// # Backend Selection Logic
///
/// - `memory`: always a [`MemoryBackend`]
/// - `json_file`: a [`JsonFileBackend`] at the configured path, or the
///   platform default path when none is set
/// - `keyring`: a [`KeyringBackend`] when the `keyring-store` feature is
///   enabled and the keyring is reachable; otherwise falls back to
///   [`MemoryBackend`] with a warning
pub fn create_backend(
    config: &StorageConfig,
) -> Result<Arc<dyn OAuth2StorageBackend>, StorageError> {
    match config.backend {
        BackendKind::Memory => {
            tracing::debug!("Using in-memory credential storage");
            Ok(Arc::new(MemoryBackend::new()))
        }
        BackendKind::JsonFile => {
            let backend = match &config.path {
                Some(path) => JsonFileBackend::new(path.clone()),
                None => JsonFileBackend::at_default_path()?,
            };
            tracing::info!("Using JSON credential file at {:?}", backend.path());
            Ok(Arc::new(backend))
        }
        BackendKind::Keyring => Ok(keyring_or_memory(&config.keyring_service)),
    }
}

#[cfg(feature = "keyring-store")]
fn keyring_or_memory(service: &str) -> Arc<dyn OAuth2StorageBackend> {
    match KeyringBackend::try_new(service) {
        Ok(backend) => {
            tracing::info!("Using OS keyring for credential storage");
            Arc::new(backend)
        }
        Err(e) => {
            tracing::warn!(
                "Keyring unavailable ({}), falling back to memory storage. \
                 Credentials will not persist across restarts.",
                e
            );
            Arc::new(MemoryBackend::new())
        }
    }
}

#[cfg(not(feature = "keyring-store"))]
fn keyring_or_memory(_service: &str) -> Arc<dyn OAuth2StorageBackend> {
    tracing::warn!(
        "Keyring storage requested but keyring-store feature not enabled. \
         Using memory storage. Credentials will not persist across restarts."
    );
    Arc::new(MemoryBackend::new())
}
