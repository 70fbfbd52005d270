//! Explicit wiring for [`CredentialManager`].

use std::path::Path;
use std::sync::Arc;

use crate::config::CredentialManagerConfig;
use crate::error::CredmgrError;
use crate::manager::{CredentialManager, ManagerError};
use crate::provider::{provider_from_entry, IdentityProvider};
use crate::store::{create_backend, MemoryBackend, StorageBackend};

/// Builder for a [`CredentialManager`].
///
/// Without a storage backend the manager uses a volatile [`MemoryBackend`].
///
/// # Example
///
/// ```rust,no_run
/// # async fn example() -> Result<(), credmgr_core::CredmgrError> {
/// use credmgr_core::{CredentialManagerBuilder, CredentialManagerConfig};
///
/// let config = CredentialManagerConfig::default();
/// let manager = CredentialManagerBuilder::from_config(&config)?.build().await?;
/// assert!(manager.credentials().await.is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct CredentialManagerBuilder {
    backend: Option<Arc<dyn StorageBackend>>,
    providers: Vec<Arc<dyn IdentityProvider>>,
}

impl CredentialManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a configuration: its storage backend and providers.
    pub fn from_config(config: &CredentialManagerConfig) -> Result<Self, CredmgrError> {
        let mut builder = Self::new().with_storage_backend(create_backend(&config.storage)?);
        for entry in &config.providers {
            builder = builder.with_identity_provider(provider_from_entry(entry));
        }
        Ok(builder)
    }

    /// Load configuration from `path`, or the default location when `None`,
    /// and start from it.
    ///
    /// A missing file yields the default configuration.
    pub fn from_config_file(path: Option<&Path>) -> Result<Self, CredmgrError> {
        let config = match path {
            Some(path) => CredentialManagerConfig::load_from_path(path)?,
            None => CredentialManagerConfig::load()?,
        };
        tracing::debug!("Using {:?} storage backend", config.storage.backend);
        Self::from_config(&config)
    }

    /// Use `backend` for load and save.
    pub fn with_storage_backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Register `provider` when the manager is built.
    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Create the manager, load its credentials and register providers in
    /// the order they were added.
    pub async fn build(self) -> Result<CredentialManager, ManagerError> {
        let backend: Arc<dyn StorageBackend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(MemoryBackend::new()),
        };
        let manager = CredentialManager::new(backend).await?;
        for provider in self.providers {
            manager.register_identity_provider(provider)?;
        }
        Ok(manager)
    }
}
