//! The credential manager.
//!
//! [`CredentialManager`] owns the identity-provider registry and the in-memory
//! working set of credentials. Queries on the manager see the working set,
//! including unsaved adds; backend filters always see the last saved state.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use credmgr_core::{
//!     CredentialManager, MemoryBackend, OAuth2Credential,
//!     provider::{DefaultOAuth2IdentityProvider, OAuth2ProviderConfig},
//! };
//!
//! let manager = CredentialManager::new(Arc::new(MemoryBackend::new())).await?;
//! manager.register_identity_provider(Arc::new(DefaultOAuth2IdentityProvider::new(
//!     OAuth2ProviderConfig::new("twitch"),
//! )))?;
//!
//! let credential = OAuth2Credential::new("twitch", "tokenHere")?;
//! manager.add_credential("twitch", credential.into()).await?;
//! manager.save().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::credential::{Credential, OAuth2Credential};
use crate::provider::{EnrichmentError, IdentityProvider, OAuth2IdentityProvider};
use crate::store::{StorageBackend, StorageError};

/// Error type for credential manager operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// A provider with the same case-insensitive name is already registered.
    #[error("identity provider {name} was already registered")]
    DuplicateProvider { name: String },

    /// The provider instance is already registered with another manager.
    #[error("identity provider {name} is already registered with another manager")]
    ProviderAlreadyBound { name: String },

    /// No provider is registered under the name.
    #[error("no identity provider found named {name}")]
    ProviderNotFound { name: String },

    /// The provider cannot enrich OAuth2 credentials.
    #[error("credential is an OAuth2 credential, but provider {name} does not support OAuth2")]
    UnsupportedProvider { name: String },

    /// The provider does not implement the requested capability.
    #[error("identity provider {name} of type {provider_type} is not an OAuth2 provider")]
    TypeMismatch { name: String, provider_type: String },

    /// The provider's enrichment hook failed.
    #[error("enrichment by {provider} failed: {source}")]
    EnrichmentFailed {
        provider: String,
        #[source]
        source: EnrichmentError,
    },

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub(crate) struct ManagerShared {
    backend: Arc<dyn StorageBackend>,
    providers: RwLock<HashMap<String, Arc<dyn IdentityProvider>>>,
    credentials: Mutex<Vec<Credential>>,
}

/// Registry of identity providers and working set of credentials.
///
/// Cloning yields another handle to the same manager.
///
/// # Thread Safety
///
/// Provider registration runs under a single write lock, so the
/// duplicate check and insert are atomic. `load`, `save` and
/// `add_credential` hold the working-set lock for their whole duration,
/// including the enrichment call.
#[derive(Clone)]
pub struct CredentialManager {
    shared: Arc<ManagerShared>,
}

impl CredentialManager {
    /// Create a manager over `backend` and load its credentials.
    pub async fn new(backend: Arc<dyn StorageBackend>) -> Result<Self, ManagerError> {
        let manager = Self {
            shared: Arc::new(ManagerShared {
                backend,
                providers: RwLock::new(HashMap::new()),
                credentials: Mutex::new(Vec::new()),
            }),
        };
        manager.load().await?;
        Ok(manager)
    }

    pub(crate) fn from_shared(shared: Arc<ManagerShared>) -> Self {
        Self { shared }
    }

    /// The storage backend this manager loads from and saves to.
    pub fn storage_backend(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.shared.backend)
    }

    /// Register an identity provider.
    ///
    /// Fails if a provider with the same name (ignoring case) is already
    /// registered, or if `provider` already belongs to another manager. The
    /// registry is unchanged on failure.
    pub fn register_identity_provider(
        &self,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<(), ManagerError> {
        let name = provider.provider_name().to_string();
        tracing::debug!(
            "Trying to register identity provider {} [type: {}]",
            name,
            provider.provider_type()
        );

        let mut providers = self.shared.providers.write();
        let key = name.to_lowercase();
        if providers.contains_key(&key) {
            return Err(ManagerError::DuplicateProvider { name });
        }
        if !provider.manager_link().bind(&self.shared) {
            return Err(ManagerError::ProviderAlreadyBound { name });
        }
        providers.insert(key, provider);

        tracing::debug!(
            "Registered identity provider {}, {} registered in total",
            name,
            providers.len()
        );
        Ok(())
    }

    /// Look up a provider by name, ignoring case.
    pub fn get_identity_provider_by_name(&self, name: &str) -> Option<Arc<dyn IdentityProvider>> {
        self.shared.providers.read().get(&name.to_lowercase()).cloned()
    }

    /// Look up an OAuth2-capable provider by name, ignoring case.
    ///
    /// Returns `Ok(None)` if no provider is registered under `name`, and
    /// [`ManagerError::TypeMismatch`] if the provider does not support OAuth2.
    pub fn get_oauth2_identity_provider_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Arc<dyn OAuth2IdentityProvider>>, ManagerError> {
        let Some(provider) = self.get_identity_provider_by_name(name) else {
            return Ok(None);
        };

        let provider_name = provider.provider_name().to_string();
        let provider_type = provider.provider_type().to_string();
        provider
            .into_oauth2()
            .map(Some)
            .ok_or(ManagerError::TypeMismatch {
                name: provider_name,
                provider_type,
            })
    }

    /// All registered providers, in no particular order.
    pub fn identity_providers(&self) -> Vec<Arc<dyn IdentityProvider>> {
        self.shared.providers.read().values().cloned().collect()
    }

    /// Add a credential to the working set.
    ///
    /// OAuth2 credentials are first passed to the provider named
    /// `provider_name`, which may replace them with an enriched copy. Other
    /// credentials are appended unchanged. On error the working set is left
    /// untouched.
    ///
    /// The working-set lock is held during enrichment; see
    /// [`OAuth2IdentityProvider::get_additional_credential_information`] for
    /// what a hook may call back into.
    pub async fn add_credential(
        &self,
        provider_name: &str,
        credential: Credential,
    ) -> Result<(), ManagerError> {
        let mut credentials = self.shared.credentials.lock().await;

        let credential = match credential {
            Credential::OAuth2(oauth) => Credential::OAuth2(self.enrich(provider_name, oauth).await?),
            other => other,
        };

        credentials.push(credential);
        tracing::debug!(
            "Added credential for {}, working set holds {}",
            provider_name,
            credentials.len()
        );
        Ok(())
    }

    async fn enrich(
        &self,
        provider_name: &str,
        credential: OAuth2Credential,
    ) -> Result<OAuth2Credential, ManagerError> {
        let provider = self
            .get_identity_provider_by_name(provider_name)
            .ok_or_else(|| ManagerError::ProviderNotFound {
                name: provider_name.to_string(),
            })?;
        let oauth2 = provider
            .as_oauth2()
            .ok_or_else(|| ManagerError::UnsupportedProvider {
                name: provider_name.to_string(),
            })?;

        let enriched = oauth2
            .get_additional_credential_information(&credential)
            .await
            .map_err(|source| ManagerError::EnrichmentFailed {
                provider: provider_name.to_string(),
                source,
            })?;

        Ok(enriched.unwrap_or(credential))
    }

    /// First OAuth2 credential in the working set whose user id matches,
    /// ignoring case.
    pub async fn get_oauth2_credential_by_user_id(&self, user_id: &str) -> Option<OAuth2Credential> {
        let wanted = user_id.to_lowercase();
        self.shared
            .credentials
            .lock()
            .await
            .iter()
            .filter_map(Credential::as_oauth2)
            .find(|c| c.user_id.as_deref().map(str::to_lowercase).as_deref() == Some(wanted.as_str()))
            .cloned()
    }

    /// Snapshot of the working set, in insertion order.
    pub async fn credentials(&self) -> Vec<Credential> {
        self.shared.credentials.lock().await.clone()
    }

    /// Replace the working set with the backend's contents.
    ///
    /// Unsaved changes are discarded.
    pub async fn load(&self) -> Result<(), ManagerError> {
        let mut credentials = self.shared.credentials.lock().await;
        *credentials = self.shared.backend.load_credentials().await?;
        tracing::debug!("Loaded {} credentials from storage", credentials.len());
        Ok(())
    }

    /// Write the working set to the backend, replacing its contents.
    pub async fn save(&self) -> Result<(), ManagerError> {
        let credentials = self.shared.credentials.lock().await;
        self.shared.backend.save_credentials(&credentials).await?;
        tracing::debug!("Saved {} credentials to storage", credentials.len());
        Ok(())
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<String> = self.shared.providers.read().keys().cloned().collect();
        providers.sort();
        f.debug_struct("CredentialManager")
            .field("providers", &providers)
            .finish_non_exhaustive()
    }
}
