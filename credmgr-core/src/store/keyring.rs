//! OS keyring-backed credential storage implementation.

use async_trait::async_trait;
use keyring::Entry;

use super::{oauth2_identity_filter, OAuth2StorageBackend, StorageBackend, StorageError};
use crate::credential::Credential;

const ENTRY_USER: &str = "credentials";

/// OS keyring-backed credential backend.
///
/// The whole credential set is serialized to JSON and kept in a single
/// entry of the platform's native keyring service:
/// - macOS: Keychain
/// - Linux: Secret Service API (via libsecret)
/// - Windows: Credential Manager
///
/// A missing entry loads as an empty set.
///
/// # Example
///
/// ```rust,ignore
/// use credmgr_core::store::{KeyringBackend, StorageBackend};
///
/// let backend = KeyringBackend::try_new("credmgr")?;
/// let credentials = backend.load_credentials().await?;
/// ```
pub struct KeyringBackend {
    service_name: String,
}

impl KeyringBackend {
    /// Try to create a new keyring backend.
    ///
    /// Returns an error if the keyring backend is not available on this platform.
    pub fn try_new(service_name: &str) -> Result<Self, StorageError> {
        let backend = Self {
            service_name: service_name.to_string(),
        };
        backend.entry()?;
        Ok(backend)
    }

    fn entry(&self) -> Result<Entry, StorageError> {
        Entry::new(&self.service_name, ENTRY_USER).map_err(|e| StorageError::Unavailable {
            message: format!("keyring backend not available: {}", e),
        })
    }
}

impl std::fmt::Debug for KeyringBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringBackend")
            .field("service_name", &self.service_name)
            .finish()
    }
}

#[async_trait]
impl StorageBackend for KeyringBackend {
    async fn load_credentials(&self) -> Result<Vec<Credential>, StorageError> {
        let entry = self.entry()?;

        match entry.get_password() {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(keyring::Error::NoEntry) => Ok(Vec::new()),
            Err(keyring::Error::PlatformFailure(e)) => Err(StorageError::Unavailable {
                message: format!("platform keyring failure: {}", e),
            }),
            Err(e) => Err(StorageError::Unavailable {
                message: format!("keyring error: {}", e),
            }),
        }
    }

    async fn save_credentials(&self, credentials: &[Credential]) -> Result<(), StorageError> {
        let contents = serde_json::to_string(credentials)?;
        self.entry()?
            .set_password(&contents)
            .map_err(|e| StorageError::Unavailable {
                message: format!("failed to write keyring entry: {}", e),
            })
    }

    async fn filter(
        &self,
        identity_provider: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Vec<Credential>, StorageError> {
        oauth2_identity_filter(self, identity_provider, user_id).await
    }
}

impl OAuth2StorageBackend for KeyringBackend {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{GenericCredential, OAuth2Credential};

    // These tests tolerate keyrings that accept writes without persisting them
    // (headless Linux, CI).

    #[test]
    fn test_keyring_backend_creation() {
        match KeyringBackend::try_new("credmgr-test") {
            Ok(backend) => assert_eq!(backend.service_name, "credmgr-test"),
            Err(StorageError::Unavailable { .. }) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    #[tokio::test]
    async fn test_keyring_backend_roundtrip() {
        let service = format!(
            "credmgr-test-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        );
        let backend = match KeyringBackend::try_new(&service) {
            Ok(b) => b,
            Err(_) => return,
        };

        let credentials: Vec<Credential> =
            vec![OAuth2Credential::new("twitch", "token").unwrap().into()];
        if backend.save_credentials(&credentials).await.is_err() {
            return;
        }

        match backend.load_credentials().await {
            Ok(loaded) if !loaded.is_empty() => assert_eq!(loaded, credentials),
            // Keyring accepted the write but did not persist it.
            _ => {}
        }

        if let Ok(entry) = backend.entry() {
            let _ = entry.delete_credential();
        }
    }

    #[tokio::test]
    async fn test_keyring_backend_filter_skips_generic() {
        let service = format!(
            "credmgr-filter-test-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        );
        let backend = match KeyringBackend::try_new(&service) {
            Ok(b) => b,
            Err(_) => return,
        };

        let oauth: Credential = OAuth2Credential::new("a", "token")
            .unwrap()
            .with_user_id("1")
            .into();
        let credentials: Vec<Credential> =
            vec![GenericCredential::new("a").with_user_id("1").into(), oauth.clone()];
        if backend.save_credentials(&credentials).await.is_err() {
            return;
        }

        if let Ok(found) = backend.filter(Some("a"), Some("1")).await {
            // Empty when the keyring did not persist the write.
            if !found.is_empty() {
                assert_eq!(found, vec![oauth]);
            }
        }

        if let Ok(entry) = backend.entry() {
            let _ = entry.delete_credential();
        }
    }
}
