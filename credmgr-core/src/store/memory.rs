//! In-memory credential storage implementation.

use async_trait::async_trait;
use std::sync::RwLock;

use super::{oauth2_identity_filter, OAuth2StorageBackend, StorageBackend, StorageError};
use crate::credential::Credential;

/// In-memory credential backend for testing and development.
///
/// This backend is not persistent; data is lost when the process exits.
///
/// # Thread Safety
///
/// This implementation uses interior mutability via `RwLock` and is
/// safe to share across threads.
pub struct MemoryBackend {
    data: RwLock<Vec<Credential>>,
}

impl MemoryBackend {
    /// Create a new empty memory backend.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Vec::new()),
        }
    }

    /// Create a memory backend with initial credentials.
    pub fn with_credentials(credentials: Vec<Credential>) -> Self {
        Self {
            data: RwLock::new(credentials),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.data.read().map(|d| d.len()).unwrap_or(0);
        f.debug_struct("MemoryBackend")
            .field("credentials_count", &count)
            .finish()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn load_credentials(&self) -> Result<Vec<Credential>, StorageError> {
        let data = self.data.read().map_err(|e| StorageError::Unavailable {
            message: format!("lock poisoned: {}", e),
        })?;
        Ok(data.clone())
    }

    async fn save_credentials(&self, credentials: &[Credential]) -> Result<(), StorageError> {
        let mut data = self.data.write().map_err(|e| StorageError::Unavailable {
            message: format!("lock poisoned: {}", e),
        })?;
        *data = credentials.to_vec();
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

impl OAuth2StorageBackend for MemoryBackend {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{GenericCredential, OAuth2Credential};
    use crate::store::OAuth2Filter;

    fn oauth(provider: &str, user_id: &str) -> Credential {
        OAuth2Credential::new(provider, format!("token-{}", user_id))
            .unwrap()
            .with_user_id(user_id)
            .into()
    }

    #[tokio::test]
    async fn test_memory_backend_save_load() {
        let backend = MemoryBackend::new();
        assert!(backend.load_credentials().await.unwrap().is_empty());

        let credentials = vec![oauth("a", "1"), oauth("b", "2")];
        backend.save_credentials(&credentials).await.unwrap();

        assert_eq!(backend.load_credentials().await.unwrap(), credentials);
    }

    #[tokio::test]
    async fn test_memory_backend_save_replaces() {
        let backend = MemoryBackend::with_credentials(vec![oauth("a", "1"), oauth("a", "2")]);

        backend.save_credentials(&[oauth("b", "3")]).await.unwrap();

        let loaded = backend.load_credentials().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].identity_provider(), "b");
    }

    #[tokio::test]
    async fn test_memory_backend_filter_wildcards() {
        let backend = MemoryBackend::with_credentials(vec![oauth("a", "1"), oauth("a", "2")]);

        let both = backend.filter(Some("a"), None).await.unwrap();
        assert_eq!(both.len(), 2);

        let first = backend.filter(Some("a"), Some("1")).await.unwrap();
        assert_eq!(first, vec![oauth("a", "1")]);

        assert!(backend.filter(Some("A"), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_backend_filter_skips_generic() {
        let backend = MemoryBackend::with_credentials(vec![
            GenericCredential::new("a").with_user_id("1").into(),
            oauth("a", "1"),
        ]);

        let found = backend.filter(Some("a"), Some("1")).await.unwrap();
        assert_eq!(found, vec![oauth("a", "1")]);
        assert_eq!(backend.load_oauth2_credentials().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_backend_filter_oauth2_by() {
        let backend = MemoryBackend::new();
        let named = OAuth2Credential::new("a", "t1")
            .unwrap()
            .with_user_name("alice")
            .with_scopes(["read", "write"]);
        let other = OAuth2Credential::new("a", "t2")
            .unwrap()
            .with_user_name("bob")
            .with_scopes(["read"]);
        backend
            .save_oauth2_credentials(&[named.clone(), other])
            .await
            .unwrap();

        let scopes = vec!["write".to_string()];
        let found = backend
            .filter_oauth2_by(Some("a"), None, None, Some(scopes.as_slice()))
            .await
            .unwrap();
        assert_eq!(found, vec![named.clone()]);

        let by_name = backend
            .filter_oauth2_by(None, None, Some("alice"), None)
            .await
            .unwrap();
        assert_eq!(by_name, vec![named]);

        let by_token = backend
            .filter_oauth2(&OAuth2Filter::new().with_access_token("t2"))
            .await
            .unwrap();
        assert_eq!(by_token.len(), 1);
        assert_eq!(by_token[0].user_name.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn test_memory_backend_get_credential_by_user_id() {
        let backend = MemoryBackend::with_credentials(vec![oauth("a", "1"), oauth("b", "1")]);

        let found = backend.get_credential_by_user_id("1").await.unwrap().unwrap();
        assert_eq!(found.identity_provider(), "a");
        assert!(backend.get_credential_by_user_id("9").await.unwrap().is_none());
    }
}
