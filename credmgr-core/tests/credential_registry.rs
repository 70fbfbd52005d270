//! Integration tests for the credential registry.
//!
//! These tests verify end-to-end behavior through the public API:
//! - Provider registration and case-insensitive lookup
//! - Credential insertion and enrichment
//! - Backend filtering semantics
//! - Load/save lifecycle across backend instances

use std::sync::Arc;

use async_trait::async_trait;
use credmgr_core::{
    Credential, CredentialManager, CredentialManagerBuilder, DefaultOAuth2IdentityProvider,
    EnrichmentError, GenericCredential, IdentityProvider, JsonFileBackend, ManagerError,
    ManagerLink, MemoryBackend, OAuth2Credential, OAuth2Filter, OAuth2IdentityProvider,
    OAuth2ProviderConfig, OAuth2StorageBackend, StorageBackend,
};
use tempfile::TempDir;

/// Provider that resolves every token to the same user.
struct SingleUserProvider {
    link: ManagerLink,
}

impl IdentityProvider for SingleUserProvider {
    fn provider_name(&self) -> &str {
        "default"
    }

    fn provider_type(&self) -> &str {
        "oauth2"
    }

    fn manager_link(&self) -> &ManagerLink {
        &self.link
    }

    fn as_oauth2(&self) -> Option<&dyn OAuth2IdentityProvider> {
        Some(self)
    }

    fn into_oauth2(self: Arc<Self>) -> Option<Arc<dyn OAuth2IdentityProvider>> {
        Some(self)
    }
}

#[async_trait]
impl OAuth2IdentityProvider for SingleUserProvider {
    async fn get_additional_credential_information(
        &self,
        credential: &OAuth2Credential,
    ) -> Result<Option<OAuth2Credential>, EnrichmentError> {
        Ok(Some(
            credential.clone().with_user_id("u1").with_user_name("someone"),
        ))
    }
}

/// Helper to create a manager over a fresh memory backend.
async fn test_manager() -> CredentialManager {
    CredentialManagerBuilder::new().build().await.unwrap()
}

fn default_provider(name: &str) -> Arc<dyn IdentityProvider> {
    Arc::new(DefaultOAuth2IdentityProvider::new(
        OAuth2ProviderConfig::new(name),
    ))
}

fn oauth(provider: &str, user_id: &str, scopes: &[&str]) -> OAuth2Credential {
    OAuth2Credential::new(provider, format!("token-{}-{}", provider, user_id))
        .unwrap()
        .with_user_id(user_id)
        .with_scopes(scopes.iter().copied())
}

#[tokio::test]
async fn test_case_variant_registration_keeps_one_provider() {
    let manager = test_manager().await;

    manager
        .register_identity_provider(default_provider("Twitch"))
        .unwrap();
    let result = manager.register_identity_provider(default_provider("twitch"));

    assert!(
        matches!(result, Err(ManagerError::DuplicateProvider { .. })),
        "Second registration should be rejected"
    );
    assert_eq!(manager.identity_providers().len(), 1);
    assert_eq!(
        manager
            .get_identity_provider_by_name("TWITCH")
            .unwrap()
            .provider_name(),
        "Twitch"
    );
}

#[tokio::test]
async fn test_lookup_is_case_insensitive() {
    let manager = test_manager().await;
    manager
        .register_identity_provider(default_provider("DEFAULT"))
        .unwrap();

    let upper = manager.get_identity_provider_by_name("DEFAULT").unwrap();
    let lower = manager.get_identity_provider_by_name("default").unwrap();

    assert!(Arc::ptr_eq(&upper, &lower));
}

#[tokio::test]
async fn test_save_credential() {
    let manager = test_manager().await;
    manager
        .register_identity_provider(default_provider("default"))
        .unwrap();

    let credential = OAuth2Credential::new("default", "tokenHere").unwrap();
    manager
        .add_credential("default", credential.into())
        .await
        .unwrap();

    assert_eq!(manager.credentials().await.len(), 1, "Credential wasn't added!");
}

#[tokio::test]
async fn test_enriched_credential_is_stored() {
    let manager = test_manager().await;
    manager
        .register_identity_provider(Arc::new(SingleUserProvider {
            link: ManagerLink::new(),
        }))
        .unwrap();

    let original = OAuth2Credential::new("default", "tokenHere").unwrap();
    manager
        .add_credential("default", original.clone().into())
        .await
        .unwrap();

    let found = manager.get_oauth2_credential_by_user_id("u1").await.unwrap();
    assert_ne!(found, original);
    assert_eq!(found.user_name.as_deref(), Some("someone"));
}

#[tokio::test]
async fn test_unregistered_provider_fails() {
    let manager = test_manager().await;
    let credential = OAuth2Credential::new("ghost", "tokenHere").unwrap();

    let result = manager.add_credential("ghost", credential.into()).await;

    assert!(matches!(result, Err(ManagerError::ProviderNotFound { .. })));
    assert!(manager.credentials().await.is_empty());
}

#[tokio::test]
async fn test_filter_wildcards() {
    let backend = MemoryBackend::new();
    let first = oauth("a", "1", &[]);
    let second = oauth("a", "2", &[]);
    backend
        .save_oauth2_credentials(&[first.clone(), second])
        .await
        .unwrap();

    let both = backend.filter(Some("a"), None).await.unwrap();
    assert_eq!(both.len(), 2);

    let only_first = backend.filter(Some("a"), Some("1")).await.unwrap();
    assert_eq!(only_first, vec![Credential::from(first)]);
}

#[tokio::test]
async fn test_scope_containment() {
    let backend = MemoryBackend::new();
    let wide = oauth("a", "1", &["read", "write"]);
    let narrow = oauth("a", "2", &["read"]);
    backend
        .save_oauth2_credentials(&[wide.clone(), narrow.clone()])
        .await
        .unwrap();

    let read = backend
        .filter_oauth2(&OAuth2Filter::new().with_scopes(["read"]))
        .await
        .unwrap();
    assert_eq!(read, vec![wide.clone(), narrow]);

    let read_write = backend
        .filter_oauth2(&OAuth2Filter::new().with_scopes(["read", "write"]))
        .await
        .unwrap();
    assert_eq!(read_write, vec![wide]);
}

#[tokio::test]
async fn test_json_file_roundtrip_across_instances() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("credentials.json");

    let expected = {
        let manager = CredentialManagerBuilder::new()
            .with_storage_backend(Arc::new(JsonFileBackend::new(&path)))
            .with_identity_provider(default_provider("a"))
            .build()
            .await
            .unwrap();

        manager
            .add_credential("a", oauth("a", "1", &["read"]).into())
            .await
            .unwrap();
        manager
            .add_credential("irc", GenericCredential::new("irc").with_field("nick", "bot").into())
            .await
            .unwrap();
        manager
            .add_credential("A", oauth("a", "2", &[]).into())
            .await
            .unwrap();
        manager.save().await.unwrap();
        manager.credentials().await
    };

    let reopened = CredentialManager::new(Arc::new(JsonFileBackend::new(&path)))
        .await
        .unwrap();

    assert_eq!(reopened.credentials().await, expected);
}

#[tokio::test]
async fn test_backend_filter_ignores_unsaved_adds() {
    let backend = Arc::new(MemoryBackend::new());
    let manager = CredentialManagerBuilder::new()
        .with_storage_backend(backend.clone())
        .with_identity_provider(default_provider("a"))
        .build()
        .await
        .unwrap();

    manager
        .add_credential("a", oauth("a", "1", &[]).into())
        .await
        .unwrap();

    assert!(backend.filter(Some("a"), None).await.unwrap().is_empty());
    assert!(manager.get_oauth2_credential_by_user_id("1").await.is_some());

    manager.load().await.unwrap();
    assert!(manager.get_oauth2_credential_by_user_id("1").await.is_none());
}
