//! Identity providers.
//!
//! This module provides:
//! - [`IdentityProvider`] - A named, typed external authority
//! - [`OAuth2IdentityProvider`] - Opt-in capability to enrich OAuth2 credentials
//! - [`ManagerLink`] - Non-owning back-reference to the owning manager
//! - [`StaticIdentityProvider`] - Provider without OAuth2 support
//! - [`DefaultOAuth2IdentityProvider`] - OAuth2 provider that resolves the token
//!   owner from a userinfo endpoint (with the `oauth` feature)
//!
//! Providers are shared as `Arc<dyn IdentityProvider>`. Capability checks go
//! through [`IdentityProvider::as_oauth2`] instead of downcasting.

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::ProviderEntry;
use crate::credential::OAuth2Credential;
use crate::manager::{CredentialManager, ManagerShared};

/// Type discriminator for OAuth2-capable providers.
pub const OAUTH2_PROVIDER_TYPE: &str = "oauth2";

/// Error raised by a provider's enrichment hook.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// The upstream request failed.
    #[error("userinfo request failed: {message}")]
    Request { message: String },

    /// The upstream response could not be interpreted.
    #[error("invalid userinfo response: {message}")]
    InvalidResponse { message: String },

    /// Provider-specific failure.
    #[error("{message}")]
    Other { message: String },
}

/// Non-owning handle from a provider back to the manager it is registered in.
///
/// Bound exactly once, at registration. Holding a link never keeps the
/// manager alive.
#[derive(Default)]
pub struct ManagerLink {
    manager: OnceLock<Weak<ManagerShared>>,
}

impl ManagerLink {
    /// Create an unbound link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to a manager. Returns `false` if already bound.
    pub(crate) fn bind(&self, shared: &Arc<ManagerShared>) -> bool {
        self.manager.set(Arc::downgrade(shared)).is_ok()
    }

    /// Whether the provider has been registered.
    pub fn is_bound(&self) -> bool {
        self.manager.get().is_some()
    }

    /// The owning manager, if registered and still alive.
    pub fn manager(&self) -> Option<CredentialManager> {
        self.manager
            .get()
            .and_then(Weak::upgrade)
            .map(CredentialManager::from_shared)
    }
}

impl std::fmt::Debug for ManagerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerLink")
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// A named, typed external authority.
///
/// Names are unique per manager and compared case-insensitively.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Unique provider name.
    fn provider_name(&self) -> &str;

    /// Type discriminator, e.g. `"oauth2"`.
    fn provider_type(&self) -> &str;

    /// Back-reference set by the manager at registration.
    fn manager_link(&self) -> &ManagerLink;

    /// Borrow the OAuth2 capability, if this provider supports it.
    fn as_oauth2(&self) -> Option<&dyn OAuth2IdentityProvider> {
        None
    }

    /// Convert into a shared OAuth2 handle, if this provider supports it.
    fn into_oauth2(self: Arc<Self>) -> Option<Arc<dyn OAuth2IdentityProvider>> {
        None
    }
}

/// Capability to enrich OAuth2 credentials at insertion time.
#[async_trait]
pub trait OAuth2IdentityProvider: IdentityProvider {
    /// Return an enriched replacement for `credential`, or `None` to keep it
    /// as-is.
    ///
    /// Typically resolves the user owning the access token.
    ///
    /// The manager holds its working-set lock while this runs. Through the
    /// [`ManagerLink`] a hook may look up providers, but must not call
    /// manager methods that touch credentials (`credentials`,
    /// `get_oauth2_credential_by_user_id`, `add_credential`, `load`, `save`):
    /// they wait on that lock and never complete.
    async fn get_additional_credential_information(
        &self,
        credential: &OAuth2Credential,
    ) -> Result<Option<OAuth2Credential>, EnrichmentError>;
}

/// Provider without OAuth2 support.
#[derive(Debug)]
pub struct StaticIdentityProvider {
    name: String,
    provider_type: String,
    link: ManagerLink,
}

impl StaticIdentityProvider {
    pub fn new(name: impl Into<String>, provider_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_type: provider_type.into(),
            link: ManagerLink::new(),
        }
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> &str {
        &self.provider_type
    }

    fn manager_link(&self) -> &ManagerLink {
        &self.link
    }
}

/// Configuration for an OAuth2 identity provider.
///
/// # Example
///
/// ```
/// use credmgr_core::provider::OAuth2ProviderConfig;
///
/// let twitch = OAuth2ProviderConfig::new("twitch")
///     .with_user_info_url("https://id.twitch.tv/oauth2/userinfo".parse().unwrap());
/// assert_eq!(twitch.name, "twitch");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth2ProviderConfig {
    /// Unique provider name (e.g., "twitch", "github").
    pub name: String,

    /// Endpoint returning the identity of the access token's owner.
    pub user_info_url: Option<Url>,
}

impl OAuth2ProviderConfig {
    /// Create a configuration without a userinfo endpoint.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user_info_url: None,
        }
    }

    /// Set the userinfo endpoint.
    pub fn with_user_info_url(mut self, url: Url) -> Self {
        self.user_info_url = Some(url);
        self
    }
}

/// OAuth2 provider that resolves the owner of an access token.
///
/// Without a userinfo endpoint, enrichment keeps credentials unchanged. With
/// one, the endpoint is called with the access token as a bearer token and
/// the response's subject and login fill `user_id` and `user_name`.
pub struct DefaultOAuth2IdentityProvider {
    config: OAuth2ProviderConfig,
    link: ManagerLink,
    #[cfg(feature = "oauth")]
    http_client: reqwest::Client,
}

impl DefaultOAuth2IdentityProvider {
    pub fn new(config: OAuth2ProviderConfig) -> Self {
        Self {
            config,
            link: ManagerLink::new(),
            #[cfg(feature = "oauth")]
            http_client: reqwest::Client::new(),
        }
    }

    /// Provider configuration.
    pub fn config(&self) -> &OAuth2ProviderConfig {
        &self.config
    }

    #[cfg(feature = "oauth")]
    async fn fetch_user_info(
        &self,
        url: &Url,
        credential: &OAuth2Credential,
    ) -> Result<OAuth2Credential, EnrichmentError> {
        let response = self
            .http_client
            .get(url.clone())
            .bearer_auth(credential.access_token.expose())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| EnrichmentError::Request {
                message: e.to_string(),
            })?;

        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| EnrichmentError::InvalidResponse {
                    message: e.to_string(),
                })?;

        let identity = UserIdentity::from_json(&body).ok_or_else(|| {
            EnrichmentError::InvalidResponse {
                message: "response has no user identifier".to_string(),
            }
        })?;

        let mut enriched = credential.clone().with_user_id(identity.user_id);
        if let Some(user_name) = identity.user_name {
            enriched = enriched.with_user_name(user_name);
        }
        Ok(enriched)
    }
}

impl std::fmt::Debug for DefaultOAuth2IdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultOAuth2IdentityProvider")
            .field("config", &self.config)
            .field("link", &self.link)
            .finish()
    }
}

impl IdentityProvider for DefaultOAuth2IdentityProvider {
    fn provider_name(&self) -> &str {
        &self.config.name
    }

    fn provider_type(&self) -> &str {
        OAUTH2_PROVIDER_TYPE
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
impl OAuth2IdentityProvider for DefaultOAuth2IdentityProvider {
    #[cfg(feature = "oauth")]
    async fn get_additional_credential_information(
        &self,
        credential: &OAuth2Credential,
    ) -> Result<Option<OAuth2Credential>, EnrichmentError> {
        match &self.config.user_info_url {
            Some(url) => {
                let enriched = self.fetch_user_info(url, credential).await?;
                tracing::debug!(
                    "Resolved user {:?} for {} credential",
                    enriched.user_id,
                    self.config.name
                );
                Ok(Some(enriched))
            }
            None => Ok(None),
        }
    }

    #[cfg(not(feature = "oauth"))]
    async fn get_additional_credential_information(
        &self,
        _credential: &OAuth2Credential,
    ) -> Result<Option<OAuth2Credential>, EnrichmentError> {
        match &self.config.user_info_url {
            Some(_) => Err(EnrichmentError::Other {
                message: format!(
                    "OAuth feature not enabled, cannot query userinfo for {}",
                    self.config.name
                ),
            }),
            None => Ok(None),
        }
    }
}

/// Identity extracted from a userinfo response.
#[cfg_attr(not(feature = "oauth"), allow(dead_code))]
#[derive(Debug, PartialEq, Eq)]
struct UserIdentity {
    user_id: String,
    user_name: Option<String>,
}

#[cfg_attr(not(feature = "oauth"), allow(dead_code))]
impl UserIdentity {
    const ID_FIELDS: [&'static str; 3] = ["sub", "id", "user_id"];
    const NAME_FIELDS: [&'static str; 4] = ["preferred_username", "login", "name", "email"];

    /// Read an OIDC-style object, or the first entry of a `data` array.
    fn from_json(body: &serde_json::Value) -> Option<Self> {
        let object = match body.get("data").and_then(|d| d.as_array()) {
            Some(entries) => entries.first()?,
            None => body,
        };

        let field = |names: &[&str]| {
            names.iter().find_map(|name| match object.get(*name)? {
                serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
        };

        Some(Self {
            user_id: field(&Self::ID_FIELDS)?,
            user_name: field(&Self::NAME_FIELDS),
        })
    }
}

/// Build a provider from a configuration entry.
///
/// Entries of type `"oauth2"` become [`DefaultOAuth2IdentityProvider`]s; any
/// other type becomes a [`StaticIdentityProvider`].
pub fn provider_from_entry(entry: &ProviderEntry) -> Arc<dyn IdentityProvider> {
    if entry.provider_type == OAUTH2_PROVIDER_TYPE {
        let mut config = OAuth2ProviderConfig::new(&entry.name);
        if let Some(url) = &entry.user_info_url {
            config = config.with_user_info_url(url.clone());
        }
        Arc::new(DefaultOAuth2IdentityProvider::new(config))
    } else {
        Arc::new(StaticIdentityProvider::new(&entry.name, &entry.provider_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_provider_has_no_oauth2_capability() {
        let provider: Arc<dyn IdentityProvider> = Arc::new(StaticIdentityProvider::new("irc", "static"));
        assert!(provider.as_oauth2().is_none());
        assert!(provider.into_oauth2().is_none());
    }

    #[test]
    fn test_default_provider_has_oauth2_capability() {
        let provider: Arc<dyn IdentityProvider> =
            Arc::new(DefaultOAuth2IdentityProvider::new(OAuth2ProviderConfig::new("twitch")));
        assert_eq!(provider.provider_type(), OAUTH2_PROVIDER_TYPE);
        assert!(provider.as_oauth2().is_some());

        let oauth2 = provider.into_oauth2().unwrap();
        assert_eq!(oauth2.provider_name(), "twitch");
    }

    #[test]
    fn test_unbound_link() {
        let provider = StaticIdentityProvider::new("irc", "static");
        assert!(!provider.manager_link().is_bound());
        assert!(provider.manager_link().manager().is_none());
    }

    #[tokio::test]
    async fn test_enrichment_without_user_info_keeps_credential() {
        let provider = DefaultOAuth2IdentityProvider::new(OAuth2ProviderConfig::new("twitch"));
        let credential = OAuth2Credential::new("twitch", "token").unwrap();

        let result = provider
            .get_additional_credential_information(&credential)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_user_identity_from_oidc() {
        let identity = UserIdentity::from_json(&json!({
            "sub": "12345",
            "preferred_username": "streamer",
        }))
        .unwrap();
        assert_eq!(identity.user_id, "12345");
        assert_eq!(identity.user_name.as_deref(), Some("streamer"));
    }

    #[test]
    fn test_user_identity_from_data_array() {
        let identity = UserIdentity::from_json(&json!({
            "data": [{ "id": 42, "login": "octocat" }],
        }))
        .unwrap();
        assert_eq!(identity.user_id, "42");
        assert_eq!(identity.user_name.as_deref(), Some("octocat"));
    }

    #[test]
    fn test_user_identity_requires_id() {
        assert!(UserIdentity::from_json(&json!({ "login": "nobody" })).is_none());
        assert!(UserIdentity::from_json(&json!({ "data": [] })).is_none());
    }

    #[test]
    fn test_provider_from_entry() {
        let oauth = provider_from_entry(&ProviderEntry {
            name: "twitch".to_string(),
            provider_type: "oauth2".to_string(),
            user_info_url: None,
        });
        assert!(oauth.as_oauth2().is_some());

        let plain = provider_from_entry(&ProviderEntry {
            name: "irc".to_string(),
            provider_type: "static".to_string(),
            user_info_url: None,
        });
        assert!(plain.as_oauth2().is_none());
        assert_eq!(plain.provider_type(), "static");
    }
}
