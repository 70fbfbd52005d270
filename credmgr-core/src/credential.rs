//! Credential domain types.
//!
//! This module defines the data held by the registry:
//! - [`Credential`] - Closed set of credential kinds stored by a backend
//! - [`GenericCredential`] - Provider-defined credential without OAuth2 semantics
//! - [`OAuth2Credential`] - OAuth2 token set with the owning user's identity
//!
//! Credentials are plain values. The only invariant enforced here is that an
//! [`OAuth2Credential`] always carries a non-empty access token.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::store::Secret;

/// Error constructing a credential.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// OAuth2 credentials require an access token.
    #[error("access token must not be empty")]
    EmptyAccessToken,
}

/// A stored authentication artifact tied to one identity provider.
///
/// Serialized with a `kind` tag so durable backends can round-trip both
/// variants through a single sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credential {
    /// A credential with provider-specific fields only.
    Generic(GenericCredential),

    /// An OAuth2 token set.
    #[serde(rename = "oauth2")]
    OAuth2(OAuth2Credential),
}

impl Credential {
    /// Name of the identity provider that owns this credential.
    pub fn identity_provider(&self) -> &str {
        match self {
            Self::Generic(c) => &c.identity_provider,
            Self::OAuth2(c) => &c.identity_provider,
        }
    }

    /// User the credential belongs to, if known.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Generic(c) => c.user_id.as_deref(),
            Self::OAuth2(c) => c.user_id.as_deref(),
        }
    }

    /// Exact provider and user id match. `None` accepts any value.
    pub fn matches_identity(&self, identity_provider: Option<&str>, user_id: Option<&str>) -> bool {
        identity_provider.is_none_or(|p| self.identity_provider() == p)
            && user_id.is_none_or(|u| self.user_id() == Some(u))
    }

    /// Borrow the OAuth2 view of this credential, if it is one.
    pub fn as_oauth2(&self) -> Option<&OAuth2Credential> {
        match self {
            Self::OAuth2(c) => Some(c),
            Self::Generic(_) => None,
        }
    }

    /// Convert into the OAuth2 variant, if it is one.
    pub fn into_oauth2(self) -> Option<OAuth2Credential> {
        match self {
            Self::OAuth2(c) => Some(c),
            Self::Generic(_) => None,
        }
    }

    /// Whether this is an OAuth2 credential.
    pub fn is_oauth2(&self) -> bool {
        matches!(self, Self::OAuth2(_))
    }
}

impl From<OAuth2Credential> for Credential {
    fn from(credential: OAuth2Credential) -> Self {
        Self::OAuth2(credential)
    }
}

impl From<GenericCredential> for Credential {
    fn from(credential: GenericCredential) -> Self {
        Self::Generic(credential)
    }
}

/// Credential carrying provider-defined fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericCredential {
    /// Provider that issued this credential.
    pub identity_provider: String,

    /// Owning user, if known.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Provider-specific payload.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl GenericCredential {
    /// Create an empty credential for a provider.
    pub fn new(identity_provider: impl Into<String>) -> Self {
        Self {
            identity_provider: identity_provider.into(),
            user_id: None,
            fields: Map::new(),
        }
    }

    /// Set the owning user.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Add a provider-specific field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// An OAuth2 token set held on behalf of one user.
///
/// `user_id` and `user_name` are typically unset until an identity provider
/// enriches the credential at insertion time.
///
/// # Examples
///
/// ```
/// use credmgr_core::OAuth2Credential;
///
/// let credential = OAuth2Credential::new("twitch", "tokenHere")
///     .unwrap()
///     .with_scopes(["chat:read", "chat:edit"]);
/// assert!(credential.has_scopes(&["chat:read"]));
/// assert!(OAuth2Credential::new("twitch", "").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth2Credential {
    /// Provider that issued the token.
    pub identity_provider: String,

    /// Access token. Never empty.
    #[serde(deserialize_with = "non_empty_secret")]
    pub access_token: Secret,

    /// Refresh token, when the provider issued one.
    #[serde(default)]
    pub refresh_token: Option<Secret>,

    /// Provider-side user identifier.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Provider-side login or display name.
    #[serde(default)]
    pub user_name: Option<String>,

    /// Granted scopes.
    #[serde(default)]
    pub scopes: BTreeSet<String>,

    /// Lifetime of the access token in seconds, as reported by the provider.
    #[serde(default)]
    pub expires_in: Option<i64>,

    /// When the token was obtained, if the issuer recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,

    /// Arbitrary provider-defined values.
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl OAuth2Credential {
    /// Create a credential with just an access token.
    ///
    /// Fails if `access_token` is empty.
    pub fn new(
        identity_provider: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, CredentialError> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(CredentialError::EmptyAccessToken);
        }

        Ok(Self {
            identity_provider: identity_provider.into(),
            access_token: Secret::new(access_token),
            refresh_token: None,
            user_id: None,
            user_name: None,
            scopes: BTreeSet::new(),
            expires_in: None,
            received_at: None,
            context: Map::new(),
        })
    }

    /// Set the refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(Secret::new(refresh_token));
        self
    }

    /// Set the owning user's id.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the owning user's name.
    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    /// Replace the granted scopes.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the reported token lifetime.
    pub fn with_expires_in(mut self, seconds: i64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    /// Record when the token was obtained.
    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    /// Add a provider-defined context value.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Whether every requested scope was granted.
    pub fn has_scopes<S: AsRef<str>>(&self, requested: &[S]) -> bool {
        requested.iter().all(|s| self.scopes.contains(s.as_ref()))
    }
}

fn non_empty_secret<'de, D>(deserializer: D) -> Result<Secret, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    if value.is_empty() {
        return Err(serde::de::Error::custom(CredentialError::EmptyAccessToken));
    }
    Ok(Secret::new(value))
}
