//! # credmgr Core
//!
//! Credential registry for applications that hold user credentials for
//! several third-party identity providers.
//!
//! This crate provides:
//! - Credential types, with an OAuth2 specialization
//! - A registry of identity providers that can enrich OAuth2 credentials
//!   when they are added
//! - Traits for storage backends, with default filtering by provider, user,
//!   token value and granted scopes
//! - In-memory, JSON file and (optionally) keyring-based backends
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use credmgr_core::{CredentialManagerBuilder, CredentialManagerConfig, OAuth2Credential};
//!
//! let config = CredentialManagerConfig::load()?;
//! let manager = CredentialManagerBuilder::from_config(&config)?.build().await?;
//!
//! let credential = OAuth2Credential::new("twitch", access_token)?;
//! manager.add_credential("twitch", credential.into()).await?;
//! manager.save().await?;
//!
//! let owner = manager.get_oauth2_credential_by_user_id("12345").await;
//! ```

pub mod builder;
pub mod config;
pub mod credential;
pub mod error;
pub mod manager;
pub mod provider;
pub mod store;

// Re-export commonly used types at crate root
pub use builder::CredentialManagerBuilder;

pub use config::{
    BackendKind,
    ConfigError,
    CredentialManagerConfig,
    ProviderEntry,
    StorageConfig,
};

pub use credential::{
    Credential,
    CredentialError,
    GenericCredential,
    OAuth2Credential,
};

pub use error::CredmgrError;

pub use manager::{
    CredentialManager,
    ManagerError,
};

pub use provider::{
    DefaultOAuth2IdentityProvider,
    EnrichmentError,
    IdentityProvider,
    ManagerLink,
    OAuth2IdentityProvider,
    OAuth2ProviderConfig,
    StaticIdentityProvider,
};

pub use store::{
    create_backend,
    JsonFileBackend,
    MemoryBackend,
    OAuth2Filter,
    OAuth2StorageBackend,
    Secret,
    StorageBackend,
    StorageError,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringBackend;
