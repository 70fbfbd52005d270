//! Top-level error types for credmgr.

use thiserror::Error;

use crate::config::ConfigError;
use crate::credential::CredentialError;
use crate::manager::ManagerError;
use crate::provider::EnrichmentError;
use crate::store::StorageError;

/// Top-level error type encompassing all credmgr errors.
#[derive(Debug, Error)]
pub enum CredmgrError {
    /// Error from registry or working-set operations.
    #[error("manager error: {0}")]
    Manager(#[from] ManagerError),

    /// Error from storage backend operations.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Error constructing a credential.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Error from a provider's enrichment hook.
    #[error("enrichment error: {0}")]
    Enrichment(#[from] EnrichmentError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
