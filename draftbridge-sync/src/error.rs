//! Error types for the sync engine.

use draftbridge_types::{CompanyId, Provider};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No valid token and no way to obtain one. Hard stop for this
    /// (company, provider) pair; never retried automatically.
    #[error("no valid credential for company {company} on provider {provider}")]
    CredentialUnavailable {
        company: CompanyId,
        provider: Provider,
    },

    /// Network-level failure on a provider call.
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider call exceeded its bounded timeout.
    #[error("operation timed out")]
    Timeout,

    /// Required content markings failed verification.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// Persistence error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Canonical content could not be parsed or has the wrong shape.
    #[error("malformed content: {0}")]
    Content(String),

    /// No adapter registered for the provider.
    #[error("no adapter registered for provider {0}")]
    AdapterUnregistered(Provider),

    /// No active mirror exists for the (document, provider) pair.
    #[error("no active mirror for this document and provider")]
    MirrorNotFound,

    /// The (document, provider) pair already has an active mirror.
    #[error("document is already linked to this provider")]
    AlreadyLinked,

    /// Referenced document does not exist.
    #[error("document not found")]
    DocumentNotFound,

    /// Referenced conflict does not exist.
    #[error("conflict not found")]
    ConflictNotFound,

    /// The conflict has already been resolved; resolutions are immutable.
    #[error("conflict is already resolved")]
    AlreadyResolved,
}

impl SyncError {
    /// True for failures the external trigger may retry on its own
    /// schedule. Credential and integrity failures require operator
    /// action and are never retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Timeout)
    }
}

impl From<draftbridge_types::Error> for SyncError {
    fn from(err: draftbridge_types::Error) -> Self {
        match err {
            draftbridge_types::Error::Serialization(e) => SyncError::Serialization(e),
            other => SyncError::Content(other.to_string()),
        }
    }
}
