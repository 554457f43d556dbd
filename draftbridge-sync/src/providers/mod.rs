//! Provider adapters.
//!
//! One adapter per external provider, translating between the provider's
//! native representation and the canonical content model. Adapters consult
//! the credential manager before every remote call and never reach the
//! network unauthenticated.

pub mod sheets;
pub mod slides;
pub mod word;

pub use sheets::{pricing_rows, PricingRow, SheetsConfig, SheetsOnlineAdapter};
pub use slides::{SlideDeckAdapter, SlidesConfig};
pub use word::{WordConfig, WordOnlineAdapter};

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use draftbridge_types::{CompanyId, DocumentContent, Provider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Remote content plus the provider-reported last-modified time.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePull {
    pub content: DocumentContent,
    pub modified_at: DateTime<Utc>,
}

/// Contract every provider adapter satisfies.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The provider this adapter talks to.
    fn provider(&self) -> Provider;

    /// Upper bound the engine applies around pull/push calls.
    fn call_timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    /// Fetches current remote content and the provider's last-modified
    /// time. Must not mutate remote state.
    async fn pull(&self, company_id: CompanyId, remote_file_id: &str) -> SyncResult<RemotePull>;

    /// Overwrites remote content with the given canonical content.
    /// Idempotent: pushing the same content twice produces the same remote
    /// state and no error.
    async fn push(
        &self,
        company_id: CompanyId,
        remote_file_id: &str,
        content: &DocumentContent,
    ) -> SyncResult<()>;

    /// Returns a human-navigable link to the remote file. Informational
    /// only; never used for sync logic.
    async fn resolve_view_url(
        &self,
        company_id: CompanyId,
        remote_file_id: &str,
    ) -> SyncResult<Option<String>>;
}

/// Adapters keyed by provider, constructed once at startup and passed by
/// reference.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter, replacing any previous one for its provider.
    #[must_use]
    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.provider(), adapter);
        self
    }

    /// Looks up the adapter for a provider.
    pub fn get(&self, provider: Provider) -> SyncResult<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(&provider)
            .cloned()
            .ok_or(SyncError::AdapterUnregistered(provider))
    }

    /// Providers with a registered adapter.
    #[must_use]
    pub fn providers(&self) -> Vec<Provider> {
        self.adapters.keys().copied().collect()
    }
}

/// Maps a reqwest failure onto the sync error taxonomy; client-side
/// timeouts collapse into [`SyncError::Timeout`].
pub(crate) fn transport_err(context: &str, err: &reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout
    } else {
        SyncError::Transport(format!("{context}: {err}"))
    }
}

/// Parses a provider-reported RFC 3339 modification time.
pub(crate) fn parse_modified(raw: &str) -> SyncResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SyncError::Transport(format!("invalid modified time {raw:?}: {e}")))
}
