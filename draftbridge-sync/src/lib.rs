//! Document synchronization engine for Draftbridge.
//!
//! Keeps locally authored proposal content consistent with mirrored copies
//! on external document-editing providers (word processor, slide deck,
//! spreadsheet) across unreliable networks, expiring credentials, and
//! concurrent edits on both sides.
//!
//! # Architecture
//!
//! - **Providers**: one adapter per external provider, translating between
//!   the provider's native shape and the canonical content model
//! - **Credentials**: per-company, per-provider tokens, refreshed
//!   transparently before each adapter call
//! - **State**: durable mirror/conflict/version records with transactional
//!   timestamp updates
//! - **Engine**: the reconciliation state machine (pull → compare →
//!   synced | conflict)
//! - **Diff / Resolver**: the conflict view and the keep-local /
//!   keep-remote / merge resolution protocol
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use draftbridge_sync::providers::{AdapterRegistry, SheetsConfig, SheetsOnlineAdapter};
//! use draftbridge_sync::{CredentialManager, MirrorStore, SyncEngine};
//!
//! let credentials = Arc::new(CredentialManager::new(HashMap::new()));
//! let adapters = AdapterRegistry::new().with(Arc::new(SheetsOnlineAdapter::new(
//!     SheetsConfig::default(),
//!     credentials.clone(),
//! )));
//! let store = Arc::new(MirrorStore::open_in_memory().unwrap());
//! let engine = SyncEngine::new(store, Arc::new(adapters));
//! # let _ = engine;
//! ```

pub mod credentials;
pub mod diff;
mod engine;
mod error;
pub mod integrity;
pub mod providers;
pub mod resolver;
pub mod state;

pub use credentials::{CredentialManager, OAuthEndpoint, StoredCredential};
pub use diff::{
    compute_diff, compute_section_diff, summarize, DiffKind, DiffLine, DiffSummary, SectionDiff,
};
pub use engine::{ReconcileOutcome, SweepReport, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use integrity::{IntegrityChecker, MarkingChecker, SENSITIVITY_MARKERS};
pub use providers::{AdapterRegistry, ProviderAdapter, RemotePull};
pub use resolver::{conflict_diff, suggested_merge, ConflictDiff, ResolutionDecision};
pub use state::{
    CloudMirror, DocumentVersion, MirrorStore, Resolution, StoredDocument, SyncConflict,
    SyncStatus,
};
