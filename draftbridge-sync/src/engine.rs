//! Sync engine — the reconciliation state machine.
//!
//! A reconciliation runs `Idle → Pulling → Comparing → {Synced |
//! ConflictDetected}`; conflicts rest until a resolution runs `Resolving →
//! Synced`. Comparison order is load-bearing: identity first, then the
//! one-sided-change checks, then divergence. That ordering guarantees no
//! conflict is raised when only one side changed, and no winner is picked
//! automatically when both did.
//!
//! Failures (transport, timeout, credential, integrity) abort the attempt
//! with persisted state untouched; the next external trigger retries.

use crate::error::{SyncError, SyncResult};
use crate::integrity::IntegrityChecker;
use crate::providers::AdapterRegistry;
use crate::resolver::ResolutionDecision;
use crate::state::{
    CloudMirror, MirrorStore, Resolution, SyncConflict, SyncStatus,
};
use chrono::Utc;
use draftbridge_types::{
    ActorId, CompanyId, ConflictId, DocumentContent, DocumentId, MirrorId, Provider,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Source label recorded on versions written by local editors.
const LOCAL_EDIT_SOURCE: &str = "editor";

/// Source label recorded on versions written by a merge resolution.
const MERGE_SOURCE: &str = "merge";

/// Outcome of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Both sides were already identical.
    UpToDate,
    /// Remote was authoritative; local content was overwritten.
    PulledRemote,
    /// Local was authoritative; content was pushed to the provider.
    PushedLocal,
    /// Both sides diverged; a conflict was recorded and reconciliation
    /// stopped without writing to either side.
    ConflictDetected(ConflictId),
    /// An earlier conflict is still awaiting resolution; nothing was done.
    ConflictPending(ConflictId),
}

/// Result of a company-wide reconciliation sweep. Per-mirror failures are
/// isolated here instead of aborting the sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub synced: usize,
    pub conflicts: Vec<ConflictId>,
    pub failures: Vec<(DocumentId, Provider, SyncError)>,
}

/// Orchestrates reconciliation between documents and their cloud mirrors.
pub struct SyncEngine {
    store: Arc<MirrorStore>,
    adapters: Arc<AdapterRegistry>,
    checkers: HashMap<Provider, Arc<dyn IntegrityChecker>>,
    /// Single-flight locks keyed by mirror id — overlapping pulls for the
    /// same mirror could race to write sync state and falsely both detect
    /// or both miss a conflict.
    mirror_locks: Mutex<HashMap<MirrorId, Arc<Mutex<()>>>>,
}

impl SyncEngine {
    /// Creates an engine over the given store and adapter registry.
    #[must_use]
    pub fn new(store: Arc<MirrorStore>, adapters: Arc<AdapterRegistry>) -> Self {
        Self {
            store,
            adapters,
            checkers: HashMap::new(),
            mirror_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Registers an integrity checker for a provider. Its verdict gates
    /// every pull and push for that provider, fail-closed.
    pub fn register_integrity_checker(
        &mut self,
        provider: Provider,
        checker: Arc<dyn IntegrityChecker>,
    ) {
        self.checkers.insert(provider, checker);
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<MirrorStore> {
        &self.store
    }

    // ── Trigger interface ────────────────────────────────────────

    /// Reconciles one (document, provider) mirror.
    pub async fn reconcile(
        &self,
        document_id: DocumentId,
        provider: Provider,
    ) -> SyncResult<ReconcileOutcome> {
        let mirror = self
            .store
            .get_mirror(document_id, provider)?
            .ok_or(SyncError::MirrorNotFound)?;

        let lock = self.mirror_lock(mirror.id).await;
        let _guard = lock.lock().await;

        // Re-read under the lock; a concurrent reconcile may have advanced it.
        let mirror = self
            .store
            .get_mirror(document_id, provider)?
            .ok_or(SyncError::MirrorNotFound)?;

        if mirror.status == SyncStatus::Conflict {
            let conflict = self
                .store
                .pending_conflict_for_mirror(mirror.id)?
                .ok_or_else(|| {
                    SyncError::Storage("mirror in conflict without a pending conflict".to_string())
                })?;
            debug!(mirror = %mirror.id, conflict = %conflict.id, "awaiting conflict resolution");
            return Ok(ReconcileOutcome::ConflictPending(conflict.id));
        }

        let adapter = self.adapters.get(provider)?;
        let document = self
            .store
            .get_document(document_id)?
            .ok_or(SyncError::DocumentNotFound)?;

        debug!(mirror = %mirror.id, %provider, "pulling remote content");
        let pulled = bounded(
            adapter.call_timeout(),
            adapter.pull(mirror.company_id, &mirror.remote_file_id),
        )
        .await?;

        self.check_integrity(provider, &pulled.content, "pulled")?;

        debug!(mirror = %mirror.id, "comparing against local content");
        let local_text = document.content.canonical_text();
        let remote_text = pulled.content.canonical_text();
        let now = Utc::now();

        if remote_text == local_text {
            self.store
                .commit_synced(mirror.id, now, pulled.modified_at)?;
            debug!(mirror = %mirror.id, "contents identical");
            return Ok(ReconcileOutcome::UpToDate);
        }

        let remote_edit = match mirror.last_remote_edit_at {
            Some(stored) => stored.max(pulled.modified_at),
            None => pulled.modified_at,
        };
        let (local_changed, remote_changed) = match mirror.last_sync_at {
            Some(last_sync) => (
                mirror
                    .last_local_edit_at
                    .is_some_and(|edit| edit > last_sync),
                remote_edit > last_sync,
            ),
            // Never synced: no baseline to attribute the difference to,
            // so both sides count as changed.
            None => (true, true),
        };

        if !local_changed {
            self.store
                .commit_pull_overwrite(&mirror, &pulled.content, pulled.modified_at, now)?;
            info!(mirror = %mirror.id, "remote update applied locally");
            return Ok(ReconcileOutcome::PulledRemote);
        }

        if !remote_changed {
            self.check_integrity(provider, &document.content, "local")?;
            bounded(
                adapter.call_timeout(),
                adapter.push(mirror.company_id, &mirror.remote_file_id, &document.content),
            )
            .await?;
            self.store.commit_synced(mirror.id, now, now)?;
            info!(mirror = %mirror.id, "local update pushed remotely");
            return Ok(ReconcileOutcome::PushedLocal);
        }

        // Both sides diverged: snapshot both versions and stop. No further
        // automatic write happens to either side.
        let conflict = SyncConflict {
            id: ConflictId::new(),
            mirror_id: mirror.id,
            document_id: mirror.document_id,
            company_id: mirror.company_id,
            local_content: local_text,
            local_updated_at: document.last_modified_at,
            local_actor: document.last_modified_by,
            remote_content: remote_text,
            remote_updated_at: pulled.modified_at,
            remote_source: provider.to_string(),
            resolution: None,
            resolved_by: None,
            resolved_at: None,
            created_at: now,
        };
        self.store.create_conflict(&conflict)?;
        warn!(mirror = %mirror.id, conflict = %conflict.id, "divergence detected; awaiting resolution");
        Ok(ReconcileOutcome::ConflictDetected(conflict.id))
    }

    /// Applies a resolution to a pending conflict. All-or-nothing: the
    /// remote push (for keep-local/merge) must succeed before any state
    /// is persisted; a failed push leaves the conflict pending.
    pub async fn resolve_conflict(
        &self,
        conflict_id: ConflictId,
        decision: ResolutionDecision,
        resolved_by: ActorId,
    ) -> SyncResult<()> {
        let conflict = self
            .store
            .get_conflict(conflict_id)?
            .ok_or(SyncError::ConflictNotFound)?;
        if conflict.resolution.is_some() {
            return Err(SyncError::AlreadyResolved);
        }

        let mirror = self
            .store
            .get_mirror_by_id(conflict.mirror_id)?
            .filter(|m| m.active)
            .ok_or(SyncError::MirrorNotFound)?;

        let lock = self.mirror_lock(mirror.id).await;
        let _guard = lock.lock().await;

        // Re-check under the lock; a concurrent resolution may have won.
        let conflict = self
            .store
            .get_conflict(conflict_id)?
            .ok_or(SyncError::ConflictNotFound)?;
        if conflict.resolution.is_some() {
            return Err(SyncError::AlreadyResolved);
        }

        let document = self
            .store
            .get_document(mirror.document_id)?
            .ok_or(SyncError::DocumentNotFound)?;
        let kind = document.content.kind();
        let provider = mirror.provider;
        let now = Utc::now();

        match decision {
            ResolutionDecision::KeepLocal => {
                let content = DocumentContent::from_canonical(kind, &conflict.local_content)?;
                self.check_integrity(provider, &content, "local")?;
                let adapter = self.adapters.get(provider)?;
                bounded(
                    adapter.call_timeout(),
                    adapter.push(mirror.company_id, &mirror.remote_file_id, &content),
                )
                .await?;
                self.store.commit_resolution(
                    &mirror,
                    conflict.id,
                    Resolution::KeepLocal,
                    resolved_by,
                    now,
                    None,
                    true,
                )?;
            }
            ResolutionDecision::KeepRemote => {
                let content = DocumentContent::from_canonical(kind, &conflict.remote_content)?;
                self.store.commit_resolution(
                    &mirror,
                    conflict.id,
                    Resolution::KeepRemote,
                    resolved_by,
                    now,
                    Some((&content, provider.as_str())),
                    false,
                )?;
            }
            ResolutionDecision::Merge { merged } => {
                let content = DocumentContent::from_canonical(kind, &merged)?;
                self.check_integrity(provider, &content, "merged")?;
                let adapter = self.adapters.get(provider)?;
                bounded(
                    adapter.call_timeout(),
                    adapter.push(mirror.company_id, &mirror.remote_file_id, &content),
                )
                .await?;
                self.store.commit_resolution(
                    &mirror,
                    conflict.id,
                    Resolution::Merge,
                    resolved_by,
                    now,
                    Some((&content, MERGE_SOURCE)),
                    true,
                )?;
            }
        }

        info!(conflict = %conflict_id, mirror = %mirror.id, "conflict resolved");
        Ok(())
    }

    /// Links a document to a remote file, creating an active mirror.
    /// At most one active mirror may exist per (document, provider).
    pub async fn link_document(
        &self,
        document_id: DocumentId,
        provider: Provider,
        remote_file_id: &str,
    ) -> SyncResult<CloudMirror> {
        let document = self
            .store
            .get_document(document_id)?
            .ok_or(SyncError::DocumentNotFound)?;
        let adapter = self.adapters.get(provider)?;

        // The view URL is informational; failing to resolve it never
        // blocks linking.
        let view_url = match adapter
            .resolve_view_url(document.company_id, remote_file_id)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                warn!(%provider, remote_file_id, "view url resolution failed: {e}");
                None
            }
        };

        let mirror = self.store.create_mirror(
            document_id,
            document.company_id,
            provider,
            remote_file_id,
            view_url,
        )?;
        info!(document = %document_id, %provider, mirror = %mirror.id, "document linked");
        Ok(mirror)
    }

    /// Deactivates the mirror for a (document, provider) pair.
    pub fn unlink_document(&self, document_id: DocumentId, provider: Provider) -> SyncResult<()> {
        self.store.deactivate_mirror(document_id, provider)?;
        info!(document = %document_id, %provider, "document unlinked");
        Ok(())
    }

    /// Records a local content edit from the product's editor. Returns
    /// the new version number.
    pub fn record_local_edit(
        &self,
        document_id: DocumentId,
        content: &DocumentContent,
        actor: ActorId,
    ) -> SyncResult<i64> {
        self.store
            .record_local_edit(document_id, content, Some(actor), LOCAL_EDIT_SOURCE, Utc::now())
    }

    /// Reconciles every active mirror for a company, isolating per-mirror
    /// failures into the report.
    pub async fn sweep(&self, company_id: CompanyId) -> SyncResult<SweepReport> {
        let mirrors = self.store.list_active_mirrors(company_id)?;
        info!(%company_id, mirrors = mirrors.len(), "starting reconciliation sweep");

        let mut report = SweepReport::default();
        for mirror in mirrors {
            match self.reconcile(mirror.document_id, mirror.provider).await {
                Ok(
                    ReconcileOutcome::ConflictDetected(id) | ReconcileOutcome::ConflictPending(id),
                ) => report.conflicts.push(id),
                Ok(_) => report.synced += 1,
                Err(e) => {
                    warn!(
                        document = %mirror.document_id,
                        provider = %mirror.provider,
                        "reconciliation failed: {e}"
                    );
                    report.failures.push((mirror.document_id, mirror.provider, e));
                }
            }
        }
        Ok(report)
    }

    // ── Query interface ──────────────────────────────────────────

    /// Returns the active mirror state for a (document, provider) pair.
    pub fn sync_state(
        &self,
        document_id: DocumentId,
        provider: Provider,
    ) -> SyncResult<Option<CloudMirror>> {
        self.store.get_mirror(document_id, provider)
    }

    /// Returns the pending conflict for a document, if any mirror is in
    /// `Conflict`.
    pub fn pending_conflict(&self, document_id: DocumentId) -> SyncResult<Option<SyncConflict>> {
        self.store.pending_conflict_for_document(document_id)
    }

    // ── Internals ────────────────────────────────────────────────

    fn check_integrity(
        &self,
        provider: Provider,
        content: &DocumentContent,
        side: &str,
    ) -> SyncResult<()> {
        if let Some(checker) = self.checkers.get(&provider) {
            if !checker.verify_markings(content) {
                return Err(SyncError::IntegrityViolation(format!(
                    "required markings missing from {side} content"
                )));
            }
        }
        Ok(())
    }

    async fn mirror_lock(&self, mirror_id: MirrorId) -> Arc<Mutex<()>> {
        let mut locks = self.mirror_locks.lock().await;
        locks
            .entry(mirror_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Bounds a provider call; a timeout is treated identically to a returned
/// transport failure.
async fn bounded<T>(limit: Duration, call: impl Future<Output = SyncResult<T>>) -> SyncResult<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| SyncError::Timeout)?
}
