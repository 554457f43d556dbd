//! Durable sync state: documents, cloud mirrors, conflicts and versions.
//!
//! Backed by SQLite. Every reconciliation step that touches more than one
//! row (or more than one timestamp) commits through a single transaction —
//! the comparison logic in the engine depends on `last_sync` /
//! `last_local_edit` / `last_remote_edit` being mutually coherent at
//! decision time, so partial writes are forbidden.

use crate::diff::{compute_diff, summarize};
use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use draftbridge_types::{
    ActorId, CompanyId, ConflictId, DocumentContent, DocumentId, MirrorId, Provider,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Rest states a mirror persists between reconciliations.
///
/// Failures intentionally leave the stored status untouched: a failed
/// reconciliation is reported to the caller and retried by the next
/// trigger, so only rest states are ever durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Linked but never reconciled.
    Idle,
    /// Both sides confirmed identical at `last_sync_at`.
    Synced,
    /// Divergence detected; awaiting human resolution.
    Conflict,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Synced => "synced",
            SyncStatus::Conflict => "conflict",
        }
    }
}

fn parse_sync_status(s: &str) -> SyncStatus {
    match s {
        "synced" => SyncStatus::Synced,
        "conflict" => SyncStatus::Conflict,
        _ => SyncStatus::Idle, // fallback
    }
}

/// A resolution applied to a conflict. Immutable once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    KeepLocal,
    KeepRemote,
    Merge,
}

impl Resolution {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Resolution::KeepLocal => "keep_local",
            Resolution::KeepRemote => "keep_remote",
            Resolution::Merge => "merge",
        }
    }
}

fn parse_resolution(s: &str) -> Option<Resolution> {
    match s {
        "keep_local" => Some(Resolution::KeepLocal),
        "keep_remote" => Some(Resolution::KeepRemote),
        "merge" => Some(Resolution::Merge),
        _ => None,
    }
}

/// A document owned by the product, with its canonical content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub company_id: CompanyId,
    pub content: DocumentContent,
    pub last_modified_at: DateTime<Utc>,
    /// None when the last write came from a provider rather than a user.
    pub last_modified_by: Option<ActorId>,
}

/// The binding between a document and one provider's copy of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudMirror {
    pub id: MirrorId,
    pub document_id: DocumentId,
    pub company_id: CompanyId,
    pub provider: Provider,
    pub remote_file_id: String,
    pub status: SyncStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_local_edit_at: Option<DateTime<Utc>>,
    pub last_remote_edit_at: Option<DateTime<Utc>>,
    /// Human-navigable link to the remote file; informational only.
    pub view_url: Option<String>,
    pub active: bool,
}

/// A recorded divergence between the two sides of a mirror.
///
/// Created by the engine, consumed exactly once by the resolver, retained
/// afterward as an audit record. Snapshots hold canonical text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConflict {
    pub id: ConflictId,
    pub mirror_id: MirrorId,
    pub document_id: DocumentId,
    pub company_id: CompanyId,
    pub local_content: String,
    pub local_updated_at: DateTime<Utc>,
    pub local_actor: Option<ActorId>,
    pub remote_content: String,
    pub remote_updated_at: DateTime<Utc>,
    pub remote_source: String,
    pub resolution: Option<Resolution>,
    pub resolved_by: Option<ActorId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// An immutable content snapshot recorded on every local write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub document_id: DocumentId,
    pub company_id: CompanyId,
    pub version_number: i64,
    /// Where the change originated ("editor", a provider name, "merge").
    pub source: String,
    pub content: String,
    /// JSON diff summary against the previous version, if one existed.
    pub diff_summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// SQLite-backed store for documents, mirrors, conflicts and versions.
pub struct MirrorStore {
    conn: Arc<Mutex<Connection>>,
}

impl MirrorStore {
    /// Opens (or creates) a store at the given path.
    pub fn new(path: &str) -> SyncResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| SyncError::Storage(format!("failed to open mirror store: {e}")))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> SyncResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SyncError::Storage(format!("failed to open in-memory store: {e}")))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                company_id TEXT NOT NULL,
                content TEXT NOT NULL,
                last_modified_at TEXT NOT NULL,
                last_modified_by TEXT
            );

            CREATE TABLE IF NOT EXISTS cloud_mirrors (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                company_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                remote_file_id TEXT NOT NULL,
                status TEXT NOT NULL,
                last_sync_at TEXT,
                last_local_edit_at TEXT,
                last_remote_edit_at TEXT,
                view_url TEXT,
                active INTEGER NOT NULL DEFAULT 1
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_active_mirror
                ON cloud_mirrors (document_id, provider) WHERE active = 1;

            CREATE TABLE IF NOT EXISTS sync_conflicts (
                id TEXT PRIMARY KEY,
                mirror_id TEXT NOT NULL,
                document_id TEXT NOT NULL,
                company_id TEXT NOT NULL,
                local_content TEXT NOT NULL,
                local_updated_at TEXT NOT NULL,
                local_actor TEXT,
                remote_content TEXT NOT NULL,
                remote_updated_at TEXT NOT NULL,
                remote_source TEXT NOT NULL,
                resolution TEXT,
                resolved_by TEXT,
                resolved_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS document_versions (
                document_id TEXT NOT NULL,
                company_id TEXT NOT NULL,
                version_number INTEGER NOT NULL,
                source TEXT NOT NULL,
                content TEXT NOT NULL,
                diff_summary TEXT,
                created_at TEXT NOT NULL,
                PRIMARY KEY (document_id, version_number)
            );
            ",
        )
        .map_err(|e| SyncError::Storage(format!("failed to init mirror schema: {e}")))?;
        Ok(())
    }

    // ── Documents ────────────────────────────────────────────────

    /// Inserts or replaces a document row.
    pub fn upsert_document(&self, document: &StoredDocument) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        let content = serde_json::to_string(&document.content)?;
        conn.execute(
            "INSERT OR REPLACE INTO documents (id, company_id, content, last_modified_at, last_modified_by)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                document.id.to_string(),
                document.company_id.to_string(),
                content,
                ts(&document.last_modified_at),
                document.last_modified_by.map(|a| a.to_string()),
            ],
        )
        .map_err(|e| SyncError::Storage(format!("failed to save document: {e}")))?;
        Ok(())
    }

    /// Loads a document by id.
    pub fn get_document(&self, document_id: DocumentId) -> SyncResult<Option<StoredDocument>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, company_id, content, last_modified_at, last_modified_by
                 FROM documents WHERE id = ?1",
                params![document_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| SyncError::Storage(format!("failed to query document: {e}")))?;

        let Some((id, company, content, modified_at, modified_by)) = row else {
            return Ok(None);
        };

        Ok(Some(StoredDocument {
            id: parse_id::<DocumentId>(&id)?,
            company_id: parse_id::<CompanyId>(&company)?,
            content: serde_json::from_str(&content)?,
            last_modified_at: parse_ts(&modified_at)?,
            last_modified_by: modified_by.as_deref().map(parse_id::<ActorId>).transpose()?,
        }))
    }

    // ── Mirrors ──────────────────────────────────────────────────

    /// Creates an active mirror for a (document, provider) pair. Fails
    /// with [`SyncError::AlreadyLinked`] if one already exists.
    pub fn create_mirror(
        &self,
        document_id: DocumentId,
        company_id: CompanyId,
        provider: Provider,
        remote_file_id: &str,
        view_url: Option<String>,
    ) -> SyncResult<CloudMirror> {
        let mirror = CloudMirror {
            id: MirrorId::new(),
            document_id,
            company_id,
            provider,
            remote_file_id: remote_file_id.to_string(),
            status: SyncStatus::Idle,
            last_sync_at: None,
            last_local_edit_at: None,
            last_remote_edit_at: None,
            view_url,
            active: true,
        };

        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO cloud_mirrors
             (id, document_id, company_id, provider, remote_file_id, status, view_url, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
            params![
                mirror.id.to_string(),
                mirror.document_id.to_string(),
                mirror.company_id.to_string(),
                mirror.provider.as_str(),
                mirror.remote_file_id,
                mirror.status.as_str(),
                mirror.view_url,
            ],
        );

        match result {
            Ok(_) => Ok(mirror),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(SyncError::AlreadyLinked)
            }
            Err(e) => Err(SyncError::Storage(format!("failed to create mirror: {e}"))),
        }
    }

    /// Deactivates the active mirror for a (document, provider) pair.
    pub fn deactivate_mirror(&self, document_id: DocumentId, provider: Provider) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE cloud_mirrors SET active = 0
                 WHERE document_id = ?1 AND provider = ?2 AND active = 1",
                params![document_id.to_string(), provider.as_str()],
            )
            .map_err(|e| SyncError::Storage(format!("failed to deactivate mirror: {e}")))?;
        if changed == 0 {
            return Err(SyncError::MirrorNotFound);
        }
        Ok(())
    }

    /// Loads the active mirror for a (document, provider) pair.
    pub fn get_mirror(
        &self,
        document_id: DocumentId,
        provider: Provider,
    ) -> SyncResult<Option<CloudMirror>> {
        self.query_mirror(
            "SELECT id, document_id, company_id, provider, remote_file_id, status,
                    last_sync_at, last_local_edit_at, last_remote_edit_at, view_url, active
             FROM cloud_mirrors WHERE document_id = ?1 AND provider = ?2 AND active = 1",
            params![document_id.to_string(), provider.as_str()],
        )
    }

    /// Loads a mirror by id (active or not).
    pub fn get_mirror_by_id(&self, mirror_id: MirrorId) -> SyncResult<Option<CloudMirror>> {
        self.query_mirror(
            "SELECT id, document_id, company_id, provider, remote_file_id, status,
                    last_sync_at, last_local_edit_at, last_remote_edit_at, view_url, active
             FROM cloud_mirrors WHERE id = ?1",
            params![mirror_id.to_string()],
        )
    }

    /// Lists all active mirrors for a company.
    pub fn list_active_mirrors(&self, company_id: CompanyId) -> SyncResult<Vec<CloudMirror>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, document_id, company_id, provider, remote_file_id, status,
                        last_sync_at, last_local_edit_at, last_remote_edit_at, view_url, active
                 FROM cloud_mirrors WHERE company_id = ?1 AND active = 1 ORDER BY id",
            )
            .map_err(|e| SyncError::Storage(format!("failed to prepare mirror query: {e}")))?;

        let rows = stmt
            .query_map(params![company_id.to_string()], raw_mirror_from_row)
            .map_err(|e| SyncError::Storage(format!("failed to query mirrors: {e}")))?;

        let mut result = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| SyncError::Storage(format!("failed to read mirror: {e}")))?;
            result.push(raw.into_mirror()?);
        }
        Ok(result)
    }

    fn query_mirror(
        &self,
        sql: &str,
        parameters: impl rusqlite::Params,
    ) -> SyncResult<Option<CloudMirror>> {
        let conn = self.conn.lock().unwrap();
        let raw = conn
            .query_row(sql, parameters, raw_mirror_from_row)
            .optional()
            .map_err(|e| SyncError::Storage(format!("failed to query mirror: {e}")))?;
        raw.map(RawMirror::into_mirror).transpose()
    }

    // ── Reconciliation commits ───────────────────────────────────

    /// Marks a mirror synced, stamping the sync and remote-edit times in
    /// one atomic update. The local-edit time is left untouched.
    pub fn commit_synced(
        &self,
        mirror_id: MirrorId,
        last_sync_at: DateTime<Utc>,
        last_remote_edit_at: DateTime<Utc>,
    ) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE cloud_mirrors
                 SET status = ?2, last_sync_at = ?3, last_remote_edit_at = ?4
                 WHERE id = ?1",
                params![
                    mirror_id.to_string(),
                    SyncStatus::Synced.as_str(),
                    ts(&last_sync_at),
                    ts(&last_remote_edit_at),
                ],
            )
            .map_err(|e| SyncError::Storage(format!("failed to mark mirror synced: {e}")))?;
        if changed == 0 {
            return Err(SyncError::MirrorNotFound);
        }
        Ok(())
    }

    /// Commits a remote-authoritative overwrite: replaces local content,
    /// records a version, advances local-edit stamps on every active
    /// mirror of the document, and marks this mirror synced — all in one
    /// transaction.
    pub fn commit_pull_overwrite(
        &self,
        mirror: &CloudMirror,
        content: &DocumentContent,
        remote_modified_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> SyncResult<()> {
        let content_json = serde_json::to_string(content)?;
        let content_text = content.canonical_text();

        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| SyncError::Storage(format!("failed to begin transaction: {e}")))?;

        write_document_content(&tx, mirror.document_id, &content_json, None, now)?;
        insert_version(
            &tx,
            mirror.document_id,
            mirror.company_id,
            &content_text,
            mirror.provider.as_str(),
            now,
        )?;
        bump_local_edit(&tx, mirror.document_id, now)?;

        tx.execute(
            "UPDATE cloud_mirrors
             SET status = ?2, last_sync_at = ?3, last_remote_edit_at = ?4
             WHERE id = ?1",
            params![
                mirror.id.to_string(),
                SyncStatus::Synced.as_str(),
                ts(&now),
                ts(&remote_modified_at),
            ],
        )
        .map_err(|e| SyncError::Storage(format!("failed to mark mirror synced: {e}")))?;

        tx.commit()
            .map_err(|e| SyncError::Storage(format!("failed to commit overwrite: {e}")))
    }

    /// Records a local edit: replaces content, records a version, and
    /// advances the local-edit stamp on every active mirror of the
    /// document. Returns the new version number.
    pub fn record_local_edit(
        &self,
        document_id: DocumentId,
        content: &DocumentContent,
        actor: Option<ActorId>,
        source: &str,
        now: DateTime<Utc>,
    ) -> SyncResult<i64> {
        let content_json = serde_json::to_string(content)?;
        let content_text = content.canonical_text();

        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| SyncError::Storage(format!("failed to begin transaction: {e}")))?;

        let company_id = document_company(&tx, document_id)?;
        write_document_content(&tx, document_id, &content_json, actor, now)?;
        let version = insert_version(&tx, document_id, company_id, &content_text, source, now)?;
        bump_local_edit(&tx, document_id, now)?;

        tx.commit()
            .map_err(|e| SyncError::Storage(format!("failed to commit local edit: {e}")))?;
        Ok(version)
    }

    // ── Conflicts ────────────────────────────────────────────────

    /// Inserts a conflict and flips its mirror to `Conflict` in one
    /// transaction.
    pub fn create_conflict(&self, conflict: &SyncConflict) -> SyncResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| SyncError::Storage(format!("failed to begin transaction: {e}")))?;

        tx.execute(
            "INSERT INTO sync_conflicts
             (id, mirror_id, document_id, company_id,
              local_content, local_updated_at, local_actor,
              remote_content, remote_updated_at, remote_source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                conflict.id.to_string(),
                conflict.mirror_id.to_string(),
                conflict.document_id.to_string(),
                conflict.company_id.to_string(),
                conflict.local_content,
                ts(&conflict.local_updated_at),
                conflict.local_actor.map(|a| a.to_string()),
                conflict.remote_content,
                ts(&conflict.remote_updated_at),
                conflict.remote_source,
                ts(&conflict.created_at),
            ],
        )
        .map_err(|e| SyncError::Storage(format!("failed to save conflict: {e}")))?;

        tx.execute(
            "UPDATE cloud_mirrors SET status = ?2 WHERE id = ?1",
            params![conflict.mirror_id.to_string(), SyncStatus::Conflict.as_str()],
        )
        .map_err(|e| SyncError::Storage(format!("failed to flag mirror conflict: {e}")))?;

        tx.commit()
            .map_err(|e| SyncError::Storage(format!("failed to commit conflict: {e}")))
    }

    /// Loads a conflict by id.
    pub fn get_conflict(&self, conflict_id: ConflictId) -> SyncResult<Option<SyncConflict>> {
        self.query_conflict(
            "SELECT id, mirror_id, document_id, company_id,
                    local_content, local_updated_at, local_actor,
                    remote_content, remote_updated_at, remote_source,
                    resolution, resolved_by, resolved_at, created_at
             FROM sync_conflicts WHERE id = ?1",
            params![conflict_id.to_string()],
        )
    }

    /// Loads the newest unresolved conflict for a mirror.
    pub fn pending_conflict_for_mirror(
        &self,
        mirror_id: MirrorId,
    ) -> SyncResult<Option<SyncConflict>> {
        self.query_conflict(
            "SELECT id, mirror_id, document_id, company_id,
                    local_content, local_updated_at, local_actor,
                    remote_content, remote_updated_at, remote_source,
                    resolution, resolved_by, resolved_at, created_at
             FROM sync_conflicts
             WHERE mirror_id = ?1 AND resolution IS NULL
             ORDER BY created_at DESC LIMIT 1",
            params![mirror_id.to_string()],
        )
    }

    /// Loads the newest unresolved conflict for a document, if any of its
    /// mirrors is in `Conflict`.
    pub fn pending_conflict_for_document(
        &self,
        document_id: DocumentId,
    ) -> SyncResult<Option<SyncConflict>> {
        self.query_conflict(
            "SELECT id, mirror_id, document_id, company_id,
                    local_content, local_updated_at, local_actor,
                    remote_content, remote_updated_at, remote_source,
                    resolution, resolved_by, resolved_at, created_at
             FROM sync_conflicts
             WHERE document_id = ?1 AND resolution IS NULL
             ORDER BY created_at DESC LIMIT 1",
            params![document_id.to_string()],
        )
    }

    fn query_conflict(
        &self,
        sql: &str,
        parameters: impl rusqlite::Params,
    ) -> SyncResult<Option<SyncConflict>> {
        let conn = self.conn.lock().unwrap();
        let raw = conn
            .query_row(sql, parameters, raw_conflict_from_row)
            .optional()
            .map_err(|e| SyncError::Storage(format!("failed to query conflict: {e}")))?;
        raw.map(RawConflict::into_conflict).transpose()
    }

    /// Commits a conflict resolution: stamps the (immutable) resolution,
    /// optionally replaces local content, and advances the mirror back to
    /// `Synced` — all in one transaction. The remote push, if the decision
    /// requires one, must already have succeeded.
    #[allow(clippy::too_many_arguments)]
    pub fn commit_resolution(
        &self,
        mirror: &CloudMirror,
        conflict_id: ConflictId,
        resolution: Resolution,
        resolved_by: ActorId,
        now: DateTime<Utc>,
        local_write: Option<(&DocumentContent, &str)>,
        remote_touched: bool,
    ) -> SyncResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| SyncError::Storage(format!("failed to begin transaction: {e}")))?;

        let changed = tx
            .execute(
                "UPDATE sync_conflicts
                 SET resolution = ?2, resolved_by = ?3, resolved_at = ?4
                 WHERE id = ?1 AND resolution IS NULL",
                params![
                    conflict_id.to_string(),
                    resolution.as_str(),
                    resolved_by.to_string(),
                    ts(&now),
                ],
            )
            .map_err(|e| SyncError::Storage(format!("failed to resolve conflict: {e}")))?;
        if changed == 0 {
            return Err(SyncError::AlreadyResolved);
        }

        if let Some((content, source)) = local_write {
            let content_json = serde_json::to_string(content)?;
            write_document_content(
                &tx,
                mirror.document_id,
                &content_json,
                Some(resolved_by),
                now,
            )?;
            insert_version(
                &tx,
                mirror.document_id,
                mirror.company_id,
                &content.canonical_text(),
                source,
                now,
            )?;
            bump_local_edit(&tx, mirror.document_id, now)?;
        }

        let remote_edit = if remote_touched {
            Some(ts(&now))
        } else {
            mirror.last_remote_edit_at.as_ref().map(ts)
        };

        tx.execute(
            "UPDATE cloud_mirrors
             SET status = ?2, last_sync_at = ?3, last_remote_edit_at = ?4
             WHERE id = ?1",
            params![
                mirror.id.to_string(),
                SyncStatus::Synced.as_str(),
                ts(&now),
                remote_edit,
            ],
        )
        .map_err(|e| SyncError::Storage(format!("failed to mark mirror synced: {e}")))?;

        tx.commit()
            .map_err(|e| SyncError::Storage(format!("failed to commit resolution: {e}")))
    }

    // ── Versions ─────────────────────────────────────────────────

    /// Lists version history for a document, most recent first.
    pub fn list_versions(
        &self,
        document_id: DocumentId,
        limit: usize,
    ) -> SyncResult<Vec<DocumentVersion>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT document_id, company_id, version_number, source, content,
                        diff_summary, created_at
                 FROM document_versions
                 WHERE document_id = ?1
                 ORDER BY version_number DESC LIMIT ?2",
            )
            .map_err(|e| SyncError::Storage(format!("failed to prepare version query: {e}")))?;

        let rows = stmt
            .query_map(params![document_id.to_string(), limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .map_err(|e| SyncError::Storage(format!("failed to query versions: {e}")))?;

        let mut result = Vec::new();
        for row in rows {
            let (doc, company, number, source, content, summary, created) =
                row.map_err(|e| SyncError::Storage(format!("failed to read version: {e}")))?;
            result.push(DocumentVersion {
                document_id: parse_id::<DocumentId>(&doc)?,
                company_id: parse_id::<CompanyId>(&company)?,
                version_number: number,
                source,
                content,
                diff_summary: summary,
                created_at: parse_ts(&created)?,
            });
        }
        Ok(result)
    }
}

// ── Transaction helpers ──────────────────────────────────────────

fn document_company(conn: &Connection, document_id: DocumentId) -> SyncResult<CompanyId> {
    let company: Option<String> = conn
        .query_row(
            "SELECT company_id FROM documents WHERE id = ?1",
            params![document_id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| SyncError::Storage(format!("failed to query document: {e}")))?;
    let company = company.ok_or(SyncError::DocumentNotFound)?;
    parse_id::<CompanyId>(&company)
}

fn write_document_content(
    conn: &Connection,
    document_id: DocumentId,
    content_json: &str,
    actor: Option<ActorId>,
    now: DateTime<Utc>,
) -> SyncResult<()> {
    let changed = conn
        .execute(
            "UPDATE documents
             SET content = ?2, last_modified_at = ?3, last_modified_by = ?4
             WHERE id = ?1",
            params![
                document_id.to_string(),
                content_json,
                ts(&now),
                actor.map(|a| a.to_string()),
            ],
        )
        .map_err(|e| SyncError::Storage(format!("failed to write document: {e}")))?;
    if changed == 0 {
        return Err(SyncError::DocumentNotFound);
    }
    Ok(())
}

/// Inserts the next version row, diffing against the latest recorded
/// version when one exists. Returns the new version number.
fn insert_version(
    conn: &Connection,
    document_id: DocumentId,
    company_id: CompanyId,
    content_text: &str,
    source: &str,
    now: DateTime<Utc>,
) -> SyncResult<i64> {
    let previous: Option<(i64, String)> = conn
        .query_row(
            "SELECT version_number, content FROM document_versions
             WHERE document_id = ?1 ORDER BY version_number DESC LIMIT 1",
            params![document_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| SyncError::Storage(format!("failed to query latest version: {e}")))?;

    let (number, summary) = match previous {
        Some((latest, previous_content)) => {
            let lines = compute_diff(content_text, &previous_content);
            let summary = serde_json::to_string(&summarize(&lines))?;
            (latest + 1, Some(summary))
        }
        None => (1, None),
    };

    conn.execute(
        "INSERT INTO document_versions
         (document_id, company_id, version_number, source, content, diff_summary, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            document_id.to_string(),
            company_id.to_string(),
            number,
            source,
            content_text,
            summary,
            ts(&now),
        ],
    )
    .map_err(|e| SyncError::Storage(format!("failed to save version: {e}")))?;
    Ok(number)
}

/// A local content write is a local edit from the perspective of every
/// active mirror of the document.
fn bump_local_edit(
    conn: &Connection,
    document_id: DocumentId,
    now: DateTime<Utc>,
) -> SyncResult<()> {
    conn.execute(
        "UPDATE cloud_mirrors SET last_local_edit_at = ?2
         WHERE document_id = ?1 AND active = 1",
        params![document_id.to_string(), ts(&now)],
    )
    .map_err(|e| SyncError::Storage(format!("failed to stamp local edit: {e}")))?;
    Ok(())
}

// ── Row mapping ──────────────────────────────────────────────────

struct RawMirror {
    id: String,
    document_id: String,
    company_id: String,
    provider: String,
    remote_file_id: String,
    status: String,
    last_sync_at: Option<String>,
    last_local_edit_at: Option<String>,
    last_remote_edit_at: Option<String>,
    view_url: Option<String>,
    active: i64,
}

fn raw_mirror_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawMirror> {
    Ok(RawMirror {
        id: row.get(0)?,
        document_id: row.get(1)?,
        company_id: row.get(2)?,
        provider: row.get(3)?,
        remote_file_id: row.get(4)?,
        status: row.get(5)?,
        last_sync_at: row.get(6)?,
        last_local_edit_at: row.get(7)?,
        last_remote_edit_at: row.get(8)?,
        view_url: row.get(9)?,
        active: row.get(10)?,
    })
}

impl RawMirror {
    fn into_mirror(self) -> SyncResult<CloudMirror> {
        Ok(CloudMirror {
            id: parse_id::<MirrorId>(&self.id)?,
            document_id: parse_id::<DocumentId>(&self.document_id)?,
            company_id: parse_id::<CompanyId>(&self.company_id)?,
            provider: Provider::from_str(&self.provider)
                .map_err(|e| SyncError::Storage(format!("invalid provider in store: {e}")))?,
            remote_file_id: self.remote_file_id,
            status: parse_sync_status(&self.status),
            last_sync_at: parse_opt_ts(self.last_sync_at)?,
            last_local_edit_at: parse_opt_ts(self.last_local_edit_at)?,
            last_remote_edit_at: parse_opt_ts(self.last_remote_edit_at)?,
            view_url: self.view_url,
            active: self.active != 0,
        })
    }
}

struct RawConflict {
    id: String,
    mirror_id: String,
    document_id: String,
    company_id: String,
    local_content: String,
    local_updated_at: String,
    local_actor: Option<String>,
    remote_content: String,
    remote_updated_at: String,
    remote_source: String,
    resolution: Option<String>,
    resolved_by: Option<String>,
    resolved_at: Option<String>,
    created_at: String,
}

fn raw_conflict_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawConflict> {
    Ok(RawConflict {
        id: row.get(0)?,
        mirror_id: row.get(1)?,
        document_id: row.get(2)?,
        company_id: row.get(3)?,
        local_content: row.get(4)?,
        local_updated_at: row.get(5)?,
        local_actor: row.get(6)?,
        remote_content: row.get(7)?,
        remote_updated_at: row.get(8)?,
        remote_source: row.get(9)?,
        resolution: row.get(10)?,
        resolved_by: row.get(11)?,
        resolved_at: row.get(12)?,
        created_at: row.get(13)?,
    })
}

impl RawConflict {
    fn into_conflict(self) -> SyncResult<SyncConflict> {
        Ok(SyncConflict {
            id: parse_id::<ConflictId>(&self.id)?,
            mirror_id: parse_id::<MirrorId>(&self.mirror_id)?,
            document_id: parse_id::<DocumentId>(&self.document_id)?,
            company_id: parse_id::<CompanyId>(&self.company_id)?,
            local_content: self.local_content,
            local_updated_at: parse_ts(&self.local_updated_at)?,
            local_actor: self
                .local_actor
                .as_deref()
                .map(parse_id::<ActorId>)
                .transpose()?,
            remote_content: self.remote_content,
            remote_updated_at: parse_ts(&self.remote_updated_at)?,
            remote_source: self.remote_source,
            resolution: self.resolution.as_deref().and_then(parse_resolution),
            resolved_by: self
                .resolved_by
                .as_deref()
                .map(parse_id::<ActorId>)
                .transpose()?,
            resolved_at: parse_opt_ts(self.resolved_at)?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_ts(s: &str) -> SyncResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SyncError::Storage(format!("invalid timestamp in store: {e}")))
}

fn parse_opt_ts(s: Option<String>) -> SyncResult<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_ts).transpose()
}

fn parse_id<T: FromStr>(s: &str) -> SyncResult<T>
where
    T::Err: std::fmt::Display,
{
    s.parse()
        .map_err(|e: T::Err| SyncError::Storage(format!("invalid id in store: {e}")))
}
