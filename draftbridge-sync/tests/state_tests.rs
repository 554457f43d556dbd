use chrono::{Duration, Utc};
use draftbridge_sync::{
    MirrorStore, Resolution, StoredDocument, SyncConflict, SyncError, SyncStatus,
};
use draftbridge_types::{
    ActorId, CompanyId, ConflictId, ContentKind, DocumentContent, DocumentId, MirrorId, Provider,
};
use pretty_assertions::assert_eq;

fn section_content(text: &str) -> DocumentContent {
    DocumentContent::from_canonical(ContentKind::Sections, text).unwrap()
}

fn make_document(company_id: CompanyId, text: &str) -> StoredDocument {
    StoredDocument {
        id: DocumentId::new(),
        company_id,
        content: section_content(text),
        last_modified_at: Utc::now(),
        last_modified_by: Some(ActorId::new()),
    }
}

fn seeded_store(text: &str) -> (MirrorStore, StoredDocument) {
    let store = MirrorStore::open_in_memory().unwrap();
    let document = make_document(CompanyId::new(), text);
    store.upsert_document(&document).unwrap();
    (store, document)
}

fn make_conflict(
    mirror_id: MirrorId,
    document: &StoredDocument,
    local: &str,
    remote: &str,
) -> SyncConflict {
    SyncConflict {
        id: ConflictId::new(),
        mirror_id,
        document_id: document.id,
        company_id: document.company_id,
        local_content: local.to_string(),
        local_updated_at: Utc::now(),
        local_actor: document.last_modified_by,
        remote_content: remote.to_string(),
        remote_updated_at: Utc::now(),
        remote_source: "word".to_string(),
        resolution: None,
        resolved_by: None,
        resolved_at: None,
        created_at: Utc::now(),
    }
}

// ── Documents ───────────────────────────────────────────────────

#[test]
fn document_round_trip() {
    let (store, document) = seeded_store("# Scope\nEverything.");
    let loaded = store.get_document(document.id).unwrap().unwrap();
    assert_eq!(loaded.content, document.content);
    assert_eq!(loaded.company_id, document.company_id);
    assert_eq!(loaded.last_modified_by, document.last_modified_by);
}

#[test]
fn missing_document_is_none() {
    let store = MirrorStore::open_in_memory().unwrap();
    assert!(store.get_document(DocumentId::new()).unwrap().is_none());
}

// ── Mirrors ─────────────────────────────────────────────────────

#[test]
fn new_mirror_starts_idle() {
    let (store, document) = seeded_store("# A\nbody");
    let mirror = store
        .create_mirror(
            document.id,
            document.company_id,
            Provider::Word,
            "file-1",
            Some("https://example.com/view".to_string()),
        )
        .unwrap();

    assert_eq!(mirror.status, SyncStatus::Idle);
    assert!(mirror.last_sync_at.is_none());
    assert!(mirror.last_local_edit_at.is_none());
    assert!(mirror.last_remote_edit_at.is_none());

    let loaded = store.get_mirror(document.id, Provider::Word).unwrap().unwrap();
    assert_eq!(loaded.id, mirror.id);
    assert_eq!(loaded.remote_file_id, "file-1");
    assert_eq!(loaded.view_url.as_deref(), Some("https://example.com/view"));
    assert!(loaded.active);
}

#[test]
fn second_active_mirror_for_same_provider_is_rejected() {
    let (store, document) = seeded_store("# A\nbody");
    store
        .create_mirror(document.id, document.company_id, Provider::Word, "file-1", None)
        .unwrap();
    let err = store
        .create_mirror(document.id, document.company_id, Provider::Word, "file-2", None)
        .unwrap_err();
    assert!(matches!(err, SyncError::AlreadyLinked));

    // A different provider is fine.
    store
        .create_mirror(document.id, document.company_id, Provider::Sheets, "file-3", None)
        .unwrap();
}

#[test]
fn relink_after_unlink() {
    let (store, document) = seeded_store("# A\nbody");
    store
        .create_mirror(document.id, document.company_id, Provider::Word, "file-1", None)
        .unwrap();
    store.deactivate_mirror(document.id, Provider::Word).unwrap();

    assert!(store.get_mirror(document.id, Provider::Word).unwrap().is_none());

    store
        .create_mirror(document.id, document.company_id, Provider::Word, "file-2", None)
        .unwrap();
    let mirror = store.get_mirror(document.id, Provider::Word).unwrap().unwrap();
    assert_eq!(mirror.remote_file_id, "file-2");
}

#[test]
fn deactivate_without_mirror_fails() {
    let (store, document) = seeded_store("# A\nbody");
    let err = store
        .deactivate_mirror(document.id, Provider::Slides)
        .unwrap_err();
    assert!(matches!(err, SyncError::MirrorNotFound));
}

#[test]
fn list_active_mirrors_scopes_by_company() {
    let store = MirrorStore::open_in_memory().unwrap();
    let doc_a = make_document(CompanyId::new(), "# A\na");
    let doc_b = make_document(CompanyId::new(), "# B\nb");
    store.upsert_document(&doc_a).unwrap();
    store.upsert_document(&doc_b).unwrap();

    store
        .create_mirror(doc_a.id, doc_a.company_id, Provider::Word, "a-1", None)
        .unwrap();
    store
        .create_mirror(doc_a.id, doc_a.company_id, Provider::Sheets, "a-2", None)
        .unwrap();
    store
        .create_mirror(doc_b.id, doc_b.company_id, Provider::Word, "b-1", None)
        .unwrap();
    store.deactivate_mirror(doc_a.id, Provider::Sheets).unwrap();

    let mirrors = store.list_active_mirrors(doc_a.company_id).unwrap();
    assert_eq!(mirrors.len(), 1);
    assert_eq!(mirrors[0].document_id, doc_a.id);
}

// ── Reconciliation commits ──────────────────────────────────────

#[test]
fn commit_synced_stamps_timestamps_atomically() {
    let (store, document) = seeded_store("# A\nbody");
    let mirror = store
        .create_mirror(document.id, document.company_id, Provider::Word, "file-1", None)
        .unwrap();

    let sync_at = Utc::now();
    let remote_edit = sync_at - Duration::minutes(5);
    store.commit_synced(mirror.id, sync_at, remote_edit).unwrap();

    let loaded = store.get_mirror(document.id, Provider::Word).unwrap().unwrap();
    assert_eq!(loaded.status, SyncStatus::Synced);
    assert_eq!(loaded.last_sync_at, Some(sync_at));
    assert_eq!(loaded.last_remote_edit_at, Some(remote_edit));
    assert_eq!(loaded.last_local_edit_at, None);
}

#[test]
fn commit_synced_on_unknown_mirror_fails() {
    let store = MirrorStore::open_in_memory().unwrap();
    let err = store
        .commit_synced(MirrorId::new(), Utc::now(), Utc::now())
        .unwrap_err();
    assert!(matches!(err, SyncError::MirrorNotFound));
}

#[test]
fn local_edit_bumps_every_active_mirror() {
    let (store, document) = seeded_store("# A\noriginal");
    let word = store
        .create_mirror(document.id, document.company_id, Provider::Word, "w-1", None)
        .unwrap();
    let slides = store
        .create_mirror(document.id, document.company_id, Provider::Slides, "s-1", None)
        .unwrap();

    let now = Utc::now();
    let version = store
        .record_local_edit(
            document.id,
            &section_content("# A\nedited"),
            document.last_modified_by,
            "editor",
            now,
        )
        .unwrap();
    assert_eq!(version, 1);

    let loaded = store.get_document(document.id).unwrap().unwrap();
    assert_eq!(loaded.content, section_content("# A\nedited"));

    for mirror_id in [word.id, slides.id] {
        let mirror = store.get_mirror_by_id(mirror_id).unwrap().unwrap();
        assert_eq!(mirror.last_local_edit_at, Some(now));
    }
}

#[test]
fn local_edit_on_missing_document_fails() {
    let store = MirrorStore::open_in_memory().unwrap();
    let err = store
        .record_local_edit(
            DocumentId::new(),
            &section_content("# A\nbody"),
            None,
            "editor",
            Utc::now(),
        )
        .unwrap_err();
    assert!(matches!(err, SyncError::DocumentNotFound));
}

#[test]
fn versions_accumulate_with_diff_summaries() {
    let (store, document) = seeded_store("# A\nfirst");

    store
        .record_local_edit(document.id, &section_content("# A\nfirst"), None, "editor", Utc::now())
        .unwrap();
    store
        .record_local_edit(document.id, &section_content("# A\nsecond"), None, "editor", Utc::now())
        .unwrap();

    let versions = store.list_versions(document.id, 10).unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].version_number, 2);
    assert_eq!(versions[1].version_number, 1);
    assert!(versions[1].diff_summary.is_none());

    let summary = versions[0].diff_summary.as_deref().unwrap();
    assert!(summary.contains("\"additions\":1"));
}

#[test]
fn pull_overwrite_replaces_content_and_marks_synced() {
    let (store, document) = seeded_store("# A\nlocal");
    let mirror = store
        .create_mirror(document.id, document.company_id, Provider::Word, "w-1", None)
        .unwrap();

    let remote_modified = Utc::now() - Duration::minutes(2);
    let now = Utc::now();
    store
        .commit_pull_overwrite(&mirror, &section_content("# A\nremote"), remote_modified, now)
        .unwrap();

    let loaded_doc = store.get_document(document.id).unwrap().unwrap();
    assert_eq!(loaded_doc.content, section_content("# A\nremote"));
    assert_eq!(loaded_doc.last_modified_by, None);

    let loaded = store.get_mirror_by_id(mirror.id).unwrap().unwrap();
    assert_eq!(loaded.status, SyncStatus::Synced);
    assert_eq!(loaded.last_sync_at, Some(now));
    assert_eq!(loaded.last_remote_edit_at, Some(remote_modified));
    assert_eq!(loaded.last_local_edit_at, Some(now));

    let versions = store.list_versions(document.id, 10).unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].source, "word");
}

// ── Conflicts ───────────────────────────────────────────────────

#[test]
fn create_conflict_flips_mirror_status() {
    let (store, document) = seeded_store("# A\nlocal");
    let mirror = store
        .create_mirror(document.id, document.company_id, Provider::Word, "w-1", None)
        .unwrap();

    let conflict = make_conflict(mirror.id, &document, "# A\nlocal\n", "# A\nremote\n");
    store.create_conflict(&conflict).unwrap();

    let loaded = store.get_mirror_by_id(mirror.id).unwrap().unwrap();
    assert_eq!(loaded.status, SyncStatus::Conflict);

    let pending = store
        .pending_conflict_for_document(document.id)
        .unwrap()
        .unwrap();
    assert_eq!(pending.id, conflict.id);
    assert_eq!(pending.local_content, "# A\nlocal\n");
    assert_eq!(pending.remote_content, "# A\nremote\n");
    assert!(pending.resolution.is_none());

    let by_mirror = store.pending_conflict_for_mirror(mirror.id).unwrap().unwrap();
    assert_eq!(by_mirror.id, conflict.id);
}

#[test]
fn resolution_is_immutable() {
    let (store, document) = seeded_store("# A\nlocal");
    let mirror = store
        .create_mirror(document.id, document.company_id, Provider::Word, "w-1", None)
        .unwrap();
    let conflict = make_conflict(mirror.id, &document, "# A\nlocal\n", "# A\nremote\n");
    store.create_conflict(&conflict).unwrap();

    let resolver = ActorId::new();
    let now = Utc::now();
    store
        .commit_resolution(&mirror, conflict.id, Resolution::KeepLocal, resolver, now, None, true)
        .unwrap();

    let resolved = store.get_conflict(conflict.id).unwrap().unwrap();
    assert_eq!(resolved.resolution, Some(Resolution::KeepLocal));
    assert_eq!(resolved.resolved_by, Some(resolver));
    assert_eq!(resolved.resolved_at, Some(now));

    // Once set, further resolutions are rejected and nothing changes.
    let err = store
        .commit_resolution(
            &mirror,
            conflict.id,
            Resolution::KeepRemote,
            ActorId::new(),
            Utc::now(),
            None,
            false,
        )
        .unwrap_err();
    assert!(matches!(err, SyncError::AlreadyResolved));

    let still = store.get_conflict(conflict.id).unwrap().unwrap();
    assert_eq!(still.resolution, Some(Resolution::KeepLocal));
    assert_eq!(still.resolved_by, Some(resolver));

    assert!(store
        .pending_conflict_for_document(document.id)
        .unwrap()
        .is_none());
}

#[test]
fn resolution_with_local_write_updates_document() {
    let (store, document) = seeded_store("# A\nlocal");
    let mirror = store
        .create_mirror(document.id, document.company_id, Provider::Word, "w-1", None)
        .unwrap();
    let conflict = make_conflict(mirror.id, &document, "# A\nlocal\n", "# A\nremote\n");
    store.create_conflict(&conflict).unwrap();

    let resolver = ActorId::new();
    let now = Utc::now();
    let remote = section_content("# A\nremote");
    store
        .commit_resolution(
            &mirror,
            conflict.id,
            Resolution::KeepRemote,
            resolver,
            now,
            Some((&remote, "word")),
            false,
        )
        .unwrap();

    let loaded_doc = store.get_document(document.id).unwrap().unwrap();
    assert_eq!(loaded_doc.content, remote);
    assert_eq!(loaded_doc.last_modified_by, Some(resolver));

    let loaded = store.get_mirror_by_id(mirror.id).unwrap().unwrap();
    assert_eq!(loaded.status, SyncStatus::Synced);
    assert_eq!(loaded.last_sync_at, Some(now));
}

// ── Persistence ─────────────────────────────────────────────────

#[test]
fn store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mirrors.db");
    let path = path.to_str().unwrap();

    let document = make_document(CompanyId::new(), "# A\nbody");
    let mirror_id = {
        let store = MirrorStore::new(path).unwrap();
        store.upsert_document(&document).unwrap();
        store
            .create_mirror(document.id, document.company_id, Provider::Sheets, "s-1", None)
            .unwrap()
            .id
    };

    let store = MirrorStore::new(path).unwrap();
    let mirror = store.get_mirror_by_id(mirror_id).unwrap().unwrap();
    assert_eq!(mirror.provider, Provider::Sheets);
    assert_eq!(
        store.get_document(document.id).unwrap().unwrap().content,
        document.content
    );
}
