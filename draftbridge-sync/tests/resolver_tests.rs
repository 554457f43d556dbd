use chrono::Utc;
use draftbridge_sync::{conflict_diff, suggested_merge, DiffKind, SyncConflict};
use draftbridge_types::{ActorId, CompanyId, ConflictId, DocumentId, MirrorId};
use pretty_assertions::assert_eq;

fn make_conflict(local: &str, remote: &str) -> SyncConflict {
    SyncConflict {
        id: ConflictId::new(),
        mirror_id: MirrorId::new(),
        document_id: DocumentId::new(),
        company_id: CompanyId::new(),
        local_content: local.to_string(),
        local_updated_at: Utc::now(),
        local_actor: Some(ActorId::new()),
        remote_content: remote.to_string(),
        remote_updated_at: Utc::now(),
        remote_source: "word".to_string(),
        resolution: None,
        resolved_by: None,
        resolved_at: None,
        created_at: Utc::now(),
    }
}

// ── Suggested merge ─────────────────────────────────────────────

#[test]
fn identical_sides_merge_cleanly() {
    let merged = suggested_merge("a\nb", "a\nb");
    assert_eq!(merged, "a\nb");
}

#[test]
fn extra_lines_from_either_side_are_kept() {
    assert_eq!(suggested_merge("a\nb\nc", "a"), "a\nb\nc");
    assert_eq!(suggested_merge("a", "a\nx\ny"), "a\nx\ny");
}

#[test]
fn conflicting_lines_get_markers() {
    let merged = suggested_merge("shared\nlocal line", "shared\nremote line");
    assert_eq!(
        merged,
        "shared\n<<<<<<< local\nlocal line\n=======\nremote line\n>>>>>>> remote"
    );
}

// ── Conflict diff ───────────────────────────────────────────────

#[test]
fn conflict_diff_renders_both_orientations() {
    let conflict = make_conflict("shared\nlocal only", "shared\nremote only");
    let diff = conflict_diff(&conflict);

    assert_eq!(diff.local[0].kind, DiffKind::Unchanged);
    assert_eq!(diff.local[1].kind, DiffKind::Addition);
    assert_eq!(diff.local[1].content, "local only");
    assert_eq!(diff.local[2].kind, DiffKind::Deletion);
    assert_eq!(diff.local[2].content, "remote only");

    assert_eq!(diff.remote[1].kind, DiffKind::Addition);
    assert_eq!(diff.remote[1].content, "remote only");
}

#[test]
fn conflict_diff_of_identical_snapshots_is_all_unchanged() {
    let conflict = make_conflict("same", "same");
    let diff = conflict_diff(&conflict);
    assert!(diff.local.iter().all(|l| l.kind == DiffKind::Unchanged));
    assert!(diff.remote.iter().all(|l| l.kind == DiffKind::Unchanged));
}
