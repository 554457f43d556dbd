use draftbridge_types::{CellValue, ContentKind, DocumentContent};
use draftbridge_sync::{IntegrityChecker, MarkingChecker};
use std::collections::BTreeMap;

fn section_content(text: &str) -> DocumentContent {
    DocumentContent::from_canonical(ContentKind::Sections, text).unwrap()
}

#[test]
fn marked_content_passes() {
    let checker = MarkingChecker::standard();
    let content = section_content("CUI//SP-CTI\n\n# Scope\nEverything.");
    assert!(checker.verify_markings(&content));
}

#[test]
fn marking_match_is_case_insensitive() {
    let checker = MarkingChecker::standard();
    let content = section_content("# Banner\ncontrolled unclassified information");
    assert!(checker.verify_markings(&content));
}

#[test]
fn unmarked_content_fails() {
    let checker = MarkingChecker::standard();
    let content = section_content("# Scope\nNothing sensitive here.");
    assert!(!checker.verify_markings(&content));
}

#[test]
fn empty_content_fails() {
    let checker = MarkingChecker::standard();
    assert!(!checker.verify_markings(&DocumentContent::empty(ContentKind::Sections)));
}

#[test]
fn custom_markers_apply_to_cell_content() {
    let checker = MarkingChecker::new(["PROPRIETARY"]);
    let mut cells = BTreeMap::new();
    cells.insert("A1".to_string(), CellValue::Text("Proprietary".to_string()));
    cells.insert("B2".to_string(), CellValue::Number(42.0));
    assert!(checker.verify_markings(&DocumentContent::Cells(cells.clone())));

    cells.insert("A1".to_string(), CellValue::Text("Public".to_string()));
    assert!(!checker.verify_markings(&DocumentContent::Cells(cells)));
}
