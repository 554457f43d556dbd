use draftbridge_sync::{compute_diff, compute_section_diff, summarize, DiffKind};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;

fn section_map(entries: &[(&str, &str)]) -> IndexMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ── Presence-based line diff ────────────────────────────────────

#[test]
fn identical_strings_have_no_changes() {
    let text = "alpha\nbeta\ngamma";
    let lines = compute_diff(text, text);

    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|l| l.kind == DiffKind::Unchanged));

    let summary = summarize(&lines);
    assert_eq!(summary.additions, 0);
    assert_eq!(summary.deletions, 0);
    assert_eq!(summary.unchanged, 3);
}

#[test]
fn all_primary_lines_are_additions_against_empty() {
    let lines = compute_diff("alpha\nbeta", "");

    let primary: Vec<_> = lines.iter().take(2).collect();
    assert!(primary.iter().all(|l| l.kind == DiffKind::Addition));

    // Splitting the empty string yields one empty line, which survives
    // as a trailing deletion entry.
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2].kind, DiffKind::Deletion);
    assert_eq!(lines[2].content, "");
}

#[test]
fn line_numbers_are_contiguous() {
    let lines = compute_diff("one\ntwo", "two\nthree\nfour");

    let numbers: Vec<usize> = lines.iter().map(|l| l.line_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);

    assert_eq!(lines[0].kind, DiffKind::Addition); // "one"
    assert_eq!(lines[1].kind, DiffKind::Unchanged); // "two"
    assert_eq!(lines[2].kind, DiffKind::Deletion); // "three"
    assert_eq!(lines[3].kind, DiffKind::Deletion); // "four"
}

#[test]
fn reordering_is_tolerated() {
    let lines = compute_diff("beta\nalpha", "alpha\nbeta");
    assert!(lines.iter().all(|l| l.kind == DiffKind::Unchanged));
}

#[test]
fn duplicate_lines_over_report() {
    // Known limitation of the presence-based diff: a duplicated line is
    // indistinguishable from its first occurrence, so neither side
    // reports the second copy as a change.
    let lines = compute_diff("x\nx", "x");
    assert!(lines.iter().all(|l| l.kind == DiffKind::Unchanged));
}

#[test]
fn summary_counts_each_kind() {
    let lines = compute_diff("keep\nlocal only", "keep\nremote only");
    let summary = summarize(&lines);
    assert_eq!(summary.additions, 1);
    assert_eq!(summary.deletions, 1);
    assert_eq!(summary.unchanged, 1);
}

// ── Section diff ────────────────────────────────────────────────

#[test]
fn section_diff_classifies_by_name() {
    let old = section_map(&[
        ("Scope", "original"),
        ("Pricing", "1.5M"),
        ("Staffing", "five people"),
    ]);
    let new = section_map(&[
        ("Scope", "revised"),
        ("Staffing", "five people"),
        ("Schedule", "six months"),
    ]);

    let diff = compute_section_diff(&old, &new);
    assert_eq!(diff.modified, vec!["Scope".to_string()]);
    assert_eq!(diff.removed, vec!["Pricing".to_string()]);
    assert_eq!(diff.added, vec!["Schedule".to_string()]);
    assert_eq!(diff.unchanged, 1);
}

#[test]
fn section_diff_of_identical_maps_is_empty() {
    let sections = section_map(&[("A", "1"), ("B", "2")]);
    let diff = compute_section_diff(&sections, &sections);
    assert!(diff.added.is_empty());
    assert!(diff.removed.is_empty());
    assert!(diff.modified.is_empty());
    assert_eq!(diff.unchanged, 2);
}
