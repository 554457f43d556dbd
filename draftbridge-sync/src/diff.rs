//! Line-level and section-level diffing for the conflict view.
//!
//! The line diff is presence-based: every line of the primary side is
//! classified by whether it appears anywhere on the other side, and
//! other-only lines are appended as deletions. It tolerates reordering
//! cheaply but over-reports additions/deletions when a line is duplicated
//! at different positions. That trade-off is intentional for a
//! human-facing conflict viewer; callers must not assume a minimal edit
//! script.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Classification of a diff line relative to the chosen primary side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Addition,
    Deletion,
    Unchanged,
}

/// One rendered diff line. Derived view only, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffLine {
    pub content: String,
    pub kind: DiffKind,
    /// 1-based display line number; deletions continue contiguously
    /// after the primary lines.
    pub line_number: usize,
}

/// Compact change counts over a set of diff lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub additions: usize,
    pub deletions: usize,
    pub unchanged: usize,
}

/// Computes the presence-based line diff of `primary` against `other`.
///
/// Primary lines present anywhere in `other` are `Unchanged`, the rest are
/// `Addition`; lines present only in `other` are appended as `Deletion`
/// entries numbered after the primary lines.
#[must_use]
pub fn compute_diff(primary: &str, other: &str) -> Vec<DiffLine> {
    let primary_lines: Vec<&str> = primary.split('\n').collect();
    let other_lines: Vec<&str> = other.split('\n').collect();
    let other_set: HashSet<&str> = other_lines.iter().copied().collect();
    let primary_set: HashSet<&str> = primary_lines.iter().copied().collect();

    let mut result = Vec::with_capacity(primary_lines.len());

    for (index, line) in primary_lines.iter().enumerate() {
        let kind = if other_set.contains(line) {
            DiffKind::Unchanged
        } else {
            DiffKind::Addition
        };
        result.push(DiffLine {
            content: (*line).to_string(),
            kind,
            line_number: index + 1,
        });
    }

    let mut line_number = primary_lines.len() + 1;
    for line in &other_lines {
        if !primary_set.contains(line) {
            result.push(DiffLine {
                content: (*line).to_string(),
                kind: DiffKind::Deletion,
                line_number,
            });
            line_number += 1;
        }
    }

    result
}

/// Counts additions, deletions and unchanged lines.
#[must_use]
pub fn summarize(lines: &[DiffLine]) -> DiffSummary {
    let mut summary = DiffSummary::default();
    for line in lines {
        match line.kind {
            DiffKind::Addition => summary.additions += 1,
            DiffKind::Deletion => summary.deletions += 1,
            DiffKind::Unchanged => summary.unchanged += 1,
        }
    }
    summary
}

/// Section-level comparison of two named-section mappings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDiff {
    /// Section names present only in the new mapping.
    pub added: Vec<String>,
    /// Section names present only in the old mapping.
    pub removed: Vec<String>,
    /// Section names present in both with differing bodies.
    pub modified: Vec<String>,
    /// Count of sections with identical bodies.
    pub unchanged: usize,
}

/// Compares two section mappings by name.
#[must_use]
pub fn compute_section_diff(
    old: &IndexMap<String, String>,
    new: &IndexMap<String, String>,
) -> SectionDiff {
    let mut diff = SectionDiff::default();

    for (name, old_body) in old {
        match new.get(name) {
            None => diff.removed.push(name.clone()),
            Some(new_body) if new_body != old_body => diff.modified.push(name.clone()),
            Some(_) => diff.unchanged += 1,
        }
    }

    for name in new.keys() {
        if !old.contains_key(name) {
            diff.added.push(name.clone());
        }
    }

    diff
}
