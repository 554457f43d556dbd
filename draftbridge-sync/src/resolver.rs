//! Conflict resolution decisions and helpers for the conflict view.
//!
//! The engine applies decisions (see [`crate::SyncEngine::resolve_conflict`]);
//! this module carries the decision type and the pure rendering helpers
//! the conflict UI consumes.

use crate::diff::{compute_diff, DiffLine};
use crate::state::SyncConflict;

/// A human (or policy) decision applied to a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionDecision {
    /// Push the conflict's local snapshot to the provider; local content
    /// is left untouched.
    KeepLocal,
    /// Overwrite local content with the remote snapshot; no remote call.
    KeepRemote,
    /// Write externally supplied merged content to both sides.
    Merge { merged: String },
}

/// Both diff orientations for a conflict view.
#[derive(Debug, Clone)]
pub struct ConflictDiff {
    /// Local snapshot as the primary side.
    pub local: Vec<DiffLine>,
    /// Remote snapshot as the primary side.
    pub remote: Vec<DiffLine>,
}

/// Renders the two snapshots of a conflict through the diff engine,
/// once from each side's perspective.
#[must_use]
pub fn conflict_diff(conflict: &SyncConflict) -> ConflictDiff {
    ConflictDiff {
        local: compute_diff(&conflict.local_content, &conflict.remote_content),
        remote: compute_diff(&conflict.remote_content, &conflict.local_content),
    }
}

/// Produces a line-interleaved merge proposal from the two snapshots.
/// Non-conflicting lines from both sides are kept; conflicting lines are
/// wrapped in `<<<<<<< local` / `>>>>>>> remote` markers for manual
/// editing. A starting point for the human resolver, never applied
/// automatically.
#[must_use]
pub fn suggested_merge(local: &str, remote: &str) -> String {
    let local_lines: Vec<&str> = local.split('\n').collect();
    let remote_lines: Vec<&str> = remote.split('\n').collect();
    let max_len = local_lines.len().max(remote_lines.len());

    let mut merged: Vec<String> = Vec::new();
    for index in 0..max_len {
        match (local_lines.get(index), remote_lines.get(index)) {
            (Some(l), None) => merged.push((*l).to_string()),
            (None, Some(r)) => merged.push((*r).to_string()),
            (Some(l), Some(r)) if l == r => merged.push((*l).to_string()),
            (Some(l), Some(r)) => {
                merged.push("<<<<<<< local".to_string());
                merged.push((*l).to_string());
                merged.push("=======".to_string());
                merged.push((*r).to_string());
                merged.push(">>>>>>> remote".to_string());
            }
            (None, None) => break,
        }
    }

    merged.join("\n")
}
