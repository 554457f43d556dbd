//! Content integrity checks run around provider round trips.
//!
//! Providers carrying required sensitivity banners get a checker that runs
//! after every pull and before every push. A failed check fails that sync
//! step; markings are never silently repaired or stripped.

use draftbridge_types::DocumentContent;

/// Standard sensitivity-banner patterns, per NIST SP 800-171 CUI marking.
pub const SENSITIVITY_MARKERS: [&str; 4] = [
    "CUI",
    "CONTROLLED UNCLASSIFIED INFORMATION",
    "CUI//SP-CTI",
    "CUI//SP-EXPT",
];

/// Provider-specific invariant check over canonical content.
pub trait IntegrityChecker: Send + Sync {
    /// Returns true if required markings survive in the content.
    fn verify_markings(&self, content: &DocumentContent) -> bool;
}

/// Checker that requires at least one of a set of textual markers to be
/// present (case-insensitive) somewhere in the canonical content.
pub struct MarkingChecker {
    markers: Vec<String>,
}

impl MarkingChecker {
    /// Creates a checker requiring any of the given markers.
    #[must_use]
    pub fn new(markers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.into().to_uppercase())
                .collect(),
        }
    }

    /// Creates a checker with the standard sensitivity-banner set.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(SENSITIVITY_MARKERS)
    }
}

impl IntegrityChecker for MarkingChecker {
    fn verify_markings(&self, content: &DocumentContent) -> bool {
        let text = content.canonical_text();
        if text.trim().is_empty() {
            return false;
        }
        let upper = text.to_uppercase();
        self.markers.iter().any(|marker| upper.contains(marker))
    }
}
