//! Core type definitions for Draftbridge.
//!
//! This crate defines the sync-engine-agnostic types shared across the
//! workspace:
//! - Document, company, actor, mirror and conflict identifiers (UUID v7)
//! - The canonical content model (named sections / sparse cell maps)
//! - The external provider enumeration
//!
//! Provider wire formats, persistence schemas and engine state live in
//! `draftbridge-sync`, not here.

mod content;
mod ids;
mod provider;

pub use content::{
    column_letter_to_index, index_to_column_letter, split_cell_ref, CellValue, ContentKind,
    DocumentContent, PREAMBLE_SECTION,
};
pub use ids::{ActorId, CompanyId, ConflictId, DocumentId, MirrorId};
pub use provider::Provider;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("malformed content: {0}")]
    Content(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}
