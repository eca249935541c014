//! Error types for document and block operations.

use thiserror::Error;

use sopdoc_types::{BlockId, BlockKind, ContentError, DocumentId, DocumentStatus, PrefixError};

/// Errors surfaced by the block service, assembler and façade.
///
/// All variants are recoverable at the caller boundary. Structural problems
/// with a whole document are reported as validation findings instead.
#[derive(Error, Debug)]
pub enum SopError {
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("block not found: {0}")]
    BlockNotFound(BlockId),

    /// Tag outside the closed block kind set.
    #[error("invalid block type: {0:?}")]
    InvalidBlockType(String),

    /// Payload does not fit the declared kind.
    #[error("invalid {kind} content: {source}")]
    InvalidContent {
        kind: BlockKind,
        #[source]
        source: ContentError,
    },

    /// Insert or move target outside `0..=len` (insert) or `0..len` (move).
    #[error("position {position} out of range for document with {len} blocks")]
    InvalidPosition { position: u32, len: u32 },

    #[error("unsupported format: {0:?}")]
    UnsupportedFormat(String),

    #[error("document key already exists: {0}")]
    DuplicateKey(String),

    /// Blank document key.
    #[error("invalid document key {0:?}: must not be blank")]
    InvalidKey(String),

    #[error("document title must not be blank")]
    BlankTitle,

    #[error("{0}")]
    AmbiguousReference(String),

    #[error("cannot move document from {from} to {to}")]
    InvalidStatusTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SopError {
    pub fn document_not_found(id: DocumentId) -> Self {
        SopError::DocumentNotFound(id.to_string())
    }

    /// True for unknown document or block references.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SopError::DocumentNotFound(_) | SopError::BlockNotFound(_))
    }
}

impl From<PrefixError> for SopError {
    fn from(e: PrefixError) -> Self {
        match e {
            PrefixError::NoMatch(query) => SopError::DocumentNotFound(query),
            ambiguous @ PrefixError::Ambiguous { .. } => {
                SopError::AmbiguousReference(ambiguous.to_string())
            }
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, SopError>;
