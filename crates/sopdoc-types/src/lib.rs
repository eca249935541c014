//! Shared document and block types for sopdoc.
//!
//! This crate is the leaf of the workspace: typed IDs, the closed set of
//! block kinds with their content shapes, and document metadata. It has
//! **no storage or rendering dependencies**; `sopdoc-service` builds on it.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! Document (DocumentId, unique key)
//!     └── kind (sop, procedure, checklist, policy)
//!     └── status (draft → review → approved → published → archived)
//!     └── owns Block* (dense positions 0..n)
//!
//! Block (BlockId)
//!     └── document_id back-reference
//!     └── content: BlockContent (one variant per BlockKind)
//! ```
//!
//! # Key Types
//!
//! |--------------------|---------------------------------------------|
//! | Type               | Purpose                                     |
//! |--------------------|---------------------------------------------|
//! | [`DocumentId`]     | Which document                              |
//! | [`BlockId`]        | Which block                                 |
//! | [`BlockKind`]      | Closed tag set (title, step, ...)           |
//! | [`BlockContent`]   | Tagged payload, shape checked per kind      |
//! | [`Block`]          | Positioned block within a document          |
//! | [`Document`]       | Document header (key, kind, status, title)  |
//! |--------------------|---------------------------------------------|

pub mod block;
pub mod content;
pub mod document;
pub mod ids;

pub use block::{Block, BlockKind};
pub use content::{
    BlockContent, ChecklistContent, ChecklistItem, ContentError, ImageContent, QuestionContent,
    QuestionStatus, StepContent, TextContent,
};
pub use document::{Document, DocumentKind, DocumentStatus, NewDocument};
pub use ids::{BlockId, DocumentId, PrefixError, resolve_document_prefix};

/// Current time as Unix milliseconds. Used by constructors throughout the crate.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
