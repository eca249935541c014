//! Block-based SOP documents on SQLite.
//!
//! ```text
//!                 ┌──────────────┐
//!   caller ─────▶ │  SopService  │
//!                 └──┬────┬────┬─┘
//!        ┌───────────┘    │    └───────────────┐
//!        ▼                ▼                    ▼
//!  BlockService   DocumentAssembler   DocumentValidator
//!        │          (html, markdown,     (templates,
//!        ▼           plain_text, json)    positions)
//!  DocumentDb (SQLite: documents, blocks)
//! ```
//!
//! Mutations go through [`BlockService`], which keeps each document's block
//! positions dense (`0..n`) by running every shift in one IMMEDIATE
//! transaction. Assembly and validation are pure functions over a snapshot of
//! a document's header and blocks.

pub mod assembly;
pub mod block_service;
pub mod config;
pub mod db;
pub mod error;
pub mod sop_service;
pub mod validation;

pub use assembly::{AssembledDocument, AssemblyFormat, AssemblyOptions, DocumentAssembler, PPE_MARKER};
pub use block_service::{parse_content, BlockService};
pub use config::{ConfigError, SopConfig};
pub use db::{DocumentDb, SharedDb};
pub use error::{Result, SopError};
pub use sop_service::SopService;
pub use validation::{DocumentValidator, Finding, Severity, Template, ValidationReport};

// Re-export the model so callers need only one dependency.
pub use sopdoc_types;
