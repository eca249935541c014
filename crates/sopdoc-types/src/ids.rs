//! Typed identifiers for documents and blocks.
//!
//! Both wrap UUIDv7 (time-ordered, globally unique). They are stored as 32-char
//! hex in SQLite and display as standard UUID text for logging. The `short()`
//! form (first 8 hex chars) is for display. UUIDv7 prefixes are timestamps and
//! collide easily, so lookups go through prefix resolution, which reports
//! ambiguity instead of guessing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A document identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(uuid::Uuid);

/// A block identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(uuid::Uuid);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Create a new time-ordered ID (UUIDv7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// First 8 hex characters, for human display only.
            pub fn short(&self) -> String {
                self.0.as_simple().to_string()[..8].to_string()
            }

            /// Full 32-character hex string (no hyphens). This is the stored form.
            pub fn to_hex(&self) -> String {
                self.0.as_simple().to_string()
            }

            /// Parse from a hex string (32 chars, no hyphens) or standard UUID format.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                uuid::Uuid::parse_str(s).map(Self)
            }

            /// Check if a query string matches this ID by hex prefix.
            pub fn matches_hex_prefix(&self, prefix: &str) -> bool {
                !prefix.is_empty() && self.to_hex().starts_with(&prefix.to_ascii_lowercase())
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $T {
            fn from(u: uuid::Uuid) -> Self {
                Self(u)
            }
        }

        impl From<$T> for uuid::Uuid {
            fn from(id: $T) -> uuid::Uuid {
                id.0
            }
        }

        impl std::str::FromStr for $T {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Full UUID with hyphens for log readability
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_typed_id!(DocumentId, "DocumentId");
impl_typed_id!(BlockId, "BlockId");

// ── Prefix resolution ───────────────────────────────────────────────────────

/// Error from ambiguous prefix resolution.
#[derive(Debug, thiserror::Error)]
pub enum PrefixError {
    #[error("no document matches '{0}'")]
    NoMatch(String),
    #[error("ambiguous reference '{prefix}': matches {candidates:?}")]
    Ambiguous {
        prefix: String,
        candidates: Vec<String>,
    },
}

/// Resolve a query string against document IDs and their keys.
///
/// Resolution order:
/// 1. Exact key match
/// 2. Exact full ID (hex or hyphenated)
/// 3. Unique key prefix match
/// 4. Unique hex prefix match
/// 5. Error (no match or ambiguous)
pub fn resolve_document_prefix<'a>(
    documents: impl Iterator<Item = (DocumentId, &'a str)>,
    query: &str,
) -> Result<DocumentId, PrefixError> {
    if query.trim().is_empty() {
        return Err(PrefixError::NoMatch(query.to_string()));
    }
    let entries: Vec<(DocumentId, &str)> = documents.collect();

    // 1. Exact key match
    if let Some(&(id, _)) = entries.iter().find(|(_, key)| *key == query) {
        return Ok(id);
    }

    // 2. Exact ID
    if let Ok(parsed) = DocumentId::parse(query)
        && let Some(&(id, _)) = entries.iter().find(|(id, _)| *id == parsed)
    {
        return Ok(id);
    }

    // 3. Unique key prefix match
    let key_matches: Vec<(DocumentId, &str)> = entries
        .iter()
        .filter(|(_, key)| key.starts_with(query))
        .copied()
        .collect();

    if key_matches.len() == 1 {
        return Ok(key_matches[0].0);
    }
    if key_matches.len() > 1 {
        return Err(PrefixError::Ambiguous {
            prefix: query.to_string(),
            candidates: key_matches.iter().map(|(_, k)| k.to_string()).collect(),
        });
    }

    // 4. Unique hex prefix match
    let hex_matches: Vec<DocumentId> = entries
        .iter()
        .filter(|(id, _)| id.matches_hex_prefix(query))
        .map(|(id, _)| *id)
        .collect();

    match hex_matches.len() {
        0 => Err(PrefixError::NoMatch(query.to_string())),
        1 => Ok(hex_matches[0]),
        _ => Err(PrefixError::Ambiguous {
            prefix: query.to_string(),
            candidates: hex_matches.iter().map(|id| id.to_hex()).collect(),
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================
