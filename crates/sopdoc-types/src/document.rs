//! Document header types.
//!
//! A [`Document`] carries identity and lifecycle metadata only; its blocks are
//! loaded separately (ordered by position) so headers stay cheap to list.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::DocumentId;

/// Kind of document; selects the validation template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum DocumentKind {
    /// Standard operating procedure.
    #[default]
    Sop,
    Procedure,
    Checklist,
    Policy,
}

impl DocumentKind {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Sop => "sop",
            DocumentKind::Procedure => "procedure",
            DocumentKind::Checklist => "checklist",
            DocumentKind::Policy => "policy",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Publication lifecycle.
///
/// ```text
/// draft ⇄ review → approved → published → archived
///   │                 │
///   └──→ archived     └──→ draft
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum DocumentStatus {
    #[default]
    Draft,
    #[strum(serialize = "review", serialize = "in_review")]
    Review,
    Approved,
    Published,
    Archived,
}

impl DocumentStatus {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Review => "review",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Published => "published",
            DocumentStatus::Archived => "archived",
        }
    }

    /// Whether moving from `self` to `next` is allowed. Same-status is allowed.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        *self == next
            || matches!(
                (self, next),
                (Draft, Review)
                    | (Draft, Archived)
                    | (Review, Draft)
                    | (Review, Approved)
                    | (Approved, Draft)
                    | (Approved, Published)
                    | (Published, Archived)
            )
    }

    /// Archived documents accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Archived)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted document header.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// Unique human-readable key (e.g. `lab-safety`).
    pub key: String,
    pub kind: DocumentKind,
    pub status: DocumentStatus,
    pub title: String,
    /// Free-form metadata (department, risk level, review cadence, ...).
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Bumped by every block mutation; an optimistic version counter.
    #[serde(default)]
    pub revision: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Input for creating a document.
#[derive(Clone, Debug, PartialEq)]
pub struct NewDocument {
    pub key: String,
    pub title: String,
    pub kind: DocumentKind,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl NewDocument {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            kind: DocumentKind::default(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn kind(mut self, kind: DocumentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Materialize into a draft document with a fresh ID.
    pub fn into_document(self) -> Document {
        let now = crate::now_millis();
        Document {
            id: DocumentId::new(),
            key: self.key,
            kind: self.kind,
            status: DocumentStatus::Draft,
            title: self.title,
            metadata: self.metadata,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use DocumentStatus::*;
        assert!(Draft.can_transition_to(Review));
        assert!(Review.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Published));
        assert!(Published.can_transition_to(Archived));
        assert!(Published.can_transition_to(Published));

        assert!(!Draft.can_transition_to(Published));
        assert!(!Archived.can_transition_to(Draft));
        assert!(!Published.can_transition_to(Draft));
        assert!(Archived.is_terminal());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(DocumentStatus::from_str("PUBLISHED"), Some(DocumentStatus::Published));
        assert_eq!(DocumentStatus::from_str("in_review"), Some(DocumentStatus::Review));
        assert_eq!(DocumentStatus::from_str("deleted"), None);
        assert_eq!(DocumentKind::from_str("Procedure"), Some(DocumentKind::Procedure));
    }

    #[test]
    fn test_new_document_is_draft() {
        let doc = NewDocument::new("lab-safety", "Laboratory Safety Procedures")
            .metadata("department", "Laboratory")
            .into_document();
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert_eq!(doc.kind, DocumentKind::Sop);
        assert_eq!(doc.metadata["department"], "Laboratory");
        assert_eq!(doc.revision, 0);
    }
}
