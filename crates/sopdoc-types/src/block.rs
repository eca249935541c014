//! Block kinds and positioned blocks.
//!
//! `BlockKind` is the closed tag set. Every kind has exactly one content shape,
//! carried by the matching [`BlockContent`] variant, so a `Block` can never hold
//! a payload that disagrees with its kind.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::content::BlockContent;
use crate::ids::{BlockId, DocumentId};

/// What a block *is* (content type).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum BlockKind {
    /// Document title, rendered as the top-level heading.
    #[strum(serialize = "title")]
    Title,
    /// Body paragraph describing the document's purpose.
    #[strum(serialize = "description")]
    Description,
    /// Subheading; also a table-of-contents entry.
    #[strum(serialize = "section_header", serialize = "section", serialize = "sectionheader")]
    SectionHeader,
    /// Numbered procedure step with PPE flag.
    #[strum(serialize = "step")]
    Step,
    /// Clarifying question with optional answer.
    #[strum(serialize = "question")]
    Question,
    /// Hazard callout.
    #[strum(serialize = "warning")]
    Warning,
    /// Lesser hazard callout.
    #[strum(serialize = "caution")]
    Caution,
    /// Protective equipment notice.
    #[strum(serialize = "ppe_required", serialize = "ppe")]
    PpeRequired,
    /// Trailing reference material.
    #[strum(serialize = "additional_info", serialize = "info")]
    AdditionalInfo,
    /// Image reference with caption.
    #[strum(serialize = "image")]
    Image,
    /// List of checkable items.
    #[strum(serialize = "checklist")]
    Checklist,
}

impl BlockKind {
    /// Every kind, in declaration order.
    pub const ALL: [BlockKind; 11] = [
        BlockKind::Title,
        BlockKind::Description,
        BlockKind::SectionHeader,
        BlockKind::Step,
        BlockKind::Question,
        BlockKind::Warning,
        BlockKind::Caution,
        BlockKind::PpeRequired,
        BlockKind::AdditionalInfo,
        BlockKind::Image,
        BlockKind::Checklist,
    ];

    /// Parse from string (case-insensitive).
    ///
    /// Supports aliases: "section" -> SectionHeader, "ppe" -> PpeRequired,
    /// "info" -> AdditionalInfo.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation (the stored tag).
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Title => "title",
            BlockKind::Description => "description",
            BlockKind::SectionHeader => "section_header",
            BlockKind::Step => "step",
            BlockKind::Question => "question",
            BlockKind::Warning => "warning",
            BlockKind::Caution => "caution",
            BlockKind::PpeRequired => "ppe_required",
            BlockKind::AdditionalInfo => "additional_info",
            BlockKind::Image => "image",
            BlockKind::Checklist => "checklist",
        }
    }

    /// Kinds whose content is a single `{ text }` field.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            BlockKind::Title
                | BlockKind::Description
                | BlockKind::SectionHeader
                | BlockKind::Warning
                | BlockKind::Caution
                | BlockKind::PpeRequired
                | BlockKind::AdditionalInfo
        )
    }

    /// Kinds listed in a generated table of contents.
    pub fn in_table_of_contents(&self) -> bool {
        matches!(self, BlockKind::SectionHeader | BlockKind::Step)
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A block at a position within its document.
///
/// Positions are zero-based and dense within a document: the blocks of a
/// document with `n` blocks occupy exactly `0..n`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    /// Owning document (back-reference; the document owns the block).
    pub document_id: DocumentId,
    pub position: u32,
    pub content: BlockContent,
    /// Free-form annotations (source references, review notes). Not rendered.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Block {
    /// Create a fresh block with a new ID and current timestamps.
    pub fn new(document_id: DocumentId, position: u32, content: BlockContent) -> Self {
        let now = crate::now_millis();
        Self {
            id: BlockId::new(),
            document_id,
            position,
            content,
            metadata: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the block's metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// The block's kind, derived from its content variant.
    pub fn kind(&self) -> BlockKind {
        self.content.kind()
    }

    /// Copy of this block (content and metadata) with a new identity at `position`.
    pub fn duplicate_at(&self, position: u32) -> Self {
        Self::new(self.document_id, position, self.content.clone()).with_metadata(self.metadata.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in BlockKind::ALL {
            assert_eq!(BlockKind::from_str(kind.as_str()), Some(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!(BlockKind::from_str("SECTION"), Some(BlockKind::SectionHeader));
        assert_eq!(BlockKind::from_str("ppe"), Some(BlockKind::PpeRequired));
        assert_eq!(BlockKind::from_str("Info"), Some(BlockKind::AdditionalInfo));
        assert_eq!(BlockKind::from_str("risk_assessment"), None);
        assert_eq!(BlockKind::from_str(""), None);
    }

    #[test]
    fn test_duplicate_has_new_identity() {
        let doc = DocumentId::new();
        let mut metadata = serde_json::Map::new();
        metadata.insert("source".into(), "OSHA 1910.132".into());
        let original = Block::new(doc, 2, BlockContent::title("Safety")).with_metadata(metadata);
        let copy = original.duplicate_at(3);
        assert_ne!(copy.id, original.id);
        assert_eq!(copy.document_id, doc);
        assert_eq!(copy.position, 3);
        assert_eq!(copy.content, original.content);
        assert_eq!(copy.metadata["source"], "OSHA 1910.132");
        assert_eq!(copy.kind(), BlockKind::Title);
    }
}
