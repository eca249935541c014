//! Block content shapes.
//!
//! [`BlockContent`] is adjacently tagged (`{"kind": ..., "content": {...}}`) so
//! the payload half can be stored and transported on its own next to a kind
//! column. [`BlockContent::parse`] is the single entry point for untrusted
//! payloads: it runs the serde shape check and then [`BlockContent::check`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::BlockKind;

/// Reasons a payload does not fit its block kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    /// Wrong fields or field types for the kind.
    #[error("malformed content: {0}")]
    Malformed(String),

    /// A required text field is blank.
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("checklist has no items")]
    EmptyChecklist,

    #[error("checklist item id {0} appears more than once")]
    DuplicateChecklistItem(u32),

    /// Question marked answered without an answer.
    #[error("answered question has no answer")]
    MissingAnswer,
}

/// Payload for every `{ text }` kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

/// Payload for [`BlockKind::Step`].
///
/// Field aliases accept the `step_*` names used by older payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepContent {
    /// Explicit step number; renderers fall back to the step's ordinal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_number: Option<u32>,
    #[serde(alias = "step_description")]
    pub description: String,
    #[serde(alias = "step_instructions")]
    pub instructions: String,
    #[serde(default, alias = "step_expected_result", skip_serializing_if = "Option::is_none")]
    pub expected_result: Option<String>,
    #[serde(default, alias = "step_who_responsible", skip_serializing_if = "Option::is_none")]
    pub responsible: Option<String>,
    pub ppe_required: bool,
    #[serde(default, alias = "step_image_url", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl StepContent {
    pub fn new(description: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            step_number: None,
            description: description.into(),
            instructions: instructions.into(),
            expected_result: None,
            responsible: None,
            ppe_required: false,
            image_url: None,
        }
    }

    pub fn number(mut self, n: u32) -> Self {
        self.step_number = Some(n);
        self
    }

    pub fn ppe_required(mut self, required: bool) -> Self {
        self.ppe_required = required;
        self
    }

    pub fn expected_result(mut self, result: impl Into<String>) -> Self {
        self.expected_result = Some(result.into());
        self
    }

    pub fn responsible(mut self, who: impl Into<String>) -> Self {
        self.responsible = Some(who.into());
        self
    }
}

/// Lifecycle of a clarifying question.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    #[default]
    Open,
    Answered,
    Declined,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Open => "open",
            QuestionStatus::Answered => "answered",
            QuestionStatus::Declined => "declined",
        }
    }
}

impl std::fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload for [`BlockKind::Question`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionContent {
    pub question: String,
    #[serde(default)]
    pub status: QuestionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// Payload for [`BlockKind::Image`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageContent {
    #[serde(alias = "image_url")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: u32,
    pub text: String,
    #[serde(default)]
    pub checked: bool,
}

/// Payload for [`BlockKind::Checklist`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistContent {
    pub items: Vec<ChecklistItem>,
    #[serde(default)]
    pub allow_multiple: bool,
}

/// Typed block payload, one variant per [`BlockKind`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum BlockContent {
    Title(TextContent),
    Description(TextContent),
    SectionHeader(TextContent),
    Step(StepContent),
    Question(QuestionContent),
    Warning(TextContent),
    Caution(TextContent),
    PpeRequired(TextContent),
    AdditionalInfo(TextContent),
    Image(ImageContent),
    Checklist(ChecklistContent),
}

impl BlockContent {
    pub fn title(text: impl Into<String>) -> Self {
        BlockContent::Title(TextContent { text: text.into() })
    }

    pub fn description(text: impl Into<String>) -> Self {
        BlockContent::Description(TextContent { text: text.into() })
    }

    pub fn section_header(text: impl Into<String>) -> Self {
        BlockContent::SectionHeader(TextContent { text: text.into() })
    }

    /// Build a text-bearing block of `kind`. Returns `None` for structured kinds.
    pub fn text_of_kind(kind: BlockKind, text: impl Into<String>) -> Option<Self> {
        let t = TextContent { text: text.into() };
        Some(match kind {
            BlockKind::Title => BlockContent::Title(t),
            BlockKind::Description => BlockContent::Description(t),
            BlockKind::SectionHeader => BlockContent::SectionHeader(t),
            BlockKind::Warning => BlockContent::Warning(t),
            BlockKind::Caution => BlockContent::Caution(t),
            BlockKind::PpeRequired => BlockContent::PpeRequired(t),
            BlockKind::AdditionalInfo => BlockContent::AdditionalInfo(t),
            BlockKind::Step | BlockKind::Question | BlockKind::Image | BlockKind::Checklist => {
                return None;
            }
        })
    }

    /// Parse an untrusted payload for `kind` and check it.
    ///
    /// A bare JSON string is accepted as `{ "text": ... }` for text kinds.
    pub fn parse(kind: BlockKind, payload: serde_json::Value) -> Result<Self, ContentError> {
        let payload = match payload {
            serde_json::Value::String(text) if kind.is_text() => {
                serde_json::json!({ "text": text })
            }
            other => other,
        };
        let tagged = serde_json::json!({ "kind": kind.as_str(), "content": payload });
        let content: BlockContent =
            serde_json::from_value(tagged).map_err(|e| ContentError::Malformed(e.to_string()))?;
        content.check()?;
        Ok(content)
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            BlockContent::Title(_) => BlockKind::Title,
            BlockContent::Description(_) => BlockKind::Description,
            BlockContent::SectionHeader(_) => BlockKind::SectionHeader,
            BlockContent::Step(_) => BlockKind::Step,
            BlockContent::Question(_) => BlockKind::Question,
            BlockContent::Warning(_) => BlockKind::Warning,
            BlockContent::Caution(_) => BlockKind::Caution,
            BlockContent::PpeRequired(_) => BlockKind::PpeRequired,
            BlockContent::AdditionalInfo(_) => BlockKind::AdditionalInfo,
            BlockContent::Image(_) => BlockKind::Image,
            BlockContent::Checklist(_) => BlockKind::Checklist,
        }
    }

    /// The `{ text }` payload of text kinds.
    pub fn text(&self) -> Option<&str> {
        match self {
            BlockContent::Title(t)
            | BlockContent::Description(t)
            | BlockContent::SectionHeader(t)
            | BlockContent::Warning(t)
            | BlockContent::Caution(t)
            | BlockContent::PpeRequired(t)
            | BlockContent::AdditionalInfo(t) => Some(&t.text),
            _ => None,
        }
    }

    /// The untagged payload half, as stored in the `content` column.
    pub fn payload(&self) -> serde_json::Value {
        let value = match self {
            BlockContent::Title(t)
            | BlockContent::Description(t)
            | BlockContent::SectionHeader(t)
            | BlockContent::Warning(t)
            | BlockContent::Caution(t)
            | BlockContent::PpeRequired(t)
            | BlockContent::AdditionalInfo(t) => serde_json::to_value(t),
            BlockContent::Step(s) => serde_json::to_value(s),
            BlockContent::Question(q) => serde_json::to_value(q),
            BlockContent::Image(i) => serde_json::to_value(i),
            BlockContent::Checklist(c) => serde_json::to_value(c),
        };
        value.unwrap_or(serde_json::Value::Null)
    }

    /// One-line summary for listings.
    pub fn summary(&self) -> String {
        match self {
            BlockContent::Step(s) => {
                let ppe = if s.ppe_required { " [PPE]" } else { "" };
                format!("{}{}", s.description, ppe)
            }
            BlockContent::Question(q) => format!("{} ({})", q.question, q.status),
            BlockContent::Image(i) => i.caption.clone().unwrap_or_else(|| i.url.clone()),
            BlockContent::Checklist(c) => format!("{} items", c.items.len()),
            other => other.text().unwrap_or_default().to_string(),
        }
    }

    /// Semantic checks beyond the serde shape.
    pub fn check(&self) -> Result<(), ContentError> {
        fn non_empty(field: &'static str, value: &str) -> Result<(), ContentError> {
            if value.trim().is_empty() {
                Err(ContentError::EmptyField(field))
            } else {
                Ok(())
            }
        }

        match self {
            BlockContent::Step(s) => {
                non_empty("description", &s.description)?;
                non_empty("instructions", &s.instructions)
            }
            BlockContent::Question(q) => {
                non_empty("question", &q.question)?;
                if q.status == QuestionStatus::Answered
                    && q.answer.as_deref().is_none_or(|a| a.trim().is_empty())
                {
                    return Err(ContentError::MissingAnswer);
                }
                Ok(())
            }
            BlockContent::Image(i) => non_empty("url", &i.url),
            BlockContent::Checklist(c) => {
                if c.items.is_empty() {
                    return Err(ContentError::EmptyChecklist);
                }
                let mut seen = std::collections::HashSet::new();
                for item in &c.items {
                    non_empty("items.text", &item.text)?;
                    if !seen.insert(item.id) {
                        return Err(ContentError::DuplicateChecklistItem(item.id));
                    }
                }
                Ok(())
            }
            text_kind => non_empty("text", text_kind.text().unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_text_shorthand() {
        let content = BlockContent::parse(BlockKind::Title, json!("Lab Safety")).unwrap();
        assert_eq!(content, BlockContent::title("Lab Safety"));
    }

    #[test]
    fn test_parse_step_requires_flag() {
        let err = BlockContent::parse(
            BlockKind::Step,
            json!({ "description": "Check", "instructions": "Look" }),
        )
        .unwrap_err();
        assert!(matches!(err, ContentError::Malformed(_)));

        let ok = BlockContent::parse(
            BlockKind::Step,
            json!({ "description": "Check", "instructions": "Look", "ppe_required": true }),
        )
        .unwrap();
        assert_eq!(ok.kind(), BlockKind::Step);
    }

    #[test]
    fn test_parse_step_legacy_field_names() {
        let content = BlockContent::parse(
            BlockKind::Step,
            json!({
                "step_number": 1,
                "step_description": "Check safety equipment",
                "step_instructions": "Ensure all equipment is available.",
                "step_who_responsible": "Laboratory technician",
                "ppe_required": true
            }),
        )
        .unwrap();
        let BlockContent::Step(step) = content else {
            panic!("expected step");
        };
        assert_eq!(step.step_number, Some(1));
        assert_eq!(step.responsible.as_deref(), Some("Laboratory technician"));
        assert!(step.ppe_required);
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        let err = BlockContent::parse(
            BlockKind::Step,
            json!({ "description": "a", "instructions": "b", "ppe_required": "yes" }),
        )
        .unwrap_err();
        assert!(matches!(err, ContentError::Malformed(_)));

        // Structured kinds do not accept the string shorthand
        assert!(BlockContent::parse(BlockKind::Checklist, json!("gloves")).is_err());
    }

    #[test]
    fn test_semantic_checks() {
        assert_eq!(
            BlockContent::parse(BlockKind::Description, json!({ "text": "   " })),
            Err(ContentError::EmptyField("text"))
        );
        assert_eq!(
            BlockContent::parse(BlockKind::Question, json!({ "question": "Why?", "status": "answered" })),
            Err(ContentError::MissingAnswer)
        );
        assert_eq!(
            BlockContent::parse(BlockKind::Checklist, json!({ "items": [] })),
            Err(ContentError::EmptyChecklist)
        );
        assert_eq!(
            BlockContent::parse(
                BlockKind::Checklist,
                json!({ "items": [{ "id": 1, "text": "Goggles" }, { "id": 1, "text": "Coat" }] })
            ),
            Err(ContentError::DuplicateChecklistItem(1))
        );
    }

    #[test]
    fn test_payload_reparses_to_same_content() {
        let step = BlockContent::Step(
            StepContent::new("Review hazards", "Read the assessment")
                .number(2)
                .expected_result("Hazards understood"),
        );
        let payload = step.payload();
        assert_eq!(payload["description"], "Review hazards");
        assert!(payload.get("image_url").is_none());
        assert_eq!(BlockContent::parse(BlockKind::Step, payload).unwrap(), step);
    }

    #[test]
    fn test_tagged_serialization() {
        let json = serde_json::to_value(BlockContent::section_header("Pre-Entry")).unwrap();
        assert_eq!(json, json!({ "kind": "section_header", "content": { "text": "Pre-Entry" } }));
    }

    #[test]
    fn test_text_of_kind() {
        assert_eq!(
            BlockContent::text_of_kind(BlockKind::Warning, "Hot").map(|c| c.kind()),
            Some(BlockKind::Warning)
        );
        assert!(BlockContent::text_of_kind(BlockKind::Step, "x").is_none());
    }
}
