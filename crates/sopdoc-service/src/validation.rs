//! Advisory structural checks.
//!
//! Validation never fails: it returns findings. Writes are already guarded by
//! the block service, so findings mostly flag incomplete documents (missing
//! required kinds) or blocks built outside the service.

use std::collections::BTreeSet;

use serde::Serialize;

use sopdoc_types::{Block, BlockId, BlockKind, Document, DocumentKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One problem found in a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    /// Stable machine-readable code (e.g. `missing_required`).
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_id: Option<BlockId>,
}

impl Finding {
    fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, code, message: message.into(), block_id: None }
    }

    fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, code, message: message.into(), block_id: None }
    }

    fn at(mut self, block: BlockId) -> Self {
        self.block_id = Some(block);
        self
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.severity, self.code, self.message)?;
        if let Some(id) = self.block_id {
            write!(f, " (block {})", id.short())?;
        }
        Ok(())
    }
}

/// Result of validating one document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
    pub block_count: usize,
    /// Distinct kinds present, in declaration order.
    pub kinds: Vec<BlockKind>,
}

impl ValidationReport {
    /// No error-severity findings. Warnings do not make a document invalid.
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Warning)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.findings.iter().any(|f| f.code == code)
    }
}

/// Required and recommended kinds for a document kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Template {
    pub required: &'static [BlockKind],
    pub recommended: &'static [BlockKind],
}

impl Template {
    pub fn for_kind(kind: DocumentKind) -> Self {
        use BlockKind::*;
        match kind {
            DocumentKind::Sop | DocumentKind::Policy => Template {
                required: &[Title],
                recommended: &[Description],
            },
            DocumentKind::Procedure => Template {
                required: &[Title, Step],
                recommended: &[Description],
            },
            DocumentKind::Checklist => Template {
                required: &[Title, Checklist],
                recommended: &[],
            },
        }
    }
}

/// Runs the structural checks.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentValidator;

impl DocumentValidator {
    pub fn validate(&self, document: &Document, blocks: &[Block]) -> ValidationReport {
        let mut findings = Vec::new();
        let present: BTreeSet<BlockKind> = blocks.iter().map(|b| b.kind()).collect();

        let template = Template::for_kind(document.kind);
        for kind in template.required {
            if !present.contains(kind) {
                findings.push(Finding::error(
                    "missing_required",
                    format!("{} document has no {} block", document.kind, kind),
                ));
            }
        }
        for kind in template.recommended {
            if !present.contains(kind) {
                findings.push(Finding::warning(
                    "missing_recommended",
                    format!("{} block is recommended", kind),
                ));
            }
        }

        let mut ordered: Vec<&Block> = blocks.iter().collect();
        ordered.sort_by_key(|b| b.position);

        let mut expected = 0u32;
        let mut previous: Option<u32> = None;
        for block in &ordered {
            if block.document_id != document.id {
                findings.push(
                    Finding::error("foreign_block", "block belongs to another document").at(block.id),
                );
            }

            if previous == Some(block.position) {
                findings.push(
                    Finding::error(
                        "duplicate_position",
                        format!("position {} is used more than once", block.position),
                    )
                    .at(block.id),
                );
            } else {
                if block.position != expected {
                    findings.push(
                        Finding::error(
                            "position_gap",
                            format!("expected position {}, found {}", expected, block.position),
                        )
                        .at(block.id),
                    );
                }
                previous = Some(block.position);
                expected = block.position + 1;
            }

            if let Err(e) = block.content.check() {
                findings.push(Finding::error("invalid_content", e.to_string()).at(block.id));
            }
        }

        let titles: Vec<&&Block> = ordered.iter().filter(|b| b.kind() == BlockKind::Title).collect();
        if titles.len() > 1 {
            findings.push(
                Finding::warning(
                    "multiple_titles",
                    format!("{} title blocks; only one is expected", titles.len()),
                )
                .at(titles[1].id),
            );
        }

        ValidationReport {
            findings,
            block_count: blocks.len(),
            kinds: present.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sopdoc_types::{BlockContent, ChecklistContent, NewDocument, StepContent, TextContent};

    fn blocks_for(doc: &Document, contents: Vec<BlockContent>) -> Vec<Block> {
        contents
            .into_iter()
            .enumerate()
            .map(|(i, c)| Block::new(doc.id, i as u32, c))
            .collect()
    }

    #[test]
    fn test_complete_sop_is_clean() {
        let doc = NewDocument::new("lab", "Lab").into_document();
        let blocks = blocks_for(
            &doc,
            vec![BlockContent::title("Lab"), BlockContent::description("Safety rules")],
        );
        let report = DocumentValidator.validate(&doc, &blocks);
        assert!(report.findings.is_empty(), "{:?}", report.findings);
        assert_eq!(report.block_count, 2);
        assert_eq!(report.kinds, vec![BlockKind::Title, BlockKind::Description]);
    }

    #[test]
    fn test_empty_document_missing_title() {
        let doc = NewDocument::new("lab", "Lab").into_document();
        let report = DocumentValidator.validate(&doc, &[]);
        assert!(!report.is_valid());
        assert!(report.has_code("missing_required"));
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn test_description_only_recommended() {
        let doc = NewDocument::new("lab", "Lab").into_document();
        let blocks = blocks_for(&doc, vec![BlockContent::title("Lab")]);
        let report = DocumentValidator.validate(&doc, &blocks);
        assert!(report.is_valid());
        assert!(report.has_code("missing_recommended"));
    }

    #[test]
    fn test_templates_per_kind() {
        let procedure = NewDocument::new("p", "P").kind(DocumentKind::Procedure).into_document();
        let blocks = blocks_for(&procedure, vec![BlockContent::title("P")]);
        let report = DocumentValidator.validate(&procedure, &blocks);
        assert_eq!(report.errors().count(), 1);
        assert!(report.errors().next().unwrap().message.contains("step"));

        let checklist = NewDocument::new("c", "C").kind(DocumentKind::Checklist).into_document();
        let blocks = blocks_for(
            &checklist,
            vec![
                BlockContent::title("C"),
                BlockContent::Checklist(ChecklistContent {
                    items: vec![sopdoc_types::ChecklistItem { id: 1, text: "Gloves".into(), checked: false }],
                    allow_multiple: false,
                }),
            ],
        );
        let report = DocumentValidator.validate(&checklist, &blocks);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_position_problems() {
        let doc = NewDocument::new("lab", "Lab").into_document();
        let mut blocks = blocks_for(
            &doc,
            vec![
                BlockContent::title("Lab"),
                BlockContent::description("a"),
                BlockContent::description("b"),
            ],
        );
        blocks[2].position = 1;
        let report = DocumentValidator.validate(&doc, &blocks);
        assert!(report.has_code("duplicate_position"));

        blocks[2].position = 5;
        let report = DocumentValidator.validate(&doc, &blocks);
        assert!(report.has_code("position_gap"));
        assert!(!report.has_code("duplicate_position"));
    }

    #[test]
    fn test_duplicate_position_still_checks_content() {
        let doc = NewDocument::new("lab", "Lab").into_document();
        let blocks = vec![
            Block::new(doc.id, 0, BlockContent::title("Lab")),
            Block::new(doc.id, 0, BlockContent::Description(TextContent { text: "  ".into() })),
        ];
        let report = DocumentValidator.validate(&doc, &blocks);
        assert!(report.has_code("duplicate_position"));
        assert!(report.has_code("invalid_content"));
        let invalid = report.findings.iter().find(|f| f.code == "invalid_content").unwrap();
        assert_eq!(invalid.block_id, Some(blocks[1].id));
    }

    #[test]
    fn test_content_and_title_checks() {
        let doc = NewDocument::new("lab", "Lab").into_document();
        let blocks = blocks_for(
            &doc,
            vec![
                BlockContent::title("Lab"),
                BlockContent::Description(TextContent { text: "  ".into() }),
                BlockContent::Step(StepContent::new("", "Do it")),
                BlockContent::title("Lab again"),
            ],
        );
        let report = DocumentValidator.validate(&doc, &blocks);
        assert_eq!(report.findings.iter().filter(|f| f.code == "invalid_content").count(), 2);
        let multiple = report.findings.iter().find(|f| f.code == "multiple_titles").unwrap();
        assert_eq!(multiple.severity, Severity::Warning);
        assert_eq!(multiple.block_id, Some(blocks[3].id));
    }

    #[test]
    fn test_foreign_block() {
        let doc = NewDocument::new("lab", "Lab").into_document();
        let other = NewDocument::new("other", "Other").into_document();
        let blocks = vec![Block::new(other.id, 0, BlockContent::title("Other"))];
        let report = DocumentValidator.validate(&doc, &blocks);
        assert!(report.has_code("foreign_block"));
    }
}
