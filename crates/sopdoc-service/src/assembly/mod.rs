//! Document assembly: ordered blocks in, rendered text out.
//!
//! Each format is a pure function of the document header, its blocks in
//! position order, and [`AssemblyOptions`]. The renderers share one
//! [`Layout`] so numbering, table-of-contents placement and the metadata
//! section agree across formats.
//!
//! ```text
//! Document + [Block] ──▶ Layout ──┬─▶ html
//!                                 ├─▶ markdown
//!                                 ├─▶ plain_text
//!                                 └─▶ json ──▶ reconstruct() ──▶ Document + [Block]
//! ```

mod html;
mod json;
mod markdown;
mod text;

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use sopdoc_types::{Block, BlockContent, Document, DocumentId, DocumentKind, DocumentStatus};

use crate::error::{Result, SopError};

/// Output format of an assembly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum AssemblyFormat {
    #[strum(serialize = "html", serialize = "htm")]
    Html,
    #[default]
    #[serde(alias = "md")]
    #[strum(serialize = "markdown", serialize = "md")]
    Markdown,
    #[serde(alias = "text", alias = "txt")]
    #[strum(serialize = "plain_text", serialize = "text", serialize = "txt", serialize = "plain")]
    PlainText,
    #[strum(serialize = "json")]
    Json,
}

impl AssemblyFormat {
    pub const ALL: [AssemblyFormat; 4] = [
        AssemblyFormat::Html,
        AssemblyFormat::Markdown,
        AssemblyFormat::PlainText,
        AssemblyFormat::Json,
    ];

    /// Parse a format tag. Anything outside the closed set (including `pdf`)
    /// is [`SopError::UnsupportedFormat`].
    pub fn parse(tag: &str) -> Result<Self> {
        <Self as FromStr>::from_str(tag).map_err(|_| SopError::UnsupportedFormat(tag.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssemblyFormat::Html => "html",
            AssemblyFormat::Markdown => "markdown",
            AssemblyFormat::PlainText => "plain_text",
            AssemblyFormat::Json => "json",
        }
    }

    /// Conventional file extension for exported output.
    pub fn extension(&self) -> &'static str {
        match self {
            AssemblyFormat::Html => "html",
            AssemblyFormat::Markdown => "md",
            AssemblyFormat::PlainText => "txt",
            AssemblyFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for AssemblyFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rendering switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyOptions {
    /// Emit a contents list of section headers and steps.
    pub include_table_of_contents: bool,
    /// Append id, key, kind, status and free-form metadata.
    pub include_metadata: bool,
}

impl AssemblyOptions {
    pub fn with_table_of_contents(mut self) -> Self {
        self.include_table_of_contents = true;
        self
    }

    pub fn with_metadata(mut self) -> Self {
        self.include_metadata = true;
        self
    }
}

/// A rendered document.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssembledDocument {
    pub document_id: DocumentId,
    pub format: AssemblyFormat,
    pub content: String,
    pub block_count: usize,
    pub kind: DocumentKind,
    pub status: DocumentStatus,
}

/// Marker attached to steps that require protective equipment.
pub const PPE_MARKER: &str = "PPE Required";

// ============================================================================
// Layout
// ============================================================================

/// A block with its resolved step number (steps only).
pub(crate) struct Item<'a> {
    pub block: &'a Block,
    pub step_number: Option<u32>,
}

/// One table-of-contents line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TocEntry {
    pub label: String,
    /// HTML element id of the target block.
    pub anchor: String,
    /// Markdown heading slug of the target block.
    pub slug: String,
    /// 0 for sections, 1 for steps nested under a section.
    pub depth: usize,
}

/// Output order shared by the text renderers.
pub(crate) enum Piece<'l, 'a> {
    /// Document title from the header, used when no title block exists.
    Heading(&'a str),
    Toc(&'l [TocEntry]),
    Block(&'l Item<'a>),
}

pub(crate) struct Layout<'a> {
    pub document: &'a Document,
    pub items: Vec<Item<'a>>,
    pub toc: Vec<TocEntry>,
    pub options: AssemblyOptions,
}

impl<'a> Layout<'a> {
    pub fn new(document: &'a Document, blocks: &'a [Block], options: AssemblyOptions) -> Self {
        let mut ordered: Vec<&Block> = blocks.iter().collect();
        ordered.sort_by_key(|b| b.position);

        let mut ordinal = 0;
        let items: Vec<Item<'a>> = ordered
            .into_iter()
            .map(|block| {
                let step_number = match &block.content {
                    BlockContent::Step(step) => {
                        ordinal += 1;
                        Some(step.step_number.unwrap_or(ordinal))
                    }
                    _ => None,
                };
                Item { block, step_number }
            })
            .collect();

        let toc = if options.include_table_of_contents {
            table_of_contents(document, &items)
        } else {
            Vec::new()
        };

        Self { document, items, toc, options }
    }

    fn has_title(&self) -> bool {
        self.items.iter().any(|item| is_title(&item))
    }

    /// Blocks in order, with the fallback heading and the contents list
    /// slotted in. The contents go after a leading title block, else first.
    pub fn pieces(&self) -> Vec<Piece<'_, 'a>> {
        let document: &'a Document = self.document;
        let mut pieces = Vec::with_capacity(self.items.len() + 2);
        let mut rest = self.items.iter().peekable();

        if !self.has_title() {
            pieces.push(Piece::Heading(&document.title));
        } else if let Some(first) = rest.next_if(is_title) {
            pieces.push(Piece::Block(first));
        }

        if !self.toc.is_empty() {
            pieces.push(Piece::Toc(&self.toc));
        }
        pieces.extend(rest.map(Piece::Block));
        pieces
    }

    /// Header fields followed by free-form metadata (sorted by key).
    pub fn metadata_rows(&self) -> Vec<(String, String)> {
        let doc = self.document;
        let mut rows = vec![
            ("id".to_string(), doc.id.to_string()),
            ("key".to_string(), doc.key.clone()),
            ("kind".to_string(), doc.kind.to_string()),
            ("status".to_string(), doc.status.to_string()),
            ("revision".to_string(), doc.revision.to_string()),
        ];
        rows.extend(doc.metadata.iter().map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        }));
        rows
    }
}

/// `Step N: description` as used by headings and contents entries.
pub(crate) fn step_label(number: u32, description: &str) -> String {
    format!("Step {}: {}", number, description)
}

fn is_title(item: &&Item<'_>) -> bool {
    matches!(item.block.content, BlockContent::Title(_))
}

/// Contents entries for section headers and steps.
///
/// Markdown slugs must be unique across every heading of the rendered page,
/// so headings that are not contents entries (titles, questions, the contents
/// heading itself) are counted too, in output order.
fn table_of_contents(document: &Document, items: &[Item<'_>]) -> Vec<TocEntry> {
    let mut slugs = Slugger::default();
    let mut rest = items.iter().peekable();
    if !items.iter().any(|item| is_title(&item)) {
        slugs.slug(&document.title);
    } else if let Some(first) = rest.next_if(is_title)
        && let Some(text) = markdown::heading_text(first)
    {
        slugs.slug(&text);
    }
    slugs.slug(markdown::TOC_HEADING);

    let mut entries = Vec::new();
    let mut in_section = false;
    for item in rest {
        let Some(heading) = markdown::heading_text(item) else {
            continue;
        };
        let slug = slugs.slug(&heading);
        let block = item.block;
        match &block.content {
            BlockContent::SectionHeader(_) => {
                in_section = true;
                entries.push(TocEntry {
                    label: heading,
                    anchor: format!("section-{}", block.id.to_hex()),
                    slug,
                    depth: 0,
                });
            }
            BlockContent::Step(_) => entries.push(TocEntry {
                label: heading,
                anchor: format!("step-{}", block.id.to_hex()),
                slug,
                depth: usize::from(in_section),
            }),
            _ => {}
        }
    }
    entries
}

/// Hands out unique slugs the way GitHub does: repeats of `x` become `x-1`, `x-2`, ...
#[derive(Default)]
struct Slugger {
    occurrences: HashMap<String, usize>,
}

impl Slugger {
    fn slug(&mut self, text: &str) -> String {
        let base = slugify(text);
        let mut slug = base.clone();
        while self.occurrences.contains_key(&slug) {
            let count = self.occurrences.entry(base.clone()).or_default();
            *count += 1;
            slug = format!("{}-{}", base, count);
        }
        self.occurrences.insert(slug.clone(), 0);
        slug
    }
}

/// GitHub-style heading slug: lowercase alphanumerics, whitespace runs become
/// one hyphen, other punctuation is dropped.
fn slugify(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || c == '_' {
                Some(c.to_lowercase().next().unwrap_or(c))
            } else if c == ' ' || c == '-' {
                Some('-')
            } else {
                None
            }
        })
        .collect()
}

// ============================================================================
// Assembler
// ============================================================================

/// Renders documents and rebuilds them from their JSON form.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentAssembler;

impl DocumentAssembler {
    /// Render `blocks` of `document` in `format`.
    ///
    /// Blocks are ordered by position regardless of slice order. An empty
    /// block sequence renders as a near-empty but valid document.
    pub fn assemble(
        &self,
        document: &Document,
        blocks: &[Block],
        format: AssemblyFormat,
        options: AssemblyOptions,
    ) -> Result<AssembledDocument> {
        let layout = Layout::new(document, blocks, options);
        let content = match format {
            AssemblyFormat::Html => html::render(&layout),
            AssemblyFormat::Markdown => markdown::render(&layout),
            AssemblyFormat::PlainText => text::render(&layout),
            AssemblyFormat::Json => json::render(&layout)?,
        };

        Ok(AssembledDocument {
            document_id: document.id,
            format,
            content,
            block_count: blocks.len(),
            kind: document.kind,
            status: document.status,
        })
    }

    /// Like [`assemble`](Self::assemble) but takes an untrusted format tag.
    pub fn assemble_tag(
        &self,
        document: &Document,
        blocks: &[Block],
        format: &str,
        options: AssemblyOptions,
    ) -> Result<AssembledDocument> {
        self.assemble(document, blocks, AssemblyFormat::parse(format)?, options)
    }

    /// Rebuild the header and ordered blocks from JSON assembly output.
    ///
    /// Every block payload goes through the same shape checks as a write.
    pub fn reconstruct(&self, json: &str) -> Result<(Document, Vec<Block>)> {
        json::parse(json)
    }
}
