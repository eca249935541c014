//! CommonMark output. Contents entries link to heading slugs.

use sopdoc_types::BlockContent;

use super::{step_label, Item, Layout, Piece, TocEntry, PPE_MARKER};

pub(crate) const TOC_HEADING: &str = "Table of Contents";

const ADDITIONAL_INFO_HEADING: &str = "Additional Information";

/// The heading a block renders as, if any. Contents slugs are derived from these.
pub(crate) fn heading_text(item: &Item<'_>) -> Option<String> {
    match &item.block.content {
        BlockContent::Title(t) | BlockContent::SectionHeader(t) => Some(t.text.clone()),
        BlockContent::Step(step) => {
            Some(step_label(item.step_number.unwrap_or_default(), &step.description))
        }
        BlockContent::Question(q) => Some(format!("Question: {}", q.question)),
        BlockContent::AdditionalInfo(_) => Some(ADDITIONAL_INFO_HEADING.to_string()),
        _ => None,
    }
}

/// One line of inline text with Markdown punctuation backslash-escaped, for
/// headings and link labels.
fn escape_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, word) in text.split_whitespace().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        for c in word.chars() {
            if matches!(c, '\\' | '`' | '*' | '_' | '~' | '[' | ']' | '<' | '>' | '#') {
                out.push('\\');
            }
            out.push(c);
        }
    }
    out
}

pub(crate) fn render(layout: &Layout<'_>) -> String {
    let mut parts: Vec<String> = layout
        .pieces()
        .into_iter()
        .map(|piece| match piece {
            Piece::Heading(title) => format!("# {}", escape_inline(title)),
            Piece::Toc(entries) => render_toc(entries),
            Piece::Block(item) => render_block(item),
        })
        .collect();

    if layout.options.include_metadata {
        let mut section = String::from("---\n\n## Document Metadata\n");
        for (key, value) in layout.metadata_rows() {
            section.push_str(&format!("\n- **{}:** {}", key, value));
        }
        parts.push(section);
    }

    let mut out = parts.join("\n\n");
    out.push('\n');
    out
}

fn render_toc(entries: &[TocEntry]) -> String {
    let mut out = format!("## {}\n", TOC_HEADING);
    for entry in entries {
        let indent = "  ".repeat(entry.depth);
        out.push_str(&format!("\n{}- [{}](#{})", indent, escape_inline(&entry.label), entry.slug));
    }
    out
}

fn render_block(item: &Item<'_>) -> String {
    match &item.block.content {
        BlockContent::Title(t) => format!("# {}", escape_inline(&t.text)),
        BlockContent::Description(t) => t.text.clone(),
        BlockContent::SectionHeader(t) => format!("## {}", escape_inline(&t.text)),
        BlockContent::Step(step) => {
            let number = item.step_number.unwrap_or_default();
            let mut lines = vec![
                format!("### {}", escape_inline(&step_label(number, &step.description))),
                step.instructions.clone(),
            ];
            if let Some(result) = &step.expected_result {
                lines.push(format!("**Expected Result:** {}", result));
            }
            if let Some(who) = &step.responsible {
                lines.push(format!("**Responsible:** {}", who));
            }
            if let Some(url) = &step.image_url {
                lines.push(format!("![Step {}]({})", number, url));
            }
            if step.ppe_required {
                lines.push(format!("> **{}**", PPE_MARKER));
            }
            lines.join("\n\n")
        }
        BlockContent::Question(q) => {
            let mut lines = vec![format!("#### Question: {}", escape_inline(&q.question))];
            if let Some(answer) = &q.answer {
                lines.push(format!("**Answer:** {}", answer));
            }
            lines.push(format!("*Status: {}*", q.status));
            lines.join("\n\n")
        }
        BlockContent::Warning(t) => format!("> **WARNING:** {}", t.text),
        BlockContent::Caution(t) => format!("> **CAUTION:** {}", t.text),
        BlockContent::PpeRequired(t) => format!("> **Protective Equipment:** {}", t.text),
        BlockContent::AdditionalInfo(t) => format!("### {}\n\n{}", ADDITIONAL_INFO_HEADING, t.text),
        BlockContent::Image(img) => {
            let mut out = format!("![{}]({})", img.alt_text.as_deref().unwrap_or_default(), img.url);
            if let Some(caption) = &img.caption {
                out.push_str(&format!("\n\n*{}*", caption));
            }
            out
        }
        BlockContent::Checklist(list) => list
            .items
            .iter()
            .map(|entry| {
                let mark = if entry.checked { 'x' } else { ' ' };
                format!("- [{}] {}", mark, entry.text)
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}
