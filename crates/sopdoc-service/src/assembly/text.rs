//! Plain text with underlined headings.

use sopdoc_types::BlockContent;

use super::{step_label, Item, Layout, Piece, TocEntry, PPE_MARKER};

fn underline(text: &str, ch: char) -> String {
    let rule: String = std::iter::repeat_n(ch, text.chars().count()).collect();
    format!("{}\n{}", text, rule)
}

pub(crate) fn render(layout: &Layout<'_>) -> String {
    let mut parts: Vec<String> = layout
        .pieces()
        .into_iter()
        .map(|piece| match piece {
            Piece::Heading(title) => underline(title, '='),
            Piece::Toc(entries) => render_toc(entries),
            Piece::Block(item) => render_block(item),
        })
        .collect();

    if layout.options.include_metadata {
        let mut section = underline("Document Metadata", '-');
        for (key, value) in layout.metadata_rows() {
            section.push_str(&format!("\n{}: {}", key, value));
        }
        parts.push(section);
    }

    let mut out = parts.join("\n\n");
    out.push('\n');
    out
}

fn render_toc(entries: &[TocEntry]) -> String {
    let mut out = String::from("Contents");
    for entry in entries {
        out.push_str(&format!("\n{}- {}", "  ".repeat(entry.depth + 1), entry.label));
    }
    out
}

fn render_block(item: &Item<'_>) -> String {
    match &item.block.content {
        BlockContent::Title(t) => underline(&t.text, '='),
        BlockContent::Description(t) => t.text.clone(),
        BlockContent::SectionHeader(t) => underline(&t.text, '-'),
        BlockContent::Step(step) => {
            let number = item.step_number.unwrap_or_default();
            let mut out = step_label(number, &step.description);
            out.push_str(&format!("\n   Instructions: {}", step.instructions));
            if let Some(result) = &step.expected_result {
                out.push_str(&format!("\n   Expected Result: {}", result));
            }
            if let Some(who) = &step.responsible {
                out.push_str(&format!("\n   Responsible: {}", who));
            }
            if let Some(url) = &step.image_url {
                out.push_str(&format!("\n   Image: {}", url));
            }
            if step.ppe_required {
                out.push_str(&format!("\n   [{}]", PPE_MARKER));
            }
            out
        }
        BlockContent::Question(q) => {
            let mut out = format!("Question: {}", q.question);
            if let Some(answer) = &q.answer {
                out.push_str(&format!("\nAnswer: {}", answer));
            }
            out.push_str(&format!("\nStatus: {}", q.status));
            out
        }
        BlockContent::Warning(t) => format!("WARNING: {}", t.text),
        BlockContent::Caution(t) => format!("CAUTION: {}", t.text),
        BlockContent::PpeRequired(t) => format!("PROTECTIVE EQUIPMENT: {}", t.text),
        BlockContent::AdditionalInfo(t) => format!("Additional Information: {}", t.text),
        BlockContent::Image(img) => match &img.caption {
            Some(caption) => format!("[Image: {}] {}", img.url, caption),
            None => format!("[Image: {}]", img.url),
        },
        BlockContent::Checklist(list) => list
            .items
            .iter()
            .map(|entry| format!("[{}] {}", if entry.checked { 'x' } else { ' ' }, entry.text))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::AssemblyOptions;
    use pretty_assertions::assert_eq;
    use sopdoc_types::{Block, NewDocument, QuestionContent, QuestionStatus, StepContent};

    #[test]
    fn test_headings_and_steps() {
        let doc = NewDocument::new("x", "Lab").into_document();
        let blocks = vec![
            Block::new(doc.id, 0, BlockContent::title("Lab Safety")),
            Block::new(doc.id, 1, BlockContent::section_header("Prep")),
            Block::new(
                doc.id,
                2,
                BlockContent::Step(
                    StepContent::new("Gloves", "Put on gloves")
                        .responsible("Technician")
                        .ppe_required(true),
                ),
            ),
        ];
        let layout = Layout::new(&doc, &blocks, AssemblyOptions::default().with_table_of_contents());
        assert_eq!(
            render(&layout),
            "Lab Safety\n==========\n\n\
             Contents\n  - Prep\n    - Step 1: Gloves\n\n\
             Prep\n----\n\n\
             Step 1: Gloves\n   Instructions: Put on gloves\n   Responsible: Technician\n   [PPE Required]\n"
        );
    }

    #[test]
    fn test_question() {
        let doc = NewDocument::new("x", "Lab").into_document();
        let blocks = vec![Block::new(
            doc.id,
            0,
            BlockContent::Question(QuestionContent {
                question: "Eyewash location?".into(),
                status: QuestionStatus::Answered,
                answer: Some("Next to the door".into()),
            }),
        )];
        let text = render(&Layout::new(&doc, &blocks, AssemblyOptions::default()));
        assert!(text.contains("Question: Eyewash location?\nAnswer: Next to the door\nStatus: answered"));
    }

    #[test]
    fn test_underline_counts_chars() {
        assert_eq!(underline("Übung", '='), "Übung\n=====");
    }
}
