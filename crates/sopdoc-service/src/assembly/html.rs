//! Standalone HTML page. All text and attribute values are escaped.

use std::fmt::Write;

use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

use sopdoc_types::BlockContent;

use super::{step_label, Item, Layout, Piece, TocEntry, PPE_MARKER};

pub(crate) fn render(layout: &Layout<'_>) -> String {
    let doc = layout.document;
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{}</title>", text(&doc.title));
    out.push_str("</head>\n<body>\n");
    let _ = writeln!(
        out,
        "<article class=\"sop-document\" data-kind=\"{}\" data-status=\"{}\">",
        doc.kind, doc.status
    );

    for piece in layout.pieces() {
        match piece {
            Piece::Heading(title) => {
                let _ = writeln!(out, "<h1>{}</h1>", text(title));
            }
            Piece::Toc(entries) => render_toc(&mut out, entries),
            Piece::Block(item) => render_block(&mut out, item),
        }
    }

    if layout.options.include_metadata {
        out.push_str("<section class=\"metadata\">\n<h2>Document Metadata</h2>\n<dl>\n");
        for (key, value) in layout.metadata_rows() {
            let _ = writeln!(out, "<dt>{}</dt><dd>{}</dd>", text(&key), text(&value));
        }
        out.push_str("</dl>\n</section>\n");
    }

    out.push_str("</article>\n</body>\n</html>\n");
    out
}

fn render_toc(out: &mut String, entries: &[TocEntry]) {
    out.push_str("<nav class=\"toc\">\n<h2>Table of Contents</h2>\n<ul>\n");
    for entry in entries {
        let class = if entry.depth > 0 { " class=\"toc-step\"" } else { "" };
        let _ = writeln!(
            out,
            "<li{}><a href=\"#{}\">{}</a></li>",
            class,
            attr(&entry.anchor),
            text(&entry.label)
        );
    }
    out.push_str("</ul>\n</nav>\n");
}

fn render_block(out: &mut String, item: &Item<'_>) {
    let block = item.block;
    let id = block.id.to_hex();

    match &block.content {
        BlockContent::Title(t) => {
            let _ = writeln!(out, "<h1 id=\"title-{}\">{}</h1>", id, text(&t.text));
        }
        BlockContent::Description(t) => {
            let _ = writeln!(out, "<p class=\"description\">{}</p>", text(&t.text));
        }
        BlockContent::SectionHeader(t) => {
            let _ = writeln!(out, "<h2 id=\"section-{}\">{}</h2>", id, text(&t.text));
        }
        BlockContent::Step(step) => {
            let number = item.step_number.unwrap_or_default();
            let _ = writeln!(out, "<section class=\"step\" id=\"step-{}\">", id);
            let _ = writeln!(out, "<h3>{}</h3>", text(&step_label(number, &step.description)));
            let _ = writeln!(out, "<p>{}</p>", text(&step.instructions));
            if let Some(result) = &step.expected_result {
                let _ = writeln!(out, "<p><strong>Expected Result:</strong> {}</p>", text(result));
            }
            if let Some(who) = &step.responsible {
                let _ = writeln!(out, "<p><strong>Responsible:</strong> {}</p>", text(who));
            }
            if let Some(url) = &step.image_url {
                let _ = writeln!(out, "<img src=\"{}\" alt=\"Step {}\">", attr(url), number);
            }
            if step.ppe_required {
                let _ = writeln!(out, "<p class=\"ppe-required\"><strong>{}</strong></p>", PPE_MARKER);
            }
            out.push_str("</section>\n");
        }
        BlockContent::Question(q) => {
            out.push_str("<div class=\"question\">\n");
            let _ = writeln!(out, "<h4>Question: {}</h4>", text(&q.question));
            if let Some(answer) = &q.answer {
                let _ = writeln!(out, "<p><strong>Answer:</strong> {}</p>", text(answer));
            }
            let _ = writeln!(out, "<p><em>Status: {}</em></p>", q.status);
            out.push_str("</div>\n");
        }
        BlockContent::Warning(t) => callout(out, "warning", "WARNING", &t.text),
        BlockContent::Caution(t) => callout(out, "caution", "CAUTION", &t.text),
        BlockContent::PpeRequired(t) => callout(out, "ppe", "Protective Equipment", &t.text),
        BlockContent::AdditionalInfo(t) => {
            let _ = writeln!(
                out,
                "<aside class=\"additional-info\"><h3>Additional Information</h3><p>{}</p></aside>",
                text(&t.text)
            );
        }
        BlockContent::Image(img) => {
            out.push_str("<figure>\n");
            let _ = writeln!(
                out,
                "<img src=\"{}\" alt=\"{}\">",
                attr(&img.url),
                attr(img.alt_text.as_deref().unwrap_or_default())
            );
            if let Some(caption) = &img.caption {
                let _ = writeln!(out, "<figcaption>{}</figcaption>", text(caption));
            }
            out.push_str("</figure>\n");
        }
        BlockContent::Checklist(list) => {
            out.push_str("<ul class=\"checklist\">\n");
            for entry in &list.items {
                let checked = if entry.checked { " checked" } else { "" };
                let _ = writeln!(
                    out,
                    "<li><input type=\"checkbox\" disabled{}> {}</li>",
                    checked,
                    text(&entry.text)
                );
            }
            out.push_str("</ul>\n");
        }
    }
}

fn callout(out: &mut String, class: &str, label: &str, body: &str) {
    let _ = writeln!(
        out,
        "<div class=\"{}\"><strong>{}:</strong> {}</div>",
        class,
        label,
        text(body)
    );
}
