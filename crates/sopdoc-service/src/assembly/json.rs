//! Structural JSON: the document header plus every block as `kind` + payload
//! and its metadata.
//!
//! This is the one format that round-trips. [`parse`] re-checks each payload
//! against its kind and renumbers positions densely in position order.

use serde::{Deserialize, Serialize};

use sopdoc_types::{Block, BlockContent, BlockId, BlockKind, Document, DocumentId, DocumentKind, DocumentStatus};

use super::Layout;
use crate::error::{Result, SopError};

#[derive(Serialize, Deserialize)]
struct JsonDocument {
    document: JsonHeader,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    table_of_contents: Vec<JsonTocEntry>,
    blocks: Vec<JsonBlock>,
}

#[derive(Serialize, Deserialize)]
struct JsonHeader {
    id: DocumentId,
    key: String,
    kind: DocumentKind,
    status: DocumentStatus,
    title: String,
    #[serde(default)]
    revision: u64,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
    created_at: u64,
    updated_at: u64,
}

#[derive(Serialize, Deserialize)]
struct JsonTocEntry {
    label: String,
    anchor: String,
    depth: usize,
}

#[derive(Serialize, Deserialize)]
struct JsonBlock {
    id: BlockId,
    position: u32,
    kind: String,
    content: serde_json::Value,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    created_at: u64,
    #[serde(default)]
    updated_at: u64,
}

pub(crate) fn render(layout: &Layout<'_>) -> Result<String> {
    let doc = layout.document;
    let table_of_contents = layout
        .toc
        .iter()
        .map(|e| JsonTocEntry { label: e.label.clone(), anchor: e.anchor.clone(), depth: e.depth })
        .collect();

    let body = JsonDocument {
        document: JsonHeader {
            id: doc.id,
            key: doc.key.clone(),
            kind: doc.kind,
            status: doc.status,
            title: doc.title.clone(),
            revision: doc.revision,
            metadata: doc.metadata.clone(),
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        },
        table_of_contents,
        blocks: layout
            .items
            .iter()
            .map(|item| JsonBlock {
                id: item.block.id,
                position: item.block.position,
                kind: item.block.kind().as_str().to_string(),
                content: item.block.content.payload(),
                metadata: item.block.metadata.clone(),
                created_at: item.block.created_at,
                updated_at: item.block.updated_at,
            })
            .collect(),
    };

    Ok(serde_json::to_string_pretty(&body)?)
}

pub(crate) fn parse(json: &str) -> Result<(Document, Vec<Block>)> {
    let body: JsonDocument = serde_json::from_str(json)?;
    let header = body.document;
    let document = Document {
        id: header.id,
        key: header.key,
        kind: header.kind,
        status: header.status,
        title: header.title,
        metadata: header.metadata,
        revision: header.revision,
        created_at: header.created_at,
        updated_at: header.updated_at,
    };

    let mut raw = body.blocks;
    raw.sort_by_key(|b| b.position);

    let blocks = raw
        .into_iter()
        .enumerate()
        .map(|(index, b)| -> Result<Block> {
            let kind =
                BlockKind::from_str(&b.kind).ok_or_else(|| SopError::InvalidBlockType(b.kind.clone()))?;
            let content = BlockContent::parse(kind, b.content)
                .map_err(|source| SopError::InvalidContent { kind, source })?;
            Ok(Block {
                id: b.id,
                document_id: document.id,
                position: index as u32,
                content,
                metadata: b.metadata,
                created_at: b.created_at,
                updated_at: b.updated_at,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((document, blocks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::AssemblyOptions;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use sopdoc_types::{NewDocument, StepContent};

    #[test]
    fn test_roundtrip_preserves_header_and_blocks() {
        let doc = NewDocument::new("lab", "Lab").metadata("risk_level", "high").into_document();
        let blocks = vec![
            Block::new(doc.id, 0, BlockContent::title("Lab")),
            Block::new(doc.id, 1, BlockContent::Step(StepContent::new("Gloves", "Put on").number(4)))
                .with_metadata(json!({ "source": "ANSI Z87.1", "revised": 2 }).as_object().cloned().unwrap()),
        ];
        let layout = Layout::new(&doc, &blocks, AssemblyOptions::default());
        let out = render(&layout).unwrap();

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["blocks"][0]["metadata"], json!({}));
        assert_eq!(value["blocks"][1]["metadata"]["source"], "ANSI Z87.1");

        let (back, back_blocks) = parse(&out).unwrap();
        assert_eq!(back, doc);
        assert_eq!(back_blocks, blocks);
    }

    #[test]
    fn test_toc_entries_are_informational() {
        let doc = NewDocument::new("lab", "Lab").into_document();
        let blocks = vec![Block::new(doc.id, 0, BlockContent::section_header("Prep"))];
        let layout = Layout::new(&doc, &blocks, AssemblyOptions::default().with_table_of_contents());
        let out = render(&layout).unwrap();

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["table_of_contents"][0]["label"], "Prep");
        assert_eq!(value["blocks"][0]["kind"], "section_header");
        assert_eq!(parse(&out).unwrap().1.len(), 1);
    }

    #[test]
    fn test_parse_rechecks_content() {
        let doc = NewDocument::new("lab", "Lab").into_document();
        let mut body = json!({
            "document": {
                "id": doc.id, "key": "lab", "kind": "sop", "status": "draft",
                "title": "Lab", "created_at": 0, "updated_at": 0
            },
            "blocks": [
                { "id": BlockId::new(), "position": 0, "kind": "step",
                  "content": { "description": "x", "instructions": "y" } }
            ]
        });
        assert!(matches!(
            parse(&body.to_string()),
            Err(SopError::InvalidContent { kind: BlockKind::Step, .. })
        ));

        body["blocks"][0]["kind"] = json!("hologram");
        assert!(matches!(parse(&body.to_string()), Err(SopError::InvalidBlockType(_))));

        assert!(matches!(parse("{ not json"), Err(SopError::Serialization(_))));
    }

    #[test]
    fn test_parse_renumbers_positions() {
        let doc = NewDocument::new("lab", "Lab").into_document();
        let body = json!({
            "document": {
                "id": doc.id, "key": "lab", "kind": "procedure", "status": "review",
                "title": "Lab", "created_at": 0, "updated_at": 0
            },
            "blocks": [
                { "id": BlockId::new(), "position": 9, "kind": "description", "content": "second" },
                { "id": BlockId::new(), "position": 2, "kind": "title", "content": { "text": "first" } }
            ]
        });
        let (back, blocks) = parse(&body.to_string()).unwrap();
        assert_eq!(back.kind, DocumentKind::Procedure);
        assert_eq!(
            blocks.iter().map(|b| (b.position, b.content.summary())).collect::<Vec<_>>(),
            vec![(0, "first".to_string()), (1, "second".to_string())]
        );
    }
}
