//! Block CRUD with dense positions.
//!
//! Every operation that moves positions runs inside one
//! [`DocumentDb::atomically`] batch while holding the connection mutex, so the
//! blocks of a document always occupy exactly `0..n` when observed from outside.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use sopdoc_types::{now_millis, Block, BlockContent, BlockId, BlockKind, ContentError, DocumentId};

use crate::db::{DocumentDb, SharedDb};
use crate::error::{Result, SopError};

/// Block mutations and queries against the shared database.
#[derive(Clone)]
pub struct BlockService {
    db: SharedDb,
}

fn require_document(db: &DocumentDb, document_id: DocumentId) -> Result<()> {
    match db.get_document(document_id)? {
        Some(_) => Ok(()),
        None => Err(SopError::document_not_found(document_id)),
    }
}

fn require_block(db: &DocumentDb, id: BlockId) -> Result<Block> {
    db.get_block(id)?.ok_or(SopError::BlockNotFound(id))
}

/// Parse a kind tag and payload into checked content.
pub fn parse_content(kind_tag: &str, payload: Value) -> Result<BlockContent> {
    let kind = BlockKind::from_str(kind_tag)
        .ok_or_else(|| SopError::InvalidBlockType(kind_tag.to_string()))?;
    BlockContent::parse(kind, payload).map_err(|source| SopError::InvalidContent { kind, source })
}

impl BlockService {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }

    /// Add a block from an untyped kind tag and JSON payload.
    ///
    /// Appends when `position` is `None`; otherwise inserts there and shifts
    /// every block at or after it down by one.
    pub fn add_block(
        &self,
        document_id: DocumentId,
        kind_tag: &str,
        content: Value,
        position: Option<u32>,
    ) -> Result<Block> {
        self.add_block_with_metadata(document_id, kind_tag, content, Map::new(), position)
    }

    /// [`add_block`](Self::add_block) with free-form block metadata.
    pub fn add_block_with_metadata(
        &self,
        document_id: DocumentId,
        kind_tag: &str,
        content: Value,
        metadata: Map<String, Value>,
        position: Option<u32>,
    ) -> Result<Block> {
        let content = parse_content(kind_tag, content).inspect_err(|e| {
            warn!(document = %document_id, "rejected block: {}", e);
        })?;
        self.add_content_with_metadata(document_id, content, metadata, position)
    }

    /// Add already-typed content.
    pub fn add_content(
        &self,
        document_id: DocumentId,
        content: BlockContent,
        position: Option<u32>,
    ) -> Result<Block> {
        self.add_content_with_metadata(document_id, content, Map::new(), position)
    }

    pub fn add_content_with_metadata(
        &self,
        document_id: DocumentId,
        content: BlockContent,
        metadata: Map<String, Value>,
        position: Option<u32>,
    ) -> Result<Block> {
        content
            .check()
            .map_err(|source| SopError::InvalidContent { kind: content.kind(), source })?;

        let db = self.db.lock();
        db.atomically(|db| {
            require_document(db, document_id)?;
            let len = db.block_count(document_id)?;
            let position = position.unwrap_or(len);
            if position > len {
                return Err(SopError::InvalidPosition { position, len });
            }

            let now = now_millis();
            db.shift_positions(document_id, position, None, 1, now)?;
            let block = Block::new(document_id, position, content).with_metadata(metadata);
            db.insert_block(&block)?;
            db.touch_document(document_id, now)?;

            debug!(
                document = %document_id,
                "added {} block {} at {}",
                block.kind(),
                block.id.short(),
                position
            );
            Ok(block)
        })
    }

    /// All blocks of a document in position order. Empty is valid.
    pub fn get_blocks(&self, document_id: DocumentId) -> Result<Vec<Block>> {
        let db = self.db.lock();
        require_document(&db, document_id)?;
        Ok(db.list_blocks(document_id)?)
    }

    /// A single block, which must belong to `document_id`.
    pub fn get_block(&self, document_id: DocumentId, id: BlockId) -> Result<Block> {
        let db = self.db.lock();
        match db.get_block(id)? {
            Some(block) if block.document_id == document_id => Ok(block),
            _ => Err(SopError::BlockNotFound(id)),
        }
    }

    /// Replace a block's content from a JSON payload of the block's own kind.
    pub fn update_block(&self, id: BlockId, content: Value) -> Result<Block> {
        let db = self.db.lock();
        db.atomically(|db| {
            let block = require_block(db, id)?;
            let kind = block.kind();
            let content = BlockContent::parse(kind, content)
                .map_err(|source| SopError::InvalidContent { kind, source })?;
            Self::write_content(db, block, content)
        })
    }

    /// Replace a block's content with typed content of the same kind.
    pub fn update_content(&self, id: BlockId, content: BlockContent) -> Result<Block> {
        let db = self.db.lock();
        db.atomically(|db| {
            let block = require_block(db, id)?;
            let kind = block.kind();
            if content.kind() != kind {
                return Err(SopError::InvalidContent {
                    kind,
                    source: ContentError::Malformed(format!(
                        "expected {} content, got {}",
                        kind,
                        content.kind()
                    )),
                });
            }
            content
                .check()
                .map_err(|source| SopError::InvalidContent { kind, source })?;
            Self::write_content(db, block, content)
        })
    }

    fn write_content(db: &DocumentDb, mut block: Block, content: BlockContent) -> Result<Block> {
        let now = now_millis();
        db.update_block_content(block.id, &content, now)?;
        db.touch_document(block.document_id, now)?;
        block.content = content;
        block.updated_at = now;
        debug!(document = %block.document_id, "updated block {}", block.id.short());
        Ok(block)
    }

    /// Replace a block's metadata. Content and position are untouched.
    pub fn update_metadata(&self, id: BlockId, metadata: Map<String, Value>) -> Result<Block> {
        let db = self.db.lock();
        db.atomically(|db| {
            let mut block = require_block(db, id)?;
            let now = now_millis();
            db.set_block_metadata(id, &metadata, now)?;
            db.touch_document(block.document_id, now)?;
            block.metadata = metadata;
            block.updated_at = now;
            debug!(document = %block.document_id, "updated metadata of block {}", id.short());
            Ok(block)
        })
    }

    /// Copy a block (new id, same content and metadata) to the position right after it.
    pub fn duplicate_block(&self, id: BlockId) -> Result<Block> {
        let db = self.db.lock();
        db.atomically(|db| {
            let source = require_block(db, id)?;
            let now = now_millis();
            let position = source.position + 1;
            db.shift_positions(source.document_id, position, None, 1, now)?;
            let copy = source.duplicate_at(position);
            db.insert_block(&copy)?;
            db.touch_document(source.document_id, now)?;
            debug!(
                document = %source.document_id,
                "duplicated block {} as {} at {}",
                source.id.short(),
                copy.id.short(),
                position
            );
            Ok(copy)
        })
    }

    /// Move a block to `new_position`, shifting the blocks in between by one.
    pub fn reorder_block(&self, id: BlockId, new_position: u32) -> Result<Block> {
        let db = self.db.lock();
        db.atomically(|db| {
            let mut block = require_block(db, id)?;
            let len = db.block_count(block.document_id)?;
            if new_position >= len {
                return Err(SopError::InvalidPosition { position: new_position, len });
            }
            let old = block.position;
            if old == new_position {
                return Ok(block);
            }

            let now = now_millis();
            if new_position < old {
                db.shift_positions(block.document_id, new_position, Some(old), 1, now)?;
            } else {
                db.shift_positions(block.document_id, old + 1, Some(new_position + 1), -1, now)?;
            }
            db.set_position(id, new_position, now)?;
            db.touch_document(block.document_id, now)?;

            debug!(
                document = %block.document_id,
                "moved block {} from {} to {}",
                id.short(),
                old,
                new_position
            );
            block.position = new_position;
            block.updated_at = now;
            Ok(block)
        })
    }

    /// Rewrite every position from a full ordering of the document's blocks.
    ///
    /// `ordered` must list each block of the document exactly once.
    pub fn reorder_blocks(&self, document_id: DocumentId, ordered: &[BlockId]) -> Result<Vec<Block>> {
        let db = self.db.lock();
        db.atomically(|db| {
            require_document(db, document_id)?;
            let current = db.list_blocks(document_id)?;
            let len = current.len() as u32;
            if ordered.len() != current.len() {
                return Err(SopError::InvalidPosition { position: ordered.len() as u32, len });
            }

            let mut seen = std::collections::HashSet::with_capacity(ordered.len());
            for (index, id) in ordered.iter().enumerate() {
                if !current.iter().any(|b| b.id == *id) {
                    return Err(SopError::BlockNotFound(*id));
                }
                if !seen.insert(*id) {
                    return Err(SopError::InvalidPosition { position: index as u32, len });
                }
            }

            let now = now_millis();
            for (index, id) in ordered.iter().enumerate() {
                db.set_position(*id, index as u32, now)?;
            }
            db.touch_document(document_id, now)?;
            debug!(document = %document_id, "reordered {} blocks", len);
            Ok(db.list_blocks(document_id)?)
        })
    }

    /// Remove a block and close the gap it leaves.
    pub fn delete_block(&self, id: BlockId) -> Result<()> {
        let db = self.db.lock();
        db.atomically(|db| {
            let block = require_block(db, id)?;
            let now = now_millis();
            db.delete_block(id)?;
            db.shift_positions(block.document_id, block.position + 1, None, -1, now)?;
            db.touch_document(block.document_id, now)?;
            debug!(
                document = %block.document_id,
                "deleted block {} from {}",
                id.short(),
                block.position
            );
            Ok(())
        })
    }
}
