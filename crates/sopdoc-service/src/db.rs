//! SQLite persistence for documents and their blocks.
//!
//! Two tables: `documents` (header + free-form metadata) and `blocks`
//! (one row per block, `position` dense per document, `content` holding the
//! JSON payload next to its `kind` tag). Position-shifting sequences are run
//! through [`DocumentDb::atomically`] so no partial shift is ever visible.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{
    params, Connection, OptionalExtension, Result as SqliteResult, Row, Transaction,
    TransactionBehavior,
};

use sopdoc_types::{Block, BlockContent, BlockId, BlockKind, Document, DocumentId, DocumentStatus};

/// Database handle for document persistence.
pub struct DocumentDb {
    conn: Connection,
}

/// Thread-safe database handle shared by the services.
pub type SharedDb = Arc<Mutex<DocumentDb>>;

/// Wrap a database for sharing between services.
pub fn shared(db: DocumentDb) -> SharedDb {
    Arc::new(Mutex::new(db))
}

const SCHEMA: &str = r#"
-- Document headers
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    doc_key TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL,
    status TEXT NOT NULL,
    title TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    revision INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Blocks (position is dense per document; no UNIQUE so shifts can run row by row)
CREATE TABLE IF NOT EXISTS blocks (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    kind TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_blocks_position ON blocks(document_id, position);
"#;

const DOCUMENT_COLUMNS: &str =
    "id, doc_key, kind, status, title, metadata, revision, created_at, updated_at";

const BLOCK_COLUMNS: &str =
    "id, document_id, position, kind, content, metadata, created_at, updated_at";

// =============================================================================
// Row Conversion
// =============================================================================

/// Parse a TEXT column through `FromStr`.
fn parse_column<T>(row: &Row<'_>, idx: usize) -> SqliteResult<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a JSON TEXT column.
fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> SqliteResult<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn to_json_text<T: serde::Serialize>(value: &T) -> SqliteResult<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn document_from_row(row: &Row<'_>) -> SqliteResult<Document> {
    Ok(Document {
        id: parse_column(row, 0)?,
        key: row.get(1)?,
        kind: parse_column(row, 2)?,
        status: parse_column(row, 3)?,
        title: row.get(4)?,
        metadata: json_column(row, 5)?,
        revision: row.get::<_, i64>(6)? as u64,
        created_at: row.get::<_, i64>(7)? as u64,
        updated_at: row.get::<_, i64>(8)? as u64,
    })
}

fn block_from_row(row: &Row<'_>) -> SqliteResult<Block> {
    let kind: BlockKind = parse_column(row, 3)?;
    let payload: serde_json::Value = json_column(row, 4)?;
    let content = BlockContent::parse(kind, payload)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(Block {
        id: parse_column(row, 0)?,
        document_id: parse_column(row, 1)?,
        position: row.get(2)?,
        content,
        metadata: json_column(row, 5)?,
        created_at: row.get::<_, i64>(6)? as u64,
        updated_at: row.get::<_, i64>(7)? as u64,
    })
}

impl DocumentDb {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// Every statement issued through `self` while `f` runs belongs to the
    /// transaction. Any error rolls the whole batch back. Calls must not nest.
    pub fn atomically<T, E>(&self, f: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Insert a new document header.
    pub fn insert_document(&self, doc: &Document) -> SqliteResult<()> {
        self.conn.execute(
            "INSERT INTO documents (id, doc_key, kind, status, title, metadata, revision, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                doc.id.to_hex(),
                doc.key,
                doc.kind.as_str(),
                doc.status.as_str(),
                doc.title,
                to_json_text(&doc.metadata)?,
                doc.revision as i64,
                doc.created_at as i64,
                doc.updated_at as i64,
            ],
        )?;
        Ok(())
    }

    /// Get a document by ID.
    pub fn get_document(&self, id: DocumentId) -> SqliteResult<Option<Document>> {
        self.conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
                params![id.to_hex()],
                document_from_row,
            )
            .optional()
    }

    /// Get a document by its unique key.
    pub fn get_document_by_key(&self, key: &str) -> SqliteResult<Option<Document>> {
        self.conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE doc_key = ?1"),
                params![key],
                document_from_row,
            )
            .optional()
    }

    /// List all documents, oldest first.
    pub fn list_documents(&self) -> SqliteResult<Vec<Document>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([], document_from_row)?;
        rows.collect()
    }

    /// Update a document's status. Returns false if the document is unknown.
    pub fn set_status(&self, id: DocumentId, status: DocumentStatus, now: u64) -> SqliteResult<bool> {
        let changed = self.conn.execute(
            "UPDATE documents SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now as i64, id.to_hex()],
        )?;
        Ok(changed > 0)
    }

    /// Record a block mutation: bump revision and updated_at.
    pub fn touch_document(&self, id: DocumentId, now: u64) -> SqliteResult<bool> {
        let changed = self.conn.execute(
            "UPDATE documents SET revision = revision + 1, updated_at = ?1 WHERE id = ?2",
            params![now as i64, id.to_hex()],
        )?;
        Ok(changed > 0)
    }

    /// Delete a document; its blocks go with it (ON DELETE CASCADE).
    pub fn delete_document(&self, id: DocumentId) -> SqliteResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id.to_hex()])?;
        Ok(changed > 0)
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Number of blocks in a document.
    pub fn block_count(&self, document_id: DocumentId) -> SqliteResult<u32> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM blocks WHERE document_id = ?1",
            params![document_id.to_hex()],
            |row| row.get(0),
        )
    }

    /// All blocks of a document, ordered by position.
    pub fn list_blocks(&self, document_id: DocumentId) -> SqliteResult<Vec<Block>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks WHERE document_id = ?1 ORDER BY position, id"
        ))?;
        let rows = stmt.query_map(params![document_id.to_hex()], block_from_row)?;
        rows.collect()
    }

    /// Get a block by ID.
    pub fn get_block(&self, id: BlockId) -> SqliteResult<Option<Block>> {
        self.conn
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE id = ?1"),
                params![id.to_hex()],
                block_from_row,
            )
            .optional()
    }

    /// Insert a block row as-is. Callers make room at `block.position` first.
    pub fn insert_block(&self, block: &Block) -> SqliteResult<()> {
        self.conn.execute(
            "INSERT INTO blocks (id, document_id, position, kind, content, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                block.id.to_hex(),
                block.document_id.to_hex(),
                block.position,
                block.kind().as_str(),
                to_json_text(&block.content.payload())?,
                to_json_text(&block.metadata)?,
                block.created_at as i64,
                block.updated_at as i64,
            ],
        )?;
        Ok(())
    }

    /// Replace a block's content. The kind column follows the content.
    pub fn update_block_content(
        &self,
        id: BlockId,
        content: &BlockContent,
        now: u64,
    ) -> SqliteResult<bool> {
        let changed = self.conn.execute(
            "UPDATE blocks SET kind = ?1, content = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                content.kind().as_str(),
                to_json_text(&content.payload())?,
                now as i64,
                id.to_hex(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Replace a block's metadata.
    pub fn set_block_metadata(
        &self,
        id: BlockId,
        metadata: &serde_json::Map<String, serde_json::Value>,
        now: u64,
    ) -> SqliteResult<bool> {
        let changed = self.conn.execute(
            "UPDATE blocks SET metadata = ?1, updated_at = ?2 WHERE id = ?3",
            params![to_json_text(metadata)?, now as i64, id.to_hex()],
        )?;
        Ok(changed > 0)
    }

    /// Delete a single block row without compacting.
    pub fn delete_block(&self, id: BlockId) -> SqliteResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM blocks WHERE id = ?1", params![id.to_hex()])?;
        Ok(changed > 0)
    }

    /// Add `delta` to every position in `from..until` (`until = None` means open-ended).
    pub fn shift_positions(
        &self,
        document_id: DocumentId,
        from: u32,
        until: Option<u32>,
        delta: i64,
        now: u64,
    ) -> SqliteResult<usize> {
        let until = until.map(i64::from).unwrap_or(i64::MAX);
        self.conn.execute(
            "UPDATE blocks SET position = position + ?1, updated_at = ?2
             WHERE document_id = ?3 AND position >= ?4 AND position < ?5",
            params![delta, now as i64, document_id.to_hex(), from, until],
        )
    }

    /// Set one block's position.
    pub fn set_position(&self, id: BlockId, position: u32, now: u64) -> SqliteResult<bool> {
        let changed = self.conn.execute(
            "UPDATE blocks SET position = ?1, updated_at = ?2 WHERE id = ?3",
            params![position, now as i64, id.to_hex()],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sopdoc_types::{NewDocument, StepContent};

    fn doc_with_blocks(db: &DocumentDb, n: u32) -> (Document, Vec<Block>) {
        let doc = NewDocument::new("lab", "Lab").into_document();
        db.insert_document(&doc).unwrap();
        let blocks: Vec<Block> = (0..n)
            .map(|i| Block::new(doc.id, i, BlockContent::description(format!("para {i}"))))
            .collect();
        for b in &blocks {
            db.insert_block(b).unwrap();
        }
        (doc, blocks)
    }

    #[test]
    fn test_document_crud() {
        let db = DocumentDb::in_memory().unwrap();
        let doc = NewDocument::new("lab-safety", "Laboratory Safety Procedures")
            .metadata("risk_level", "medium")
            .into_document();
        db.insert_document(&doc).unwrap();

        let loaded = db.get_document(doc.id).unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(db.get_document_by_key("lab-safety").unwrap().unwrap().id, doc.id);
        assert_eq!(db.list_documents().unwrap().len(), 1);

        assert!(db.set_status(doc.id, DocumentStatus::Review, 42).unwrap());
        let loaded = db.get_document(doc.id).unwrap().unwrap();
        assert_eq!(loaded.status, DocumentStatus::Review);
        assert_eq!(loaded.updated_at, 42);

        assert!(db.touch_document(doc.id, 50).unwrap());
        assert_eq!(db.get_document(doc.id).unwrap().unwrap().revision, 1);

        assert!(db.delete_document(doc.id).unwrap());
        assert!(db.get_document(doc.id).unwrap().is_none());
        assert!(!db.delete_document(doc.id).unwrap());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let db = DocumentDb::in_memory().unwrap();
        db.insert_document(&NewDocument::new("k", "One").into_document()).unwrap();
        let err = db
            .insert_document(&NewDocument::new("k", "Two").into_document())
            .unwrap_err();
        assert_eq!(err.sqlite_error_code(), Some(rusqlite::ErrorCode::ConstraintViolation));
    }

    #[test]
    fn test_block_roundtrip() {
        let db = DocumentDb::in_memory().unwrap();
        let doc = NewDocument::new("lab", "Lab").into_document();
        db.insert_document(&doc).unwrap();

        let mut metadata = serde_json::Map::new();
        metadata.insert("source".into(), serde_json::json!("OSHA 1910.133"));
        let step = Block::new(
            doc.id,
            0,
            BlockContent::Step(StepContent::new("Check", "Inspect goggles").ppe_required(true)),
        )
        .with_metadata(metadata);
        db.insert_block(&step).unwrap();

        let loaded = db.get_block(step.id).unwrap().unwrap();
        assert_eq!(loaded, step);

        let mut notes = serde_json::Map::new();
        notes.insert("reviewed".into(), serde_json::json!(true));
        assert!(db.set_block_metadata(step.id, &notes, 8).unwrap());
        let loaded = db.get_block(step.id).unwrap().unwrap();
        assert_eq!(loaded.metadata, notes);
        assert_eq!(loaded.content, step.content);
        assert_eq!(db.block_count(doc.id).unwrap(), 1);

        assert!(db.update_block_content(step.id, &BlockContent::title("Now a title"), 9).unwrap());
        let loaded = db.get_block(step.id).unwrap().unwrap();
        assert_eq!(loaded.kind(), BlockKind::Title);
        assert_eq!(loaded.updated_at, 9);
    }

    #[test]
    fn test_shift_positions_range() {
        let db = DocumentDb::in_memory().unwrap();
        let (doc, blocks) = doc_with_blocks(&db, 5);

        // Shift [1, 3) up by one
        let shifted = db.shift_positions(doc.id, 1, Some(3), 1, 0).unwrap();
        assert_eq!(shifted, 2);

        let positions: Vec<(BlockId, u32)> = blocks
            .iter()
            .map(|b| (b.id, db.get_block(b.id).unwrap().unwrap().position))
            .collect();
        assert_eq!(positions[0].1, 0);
        assert_eq!(positions[1].1, 2);
        assert_eq!(positions[2].1, 3);
        assert_eq!(positions[3].1, 3);
        assert_eq!(positions[4].1, 4);
    }

    #[test]
    fn test_atomically_rolls_back() {
        let db = DocumentDb::in_memory().unwrap();
        let (doc, _) = doc_with_blocks(&db, 3);

        let result: Result<(), rusqlite::Error> = db.atomically(|db| {
            db.shift_positions(doc.id, 0, None, 10, 0)?;
            Err(rusqlite::Error::QueryReturnedNoRows)
        });
        assert!(result.is_err());

        let positions: Vec<u32> = db.list_blocks(doc.id).unwrap().iter().map(|b| b.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_delete_document_cascades() {
        let db = DocumentDb::in_memory().unwrap();
        let (doc, blocks) = doc_with_blocks(&db, 2);
        db.delete_document(doc.id).unwrap();
        assert!(db.get_block(blocks[0].id).unwrap().is_none());
        assert_eq!(db.block_count(doc.id).unwrap(), 0);
    }

    #[test]
    fn test_block_requires_document() {
        let db = DocumentDb::in_memory().unwrap();
        let orphan = Block::new(DocumentId::new(), 0, BlockContent::title("x"));
        assert!(db.insert_block(&orphan).is_err());
    }

    #[test]
    fn test_open_on_disk_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("docs.db");
        let doc = NewDocument::new("disk", "On Disk").into_document();
        {
            let db = DocumentDb::open(&path).unwrap();
            db.insert_document(&doc).unwrap();
        }
        let db = DocumentDb::open(&path).unwrap();
        assert_eq!(db.get_document(doc.id).unwrap().unwrap().key, "disk");
    }
}
