//! Document-level façade over the block service, assembler and validator.

use std::path::Path;

use tracing::{debug, info, warn};

use sopdoc_types::{
    now_millis, resolve_document_prefix, Document, DocumentId, DocumentStatus, NewDocument,
};

use crate::assembly::{AssembledDocument, AssemblyFormat, AssemblyOptions, DocumentAssembler};
use crate::block_service::BlockService;
use crate::db::{shared, DocumentDb, SharedDb};
use crate::error::{Result, SopError};
use crate::validation::{DocumentValidator, ValidationReport};

/// Keys and titles must carry some text.
fn check_header(doc: &Document) -> Result<()> {
    if doc.key.trim().is_empty() {
        return Err(SopError::InvalidKey(doc.key.clone()));
    }
    if doc.title.trim().is_empty() {
        return Err(SopError::BlankTitle);
    }
    Ok(())
}

/// Entry point for document operations.
///
/// Holds nothing but the shared database handle and the stateless
/// collaborators; clones share the same connection.
#[derive(Clone)]
pub struct SopService {
    db: SharedDb,
    blocks: BlockService,
    assembler: DocumentAssembler,
    validator: DocumentValidator,
}

impl SopService {
    pub fn new(db: DocumentDb) -> Self {
        Self::from_shared(shared(db))
    }

    pub fn from_shared(db: SharedDb) -> Self {
        Self {
            blocks: BlockService::new(db.clone()),
            db,
            assembler: DocumentAssembler,
            validator: DocumentValidator,
        }
    }

    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(DocumentDb::open(path)?))
    }

    /// Service over a fresh in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(DocumentDb::in_memory()?))
    }

    /// Block-level operations.
    pub fn block_service(&self) -> &BlockService {
        &self.blocks
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Create a draft document. Keys are unique; keys and titles are non-blank.
    pub fn create_document(&self, new: NewDocument) -> Result<Document> {
        let doc = new.into_document();
        check_header(&doc).inspect_err(|e| warn!("rejected document: {}", e))?;
        let db = self.db.lock();
        db.atomically(|db| {
            if db.get_document_by_key(&doc.key)?.is_some() {
                warn!("document key {:?} already exists", doc.key);
                return Err(SopError::DuplicateKey(doc.key.clone()));
            }
            db.insert_document(&doc)?;
            Ok(())
        })?;
        info!(document = %doc.id, kind = %doc.kind, "created document {:?}", doc.key);
        Ok(doc)
    }

    pub fn get_document(&self, id: DocumentId) -> Result<Document> {
        self.db
            .lock()
            .get_document(id)?
            .ok_or_else(|| SopError::document_not_found(id))
    }

    /// Look up by key, full id, or a unique key / id-hex prefix.
    pub fn find_document(&self, query: &str) -> Result<Document> {
        let db = self.db.lock();
        let documents = db.list_documents()?;
        let id = resolve_document_prefix(documents.iter().map(|d| (d.id, d.key.as_str())), query)?;
        documents
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| SopError::document_not_found(id))
    }

    pub fn list_documents(&self) -> Result<Vec<Document>> {
        Ok(self.db.lock().list_documents()?)
    }

    /// Move a document along its lifecycle.
    pub fn set_status(&self, id: DocumentId, status: DocumentStatus) -> Result<Document> {
        let db = self.db.lock();
        db.atomically(|db| {
            let mut doc = db.get_document(id)?.ok_or_else(|| SopError::document_not_found(id))?;
            if !doc.status.can_transition_to(status) {
                warn!(document = %id, "rejected status change {} -> {}", doc.status, status);
                return Err(SopError::InvalidStatusTransition { from: doc.status, to: status });
            }
            if doc.status == status {
                return Ok(doc);
            }

            let now = now_millis();
            db.set_status(id, status, now)?;
            info!(document = %id, "status {} -> {}", doc.status, status);
            doc.status = status;
            doc.updated_at = now;
            Ok(doc)
        })
    }

    /// Delete a document and all of its blocks.
    pub fn delete_document(&self, id: DocumentId) -> Result<()> {
        if !self.db.lock().delete_document(id)? {
            return Err(SopError::document_not_found(id));
        }
        info!(document = %id, "deleted document");
        Ok(())
    }

    // =========================================================================
    // Assembly & validation
    // =========================================================================

    /// Header and blocks read under one lock, so they agree with each other.
    fn snapshot(&self, id: DocumentId) -> Result<(Document, Vec<sopdoc_types::Block>)> {
        let db = self.db.lock();
        let doc = db.get_document(id)?.ok_or_else(|| SopError::document_not_found(id))?;
        let blocks = db.list_blocks(id)?;
        Ok((doc, blocks))
    }

    pub fn assemble(
        &self,
        id: DocumentId,
        format: AssemblyFormat,
        options: AssemblyOptions,
    ) -> Result<AssembledDocument> {
        let (doc, blocks) = self.snapshot(id)?;
        let assembled = self.assembler.assemble(&doc, &blocks, format, options)?;
        debug!(
            document = %id,
            "assembled {} ({} blocks, {} bytes)",
            format,
            assembled.block_count,
            assembled.content.len()
        );
        Ok(assembled)
    }

    pub fn validate(&self, id: DocumentId) -> Result<ValidationReport> {
        let (doc, blocks) = self.snapshot(id)?;
        let report = self.validator.validate(&doc, &blocks);
        debug!(document = %id, "validated: {} findings", report.findings.len());
        Ok(report)
    }

    /// Structural JSON for backup or transfer.
    pub fn export_json(&self, id: DocumentId) -> Result<String> {
        Ok(self
            .assemble(id, AssemblyFormat::Json, AssemblyOptions::default())?
            .content)
    }

    /// Create a new document from [`export_json`](Self::export_json) output.
    ///
    /// The import gets fresh document and block ids and starts as a draft.
    /// `key` overrides the exported key (needed when importing into the same
    /// database). Every payload is re-checked; nothing is written unless all
    /// blocks pass.
    pub fn import_json(&self, json: &str, key: Option<&str>) -> Result<Document> {
        let (exported, blocks) = self.assembler.reconstruct(json)?;

        let mut new = NewDocument::new(key.unwrap_or(&exported.key), exported.title)
            .kind(exported.kind);
        new.metadata = exported.metadata;
        let doc = new.into_document();
        check_header(&doc)?;

        let db = self.db.lock();
        db.atomically(|db| {
            if db.get_document_by_key(&doc.key)?.is_some() {
                return Err(SopError::DuplicateKey(doc.key.clone()));
            }
            db.insert_document(&doc)?;
            for block in &blocks {
                let mut copy = block.duplicate_at(block.position);
                copy.document_id = doc.id;
                db.insert_block(&copy)?;
            }
            Ok(())
        })?;

        info!(
            document = %doc.id,
            "imported {:?} with {} blocks",
            doc.key,
            blocks.len()
        );
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sopdoc_types::{BlockContent, DocumentKind};

    fn service_with_doc(key: &str) -> (SopService, Document) {
        let svc = SopService::in_memory().unwrap();
        let doc = svc.create_document(NewDocument::new(key, "Lab Safety")).unwrap();
        (svc, doc)
    }

    #[test]
    fn test_create_and_find() {
        let (svc, doc) = service_with_doc("lab-safety");
        svc.create_document(NewDocument::new("lab-waste", "Waste")).unwrap();

        assert_eq!(svc.get_document(doc.id).unwrap(), doc);
        assert_eq!(svc.find_document("lab-safety").unwrap().id, doc.id);
        assert_eq!(svc.find_document("lab-s").unwrap().id, doc.id);
        assert_eq!(svc.find_document(&doc.id.to_hex()[..30]).unwrap().id, doc.id);
        assert!(matches!(
            svc.find_document("lab-"),
            Err(SopError::AmbiguousReference(_))
        ));
        assert!(svc.find_document("boiler").unwrap_err().is_not_found());
        assert_eq!(svc.list_documents().unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_key() {
        let (svc, _) = service_with_doc("lab");
        let err = svc.create_document(NewDocument::new("lab", "Again")).unwrap_err();
        assert!(matches!(err, SopError::DuplicateKey(ref k) if k == "lab"));
    }

    #[test]
    fn test_blank_key_and_title_rejected() {
        let svc = SopService::in_memory().unwrap();
        for key in ["", "   "] {
            assert!(matches!(
                svc.create_document(NewDocument::new(key, "Lab")),
                Err(SopError::InvalidKey(ref k)) if k == key
            ));
        }
        assert!(matches!(
            svc.create_document(NewDocument::new("lab", " ")),
            Err(SopError::BlankTitle)
        ));
        assert!(svc.list_documents().unwrap().is_empty());

        let doc = svc.create_document(NewDocument::new("lab", "Lab")).unwrap();
        assert!(svc.find_document("").unwrap_err().is_not_found());

        let exported = svc.export_json(doc.id).unwrap();
        assert!(matches!(
            svc.import_json(&exported, Some("")),
            Err(SopError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_status_lifecycle() {
        let (svc, doc) = service_with_doc("lab");
        let doc = svc.set_status(doc.id, DocumentStatus::Review).unwrap();
        assert_eq!(doc.status, DocumentStatus::Review);

        let err = svc.set_status(doc.id, DocumentStatus::Published).unwrap_err();
        assert!(matches!(
            err,
            SopError::InvalidStatusTransition { from: DocumentStatus::Review, to: DocumentStatus::Published }
        ));

        svc.set_status(doc.id, DocumentStatus::Approved).unwrap();
        svc.set_status(doc.id, DocumentStatus::Published).unwrap();
        assert_eq!(svc.get_document(doc.id).unwrap().status, DocumentStatus::Published);
    }

    #[test]
    fn test_delete_document_removes_blocks() {
        let (svc, doc) = service_with_doc("lab");
        let block = svc
            .block_service()
            .add_block(doc.id, "title", json!("Lab"), None)
            .unwrap();
        svc.delete_document(doc.id).unwrap();

        assert!(svc.get_document(doc.id).unwrap_err().is_not_found());
        assert!(svc.block_service().get_block(doc.id, block.id).is_err());
        assert!(svc.delete_document(doc.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_assemble_unknown_document() {
        let svc = SopService::in_memory().unwrap();
        let err = svc
            .assemble(DocumentId::new(), AssemblyFormat::Html, AssemblyOptions::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_export_import_copy() {
        let svc = SopService::in_memory().unwrap();
        let doc = svc
            .create_document(
                NewDocument::new("gear", "Gear Check")
                    .kind(DocumentKind::Checklist)
                    .metadata("site", "B2"),
            )
            .unwrap();
        let blocks = svc.block_service();
        blocks.add_content(doc.id, BlockContent::title("Gear Check"), None).unwrap();
        blocks
            .add_block_with_metadata(
                doc.id,
                "checklist",
                json!({ "items": [{ "id": 1, "text": "Goggles" }] }),
                json!({ "source": "site audit" }).as_object().cloned().unwrap(),
                None,
            )
            .unwrap();

        let exported = svc.export_json(doc.id).unwrap();
        assert!(matches!(
            svc.import_json(&exported, None),
            Err(SopError::DuplicateKey(_))
        ));

        let copy = svc.import_json(&exported, Some("gear-copy")).unwrap();
        assert_ne!(copy.id, doc.id);
        assert_eq!(copy.kind, DocumentKind::Checklist);
        assert_eq!(copy.status, DocumentStatus::Draft);
        assert_eq!(copy.metadata["site"], "B2");

        let original: Vec<(BlockContent, serde_json::Map<String, serde_json::Value>)> = blocks
            .get_blocks(doc.id)
            .unwrap()
            .into_iter()
            .map(|b| (b.content, b.metadata))
            .collect();
        let imported: Vec<(BlockContent, serde_json::Map<String, serde_json::Value>)> = blocks
            .get_blocks(copy.id)
            .unwrap()
            .into_iter()
            .map(|b| (b.content, b.metadata))
            .collect();
        assert_eq!(imported[1].1["source"], "site audit");
        assert_eq!(imported, original);
        assert!(svc.validate(copy.id).unwrap().is_valid());
    }
}
