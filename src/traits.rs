//! Adapter traits for the subsystems a collection is materialized across.
//!
//! Each trait fixes the contract of one external collaborator: the vector
//! index, the fulltext index, the knowledge-graph engine, the object store,
//! the remote source, the document-management service, and the embedding
//! resolver. The orchestrator sequences these; it never reaches past the
//! trait boundary.

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::{Collection, CollectionConfig, RemoteDocument};

/// Vector index collaborator.
///
/// `create_collection` must be idempotent by name: creating a collection
/// that already exists succeeds. Initialize has no rollback path, so retries
/// after a partial failure converge only if creation converges.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn create_collection(&self, name: &str, vector_size: u64) -> Result<()>;
    async fn delete_collection(&self, name: &str) -> Result<()>;
}

/// Fulltext index collaborator. Creation is idempotent by name, like
/// [`VectorIndex::create_collection`].
#[async_trait]
pub trait FulltextIndex: Send + Sync {
    async fn create_index(&self, name: &str) -> Result<()>;
    async fn delete_index(&self, name: &str) -> Result<()>;
}

/// A live knowledge-graph session scoped to one collection.
///
/// `finalize` consumes the handle, so it runs exactly once; callers must
/// finalize on every exit path once a handle has been acquired.
#[async_trait]
pub trait KnowledgeGraphHandle: Send + Sync {
    async fn delete_by_document_id(&self, document_id: &str) -> Result<()>;
    async fn finalize(self: Box<Self>) -> Result<()>;
}

/// Knowledge-graph engine collaborator.
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    async fn create_instance(
        &self,
        collection: &Collection,
    ) -> Result<Box<dyn KnowledgeGraphHandle>>;
}

/// Object store collaborator holding uploaded document payloads.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, content: &[u8]) -> Result<()>;
    async fn delete_objects_by_prefix(&self, prefix: &str) -> Result<()>;
}

/// A remote document materialized to a local file by
/// [`SourceConnector::prepare_document`]. The caller owns cleanup via
/// [`SourceConnector::cleanup_document`].
#[derive(Debug)]
pub struct PreparedDocument {
    pub path: PathBuf,
}

/// Source connector over the external source of truth.
///
/// `scan_documents` is finite and one-shot: the full remote listing is
/// materialized for a single reconciliation pass.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    async fn scan_documents(&self) -> Result<Vec<RemoteDocument>>;

    async fn prepare_document(
        &self,
        name: &str,
        metadata: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<PreparedDocument>;

    async fn cleanup_document(&self, path: &Path) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Opens a [`SourceConnector`] for a collection's declared source.
///
/// A seam so reconciliation can be exercised against in-memory sources in
/// tests.
pub trait SourceFactory: Send + Sync {
    fn open(&self, config: &CollectionConfig) -> Result<Box<dyn SourceConnector>>;
}

/// One file to hand to the document-management service.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub content: Vec<u8>,
    pub size: i64,
}

#[derive(Debug, Clone)]
pub struct CreatedDocument {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct CreateDocumentsResult {
    pub items: Vec<CreatedDocument>,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteDocumentsResult {
    pub status: String,
    pub deleted_ids: Vec<String>,
}

/// Document-management collaborator owning document creation and deletion.
#[async_trait]
pub trait DocumentManager: Send + Sync {
    async fn create_documents(
        &self,
        user: &str,
        collection_id: &str,
        files: Vec<UploadFile>,
    ) -> Result<CreateDocumentsResult>;

    async fn delete_documents(
        &self,
        user: &str,
        collection_id: &str,
        document_ids: &[String],
    ) -> Result<DeleteDocumentsResult>;
}

/// Resolves the embedding service configured for a collection to the vector
/// dimensionality the vector index must be sized for.
#[async_trait]
pub trait EmbeddingResolver: Send + Sync {
    async fn resolve(&self, collection: &Collection) -> Result<u64>;
}

/// The full set of subsystem collaborators one orchestrator instance drives.
#[derive(Clone)]
pub struct Subsystems {
    pub vector: Arc<dyn VectorIndex>,
    pub fulltext: Arc<dyn FulltextIndex>,
    pub graph: Arc<dyn KnowledgeGraph>,
    pub object_store: Arc<dyn ObjectStore>,
    pub documents: Arc<dyn DocumentManager>,
    pub embeddings: Arc<dyn EmbeddingResolver>,
}
