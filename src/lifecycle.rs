//! Collection lifecycle: initialize and delete.
//!
//! `initialize` materializes a PENDING collection across the vector and
//! fulltext indexes and flips it ACTIVE. `delete` tears the indexes down
//! and purges knowledge-graph data first, so no graph entry outlives the
//! documents it was extracted from. Both fold every internal error into a
//! failed [`TaskResult`] at the boundary.

use serde_json::json;
use tracing::{info, warn};

use crate::error::TaskError;
use crate::models::{Collection, CollectionStatus, DeletionStats, TaskResult};
use crate::store::CollectionStore;
use crate::traits::Subsystems;

/// Name of the vector-index collection backing a collection.
pub fn vector_collection_name(collection_id: &str) -> String {
    format!("collection_{}", collection_id)
}

/// Name of the fulltext index backing a collection.
pub fn fulltext_index_name(collection_id: &str) -> String {
    format!("collection_{}", collection_id)
}

pub struct LifecycleOrchestrator {
    store: CollectionStore,
    subsystems: Subsystems,
}

impl LifecycleOrchestrator {
    pub fn new(store: CollectionStore, subsystems: Subsystems) -> Self {
        Self { store, subsystems }
    }

    /// Bring a newly created collection into service.
    pub async fn initialize(&self, collection_id: &str, document_user_quota: u64) -> TaskResult {
        match self.run_initialize(collection_id).await {
            Ok(()) => {
                info!(collection = collection_id, "collection initialized");
                TaskResult::ok_with_metadata(
                    json!({"collection_id": collection_id, "status": "initialized"}),
                    json!({"document_user_quota": document_user_quota}),
                )
            }
            Err(e) => {
                warn!(collection = collection_id, error = %e, "initialize failed");
                TaskResult::failure(e)
            }
        }
    }

    async fn run_initialize(&self, collection_id: &str) -> Result<(), TaskError> {
        let mut collection = self
            .store
            .get_collection_by_id(collection_id, true)
            .await
            .map_err(|e| TaskError::subsystem("store", e))?
            .ok_or_else(|| TaskError::NotFound(collection_id.to_string()))?;

        if collection.status == CollectionStatus::Deleted {
            return Err(TaskError::AlreadyDeleted(collection_id.to_string()));
        }

        let vector_size = self
            .subsystems
            .embeddings
            .resolve(&collection)
            .await
            .map_err(|e| TaskError::subsystem("embedding service", e))?;

        // Creation is idempotent-by-name in both indexes, so a retry after a
        // partial failure converges without rollback.
        self.subsystems
            .vector
            .create_collection(&vector_collection_name(collection_id), vector_size)
            .await
            .map_err(|e| TaskError::subsystem("vector index", e))?;

        self.subsystems
            .fulltext
            .create_index(&fulltext_index_name(collection_id))
            .await
            .map_err(|e| TaskError::subsystem("fulltext index", e))?;

        collection.status = CollectionStatus::Active;
        self.store
            .update_collection(&collection)
            .await
            .map_err(|e| TaskError::subsystem("store", e))?;

        Ok(())
    }

    /// Tear down a collection's backing resources.
    pub async fn delete(&self, collection_id: &str) -> TaskResult {
        match self.run_delete(collection_id).await {
            Ok(stats) => {
                info!(
                    collection = collection_id,
                    graph_deleted = stats.documents_deleted,
                    graph_failed = stats.documents_failed,
                    "collection deleted"
                );
                TaskResult::ok_with_metadata(
                    json!({"collection_id": collection_id, "status": "deleted"}),
                    serde_json::to_value(&stats).unwrap_or(serde_json::Value::Null),
                )
            }
            Err(e) => {
                warn!(collection = collection_id, error = %e, "delete failed");
                TaskResult::failure(e)
            }
        }
    }

    async fn run_delete(&self, collection_id: &str) -> Result<DeletionStats, TaskError> {
        let collection = self
            .store
            .get_collection_by_id(collection_id, true)
            .await
            .map_err(|e| TaskError::subsystem("store", e))?
            .ok_or_else(|| TaskError::NotFound(collection_id.to_string()))?;

        // Graph data first: per-document failures are recorded, never fatal
        let stats = self.delete_knowledge_graph_data(&collection).await?;

        self.subsystems
            .vector
            .delete_collection(&vector_collection_name(collection_id))
            .await
            .map_err(|e| TaskError::subsystem("vector index", e))?;

        self.subsystems
            .fulltext
            .delete_index(&fulltext_index_name(collection_id))
            .await
            .map_err(|e| TaskError::subsystem("fulltext index", e))?;

        Ok(stats)
    }

    async fn delete_knowledge_graph_data(
        &self,
        collection: &Collection,
    ) -> Result<DeletionStats, TaskError> {
        let config = collection
            .parsed_config()
            .map_err(|e| TaskError::subsystem("config", e))?;

        let mut stats = DeletionStats::default();
        if !config.enable_knowledge_graph {
            return Ok(stats);
        }
        stats.knowledge_graph_enabled = true;

        // List before acquiring the handle so a listing failure never leaves
        // an unfinalized session behind.
        let documents = self
            .store
            .list_documents(&collection.user, &collection.id)
            .await
            .map_err(|e| TaskError::subsystem("store", e))?;

        let handle = self
            .subsystems
            .graph
            .create_instance(collection)
            .await
            .map_err(|e| TaskError::subsystem("knowledge graph", e))?;

        for document in &documents {
            match handle.delete_by_document_id(&document.id).await {
                Ok(()) => stats.documents_deleted += 1,
                Err(e) => {
                    warn!(
                        collection = %collection.id,
                        document = %document.id,
                        error = %e,
                        "knowledge graph deletion failed for document"
                    );
                    stats.documents_failed += 1;
                }
            }
        }

        handle
            .finalize()
            .await
            .map_err(|e| TaskError::subsystem("knowledge graph", e))?;

        Ok(stats)
    }
}
