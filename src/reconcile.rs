//! Source reconciliation: diff the remote listing against the local
//! inventory and converge.
//!
//! One sync pass scans the collection's declared source, classifies each
//! remote object as create / update / unchanged, and applies the plan
//! through the document-management collaborator. Failures are isolated at
//! the tightest scope that preserves batch semantics: one bad object fails
//! one object, one bad batch submission fails one batch, and only an
//! unusable collection or source fails the pass.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::TaskError;
use crate::models::{Collection, Document, RemoteDocument, SyncStats, TaskResult};
use crate::store::CollectionStore;
use crate::traits::{DocumentManager, PreparedDocument, SourceConnector, SourceFactory, UploadFile};
use crate::waiter::StateWaiter;

/// Remote documents are created in fixed-size batches so one submission
/// failure is bounded to this many objects.
const CREATE_BATCH_SIZE: usize = 10;

pub struct ReconciliationEngine {
    store: CollectionStore,
    documents: Arc<dyn DocumentManager>,
    waiter: StateWaiter,
    source_factory: Arc<dyn SourceFactory>,
}

impl ReconciliationEngine {
    pub fn new(
        store: CollectionStore,
        documents: Arc<dyn DocumentManager>,
        waiter: StateWaiter,
        source_factory: Arc<dyn SourceFactory>,
    ) -> Self {
        Self {
            store,
            documents,
            waiter,
            source_factory,
        }
    }

    /// Run one reconciliation pass against the collection's source.
    pub async fn sync(&self, collection_id: &str, trigger_type: &str) -> TaskResult {
        match self.run_sync(collection_id).await {
            Ok(stats) => {
                info!(
                    collection = collection_id,
                    trigger = trigger_type,
                    total = stats.total_objects,
                    new = stats.new_documents,
                    updated = stats.updated_documents,
                    failed = stats.failed_documents,
                    "sync finished"
                );
                TaskResult::ok(json!({
                    "collection_id": collection_id,
                    "trigger_type": trigger_type,
                    "stats": stats,
                }))
            }
            Err(e) => {
                warn!(collection = collection_id, trigger = trigger_type, error = %e, "sync failed");
                TaskResult::failure(e)
            }
        }
    }

    async fn run_sync(&self, collection_id: &str) -> Result<SyncStats, TaskError> {
        let collection = self
            .waiter
            .wait_for_active(collection_id)
            .await
            .map_err(|e| TaskError::subsystem("store", e))?
            .ok_or_else(|| TaskError::NotReady(collection_id.to_string()))?;

        let config = collection
            .parsed_config()
            .map_err(|e| TaskError::subsystem("config", e))?;
        if !config.has_syncable_source() {
            return Err(TaskError::UnsupportedSourceKind(collection_id.to_string()));
        }

        let source = self
            .source_factory
            .open(&config)
            .map_err(|e| TaskError::subsystem("source", e))?;

        let result = self.sync_with_source(&collection, source.as_ref()).await;

        // Close on every exit path; a failed close does not taint the pass
        if let Err(e) = source.close().await {
            warn!(collection = collection_id, error = %e, "failed to close source connector");
        }

        result
    }

    async fn sync_with_source(
        &self,
        collection: &Collection,
        source: &dyn SourceConnector,
    ) -> Result<SyncStats, TaskError> {
        let mut stats = SyncStats::default();

        let remote_documents = source
            .scan_documents()
            .await
            .map_err(|e| TaskError::subsystem("source", e))?;
        stats.total_objects = remote_documents.len() as u64;

        let local_documents = self
            .store
            .list_documents(&collection.user, &collection.id)
            .await
            .map_err(|e| TaskError::subsystem("store", e))?;
        let by_name: HashMap<&str, &Document> = local_documents
            .iter()
            .map(|d| (d.name.as_str(), d))
            .collect();

        let mut to_create = Vec::new();
        let mut to_update = Vec::new();
        for remote in &remote_documents {
            match by_name.get(remote.name.as_str()) {
                None => to_create.push(remote),
                Some(existing) => {
                    if should_update_document(existing, remote) {
                        to_update.push((remote, *existing));
                    }
                }
            }
        }

        // Compute-only: remote deletions are surfaced in the log but never
        // acted on without an explicit retention policy.
        let remote_names: std::collections::HashSet<&str> =
            remote_documents.iter().map(|r| r.name.as_str()).collect();
        let vanished: Vec<&str> = local_documents
            .iter()
            .filter(|d| !remote_names.contains(d.name.as_str()))
            .map(|d| d.name.as_str())
            .collect();
        if !vanished.is_empty() {
            debug!(
                collection = %collection.id,
                count = vanished.len(),
                "documents no longer present in source (left untouched)"
            );
        }

        self.create_documents_from_source(collection, source, &to_create, &mut stats)
            .await;
        self.update_documents_from_source(collection, source, &to_update, &mut stats)
            .await;

        Ok(stats)
    }

    async fn create_documents_from_source(
        &self,
        collection: &Collection,
        source: &dyn SourceConnector,
        remotes: &[&RemoteDocument],
        stats: &mut SyncStats,
    ) {
        for batch in remotes.chunks(CREATE_BATCH_SIZE) {
            let mut prepared: Vec<(PreparedDocument, UploadFile)> = Vec::with_capacity(batch.len());
            for remote in batch {
                match prepare_upload(source, remote).await {
                    Ok(entry) => prepared.push(entry),
                    Err(e) => stats.record_failure(remote.name.as_str(), e),
                }
            }
            if prepared.is_empty() {
                continue;
            }

            let uploads: Vec<UploadFile> = prepared.iter().map(|(_, u)| u.clone()).collect();
            let filenames: Vec<String> = uploads.iter().map(|u| u.filename.clone()).collect();
            match self
                .documents
                .create_documents(&collection.user, &collection.id, uploads)
                .await
            {
                Ok(result) => {
                    stats.new_documents += result.items.len() as u64;
                }
                Err(e) => {
                    // The whole batch shares one failure reason
                    for name in &filenames {
                        stats.record_failure(name.as_str(), &e);
                    }
                }
            }

            for (doc, _) in &prepared {
                if let Err(e) = source.cleanup_document(&doc.path).await {
                    warn!(path = %doc.path.display(), error = %e, "failed to clean up prepared file");
                }
            }
        }
    }

    async fn update_documents_from_source(
        &self,
        collection: &Collection,
        source: &dyn SourceConnector,
        updates: &[(&RemoteDocument, &Document)],
        stats: &mut SyncStats,
    ) {
        for (remote, existing) in updates {
            match self
                .replace_document(collection, source, remote, existing)
                .await
            {
                Ok(()) => stats.updated_documents += 1,
                Err(e) => stats.record_failure(remote.name.as_str(), e),
            }
        }
    }

    /// Delete-then-recreate. If creation fails after the deletion committed,
    /// the document is absent until the next pass re-creates it.
    async fn replace_document(
        &self,
        collection: &Collection,
        source: &dyn SourceConnector,
        remote: &RemoteDocument,
        existing: &Document,
    ) -> anyhow::Result<()> {
        self.documents
            .delete_documents(
                &collection.user,
                &collection.id,
                std::slice::from_ref(&existing.id),
            )
            .await?;

        let (prepared, upload) = prepare_upload(source, remote).await?;
        let created = self
            .documents
            .create_documents(&collection.user, &collection.id, vec![upload])
            .await;
        if let Err(e) = source.cleanup_document(&prepared.path).await {
            warn!(path = %prepared.path.display(), error = %e, "failed to clean up prepared file");
        }
        created?;
        Ok(())
    }
}

/// Update iff the remote object differs in size, or reports a modification
/// time strictly newer than the local row. Sources that report no
/// modification time only trigger updates on size changes.
fn should_update_document(existing: &Document, remote: &RemoteDocument) -> bool {
    if existing.size != remote.size {
        return true;
    }
    match remote.modified_time() {
        Some(modified) => modified > existing.gmt_updated.timestamp(),
        None => false,
    }
}

/// Materialize one remote document to a local file and read it into an
/// upload record. On a read failure the prepared file is cleaned up before
/// the error propagates.
async fn prepare_upload(
    source: &dyn SourceConnector,
    remote: &RemoteDocument,
) -> anyhow::Result<(PreparedDocument, UploadFile)> {
    let prepared = source.prepare_document(&remote.name, &remote.metadata).await?;
    let content = match tokio::fs::read(&prepared.path).await {
        Ok(content) => content,
        Err(e) => {
            if let Err(cleanup) = source.cleanup_document(&prepared.path).await {
                warn!(path = %prepared.path.display(), error = %cleanup, "failed to clean up prepared file");
            }
            return Err(anyhow::Error::from(e)
                .context(format!("failed to read prepared file for '{}'", remote.name)));
        }
    };
    let size = content.len() as i64;
    let upload = UploadFile {
        filename: remote.name.clone(),
        content,
        size,
    };
    Ok((prepared, upload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentStatus;
    use chrono::{TimeZone, Utc};

    fn doc(size: i64, updated_epoch: i64) -> Document {
        Document {
            id: "d1".into(),
            collection_id: "c1".into(),
            name: "a.md".into(),
            size,
            status: DocumentStatus::Active,
            gmt_created: Utc.timestamp_opt(updated_epoch, 0).single().unwrap(),
            gmt_updated: Utc.timestamp_opt(updated_epoch, 0).single().unwrap(),
        }
    }

    fn remote(size: i64, modified: Option<i64>) -> RemoteDocument {
        let mut metadata = serde_json::Map::new();
        if let Some(m) = modified {
            metadata.insert("modified_time".into(), json!(m));
        }
        RemoteDocument {
            name: "a.md".into(),
            size,
            metadata,
        }
    }

    #[test]
    fn size_change_forces_update() {
        assert!(should_update_document(&doc(10, 1_000), &remote(11, None)));
        assert!(!should_update_document(&doc(10, 1_000), &remote(10, None)));
    }

    #[test]
    fn newer_remote_timestamp_forces_update() {
        assert!(should_update_document(&doc(10, 1_000), &remote(10, Some(1_001))));
        assert!(!should_update_document(&doc(10, 1_000), &remote(10, Some(1_000))));
        assert!(!should_update_document(&doc(10, 1_000), &remote(10, Some(999))));
    }
}
