//! Document-management service backed by the local inventory and the
//! system object store.
//!
//! Owns document creation and deletion on behalf of the reconciliation
//! engine: payload bytes go to the object store, inventory rows to SQLite.
//! Creation is all-or-nothing per batch — the caller treats one failed
//! submission as one failed batch.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::DocumentStatus;
use crate::traits::{
    CreateDocumentsResult, CreatedDocument, DeleteDocumentsResult, DocumentManager, ObjectStore,
    UploadFile,
};

pub struct SqlDocumentManager {
    pool: SqlitePool,
    object_store: Arc<dyn ObjectStore>,
}

impl SqlDocumentManager {
    pub fn new(pool: SqlitePool, object_store: Arc<dyn ObjectStore>) -> Self {
        Self { pool, object_store }
    }

    async fn verify_ownership(&self, user: &str, collection_id: &str) -> Result<()> {
        let owner: Option<String> =
            sqlx::query_scalar("SELECT user FROM collections WHERE id = ?")
                .bind(collection_id)
                .fetch_optional(&self.pool)
                .await?;
        match owner {
            Some(owner) if owner == user => Ok(()),
            Some(_) => anyhow::bail!("collection {} is not owned by {}", collection_id, user),
            None => anyhow::bail!("collection {} not found", collection_id),
        }
    }
}

#[async_trait]
impl DocumentManager for SqlDocumentManager {
    async fn create_documents(
        &self,
        user: &str,
        collection_id: &str,
        files: Vec<UploadFile>,
    ) -> Result<CreateDocumentsResult> {
        self.verify_ownership(user, collection_id).await?;

        // Upload payloads first: an orphaned object is reclaimed by the
        // prefix delete on the next deletion, a row without a payload is not.
        let mut staged: Vec<(String, &UploadFile)> = Vec::with_capacity(files.len());
        for file in &files {
            let id = Uuid::new_v4().to_string();
            let key = format!("{}/{}/{}", collection_id, id, file.filename);
            self.object_store
                .put_object(&key, &file.content)
                .await
                .with_context(|| format!("failed to upload '{}'", file.filename))?;
            staged.push((id, file));
        }

        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let mut items = Vec::with_capacity(staged.len());
        for (id, file) in staged {
            sqlx::query(
                "INSERT INTO documents (id, collection_id, name, size, status, gmt_created, gmt_updated)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(collection_id)
            .bind(&file.filename)
            .bind(file.size)
            .bind(DocumentStatus::Uploaded.as_str())
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            items.push(CreatedDocument {
                id,
                name: file.filename.clone(),
            });
        }
        tx.commit().await?;

        debug!(collection = collection_id, count = items.len(), "created documents");
        Ok(CreateDocumentsResult { items })
    }

    async fn delete_documents(
        &self,
        user: &str,
        collection_id: &str,
        document_ids: &[String],
    ) -> Result<DeleteDocumentsResult> {
        self.verify_ownership(user, collection_id).await?;

        let now = Utc::now().timestamp();
        let mut deleted_ids = Vec::new();
        let mut tx = self.pool.begin().await?;
        for id in document_ids {
            let result = sqlx::query(
                "UPDATE documents SET status = 'DELETED', gmt_updated = ?
                 WHERE id = ? AND collection_id = ? AND status != 'DELETED'",
            )
            .bind(now)
            .bind(id)
            .bind(collection_id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() > 0 {
                deleted_ids.push(id.clone());
            }
        }
        tx.commit().await?;

        // Best-effort payload cleanup; the soft delete above is the record
        for id in &deleted_ids {
            let prefix = format!("{}/{}", collection_id, id);
            if let Err(e) = self.object_store.delete_objects_by_prefix(&prefix).await {
                warn!(document = %id, error = %e, "failed to delete backing objects");
            }
        }

        debug!(collection = collection_id, count = deleted_ids.len(), "deleted documents");
        Ok(DeleteDocumentsResult {
            status: "success".to_string(),
            deleted_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use crate::models::{Collection, CollectionStatus};
    use crate::store::CollectionStore;
    use std::sync::Mutex;

    struct MemoryObjectStore {
        keys: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for MemoryObjectStore {
        async fn put_object(&self, key: &str, _content: &[u8]) -> Result<()> {
            self.keys.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn delete_objects_by_prefix(&self, prefix: &str) -> Result<()> {
            self.keys
                .lock()
                .unwrap()
                .retain(|k| !k.starts_with(prefix));
            Ok(())
        }
    }

    async fn setup() -> (tempfile::TempDir, SqlitePool, Arc<MemoryObjectStore>) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = crate::db::connect(&tmp.path().join("test.sqlite"))
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();

        let store = CollectionStore::new(pool.clone());
        store
            .insert_collection(&Collection {
                id: "c1".into(),
                name: "kb".into(),
                user: "alice".into(),
                status: CollectionStatus::Active,
                config: "{}".into(),
                gmt_created: Utc::now(),
                gmt_updated: Utc::now(),
            })
            .await
            .unwrap();

        let objects = Arc::new(MemoryObjectStore {
            keys: Mutex::new(Vec::new()),
        });
        (tmp, pool, objects)
    }

    #[tokio::test]
    async fn create_then_delete_round_trip() {
        let (_tmp, pool, objects) = setup().await;
        let manager = SqlDocumentManager::new(pool.clone(), objects.clone());

        let result = manager
            .create_documents(
                "alice",
                "c1",
                vec![UploadFile {
                    filename: "a.md".into(),
                    content: b"hello".to_vec(),
                    size: 5,
                }],
            )
            .await
            .unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(objects.keys.lock().unwrap().len(), 1);

        let ids: Vec<String> = result.items.iter().map(|item| item.id.clone()).collect();
        let deleted = manager.delete_documents("alice", "c1", &ids).await.unwrap();
        assert_eq!(deleted.status, "success");
        assert_eq!(deleted.deleted_ids, ids);
        assert!(objects.keys.lock().unwrap().is_empty());

        // Deleting again affects nothing
        let again = manager.delete_documents("alice", "c1", &ids).await.unwrap();
        assert!(again.deleted_ids.is_empty());
    }

    #[tokio::test]
    async fn rejects_foreign_collections() {
        let (_tmp, pool, objects) = setup().await;
        let manager = SqlDocumentManager::new(pool, objects);
        assert!(manager
            .create_documents("mallory", "c1", Vec::new())
            .await
            .is_err());
        assert!(manager.delete_documents("mallory", "c1", &[]).await.is_err());
    }
}
