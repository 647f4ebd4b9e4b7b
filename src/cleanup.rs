//! Sweep for documents stuck in UPLOADED status.
//!
//! Uploads that never progressed to indexing are reclaimed after a
//! retention window: their backing objects are deleted best-effort and the
//! rows flip to EXPIRED inside one transaction committed at the end.

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::models::SweepStats;
use crate::store::CollectionStore;
use crate::traits::ObjectStore;

/// Documents still UPLOADED after this many days are considered abandoned.
const UPLOAD_RETENTION_DAYS: i64 = 1;

pub async fn cleanup_expired(
    store: &CollectionStore,
    object_store: &dyn ObjectStore,
    collection_id: &str,
) -> Result<SweepStats> {
    let threshold = Utc::now() - Duration::days(UPLOAD_RETENTION_DAYS);
    let expired = store.list_expired_uploaded(collection_id, threshold).await?;

    let mut stats = SweepStats {
        total_found: expired.len() as u64,
        ..SweepStats::default()
    };

    let now = Utc::now().timestamp();
    let mut tx = store.pool().begin().await?;
    for document in &expired {
        // Payload cleanup is best-effort; the status flip is the record
        if let Err(e) = object_store
            .delete_objects_by_prefix(&document.object_store_base_path())
            .await
        {
            warn!(
                collection = collection_id,
                document = %document.id,
                error = %e,
                "failed to delete expired document objects"
            );
        }

        let result = sqlx::query(
            "UPDATE documents SET status = 'EXPIRED', gmt_updated = ? WHERE id = ?",
        )
        .bind(now)
        .bind(&document.id)
        .execute(&mut *tx)
        .await;
        match result {
            Ok(_) => stats.expired_count += 1,
            Err(e) => {
                warn!(
                    collection = collection_id,
                    document = %document.id,
                    error = %e,
                    "failed to expire document"
                );
                stats.failed_count += 1;
            }
        }
    }
    tx.commit().await?;

    info!(
        collection = collection_id,
        found = stats.total_found,
        expired = stats.expired_count,
        failed = stats.failed_count,
        "expired-document sweep finished"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use crate::models::{Collection, CollectionStatus};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingObjectStore {
        deleted_prefixes: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl ObjectStore for RecordingObjectStore {
        async fn put_object(&self, _key: &str, _content: &[u8]) -> Result<()> {
            Ok(())
        }

        async fn delete_objects_by_prefix(&self, prefix: &str) -> Result<()> {
            self.deleted_prefixes.lock().unwrap().push(prefix.to_string());
            if self.fail {
                anyhow::bail!("object store unavailable");
            }
            Ok(())
        }
    }

    async fn setup() -> (tempfile::TempDir, CollectionStore) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = crate::db::connect(&tmp.path().join("test.sqlite"))
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        let store = CollectionStore::new(pool);
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
        (tmp, store)
    }

    async fn insert_doc(store: &CollectionStore, id: &str, status: &str, created: i64) {
        sqlx::query(
            "INSERT INTO documents (id, collection_id, name, size, status, gmt_created, gmt_updated)
             VALUES (?, 'c1', ?, 10, ?, ?, ?)",
        )
        .bind(id)
        .bind(format!("{}.md", id))
        .bind(status)
        .bind(created)
        .bind(created)
        .execute(store.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn expires_only_stale_uploads() {
        let (_tmp, store) = setup().await;
        let two_days_ago = (Utc::now() - Duration::days(2)).timestamp();
        let now = Utc::now().timestamp();
        insert_doc(&store, "stale", "UPLOADED", two_days_ago).await;
        insert_doc(&store, "fresh", "UPLOADED", now).await;
        insert_doc(&store, "active", "ACTIVE", two_days_ago).await;

        let objects = RecordingObjectStore {
            deleted_prefixes: Mutex::new(Vec::new()),
            fail: false,
        };
        let stats = cleanup_expired(&store, &objects, "c1").await.unwrap();
        assert_eq!(stats.total_found, 1);
        assert_eq!(stats.expired_count, 1);
        assert_eq!(stats.failed_count, 0);
        assert_eq!(*objects.deleted_prefixes.lock().unwrap(), vec!["c1/stale"]);

        let status: String = sqlx::query_scalar("SELECT status FROM documents WHERE id = 'stale'")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(status, "EXPIRED");
        let status: String = sqlx::query_scalar("SELECT status FROM documents WHERE id = 'fresh'")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(status, "UPLOADED");
    }

    #[tokio::test]
    async fn object_store_failure_does_not_block_expiry() {
        let (_tmp, store) = setup().await;
        let two_days_ago = (Utc::now() - Duration::days(2)).timestamp();
        insert_doc(&store, "stale", "UPLOADED", two_days_ago).await;

        let objects = RecordingObjectStore {
            deleted_prefixes: Mutex::new(Vec::new()),
            fail: true,
        };
        let stats = cleanup_expired(&store, &objects, "c1").await.unwrap();
        assert_eq!(stats.expired_count, 1);
        assert_eq!(stats.failed_count, 0);

        let status: String = sqlx::query_scalar("SELECT status FROM documents WHERE id = 'stale'")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(status, "EXPIRED");
    }
}
