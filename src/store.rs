//! Collection and document repository.
//!
//! The persistence collaborator behind the orchestrator: point reads and
//! atomic single-row writes over SQLite. The store never holds a lock across
//! a whole orchestration pass; each mutation is its own atomic unit.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{Collection, CollectionStatus, Document, DocumentStatus};

#[derive(Clone)]
pub struct CollectionStore {
    pool: SqlitePool,
}

impl CollectionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Direct pool access for callers that manage their own transactions
    /// (the expired-document sweep).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Fetch a collection by id. Logically deleted collections are hidden
    /// unless `include_deleted` is set.
    pub async fn get_collection_by_id(
        &self,
        id: &str,
        include_deleted: bool,
    ) -> Result<Option<Collection>> {
        let row = sqlx::query(
            "SELECT id, name, user, status, config, gmt_created, gmt_updated
             FROM collections WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let collection = match row {
            Some(row) => collection_from_row(&row)?,
            None => return Ok(None),
        };

        if !include_deleted && collection.status == CollectionStatus::Deleted {
            return Ok(None);
        }
        Ok(Some(collection))
    }

    /// Persist status and config changes for an existing collection,
    /// refreshing `gmt_updated`.
    pub async fn update_collection(&self, collection: &Collection) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE collections SET name = ?, status = ?, config = ?, gmt_updated = ? WHERE id = ?",
        )
        .bind(&collection.name)
        .bind(collection.status.as_str())
        .bind(&collection.config)
        .bind(now.timestamp())
        .bind(&collection.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("collection {} does not exist", collection.id);
        }
        Ok(())
    }

    pub async fn insert_collection(&self, collection: &Collection) -> Result<()> {
        sqlx::query(
            "INSERT INTO collections (id, name, user, status, config, gmt_created, gmt_updated)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&collection.id)
        .bind(&collection.name)
        .bind(&collection.user)
        .bind(collection.status.as_str())
        .bind(&collection.config)
        .bind(collection.gmt_created.timestamp())
        .bind(collection.gmt_updated.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All non-DELETED documents owned by `user` in a collection, ordered by
    /// name for deterministic reconciliation.
    pub async fn list_documents(&self, user: &str, collection_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT d.id, d.collection_id, d.name, d.size, d.status, d.gmt_created, d.gmt_updated
             FROM documents d
             JOIN collections c ON c.id = d.collection_id
             WHERE d.collection_id = ? AND c.user = ? AND d.status != 'DELETED'
             ORDER BY d.name",
        )
        .bind(collection_id)
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }

    /// Documents stuck in UPLOADED status created before `threshold`.
    pub async fn list_expired_uploaded(
        &self,
        collection_id: &str,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, collection_id, name, size, status, gmt_created, gmt_updated
             FROM documents
             WHERE collection_id = ? AND status = 'UPLOADED' AND gmt_created < ?
             ORDER BY gmt_created",
        )
        .bind(collection_id)
        .bind(threshold.timestamp())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }
}

fn collection_from_row(row: &SqliteRow) -> Result<Collection> {
    Ok(Collection {
        id: row.get("id"),
        name: row.get("name"),
        user: row.get("user"),
        status: CollectionStatus::parse(row.get("status"))?,
        config: row.get("config"),
        gmt_created: epoch_to_datetime(row.get("gmt_created"))?,
        gmt_updated: epoch_to_datetime(row.get("gmt_updated"))?,
    })
}

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    Ok(Document {
        id: row.get("id"),
        collection_id: row.get("collection_id"),
        name: row.get("name"),
        size: row.get("size"),
        status: DocumentStatus::parse(row.get("status"))?,
        gmt_created: epoch_to_datetime(row.get("gmt_created"))?,
        gmt_updated: epoch_to_datetime(row.get("gmt_updated"))?,
    })
}

fn epoch_to_datetime(ts: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .with_context(|| format!("timestamp {} out of range", ts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;

    async fn test_store() -> (tempfile::TempDir, CollectionStore) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = crate::db::connect(&tmp.path().join("test.sqlite"))
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        (tmp, CollectionStore::new(pool))
    }

    fn sample_collection(id: &str, status: CollectionStatus) -> Collection {
        Collection {
            id: id.to_string(),
            name: format!("col-{}", id),
            user: "alice".to_string(),
            status,
            config: "{}".to_string(),
            gmt_created: Utc::now(),
            gmt_updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn get_collection_hides_deleted_unless_asked() {
        let (_tmp, store) = test_store().await;
        let col = sample_collection("c1", CollectionStatus::Deleted);
        store.insert_collection(&col).await.unwrap();

        assert!(store
            .get_collection_by_id("c1", false)
            .await
            .unwrap()
            .is_none());
        let found = store.get_collection_by_id("c1", true).await.unwrap();
        assert_eq!(found.unwrap().status, CollectionStatus::Deleted);
    }

    #[tokio::test]
    async fn update_missing_collection_fails() {
        let (_tmp, store) = test_store().await;
        let col = sample_collection("ghost", CollectionStatus::Active);
        assert!(store.update_collection(&col).await.is_err());
    }

    #[tokio::test]
    async fn list_documents_skips_deleted_rows() {
        let (_tmp, store) = test_store().await;
        let col = sample_collection("c1", CollectionStatus::Active);
        store.insert_collection(&col).await.unwrap();

        let now = Utc::now().timestamp();
        for (id, name, status) in [
            ("d1", "a.md", "ACTIVE"),
            ("d2", "b.md", "DELETED"),
            ("d3", "c.md", "UPLOADED"),
        ] {
            sqlx::query(
                "INSERT INTO documents (id, collection_id, name, size, status, gmt_created, gmt_updated)
                 VALUES (?, 'c1', ?, 10, ?, ?, ?)",
            )
            .bind(id)
            .bind(name)
            .bind(status)
            .bind(now)
            .bind(now)
            .execute(store.pool())
            .await
            .unwrap();
        }

        let docs = store.list_documents("alice", "c1").await.unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a.md", "c.md"]);

        // Wrong owner sees nothing
        assert!(store.list_documents("bob", "c1").await.unwrap().is_empty());
    }
}
