//! Core data models used throughout the orchestrator.
//!
//! These types represent the collections, documents, and operation results
//! that flow through the lifecycle and reconciliation paths.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CollectionStatus {
    Pending,
    Active,
    Deleted,
}

impl CollectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::Pending => "PENDING",
            CollectionStatus::Active => "ACTIVE",
            CollectionStatus::Deleted => "DELETED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(CollectionStatus::Pending),
            "ACTIVE" => Ok(CollectionStatus::Active),
            "DELETED" => Ok(CollectionStatus::Deleted),
            other => anyhow::bail!("unknown collection status: '{}'", other),
        }
    }
}

/// A logical collection unifying a vector index, a fulltext index, and a
/// document inventory for one knowledge base.
///
/// Status is mutated only by the lifecycle orchestrator; the reconciliation
/// engine treats collections as read-only.
#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    /// Owning principal. Document listings are scoped to this user.
    pub user: String,
    pub status: CollectionStatus,
    /// Raw JSON configuration as stored; parse with [`Collection::parsed_config`].
    pub config: String,
    pub gmt_created: DateTime<Utc>,
    pub gmt_updated: DateTime<Utc>,
}

impl Collection {
    /// Parse the stored JSON config into a structured [`CollectionConfig`].
    pub fn parsed_config(&self) -> Result<CollectionConfig> {
        serde_json::from_str(&self.config)
            .with_context(|| format!("invalid config for collection {}", self.id))
    }
}

/// Structured per-collection configuration, stored as JSON on the
/// collection row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Source kind declared by the collection (e.g. `"object_storage"`).
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub enable_knowledge_graph: bool,
    /// Object-storage source parameters, credentials inline.
    #[serde(default)]
    pub object_storage: Option<ObjectStorageSourceConfig>,
    /// Anybase source parameters. Endpoint and credentials come from the
    /// `ANYBASE_*` environment variables, not from the collection config.
    #[serde(default)]
    pub anybase: Option<AnybaseSourceConfig>,
    #[serde(default)]
    pub embedding: Option<EmbeddingSpec>,
}

impl CollectionConfig {
    /// Whether this collection declares an object-storage-backed or anybase
    /// source. Only such collections can be reconciled against a remote
    /// listing.
    pub fn has_syncable_source(&self) -> bool {
        self.object_storage.is_some() || self.anybase.is_some()
    }
}

/// Connection parameters for an object-storage source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageSourceConfig {
    pub endpoint: String,
    pub bucket: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub object_prefix: String,
    #[serde(default)]
    pub include_filters: Vec<String>,
    #[serde(default)]
    pub exclude_filters: Vec<String>,
    /// Use path-style addressing (`endpoint/bucket/key`) instead of
    /// virtual-hosted style. Required by MinIO and most S3 compatibles.
    #[serde(default)]
    pub enable_path_style: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Anybase source parameters carried on the collection config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnybaseSourceConfig {
    pub bucket: String,
    #[serde(default)]
    pub object_prefix: String,
    #[serde(default)]
    pub include_filters: Vec<String>,
    #[serde(default)]
    pub exclude_filters: Vec<String>,
}

/// Embedding service selection for a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSpec {
    #[serde(default)]
    pub model: Option<String>,
    /// Vector dimensionality produced by the model.
    #[serde(default)]
    pub dims: Option<u64>,
}

/// Lifecycle state of a document in a collection's inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentStatus {
    Uploaded,
    Active,
    Expired,
    Deleted,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "UPLOADED",
            DocumentStatus::Active => "ACTIVE",
            DocumentStatus::Expired => "EXPIRED",
            DocumentStatus::Deleted => "DELETED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "UPLOADED" => Ok(DocumentStatus::Uploaded),
            "ACTIVE" => Ok(DocumentStatus::Active),
            "EXPIRED" => Ok(DocumentStatus::Expired),
            "DELETED" => Ok(DocumentStatus::Deleted),
            other => anyhow::bail!("unknown document status: '{}'", other),
        }
    }
}

/// A document in a collection's inventory.
///
/// At most one non-DELETED document per `name` exists within a collection at
/// any time, enforced by the reconciliation diff rather than a database
/// constraint.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub collection_id: String,
    pub name: String,
    pub size: i64,
    pub status: DocumentStatus,
    pub gmt_created: DateTime<Utc>,
    pub gmt_updated: DateTime<Utc>,
}

impl Document {
    /// Prefix under which this document's backing objects live in the
    /// object store.
    pub fn object_store_base_path(&self) -> String {
        format!("{}/{}", self.collection_id, self.id)
    }
}

/// A transient descriptor of one object found during a source scan.
///
/// Exists only for the duration of one sync pass; never persisted.
#[derive(Debug, Clone)]
pub struct RemoteDocument {
    pub name: String,
    pub size: i64,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RemoteDocument {
    /// Remote modification time in epoch seconds, when the source reports one.
    pub fn modified_time(&self) -> Option<i64> {
        self.metadata.get("modified_time").and_then(|v| v.as_i64())
    }
}

/// Uniform outcome of one orchestration operation.
///
/// Produced fresh per call and never mutated after being returned. Public
/// operations always return a `TaskResult`, folding internal errors into
/// `success = false` rather than propagating them.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub success: bool,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl TaskResult {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn ok_with_metadata(data: serde_json::Value, metadata: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
            metadata,
        }
    }

    pub fn failure(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            data: serde_json::Value::Null,
            error: Some(error.to_string()),
            metadata: serde_json::Value::Null,
        }
    }
}

/// One failed item recorded during a partial-failure loop.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub object: String,
    pub error: String,
}

/// Accumulated statistics for one reconciliation pass.
///
/// Owned and mutated by exactly one sync call, then frozen into the
/// returned [`TaskResult`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    pub total_objects: u64,
    pub new_documents: u64,
    pub updated_documents: u64,
    pub deleted_documents: u64,
    pub failed_documents: u64,
    pub error_details: Vec<ErrorDetail>,
}

impl SyncStats {
    /// Record one failed item at the tightest possible scope.
    pub fn record_failure(&mut self, object: impl Into<String>, error: impl std::fmt::Display) {
        self.failed_documents += 1;
        self.error_details.push(ErrorDetail {
            object: object.into(),
            error: error.to_string(),
        });
    }
}

/// Knowledge-graph deletion statistics aggregated during collection delete.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeletionStats {
    pub knowledge_graph_enabled: bool,
    pub documents_deleted: u64,
    pub documents_failed: u64,
}

/// Outcome of one expired-document sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepStats {
    pub total_found: u64,
    pub expired_count: u64,
    pub failed_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in [
            CollectionStatus::Pending,
            CollectionStatus::Active,
            CollectionStatus::Deleted,
        ] {
            assert_eq!(CollectionStatus::parse(s.as_str()).unwrap(), s);
        }
        for s in [
            DocumentStatus::Uploaded,
            DocumentStatus::Active,
            DocumentStatus::Expired,
            DocumentStatus::Deleted,
        ] {
            assert_eq!(DocumentStatus::parse(s.as_str()).unwrap(), s);
        }
        assert!(CollectionStatus::parse("bogus").is_err());
    }

    #[test]
    fn object_store_base_path_is_collection_scoped() {
        let doc = Document {
            id: "doc1".into(),
            collection_id: "col1".into(),
            name: "a.md".into(),
            size: 12,
            status: DocumentStatus::Uploaded,
            gmt_created: Utc::now(),
            gmt_updated: Utc::now(),
        };
        assert_eq!(doc.object_store_base_path(), "col1/doc1");
    }

    #[test]
    fn collection_config_parses_flags_and_source() {
        let raw = r#"{
            "source": "object_storage",
            "enable_knowledge_graph": true,
            "object_storage": {
                "endpoint": "http://localhost:9000",
                "bucket": "docs",
                "object_prefix": "kb/",
                "enable_path_style": true
            },
            "embedding": {"model": "bge-m3", "dims": 1024}
        }"#;
        let cfg: CollectionConfig = serde_json::from_str(raw).unwrap();
        assert!(cfg.enable_knowledge_graph);
        assert!(cfg.has_syncable_source());
        let os = cfg.object_storage.unwrap();
        assert_eq!(os.region, "us-east-1");
        assert!(os.enable_path_style);
        assert_eq!(cfg.embedding.unwrap().dims, Some(1024));
    }

    #[test]
    fn empty_config_has_no_syncable_source() {
        let cfg: CollectionConfig = serde_json::from_str("{}").unwrap();
        assert!(!cfg.has_syncable_source());
        assert!(!cfg.enable_knowledge_graph);
    }

    #[test]
    fn remote_document_modified_time() {
        let mut metadata = serde_json::Map::new();
        metadata.insert("modified_time".into(), serde_json::json!(1_700_000_000));
        let doc = RemoteDocument {
            name: "a.md".into(),
            size: 10,
            metadata,
        };
        assert_eq!(doc.modified_time(), Some(1_700_000_000));

        let bare = RemoteDocument {
            name: "b.md".into(),
            size: 10,
            metadata: serde_json::Map::new(),
        };
        assert_eq!(bare.modified_time(), None);
    }

    #[test]
    fn sync_stats_records_failures_in_order() {
        let mut stats = SyncStats::default();
        stats.record_failure("a.md", "boom");
        stats.record_failure("b.md", "bang");
        assert_eq!(stats.failed_documents, 2);
        assert_eq!(stats.error_details[0].object, "a.md");
        assert_eq!(stats.error_details[1].error, "bang");
    }
}
