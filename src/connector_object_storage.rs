//! Object-storage source connector.
//!
//! The source-of-truth side of a reconciliation pass: lists objects in an
//! S3-compatible bucket, exposes them as [`RemoteDocument`]s, and stages
//! object payloads into local temp files for upload. Two configuration
//! shapes open this connector:
//!
//! - `object_storage` — endpoint and credentials inline in the collection
//!   config (credentials may fall back to `AWS_*` environment variables).
//! - `anybase` — only bucket/prefix/filters on the collection; endpoint and
//!   credentials come from `ANYBASE_ENDPOINT`, `ANYBASE_ACCESS_KEY`,
//!   `ANYBASE_SECRET_KEY` (optionally `ANYBASE_REGION`,
//!   `ANYBASE_USE_PATH_STYLE`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::aws_sign::AwsCredentials;
use crate::models::{CollectionConfig, RemoteDocument};
use crate::object_store::S3Bucket;
use crate::traits::{PreparedDocument, SourceConnector, SourceFactory};

pub struct ObjectStorageConnector {
    bucket: S3Bucket,
    prefix: String,
    include_set: GlobSet,
    exclude_set: GlobSet,
    staging_dir: PathBuf,
}

impl ObjectStorageConnector {
    pub fn new(
        bucket: S3Bucket,
        prefix: String,
        include_filters: &[String],
        exclude_filters: &[String],
    ) -> Result<Self> {
        // Empty include list means everything
        let include_set = if include_filters.is_empty() {
            build_globset(&["**".to_string()])?
        } else {
            build_globset(include_filters)?
        };

        let mut excludes = vec!["**/.git/**".to_string(), "**/node_modules/**".to_string()];
        excludes.extend(exclude_filters.iter().cloned());
        let exclude_set = build_globset(&excludes)?;

        Ok(Self {
            bucket,
            prefix,
            include_set,
            exclude_set,
            staging_dir: std::env::temp_dir(),
        })
    }

    /// Open a connector for whichever source shape the collection declares.
    pub fn from_config(config: &CollectionConfig) -> Result<Self> {
        if let Some(ref os) = config.object_storage {
            let credentials = match (&os.access_key, &os.secret_key) {
                (Some(ak), Some(sk)) => {
                    let mut creds = AwsCredentials::new(ak.clone(), sk.clone());
                    creds.session_token = std::env::var("AWS_SESSION_TOKEN").ok();
                    creds
                }
                _ => AwsCredentials::from_env()
                    .context("object_storage source has no inline credentials")?,
            };
            let bucket = S3Bucket::new(
                Some(&os.endpoint),
                &os.bucket,
                &os.region,
                credentials,
                os.enable_path_style,
            );
            return Self::new(
                bucket,
                os.object_prefix.clone(),
                &os.include_filters,
                &os.exclude_filters,
            );
        }

        if let Some(ref ab) = config.anybase {
            let endpoint = std::env::var("ANYBASE_ENDPOINT")
                .context("ANYBASE_ENDPOINT environment variable not set")?;
            let credentials = AwsCredentials::from_anybase_env()?;
            let region =
                std::env::var("ANYBASE_REGION").unwrap_or_else(|_| "us-east-1".to_string());
            let path_style = std::env::var("ANYBASE_USE_PATH_STYLE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true);
            let bucket = S3Bucket::new(Some(&endpoint), &ab.bucket, region, credentials, path_style);
            return Self::new(
                bucket,
                ab.object_prefix.clone(),
                &ab.include_filters,
                &ab.exclude_filters,
            );
        }

        anyhow::bail!("collection config declares no object storage or anybase source")
    }

    fn object_key(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix.trim_end_matches('/'), name)
        }
    }
}

#[async_trait]
impl SourceConnector for ObjectStorageConnector {
    async fn scan_documents(&self) -> Result<Vec<RemoteDocument>> {
        let objects = self.bucket.list_objects(&self.prefix).await?;
        let mut documents = Vec::new();

        for obj in objects {
            let name = relative_name(&self.prefix, &obj.key);
            if self.exclude_set.is_match(&name) || !self.include_set.is_match(&name) {
                continue;
            }

            let mut metadata = serde_json::Map::new();
            metadata.insert("modified_time".into(), serde_json::json!(obj.last_modified));
            metadata.insert("etag".into(), serde_json::json!(obj.etag));
            documents.push(RemoteDocument {
                name,
                size: obj.size,
                metadata,
            });
        }

        // Sort for deterministic ordering
        documents.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = documents.len(), "scanned remote documents");
        Ok(documents)
    }

    async fn prepare_document(
        &self,
        name: &str,
        _metadata: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<PreparedDocument> {
        let key = self.object_key(name);
        let content = self.bucket.get_object(&key).await?;

        let path = self.staging_dir.join(format!("colo-{}", Uuid::new_v4()));
        tokio::fs::write(&path, &content)
            .await
            .with_context(|| format!("failed to stage '{}' at {}", name, path.display()))?;
        Ok(PreparedDocument { path })
    }

    async fn cleanup_document(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("failed to remove staged file {}", path.display()))
    }

    async fn close(&self) -> Result<()> {
        // Stateless HTTP transport, nothing to release
        Ok(())
    }
}

/// Opens [`ObjectStorageConnector`]s; the production [`SourceFactory`].
pub struct ObjectStorageSourceFactory;

impl SourceFactory for ObjectStorageSourceFactory {
    fn open(&self, config: &CollectionConfig) -> Result<Box<dyn SourceConnector>> {
        Ok(Box::new(ObjectStorageConnector::from_config(config)?))
    }
}

/// Object key relative to the configured prefix; document names are always
/// prefix-relative.
fn relative_name(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        return key.to_string();
    }
    let prefix = prefix.trim_end_matches('/');
    key.strip_prefix(prefix)
        .map(|s| s.trim_start_matches('/').to_string())
        .unwrap_or_else(|| key.to_string())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
