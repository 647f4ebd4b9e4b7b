//! Qdrant-compatible vector index adapter.
//!
//! Uses the plain HTTP API so any Qdrant-compatible endpoint works. Creation
//! is idempotent by name: initialize has no rollback path, so a retry after
//! a partial failure must converge instead of erroring on the survivor.

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::config::VectorIndexConfig;
use crate::traits::VectorIndex;

pub struct QdrantVectorIndex {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl QdrantVectorIndex {
    pub fn new(config: &VectorIndexConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.endpoint, path));
        if let Some(ref key) = self.api_key {
            req = req.header("api-key", key);
        }
        req
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn create_collection(&self, name: &str, vector_size: u64) -> Result<()> {
        let path = format!("/collections/{}", name);

        // Idempotent by name: an existing collection is a success
        let existing = self.request(reqwest::Method::GET, &path).send().await?;
        if existing.status().is_success() {
            debug!(collection = name, "vector collection already exists");
            return Ok(());
        }

        let resp = self
            .request(reqwest::Method::PUT, &path)
            .json(&serde_json::json!({
                "vectors": { "size": vector_size, "distance": "Cosine" }
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "vector collection create failed (HTTP {}) for '{}': {}",
                status,
                name,
                body.chars().take(500).collect::<String>()
            );
        }
        debug!(collection = name, vector_size, "created vector collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let resp = self
            .request(reqwest::Method::DELETE, &format!("/collections/{}", name))
            .send()
            .await?;

        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
            bail!(
                "vector collection delete failed (HTTP {}) for '{}'",
                resp.status(),
                name
            );
        }
        debug!(collection = name, "deleted vector collection");
        Ok(())
    }
}
