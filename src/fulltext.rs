//! Elasticsearch-compatible fulltext index adapter.
//!
//! Index create/delete over the REST API. Creation treats an
//! already-existing index as success so initialize retries converge.

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::config::FulltextIndexConfig;
use crate::traits::FulltextIndex;

pub struct ElasticFulltextIndex {
    client: reqwest::Client,
    endpoint: String,
}

impl ElasticFulltextIndex {
    pub fn new(config: &FulltextIndexConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn index_url(&self, name: &str) -> String {
        format!("{}/{}", self.endpoint, name)
    }
}

#[async_trait]
impl FulltextIndex for ElasticFulltextIndex {
    async fn create_index(&self, name: &str) -> Result<()> {
        let resp = self.client.put(self.index_url(name)).send().await?;
        if resp.status().is_success() {
            debug!(index = name, "created fulltext index");
            return Ok(());
        }

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if body.contains("resource_already_exists_exception") {
            debug!(index = name, "fulltext index already exists");
            return Ok(());
        }
        bail!(
            "fulltext index create failed (HTTP {}) for '{}': {}",
            status,
            name,
            body.chars().take(500).collect::<String>()
        );
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        let resp = self.client.delete(self.index_url(name)).send().await?;
        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
            bail!(
                "fulltext index delete failed (HTTP {}) for '{}'",
                resp.status(),
                name
            );
        }
        debug!(index = name, "deleted fulltext index");
        Ok(())
    }
}
