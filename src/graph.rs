//! Knowledge-graph engine adapter.
//!
//! The graph engine exposes per-collection sessions: `create_instance`
//! acquires a handle scoped to one collection, documents are deleted through
//! it one at a time, and `finalize` releases engine-side storage for the
//! session. Finalize consumes the handle so it cannot run twice.

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::config::KnowledgeGraphConfig;
use crate::models::Collection;
use crate::traits::{KnowledgeGraph, KnowledgeGraphHandle};

pub struct HttpKnowledgeGraph {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpKnowledgeGraph {
    pub fn new(config: &KnowledgeGraphConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl KnowledgeGraph for HttpKnowledgeGraph {
    async fn create_instance(
        &self,
        collection: &Collection,
    ) -> Result<Box<dyn KnowledgeGraphHandle>> {
        Ok(Box::new(HttpGraphHandle {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            collection_id: collection.id.clone(),
        }))
    }
}

struct HttpGraphHandle {
    client: reqwest::Client,
    endpoint: String,
    collection_id: String,
}

#[async_trait]
impl KnowledgeGraphHandle for HttpGraphHandle {
    async fn delete_by_document_id(&self, document_id: &str) -> Result<()> {
        let url = format!(
            "{}/collections/{}/documents/{}",
            self.endpoint, self.collection_id, document_id
        );
        let resp = self.client.delete(&url).send().await?;
        // Absent graph entries are fine; the goal is convergence
        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
            bail!(
                "graph delete failed (HTTP {}) for document '{}'",
                resp.status(),
                document_id
            );
        }
        debug!(document = document_id, "deleted graph entries for document");
        Ok(())
    }

    async fn finalize(self: Box<Self>) -> Result<()> {
        let url = format!("{}/collections/{}/release", self.endpoint, self.collection_id);
        let resp = self.client.post(&url).send().await?;
        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
            bail!(
                "graph session release failed (HTTP {}) for collection '{}'",
                resp.status(),
                self.collection_id
            );
        }
        debug!(collection = %self.collection_id, "released graph session");
        Ok(())
    }
}

/// Stands in when no graph endpoint is configured. Collections that enable
/// the knowledge graph fail loudly instead of silently skipping cleanup.
pub struct DisabledKnowledgeGraph;

#[async_trait]
impl KnowledgeGraph for DisabledKnowledgeGraph {
    async fn create_instance(
        &self,
        collection: &Collection,
    ) -> Result<Box<dyn KnowledgeGraphHandle>> {
        bail!(
            "collection {} enables the knowledge graph but no knowledge_graph endpoint is configured",
            collection.id
        )
    }
}
