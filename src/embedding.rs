//! Vector-size resolution for new collections.

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::models::Collection;
use crate::traits::EmbeddingResolver;

/// Reads the vector size out of the collection's own embedding config.
/// Collections without an explicit dimension cannot be initialized.
pub struct ConfigEmbeddingResolver;

#[async_trait]
impl EmbeddingResolver for ConfigEmbeddingResolver {
    async fn resolve(&self, collection: &Collection) -> Result<u64> {
        let config = collection
            .parsed_config()
            .context("invalid collection config")?;
        let embedding = config
            .embedding
            .with_context(|| format!("collection {} has no embedding config", collection.id))?;
        embedding.dims.with_context(|| {
            format!(
                "embedding model '{}' does not declare a vector size",
                embedding.model.as_deref().unwrap_or("unknown")
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CollectionStatus;
    use chrono::Utc;

    fn collection_with(config: &str) -> Collection {
        Collection {
            id: "c1".into(),
            name: "kb".into(),
            user: "alice".into(),
            status: CollectionStatus::Pending,
            config: config.into(),
            gmt_created: Utc::now(),
            gmt_updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn resolves_declared_dims() {
        let collection =
            collection_with(r#"{"embedding": {"model": "bge-m3", "dims": 1024}}"#);
        assert_eq!(ConfigEmbeddingResolver.resolve(&collection).await.unwrap(), 1024);
    }

    #[tokio::test]
    async fn missing_dims_is_an_error() {
        let collection = collection_with(r#"{"embedding": {"model": "bge-m3"}}"#);
        let err = ConfigEmbeddingResolver
            .resolve(&collection)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bge-m3"));
        let collection = collection_with("{}");
        assert!(ConfigEmbeddingResolver.resolve(&collection).await.is_err());
    }
}
