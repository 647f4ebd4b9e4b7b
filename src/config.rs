use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub vector_index: VectorIndexConfig,
    pub fulltext_index: FulltextIndexConfig,
    #[serde(default)]
    pub knowledge_graph: Option<KnowledgeGraphConfig>,
    pub object_store: ObjectStoreConfig,
    #[serde(default)]
    pub waiter: WaiterConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorIndexConfig {
    /// Base URL of the vector index HTTP API (e.g. `http://localhost:6333`).
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FulltextIndexConfig {
    /// Base URL of the fulltext index HTTP API (e.g. `http://localhost:9200`).
    pub endpoint: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeGraphConfig {
    /// Base URL of the knowledge-graph engine HTTP API.
    pub endpoint: String,
}

/// System object store holding uploaded document payloads.
///
/// Credentials are read from `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
/// (plus optional `AWS_SESSION_TOKEN`), never from this file.
#[derive(Debug, Deserialize, Clone)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub enable_path_style: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct WaiterConfig {
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            max_wait_secs: default_max_wait_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_max_wait_secs() -> u64 {
    300
}

fn default_poll_interval_secs() -> u64 {
    5
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.vector_index.endpoint.trim().is_empty() {
        anyhow::bail!("vector_index.endpoint must not be empty");
    }
    if config.fulltext_index.endpoint.trim().is_empty() {
        anyhow::bail!("fulltext_index.endpoint must not be empty");
    }
    if config.object_store.bucket.trim().is_empty() {
        anyhow::bail!("object_store.bucket must not be empty");
    }
    if config.waiter.max_wait_secs == 0 {
        anyhow::bail!("waiter.max_wait_secs must be > 0");
    }
    if config.waiter.poll_interval_secs == 0 {
        anyhow::bail!("waiter.poll_interval_secs must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("colo.toml");
        std::fs::write(&path, contents).unwrap();
        (tmp, path)
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let (_tmp, path) = write_config(
            r#"
            [db]
            path = "/tmp/colo.sqlite"

            [vector_index]
            endpoint = "http://localhost:6333"

            [fulltext_index]
            endpoint = "http://localhost:9200"

            [object_store]
            bucket = "colo-documents"
            "#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.waiter.max_wait_secs, 300);
        assert_eq!(cfg.waiter.poll_interval_secs, 5);
        assert_eq!(cfg.object_store.region, "us-east-1");
        assert!(cfg.knowledge_graph.is_none());
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let (_tmp, path) = write_config(
            r#"
            [db]
            path = "/tmp/colo.sqlite"

            [vector_index]
            endpoint = "http://localhost:6333"

            [fulltext_index]
            endpoint = "http://localhost:9200"

            [object_store]
            bucket = "colo-documents"

            [waiter]
            poll_interval_secs = 0
            "#,
        );
        assert!(load_config(&path).is_err());
    }
}
