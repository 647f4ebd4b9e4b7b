//! # Collection Orchestrator CLI (`colo`)
//!
//! The `colo` binary drives collection lifecycle operations from the command
//! line or a job runner. Each operation prints a JSON task result to stdout
//! and exits non-zero when the operation failed.
//!
//! ## Usage
//!
//! ```bash
//! colo --config ./config/colo.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `colo init` | Create the SQLite database and run schema migrations |
//! | `colo create <name>` | Register a new collection in PENDING status |
//! | `colo initialize <id>` | Provision the vector and fulltext indexes, flip ACTIVE |
//! | `colo delete <id>` | Tear down indexes and knowledge-graph data |
//! | `colo sync <id>` | Reconcile the inventory against the collection's source |
//! | `colo cleanup <id>` | Expire documents stuck in UPLOADED status |
//! | `colo status <id>` | Print the collection row |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! colo init --config ./config/colo.toml
//!
//! # Register and bring up a collection
//! colo create my-kb --user alice \
//!   --collection-config '{"embedding": {"model": "bge-m3", "dims": 1024}}'
//! colo initialize 6e0f... --document-user-quota 1000
//!
//! # Reconcile against the declared source
//! colo sync 6e0f... --trigger scheduled
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use collection_orchestrator::cleanup;
use collection_orchestrator::config::{self, Config};
use collection_orchestrator::connector_object_storage::ObjectStorageSourceFactory;
use collection_orchestrator::db;
use collection_orchestrator::documents::SqlDocumentManager;
use collection_orchestrator::embedding::ConfigEmbeddingResolver;
use collection_orchestrator::fulltext::ElasticFulltextIndex;
use collection_orchestrator::graph::{DisabledKnowledgeGraph, HttpKnowledgeGraph};
use collection_orchestrator::lifecycle::LifecycleOrchestrator;
use collection_orchestrator::migrate;
use collection_orchestrator::models::{Collection, CollectionStatus, TaskResult};
use collection_orchestrator::object_store::LazyS3Bucket;
use collection_orchestrator::reconcile::ReconciliationEngine;
use collection_orchestrator::store::CollectionStore;
use collection_orchestrator::traits::{KnowledgeGraph, Subsystems};
use collection_orchestrator::vector::QdrantVectorIndex;
use collection_orchestrator::waiter::{StateWaiter, SystemClock};

/// Collection Orchestrator CLI — lifecycle operations for collections
/// materialized across a vector index, a fulltext index, an optional
/// knowledge graph, and an object-storage document inventory.
#[derive(Parser)]
#[command(
    name = "colo",
    about = "Collection Orchestrator — initialize, sync, and tear down document collections",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/colo.toml`. Database, index endpoints, object
    /// store, and waiter settings are read from this file.
    #[arg(long, global = true, default_value = "./config/colo.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the collections and documents
    /// tables. Idempotent — running it multiple times is safe.
    Init,

    /// Register a new collection in PENDING status.
    Create {
        /// Human-readable collection name.
        name: String,

        /// Owning user. Document listings are scoped to this user.
        #[arg(long)]
        user: String,

        /// Collection configuration as a JSON object (source, embedding,
        /// knowledge-graph flag).
        #[arg(long, default_value = "{}")]
        collection_config: String,
    },

    /// Provision a collection's backing indexes and flip it ACTIVE.
    Initialize {
        /// Collection id.
        collection_id: String,

        /// Per-user document quota to report back to the caller.
        #[arg(long, default_value_t = 1000)]
        document_user_quota: u64,
    },

    /// Tear down a collection's indexes and knowledge-graph data.
    Delete {
        /// Collection id.
        collection_id: String,
    },

    /// Reconcile the document inventory against the collection's source.
    ///
    /// Waits for the collection to turn ACTIVE, scans the declared
    /// object-storage or anybase source, creates documents for new objects
    /// and recreates documents whose remote object changed.
    Sync {
        /// Collection id.
        collection_id: String,

        /// Trigger label echoed into the result (e.g. `manual`, `scheduled`).
        #[arg(long, default_value = "manual")]
        trigger: String,
    },

    /// Expire documents stuck in UPLOADED status past the retention window.
    Cleanup {
        /// Collection id.
        collection_id: String,
    },

    /// Print a collection row, including logically deleted ones.
    Status {
        /// Collection id.
        collection_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    let pool = db::connect(&cfg.db.path).await?;
    let store = CollectionStore::new(pool.clone());

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Create {
            name,
            user,
            collection_config,
        } => {
            // Validate before storing; the row carries the raw JSON
            let _: collection_orchestrator::models::CollectionConfig =
                serde_json::from_str(&collection_config)?;
            let now = chrono::Utc::now();
            let collection = Collection {
                id: uuid::Uuid::new_v4().to_string(),
                name,
                user,
                status: CollectionStatus::Pending,
                config: collection_config,
                gmt_created: now,
                gmt_updated: now,
            };
            store.insert_collection(&collection).await?;
            print_result(&TaskResult::ok(serde_json::json!({
                "collection_id": collection.id,
                "status": collection.status,
            })));
        }
        Commands::Initialize {
            collection_id,
            document_user_quota,
        } => {
            let subsystems = build_subsystems(&cfg, &pool);
            let orchestrator = LifecycleOrchestrator::new(store, subsystems);
            let result = orchestrator
                .initialize(&collection_id, document_user_quota)
                .await;
            print_result(&result);
        }
        Commands::Delete { collection_id } => {
            let subsystems = build_subsystems(&cfg, &pool);
            let orchestrator = LifecycleOrchestrator::new(store, subsystems);
            let result = orchestrator.delete(&collection_id).await;
            print_result(&result);
        }
        Commands::Sync {
            collection_id,
            trigger,
        } => {
            let subsystems = build_subsystems(&cfg, &pool);
            let waiter = StateWaiter::new(
                store.clone(),
                Arc::new(SystemClock),
                Duration::from_secs(cfg.waiter.max_wait_secs),
                Duration::from_secs(cfg.waiter.poll_interval_secs),
            );
            let engine = ReconciliationEngine::new(
                store,
                subsystems.documents.clone(),
                waiter,
                Arc::new(ObjectStorageSourceFactory),
            );
            let result = engine.sync(&collection_id, &trigger).await;
            print_result(&result);
        }
        Commands::Cleanup { collection_id } => {
            let subsystems = build_subsystems(&cfg, &pool);
            let stats =
                cleanup::cleanup_expired(&store, subsystems.object_store.as_ref(), &collection_id)
                    .await?;
            print_result(&TaskResult::ok(serde_json::json!({
                "collection_id": collection_id,
                "stats": stats,
            })));
        }
        Commands::Status { collection_id } => {
            match store.get_collection_by_id(&collection_id, true).await? {
                Some(collection) => {
                    print_result(&TaskResult::ok(serde_json::to_value(&collection)?))
                }
                None => print_result(&TaskResult::failure(format!(
                    "collection {} not found",
                    collection_id
                ))),
            }
        }
    }

    Ok(())
}

/// Wire the concrete subsystem adapters from configuration. Object-store
/// credentials come from the standard `AWS_*` environment variables,
/// resolved on first object-store use so commands that never touch it run
/// without credentials.
fn build_subsystems(cfg: &Config, pool: &sqlx::SqlitePool) -> Subsystems {
    let object_store = Arc::new(LazyS3Bucket::new(cfg.object_store.clone()));

    let graph: Arc<dyn KnowledgeGraph> = match &cfg.knowledge_graph {
        Some(graph_cfg) => Arc::new(HttpKnowledgeGraph::new(graph_cfg)),
        None => Arc::new(DisabledKnowledgeGraph),
    };

    Subsystems {
        vector: Arc::new(QdrantVectorIndex::new(&cfg.vector_index)),
        fulltext: Arc::new(ElasticFulltextIndex::new(&cfg.fulltext_index)),
        graph,
        object_store: object_store.clone(),
        documents: Arc::new(SqlDocumentManager::new(pool.clone(), object_store)),
        embeddings: Arc::new(ConfigEmbeddingResolver),
    }
}

/// Print a task result as pretty JSON and exit non-zero on failure.
fn print_result(result: &TaskResult) {
    match serde_json::to_string_pretty(result) {
        Ok(rendered) => println!("{}", rendered),
        Err(e) => eprintln!("failed to render result: {}", e),
    }
    if !result.success {
        std::process::exit(1);
    }
}
