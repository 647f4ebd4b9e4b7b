//! # Collection Orchestrator
//!
//! Lifecycle orchestration for logical document collections that are
//! materialized across several subsystems at once: a vector index, a
//! fulltext index, an optional knowledge-graph store, and an object-storage
//! document inventory.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌───────────────┐   ┌───────────────┐
//! │   Source    │──▶│ Reconciliation │──▶│   Documents   │
//! │  S3/anybase │   │    engine      │   │ SQLite + S3   │
//! └─────────────┘   └───────┬───────┘   └───────┬───────┘
//!                           │                   │
//!                    ┌──────┴──────┐     ┌──────┴──────┐
//!                    ▼             ▼     ▼             ▼
//!              ┌──────────┐ ┌──────────┐ ┌──────────────┐
//!              │  Vector  │ │ Fulltext │ │  Knowledge   │
//!              │  index   │ │  index   │ │    graph     │
//!              └──────────┘ └──────────┘ └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! colo init                          # create database
//! colo create my-kb --user alice     # register a collection
//! colo initialize <id>               # provision indexes, flip ACTIVE
//! colo sync <id>                     # reconcile against the source
//! colo cleanup <id>                  # expire abandoned uploads
//! colo delete <id>                   # tear everything down
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Operation error taxonomy |
//! | [`traits`] | Subsystem collaborator contracts |
//! | [`lifecycle`] | Initialize and delete collections |
//! | [`waiter`] | Poll a collection until it is ACTIVE |
//! | [`reconcile`] | Diff-and-apply sync against a remote source |
//! | [`cleanup`] | Expired-upload sweep |
//! | [`connector_object_storage`] | S3/anybase source connector |
//! | [`object_store`] | S3 object store adapter |
//! | [`aws_sign`] | AWS SigV4 request signing |
//! | [`vector`] | Qdrant-compatible vector index adapter |
//! | [`fulltext`] | Elasticsearch-compatible fulltext index adapter |
//! | [`graph`] | Knowledge-graph engine adapter |
//! | [`documents`] | SQLite-backed document manager |
//! | [`embedding`] | Embedding dimensionality resolution |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`store`] | Collection and document repository |

pub mod aws_sign;
pub mod cleanup;
pub mod config;
pub mod connector_object_storage;
pub mod db;
pub mod documents;
pub mod embedding;
pub mod error;
pub mod fulltext;
pub mod graph;
pub mod lifecycle;
pub mod migrate;
pub mod models;
pub mod object_store;
pub mod reconcile;
pub mod store;
pub mod traits;
pub mod vector;
pub mod waiter;
