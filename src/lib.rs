//! # citegraph
//!
//! Provisions a Solr collection for a scholarly citation graph and streams
//! JSON Lines citation records into it in fixed-size, committed batches.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐   ┌────────────┐
//! │ JSONL file  │──▶│  Transform  │──▶│  Batch   │──▶│ Solr       │
//! │ (one/line)  │   │  (record)   │   │ (ingest) │   │ /update    │
//! └─────────────┘   └─────────────┘   └──────────┘   └────────────┘
//!                                                          ▲
//!                         ┌─────────────┐                  │
//!                         │ Provisioner │──────────────────┘
//!                         │ collection  │  admin + schema API
//!                         │ + schema    │
//!                         └─────────────┘
//! ```
//!
//! The pure pieces (schema, record transform, batch buffer, cluster trait,
//! provisioner) live in `citegraph-core`. This crate adds the HTTP client,
//! configuration, logging, progress output and the CLI command handlers.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with env and CLI overrides |
//! | [`logging`] | `tracing` subscriber setup (stderr) |
//! | [`solr`] | Solr implementation of the cluster client |
//! | [`ingest`] | Streaming batch ingestor |
//! | [`progress`] | Progress reporters for ingestion |
//! | [`collection`] | check / create / delete / recreate commands |
//! | [`sample`] | Random-sample command |

pub mod collection;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod progress;
pub mod sample;
pub mod solr;

pub use citegraph_core::{batch, cluster, provision, record, schema};
