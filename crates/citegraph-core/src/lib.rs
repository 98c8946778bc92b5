//! # citegraph core
//!
//! Cluster-agnostic logic for loading a citation graph into a search
//! collection: the schema the collection must carry, the reshaping of raw
//! bibliographic records into collection documents, the bounded batch
//! buffer, the [`cluster::ClusterClient`] trait, and idempotent collection
//! provisioning on top of it.
//!
//! This crate performs no HTTP or filesystem I/O. The Solr client and the
//! file-driven ingestor live in the `citegraph` crate.

pub mod batch;
pub mod cluster;
pub mod provision;
pub mod record;
pub mod schema;
