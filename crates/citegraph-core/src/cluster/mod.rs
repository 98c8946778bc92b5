//! Search cluster abstraction.
//!
//! The [`ClusterClient`] trait is the request/response boundary to the
//! cluster's collection admin, schema, update and select endpoints. The
//! provisioner and the ingestor only ever talk to a cluster through it,
//! which lets tests swap in [`memory::InMemoryCluster`].
//!
//! Clients perform no retries. A failed call comes back as a
//! [`ClusterError`] and the caller decides whether to skip or abort.

pub mod memory;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::record::TargetDocument;
use crate::schema::FieldDefinition;

/// Errors returned by a [`ClusterClient`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// The request never produced a response (connection refused, DNS, timeout).
    #[error("cluster unreachable: {0}")]
    Unreachable(String),

    /// The cluster answered with a non-success status.
    #[error("cluster rejected request (HTTP {status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// The cluster answered with a success status but an unreadable body.
    #[error("unexpected cluster response: {0}")]
    InvalidResponse(String),
}

impl ClusterError {
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::Unreachable(msg.into())
    }

    pub fn rejected(status: u16, detail: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            detail: detail.into(),
        }
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}

/// Parameters of a collection-create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub num_shards: u32,
    pub replication_factor: u32,
    pub max_shards_per_node: u32,
    pub config_set: String,
}

impl CollectionSpec {
    /// The citation collection layout: two shards, one replica each, at most
    /// two shards per node, on the `_default` config set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            num_shards: 2,
            replication_factor: 1,
            max_shards_per_node: 2,
            config_set: "_default".to_string(),
        }
    }
}

/// A select request against one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub q: String,
    pub rows: usize,
    pub sort: Option<String>,
}

impl SelectQuery {
    pub fn all(rows: usize) -> Self {
        Self {
            q: "*:*".to_string(),
            rows,
            sort: None,
        }
    }

    pub fn sorted_by(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }
}

/// Request/response boundary to a search cluster.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_collections`](ClusterClient::list_collections) | Names of all collections |
/// | [`create_collection`](ClusterClient::create_collection) | Create a collection |
/// | [`delete_collection`](ClusterClient::delete_collection) | Delete a collection |
/// | [`list_fields`](ClusterClient::list_fields) | Current schema fields of a collection |
/// | [`add_field`](ClusterClient::add_field) | Add one schema field |
/// | [`submit_documents`](ClusterClient::submit_documents) | Write a batch of documents |
/// | [`query`](ClusterClient::query) | Run a select query |
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn list_collections(&self) -> Result<BTreeSet<String>, ClusterError>;

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), ClusterError>;

    async fn delete_collection(&self, name: &str) -> Result<(), ClusterError>;

    async fn list_fields(&self, collection: &str) -> Result<Vec<FieldDefinition>, ClusterError>;

    /// Add a field. Clusters reject fields that already exist; callers that
    /// need idempotence check [`list_fields`](ClusterClient::list_fields) first.
    async fn add_field(&self, collection: &str, field: &FieldDefinition)
        -> Result<(), ClusterError>;

    /// Write documents in one request. With `commit` set they are visible to
    /// queries as soon as the call returns.
    async fn submit_documents(
        &self,
        collection: &str,
        documents: &[TargetDocument],
        commit: bool,
    ) -> Result<(), ClusterError>;

    async fn query(&self, collection: &str, query: &SelectQuery)
        -> Result<Vec<Value>, ClusterError>;
}
