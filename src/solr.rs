//! Solr implementation of [`ClusterClient`].
//!
//! Talks to a SolrCloud node over HTTP:
//!
//! | Call | Endpoint |
//! |------|----------|
//! | list / create / delete collection | `GET {base}/admin/collections?action=...` |
//! | list fields | `GET {base}/{collection}/schema/fields` |
//! | add field | `POST {base}/{collection}/schema` with `{"add-field": ...}` |
//! | submit documents | `POST {base}/{collection}/update/json/docs?commit=true` |
//! | query | `GET {base}/{collection}/select` |
//!
//! Transport failures map to [`ClusterError::Unreachable`], non-2xx answers
//! to [`ClusterError::Rejected`] carrying Solr's error message. Nothing is
//! retried here.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use citegraph_core::cluster::{ClusterClient, ClusterError, CollectionSpec, SelectQuery};
use citegraph_core::record::TargetDocument;
use citegraph_core::schema::{FieldDefinition, FieldType};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ClusterConfig;

/// HTTP client for one Solr base URL (e.g. `http://localhost:8983/solr`).
pub struct SolrClient {
    http: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct CollectionList {
    #[serde(default)]
    collections: Vec<String>,
}

#[derive(Deserialize)]
struct FieldList {
    fields: Vec<SolrField>,
}

#[derive(Deserialize)]
struct SolrField {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default = "default_true")]
    stored: bool,
    #[serde(rename = "multiValued")]
    multi_valued: Option<bool>,
}

fn default_true() -> bool {
    true
}

impl From<SolrField> for FieldDefinition {
    fn from(field: SolrField) -> Self {
        let (field_type, implied_multi) = FieldType::from_solr_name(&field.field_type);
        FieldDefinition {
            name: field.name,
            field_type,
            stored: field.stored,
            multi_valued: field.multi_valued.unwrap_or(implied_multi),
        }
    }
}

#[derive(Deserialize)]
struct SelectResponse {
    response: SelectDocs,
}

#[derive(Deserialize)]
struct SelectDocs {
    docs: Vec<Value>,
}

impl SolrClient {
    /// Build a client for `base_url`.
    ///
    /// Fails when the URL is not an absolute http(s) URL or the HTTP client
    /// cannot be set up. No request is made here.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let parsed = Url::parse(base_url)
            .with_context(|| format!("Invalid Solr URL '{}'", base_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("Invalid Solr URL '{}': scheme must be http or https", base_url);
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClusterConfig) -> anyhow::Result<Self> {
        Self::new(&config.url, config.timeout_secs.map(Duration::from_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn admin_url(&self) -> String {
        format!("{}/admin/collections", self.base_url)
    }

    fn collection_url(&self, collection: &str, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, path)
    }

    /// Send a request, mapping transport errors and non-success statuses.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ClusterError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClusterError::unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = %status, body = %body, "Solr request failed");
            return Err(ClusterError::rejected(status.as_u16(), error_detail(&body)));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClusterError> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClusterError::invalid_response(e.to_string()))
    }

    /// Collection admin calls can answer 200 with a `failure` section.
    async fn send_admin(&self, request: RequestBuilder) -> Result<(), ClusterError> {
        let body: Value = self.send_json(request).await?;
        match body.get("failure") {
            Some(failure) if !failure.is_null() => {
                Err(ClusterError::rejected(200, failure.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Pull Solr's `error.msg` out of an error body, or return the body as is.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/msg")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// The `add-field` command body for one field.
pub fn add_field_command(field: &FieldDefinition) -> Value {
    let mut spec = json!({
        "name": field.name,
        "type": field.solr_type(),
        "stored": field.stored,
    });
    if field.multi_valued {
        spec["multiValued"] = json!(true);
    }
    json!({ "add-field": spec })
}

#[async_trait]
impl ClusterClient for SolrClient {
    async fn list_collections(&self) -> Result<BTreeSet<String>, ClusterError> {
        let request = self.http.get(self.admin_url()).query(&[("action", "LIST")]);
        let list: CollectionList = self.send_json(request).await?;
        Ok(list.collections.into_iter().collect())
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), ClusterError> {
        let request = self.http.get(self.admin_url()).query(&[
            ("action", "CREATE".to_string()),
            ("name", spec.name.clone()),
            ("numShards", spec.num_shards.to_string()),
            ("replicationFactor", spec.replication_factor.to_string()),
            ("collection.configName", spec.config_set.clone()),
            ("maxShardsPerNode", spec.max_shards_per_node.to_string()),
        ]);
        self.send_admin(request).await
    }

    async fn delete_collection(&self, name: &str) -> Result<(), ClusterError> {
        let request = self
            .http
            .get(self.admin_url())
            .query(&[("action", "DELETE"), ("name", name)]);
        self.send_admin(request).await
    }

    async fn list_fields(&self, collection: &str) -> Result<Vec<FieldDefinition>, ClusterError> {
        let request = self.http.get(self.collection_url(collection, "schema/fields"));
        let list: FieldList = self.send_json(request).await?;
        Ok(list.fields.into_iter().map(FieldDefinition::from).collect())
    }

    async fn add_field(
        &self,
        collection: &str,
        field: &FieldDefinition,
    ) -> Result<(), ClusterError> {
        let request = self
            .http
            .post(self.collection_url(collection, "schema"))
            .json(&add_field_command(field));
        self.send(request).await?;
        Ok(())
    }

    async fn submit_documents(
        &self,
        collection: &str,
        documents: &[TargetDocument],
        commit: bool,
    ) -> Result<(), ClusterError> {
        let request = self
            .http
            .post(self.collection_url(collection, "update/json/docs"))
            .query(&[("commit", commit.to_string())])
            .json(documents);
        self.send(request).await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query: &SelectQuery,
    ) -> Result<Vec<Value>, ClusterError> {
        let mut params = vec![
            ("q", query.q.clone()),
            ("rows", query.rows.to_string()),
            ("wt", "json".to_string()),
        ];
        if let Some(sort) = &query.sort {
            params.push(("sort", sort.clone()));
        }
        let request = self
            .http
            .get(self.collection_url(collection, "select"))
            .query(&params);
        let response: SelectResponse = self.send_json(request).await?;
        Ok(response.response.docs)
    }
}
