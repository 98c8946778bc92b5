//! Idempotent collection setup.
//!
//! The cluster offers no atomic create-if-absent for collections or schema
//! fields, so every mutating call here is preceded by an existence check.
//! Between the check and the call another operator could act on the same
//! collection. [`Provisioner::create`] tolerates exactly one form of that
//! race: a create that is rejected while the collection turns out to exist
//! is treated as created by someone else and schema reconciliation goes on.
//! Concurrent provisioners are otherwise not supported.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cluster::{ClusterClient, ClusterError, CollectionSpec};
use crate::schema::{citation_schema, FieldDefinition};

/// Errors from provisioning operations. All of them abort the operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("cluster unreachable: {0}")]
    ClusterUnreachable(String),

    #[error("failed to {operation}: {detail}")]
    ProvisioningFailed { operation: String, detail: String },
}

impl ProvisionError {
    fn from_cluster(operation: impl Into<String>, err: ClusterError) -> Self {
        match err {
            ClusterError::Unreachable(msg) => Self::ClusterUnreachable(msg),
            ClusterError::Rejected { status, detail } => Self::ProvisioningFailed {
                operation: operation.into(),
                detail: format!("HTTP {}: {}", status, detail),
            },
            ClusterError::InvalidResponse(detail) => Self::ProvisioningFailed {
                operation: operation.into(),
                detail,
            },
        }
    }
}

/// Result of [`Provisioner::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The collection was already present; nothing was changed.
    AlreadyExists,
    /// The collection was created and these schema fields were added.
    Created { fields_added: Vec<String> },
}

/// Result of [`Provisioner::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    NotFound,
    Deleted,
}

/// Result of [`Provisioner::add_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldChange {
    Added,
    AlreadyPresent,
}

/// Creates, deletes and reconciles one collection on one cluster.
pub struct Provisioner {
    client: Arc<dyn ClusterClient>,
    spec: CollectionSpec,
    schema: Vec<FieldDefinition>,
}

impl Provisioner {
    /// Provisioner for the citation schema.
    pub fn new(client: Arc<dyn ClusterClient>, spec: CollectionSpec) -> Self {
        Self::with_schema(client, spec, citation_schema())
    }

    pub fn with_schema(
        client: Arc<dyn ClusterClient>,
        spec: CollectionSpec,
        schema: Vec<FieldDefinition>,
    ) -> Self {
        Self {
            client,
            spec,
            schema,
        }
    }

    pub fn collection(&self) -> &str {
        &self.spec.name
    }

    pub fn client(&self) -> &Arc<dyn ClusterClient> {
        &self.client
    }

    /// Whether the collection is present on the cluster.
    pub async fn exists(&self) -> Result<bool, ProvisionError> {
        let names = self
            .client
            .list_collections()
            .await
            .map_err(|e| ProvisionError::from_cluster("list collections", e))?;
        Ok(names.contains(&self.spec.name))
    }

    /// Create the collection and add its schema fields.
    ///
    /// Does nothing when the collection already exists. Field additions stop
    /// at the first failure.
    pub async fn create(&self) -> Result<CreateOutcome, ProvisionError> {
        if self.exists().await? {
            debug!(collection = %self.spec.name, "Collection already exists");
            return Ok(CreateOutcome::AlreadyExists);
        }

        info!(
            collection = %self.spec.name,
            shards = self.spec.num_shards,
            replication_factor = self.spec.replication_factor,
            "Creating collection"
        );
        if let Err(err) = self.client.create_collection(&self.spec).await {
            let operation = format!("create collection '{}'", self.spec.name);
            if matches!(err, ClusterError::Unreachable(_)) || !self.exists().await? {
                return Err(ProvisionError::from_cluster(operation, err));
            }
            warn!(
                collection = %self.spec.name,
                error = %err,
                "Create was rejected but the collection exists; assuming a concurrent create"
            );
        }

        let fields_added = self.ensure_schema().await?;
        info!(
            collection = %self.spec.name,
            fields_added = fields_added.len(),
            "Collection created and schema configured"
        );
        Ok(CreateOutcome::Created { fields_added })
    }

    /// Add every schema field the collection does not yet have, in schema
    /// order. Returns the names of the fields that were added.
    pub async fn ensure_schema(&self) -> Result<Vec<String>, ProvisionError> {
        let mut added = Vec::new();
        for field in &self.schema {
            if self.add_field(field).await? == FieldChange::Added {
                added.push(field.name.clone());
            }
        }
        Ok(added)
    }

    /// Add one field unless a field with the same name already exists.
    ///
    /// An existing field is left exactly as it is, whatever its type.
    pub async fn add_field(&self, field: &FieldDefinition) -> Result<FieldChange, ProvisionError> {
        let existing = self
            .client
            .list_fields(&self.spec.name)
            .await
            .map_err(|e| ProvisionError::from_cluster("list schema fields", e))?;
        if existing.iter().any(|f| f.name == field.name) {
            debug!(field = %field.name, "Field already present");
            return Ok(FieldChange::AlreadyPresent);
        }

        self.client
            .add_field(&self.spec.name, field)
            .await
            .map_err(|e| ProvisionError::from_cluster(format!("add field '{}'", field.name), e))?;
        debug!(field = %field.name, solr_type = field.solr_type(), "Field added");
        Ok(FieldChange::Added)
    }

    /// Delete the collection if it exists.
    pub async fn delete(&self) -> Result<DeleteOutcome, ProvisionError> {
        if !self.exists().await? {
            debug!(collection = %self.spec.name, "Collection does not exist");
            return Ok(DeleteOutcome::NotFound);
        }

        info!(collection = %self.spec.name, "Deleting collection");
        self.client
            .delete_collection(&self.spec.name)
            .await
            .map_err(|e| {
                ProvisionError::from_cluster(format!("delete collection '{}'", self.spec.name), e)
            })?;
        Ok(DeleteOutcome::Deleted)
    }

    /// Delete the collection if present, then create it fresh.
    pub async fn recreate(&self) -> Result<(DeleteOutcome, CreateOutcome), ProvisionError> {
        let deleted = self.delete().await?;
        let created = self.create().await?;
        Ok((deleted, created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::memory::{ClusterCall, InMemoryCluster};
    use crate::schema::FieldType;

    const NAME: &str = "citation_graph";

    fn setup() -> (Arc<InMemoryCluster>, Provisioner) {
        let cluster = Arc::new(InMemoryCluster::new());
        let provisioner = Provisioner::new(cluster.clone(), CollectionSpec::new(NAME));
        (cluster, provisioner)
    }

    fn schema_names() -> Vec<String> {
        citation_schema().into_iter().map(|f| f.name).collect()
    }

    #[tokio::test]
    async fn test_exists_false_then_true() {
        let (_cluster, provisioner) = setup();
        assert!(!provisioner.exists().await.unwrap());
        provisioner.create().await.unwrap();
        assert!(provisioner.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_create_configures_schema() {
        let (cluster, provisioner) = setup();
        let outcome = provisioner.create().await.unwrap();

        // `id` ships with the default config set and is left alone.
        let expected_added: Vec<String> = schema_names().into_iter().skip(1).collect();
        assert_eq!(
            outcome,
            CreateOutcome::Created {
                fields_added: expected_added
            }
        );
        assert_eq!(cluster.field_names(NAME), schema_names());

        let spec = cluster.collection_spec(NAME).unwrap();
        assert_eq!(spec.num_shards, 2);
        assert_eq!(spec.replication_factor, 1);
        assert_eq!(spec.max_shards_per_node, 2);
        assert_eq!(spec.config_set, "_default");
    }

    #[tokio::test]
    async fn test_create_twice_is_idempotent() {
        let (cluster, provisioner) = setup();
        provisioner.create().await.unwrap();
        let fields_once = cluster.field_names(NAME);

        cluster.clear_calls();
        let second = provisioner.create().await.unwrap();
        assert_eq!(second, CreateOutcome::AlreadyExists);
        assert_eq!(cluster.field_names(NAME), fields_once);
        assert_eq!(cluster.calls(), vec![ClusterCall::ListCollections]);
    }

    #[tokio::test]
    async fn test_add_existing_field_is_noop() {
        let (cluster, provisioner) = setup();
        provisioner.create().await.unwrap();
        let title = FieldDefinition::new("title", FieldType::Text);

        cluster.clear_calls();
        let change = provisioner.add_field(&title).await.unwrap();
        assert_eq!(change, FieldChange::AlreadyPresent);
        assert_eq!(
            cluster.calls(),
            vec![ClusterCall::ListFields(NAME.to_string())]
        );
    }

    #[tokio::test]
    async fn test_existing_field_not_redefined() {
        let cluster = Arc::new(InMemoryCluster::new());
        cluster
            .create_collection(&CollectionSpec::new(NAME))
            .await
            .unwrap();
        // `year` already exists as a string; reconciliation must not touch it.
        cluster
            .add_field(NAME, &FieldDefinition::new("year", FieldType::String))
            .await
            .unwrap();
        let provisioner = Provisioner::new(cluster.clone(), CollectionSpec::new(NAME));
        let added = provisioner.ensure_schema().await.unwrap();
        assert!(!added.contains(&"year".to_string()));
        let fields = cluster.list_fields(NAME).await.unwrap();
        let year = fields.iter().find(|f| f.name == "year").unwrap();
        assert_eq!(year.field_type, FieldType::String);
    }

    #[tokio::test]
    async fn test_create_rejected() {
        let (cluster, provisioner) = setup();
        cluster.reject_create("Could not find configName _default");
        let err = provisioner.create().await.unwrap_err();
        match err {
            ProvisionError::ProvisioningFailed { operation, detail } => {
                assert!(operation.contains("create collection"));
                assert!(detail.contains("Could not find configName"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_field_add_failure_is_fail_fast() {
        let (cluster, provisioner) = setup();
        cluster.reject_field("publisher");
        let err = provisioner.create().await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::ProvisioningFailed { ref operation, .. } if operation.contains("publisher")
        ));
        // Fields after `publisher` were never attempted.
        let attempted: Vec<String> = cluster
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                ClusterCall::AddField { field, .. } => Some(field),
                _ => None,
            })
            .collect();
        assert_eq!(attempted, vec!["title", "year", "publisher"]);
        assert_eq!(cluster.field_names(NAME), vec!["id", "title", "year"]);
    }

    #[tokio::test]
    async fn test_concurrent_create_tolerated() {
        let (cluster, provisioner) = setup();
        cluster.race_create();
        let outcome = provisioner.create().await.unwrap();
        assert!(matches!(outcome, CreateOutcome::Created { .. }));
        assert_eq!(cluster.field_names(NAME), schema_names());
    }

    #[tokio::test]
    async fn test_unreachable_cluster() {
        let (cluster, provisioner) = setup();
        cluster.set_unreachable(true);
        assert!(matches!(
            provisioner.exists().await,
            Err(ProvisionError::ClusterUnreachable(_))
        ));
        assert!(matches!(
            provisioner.create().await,
            Err(ProvisionError::ClusterUnreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let (cluster, provisioner) = setup();
        assert_eq!(provisioner.delete().await.unwrap(), DeleteOutcome::NotFound);
        assert_eq!(cluster.calls(), vec![ClusterCall::ListCollections]);
    }

    #[tokio::test]
    async fn test_delete_rejected() {
        let (cluster, provisioner) = setup();
        provisioner.create().await.unwrap();
        cluster.reject_delete("shard lock held");
        assert!(matches!(
            provisioner.delete().await,
            Err(ProvisionError::ProvisioningFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_recreate_missing_behaves_like_create() {
        let (cluster, provisioner) = setup();
        let (deleted, created) = provisioner.recreate().await.unwrap();
        assert_eq!(deleted, DeleteOutcome::NotFound);
        assert!(matches!(created, CreateOutcome::Created { .. }));
        assert!(!cluster
            .calls()
            .iter()
            .any(|c| matches!(c, ClusterCall::DeleteCollection(_))));
        assert_eq!(cluster.field_names(NAME), schema_names());
    }

    #[tokio::test]
    async fn test_recreate_existing_drops_documents() {
        let (cluster, provisioner) = setup();
        provisioner.create().await.unwrap();
        let doc = crate::record::transform(&serde_json::json!({"id": 1})).unwrap();
        cluster.submit_documents(NAME, &[doc], true).await.unwrap();
        assert_eq!(cluster.documents(NAME).len(), 1);

        let (deleted, created) = provisioner.recreate().await.unwrap();
        assert_eq!(deleted, DeleteOutcome::Deleted);
        assert!(matches!(created, CreateOutcome::Created { .. }));
        assert!(cluster.documents(NAME).is_empty());
        assert_eq!(cluster.field_names(NAME), schema_names());
    }
}
