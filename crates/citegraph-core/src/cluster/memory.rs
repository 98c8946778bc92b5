//! In-memory [`ClusterClient`] for tests.
//!
//! Behaves like a single Solr node for the calls this crate makes: creating
//! a collection that exists or adding a field that exists is rejected, new
//! collections start with the `_default` config set's `id` field, and
//! documents are keyed by id so resubmission overwrites. Every call is
//! recorded, and individual calls can be made to fail.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::record::TargetDocument;
use crate::schema::{FieldDefinition, FieldType};

use super::{ClusterClient, ClusterError, CollectionSpec, SelectQuery};

/// A call observed by [`InMemoryCluster`], in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    ListCollections,
    CreateCollection(String),
    DeleteCollection(String),
    ListFields(String),
    AddField { collection: String, field: String },
    SubmitDocuments { collection: String, count: usize, commit: bool },
    Query { collection: String, rows: usize, sort: Option<String> },
}

struct StoredCollection {
    spec: CollectionSpec,
    fields: Vec<FieldDefinition>,
    docs: BTreeMap<i64, TargetDocument>,
}

/// In-memory cluster with call recording and failure injection.
pub struct InMemoryCluster {
    collections: RwLock<HashMap<String, StoredCollection>>,
    calls: Mutex<Vec<ClusterCall>>,
    unreachable: AtomicBool,
    reject_create: Mutex<Option<String>>,
    create_races: AtomicBool,
    reject_delete: Mutex<Option<String>>,
    rejected_fields: Mutex<HashSet<String>>,
    failed_submissions: Mutex<HashSet<usize>>,
    submissions: Mutex<usize>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            unreachable: AtomicBool::new(false),
            reject_create: Mutex::new(None),
            create_races: AtomicBool::new(false),
            reject_delete: Mutex::new(None),
            rejected_fields: Mutex::new(HashSet::new()),
            failed_submissions: Mutex::new(HashSet::new()),
            submissions: Mutex::new(0),
        }
    }

    /// Pre-populate a collection carrying the given fields.
    pub fn with_collection(self, spec: CollectionSpec, fields: Vec<FieldDefinition>) -> Self {
        self.collections.write().unwrap().insert(
            spec.name.clone(),
            StoredCollection {
                spec,
                fields,
                docs: BTreeMap::new(),
            },
        );
        self
    }

    /// Make every subsequent call fail with [`ClusterError::Unreachable`].
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Reject collection-create calls with the given detail.
    pub fn reject_create(&self, detail: impl Into<String>) {
        *self.reject_create.lock().unwrap() = Some(detail.into());
    }

    /// Simulate a concurrent creator: the next create call is rejected, but
    /// the collection exists afterwards.
    pub fn race_create(&self) {
        self.create_races.store(true, Ordering::SeqCst);
    }

    pub fn reject_delete(&self, detail: impl Into<String>) {
        *self.reject_delete.lock().unwrap() = Some(detail.into());
    }

    /// Reject add-field calls for the named field.
    pub fn reject_field(&self, name: impl Into<String>) {
        self.rejected_fields.lock().unwrap().insert(name.into());
    }

    /// Reject the submission with ordinal `n`, counted from zero since the
    /// cluster was built.
    pub fn fail_submission(&self, n: usize) {
        self.failed_submissions.lock().unwrap().insert(n);
    }

    pub fn calls(&self) -> Vec<ClusterCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.read().unwrap().contains_key(name)
    }

    pub fn collection_spec(&self, name: &str) -> Option<CollectionSpec> {
        self.collections
            .read()
            .unwrap()
            .get(name)
            .map(|c| c.spec.clone())
    }

    /// Field names of a collection in the order they were added.
    pub fn field_names(&self, collection: &str) -> Vec<String> {
        self.collections
            .read()
            .unwrap()
            .get(collection)
            .map(|c| c.fields.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Stored documents of a collection, ordered by id.
    pub fn documents(&self, collection: &str) -> Vec<TargetDocument> {
        self.collections
            .read()
            .unwrap()
            .get(collection)
            .map(|c| c.docs.values().cloned().collect())
            .unwrap_or_default()
    }

    fn record(&self, call: ClusterCall) -> Result<(), ClusterError> {
        self.calls.lock().unwrap().push(call);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ClusterError::unreachable("connection refused"));
        }
        Ok(())
    }
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(collection: &str) -> ClusterError {
    ClusterError::rejected(404, format!("Can not find collection: {}", collection))
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn list_collections(&self) -> Result<BTreeSet<String>, ClusterError> {
        self.record(ClusterCall::ListCollections)?;
        Ok(self.collections.read().unwrap().keys().cloned().collect())
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), ClusterError> {
        self.record(ClusterCall::CreateCollection(spec.name.clone()))?;
        if let Some(detail) = self.reject_create.lock().unwrap().clone() {
            return Err(ClusterError::rejected(400, detail));
        }
        let mut collections = self.collections.write().unwrap();
        let raced = self.create_races.swap(false, Ordering::SeqCst);
        if collections.contains_key(&spec.name) && !raced {
            return Err(ClusterError::rejected(
                400,
                format!("collection already exists: {}", spec.name),
            ));
        }
        collections.insert(
            spec.name.clone(),
            StoredCollection {
                spec: spec.clone(),
                fields: vec![FieldDefinition::new("id", FieldType::String)],
                docs: BTreeMap::new(),
            },
        );
        if raced {
            return Err(ClusterError::rejected(
                400,
                format!("collection already exists: {}", spec.name),
            ));
        }
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), ClusterError> {
        self.record(ClusterCall::DeleteCollection(name.to_string()))?;
        if let Some(detail) = self.reject_delete.lock().unwrap().clone() {
            return Err(ClusterError::rejected(500, detail));
        }
        match self.collections.write().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(not_found(name)),
        }
    }

    async fn list_fields(&self, collection: &str) -> Result<Vec<FieldDefinition>, ClusterError> {
        self.record(ClusterCall::ListFields(collection.to_string()))?;
        self.collections
            .read()
            .unwrap()
            .get(collection)
            .map(|c| c.fields.clone())
            .ok_or_else(|| not_found(collection))
    }

    async fn add_field(
        &self,
        collection: &str,
        field: &FieldDefinition,
    ) -> Result<(), ClusterError> {
        self.record(ClusterCall::AddField {
            collection: collection.to_string(),
            field: field.name.clone(),
        })?;
        if self.rejected_fields.lock().unwrap().contains(&field.name) {
            return Err(ClusterError::rejected(
                400,
                format!("error processing commands: {}", field.name),
            ));
        }
        let mut collections = self.collections.write().unwrap();
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection))?;
        if stored.fields.iter().any(|f| f.name == field.name) {
            return Err(ClusterError::rejected(
                400,
                format!("Field '{}' already exists.", field.name),
            ));
        }
        stored.fields.push(field.clone());
        Ok(())
    }

    async fn submit_documents(
        &self,
        collection: &str,
        documents: &[TargetDocument],
        commit: bool,
    ) -> Result<(), ClusterError> {
        self.record(ClusterCall::SubmitDocuments {
            collection: collection.to_string(),
            count: documents.len(),
            commit,
        })?;
        let ordinal = {
            let mut submissions = self.submissions.lock().unwrap();
            let n = *submissions;
            *submissions += 1;
            n
        };
        if self.failed_submissions.lock().unwrap().contains(&ordinal) {
            return Err(ClusterError::rejected(
                400,
                format!("ERROR: [doc={}] injected failure", ordinal),
            ));
        }
        let mut collections = self.collections.write().unwrap();
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection))?;
        for doc in documents {
            stored.docs.insert(doc.id, doc.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query: &SelectQuery,
    ) -> Result<Vec<Value>, ClusterError> {
        self.record(ClusterCall::Query {
            collection: collection.to_string(),
            rows: query.rows,
            sort: query.sort.clone(),
        })?;
        let collections = self.collections.read().unwrap();
        let stored = collections
            .get(collection)
            .ok_or_else(|| not_found(collection))?;
        stored
            .docs
            .values()
            .take(query.rows)
            .map(|d| {
                serde_json::to_value(d).map_err(|e| ClusterError::invalid_response(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::transform;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_then_list() {
        let cluster = InMemoryCluster::new();
        cluster
            .create_collection(&CollectionSpec::new("papers"))
            .await
            .unwrap();
        let names = cluster.list_collections().await.unwrap();
        assert!(names.contains("papers"));
        assert_eq!(cluster.field_names("papers"), vec!["id"]);
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let cluster = InMemoryCluster::new();
        let spec = CollectionSpec::new("papers");
        cluster.create_collection(&spec).await.unwrap();
        let err = cluster.create_collection(&spec).await.unwrap_err();
        assert!(matches!(err, ClusterError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_duplicate_field_rejected() {
        let cluster = InMemoryCluster::new();
        cluster
            .create_collection(&CollectionSpec::new("papers"))
            .await
            .unwrap();
        let field = FieldDefinition::new("title", FieldType::Text);
        cluster.add_field("papers", &field).await.unwrap();
        assert!(cluster.add_field("papers", &field).await.is_err());
    }

    #[tokio::test]
    async fn test_submit_overwrites_by_id() {
        let cluster = InMemoryCluster::new();
        cluster
            .create_collection(&CollectionSpec::new("papers"))
            .await
            .unwrap();
        let first = transform(&json!({"id": 1, "title": "old"})).unwrap();
        let second = transform(&json!({"id": 1, "title": "new"})).unwrap();
        cluster.submit_documents("papers", &[first], true).await.unwrap();
        cluster.submit_documents("papers", &[second], true).await.unwrap();
        let docs = cluster.documents("papers");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "new");
    }

    #[tokio::test]
    async fn test_injected_submission_failure() {
        let cluster = InMemoryCluster::new();
        cluster
            .create_collection(&CollectionSpec::new("papers"))
            .await
            .unwrap();
        cluster.fail_submission(0);
        let doc = transform(&json!({"id": 1})).unwrap();
        assert!(cluster
            .submit_documents("papers", std::slice::from_ref(&doc), true)
            .await
            .is_err());
        assert!(cluster.submit_documents("papers", &[doc], true).await.is_ok());
        assert_eq!(cluster.documents("papers").len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_records_call() {
        let cluster = InMemoryCluster::new();
        cluster.set_unreachable(true);
        let err = cluster.list_collections().await.unwrap_err();
        assert!(matches!(err, ClusterError::Unreachable(_)));
        assert_eq!(cluster.calls(), vec![ClusterCall::ListCollections]);
    }
}
