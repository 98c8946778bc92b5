//! Collection admin commands: check, create, delete, recreate.
//!
//! Each handler prints operator-facing messages to `out` and leaves the
//! provisioning logic to [`Provisioner`]. Errors propagate and end the
//! process with a non-zero status.

use std::io::Write;

use anyhow::Result;
use citegraph_core::provision::{CreateOutcome, DeleteOutcome, Provisioner};

/// Print whether the collection exists and return the answer.
pub async fn check_collection<W: Write>(provisioner: &Provisioner, out: &mut W) -> Result<bool> {
    let name = provisioner.collection();
    let exists = provisioner.exists().await?;
    if exists {
        writeln!(out, "{} collection exists", name)?;
    } else {
        writeln!(out, "{} collection does not exist", name)?;
    }
    Ok(exists)
}

pub async fn create_collection<W: Write>(
    provisioner: &Provisioner,
    out: &mut W,
) -> Result<CreateOutcome> {
    let name = provisioner.collection();
    if provisioner.exists().await? {
        writeln!(out, "{} collection already exists", name)?;
        return Ok(CreateOutcome::AlreadyExists);
    }

    writeln!(out, "Creating {} collection...", name)?;
    let outcome = provisioner.create().await?;
    match &outcome {
        CreateOutcome::Created { .. } => {
            writeln!(out, "Collection created and schema configured successfully")?
        }
        // Someone else created it between our check and the create call.
        CreateOutcome::AlreadyExists => writeln!(out, "{} collection already exists", name)?,
    }
    Ok(outcome)
}

pub async fn delete_collection<W: Write>(
    provisioner: &Provisioner,
    out: &mut W,
) -> Result<DeleteOutcome> {
    let name = provisioner.collection();
    if !provisioner.exists().await? {
        writeln!(out, "{} collection does not exist", name)?;
        return Ok(DeleteOutcome::NotFound);
    }

    writeln!(out, "Deleting {} collection...", name)?;
    let outcome = provisioner.delete().await?;
    if outcome == DeleteOutcome::Deleted {
        writeln!(out, "Collection deleted successfully")?;
    }
    Ok(outcome)
}

/// Delete the collection when present, then create it fresh.
pub async fn recreate_collection<W: Write>(
    provisioner: &Provisioner,
    out: &mut W,
) -> Result<(DeleteOutcome, CreateOutcome)> {
    let name = provisioner.collection();
    let deleted = if provisioner.exists().await? {
        writeln!(out, "Deleting existing {} collection...", name)?;
        let outcome = provisioner.delete().await?;
        writeln!(out, "Collection deleted successfully")?;
        outcome
    } else {
        DeleteOutcome::NotFound
    };

    let created = create_collection(provisioner, out).await?;
    Ok((deleted, created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use citegraph_core::cluster::memory::{ClusterCall, InMemoryCluster};
    use citegraph_core::cluster::CollectionSpec;
    use citegraph_core::provision::ProvisionError;
    use citegraph_core::schema::citation_schema;
    use std::sync::Arc;

    const NAME: &str = "citation_graph";

    fn provisioner(cluster: &Arc<InMemoryCluster>) -> Provisioner {
        Provisioner::new(cluster.clone(), CollectionSpec::new(NAME))
    }

    fn text(out: Vec<u8>) -> String {
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_check_reports_both_states() {
        let cluster = Arc::new(InMemoryCluster::new());
        let mut out = Vec::new();
        assert!(!check_collection(&provisioner(&cluster), &mut out).await.unwrap());
        assert_eq!(text(out), "citation_graph collection does not exist\n");

        let cluster = Arc::new(
            InMemoryCluster::new().with_collection(CollectionSpec::new(NAME), citation_schema()),
        );
        let mut out = Vec::new();
        assert!(check_collection(&provisioner(&cluster), &mut out).await.unwrap());
        assert_eq!(text(out), "citation_graph collection exists\n");
    }

    #[tokio::test]
    async fn test_create_then_create_again() {
        let cluster = Arc::new(InMemoryCluster::new());
        let p = provisioner(&cluster);

        let mut out = Vec::new();
        let outcome = create_collection(&p, &mut out).await.unwrap();
        assert!(matches!(outcome, CreateOutcome::Created { .. }));
        assert_eq!(
            text(out),
            "Creating citation_graph collection...\n\
             Collection created and schema configured successfully\n"
        );
        assert!(cluster.has_collection(NAME));

        let mut out = Vec::new();
        let outcome = create_collection(&p, &mut out).await.unwrap();
        assert_eq!(outcome, CreateOutcome::AlreadyExists);
        assert_eq!(text(out), "citation_graph collection already exists\n");
    }

    #[tokio::test]
    async fn test_create_failure_propagates() {
        let cluster = Arc::new(InMemoryCluster::new());
        cluster.reject_create("Could not find configName _default");
        let err = create_collection(&provisioner(&cluster), &mut Vec::new())
            .await
            .unwrap_err();
        let err = err.downcast::<ProvisionError>().unwrap();
        assert!(matches!(err, ProvisionError::ProvisioningFailed { .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let cluster = Arc::new(InMemoryCluster::new());
        let mut out = Vec::new();
        let outcome = delete_collection(&provisioner(&cluster), &mut out)
            .await
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::NotFound);
        assert_eq!(text(out), "citation_graph collection does not exist\n");
        assert!(!cluster
            .calls()
            .iter()
            .any(|c| matches!(c, ClusterCall::DeleteCollection(_))));
    }

    #[tokio::test]
    async fn test_delete_existing() {
        let cluster = Arc::new(
            InMemoryCluster::new().with_collection(CollectionSpec::new(NAME), citation_schema()),
        );
        let mut out = Vec::new();
        let outcome = delete_collection(&provisioner(&cluster), &mut out)
            .await
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert!(text(out).ends_with("Collection deleted successfully\n"));
        assert!(!cluster.has_collection(NAME));
    }

    #[tokio::test]
    async fn test_recreate_existing() {
        let cluster = Arc::new(
            InMemoryCluster::new().with_collection(CollectionSpec::new(NAME), Vec::new()),
        );
        let mut out = Vec::new();
        let (deleted, created) = recreate_collection(&provisioner(&cluster), &mut out)
            .await
            .unwrap();
        assert_eq!(deleted, DeleteOutcome::Deleted);
        assert!(matches!(created, CreateOutcome::Created { .. }));

        let out = text(out);
        assert!(out.starts_with("Deleting existing citation_graph collection...\n"));
        assert!(out.contains("Creating citation_graph collection...\n"));
        for field in ["title", "year", "references"] {
            assert!(cluster.field_names(NAME).iter().any(|f| f == field));
        }
    }

    #[tokio::test]
    async fn test_recreate_missing_only_creates() {
        let cluster = Arc::new(InMemoryCluster::new());
        let mut out = Vec::new();
        let (deleted, _) = recreate_collection(&provisioner(&cluster), &mut out)
            .await
            .unwrap();
        assert_eq!(deleted, DeleteOutcome::NotFound);
        assert!(!text(out).contains("Deleting"));
        assert!(cluster.has_collection(NAME));
    }
}
