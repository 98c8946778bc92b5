//! `citegraph random-sample`: pull random documents using Solr's
//! `random_<seed>` dynamic sort field.

use std::io::Write;

use anyhow::{Context, Result};
use citegraph_core::cluster::SelectQuery;
use citegraph_core::provision::Provisioner;
use rand::Rng;
use serde_json::Value;

/// Upper bound (inclusive) of the sort seed.
pub const MAX_SEED: u32 = 1_000_000;

pub fn sample_query(rows: usize, seed: u32) -> SelectQuery {
    SelectQuery::all(rows).sorted_by(format!("random_{} desc", seed))
}

/// Fetch `rows` random documents and print them as pretty JSON.
///
/// Returns `None` after printing a notice when the collection is missing.
pub async fn random_sample<W: Write>(
    provisioner: &Provisioner,
    rows: usize,
    out: &mut W,
) -> Result<Option<Vec<Value>>> {
    let name = provisioner.collection();
    if !provisioner.exists().await? {
        writeln!(out, "{} collection does not exist", name)?;
        return Ok(None);
    }

    let seed = rand::thread_rng().gen_range(0..=MAX_SEED);
    let query = sample_query(rows, seed);
    tracing::debug!(collection = %name, rows, seed, "Random sample query");

    let docs = provisioner
        .client()
        .query(name, &query)
        .await
        .context("Failed to get random sample")?;

    writeln!(out, "{}", serde_json::to_string_pretty(&docs)?)?;
    Ok(Some(docs))
}
