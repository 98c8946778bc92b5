//! # citegraph CLI
//!
//! Provisions a Solr collection for a citation graph and bulk-loads JSON
//! Lines citation records into it.
//!
//! ## Usage
//!
//! ```bash
//! citegraph [--config ./config/citegraph.toml] [--solr-url URL] [--collection NAME] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `citegraph check-collection` | Report whether the collection exists |
//! | `citegraph create-collection` | Create the collection and its schema if missing |
//! | `citegraph delete-collection` | Delete the collection if present |
//! | `citegraph recreate-collection` | Delete, then create fresh |
//! | `citegraph ingest <file>` | Stream a JSON Lines file into the collection |
//! | `citegraph random-sample <n>` | Print `n` random documents as JSON |
//!
//! ## Examples
//!
//! ```bash
//! # Start from an empty collection
//! citegraph recreate-collection
//!
//! # Load the DBLP citation dump in batches of 500
//! citegraph ingest dblp.v12.jsonl --batch-size 500
//!
//! # Spot-check what landed
//! citegraph random-sample 3
//! ```

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use citegraph::config::{self, Overrides};
use citegraph::progress::ProgressMode;
use citegraph::solr::SolrClient;
use citegraph::{collection, ingest, logging, sample};
use citegraph_core::cluster::ClusterClient;
use citegraph_core::provision::Provisioner;

/// citegraph: provision a Solr citation-graph collection and ingest
/// citation records into it.
#[derive(Parser)]
#[command(
    name = "citegraph",
    about = "Provision a Solr citation-graph collection and bulk-ingest citation records",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/citegraph.toml` when that file exists; built-in
    /// defaults are used otherwise.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Solr base URL, e.g. `http://localhost:8983/solr`.
    #[arg(long, global = true)]
    solr_url: Option<String>,

    /// Collection name.
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Log filter (`info`, `debug`, `citegraph=trace`, ...). `RUST_LOG` wins.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether the collection exists.
    CheckCollection,

    /// Create the collection and configure its schema.
    ///
    /// Does nothing when the collection already exists.
    CreateCollection,

    /// Delete the collection if it exists.
    DeleteCollection,

    /// Delete the collection if it exists, then create it fresh.
    RecreateCollection,

    /// Ingest citations from a JSON Lines file.
    ///
    /// Creates the collection first when it is missing. Malformed records
    /// are skipped and failed batches are dropped; both are logged to stderr.
    #[command(alias = "ingest-citations")]
    Ingest {
        /// Input file, one JSON citation record per line.
        input: PathBuf,

        /// Number of records to send in each batch (default from config).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Progress display on stdout. Defaults to `human` on a terminal,
        /// `off` otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Print random documents from the collection as JSON.
    #[command(alias = "get-random-sample")]
    RandomSample {
        /// Number of random samples to retrieve.
        num_samples: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::resolve_config(cli.config.as_deref())?.with_overrides(Overrides {
        solr_url: cli.solr_url,
        collection: cli.collection,
        log_level: cli.log_level,
    })?;
    logging::init_logging(&cfg.logging)?;

    let client: Arc<dyn ClusterClient> = Arc::new(SolrClient::from_config(&cfg.cluster)?);
    let provisioner = Provisioner::new(client.clone(), cfg.collection.spec());
    let mut out = io::stdout();

    match cli.command {
        Commands::CheckCollection => {
            collection::check_collection(&provisioner, &mut out).await?;
        }
        Commands::CreateCollection => {
            collection::create_collection(&provisioner, &mut out).await?;
        }
        Commands::DeleteCollection => {
            collection::delete_collection(&provisioner, &mut out).await?;
        }
        Commands::RecreateCollection => {
            collection::recreate_collection(&provisioner, &mut out).await?;
        }
        Commands::Ingest {
            input,
            batch_size,
            progress,
        } => {
            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_ingest(&cfg, client, &input, batch_size, progress).await?;
        }
        Commands::RandomSample { num_samples } => {
            sample::random_sample(&provisioner, num_samples, &mut out).await?;
        }
    }

    Ok(())
}
