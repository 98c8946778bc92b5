//! Streaming batch ingestion of JSON Lines citation records.
//!
//! A run moves through [`IngestPhase`]s:
//!
//! ```text
//! Provisioning ──▶ Streaming ──▶ Draining ──▶ Done
//!                      │             │
//!                      └──────┬──────┘
//!                             ▼
//!                         FatalAbort
//! ```
//!
//! - **Provisioning** creates the collection if it is missing, before any
//!   record is read.
//! - **Streaming** reads one line at a time. Each line becomes a
//!   [`RecordOutcome`]: undecodable or unusable records are logged and
//!   skipped, accepted documents go into the [`Batch`]. A full batch is
//!   submitted and then emptied whatever the outcome.
//! - **Draining** submits the final partial batch once.
//! - **FatalAbort** is reached only when provisioning fails or the input
//!   cannot be read. Batches committed before that stay in the collection.
//!
//! A failed batch is dropped, not retried or requeued: its documents are
//! counted in [`IngestReport::documents_dropped`] and its first and last ids
//! are logged so the run can be repeated for them.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use citegraph_core::batch::Batch;
use citegraph_core::cluster::{ClusterClient, ClusterError};
use citegraph_core::provision::{CreateOutcome, ProvisionError, Provisioner};
use citegraph_core::record::{transform, TargetDocument, TransformError};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::progress::{
    format_number, IngestProgressEvent, IngestProgressReporter, NoProgress, ProgressMode,
};

/// Errors that abort an ingestion run.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("cannot read input {}: {source}", path.display())]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Provisioning(#[from] ProvisionError),
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestPhase {
    Provisioning,
    Streaming,
    Draining,
    Done,
    FatalAbort,
}

/// Why a single input line was not ingested.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("invalid JSON: {0}")]
    Decode(String),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// What became of one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Whitespace-only line; ignored without a diagnostic.
    Blank,
    Accepted(TargetDocument),
    Skipped(SkipReason),
}

/// Decode and transform one raw input line.
pub fn process_line(line: &[u8]) -> RecordOutcome {
    let line = line.trim_ascii();
    if line.is_empty() {
        return RecordOutcome::Blank;
    }
    let raw: Value = match serde_json::from_slice(line) {
        Ok(v) => v,
        Err(e) => return RecordOutcome::Skipped(SkipReason::Decode(e.to_string())),
    };
    match transform(&raw) {
        Ok(doc) => RecordOutcome::Accepted(doc),
        Err(e) => RecordOutcome::Skipped(e.into()),
    }
}

/// Result of submitting one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Committed(usize),
    Failed { dropped: usize, reason: ClusterError },
}

/// Totals for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Documents in committed batches.
    pub total_ingested: u64,
    pub lines_read: u64,
    pub records_skipped: u64,
    pub batches_committed: u64,
    pub batches_failed: u64,
    pub documents_dropped: u64,
    /// Whether the run had to create the collection first.
    pub collection_created: bool,
}

/// Drives one ingestion run against one collection.
pub struct Ingestor {
    provisioner: Provisioner,
    batch_size: usize,
    reporter: Box<dyn IngestProgressReporter>,
    phase: IngestPhase,
}

impl Ingestor {
    pub fn new(provisioner: Provisioner, batch_size: usize) -> Self {
        Self {
            provisioner,
            batch_size: batch_size.max(1),
            reporter: Box::new(NoProgress),
            phase: IngestPhase::Provisioning,
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn IngestProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn phase(&self) -> IngestPhase {
        self.phase
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn client(&self) -> &Arc<dyn ClusterClient> {
        self.provisioner.client()
    }

    fn collection(&self) -> &str {
        self.provisioner.collection()
    }

    fn enter(&mut self, phase: IngestPhase) {
        debug!(from = ?self.phase, to = ?phase, "Ingest phase change");
        self.phase = phase;
    }

    /// Ingest a JSON Lines file.
    ///
    /// The file is opened before the collection is provisioned, so a wrong
    /// path never leaves a freshly created collection behind.
    pub async fn run(&mut self, path: &Path) -> Result<IngestReport, IngestError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(source) => {
                self.enter(IngestPhase::FatalAbort);
                return Err(IngestError::InputUnreadable {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        self.ingest_reader(BufReader::new(file), path).await
    }

    /// Ingest from any buffered reader. `source` names the input in errors.
    pub async fn ingest_reader<R: BufRead>(
        &mut self,
        reader: R,
        source: &Path,
    ) -> Result<IngestReport, IngestError> {
        self.enter(IngestPhase::Provisioning);
        let collection_created = match self.ensure_collection().await {
            Ok(created) => created,
            Err(e) => {
                self.enter(IngestPhase::FatalAbort);
                return Err(e.into());
            }
        };

        let mut report = IngestReport {
            collection_created,
            ..IngestReport::default()
        };

        self.enter(IngestPhase::Streaming);
        if let Err(e) = self.stream(reader, source, &mut report).await {
            self.enter(IngestPhase::FatalAbort);
            error!(
                error = %e,
                committed = report.total_ingested,
                "Ingestion aborted; committed batches remain in the collection"
            );
            return Err(e);
        }

        self.enter(IngestPhase::Done);
        self.reporter.report(IngestProgressEvent::Finished {
            collection: self.collection().to_string(),
            total: report.total_ingested,
        });
        info!(
            collection = %self.collection(),
            total = report.total_ingested,
            skipped = report.records_skipped,
            failed_batches = report.batches_failed,
            "Ingestion complete"
        );
        Ok(report)
    }

    /// Returns `true` when the collection had to be created.
    async fn ensure_collection(&self) -> Result<bool, ProvisionError> {
        if self.provisioner.exists().await? {
            return Ok(false);
        }
        info!(collection = %self.collection(), "Collection does not exist; creating");
        let outcome = self.provisioner.create().await?;
        Ok(matches!(outcome, CreateOutcome::Created { .. }))
    }

    async fn stream<R: BufRead>(
        &mut self,
        mut reader: R,
        source: &Path,
        report: &mut IngestReport,
    ) -> Result<(), IngestError> {
        let mut batch = Batch::new(self.batch_size);
        let mut line = Vec::new();

        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .map_err(|source_err| IngestError::InputUnreadable {
                    path: source.to_path_buf(),
                    source: source_err,
                })?;
            if n == 0 {
                break;
            }
            report.lines_read += 1;

            match process_line(&line) {
                RecordOutcome::Blank => {}
                RecordOutcome::Skipped(reason) => {
                    report.records_skipped += 1;
                    warn!(line = report.lines_read, reason = %reason, "Skipping record");
                }
                RecordOutcome::Accepted(doc) => {
                    if batch.push(doc) {
                        self.flush(&mut batch, report).await;
                    }
                }
            }
        }

        self.enter(IngestPhase::Draining);
        if !batch.is_empty() {
            self.flush(&mut batch, report).await;
        }
        Ok(())
    }

    /// Submit and empty the batch, folding the outcome into the report.
    async fn flush(&self, batch: &mut Batch, report: &mut IngestReport) {
        let docs = batch.take();
        match self.submit(&docs).await {
            BatchOutcome::Committed(n) => {
                report.total_ingested += n as u64;
                report.batches_committed += 1;
                self.reporter.report(IngestProgressEvent::Committed {
                    collection: self.collection().to_string(),
                    total: report.total_ingested,
                });
            }
            BatchOutcome::Failed { dropped, .. } => {
                report.batches_failed += 1;
                report.documents_dropped += dropped as u64;
            }
        }
    }

    /// Write one batch with an immediate commit.
    pub async fn submit(&self, docs: &[TargetDocument]) -> BatchOutcome {
        match self
            .client()
            .submit_documents(self.collection(), docs, true)
            .await
        {
            Ok(()) => {
                debug!(count = docs.len(), "Batch committed");
                BatchOutcome::Committed(docs.len())
            }
            Err(reason) => {
                warn!(
                    error = %reason,
                    count = docs.len(),
                    first_id = docs.first().map(|d| d.id),
                    last_id = docs.last().map(|d| d.id),
                    "Error ingesting batch; documents dropped"
                );
                BatchOutcome::Failed {
                    dropped: docs.len(),
                    reason,
                }
            }
        }
    }
}

/// `citegraph ingest`: provision if needed, stream `input`, print a summary.
pub async fn run_ingest(
    cfg: &Config,
    client: Arc<dyn ClusterClient>,
    input: &Path,
    batch_size: Option<usize>,
    progress: ProgressMode,
) -> anyhow::Result<IngestReport> {
    let batch_size = batch_size.unwrap_or(cfg.ingest.batch_size);
    if batch_size == 0 {
        anyhow::bail!("--batch-size must be > 0");
    }

    let provisioner = Provisioner::new(client, cfg.collection.spec());
    let mut ingestor = Ingestor::new(provisioner, batch_size).with_reporter(progress.reporter());

    println!(
        "Ingesting records from {} in batches of {}...",
        input.display(),
        ingestor.batch_size()
    );
    let report = ingestor.run(input).await?;
    print_summary(&report);
    Ok(report)
}

pub fn print_summary(report: &IngestReport) {
    println!(
        "Completed ingestion of {} records",
        format_number(report.total_ingested)
    );
    println!("  lines read:        {}", format_number(report.lines_read));
    println!("  skipped records:   {}", format_number(report.records_skipped));
    println!("  batches committed: {}", format_number(report.batches_committed));
    println!("  failed batches:    {}", format_number(report.batches_failed));
    println!("  dropped documents: {}", format_number(report.documents_dropped));
}
