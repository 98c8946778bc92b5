//! Ingestion progress reporting.
//!
//! Progress is written to **stdout** next to the final summary; diagnostics
//! go to stderr through `tracing`, so a failed batch never garbles the
//! progress line and vice versa. The human reporter rewrites a single line
//! in place after every committed batch.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// A single progress event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestProgressEvent {
    /// A batch was committed; `total` documents are ingested so far.
    Committed { collection: String, total: u64 },
    /// The input is exhausted and the run is over.
    Finished { collection: String, total: u64 },
}

/// Reports ingestion progress.
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// `Ingested 12,000 records...` rewritten in place with a carriage return.
#[derive(Default)]
pub struct InlineProgress {
    /// Set once an in-place line has been written and not yet terminated.
    line_open: AtomicBool,
}

impl InlineProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to write for `event`, if any.
    pub fn render(&self, event: &IngestProgressEvent) -> Option<String> {
        match event {
            IngestProgressEvent::Committed { total, .. } => {
                self.line_open.store(true, Ordering::Relaxed);
                Some(format!("\rIngested {} records...", format_number(*total)))
            }
            // Terminate the in-place line so the summary starts fresh.
            IngestProgressEvent::Finished { .. } => self
                .line_open
                .swap(false, Ordering::Relaxed)
                .then(|| "\n".to_string()),
        }
    }
}

impl IngestProgressReporter for InlineProgress {
    fn report(&self, event: IngestProgressEvent) {
        if let Some(text) = self.render(&event) {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(text.as_bytes());
            let _ = out.flush();
        }
    }
}

/// Machine-readable progress: one JSON object per line on stdout.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Committed { collection, total } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "phase": "streaming",
                "total": total
            }),
            IngestProgressEvent::Finished { collection, total } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "phase": "done",
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut out = std::io::stdout().lock();
            let _ = writeln!(out, "{}", line);
            let _ = out.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (in place), or JSON lines.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stdout is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stdout) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(InlineProgress::new()),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
