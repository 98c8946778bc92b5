//! Bounded document buffer used by the ingestor.

use crate::record::TargetDocument;

/// Ordered buffer of documents awaiting a single submission.
///
/// The buffer never grows past its capacity: [`push`](Batch::push) reports
/// when the capacity is reached and the caller must [`take`](Batch::take)
/// the contents before pushing again.
#[derive(Debug)]
pub struct Batch {
    docs: Vec<TargetDocument>,
    capacity: usize,
}

impl Batch {
    /// Create an empty batch. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            docs: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a document. Returns `true` when the batch is now full.
    pub fn push(&mut self, doc: TargetDocument) -> bool {
        debug_assert!(self.docs.len() < self.capacity, "push into a full batch");
        self.docs.push(doc);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.docs.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Move the buffered documents out, leaving the batch empty and reusable.
    pub fn take(&mut self) -> Vec<TargetDocument> {
        std::mem::replace(&mut self.docs, Vec::with_capacity(self.capacity))
    }
}
