//! Aggregation of bulk download batches

use crate::downloader::DownloadResult;
use crate::utils::error::DlError;
use uuid::Uuid;

/// Called once when every item of a batch reached a terminal state
pub type BulkCallback =
    Box<dyn FnOnce(Option<DlError>, Vec<DownloadResult>, Vec<DownloadResult>) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

/// Final outcome of a batch
#[derive(Debug)]
pub struct BulkOutcome {
    /// Set iff at least one item failed
    pub error: Option<DlError>,
    pub finished: Vec<DownloadResult>,
    pub errors: Vec<DownloadResult>,
}

impl BulkOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Finished and failed results of a batch in progress
#[derive(Debug)]
pub struct BulkBatch {
    expected: usize,
    finished: Vec<DownloadResult>,
    errors: Vec<DownloadResult>,
    reported: bool,
}

impl BulkBatch {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            finished: Vec::with_capacity(expected),
            errors: Vec::new(),
            reported: false,
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn recorded(&self) -> usize {
        self.finished.len() + self.errors.len()
    }

    /// Record one terminal item; returns the outcome on the last one
    pub fn record(&mut self, result: DownloadResult, failed: bool) -> Option<BulkOutcome> {
        if self.reported {
            return None;
        }
        if failed {
            self.errors.push(result);
        } else {
            self.finished.push(result);
        }
        self.take_if_complete()
    }

    /// Outcome once every item is recorded, at most once
    pub fn take_if_complete(&mut self) -> Option<BulkOutcome> {
        if self.reported || self.recorded() < self.expected {
            return None;
        }
        self.reported = true;

        let errors = std::mem::take(&mut self.errors);
        let error = (!errors.is_empty()).then(|| DlError::Aggregate {
            failed: errors.len(),
            total: self.expected,
        });
        Some(BulkOutcome {
            error,
            finished: std::mem::take(&mut self.finished),
            errors,
        })
    }
}
