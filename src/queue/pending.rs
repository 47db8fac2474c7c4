//! Pending download intents waiting for their host item

use crate::downloader::{DownloadProgress, DownloadResult};
use crate::host::{DownloadItem, RequestId};
use crate::queue::bulk::BatchId;
use crate::utils::error::DlError;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::PathBuf;
use tracing::warn;
use url::Url;

/// Called on every progress tick of an active download
pub type ProgressCallback = Box<dyn FnMut(DownloadProgress, &dyn DownloadItem) + Send>;

/// Called once with the terminal outcome of a download
pub type CompletionCallback = Box<dyn FnOnce(Option<DlError>, DownloadResult) + Send>;

/// Where a terminal outcome goes
pub enum Completion {
    Callback(CompletionCallback),
    /// Item of a bulk batch, with its optional own callback
    Batch {
        batch: BatchId,
        callback: Option<CompletionCallback>,
    },
}

impl Completion {
    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce(Option<DlError>, DownloadResult) + Send + 'static,
    {
        Completion::Callback(Box::new(f))
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Callback(_) => f.write_str("Callback"),
            Completion::Batch { batch, .. } => write!(f, "Batch({:?})", batch),
        }
    }
}

/// Issued download waiting for, then bound to, a host item
pub struct QueueItem {
    pub url: Url,
    pub filename: String,
    /// Folder the file is saved into
    pub folder: PathBuf,
    pub completion: Completion,
    pub on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for QueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueItem")
            .field("url", &self.url.as_str())
            .field("filename", &self.filename)
            .field("folder", &self.folder)
            .field("completion", &self.completion)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Pending intents keyed by request id, with a FIFO per filename for hosts
/// that only report the filename
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: HashMap<RequestId, QueueItem>,
    by_filename: HashMap<String, VecDeque<RequestId>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, item: QueueItem) -> RequestId {
        let id = RequestId::new();
        self.insert(id, item);
        id
    }

    /// Add an intent under an id the caller already minted
    pub fn insert(&mut self, id: RequestId, item: QueueItem) {
        let ids = self.by_filename.entry(item.filename.clone()).or_default();
        if !ids.is_empty() {
            warn!(
                "{} downloads named {} are now pending; filename correlation resolves them oldest first",
                ids.len() + 1,
                item.filename
            );
        }
        ids.push_back(id);
        self.items.insert(id, item);
    }

    pub fn pop(&mut self, id: RequestId) -> Option<QueueItem> {
        let item = self.items.remove(&id)?;
        if let Some(ids) = self.by_filename.get_mut(&item.filename) {
            ids.retain(|pending| *pending != id);
            if ids.is_empty() {
                self.by_filename.remove(&item.filename);
            }
        }
        Some(item)
    }

    /// Oldest pending intent with this filename
    pub fn pop_by_filename(&mut self, filename: &str) -> Option<QueueItem> {
        let ids = self.by_filename.get_mut(filename)?;
        let id = ids.pop_front();
        if ids.is_empty() {
            self.by_filename.remove(filename);
        }
        self.items.remove(&id?)
    }

    /// Remove every pending intent
    pub fn drain(&mut self) -> Vec<QueueItem> {
        self.by_filename.clear();
        self.items.drain().map(|(_, item)| item).collect()
    }

    pub fn pending_for(&self, filename: &str) -> usize {
        self.by_filename.get(filename).map_or(0, VecDeque::len)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
