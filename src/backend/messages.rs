use crate::downloader::{DownloadProgress, ProbeResponse};
use crate::host::{DownloadItem, RequestId, Window, WindowId};
use crate::queue::{BulkCallback, Completion, CompletionCallback, ProgressCallback};
use crate::utils::error::DlError;
use std::path::PathBuf;
use std::sync::Arc;

/// Options for [`DownloadManager::register`](super::DownloadManager::register)
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Replaces the configured default download folder
    pub download_folder: Option<PathBuf>,
}

/// A single download request
pub struct DownloadOptions {
    pub url: String,
    /// Folder override; empty or `None` uses the default download folder
    pub path: Option<PathBuf>,
    pub on_progress: Option<ProgressCallback>,
}

impl DownloadOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: None,
            on_progress: None,
        }
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(DownloadProgress, &dyn DownloadItem) + Send + 'static,
    {
        self.on_progress = Some(Box::new(f));
        self
    }
}

/// One entry of a bulk batch
pub struct BulkItem {
    pub url: String,
    pub path: Option<PathBuf>,
    pub on_progress: Option<ProgressCallback>,
    pub callback: Option<CompletionCallback>,
}

impl BulkItem {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: None,
            on_progress: None,
            callback: None,
        }
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(DownloadProgress, &dyn DownloadItem) + Send + 'static,
    {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn callback<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Option<DlError>, crate::downloader::DownloadResult) + Send + 'static,
    {
        self.callback = Some(Box::new(f));
        self
    }
}

/// A bulk batch request
#[derive(Default)]
pub struct BulkOptions {
    pub downloads: Vec<BulkItem>,
    /// Folder for items that do not name their own
    pub path: Option<PathBuf>,
}

impl BulkOptions {
    pub fn new(downloads: Vec<BulkItem>) -> Self {
        Self {
            downloads,
            path: None,
        }
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Commands sent from manager handles to the dispatcher
pub(crate) enum Command {
    Register(RegisterOptions),
    WindowCreated(Arc<dyn Window>),
    WindowFocused(WindowId),
    WindowDestroyed(WindowId),
    Download {
        options: DownloadOptions,
        completion: Completion,
    },
    BulkDownload {
        options: BulkOptions,
        callback: BulkCallback,
    },
    Shutdown,
}

/// Result of a probe task, posted back into the dispatcher loop. The
/// request's callbacks stay with the dispatcher while the probe runs.
pub(crate) struct ProbeOutcome {
    pub request: RequestId,
    pub probe: Result<ProbeResponse, DlError>,
    /// Size of the destination file when the probe succeeded and it exists
    pub on_disk: Option<u64>,
}
