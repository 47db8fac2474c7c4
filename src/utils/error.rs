//! Error handling for dlqueue

use crate::downloader::DownloadResult;
use thiserror::Error;

/// Main error type for dlqueue
#[derive(Debug, Error)]
pub enum DlError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Too many redirects while resolving {url} (limit {limit})")]
    TooManyRedirects { url: String, limit: usize },

    #[error("download for {url} was not found. [StatusCode] = {status}")]
    NotFound { url: String, status: u16 },

    #[error("The download of {filename} was interrupted")]
    Interrupted { filename: String },

    #[error("{failed} downloads failed")]
    Aggregate { failed: usize, total: usize },

    #[error("No live window is available to route the download")]
    NoWindow,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Download manager has shut down")]
    ManagerClosed,
}

impl DlError {
    /// Whether re-invoking the download may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, DlError::Interrupted { .. } | DlError::Transport(_))
    }
}

/// A failed download together with the terminal result it produced
#[derive(Debug, Error)]
#[error("{error}")]
pub struct FailedDownload {
    #[source]
    pub error: DlError,
    pub result: DownloadResult,
}
