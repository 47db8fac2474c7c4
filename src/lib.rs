//! dlqueue library
//!
//! Binds a host's download events to a small queue: probes redirects,
//! resumes partial files by range, correlates completions with the request
//! that issued them and aggregates bulk batches.

pub mod backend;
pub mod downloader;
pub mod host;
pub mod queue;
pub mod utils;

// Re-export main types for easier use
pub use backend::{BulkItem, BulkOptions, DownloadManager, DownloadOptions, RegisterOptions};
pub use downloader::{DownloadProgress, DownloadResult, DownloadState, Progress};
pub use host::{DownloadHost, DownloadItem, HeadlessWindow, HttpHost, Window, WindowId};
pub use queue::BulkOutcome;
pub use utils::{DlError, FailedDownload, ManagerSettings};
