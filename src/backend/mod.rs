pub mod actor;
pub mod manager;
pub mod messages;

pub use manager::{DownloadManager, DownloadManagerBuilder};
pub use messages::{BulkItem, BulkOptions, DownloadOptions, RegisterOptions};
