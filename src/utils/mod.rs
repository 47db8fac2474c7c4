//! Utility modules for error handling, configuration and platform lookups

pub mod config;
pub mod error;
pub mod platform;

// Re-export for convenience
pub use config::ManagerSettings;
pub use error::{DlError, FailedDownload};
pub use platform::default_download_dir;
