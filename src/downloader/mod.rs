//! Probe, resume decision and progress/result types

pub mod progress;
pub mod resolver;
pub mod result;
pub mod resume;

// Re-export for convenience
pub use progress::{DownloadProgress, Progress, ProgressBar};
pub use resolver::{filename_from_str, filename_from_url, parse_url, Probe, ProbeResponse, RedirectResolver};
pub use result::{DownloadResult, DownloadState};
pub use resume::{decide, probe_disk, ProbeVerdict, ResumeDecision, ResumeRequest};
