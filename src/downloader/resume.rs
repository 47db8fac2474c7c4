//! Resume-by-range decision for partially downloaded files

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// What to do with a destination path before transferring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDecision {
    /// Nothing on disk, start from byte zero
    Fresh,
    /// File already holds at least the server's length
    Skip { size: u64 },
    /// Partial file, continue from `offset`
    Resume { offset: u64 },
}

/// Decide between skip, resume and fresh.
///
/// A missing server length counts as zero, so any existing file is treated
/// as complete.
pub fn decide(bytes_on_disk: Option<u64>, server_len: Option<u64>) -> ResumeDecision {
    let Some(size) = bytes_on_disk else {
        return ResumeDecision::Fresh;
    };

    let server_len = server_len.unwrap_or(0);
    if size >= server_len {
        ResumeDecision::Skip { size }
    } else {
        ResumeDecision::Resume { offset: size }
    }
}

/// Size of the file at `path`, or `None` when there is no regular file
pub async fn probe_disk(path: &Path) -> Option<u64> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Some(meta.len()),
        Ok(_) => {
            debug!("{:?} exists but is not a regular file", path);
            None
        }
        Err(_) => None,
    }
}

/// How the probe status gates the download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVerdict {
    /// 404 or 410: terminal, nothing is transferred
    NotAvailable,
    /// Go ahead; `warn` is set for statuses other than 200
    Proceed { warn: bool },
}

impl ProbeVerdict {
    pub fn from_status(status: u16) -> Self {
        match status {
            404 | 410 => ProbeVerdict::NotAvailable,
            200 => ProbeVerdict::Proceed { warn: false },
            _ => ProbeVerdict::Proceed { warn: true },
        }
    }
}

/// Seed for continuing an interrupted transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRequest {
    pub path: PathBuf,
    pub url_chain: Vec<String>,
    pub offset: u64,
    pub length: u64,
    pub last_modified: Option<String>,
}

impl ResumeRequest {
    /// The URL the transfer continues from
    pub fn url(&self) -> Option<&str> {
        self.url_chain.last().map(String::as_str)
    }
}
