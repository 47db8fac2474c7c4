//! Progress tracking for downloads

use serde::Serialize;

/// Completion of an active transfer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Progress {
    /// `received * 100 / total`; not clamped, so it may exceed 100
    Percent(f64),
    /// Total size unknown (no `content-length`, chunked transfer)
    Indeterminate,
}

impl Progress {
    pub fn from_bytes(received_bytes: u64, total_bytes: u64) -> Self {
        if total_bytes == 0 {
            return Progress::Indeterminate;
        }
        Progress::Percent(received_bytes as f64 * 100.0 / total_bytes as f64)
    }

    pub fn percent(&self) -> Option<f64> {
        match self {
            Progress::Percent(p) => Some(*p),
            Progress::Indeterminate => None,
        }
    }
}

/// Progress tick passed to progress callbacks
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DownloadProgress {
    pub received_bytes: u64,
    pub total_bytes: u64,
    pub progress: Progress,
}

impl DownloadProgress {
    pub fn new(received_bytes: u64, total_bytes: u64) -> Self {
        Self {
            received_bytes,
            total_bytes,
            progress: Progress::from_bytes(received_bytes, total_bytes),
        }
    }
}

/// Value shown in the owning window's progress indicator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressBar {
    /// Indicator removed
    Off,
    /// Fraction in `[0.0, 1.0]`
    Fraction(f64),
}

impl ProgressBar {
    /// Window bars only accept `[0, 1]`, so the fraction is clamped here
    pub fn from_progress(progress: Progress) -> Self {
        match progress {
            Progress::Percent(p) => ProgressBar::Fraction((p / 100.0).clamp(0.0, 1.0)),
            Progress::Indeterminate => ProgressBar::Off,
        }
    }
}
