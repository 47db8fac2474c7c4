//! Terminal download snapshots handed to completion callbacks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Terminal state of a download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownloadState {
    Completed,
    Interrupted,
    NotAvailable,
}

/// Prints the serde name, e.g. `not-available`
impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.serialize(f)
    }
}

/// Immutable snapshot of a finished download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResult {
    pub path: PathBuf,
    pub url: String,
    pub mime_type: Option<String>,
    pub filename: String,
    pub size: u64,
    pub state: DownloadState,
    pub last_modified: Option<String>,
}

impl DownloadResult {
    /// Result for a download that never reached a transfer
    pub fn not_available(path: PathBuf, url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            path,
            url: url.into(),
            mime_type: None,
            filename: filename.into(),
            size: 0,
            state: DownloadState::NotAvailable,
            last_modified: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == DownloadState::Completed
    }

    /// Parse the `Last-Modified` HTTP date, if any
    pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
        self.last_modified
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc2822(raw.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> DownloadResult {
        DownloadResult {
            path: PathBuf::from("/tmp/a.zip"),
            url: "https://x/a.zip".to_string(),
            mime_type: Some("application/zip".to_string()),
            filename: "a.zip".to_string(),
            size: 1000,
            state: DownloadState::Completed,
            last_modified: Some("Wed, 21 Oct 2015 07:28:00 GMT".to_string()),
        }
    }

    #[test]
    fn test_state_serializes_kebab_case() {
        let json = serde_json::to_string(&DownloadState::NotAvailable).unwrap();
        assert_eq!(json, "\"not-available\"");
        assert_eq!(DownloadState::Interrupted.to_string(), "interrupted");
    }

    #[test]
    fn test_display_matches_serialized_name() {
        for state in [
            DownloadState::Completed,
            DownloadState::Interrupted,
            DownloadState::NotAvailable,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state));
        }
        assert_eq!(DownloadState::NotAvailable.to_string(), "not-available");
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["mimeType"], "application/zip");
        assert_eq!(value["lastModified"], "Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(value["state"], "completed");
    }

    #[test]
    fn test_last_modified_parses_http_date() {
        let parsed = sample().last_modified_at().unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap());
    }

    #[test]
    fn test_last_modified_garbage_is_none() {
        let mut result = sample();
        result.last_modified = Some("yesterday".to_string());
        assert!(result.last_modified_at().is_none());
    }

    #[test]
    fn test_not_available_has_zero_size() {
        let result = DownloadResult::not_available(PathBuf::from("/tmp/b"), "https://x/b", "b");
        assert_eq!(result.size, 0);
        assert_eq!(result.state, DownloadState::NotAvailable);
        assert!(!result.is_completed());
    }
}
