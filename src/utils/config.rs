//! Download manager configuration

use crate::utils::error::DlError;
use crate::utils::platform;
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MAX_REDIRECTS: usize = 20;
pub const DEFAULT_USER_AGENT: &str = concat!("dlqueue/", env!("CARGO_PKG_VERSION"));

/// Manager settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Folder used when a download does not name its own destination
    pub download_folder: PathBuf,

    /// Redirect hops the probe follows before giving up
    pub max_redirects: usize,

    /// User agent sent with probe and transfer requests
    pub user_agent: String,

    /// Upper bound on in-flight items of one bulk batch; `None` issues every item at once
    pub bulk_concurrency: Option<usize>,

    /// Transport connect timeout in seconds
    pub connect_timeout_secs: Option<u64>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            download_folder: platform::default_download_dir(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            bulk_concurrency: None,
            connect_timeout_secs: None,
        }
    }
}

impl ManagerSettings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, DlError> {
        let content = std::fs::read_to_string(path)?;
        let settings: ManagerSettings = serde_json::from_str(&content)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings.validated())
    }

    /// Write settings as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), DlError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Enforce sane minimums and make the download folder absolute
    pub fn validated(mut self) -> Self {
        if self.max_redirects == 0 {
            self.max_redirects = 1;
        }
        if let Some(0) = self.bulk_concurrency {
            self.bulk_concurrency = Some(1);
        }
        self.download_folder = absolute_folder(&self.download_folder);
        self
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    /// Build the transfer client shared by the built-in host
    pub fn http_client(&self) -> Result<reqwest::Client, DlError> {
        let mut builder = reqwest::Client::builder().user_agent(self.user_agent.as_str());
        if let Some(timeout) = self.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

/// Resolve a possibly relative folder against the working directory
pub fn absolute_folder(folder: &Path) -> PathBuf {
    folder
        .absolutize()
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| folder.to_path_buf())
}
