//! Seams to the host that owns windows and performs transfers
//!
//! The dispatcher never talks to the network for a transfer itself. It asks a
//! [`DownloadHost`] to start one and later learns about it through
//! [`HostEvent`]s: a `WillDownload` announcing the item handle, `Updated`
//! ticks while bytes arrive, and a final `Done`.

pub mod http;
pub mod window;

use crate::downloader::progress::ProgressBar;
use crate::downloader::resume::ResumeRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub use http::HttpHost;
pub use window::{HeadlessWindow, WindowRegistry};

/// Identity of an application window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// Identity of a host download item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u64);

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

impl ItemId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        Self(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identifier minted when a download is issued and carried through the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State reported by a host item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemState {
    Progressing,
    Completed,
    Interrupted,
    Cancelled,
}

/// Handle to a transfer owned by the host
pub trait DownloadItem: Send + Sync {
    fn id(&self) -> ItemId;
    fn filename(&self) -> String;
    /// Zero when the host does not know the size
    fn total_bytes(&self) -> u64;
    fn received_bytes(&self) -> u64;
    fn state(&self) -> ItemState;
    fn save_path(&self) -> Option<PathBuf>;
    fn url(&self) -> String;
    fn mime_type(&self) -> Option<String>;
    fn last_modified(&self) -> Option<String>;

    fn set_save_path(&self, path: &Path);
    fn resume(&self);
}

/// Application window that owns downloads
pub trait Window: Send + Sync {
    fn id(&self) -> WindowId;
    fn is_destroyed(&self) -> bool;
    fn set_progress_bar(&self, progress: ProgressBar);
}

/// Dock or taskbar affordance for finished downloads
pub trait Dock: Send + Sync {
    fn download_finished(&self, path: &Path);
}

/// Used where the desktop has no dock
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDock;

impl Dock for NoDock {
    fn download_finished(&self, _path: &Path) {}
}

/// Transfer capability of the host. Both calls return immediately; the
/// outcome arrives as [`HostEvent`]s.
pub trait DownloadHost: Send + Sync {
    fn download_url(&self, window: WindowId, request: RequestId, url: url::Url);

    fn create_interrupted_download(
        &self,
        window: WindowId,
        request: RequestId,
        resume: ResumeRequest,
    );
}

/// Events a host reports about its items
pub enum HostEvent {
    WillDownload {
        window: WindowId,
        /// `None` when the host cannot carry the request id
        request: Option<RequestId>,
        item: Arc<dyn DownloadItem>,
    },
    Updated {
        item: ItemId,
    },
    Done {
        item: ItemId,
        state: ItemState,
    },
}

impl fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostEvent::WillDownload {
                window,
                request,
                item,
            } => f
                .debug_struct("WillDownload")
                .field("window", window)
                .field("request", request)
                .field("filename", &item.filename())
                .finish(),
            HostEvent::Updated { item } => f.debug_struct("Updated").field("item", item).finish(),
            HostEvent::Done { item, state } => f
                .debug_struct("Done")
                .field("item", item)
                .field("state", state)
                .finish(),
        }
    }
}

/// Channel hosts use to report events to the dispatcher
#[derive(Debug, Clone)]
pub struct HostEvents {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl HostEvents {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns false once the dispatcher is gone
    pub fn send(&self, event: HostEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}
