//! Built-in host performing transfers with reqwest

use super::{DownloadHost, DownloadItem, HostEvent, HostEvents, ItemId, ItemState, RequestId, WindowId};
use crate::downloader::resolver::filename_from_url;
use crate::downloader::resume::ResumeRequest;
use crate::utils::error::DlError;
use futures::stream::StreamExt;
use parking_lot::Mutex;
use reqwest::header::{CONTENT_TYPE, IF_RANGE, LAST_MODIFIED, RANGE};
use reqwest::{Client, Response, StatusCode};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

/// Go signals sent from the dispatcher to a waiting transfer
#[derive(Debug, Clone, Default)]
struct Control {
    save_path: Option<PathBuf>,
    resumed: bool,
}

struct ItemShared {
    id: ItemId,
    url: String,
    filename: String,
    mime_type: Option<String>,
    last_modified: Option<String>,
    total_bytes: AtomicU64,
    received_bytes: AtomicU64,
    state: Mutex<ItemState>,
    save_path: Mutex<Option<PathBuf>>,
}

impl ItemShared {
    fn set_state(&self, state: ItemState) {
        *self.state.lock() = state;
    }
}

/// Item handle given to the dispatcher. Dropping every handle before a save
/// path (or resume) arrives abandons the transfer.
pub struct HttpItem {
    shared: Arc<ItemShared>,
    control: watch::Sender<Control>,
}

impl DownloadItem for HttpItem {
    fn id(&self) -> ItemId {
        self.shared.id
    }

    fn filename(&self) -> String {
        self.shared.filename.clone()
    }

    fn total_bytes(&self) -> u64 {
        self.shared.total_bytes.load(Ordering::Relaxed)
    }

    fn received_bytes(&self) -> u64 {
        self.shared.received_bytes.load(Ordering::Relaxed)
    }

    fn state(&self) -> ItemState {
        *self.shared.state.lock()
    }

    fn save_path(&self) -> Option<PathBuf> {
        self.shared.save_path.lock().clone()
    }

    fn url(&self) -> String {
        self.shared.url.clone()
    }

    fn mime_type(&self) -> Option<String> {
        self.shared.mime_type.clone()
    }

    fn last_modified(&self) -> Option<String> {
        self.shared.last_modified.clone()
    }

    fn set_save_path(&self, path: &Path) {
        *self.shared.save_path.lock() = Some(path.to_path_buf());
        self.control
            .send_modify(|c| c.save_path = Some(path.to_path_buf()));
    }

    fn resume(&self) {
        self.control.send_modify(|c| c.resumed = true);
    }
}

/// Host that streams transfers straight to disk
#[derive(Clone)]
pub struct HttpHost {
    client: Client,
    events: HostEvents,
}

impl HttpHost {
    pub fn new(client: Client, events: HostEvents) -> Self {
        Self { client, events }
    }
}

impl DownloadHost for HttpHost {
    fn download_url(&self, window: WindowId, request: RequestId, url: Url) {
        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            run_fresh(client, events, window, request, url).await;
        });
    }

    fn create_interrupted_download(
        &self,
        window: WindowId,
        request: RequestId,
        resume: ResumeRequest,
    ) {
        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            run_resume(client, events, window, request, resume).await;
        });
    }
}

fn header_string(response: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Create the item, announce it and hand back the receiver for go signals
fn announce(
    events: &HostEvents,
    window: WindowId,
    request: RequestId,
    shared: ItemShared,
) -> (Arc<ItemShared>, watch::Receiver<Control>) {
    let shared = Arc::new(shared);
    let (control, rx) = watch::channel(Control::default());
    let item = Arc::new(HttpItem {
        shared: Arc::clone(&shared),
        control,
    });

    events.send(HostEvent::WillDownload {
        window,
        request: Some(request),
        item,
    });
    (shared, rx)
}

async fn run_fresh(
    client: Client,
    events: HostEvents,
    window: WindowId,
    request: RequestId,
    url: Url,
) {
    let response = client.get(url.clone()).send().await;

    let shared = match &response {
        Ok(resp) => ItemShared {
            id: ItemId::next(),
            url: resp.url().to_string(),
            filename: filename_from_url(resp.url()),
            mime_type: header_string(resp, CONTENT_TYPE),
            last_modified: header_string(resp, LAST_MODIFIED),
            total_bytes: AtomicU64::new(resp.content_length().unwrap_or(0)),
            received_bytes: AtomicU64::new(0),
            state: Mutex::new(ItemState::Progressing),
            save_path: Mutex::new(None),
        },
        Err(_) => ItemShared {
            id: ItemId::next(),
            url: url.to_string(),
            filename: filename_from_url(&url),
            mime_type: None,
            last_modified: None,
            total_bytes: AtomicU64::new(0),
            received_bytes: AtomicU64::new(0),
            state: Mutex::new(ItemState::Progressing),
            save_path: Mutex::new(None),
        },
    };

    let (shared, mut rx) = announce(&events, window, request, shared);
    let path = match rx.wait_for(|c| c.save_path.is_some()).await {
        Ok(control) => control.save_path.clone(),
        Err(_) => None,
    };
    let Some(path) = path else {
        debug!("Item {} was not claimed, dropping transfer", shared.filename);
        return;
    };

    let result = match response {
        Ok(resp) if resp.status().is_success() => {
            stream_to_file(&shared, &events, resp, &path, false).await
        }
        Ok(resp) => {
            warn!("Transfer of {} answered {}", shared.url, resp.status());
            Err(DlError::Interrupted {
                filename: shared.filename.clone(),
            })
        }
        Err(e) => Err(DlError::Transport(e)),
    };
    finish(&shared, &events, result);
}

async fn run_resume(
    client: Client,
    events: HostEvents,
    window: WindowId,
    request: RequestId,
    resume: ResumeRequest,
) {
    let filename = resume
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let shared = ItemShared {
        id: ItemId::next(),
        url: resume.url().unwrap_or_default().to_string(),
        filename,
        mime_type: None,
        last_modified: resume.last_modified.clone(),
        total_bytes: AtomicU64::new(resume.length),
        received_bytes: AtomicU64::new(resume.offset),
        state: Mutex::new(ItemState::Interrupted),
        save_path: Mutex::new(Some(resume.path.clone())),
    };

    let (shared, mut rx) = announce(&events, window, request, shared);
    let path = match rx.wait_for(|c| c.resumed).await {
        Ok(control) => control
            .save_path
            .clone()
            .unwrap_or_else(|| resume.path.clone()),
        Err(_) => {
            debug!("Interrupted item {} was never resumed", shared.filename);
            return;
        }
    };
    shared.set_state(ItemState::Progressing);

    let result = fetch_remaining(&client, &shared, &events, &resume, &path).await;
    finish(&shared, &events, result);
}

async fn fetch_remaining(
    client: &Client,
    shared: &ItemShared,
    events: &HostEvents,
    resume: &ResumeRequest,
    path: &Path,
) -> Result<(), DlError> {
    let url = resume
        .url()
        .ok_or_else(|| DlError::InvalidUrl("empty url chain".to_string()))?;

    let mut request = client
        .get(url)
        .header(RANGE, format!("bytes={}-", resume.offset));
    if let Some(last_modified) = &resume.last_modified {
        request = request.header(IF_RANGE, last_modified.as_str());
    }
    let response = request.send().await?;

    match response.status() {
        StatusCode::PARTIAL_CONTENT => {
            info!("Resuming {} at byte {}", shared.filename, resume.offset);
            stream_to_file(shared, events, response, path, true).await
        }
        status if status.is_success() => {
            info!(
                "Server ignored range for {}, restarting from zero",
                shared.filename
            );
            shared.received_bytes.store(0, Ordering::Relaxed);
            if let Some(len) = response.content_length() {
                shared.total_bytes.store(len, Ordering::Relaxed);
            }
            stream_to_file(shared, events, response, path, false).await
        }
        status => {
            warn!("Resume of {} answered {}", shared.filename, status);
            Err(DlError::Interrupted {
                filename: shared.filename.clone(),
            })
        }
    }
}

async fn stream_to_file(
    shared: &ItemShared,
    events: &HostEvents,
    response: Response,
    path: &Path,
    append: bool,
) -> Result<(), DlError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut file = if append {
        OpenOptions::new().append(true).create(true).open(path).await?
    } else {
        File::create(path).await?
    };

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        shared
            .received_bytes
            .fetch_add(chunk.len() as u64, Ordering::Relaxed);
        events.send(HostEvent::Updated { item: shared.id });
    }
    file.flush().await?;

    let total = shared.total_bytes.load(Ordering::Relaxed);
    let received = shared.received_bytes.load(Ordering::Relaxed);
    if total > 0 && received < total {
        return Err(DlError::Interrupted {
            filename: shared.filename.clone(),
        });
    }
    Ok(())
}

fn finish(shared: &ItemShared, events: &HostEvents, result: Result<(), DlError>) {
    let state = match result {
        Ok(()) => ItemState::Completed,
        Err(e) => {
            warn!("Transfer of {} stopped: {}", shared.filename, e);
            ItemState::Interrupted
        }
    };
    shared.set_state(state);
    events.send(HostEvent::Done {
        item: shared.id,
        state,
    });
}
