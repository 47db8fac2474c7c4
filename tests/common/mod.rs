//! Scripted host, probe and window used to drive the dispatcher without a network.
#![allow(dead_code)]

use async_trait::async_trait;
use dlqueue::downloader::{DownloadProgress, Probe, ProbeResponse, ProgressBar, ResumeRequest};
use dlqueue::host::{
    Dock, DownloadHost, DownloadItem, HostEvent, HostEvents, ItemId, ItemState, RequestId,
    Window, WindowId,
};
use dlqueue::{DlError, DownloadManager, DownloadResult, ManagerSettings, RegisterOptions};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

pub const WAIT: Duration = Duration::from_secs(5);

/// Probe answering from a table keyed by source URL
#[derive(Default)]
pub struct ScriptedProbe {
    responses: Mutex<HashMap<String, Result<ProbeResponse, String>>>,
    stalled: Mutex<HashSet<String>>,
}

impl ScriptedProbe {
    pub fn respond(&self, source: &str, response: ProbeResponse) {
        self.responses
            .lock()
            .insert(source.to_string(), Ok(response));
    }

    /// Never answer for `source`
    pub fn stall(&self, source: &str) {
        self.stalled.lock().insert(source.to_string());
    }

    pub fn fail(&self, source: &str, message: &str) {
        self.responses
            .lock()
            .insert(source.to_string(), Err(message.to_string()));
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, url: &Url) -> Result<ProbeResponse, DlError> {
        let stalled = self.stalled.lock().contains(url.as_str());
        if stalled {
            std::future::pending::<()>().await;
        }
        match self.responses.lock().get(url.as_str()) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(message)) => Err(DlError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                message.clone(),
            ))),
            None => Err(DlError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no scripted response for {}", url),
            ))),
        }
    }
}

pub fn probe_response(final_url: &str, status: u16, content_length: Option<u64>) -> ProbeResponse {
    let mut headers = HeaderMap::new();
    if let Some(len) = content_length {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/zip"));
    headers.insert(
        LAST_MODIFIED,
        HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
    );
    ProbeResponse {
        final_url: Url::parse(final_url).unwrap(),
        status,
        headers,
        redirects: Vec::new(),
    }
}

/// Calls the dispatcher made on the host
#[derive(Debug, Clone)]
pub enum HostCall {
    Download {
        window: WindowId,
        request: RequestId,
        url: Url,
    },
    Resume {
        window: WindowId,
        request: RequestId,
        resume: ResumeRequest,
    },
}

impl HostCall {
    pub fn request(&self) -> RequestId {
        match self {
            HostCall::Download { request, .. } | HostCall::Resume { request, .. } => *request,
        }
    }

    pub fn window(&self) -> WindowId {
        match self {
            HostCall::Download { window, .. } | HostCall::Resume { window, .. } => *window,
        }
    }
}

pub struct MockHost {
    calls: mpsc::UnboundedSender<HostCall>,
}

impl DownloadHost for MockHost {
    fn download_url(&self, window: WindowId, request: RequestId, url: Url) {
        let _ = self.calls.send(HostCall::Download {
            window,
            request,
            url,
        });
    }

    fn create_interrupted_download(
        &self,
        window: WindowId,
        request: RequestId,
        resume: ResumeRequest,
    ) {
        let _ = self.calls.send(HostCall::Resume {
            window,
            request,
            resume,
        });
    }
}

/// Item whose counters the test moves by hand
pub struct MockItem {
    id: ItemId,
    filename: String,
    url: String,
    total: AtomicU64,
    received: AtomicU64,
    state: Mutex<ItemState>,
    save_path: Mutex<Option<PathBuf>>,
    resumed: AtomicBool,
}

impl MockItem {
    pub fn new(filename: &str, url: &str, total: u64) -> Arc<Self> {
        Arc::new(Self {
            id: ItemId::next(),
            filename: filename.to_string(),
            url: url.to_string(),
            total: AtomicU64::new(total),
            received: AtomicU64::new(0),
            state: Mutex::new(ItemState::Progressing),
            save_path: Mutex::new(None),
            resumed: AtomicBool::new(false),
        })
    }

    pub fn interrupted(filename: &str, url: &str, total: u64, offset: u64) -> Arc<Self> {
        let item = Self::new(filename, url, total);
        *item.state.lock() = ItemState::Interrupted;
        item.received.store(offset, Ordering::SeqCst);
        item
    }

    pub fn set_received(&self, bytes: u64) {
        self.received.store(bytes, Ordering::SeqCst);
    }

    pub fn set_state(&self, state: ItemState) {
        *self.state.lock() = state;
    }

    pub fn was_resumed(&self) -> bool {
        self.resumed.load(Ordering::SeqCst)
    }
}

impl DownloadItem for MockItem {
    fn id(&self) -> ItemId {
        self.id
    }

    fn filename(&self) -> String {
        self.filename.clone()
    }

    fn total_bytes(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    fn received_bytes(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }

    fn state(&self) -> ItemState {
        *self.state.lock()
    }

    fn save_path(&self) -> Option<PathBuf> {
        self.save_path.lock().clone()
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn mime_type(&self) -> Option<String> {
        Some("application/zip".to_string())
    }

    fn last_modified(&self) -> Option<String> {
        None
    }

    fn set_save_path(&self, path: &Path) {
        *self.save_path.lock() = Some(path.to_path_buf());
    }

    fn resume(&self) {
        self.resumed.store(true, Ordering::SeqCst);
        *self.state.lock() = ItemState::Progressing;
    }
}

/// Window recording every progress bar value
pub struct RecordingWindow {
    id: WindowId,
    destroyed: AtomicBool,
    bars: Mutex<Vec<ProgressBar>>,
}

impl RecordingWindow {
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id: WindowId(id),
            destroyed: AtomicBool::new(false),
            bars: Mutex::new(Vec::new()),
        })
    }

    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    pub fn bars(&self) -> Vec<ProgressBar> {
        self.bars.lock().clone()
    }
}

impl Window for RecordingWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn set_progress_bar(&self, progress: ProgressBar) {
        self.bars.lock().push(progress);
    }
}

#[derive(Default)]
pub struct RecordingDock {
    pub finished: Mutex<Vec<PathBuf>>,
}

impl Dock for RecordingDock {
    fn download_finished(&self, path: &Path) {
        self.finished.lock().push(path.to_path_buf());
    }
}

/// Everything a dispatcher test needs
pub struct Harness {
    pub manager: DownloadManager,
    pub probe: Arc<ScriptedProbe>,
    pub events: HostEvents,
    pub calls: mpsc::UnboundedReceiver<HostCall>,
    pub window: Arc<RecordingWindow>,
    pub dock: Arc<RecordingDock>,
    pub folder: PathBuf,
}

impl Harness {
    pub fn start(folder: &Path) -> Self {
        Self::start_with(ManagerSettings {
            download_folder: folder.to_path_buf(),
            ..Default::default()
        })
    }

    pub fn start_with(settings: ManagerSettings) -> Self {
        let h = Self::start_unregistered(settings);
        h.manager.register(RegisterOptions::default());
        h.manager.window_created(h.window.clone());
        h
    }

    /// Spawned manager that has not registered nor seen any window yet
    pub fn start_unregistered(settings: ManagerSettings) -> Self {
        let folder = settings.download_folder.clone();
        let probe = Arc::new(ScriptedProbe::default());
        let dock = Arc::new(RecordingDock::default());
        let (calls_tx, calls) = mpsc::unbounded_channel();

        let mut host_events = None;
        let manager = DownloadManager::builder(settings)
            .probe(probe.clone())
            .dock(dock.clone())
            .spawn(|events| {
                host_events = Some(events);
                MockHost { calls: calls_tx }
            })
            .expect("spawn manager");

        Self {
            manager,
            probe,
            events: host_events.expect("host events"),
            calls,
            window: RecordingWindow::new(1),
            dock,
            folder,
        }
    }

    pub async fn next_call(&mut self) -> HostCall {
        timeout(WAIT, self.calls.recv())
            .await
            .expect("timed out waiting for host call")
            .expect("host call channel closed")
    }

    /// Announce an item the way a host does for a request
    pub fn will_download(&self, call: &HostCall, item: Arc<MockItem>) {
        self.events.send(HostEvent::WillDownload {
            window: call.window(),
            request: Some(call.request()),
            item,
        });
    }

    pub fn updated(&self, item: &MockItem) {
        self.events.send(HostEvent::Updated { item: item.id() });
    }

    pub fn done(&self, item: &MockItem, state: ItemState) {
        item.set_state(state);
        self.events.send(HostEvent::Done {
            item: item.id(),
            state,
        });
    }
}

/// Completion callback feeding a channel
pub fn completion_channel() -> (
    impl FnOnce(Option<DlError>, DownloadResult) + Send + 'static,
    mpsc::UnboundedReceiver<(Option<DlError>, DownloadResult)>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback = move |error: Option<DlError>, result: DownloadResult| {
        let _ = tx.send((error, result));
    };
    (callback, rx)
}

pub async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for callback")
        .expect("callback channel closed")
}

/// Progress callback recording every tick
pub fn progress_log() -> (
    impl FnMut(DownloadProgress, &dyn DownloadItem) + Send + 'static,
    Arc<Mutex<Vec<(String, DownloadProgress)>>>,
) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let callback = move |tick: DownloadProgress, item: &dyn DownloadItem| {
        sink.lock().push((item.filename(), tick));
    };
    (callback, log)
}
