use super::manager::{closed_result, reject_bulk};
use super::messages::{BulkOptions, Command, DownloadOptions, ProbeOutcome, RegisterOptions};
use crate::downloader::{
    decide, filename_from_str, parse_url, probe_disk, DownloadProgress, DownloadResult,
    DownloadState, Probe, ProbeVerdict, ProgressBar, ResumeDecision, ResumeRequest,
};
use crate::host::{
    Dock, DownloadHost, DownloadItem, HostEvent, ItemId, ItemState, RequestId, Window, WindowId,
    WindowRegistry,
};
use crate::queue::{
    BatchId, BulkBatch, BulkCallback, Completion, CompletionCallback, PendingQueue,
    ProgressCallback, QueueItem,
};
use crate::utils::config::{absolute_folder, ManagerSettings};
use crate::utils::error::DlError;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;
use tracing::{debug, error, info, warn};

/// Item bound to its pending intent
struct ActiveDownload {
    window: WindowId,
    item: Arc<dyn DownloadItem>,
    queued: QueueItem,
    path: PathBuf,
}

/// Download whose probe is still running
struct Probing {
    window: WindowId,
    source: Url,
    folder: PathBuf,
    on_progress: Option<ProgressCallback>,
    completion: Completion,
}

struct BatchState {
    batch: BulkBatch,
    waiting: VecDeque<(DownloadOptions, Option<CompletionCallback>)>,
    callback: Option<BulkCallback>,
}

/// Owns every piece of mutable download state. Runs as a single task, so
/// the pending queue is only touched from one place.
pub(crate) struct Dispatcher {
    settings: ManagerSettings,
    probe: Arc<dyn Probe>,
    host: Box<dyn DownloadHost>,
    dock: Arc<dyn Dock>,

    registered: bool,
    download_folder: PathBuf,
    windows: WindowRegistry,
    probing: HashMap<RequestId, Probing>,
    pending: PendingQueue,
    active: HashMap<ItemId, ActiveDownload>,
    batches: HashMap<BatchId, BatchState>,
    /// Batch items waiting to be issued from the loop
    ready: VecDeque<(DownloadOptions, Completion)>,
    closing: bool,

    probe_tx: mpsc::UnboundedSender<ProbeOutcome>,
}

impl Dispatcher {
    pub fn new(
        settings: ManagerSettings,
        probe: Arc<dyn Probe>,
        host: Box<dyn DownloadHost>,
        dock: Arc<dyn Dock>,
    ) -> (Self, mpsc::UnboundedReceiver<ProbeOutcome>) {
        let (probe_tx, probe_rx) = mpsc::unbounded_channel();
        let download_folder = settings.download_folder.clone();
        let dispatcher = Self {
            settings,
            probe,
            host,
            dock,
            registered: false,
            download_folder,
            windows: WindowRegistry::new(),
            probing: HashMap::new(),
            pending: PendingQueue::new(),
            active: HashMap::new(),
            batches: HashMap::new(),
            ready: VecDeque::new(),
            closing: false,
            probe_tx,
        };
        (dispatcher, probe_rx)
    }

    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut host_events: mpsc::UnboundedReceiver<HostEvent>,
        mut probes: mpsc::UnboundedReceiver<ProbeOutcome>,
    ) {
        info!("Download dispatcher started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = host_events.recv() => self.handle_host_event(event),
                Some(outcome) = probes.recv() => self.handle_probe(outcome),
            }
            self.issue_ready();
        }

        self.close(commands);
        info!("Download dispatcher stopped");
    }

    /// Start queued batch items one after another, never nested
    fn issue_ready(&mut self) {
        while let Some((options, completion)) = self.ready.pop_front() {
            self.start_download(options, completion);
        }
    }

    /// Answer every outstanding callback with `ManagerClosed`
    fn close(&mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.closing = true;
        commands.close();

        let outstanding = self.probing.len() + self.pending.len() + self.active.len();
        if outstanding > 0 {
            warn!("Dispatcher stopping with {} unfinished downloads", outstanding);
        }

        let probing: Vec<_> = self.probing.drain().map(|(_, p)| p).collect();
        for p in probing {
            let filename = filename_from_str(p.source.as_str());
            let result =
                DownloadResult::not_available(p.folder.join(&filename), p.source.as_str(), filename);
            self.complete(p.completion, Some(DlError::ManagerClosed), result);
        }

        for queued in self.pending.drain() {
            let result = DownloadResult::not_available(
                queued.folder.join(&queued.filename),
                queued.url.as_str(),
                queued.filename,
            );
            self.complete(queued.completion, Some(DlError::ManagerClosed), result);
        }

        let active: Vec<_> = self.active.drain().map(|(_, a)| a).collect();
        for active in active {
            if let Some(window) = self.live_window(active.window) {
                window.set_progress_bar(ProgressBar::Off);
            }
            let mut result = result_for(&active);
            result.state = DownloadState::Interrupted;
            self.complete(active.queued.completion, Some(DlError::ManagerClosed), result);
        }

        let batches: Vec<_> = self.batches.keys().copied().collect();
        for id in batches {
            while let Some((options, callback)) = self
                .batches
                .get_mut(&id)
                .and_then(|state| state.waiting.pop_front())
            {
                let result = closed_result(&options.url);
                self.complete(
                    Completion::Batch { batch: id, callback },
                    Some(DlError::ManagerClosed),
                    result,
                );
            }
        }

        while let Ok(command) = commands.try_recv() {
            match command {
                Command::Download {
                    options,
                    completion,
                } => self.complete(
                    completion,
                    Some(DlError::ManagerClosed),
                    closed_result(&options.url),
                ),
                Command::BulkDownload { options, callback } => reject_bulk(options, callback),
                _ => {}
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Register(options) => self.register(options),
            Command::WindowCreated(window) => {
                if self.registered {
                    debug!("Wiring downloads for {}", window.id());
                    self.windows.insert(window);
                } else {
                    debug!("{} created before register, not wired", window.id());
                }
            }
            Command::WindowFocused(id) => {
                self.windows.focus(id);
            }
            Command::WindowDestroyed(id) => {
                self.windows.remove(id);
            }
            Command::Download {
                options,
                completion,
            } => self.start_download(options, completion),
            Command::BulkDownload { options, callback } => self.start_bulk(options, callback),
            Command::Shutdown => {}
        }
    }

    fn register(&mut self, options: RegisterOptions) {
        self.registered = true;
        if let Some(folder) = options.download_folder {
            self.download_folder = absolute_folder(&folder);
        }
        info!(
            "Downloads registered, default folder {:?}",
            self.download_folder
        );
    }

    fn folder_for(&self, path: Option<PathBuf>) -> PathBuf {
        path.filter(|p| !p.as_os_str().is_empty())
            .map(|p| absolute_folder(&p))
            .unwrap_or_else(|| self.download_folder.clone())
    }

    fn start_download(&mut self, options: DownloadOptions, completion: Completion) {
        let folder = self.folder_for(options.path);

        let source = match parse_url(&options.url) {
            Ok(url) => url,
            Err(e) => {
                let filename = filename_from_str(&options.url);
                let result =
                    DownloadResult::not_available(folder.join(&filename), options.url, filename);
                self.complete(completion, Some(e), result);
                return;
            }
        };

        let Some(window) = self.windows.target() else {
            warn!("No window to route download of {}", source);
            let filename = filename_from_str(source.as_str());
            let result =
                DownloadResult::not_available(folder.join(&filename), source.as_str(), filename);
            self.complete(completion, Some(DlError::NoWindow), result);
            return;
        };

        let request = RequestId::new();
        let probe = Arc::clone(&self.probe);
        let tx = self.probe_tx.clone();
        let disk_folder = folder.clone();
        let target = source.clone();
        tokio::spawn(async move {
            let probe = probe.probe(&target).await;
            let on_disk = match &probe {
                Ok(response) => probe_disk(&disk_folder.join(response.filename())).await,
                Err(_) => None,
            };
            let _ = tx.send(ProbeOutcome {
                request,
                probe,
                on_disk,
            });
        });

        self.probing.insert(
            request,
            Probing {
                window: window.id(),
                source,
                folder,
                on_progress: options.on_progress,
                completion,
            },
        );
    }

    fn handle_probe(&mut self, outcome: ProbeOutcome) {
        let ProbeOutcome {
            request,
            probe,
            on_disk,
        } = outcome;
        let Some(Probing {
            window,
            source,
            folder,
            on_progress,
            completion,
        }) = self.probing.remove(&request)
        else {
            return;
        };

        let response = match probe {
            Ok(response) => response,
            Err(e) => {
                error!("Probe of {} failed: {}", source, e);
                let filename = filename_from_str(source.as_str());
                let result =
                    DownloadResult::not_available(folder.join(&filename), source.as_str(), filename);
                self.complete(completion, Some(e), result);
                return;
            }
        };

        let filename = response.filename();
        let path = folder.join(&filename);
        let final_url = response.final_url.clone();

        match ProbeVerdict::from_status(response.status) {
            ProbeVerdict::NotAvailable => {
                let error = DlError::NotFound {
                    url: final_url.to_string(),
                    status: response.status,
                };
                warn!("{}", error);
                let mut result = DownloadResult::not_available(path, final_url.as_str(), filename);
                result.mime_type = response.content_type();
                self.complete(completion, Some(error), result);
                return;
            }
            ProbeVerdict::Proceed { warn: true } => {
                warn!(
                    "{} returned a status code of {}, trying anyway",
                    final_url, response.status
                );
            }
            ProbeVerdict::Proceed { warn: false } => {}
        }

        let server_len = response.content_length();
        match decide(on_disk, server_len) {
            ResumeDecision::Skip { size } => {
                info!("{} verified, no download needed", filename);
                let result = DownloadResult {
                    path,
                    url: final_url.to_string(),
                    mime_type: response.content_type(),
                    filename,
                    size,
                    state: DownloadState::Completed,
                    last_modified: response.last_modified(),
                };
                self.complete(completion, None, result);
            }
            ResumeDecision::Resume { offset } => {
                info!(
                    "{} is incomplete ({} / {} bytes), resuming",
                    filename,
                    offset,
                    server_len.unwrap_or(0)
                );
                let resume = ResumeRequest {
                    path,
                    url_chain: vec![final_url.to_string()],
                    offset,
                    length: server_len.unwrap_or(0),
                    last_modified: response.last_modified(),
                };
                self.pending.insert(
                    request,
                    QueueItem {
                        url: final_url,
                        filename,
                        folder,
                        completion,
                        on_progress,
                    },
                );
                self.host.create_interrupted_download(window, request, resume);
            }
            ResumeDecision::Fresh => {
                info!("{} does not exist, downloading", filename);
                self.pending.insert(
                    request,
                    QueueItem {
                        url: final_url.clone(),
                        filename,
                        folder,
                        completion,
                        on_progress,
                    },
                );
                self.host.download_url(window, request, final_url);
            }
        }
    }

    fn handle_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::WillDownload {
                window,
                request,
                item,
            } => self.bind_item(window, request, item),
            HostEvent::Updated { item } => self.report_progress(item),
            HostEvent::Done { item, state } => self.finish_item(item, state),
        }
    }

    fn bind_item(&mut self, window: WindowId, request: Option<RequestId>, item: Arc<dyn DownloadItem>) {
        if !self.registered {
            return;
        }

        let queued = match request {
            Some(id) => self.pending.pop(id),
            None => self.pending.pop_by_filename(&item.filename()),
        };
        let Some(queued) = queued else {
            debug!("No pending download for {}, nothing to do", item.filename());
            return;
        };

        let path = queued.folder.join(&queued.filename);
        item.set_save_path(&path);
        if item.state() == ItemState::Interrupted {
            item.resume();
        }

        self.active.insert(
            item.id(),
            ActiveDownload {
                window,
                item,
                queued,
                path,
            },
        );
    }

    fn live_window(&self, id: WindowId) -> Option<&Arc<dyn Window>> {
        self.windows.get(id).filter(|w| !w.is_destroyed())
    }

    fn report_progress(&mut self, id: ItemId) {
        let Some(active) = self.active.get_mut(&id) else {
            return;
        };
        let tick = DownloadProgress::new(active.item.received_bytes(), active.item.total_bytes());

        if let Some(window) = self.windows.get(active.window).filter(|w| !w.is_destroyed()) {
            window.set_progress_bar(ProgressBar::from_progress(tick.progress));
        }
        if let Some(on_progress) = active.queued.on_progress.as_mut() {
            on_progress(tick, active.item.as_ref());
        }
    }

    fn finish_item(&mut self, id: ItemId, state: ItemState) {
        let Some(active) = self.active.remove(&id) else {
            return;
        };

        if let Some(window) = self.live_window(active.window) {
            window.set_progress_bar(ProgressBar::Off);
        }

        let filename = active.queued.filename.clone();
        let mut result = result_for(&active);

        match state {
            ItemState::Completed => {
                info!("Download of {} completed", filename);
                self.dock.download_finished(&result.path);
                self.complete(active.queued.completion, None, result);
            }
            other => {
                warn!("Download of {} ended as {:?}", filename, other);
                result.state = DownloadState::Interrupted;
                self.complete(
                    active.queued.completion,
                    Some(DlError::Interrupted { filename }),
                    result,
                );
            }
        }
    }

    fn complete(&mut self, completion: Completion, error: Option<DlError>, result: DownloadResult) {
        match completion {
            Completion::Callback(callback) => callback(error, result),
            Completion::Batch { batch, callback } => {
                let failed = error.is_some();
                if let Some(callback) = callback {
                    callback(error, result.clone());
                }
                self.record_batch(batch, result, failed);
            }
        }
    }

    fn start_bulk(&mut self, options: BulkOptions, callback: BulkCallback) {
        let BulkOptions { downloads, path } = options;
        let total = downloads.len();

        let mut batch = BulkBatch::new(total);
        if let Some(outcome) = batch.take_if_complete() {
            callback(outcome.error, outcome.finished, outcome.errors);
            return;
        }

        let mut waiting: VecDeque<_> = downloads
            .into_iter()
            .map(|dl| {
                let item_path = dl
                    .path
                    .filter(|p| !p.as_os_str().is_empty())
                    .or_else(|| path.clone());
                let options = DownloadOptions {
                    url: dl.url,
                    path: item_path,
                    on_progress: dl.on_progress,
                };
                (options, dl.callback)
            })
            .collect();

        let limit = self.settings.bulk_concurrency.unwrap_or(total).clamp(1, total);
        let first: Vec<_> = waiting.drain(..limit).collect();
        info!("Issuing {} of {} bulk downloads", first.len(), total);

        let id = BatchId::new();
        self.batches.insert(
            id,
            BatchState {
                batch,
                waiting,
                callback: Some(callback),
            },
        );
        self.ready.extend(
            first
                .into_iter()
                .map(|(options, callback)| (options, Completion::Batch { batch: id, callback })),
        );
    }

    fn record_batch(&mut self, id: BatchId, result: DownloadResult, failed: bool) {
        let Some(state) = self.batches.get_mut(&id) else {
            return;
        };

        if let Some(outcome) = state.batch.record(result, failed) {
            if let Some(callback) = self.batches.remove(&id).and_then(|s| s.callback) {
                callback(outcome.error, outcome.finished, outcome.errors);
            }
            return;
        }

        if self.closing {
            return;
        }
        if let Some((options, callback)) = state.waiting.pop_front() {
            self.ready
                .push_back((options, Completion::Batch { batch: id, callback }));
        }
    }
}

/// Snapshot of a bound item, saved where the dispatcher pointed it
fn result_for(active: &ActiveDownload) -> DownloadResult {
    let item = &active.item;
    DownloadResult {
        path: item.save_path().unwrap_or_else(|| active.path.clone()),
        url: item.url(),
        mime_type: item.mime_type(),
        filename: active.queued.filename.clone(),
        size: item.total_bytes(),
        state: DownloadState::Completed,
        last_modified: item.last_modified(),
    }
}
