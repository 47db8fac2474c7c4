//! Cloneable handle to the download dispatcher

use super::actor::Dispatcher;
use super::messages::{BulkOptions, Command, DownloadOptions, RegisterOptions};
use crate::downloader::{filename_from_str, DownloadResult, Probe, RedirectResolver};
use crate::host::{Dock, DownloadHost, HostEvents, HttpHost, NoDock, Window, WindowId};
use crate::queue::{BulkCallback, BulkOutcome, Completion};
use crate::utils::config::ManagerSettings;
use crate::utils::error::{DlError, FailedDownload};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// Handle used by application code. Dropping every handle stops the
/// dispatcher.
#[derive(Clone)]
pub struct DownloadManager {
    tx: mpsc::UnboundedSender<Command>,
}

/// Configures and spawns a [`DownloadManager`]
pub struct DownloadManagerBuilder {
    settings: ManagerSettings,
    probe: Option<Arc<dyn Probe>>,
    dock: Option<Arc<dyn Dock>>,
}

impl DownloadManagerBuilder {
    /// Replace the HTTP redirect resolver
    pub fn probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn dock(mut self, dock: Arc<dyn Dock>) -> Self {
        self.dock = Some(dock);
        self
    }

    /// Spawn the dispatcher on the current tokio runtime. `make_host`
    /// receives the channel the host reports its events on.
    pub fn spawn<H, F>(self, make_host: F) -> Result<DownloadManager, DlError>
    where
        H: DownloadHost + 'static,
        F: FnOnce(HostEvents) -> H,
    {
        let settings = self.settings.validated();
        let probe: Arc<dyn Probe> = match self.probe {
            Some(probe) => probe,
            None => Arc::new(RedirectResolver::new(&settings)?),
        };
        let dock = self.dock.unwrap_or_else(|| Arc::new(NoDock));

        let (events, host_rx) = HostEvents::channel();
        let host = make_host(events);

        let (tx, rx) = mpsc::unbounded_channel();
        let (dispatcher, probe_rx) = Dispatcher::new(settings, probe, Box::new(host), dock);
        tokio::spawn(dispatcher.run(rx, host_rx, probe_rx));

        Ok(DownloadManager { tx })
    }

    /// Spawn with the built-in reqwest host
    pub fn spawn_http(self) -> Result<DownloadManager, DlError> {
        let client = self.settings.http_client()?;
        self.spawn(move |events| HttpHost::new(client, events))
    }
}

impl DownloadManager {
    pub fn builder(settings: ManagerSettings) -> DownloadManagerBuilder {
        DownloadManagerBuilder {
            settings,
            probe: None,
            dock: None,
        }
    }

    fn send(&self, command: Command) -> Result<(), Command> {
        self.tx.send(command).map_err(|e| e.0)
    }

    /// Enable download wiring for windows announced from now on
    pub fn register(&self, options: RegisterOptions) {
        if self.send(Command::Register(options)).is_err() {
            warn!("register called after the dispatcher stopped");
        }
    }

    pub fn window_created(&self, window: Arc<dyn Window>) {
        let _ = self.send(Command::WindowCreated(window));
    }

    pub fn window_focused(&self, id: WindowId) {
        let _ = self.send(Command::WindowFocused(id));
    }

    pub fn window_destroyed(&self, id: WindowId) {
        let _ = self.send(Command::WindowDestroyed(id));
    }

    /// Issue a download; `callback` runs once with the terminal outcome
    pub fn download<F>(&self, options: DownloadOptions, callback: F)
    where
        F: FnOnce(Option<DlError>, DownloadResult) + Send + 'static,
    {
        let command = Command::Download {
            options,
            completion: Completion::callback(callback),
        };
        if let Err(Command::Download {
            options,
            completion: Completion::Callback(callback),
        }) = self.send(command)
        {
            callback(Some(DlError::ManagerClosed), closed_result(&options.url));
        }
    }

    pub async fn download_async(
        &self,
        options: DownloadOptions,
    ) -> Result<DownloadResult, FailedDownload> {
        let url = options.url.clone();
        let (tx, rx) = oneshot::channel();
        self.download(options, move |error, result| {
            let _ = tx.send((error, result));
        });

        match rx.await {
            Ok((None, result)) => Ok(result),
            Ok((Some(error), result)) => Err(FailedDownload { error, result }),
            Err(_) => Err(FailedDownload {
                error: DlError::ManagerClosed,
                result: closed_result(&url),
            }),
        }
    }

    /// Issue every item of a batch; `callback` runs once after the last
    /// item's own callback with `(error, finished, errors)`
    pub fn bulk_download<F>(&self, options: BulkOptions, callback: F)
    where
        F: FnOnce(Option<DlError>, Vec<DownloadResult>, Vec<DownloadResult>) + Send + 'static,
    {
        let command = Command::BulkDownload {
            options,
            callback: Box::new(callback),
        };
        if let Err(Command::BulkDownload { options, callback }) = self.send(command) {
            reject_bulk(options, callback);
        }
    }

    pub async fn bulk_download_async(&self, options: BulkOptions) -> BulkOutcome {
        let (tx, rx) = oneshot::channel();
        self.bulk_download(options, move |error, finished, errors| {
            let _ = tx.send(BulkOutcome {
                error,
                finished,
                errors,
            });
        });

        rx.await.unwrap_or_else(|_| BulkOutcome {
            error: Some(DlError::ManagerClosed),
            finished: Vec::new(),
            errors: Vec::new(),
        })
    }

    pub fn shutdown(&self) {
        let _ = self.send(Command::Shutdown);
    }
}

pub(crate) fn closed_result(url: &str) -> DownloadResult {
    let filename = filename_from_str(url);
    DownloadResult::not_available(PathBuf::from(&filename), url, filename)
}

/// Fail a whole batch the dispatcher will never see, item callbacks first
pub(crate) fn reject_bulk(options: BulkOptions, callback: BulkCallback) {
    let mut errors = Vec::with_capacity(options.downloads.len());
    for dl in options.downloads {
        let result = closed_result(&dl.url);
        if let Some(item_callback) = dl.callback {
            item_callback(Some(DlError::ManagerClosed), result.clone());
        }
        errors.push(result);
    }
    callback(Some(DlError::ManagerClosed), Vec::new(), errors);
}
