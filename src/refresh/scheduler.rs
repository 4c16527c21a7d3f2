use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tokio::{
    sync::{
        mpsc::{self, Receiver, Sender, UnboundedReceiver},
        oneshot,
    },
    task::{self, JoinHandle},
    time::{self, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, error, info, instrument, warn};

use super::{FileEvent, FileWatcher, RefreshError, refresh_from};
use crate::{
    dispatch::{DispatchError, Dispatcher, Subscription},
    settings::RefreshSettings,
    snapshot_store::{ChangeSet, ReadView, Readers, RefreshEngine, StoreError},
    sources::Source,
};

const COMMAND_CAPACITY: usize = 16;

type CycleOutcome<V> = Result<ChangeSet<V>, RefreshError>;

enum Command<V> {
    Refresh { reply: oneshot::Sender<CycleOutcome<V>> },
    Shutdown,
}

/// The single writer context of a store.
///
/// Owns the [`RefreshEngine`] and runs every refresh cycle on a blocking
/// thread, since a flush may spin while it waits for readers. Cycles are
/// triggered at startup, on the configured interval, after debounced file
/// events and on [`RefreshHandle::refresh_now`].
pub struct RefreshScheduler<S: Source> {
    engine: RefreshEngine<S::Value>,
    source: Arc<S>,
    dispatcher: Dispatcher<S::Value>,
    settings: RefreshSettings,
    watch_paths: Vec<PathBuf>,
}

impl<S> RefreshScheduler<S>
where
    S: Source + 'static,
    S::Value: Clone + PartialEq + Send + Sync + 'static,
{
    /// Creates a scheduler with default refresh settings.
    pub fn new(
        engine: RefreshEngine<S::Value>,
        source: Arc<S>,
        dispatcher: Dispatcher<S::Value>,
    ) -> Self {
        Self {
            engine,
            source,
            dispatcher,
            settings: RefreshSettings::default(),
            watch_paths: Vec::new(),
        }
    }

    /// Replaces the refresh settings.
    pub fn with_settings(mut self, settings: RefreshSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Triggers a cycle whenever `path` changes, if watching is enabled in
    /// the settings. May be called once per file of a layered source.
    pub fn watch_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.watch_paths.push(path.into());
        self
    }

    /// Handle for registering readers of the store.
    pub fn readers(&self) -> Readers<S::Value> {
        self.engine.readers()
    }

    /// Starts the scheduler loop.
    ///
    /// # Errors
    /// Returns `RefreshError::Watcher` if a source file cannot be watched.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(self) -> Result<RefreshHandle<S::Value>, RefreshError> {
        let (watcher, events) = if self.settings.watch && !self.watch_paths.is_empty() {
            let (watcher, events) = start_watcher(&self.watch_paths)?;
            (Some(watcher), Some(events))
        } else {
            (None, None)
        };

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let readers = self.engine.readers();
        let dispatcher = self.dispatcher.clone();
        let shutdown_grace = self.settings.shutdown_grace();

        let worker = Worker {
            engine: Some(self.engine),
            source: self.source,
            dispatcher: self.dispatcher,
        };
        let task = tokio::spawn(run(worker, self.settings, command_rx, events, watcher));

        Ok(RefreshHandle {
            commands: command_tx,
            task,
            readers,
            dispatcher,
            shutdown_grace,
        })
    }
}

fn start_watcher(
    paths: &[PathBuf],
) -> Result<(FileWatcher, UnboundedReceiver<FileEvent>), RefreshError> {
    let watcher_error = |path: &Path, e: notify::Error| RefreshError::Watcher {
        path: path.to_path_buf(),
        details: e.to_string(),
    };

    let first = paths.first().map(PathBuf::as_path).unwrap_or(Path::new(""));
    let (mut watcher, events) = FileWatcher::new().map_err(|e| watcher_error(first, e))?;
    for path in paths {
        watcher
            .watch_file(path)
            .map_err(|e| watcher_error(path, e))?;
        info!(path = %path.display(), "watching source file");
    }

    Ok((watcher, events))
}

/// Handle to a running [`RefreshScheduler`].
pub struct RefreshHandle<V> {
    commands: Sender<Command<V>>,
    task: JoinHandle<()>,
    readers: Readers<V>,
    dispatcher: Dispatcher<V>,
    shutdown_grace: Duration,
}

impl<V> RefreshHandle<V>
where
    V: Clone + Send + 'static,
{
    /// Handle for registering readers of the store.
    pub fn readers(&self) -> Readers<V> {
        self.readers.clone()
    }

    /// Registers a new reader of the store.
    ///
    /// # Errors
    /// Returns `StoreError::ReaderLimit` if the reader registry is full.
    pub fn reader(&self) -> Result<ReadView<V>, StoreError> {
        self.readers.register()
    }

    /// Subscribes to changes whose key matches `pattern`.
    ///
    /// # Errors
    /// Returns `DispatchError::ServiceUnavailable` if the dispatcher stopped.
    pub async fn subscribe(&self, pattern: &str) -> Result<Subscription<V>, DispatchError> {
        self.dispatcher.subscribe(pattern).await
    }

    /// Runs a cycle now and returns its change-set once it is published and
    /// dispatched.
    ///
    /// # Errors
    /// Returns the cycle's error, or `RefreshError::Stopped` if the
    /// scheduler is no longer running.
    pub async fn refresh_now(&self) -> Result<ChangeSet<V>, RefreshError> {
        let (reply, outcome) = oneshot::channel();

        self.commands
            .send(Command::Refresh { reply })
            .await
            .map_err(|_| RefreshError::Stopped)?;

        outcome.await.map_err(|_| RefreshError::Stopped)?
    }

    /// Grace period configured for shutdown.
    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }

    /// Stops the scheduler after the in-flight cycle, waiting at most
    /// `grace` for it. On timeout the loop task is aborted; a flush already
    /// running on a blocking thread still runs to completion there.
    ///
    /// # Errors
    /// Returns `RefreshError::ShutdownTimeout` if the loop did not stop in
    /// time and `RefreshError::CycleAborted` if it panicked.
    pub async fn shutdown(self, grace: Duration) -> Result<(), RefreshError> {
        let Self {
            commands, mut task, ..
        } = self;

        let _ = commands.send(Command::Shutdown).await;

        match time::timeout(grace, &mut task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RefreshError::CycleAborted {
                details: e.to_string(),
            }),
            Err(_) => {
                task.abort();
                warn!(?grace, "refresh scheduler did not stop in time, aborting");
                Err(RefreshError::ShutdownTimeout { grace })
            }
        }
    }
}

struct Worker<S: Source> {
    engine: Option<RefreshEngine<S::Value>>,
    source: Arc<S>,
    dispatcher: Dispatcher<S::Value>,
}

impl<S> Worker<S>
where
    S: Source + 'static,
    S::Value: Clone + PartialEq + Send + Sync + 'static,
{
    fn is_alive(&self) -> bool {
        self.engine.is_some()
    }

    #[instrument(skip(self), fields(source = self.source.name()))]
    async fn cycle(&mut self) -> CycleOutcome<S::Value> {
        let Some(mut engine) = self.engine.take() else {
            return Err(RefreshError::Stopped);
        };
        let source = Arc::clone(&self.source);

        let joined = task::spawn_blocking(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                refresh_from(&mut engine, source.as_ref())
            }))
            .unwrap_or_else(|payload| {
                let details = panic_details(payload.as_ref());
                error!(%details, "refresh cycle panicked, served snapshot kept");
                Err(RefreshError::CyclePanicked { details })
            });
            (engine, outcome)
        })
        .await;

        let (engine, outcome) = joined.map_err(|e| {
            error!(error = %e, "refresh cycle did not complete, engine lost");
            RefreshError::CycleAborted {
                details: e.to_string(),
            }
        })?;
        self.engine = Some(engine);

        let changes = outcome?;
        debug!(
            generation = changes.generation,
            ops = changes.len(),
            "cycle published"
        );
        self.dispatcher.dispatch(changes.clone()).await?;

        Ok(changes)
    }

    async fn scheduled(&mut self, trigger: &'static str) {
        match self.cycle().await {
            Ok(changes) if !changes.is_empty() => {
                info!(trigger, generation = changes.generation, ops = changes.len(), "values refreshed");
            }
            Ok(_) => {}
            Err(e) => warn!(trigger, error = %e, "refresh cycle failed"),
        }
    }
}

async fn run<S>(
    mut worker: Worker<S>,
    settings: RefreshSettings,
    mut commands: Receiver<Command<S::Value>>,
    mut events: Option<UnboundedReceiver<FileEvent>>,
    _watcher: Option<FileWatcher>,
) where
    S: Source + 'static,
    S::Value: Clone + PartialEq + Send + Sync + 'static,
{
    worker.scheduled("startup").await;

    let mut ticker = settings.interval().map(|period| {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    let debounce = settings.debounce();
    let debounce_sleep = time::sleep(debounce);
    tokio::pin!(debounce_sleep);
    let mut file_changed = false;

    while worker.is_alive() {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Refresh { reply }) => {
                    let outcome = worker.cycle().await;
                    let _ = reply.send(outcome);
                }
                Some(Command::Shutdown) | None => break,
            },

            () = next_tick(&mut ticker) => worker.scheduled("interval").await,

            event = next_event(&mut events) => match event {
                Some(event) => {
                    debug!(path = %event.path.display(), kind = ?event.kind, "source file event");
                    file_changed = true;
                    debounce_sleep.as_mut().reset(Instant::now() + debounce);
                }
                None => events = None,
            },

            () = &mut debounce_sleep, if file_changed => {
                file_changed = false;
                worker.scheduled("file change").await;
            }
        }
    }

    info!("refresh scheduler stopped");
}

fn panic_details(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_event(events: &mut Option<UnboundedReceiver<FileEvent>>) -> Option<FileEvent> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}
