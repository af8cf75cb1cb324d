//! Refresh orchestrator: decides when the pipeline runs and publishes results.
//!
//! The orchestrator owns a [`Session`] (reading cache, filter controls,
//! run bookkeeping) and reacts to four producers inside one `select!` loop:
//!
//! - the polling timer (only in [`RefreshMode::Polling`])
//! - the store's change feed (only in [`RefreshMode::Push`])
//! - commands from an [`OrchestratorHandle`] (filter changes, manual refresh)
//! - completions of spawned pipeline runs
//!
//! Runs are spawned so a slow fetch never delays the timer. Every run gets a
//! sequence number; a run that completes after a newer one has been applied
//! is discarded instead of overwriting the cache.
//!
//! In push mode a failed subscription, or a feed that errors or ends, drops
//! the orchestrator back to polling for the rest of its life.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use aquamon_core::mock::MockStore;
//! use aquamon_core::orchestrator::{Orchestrator, OrchestratorOptions};
//! use aquamon_core::pipeline::Pipeline;
//! use aquamon_core::events::RefreshEvent;
//! use aquamon_core::store::ChangeFeed;
//!
//! # async fn example() {
//! let store = Arc::new(MockStore::new());
//! let feed: Arc<dyn ChangeFeed> = store.clone();
//! let pipeline = Pipeline::new(store);
//! let (orchestrator, handle) =
//!     Orchestrator::new(pipeline, Some(feed), OrchestratorOptions::default());
//! let mut events = handle.subscribe();
//! tokio::spawn(orchestrator.run());
//!
//! while let Ok(event) = events.recv().await {
//!     if let RefreshEvent::Rendered { snapshot, .. } = event {
//!         println!("{} readings", snapshot.filtered_count);
//!     }
//! }
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use time::Date;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use aquamon_types::Reading;

use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, RefreshEvent, RefreshMode, Trigger};
use crate::pipeline::{DashboardSnapshot, FilterState, Pipeline};
use crate::store::{ChangeEvent, ChangeFeed, ChangeStream};

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Preferred refresh mode. Push falls back to polling when unavailable.
    pub mode: RefreshMode,
    /// Polling interval.
    pub poll_interval: Duration,
    /// Initial filter controls.
    pub filters: FilterState,
    /// Capacity of the event channel.
    pub event_capacity: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            mode: RefreshMode::Polling,
            poll_interval: DEFAULT_POLL_INTERVAL,
            filters: FilterState::default(),
            event_capacity: 64,
        }
    }
}

impl OrchestratorOptions {
    /// Set the preferred mode.
    #[must_use]
    pub fn mode(mut self, mode: RefreshMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the polling interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the initial filters.
    #[must_use]
    pub fn filters(mut self, filters: FilterState) -> Self {
        self.filters = filters;
        self
    }

    /// Validate the options.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::InvalidConfig(
                "event capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// State owned by one dashboard session.
#[derive(Debug, Clone)]
pub struct Session {
    cache: Vec<Reading>,
    filters: FilterState,
    mode: RefreshMode,
    next_seq: u64,
    applied_seq: u64,
}

impl Session {
    /// A session with an empty cache.
    pub fn new(filters: FilterState, mode: RefreshMode) -> Self {
        Self {
            cache: Vec::new(),
            filters,
            mode,
            next_seq: 0,
            applied_seq: 0,
        }
    }

    /// Allocate the sequence number of a new run.
    pub fn begin_run(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Store the result of run `seq`.
    ///
    /// Returns `false`, leaving the cache untouched, when a newer run has
    /// already been applied.
    pub fn complete_run(&mut self, seq: u64, readings: Vec<Reading>) -> bool {
        if seq <= self.applied_seq {
            return false;
        }
        self.applied_seq = seq;
        self.cache = readings;
        true
    }

    /// The reading cache, newest first.
    pub fn cache(&self) -> &[Reading] {
        &self.cache
    }

    /// Current filter controls.
    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    /// Current refresh mode.
    pub fn mode(&self) -> RefreshMode {
        self.mode
    }

    /// Sequence number of the last applied run (0 before any).
    pub fn applied_seq(&self) -> u64 {
        self.applied_seq
    }

    /// Render the current views.
    pub fn snapshot(&self, pipeline: &Pipeline) -> DashboardSnapshot {
        pipeline.render(&self.cache, &self.filters)
    }

    fn apply(&mut self, command: &Command) {
        match command {
            Command::SetDevice(device) => self.filters.device = device.clone(),
            Command::SetDateRange(start, end) => {
                self.filters.days.start = *start;
                self.filters.days.end = *end;
            }
            Command::SetPointCount(count) => self.filters.point_count = *count,
            Command::Refresh => {}
        }
    }
}

#[derive(Debug)]
enum Command {
    SetDevice(Option<String>),
    SetDateRange(Option<Date>, Option<Date>),
    SetPointCount(usize),
    Refresh,
}

impl Command {
    fn trigger(&self) -> Trigger {
        match self {
            Command::Refresh => Trigger::Manual,
            _ => Trigger::FilterChanged,
        }
    }
}

struct RunOutcome {
    seq: u64,
    trigger: Trigger,
    readings: Vec<Reading>,
}

/// Drives pipeline runs for one session.
pub struct Orchestrator {
    pipeline: Arc<Pipeline>,
    feed: Option<Arc<dyn ChangeFeed>>,
    options: OrchestratorOptions,
    session: Session,
    events: EventDispatcher,
    commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
    runs: JoinSet<RunOutcome>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("options", &self.options)
            .field("mode", &self.session.mode)
            .field("applied_seq", &self.session.applied_seq)
            .finish()
    }
}

/// Control surface of a running [`Orchestrator`].
///
/// Cloning is cheap. Dropping every handle stops the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<Command>,
    events: EventDispatcher,
    cancel: CancellationToken,
}

impl OrchestratorHandle {
    /// Select a device (`None` for all) and refresh.
    pub async fn set_device(&self, device: Option<String>) -> Result<()> {
        self.send(Command::SetDevice(device)).await
    }

    /// Select a day range and refresh.
    pub async fn set_date_range(&self, start: Option<Date>, end: Option<Date>) -> Result<()> {
        self.send(Command::SetDateRange(start, end)).await
    }

    /// Change the number of chart points and refresh.
    pub async fn set_point_count(&self, count: usize) -> Result<()> {
        self.send(Command::SetPointCount(count)).await
    }

    /// Run the pipeline now.
    pub async fn refresh_now(&self) -> Result<()> {
        self.send(Command::Refresh).await
    }

    /// Subscribe to refresh events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Stop the orchestrator. In-flight runs are aborted.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether [`OrchestratorHandle::shutdown`] was called.
    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }

    async fn send(&self, command: Command) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Closed);
        }
        self.commands.send(command).await.map_err(|_| Error::Closed)
    }
}

impl Orchestrator {
    /// Create an orchestrator and its handle.
    ///
    /// `feed` is only used when `options.mode` is [`RefreshMode::Push`].
    pub fn new(
        pipeline: Pipeline,
        feed: Option<Arc<dyn ChangeFeed>>,
        options: OrchestratorOptions,
    ) -> (Self, OrchestratorHandle) {
        let (tx, rx) = mpsc::channel(32);
        let events = EventDispatcher::new(options.event_capacity.max(1));
        let cancel = CancellationToken::new();

        let handle = OrchestratorHandle {
            commands: tx,
            events: events.clone(),
            cancel: cancel.clone(),
        };

        let orchestrator = Self {
            pipeline: Arc::new(pipeline),
            feed,
            session: Session::new(options.filters.clone(), options.mode),
            options,
            events,
            commands: rx,
            cancel,
            runs: JoinSet::new(),
        };

        (orchestrator, handle)
    }

    /// Read-only view of the session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run until shut down or until every handle is dropped.
    pub async fn run(mut self) {
        let mut feed: Option<ChangeStream> = None;
        let mut timer: Option<Interval> = None;

        match self.options.mode {
            RefreshMode::Push => match self.open_feed().await {
                Ok(stream) => {
                    feed = Some(stream);
                    self.set_mode(RefreshMode::Push, None);
                }
                Err(e) => {
                    warn!("Push subscription unavailable, polling instead: {}", e);
                    timer = Some(self.polling_timer());
                    self.set_mode(RefreshMode::Polling, Some(e.to_string()));
                }
            },
            RefreshMode::Polling => {
                timer = Some(self.polling_timer());
                self.set_mode(RefreshMode::Polling, None);
            }
        }

        self.spawn_run(Trigger::Startup);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Orchestrator cancelled, stopping");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(command) => {
                        debug!(?command, "Received command");
                        self.session.apply(&command);
                        self.spawn_run(command.trigger());
                    }
                    None => {
                        debug!("All handles dropped, stopping");
                        break;
                    }
                },
                _ = tick(&mut timer) => self.spawn_run(Trigger::Timer),
                change = next_change(&mut feed) => match change {
                    Some(Ok(ChangeEvent { exists })) => {
                        debug!(exists, "Store changed");
                        self.spawn_run(Trigger::Change);
                    }
                    Some(Err(e)) => {
                        warn!("Change feed failed, falling back to polling: {}", e);
                        feed = None;
                        timer = Some(self.polling_timer());
                        self.set_mode(RefreshMode::Polling, Some(e.to_string()));
                    }
                    None => {
                        warn!("Change feed closed, falling back to polling");
                        feed = None;
                        timer = Some(self.polling_timer());
                        self.set_mode(RefreshMode::Polling, Some("change feed closed".to_string()));
                    }
                },
                Some(joined) = self.runs.join_next(), if !self.runs.is_empty() => match joined {
                    Ok(outcome) => self.apply_outcome(outcome),
                    Err(e) => warn!("Pipeline run aborted: {}", e),
                },
            }
        }

        self.runs.abort_all();
    }

    /// Spawn [`Orchestrator::run`] on the current runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn open_feed(&self) -> Result<ChangeStream> {
        match &self.feed {
            Some(feed) => feed.subscribe().await,
            None => Err(Error::Subscription(
                "store does not provide a change feed".to_string(),
            )),
        }
    }

    fn polling_timer(&self) -> Interval {
        let period = self.options.poll_interval;
        // The startup run covers the first period.
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    }

    fn set_mode(&mut self, mode: RefreshMode, reason: Option<String>) {
        info!("Refresh mode: {}", mode);
        self.session.mode = mode;
        self.events.send(RefreshEvent::ModeChanged { mode, reason });
    }

    fn spawn_run(&mut self, trigger: Trigger) {
        let seq = self.session.begin_run();
        debug!(seq, ?trigger, "Starting pipeline run");
        let pipeline = Arc::clone(&self.pipeline);
        self.runs.spawn(async move {
            let readings = pipeline.load().await;
            RunOutcome {
                seq,
                trigger,
                readings,
            }
        });
    }

    fn apply_outcome(&mut self, outcome: RunOutcome) {
        let RunOutcome {
            seq,
            trigger,
            readings,
        } = outcome;

        if !self.session.complete_run(seq, readings) {
            let applied = self.session.applied_seq;
            debug!(seq, applied, "Discarding stale run");
            self.events.send(RefreshEvent::RunDiscarded { seq, applied });
            return;
        }

        let snapshot = self.session.snapshot(&self.pipeline);
        debug!(
            seq,
            ?trigger,
            cache = snapshot.cache_size,
            shown = snapshot.filtered_count,
            "Rendered"
        );
        self.events.send(RefreshEvent::Rendered {
            seq,
            trigger,
            mode: self.session.mode,
            snapshot: Box::new(snapshot),
        });
    }
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_change(feed: &mut Option<ChangeStream>) -> Option<Result<ChangeEvent>> {
    match feed {
        Some(feed) => feed.next().await,
        None => std::future::pending().await,
    }
}
