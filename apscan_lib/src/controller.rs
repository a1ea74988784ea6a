/** ------------------------------------------------------------
 * Scan controller: the polling cycle state machine.
 *
 *   Idle -> Scanning -> Settling -> Merging -> Idle
 *              |           |
 *              +-> Error <-+
 *
 * The controller owns the provider and the shared cache. It can be
 * stepped by hand (`run_cycle`) or moved into a background task that
 * re-arms itself (`spawn`).
 * ------------------------------------------------------------- */
use crate::cache::{AccessPointCache, SharedCache};
use crate::config::ScanConfig;
use crate::errors::{ControllerError, ScanError};
use crate::normalize::normalize;
use crate::provider::{ProviderEvent, ScanProvider};
use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const COMMAND_CHANNEL_CAPACITY: usize = 8;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ControllerState {
    Idle,
    Scanning,
    Settling,
    Merging,
    Error,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::Idle => "idle",
            ControllerState::Scanning => "scanning",
            ControllerState::Settling => "settling",
            ControllerState::Merging => "merging",
            ControllerState::Error => "error",
        };
        f.write_str(name)
    }
}

/**
 * Counters of one completed cycle
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    /// Raw records returned by the provider.
    pub records: usize,
    pub merged: usize,
    /// Records dropped by normalization (all-zero BSSID).
    pub discarded: usize,
    pub new_access_points: usize,
    pub pruned: usize,
    pub completed_at: DateTime<Utc>,
}

/**
 * Notifications to presentation consumers
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    CycleComplete(CycleReport),
    Error(ScanError),
}

/**
 * Drives scan cycles over one provider
 */
pub struct ScanController<P: ScanProvider> {
    provider: P,
    config: ScanConfig,
    cache: SharedCache,
    state: watch::Sender<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
    provider_events: broadcast::Receiver<ProviderEvent>,
    cycle: u64,
}

impl<P: ScanProvider> ScanController<P> {
    /**
     * Take ownership of an initialized provider
     */
    pub fn new(provider: P, config: ScanConfig) -> Self {
        let cache = AccessPointCache::new(config.max_history).shared();
        let provider_events = provider.subscribe();
        let (state, _) = watch::channel(ControllerState::Idle);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            provider,
            config,
            cache,
            state,
            events,
            provider_events,
            cycle: 0,
        }
    }

    pub fn state(&self) -> ControllerState {
        *self.state.borrow()
    }

    pub fn cache(&self) -> SharedCache {
        self.cache.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Completed cycles so far.
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    fn set_state(&self, next: ControllerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "controller state");
        }
    }

    fn emit(&self, event: ControllerEvent) {
        // No subscriber is not an error
        let _ = self.events.send(event);
    }

    fn fail(&self, err: ScanError) -> ControllerError {
        tracing::warn!(error = %err, "scan cycle failed");
        self.set_state(ControllerState::Error);
        self.emit(ControllerEvent::Error(err.clone()));
        ControllerError::Scan(err)
    }

    /// Drop provider events left over from an abandoned cycle.
    fn drain_provider_events(&mut self) {
        loop {
            match self.provider_events.try_recv() {
                Ok(event) => tracing::trace!(?event, "discarding stale provider event"),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    /**
     * Idle (or Error) -> Scanning -> Settling
     *
     * Rejected with `Busy` while a cycle is in progress. A failed scan
     * request moves to `Error` and is reported to subscribers.
     */
    pub fn begin_scan(&mut self) -> Result<(), ControllerError> {
        match self.state() {
            ControllerState::Idle | ControllerState::Error => {}
            busy => return Err(ControllerError::Busy(busy)),
        }

        self.drain_provider_events();
        self.set_state(ControllerState::Scanning);

        if !self.provider.scan() {
            let err = match self.provider_events.try_recv() {
                Ok(ProviderEvent::InterfaceError(err)) => err,
                _ => ScanError::ScanRequestFailed {
                    adapter: self
                        .provider
                        .adapter()
                        .map(|adapter| adapter.name.clone())
                        .unwrap_or_default(),
                },
            };
            return Err(self.fail(err));
        }

        self.set_state(ControllerState::Settling);
        Ok(())
    }

    /**
     * Settling -> Merging
     *
     * Waits for `ScanComplete`. When it does not arrive within the
     * settle timeout the results are read anyway.
     */
    pub async fn wait_settled(&mut self) -> Result<(), ControllerError> {
        let state = self.state();
        if state != ControllerState::Settling {
            return Err(ControllerError::InvalidState(state));
        }

        let timeout = self.config.settle_timeout();
        let deadline = Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.provider_events.recv()).await {
                Ok(Ok(ProviderEvent::ScanComplete)) => break,
                Ok(Ok(ProviderEvent::InterfaceError(err))) => return Err(self.fail(err)),
                Ok(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "provider events lagged");
                }
                Ok(Err(RecvError::Closed)) => {
                    tracing::warn!("provider event channel closed");
                    self.set_state(ControllerState::Error);
                    return Err(ControllerError::ProviderClosed);
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = timeout.as_millis() as u64,
                        "no scan completion before timeout, reading results anyway"
                    );
                    break;
                }
            }
        }

        self.set_state(ControllerState::Merging);
        Ok(())
    }

    /**
     * Merging -> Idle
     *
     * Reads the provider snapshot, normalizes it into the cache and prunes
     * samples that fell out of the retention window.
     */
    pub fn merge_results(&mut self) -> Result<CycleReport, ControllerError> {
        let state = self.state();
        if state != ControllerState::Merging {
            return Err(ControllerError::InvalidState(state));
        }

        let snapshot = match self.provider.network_data() {
            Ok(snapshot) => snapshot,
            Err(err) => return Err(self.fail(err)),
        };
        let now = snapshot.captured_at.unwrap_or_else(Utc::now);
        let samples: Vec<_> = snapshot
            .records
            .iter()
            .filter_map(|record| normalize(record, snapshot.connected, now))
            .collect();
        let records = snapshot.records.len();
        let discarded = records - samples.len();

        let (summary, pruned) = {
            let mut cache = self.cache.write();
            let summary = cache.merge(samples);
            // A retention reaching past the representable range keeps everything
            let cutoff = chrono::Duration::from_std(self.config.retention())
                .ok()
                .and_then(|retention| cache.newest_timestamp()?.checked_sub_signed(retention));
            let pruned = cutoff.map_or(0, |cutoff| cache.prune_older_than(cutoff));
            (summary, pruned)
        };

        self.cycle += 1;
        let report = CycleReport {
            cycle: self.cycle,
            records,
            merged: summary.samples,
            discarded,
            new_access_points: summary.new_access_points,
            pruned,
            completed_at: now,
        };
        tracing::info!(
            cycle = report.cycle,
            records,
            merged = report.merged,
            discarded,
            new = report.new_access_points,
            "scan cycle complete"
        );

        self.set_state(ControllerState::Idle);
        self.emit(ControllerEvent::CycleComplete(report.clone()));
        Ok(report)
    }

    /**
     * One full cycle: scan, settle, merge
     */
    pub async fn run_cycle(&mut self) -> Result<CycleReport, ControllerError> {
        self.begin_scan()?;
        self.wait_settled().await?;
        self.merge_results()
    }

    /// Abandon an in-progress cycle and return to Idle.
    pub fn abort_cycle(&mut self) {
        let state = self.state();
        if matches!(
            state,
            ControllerState::Scanning | ControllerState::Settling | ControllerState::Merging
        ) {
            tracing::debug!(%state, "scan cycle aborted");
            self.set_state(ControllerState::Idle);
        }
    }
}

impl<P: ScanProvider + 'static> ScanController<P> {
    /**
     * Move the controller into a background task
     *
     * The task is idle until `ScanSession::start`, then re-arms after
     * every successful cycle until stopped or a cycle fails.
     */
    pub fn spawn(self) -> ScanSession {
        let (commands, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let state = self.state.subscribe();
        let events = self.events.clone();
        let cache = self.cache.clone();
        let task = tokio::spawn(self.run(command_rx));

        ScanSession {
            commands,
            state,
            events,
            cache,
            task: Some(task),
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut running = false;
        let mut next_scan: Option<Instant> = None;

        loop {
            let command = match next_scan {
                Some(at) if running => {
                    tokio::select! {
                        command = commands.recv() => command,
                        _ = tokio::time::sleep_until(at) => {
                            next_scan = None;
                            if self.begin_scan().is_err() {
                                running = false;
                                continue;
                            }
                            if !self.drive_cycle(&mut commands, &mut running).await {
                                break;
                            }
                            next_scan = running.then(|| Instant::now() + self.config.inter_scan_delay());
                            continue;
                        }
                    }
                }
                _ => commands.recv().await,
            };

            match command {
                None => break,
                Some(Command::Stop(reply)) => {
                    running = false;
                    next_scan = None;
                    let _ = reply.send(());
                }
                Some(Command::Start(reply)) => {
                    next_scan = None;
                    let result = self.begin_scan();
                    let started = result.is_ok();
                    let _ = reply.send(result);
                    if !started {
                        running = false;
                        continue;
                    }
                    running = true;
                    if !self.drive_cycle(&mut commands, &mut running).await {
                        break;
                    }
                    next_scan = running.then(|| Instant::now() + self.config.inter_scan_delay());
                }
            }
        }

        self.abort_cycle();
        tracing::debug!("scan session ended");
    }

    /**
     * Settle and merge the cycle begun by `begin_scan`, still answering
     * commands. Returns false once the session handle is gone.
     */
    async fn drive_cycle(
        &mut self,
        commands: &mut mpsc::Receiver<Command>,
        running: &mut bool,
    ) -> bool {
        let state = self.state.subscribe();
        let settled = {
            let wait = self.wait_settled();
            tokio::pin!(wait);
            loop {
                tokio::select! {
                    result = &mut wait => break Some(result),
                    command = commands.recv() => match command {
                        Some(Command::Start(reply)) => {
                            let _ = reply.send(Err(ControllerError::Busy(*state.borrow())));
                        }
                        Some(Command::Stop(reply)) => {
                            *running = false;
                            let _ = reply.send(());
                            break None;
                        }
                        None => return false,
                    },
                }
            }
        };

        match settled {
            None => self.abort_cycle(),
            Some(Err(_)) => *running = false,
            Some(Ok(())) => {
                if self.merge_results().is_err() {
                    *running = false;
                }
            }
        }
        true
    }
}

enum Command {
    Start(oneshot::Sender<Result<(), ControllerError>>),
    Stop(oneshot::Sender<()>),
}

/**
 * Handle to a controller running in the background
 *
 * Dropping the handle tears the session down: the task is aborted and
 * the provider with its pending settling timer is dropped.
 */
pub struct ScanSession {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
    cache: SharedCache,
    task: Option<JoinHandle<()>>,
}

impl ScanSession {
    /**
     * Start periodic scanning. Resolves once the first scan request was
     * issued, with its outcome.
     */
    pub async fn start(&self) -> Result<(), ControllerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Start(reply))
            .await
            .map_err(|_| ControllerError::SessionClosed)?;
        response.await.map_err(|_| ControllerError::SessionClosed)?
    }

    /// Stop re-arming; a cycle in progress is abandoned.
    pub async fn stop(&self) -> Result<(), ControllerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Stop(reply))
            .await
            .map_err(|_| ControllerError::SessionClosed)?;
        response.await.map_err(|_| ControllerError::SessionClosed)
    }

    pub fn state(&self) -> ControllerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn cache(&self) -> SharedCache {
        self.cache.clone()
    }

    /// Tear down and wait until the task has released the provider.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
