//! Session lifecycle — Running / Paused / Stopped, mirrored to the dashboard.
//!
//! Transitions are applied locally under a single lock and then queued for
//! the state-signal worker, so the remote record follows in transition order
//! without the caller ever waiting on the network. The reporting loop reads
//! the state through a watch channel and skips ticks unless Running.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tally_core::{
    ActionRegistry, MetricRegistry, MetricSnapshot, Notification, SessionDetails, SessionError,
    SessionState, Severity, TallyConfig, Transport,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;

use crate::host::{Host, Predicate, SessionSetup};
use crate::subsystems::notifier::NotificationChannel;
use crate::subsystems::reporter::ReportingLoop;
use crate::subsystems::signals;

/// Whether a lifecycle call changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Unchanged,
}

#[derive(Default)]
struct Lifecycle {
    token: String,
    is_safe_to_stop: Option<Predicate>,
    started_at: Option<Instant>,
    signals: Option<mpsc::Sender<SessionState>>,
    tasks: Vec<JoinHandle<()>>,
    shut_down: bool,
}

struct SessionInner {
    config: TallyConfig,
    transport: Arc<dyn Transport>,
    host: Arc<dyn Host>,
    metrics: MetricRegistry,
    actions: ActionRegistry,
    stop_when: Option<Predicate>,
    lifecycle: Mutex<Lifecycle>,
    state_tx: watch::Sender<Option<SessionState>>,
    /// 0 until the dashboard assigns an id.
    remote_id: AtomicU64,
    last_snapshot: Mutex<MetricSnapshot>,
    pending_signals: AtomicUsize,
    stop_pending: AtomicBool,
    screenshot_pending: AtomicBool,
    shutdown: broadcast::Sender<()>,
}

/// Handle to one reporting session. Cheap to clone; all clones drive the
/// same session.
#[derive(Clone)]
pub struct SessionSync {
    inner: Arc<SessionInner>,
}

impl SessionSync {
    pub fn new(
        config: TallyConfig,
        transport: Arc<dyn Transport>,
        host: Arc<dyn Host>,
        setup: SessionSetup,
    ) -> Self {
        let (state_tx, _) = watch::channel(None);
        let (shutdown, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(SessionInner {
                config,
                transport,
                host,
                metrics: setup.metrics,
                actions: setup.actions,
                stop_when: setup.stop_when,
                lifecycle: Mutex::new(Lifecycle::default()),
                state_tx,
                remote_id: AtomicU64::new(0),
                last_snapshot: Mutex::new(MetricSnapshot::new()),
                pending_signals: AtomicUsize::new(0),
                stop_pending: AtomicBool::new(false),
                screenshot_pending: AtomicBool::new(false),
                shutdown,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start the session and its background tasks. Must be called from
    /// within a tokio runtime.
    pub fn start<F>(&self, token: impl Into<String>, is_safe_to_stop: F) -> Result<(), SessionError>
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.shut_down {
            return Err(SessionError::ShutDown);
        }
        if self.state().is_some() {
            return Err(SessionError::AlreadyStarted);
        }

        let capacity = self.inner.config.reporting.signal_queue_capacity.max(1);
        let (signal_tx, signal_rx) = mpsc::channel(capacity);

        lifecycle.token = token.into();
        lifecycle.is_safe_to_stop = Some(Arc::new(is_safe_to_stop));
        lifecycle.started_at = Some(Instant::now());
        lifecycle.signals = Some(signal_tx);

        let state_rx = self.inner.state_tx.subscribe();
        self.inner.state_tx.send_replace(Some(SessionState::Running));

        let worker = tokio::spawn(signals::run_signal_worker(
            self.clone(),
            signal_rx,
            self.inner.shutdown.subscribe(),
        ));
        let reporter = tokio::spawn(
            self.reporter()
                .run(state_rx, self.inner.shutdown.subscribe()),
        );
        lifecycle.tasks.push(worker);
        lifecycle.tasks.push(reporter);

        if self.inner.metrics.is_empty() {
            tracing::warn!("No metric producers registered, updates will carry no custom metrics");
        }
        tracing::info!(
            interval_ms = self.inner.config.reporting.interval_ms,
            metrics = self.inner.metrics.len(),
            transport = self.inner.transport.name(),
            "Reporting session started"
        );
        Ok(())
    }

    pub fn pause(&self) -> Result<Transition, SessionError> {
        self.apply(SessionState::Paused, "pause")
    }

    pub fn resume(&self) -> Result<Transition, SessionError> {
        self.apply(SessionState::Running, "resume")
    }

    /// Stop the session once the host reports it is safe to do so. While the
    /// predicate is false the stop is deferred and re-checked every
    /// `[stop] retry_interval_ms`.
    pub async fn stop(&self) -> Result<Transition, SessionError> {
        let is_safe_to_stop = {
            let lifecycle = self.inner.lifecycle.lock();
            match self.state() {
                None => return Err(SessionError::NotStarted),
                Some(SessionState::Stopped) => return Ok(Transition::Unchanged),
                Some(_) => lifecycle.is_safe_to_stop.clone(),
            }
        };

        if let Some(is_safe_to_stop) = is_safe_to_stop {
            self.wait_until_safe(is_safe_to_stop).await?;
        }

        self.apply(SessionState::Stopped, "stop")
    }

    /// Run `stop` in the background. Returns `None` if a stop is already
    /// waiting for the host.
    pub fn request_stop(&self) -> Option<JoinHandle<Result<Transition, SessionError>>> {
        if self.inner.stop_pending.swap(true, Ordering::SeqCst) {
            tracing::debug!("Stop already pending");
            return None;
        }

        let session = self.clone();
        Some(tokio::spawn(async move {
            let result = session.stop().await;
            if let Err(e) = &result {
                tracing::warn!(error = %e, "Requested stop did not complete");
            }
            session.inner.stop_pending.store(false, Ordering::SeqCst);
            result
        }))
    }

    /// Process-level shutdown. Marks the session stopped without consulting
    /// the host or signaling the dashboard, and abandons in-flight requests.
    /// A session shut down before `start` can no longer be started.
    pub fn shutdown(&self) {
        let mut lifecycle = self.inner.lifecycle.lock();
        lifecycle.shut_down = true;
        lifecycle.signals = None;
        if let Some(current) = self.state() {
            if !current.is_terminal() {
                self.inner
                    .state_tx
                    .send_replace(Some(SessionState::Stopped));
                tracing::info!(from = %current, "Session shut down");
            }
        }
        let _ = self.inner.shutdown.send(());
    }

    /// Wait for the background tasks to finish.
    pub async fn join(&self) {
        let tasks = std::mem::take(&mut self.inner.lifecycle.lock().tasks);
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Session task ended abnormally");
            }
        }
    }

    pub fn send_notification(
        &self,
        title: impl Into<String>,
        body: impl Into<String>,
        severity: Severity,
    ) -> Option<JoinHandle<()>> {
        NotificationChannel::new(self.clone()).send(Notification::new(title, body, severity))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// `None` until `start` has been called.
    pub fn state(&self) -> Option<SessionState> {
        *self.inner.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SessionState>> {
        self.inner.state_tx.subscribe()
    }

    /// Time since `start`, zero before.
    pub fn runtime(&self) -> Duration {
        self.inner
            .lifecycle
            .lock()
            .started_at
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }

    pub fn remote_id(&self) -> Option<u64> {
        match self.inner.remote_id.load(Ordering::SeqCst) {
            0 => None,
            id => Some(id),
        }
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.inner.actions
    }

    /// The most recently reported snapshot.
    pub fn last_snapshot(&self) -> MetricSnapshot {
        self.inner.last_snapshot.lock().clone()
    }

    /// The periodic reporter for this session. `start` runs one in the
    /// background; extra handles can drive ticks by hand.
    pub fn reporter(&self) -> ReportingLoop {
        ReportingLoop::new(self.clone())
    }

    // ------------------------------------------------------------------
    // Crate-internal plumbing for the subsystems
    // ------------------------------------------------------------------

    pub(crate) fn config(&self) -> &TallyConfig {
        &self.inner.config
    }

    pub(crate) fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.inner.transport)
    }

    pub(crate) fn host(&self) -> Arc<dyn Host> {
        Arc::clone(&self.inner.host)
    }

    pub(crate) fn metrics(&self) -> &MetricRegistry {
        &self.inner.metrics
    }

    pub(crate) fn stop_when(&self) -> Option<&Predicate> {
        self.inner.stop_when.as_ref()
    }

    pub(crate) fn set_remote_id(&self, id: u64) {
        self.inner.remote_id.store(id, Ordering::SeqCst);
    }

    pub(crate) fn record_snapshot(&self, snapshot: MetricSnapshot) {
        *self.inner.last_snapshot.lock() = snapshot;
    }

    pub(crate) fn has_pending_signals(&self) -> bool {
        self.inner.pending_signals.load(Ordering::SeqCst) > 0
    }

    pub(crate) fn signal_delivered(&self) {
        self.inner.pending_signals.fetch_sub(1, Ordering::SeqCst);
    }

    /// Claim the screenshot slot. Returns false if one is already underway.
    pub(crate) fn claim_screenshot(&self) -> bool {
        !self.inner.screenshot_pending.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn release_screenshot(&self) {
        self.inner.screenshot_pending.store(false, Ordering::SeqCst);
    }

    pub(crate) fn details(&self, state: SessionState, custom: MetricSnapshot) -> SessionDetails {
        let (token, runtime) = {
            let lifecycle = self.inner.lifecycle.lock();
            let runtime = lifecycle
                .started_at
                .map(|t| t.elapsed())
                .unwrap_or_default();
            (lifecycle.token.clone(), runtime)
        };

        SessionDetails {
            session_id: self.inner.remote_id.load(Ordering::SeqCst),
            status: self.inner.host.status(),
            state,
            login_username: self.inner.host.account_alias(),
            custom,
            custom_setup: self.inner.actions.descriptors(),
            runtime: u64::try_from(runtime.as_millis()).unwrap_or(u64::MAX),
            ..SessionDetails::new(token, &self.inner.config.identity)
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn apply(&self, target: SessionState, action: &'static str) -> Result<Transition, SessionError> {
        let lifecycle = self.inner.lifecycle.lock();
        let current = self.state().ok_or(SessionError::NotStarted)?;

        if current == target {
            return Ok(Transition::Unchanged);
        }
        if current.is_terminal() {
            return Err(SessionError::InvalidTransition {
                from: current,
                action,
            });
        }

        self.inner.state_tx.send_replace(Some(target));
        tracing::info!(from = %current, to = %target, "Session transition applied");

        if let Some(signals) = &lifecycle.signals {
            self.inner.pending_signals.fetch_add(1, Ordering::SeqCst);
            if let Err(e) = signals.try_send(target) {
                self.inner.pending_signals.fetch_sub(1, Ordering::SeqCst);
                tracing::warn!(state = %target, error = %e, "State signal dropped");
            }
        }

        Ok(Transition::Applied)
    }

    async fn wait_until_safe(&self, is_safe_to_stop: Predicate) -> Result<(), SessionError> {
        let stop = &self.inner.config.stop;
        let interval = FixedInterval::from_millis(stop.retry_interval_ms);
        let check = || {
            let safe = is_safe_to_stop();
            if !safe {
                tracing::debug!("Host not safe to stop yet, deferring");
            }
            std::future::ready(if safe { Ok(()) } else { Err(()) })
        };

        match stop.max_attempts {
            Some(max) => {
                let attempts = max.max(1);
                Retry::spawn(interval.take(attempts - 1), check)
                    .await
                    .map_err(|_| SessionError::StopAbandoned { attempts })
            }
            None => Retry::spawn(interval, check)
                .await
                .map_err(|_| SessionError::StopAbandoned { attempts: 0 }),
        }
    }
}
