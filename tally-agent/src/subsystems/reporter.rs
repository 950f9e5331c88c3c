//! Reporting loop — periodic snapshot push to the dashboard.
//!
//! Each tick, while the session is Running:
//! - allocates a remote session id on first use
//! - builds a fresh snapshot from the host's metric producers
//! - pushes it and applies the operator's reply (action selection,
//!   pause/stop directives, screenshot request)
//!
//! Ticks outside Running send nothing. A failed tick is logged and the next
//! one starts from scratch; missed ticks are skipped, not queued.

use std::time::Duration;
use tally_core::{SessionState, UpdateReply};
use tokio::sync::{broadcast, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::session::{SessionSync, Transition};
use crate::subsystems::screenshot;

const REMOTE_STOP_REASON: &str = "Session stopped through the web dashboard";

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Session not Running; nothing sent.
    Skipped,
    /// Snapshot delivered and reply applied.
    Reported,
    /// Transmission failed; state untouched.
    Failed,
}

#[derive(Clone)]
pub struct ReportingLoop {
    session: SessionSync,
}

impl ReportingLoop {
    pub(crate) fn new(session: SessionSync) -> Self {
        Self { session }
    }

    /// Run ticks every `[reporting] interval_ms` until the session is Stopped
    /// or shutdown fires. The first tick comes one period after the call.
    pub async fn run(
        self,
        mut state: watch::Receiver<Option<SessionState>>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let interval_ms = self.session.config().reporting.interval_ms.max(1);
        let period = Duration::from_millis(interval_ms);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::debug!(interval_ms, "Reporting loop running");

        loop {
            if matches!(*state.borrow(), Some(SessionState::Stopped)) {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = self.tick() => {}
                        _ = shutdown.recv() => break,
                    }
                }
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!("Reporting loop stopped");
    }

    /// One reporting pass.
    pub async fn tick(&self) -> TickOutcome {
        if self.session.state() != Some(SessionState::Running) {
            tracing::debug!("Tick skipped: session not running");
            return TickOutcome::Skipped;
        }

        // The stop may be deferred or abandoned, so keep reporting until the
        // session is actually Stopped.
        if let Some(stop_when) = self.session.stop_when() {
            if stop_when() && self.session.request_stop().is_some() {
                tracing::info!("Host stop condition met, stopping session");
            }
        }

        let transport = self.session.transport();

        if self.session.remote_id().is_none() {
            let details = self
                .session
                .details(SessionState::Running, self.session.last_snapshot());
            match transport.open_session(&details).await {
                Ok(id) => {
                    self.session.set_remote_id(id);
                    tracing::info!(session_id = id, "Remote session allocated");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Could not allocate remote session, retrying next tick");
                    return TickOutcome::Failed;
                }
            }
        }

        let snapshot = self.session.metrics().snapshot();
        self.session.record_snapshot(snapshot.clone());
        let details = self.session.details(SessionState::Running, snapshot);

        if details.custom.is_empty() {
            tracing::debug!("Pushing update without custom metrics");
        }
        match transport.push_update(&details).await {
            Ok(reply) => {
                self.apply_reply(reply);
                TickOutcome::Reported
            }
            Err(e) => {
                tracing::warn!(error = %e, "Update failed, retrying next tick");
                TickOutcome::Failed
            }
        }
    }

    fn apply_reply(&self, reply: UpdateReply) {
        if let Some(selection) = reply.action {
            if let Err(e) = self
                .session
                .actions()
                .select(&selection.name, &selection.action)
            {
                tracing::warn!(error = %e, "Ignoring operator selection");
            }
        }

        if reply.screenshot {
            screenshot::spawn_capture(self.session.clone());
        }

        // A reply written before our last transition reached the dashboard
        // still carries the old state.
        if self.session.has_pending_signals() {
            tracing::debug!(remote = %reply.state, "Directive ignored: state signal in flight");
            return;
        }

        match reply.state {
            SessionState::Running => {}
            SessionState::Paused => {
                if let Ok(Transition::Applied) = self.session.pause() {
                    tracing::info!("Session paused from the dashboard");
                    self.session.host().on_remote_pause();
                }
            }
            SessionState::Stopped => {
                if let Some(stopping) = self.session.request_stop() {
                    tracing::info!("Stop requested from the dashboard");
                    let host = self.session.host();
                    tokio::spawn(async move {
                        if let Ok(Ok(Transition::Applied)) = stopping.await {
                            host.on_remote_stop(REMOTE_STOP_REASON);
                        }
                    });
                }
            }
        }
    }
}
