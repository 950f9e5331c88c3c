//! State-signal worker — tells the dashboard about lifecycle transitions.
//!
//! Transitions are queued by `SessionSync` in the order they were applied
//! and posted one at a time. A failed post is logged and not retried. The
//! worker exits after the stop signal, or on shutdown.

use tally_core::SessionState;
use tokio::sync::{broadcast, mpsc};

use crate::session::SessionSync;

pub(crate) async fn run_signal_worker(
    session: SessionSync,
    mut signals: mpsc::Receiver<SessionState>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let transport = session.transport();

    loop {
        tokio::select! {
            next = signals.recv() => {
                let Some(state) = next else {
                    tracing::debug!("Signal queue closed");
                    break;
                };

                let details = session.details(state, session.last_snapshot());
                tokio::select! {
                    result = transport.push_state(&details) => match result {
                        Ok(()) => tracing::debug!(state = %state, "State signal delivered"),
                        Err(e) => tracing::warn!(state = %state, error = %e, "State signal failed"),
                    },
                    _ = shutdown.recv() => {
                        tracing::info!("Signal worker abandoning in-flight signal");
                        break;
                    }
                }
                session.signal_delivered();

                if state.is_terminal() {
                    break;
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Signal worker shutting down");
                break;
            }
        }
    }
}
