//! Notification channel — one-shot events for the dashboard.
//!
//! Sends are spawned and never awaited by the caller. They go out in any
//! session state, are attempted once, and failures only reach the log.

use tally_core::{Notification, NotificationPayload};
use tokio::task::JoinHandle;

use crate::session::SessionSync;

pub struct NotificationChannel {
    session: SessionSync,
}

impl NotificationChannel {
    pub fn new(session: SessionSync) -> Self {
        Self { session }
    }

    /// Dispatch `notification`. Returns `None` when there is no started
    /// session to attach it to.
    pub fn send(&self, notification: Notification) -> Option<JoinHandle<()>> {
        let Some(state) = self.session.state() else {
            tracing::warn!(
                title = %notification.title,
                "Notification dropped: session not started"
            );
            return None;
        };

        let details = self.session.details(state, self.session.last_snapshot());
        let transport = self.session.transport();

        Some(tokio::spawn(async move {
            let payload = NotificationPayload::new(&details, &notification);
            match transport.notify(&payload).await {
                Ok(()) => tracing::debug!(title = %notification.title, "Notification delivered"),
                Err(e) => tracing::warn!(
                    title = %notification.title,
                    error = %e,
                    "Notification failed"
                ),
            }
        }))
    }
}
