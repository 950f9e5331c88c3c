//! The host side of a session: what the automation host provides and what it
//! is told when the dashboard operator intervenes.

use std::fmt;
use std::sync::Arc;
use tally_core::{ActionRegistry, MetricRegistry, MetricValue};

pub type Predicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Collaborator interface implemented by the automation host.
pub trait Host: Send + Sync + 'static {
    /// Login identity reported as `login_username`.
    fn account_alias(&self) -> String;

    /// Short description of what the host is doing right now.
    fn status(&self) -> String {
        "Status not set!".to_string()
    }

    /// PNG bytes of the current screen, if the host can capture one.
    /// Called on a blocking thread.
    fn capture_screen(&self) -> Option<Vec<u8>> {
        None
    }

    fn on_remote_pause(&self) {}

    /// The session has been stopped from the dashboard.
    fn on_remote_stop(&self, _reason: &str) {}
}

/// Everything a session needs from the host besides its token and stop
/// predicate. Built once, before `start`.
#[derive(Default)]
pub struct SessionSetup {
    pub(crate) metrics: MetricRegistry,
    pub(crate) actions: ActionRegistry,
    pub(crate) stop_when: Option<Predicate>,
}

impl SessionSetup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metric<F, V>(mut self, name: impl Into<String>, producer: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<MetricValue>,
    {
        self.metrics.register(name, producer);
        self
    }

    pub fn action<F>(
        mut self,
        category: impl Into<String>,
        label: impl Into<String>,
        options: &[&str],
        on_select: F,
    ) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let options = options.iter().map(|o| o.to_string()).collect();
        self.actions.add(category, label, options, on_select);
        self
    }

    /// End the session (safely) once `predicate` holds, e.g. out of food.
    pub fn stop_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.stop_when = Some(Arc::new(predicate));
        self
    }
}

impl fmt::Debug for SessionSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSetup")
            .field("metrics", &self.metrics)
            .field("actions", &self.actions)
            .field("stop_when", &self.stop_when.is_some())
            .finish()
    }
}
