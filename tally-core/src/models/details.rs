use serde::Serialize;

use crate::config::IdentityConfig;
use crate::metrics::MetricSnapshot;
use crate::models::{ActionDescriptor, SessionState};

/// Body shared by every request sent to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDetails {
    pub token: String,
    pub developer_username: String,
    pub client_username: String,
    pub client_name: String,
    pub script_name: String,
    /// Zero until the dashboard has assigned one.
    pub session_id: u64,
    pub status: String,
    pub state: SessionState,
    pub login_username: String,
    pub custom: MetricSnapshot,
    pub custom_setup: Vec<ActionDescriptor>,
    /// Milliseconds since the session started.
    pub runtime: u64,
}

impl SessionDetails {
    /// Details for a fresh, running session with nothing reported yet.
    pub fn new(token: impl Into<String>, identity: &IdentityConfig) -> Self {
        Self {
            token: token.into(),
            developer_username: identity.developer_username.clone(),
            client_username: identity.client_username.clone(),
            client_name: identity.client_name.clone(),
            script_name: identity.script_name.clone(),
            session_id: 0,
            status: String::new(),
            state: SessionState::Running,
            login_username: String::new(),
            custom: MetricSnapshot::new(),
            custom_setup: Vec::new(),
            runtime: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScreenshotPayload<'a> {
    #[serde(flatten)]
    pub details: &'a SessionDetails,
    /// Base64-encoded PNG.
    pub screenshot: String,
}
