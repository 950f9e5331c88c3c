use serde::Deserialize;

use crate::models::{ActionSelection, SessionState};

/// What the dashboard answers to an update.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateReply {
    /// The state the operator wants the session in.
    pub state: SessionState,
    #[serde(default)]
    pub screenshot: bool,
    #[serde(default)]
    pub action: Option<ActionSelection>,
}
