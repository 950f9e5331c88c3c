use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a reporting session. The serde names are the ones the
/// dashboard uses in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    #[serde(rename = "run")]
    Running,
    #[serde(rename = "pause")]
    Paused,
    #[serde(rename = "stop")]
    Stopped,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Stopped)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_value(SessionState::Running).unwrap(), "run");
        assert_eq!(serde_json::to_value(SessionState::Paused).unwrap(), "pause");
        assert_eq!(
            serde_json::from_value::<SessionState>(serde_json::json!("stop")).unwrap(),
            SessionState::Stopped
        );
        assert!(serde_json::from_value::<SessionState>(serde_json::json!("running")).is_err());
    }
}
