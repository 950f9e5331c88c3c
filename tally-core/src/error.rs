use thiserror::Error;

use crate::models::SessionState;
use crate::transport::TransmissionError;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Transmission error: {0}")]
    Transmission(#[from] TransmissionError),

    #[error("Other error: {0}")]
    Other(String),
}

/// Lifecycle errors raised to the host. These indicate misuse by the caller;
/// remote failures never surface here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session already started")]
    AlreadyStarted,

    #[error("Session has not been started")]
    NotStarted,

    #[error("Cannot {action} a session that is {from}")]
    InvalidTransition {
        from: SessionState,
        action: &'static str,
    },

    #[error("Session has been shut down")]
    ShutDown,

    #[error("Stop abandoned: host was still unsafe to stop after {attempts} checks")]
    StopAbandoned { attempts: usize },
}
