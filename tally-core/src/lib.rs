pub mod actions;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod shared;
pub mod transport;

pub use actions::{ActionError, ActionRegistry};
pub use config::TallyConfig;
pub use error::{SessionError, TallyError};
pub use metrics::{per_hour, MetricRegistry, MetricSnapshot, MetricValue};
pub use models::{
    ActionDescriptor, ActionSelection, Notification, NotificationPayload, ScreenshotPayload,
    SessionDetails, SessionState, Severity, UpdateReply,
};
pub use shared::SharedValue;
pub use transport::{HttpTransport, HttpTransportConfig, TransmissionError, Transport};
