pub mod demo;
pub mod host;
pub mod session;
pub mod subsystems;

pub use host::{Host, SessionSetup};
pub use session::{SessionSync, Transition};
pub use subsystems::reporter::{ReportingLoop, TickOutcome};
