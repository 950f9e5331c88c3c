pub mod action;
pub mod details;
pub mod notification;
pub mod reply;
pub mod state;

pub use action::{ActionDescriptor, ActionSelection};
pub use details::{ScreenshotPayload, SessionDetails};
pub use notification::{Notification, NotificationPayload, Severity};
pub use reply::UpdateReply;
pub use state::SessionState;
