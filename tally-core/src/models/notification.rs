use serde::{Serialize, Serializer};

use crate::models::SessionDetails;

/// Notification severity. Sent to the dashboard as its numeric opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Success,
    Warning,
    Error,
    Information,
}

impl Severity {
    pub fn opcode(self) -> u8 {
        match self {
            Severity::Success => 0,
            Severity::Warning => 1,
            Severity::Error => 2,
            Severity::Information => 3,
        }
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.opcode())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayload<'a> {
    #[serde(flatten)]
    pub details: &'a SessionDetails,
    #[serde(rename = "type")]
    pub severity: Severity,
    pub title: &'a str,
    pub message: &'a str,
}

impl<'a> NotificationPayload<'a> {
    pub fn new(details: &'a SessionDetails, notification: &'a Notification) -> Self {
        Self {
            details,
            severity: notification.severity,
            title: &notification.title,
            message: &notification.message,
        }
    }
}
