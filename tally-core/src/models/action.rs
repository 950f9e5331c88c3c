use serde::{Deserialize, Serialize};

/// How a custom action is presented on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
    #[serde(rename = "buttonText")]
    pub button_text: String,
    pub actions: Vec<String>,
}

/// An operator's choice, delivered inside an update reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSelection {
    pub name: String,
    pub action: String,
}
