//! Custom actions — host settings the dashboard operator can change.
//!
//! Actions are registered once during setup. Selections arrive later from
//! the transport's delivery context and run the host's callback inline.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::models::ActionDescriptor;

pub type SelectCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("Unknown custom action: {0}")]
    UnknownAction(String),

    #[error("Action {action} does not offer option {option}")]
    UnknownOption { action: String, option: String },
}

struct CustomAction {
    descriptor: ActionDescriptor,
    selection: RwLock<Option<String>>,
    on_select: SelectCallback,
}

#[derive(Default)]
pub struct ActionRegistry {
    actions: Vec<CustomAction>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action. `options` may be empty, in which case the action
    /// is a plain button and the callback receives an empty string.
    /// Registering an existing name replaces it.
    pub fn add<F>(
        &mut self,
        category: impl Into<String>,
        label: impl Into<String>,
        options: Vec<String>,
        on_select: F,
    ) where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let name = category.into();
        self.actions.retain(|a| a.descriptor.name != name);
        self.actions.push(CustomAction {
            descriptor: ActionDescriptor {
                name,
                button_text: label.into(),
                actions: options,
            },
            selection: RwLock::new(None),
            on_select: Arc::new(on_select),
        });
    }

    /// Apply an operator selection and run the action's callback.
    pub fn select(&self, name: &str, option: &str) -> Result<(), ActionError> {
        let action = self
            .actions
            .iter()
            .find(|a| a.descriptor.name == name)
            .ok_or_else(|| ActionError::UnknownAction(name.to_string()))?;

        let offered = &action.descriptor.actions;
        if !offered.is_empty() && !offered.iter().any(|o| o == option) {
            return Err(ActionError::UnknownOption {
                action: name.to_string(),
                option: option.to_string(),
            });
        }

        *action.selection.write() = Some(option.to_string());
        tracing::info!(action = name, option, "Custom action selected");
        (action.on_select)(option);
        Ok(())
    }

    pub fn current(&self, name: &str) -> Option<String> {
        self.actions
            .iter()
            .find(|a| a.descriptor.name == name)
            .and_then(|a| a.selection.read().clone())
    }

    pub fn descriptors(&self) -> Vec<ActionDescriptor> {
        self.actions.iter().map(|a| a.descriptor.clone()).collect()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.descriptors())
            .finish()
    }
}
