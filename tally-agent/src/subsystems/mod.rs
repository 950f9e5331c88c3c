pub mod notifier;
pub mod reporter;
pub mod screenshot;
pub mod signals;
