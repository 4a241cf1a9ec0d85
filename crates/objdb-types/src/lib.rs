pub mod error;
pub mod plugin_event;
pub mod types;

pub use error::DomainError;
pub use plugin_event::{PluginEvent, PluginEventBus, PluginEventHandler};
pub use types::*;
