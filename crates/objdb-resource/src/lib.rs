mod codec;
mod database;
pub mod error;
mod partition;
mod resource;

pub use database::{AfterCreateResourceHook, Database};
pub use error::ResourceError;
pub use resource::{BeforeHook, EventHandler, Resource};
