mod cold_start;
mod election;
pub mod error;
mod workers;

pub use cold_start::{ColdStartPhase, ColdStartTracker};
pub use election::{new_coordinator, Coordinator};
pub use error::CoordinatorError;
pub use workers::WorkerRegistry;
