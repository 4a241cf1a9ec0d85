//! S3Queue: a durable FIFO/LIFO work queue layered on the resource runtime,
//! with optional coordinator-backed ticket dispatch for strict ordering.

pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod queue;

pub use config::{FailureStrategy, OrderingMode, QueueConfig};
pub use entry::{dead_letter_resource_schema, queue_resource_schema, DeadLetterRecord};
pub use error::QueueError;
pub use queue::{RenewRejectReason, S3Queue};
