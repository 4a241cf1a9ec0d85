//! Metrics & observability: operation counters, error/performance logs,
//! retention sweep, and Prometheus text exposition (§4.6).

pub mod error;
pub mod family;
pub mod metered;
pub mod registry;
pub mod schema;

pub use error::MetricsError;
pub use family::OperationFamily;
pub use metered::MeteredResource;
pub use registry::Metrics;
pub use schema::{
    metrics_errors_resource_schema, metrics_performance_resource_schema, metrics_resource_schema,
};
