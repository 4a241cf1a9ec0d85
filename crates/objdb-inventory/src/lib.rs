//! Inventory snapshot engine: normalizes driver-discovered cluster
//! resources into digested, versioned snapshots with a key-level drift
//! diff, guarded by a per-cluster sync lease.

pub mod engine;
pub mod error;
pub mod filter;
pub mod kube_source;
pub mod registry;
pub mod schema;
pub mod source;

pub use engine::{ClusterSyncStatus, InventoryEngine, SyncCounters, SyncSummary};
pub use error::InventoryError;
pub use filter::{FilterRule, InventoryFilter};
pub use kube_source::{KubeSource, WatchedKind};
pub use registry::ClusterRegistry;
pub use schema::{change_resource_schema, snapshot_resource_schema, version_resource_schema};
pub use source::{ClusterSource, StaticSource};
