//! YAML configuration for a cluster: resource declarations plus the
//! options for every plugin (queue, replication, graph, inventory,
//! metrics) that opts in.

pub mod error;
pub mod loader;
pub mod model;
pub mod raw;

pub use error::ConfigError;
pub use loader::{load_cluster_config, load_cluster_config_str};
pub use model::{
    ClusterConfig, DiscoveryOptions, GraphOptions, InventoryOptions, LockOptions, MetricsOptions, QueueOptions,
    ReplicationOptions, ReplicatorTarget, ScheduleOptions,
};
