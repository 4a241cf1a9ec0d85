use std::collections::HashMap;
use std::sync::Arc;

use crate::error::InventoryError;
use crate::source::ClusterSource;

/// Dispatches sync calls to the correct registered `ClusterSource`, keyed
/// by cluster id.
#[derive(Default)]
pub struct ClusterRegistry {
    sources: HashMap<String, Arc<dyn ClusterSource>>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        ClusterRegistry { sources: HashMap::new() }
    }

    pub fn register(&mut self, source: Arc<dyn ClusterSource>) -> &mut Self {
        self.sources.insert(source.cluster_id().to_string(), source);
        self
    }

    pub fn get(&self, cluster_id: &str) -> Result<Arc<dyn ClusterSource>, InventoryError> {
        self.sources.get(cluster_id).cloned().ok_or_else(|| InventoryError::UnknownCluster(cluster_id.to_string()))
    }

    pub fn cluster_ids(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }
}
