use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use objdb_types::InventoryItem;

use crate::error::InventoryError;

/// Driver-supplied discovery feed for one cluster — one implementation per
/// backend, looked up by cluster id at the call site.
#[async_trait]
pub trait ClusterSource: Send + Sync {
    fn cluster_id(&self) -> &str;

    /// Streams every discovered item. Errors for individual items are
    /// yielded inline rather than aborting the whole discovery — a single
    /// malformed object should not blank out an entire sync.
    async fn discover(&self) -> Result<BoxStream<'static, Result<InventoryItem, InventoryError>>, InventoryError>;
}

/// In-memory source used by tests and local demos in place of a live
/// cluster — the `LocalDriver`-equivalent no-op backend.
pub struct StaticSource {
    cluster_id: String,
    items: Vec<InventoryItem>,
}

impl StaticSource {
    pub fn new(cluster_id: impl Into<String>, items: Vec<InventoryItem>) -> Self {
        StaticSource { cluster_id: cluster_id.into(), items }
    }
}

#[async_trait]
impl ClusterSource for StaticSource {
    fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    async fn discover(&self) -> Result<BoxStream<'static, Result<InventoryItem, InventoryError>>, InventoryError> {
        let items = self.items.clone();
        Ok(stream::iter(items.into_iter().map(Ok)).boxed())
    }
}
