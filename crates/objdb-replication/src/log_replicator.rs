use async_trait::async_trait;
use objdb_types::MutationOp;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::ReplicationError;
use crate::filter::ResourceSelector;
use crate::replicator::Replicator;

#[derive(Debug, Clone)]
pub struct ReplayedEntry {
    pub resource: String,
    pub operation: MutationOp,
    pub id: String,
    pub data: Value,
}

/// Append-only in-memory replicator used by tests and demos in place of a
/// live webhook target.
pub struct LogReplicator {
    id: String,
    resources: ResourceSelector,
    log: Mutex<Vec<ReplayedEntry>>,
    fail_next: Mutex<u32>,
}

impl LogReplicator {
    pub fn new(id: impl Into<String>, resources: ResourceSelector) -> Self {
        LogReplicator { id: id.into(), resources, log: Mutex::new(Vec::new()), fail_next: Mutex::new(0) }
    }

    /// Makes the next `n` `replicate` calls fail, to exercise the fabric's
    /// retry/backoff path in tests.
    pub async fn fail_next_calls(&self, n: u32) {
        *self.fail_next.lock().await = n;
    }

    pub async fn entries(&self) -> Vec<ReplayedEntry> {
        self.log.lock().await.clone()
    }
}

#[async_trait]
impl Replicator for LogReplicator {
    fn id(&self) -> &str {
        &self.id
    }

    fn resources(&self) -> &ResourceSelector {
        &self.resources
    }

    async fn replicate(
        &self,
        resource: &str,
        op: MutationOp,
        data: &Value,
        id: &str,
        _before: Option<&Value>,
    ) -> Result<(), ReplicationError> {
        let mut remaining = self.fail_next.lock().await;
        if *remaining > 0 {
            *remaining -= 1;
            return Err(ReplicationError::HttpStatus { url: "log://forced-failure".to_string(), status: 500 });
        }
        drop(remaining);

        self.log.lock().await.push(ReplayedEntry {
            resource: resource.to_string(),
            operation: op,
            id: id.to_string(),
            data: data.clone(),
        });
        Ok(())
    }
}
