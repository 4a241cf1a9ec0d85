use async_trait::async_trait;
use objdb_types::MutationOp;
use serde_json::Value;

use crate::error::ReplicationError;
use crate::filter::ResourceSelector;

/// One outbound replication target: a name, a capability predicate, and
/// the mutating call itself.
#[async_trait]
pub trait Replicator: Send + Sync {
    fn id(&self) -> &str;

    /// Whether this replicator cares about `resource` at all for `op`.
    /// Checked before every fan-out attempt and before paging during
    /// `syncAllData`.
    fn should_replicate_resource(&self, resource: &str, _op: MutationOp) -> bool {
        self.resources().allows(resource)
    }

    fn resources(&self) -> &ResourceSelector;

    async fn replicate(
        &self,
        resource: &str,
        op: MutationOp,
        data: &Value,
        id: &str,
        before: Option<&Value>,
    ) -> Result<(), ReplicationError>;
}
