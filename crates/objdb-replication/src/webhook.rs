use async_trait::async_trait;
use objdb_types::MutationOp;
use serde_json::{json, Value};

use crate::error::ReplicationError;
use crate::filter::ResourceSelector;
use crate::replicator::Replicator;

/// POSTs each mutation to a configured HTTP endpoint.
pub struct WebhookReplicator {
    id: String,
    url: String,
    client: reqwest::Client,
    resources: ResourceSelector,
}

impl WebhookReplicator {
    pub fn new(id: impl Into<String>, url: impl Into<String>, resources: ResourceSelector) -> Self {
        WebhookReplicator { id: id.into(), url: url.into(), client: reqwest::Client::new(), resources }
    }
}

#[async_trait]
impl Replicator for WebhookReplicator {
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
        before: Option<&Value>,
    ) -> Result<(), ReplicationError> {
        let body = json!({
            "resource": resource,
            "operation": op,
            "id": id,
            "data": data,
            "before": before,
        });
        let response = self.client.post(&self.url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ReplicationError::HttpStatus { url: self.url.clone(), status: response.status().as_u16() });
        }
        Ok(())
    }
}
