use std::collections::HashMap;
use std::sync::Arc;

use objdb_resource::{Resource, ResourceError};
use objdb_types::Record;
use serde_json::Value;

use crate::family::OperationFamily;
use crate::registry::Metrics;

/// Decorates a [`Resource`] so every call through the six operation
/// families (`insert`, `update`, `delete`, `get`, `list`, `count`) is
/// timed and counted. Wraps rather than subscribes, since timing (and
/// capturing failures) requires bracketing the call — the event bus only
/// fires after a mutation has already succeeded.
pub struct MeteredResource {
    inner: Arc<Resource>,
    metrics: Arc<Metrics>,
}

impl MeteredResource {
    pub fn new(inner: Arc<Resource>, metrics: Arc<Metrics>) -> Self {
        MeteredResource { inner, metrics }
    }

    pub fn inner(&self) -> &Arc<Resource> {
        &self.inner
    }

    fn name(&self) -> &str {
        self.inner.name().as_str()
    }

    pub async fn insert(&self, data: HashMap<String, Value>) -> Result<Record, ResourceError> {
        let name = self.name().to_string();
        self.metrics.timed(&name, OperationFamily::Insert, self.inner.insert(data)).await
    }

    pub async fn update(&self, id: &str, fields: HashMap<String, Value>) -> Result<Record, ResourceError> {
        let name = self.name().to_string();
        self.metrics.timed(&name, OperationFamily::Update, self.inner.update(id, fields)).await
    }

    pub async fn patch(&self, id: &str, fields: HashMap<String, Value>) -> Result<Record, ResourceError> {
        let name = self.name().to_string();
        self.metrics.timed(&name, OperationFamily::Update, self.inner.patch(id, fields)).await
    }

    pub async fn delete(&self, id: &str) -> Result<Record, ResourceError> {
        let name = self.name().to_string();
        self.metrics.timed(&name, OperationFamily::Delete, self.inner.delete(id)).await
    }

    /// Times the whole batch as one `delete` operation; the recorded
    /// outcome is an error iff at least one id in the batch failed.
    pub async fn delete_many(&self, ids: &[String]) -> Vec<Result<Record, ResourceError>> {
        let name = self.name().to_string();
        let results = self.inner.delete_many(ids).await;
        let first_err = results.iter().find_map(|r| r.as_ref().err().map(ToString::to_string));
        let outcome: Result<(), String> = match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        };
        let wrapped = async move { outcome };
        let _ = self.metrics.timed::<(), String, _>(&name, OperationFamily::Delete, wrapped).await;
        results
    }

    pub async fn get(&self, id: &str) -> Result<Record, ResourceError> {
        let name = self.name().to_string();
        self.metrics.timed(&name, OperationFamily::Get, self.inner.get(id)).await
    }

    pub async fn get_or_null(&self, id: &str) -> Result<Option<Record>, ResourceError> {
        let name = self.name().to_string();
        self.metrics.timed(&name, OperationFamily::Get, self.inner.get_or_null(id)).await
    }

    pub async fn get_many(&self, ids: &[String]) -> Result<Vec<Record>, ResourceError> {
        let name = self.name().to_string();
        self.metrics.timed(&name, OperationFamily::Get, self.inner.get_many(ids)).await
    }

    pub async fn list(&self, limit: Option<usize>, offset: Option<usize>) -> Result<Vec<Record>, ResourceError> {
        let name = self.name().to_string();
        self.metrics.timed(&name, OperationFamily::List, self.inner.list(limit, offset)).await
    }

    pub async fn list_ids(&self) -> Result<Vec<String>, ResourceError> {
        let name = self.name().to_string();
        self.metrics.timed(&name, OperationFamily::List, self.inner.list_ids()).await
    }

    pub async fn page(&self, offset: usize, size: usize) -> Result<Vec<Record>, ResourceError> {
        let name = self.name().to_string();
        self.metrics.timed(&name, OperationFamily::List, self.inner.page(offset, size)).await
    }

    pub async fn query(&self, filter: impl Fn(&Record) -> bool) -> Result<Vec<Record>, ResourceError> {
        let name = self.name().to_string();
        self.metrics.timed(&name, OperationFamily::List, self.inner.query(filter)).await
    }

    pub async fn count(&self, filter: Option<&dyn Fn(&Record) -> bool>) -> Result<usize, ResourceError> {
        let name = self.name().to_string();
        self.metrics.timed(&name, OperationFamily::Count, self.inner.count(filter)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objdb_store::ObjectStoreBlob;
    use objdb_types::{AttributeDef, AttributeType, ResourceBehavior, ResourceName, ResourceSchema};
    use serde_json::json;

    fn widgets() -> Arc<Resource> {
        let schema = ResourceSchema {
            name: ResourceName::new("widgets"),
            attributes: vec![AttributeDef { name: "id".into(), attr_type: AttributeType::String, required: true }],
            behavior: ResourceBehavior::BodyOnly,
            partitions: vec![],
            timestamps: false,
            async_partitions: false,
        };
        Arc::new(Resource::new(schema, Arc::new(ObjectStoreBlob::in_memory())))
    }

    #[tokio::test]
    async fn insert_and_get_are_counted() {
        let metrics = Metrics::new().unwrap();
        let metered = MeteredResource::new(widgets(), metrics.clone());
        let mut data = HashMap::new();
        data.insert("id".to_string(), json!("w1"));
        metered.insert(data).await.unwrap();
        metered.get("w1").await.unwrap();

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("operation=\"insert\""));
        assert!(rendered.contains("operation=\"get\""));
        assert!(rendered.contains("resource=\"widgets\""));
    }

    #[tokio::test]
    async fn failed_get_increments_error_counter() {
        let metrics = Metrics::new().unwrap();
        let metered = MeteredResource::new(widgets(), metrics.clone());
        assert!(metered.get("missing").await.is_err());
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("operations_errors_total"));
    }
}
