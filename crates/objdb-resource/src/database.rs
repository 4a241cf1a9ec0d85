use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use objdb_store::BlobStore;
use objdb_types::{ResourceName, ResourceSchema};
use tokio::sync::RwLock;

use crate::error::ResourceError;
use crate::resource::Resource;

/// Invoked synchronously after a resource is registered.
pub type AfterCreateResourceHook = Arc<dyn Fn(&Arc<Resource>) + Send + Sync>;

/// Explicit runtime context replacing what would otherwise be process-wide
/// globals (open-resources map, plugin registry). Constructed once by the
/// entrypoint and handed by `Arc` to every plugin constructor.
pub struct Database {
    store: Arc<dyn BlobStore>,
    resources: RwLock<HashMap<String, Arc<Resource>>>,
    after_create_resource: RwLock<Vec<AfterCreateResourceHook>>,
    /// Capability lookup: plugins expose typed handles bound to a resource
    /// name under a capability tag (`"queue"`, `"graph"`, …) rather than
    /// injecting methods onto the resource itself.
    capabilities: RwLock<HashMap<(String, &'static str), Arc<dyn Any + Send + Sync>>>,
}

impl Database {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Database {
            store,
            resources: RwLock::new(HashMap::new()),
            after_create_resource: RwLock::new(Vec::new()),
            capabilities: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> Arc<dyn BlobStore> {
        self.store.clone()
    }

    pub async fn on_after_create_resource(&self, hook: AfterCreateResourceHook) {
        self.after_create_resource.write().await.push(hook);
    }

    /// Registers a new resource and fires every `afterCreateResource`
    /// subscriber, synchronously, in registration order.
    pub async fn create_resource(&self, schema: ResourceSchema) -> Arc<Resource> {
        let name = schema.name.as_str().to_string();
        let resource = Arc::new(Resource::new(schema, self.store.clone()));
        self.resources.write().await.insert(name, resource.clone());
        for hook in self.after_create_resource.read().await.iter() {
            hook(&resource);
        }
        resource
    }

    pub async fn resource(&self, name: &ResourceName) -> Result<Arc<Resource>, ResourceError> {
        self.resources
            .read()
            .await
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| ResourceError::Configuration(format!("unknown resource '{name}'")))
    }

    pub async fn resources(&self) -> Vec<Arc<Resource>> {
        self.resources.read().await.values().cloned().collect()
    }

    pub async fn resource_names(&self) -> Vec<String> {
        self.resources.read().await.keys().cloned().collect()
    }

    /// Registers a capability handle for `resource` under `tag` (e.g. a
    /// queue handle under `"queue"`, a graph handle under `"graph"`).
    pub async fn register_capability<T: Send + Sync + 'static>(
        &self,
        resource: &ResourceName,
        tag: &'static str,
        handle: Arc<T>,
    ) {
        self.capabilities.write().await.insert((resource.as_str().to_string(), tag), handle);
    }

    pub async fn capability<T: Send + Sync + 'static>(
        &self,
        resource: &ResourceName,
        tag: &'static str,
    ) -> Option<Arc<T>> {
        self.capabilities
            .read()
            .await
            .get(&(resource.as_str().to_string(), tag))
            .cloned()
            .and_then(|any| any.downcast::<T>().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objdb_store::ObjectStoreBlob;
    use objdb_types::{AttributeDef, AttributeType, ResourceBehavior};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn schema(name: &str) -> ResourceSchema {
        ResourceSchema {
            name: ResourceName::new(name),
            attributes: vec![AttributeDef { name: "id".into(), attr_type: AttributeType::String, required: true }],
            behavior: ResourceBehavior::BodyOnly,
            partitions: vec![],
            timestamps: false,
            async_partitions: false,
        }
    }

    #[tokio::test]
    async fn create_resource_registers_it_for_lookup() {
        let db = Database::new(Arc::new(ObjectStoreBlob::in_memory()));
        db.create_resource(schema("widgets")).await;
        assert!(db.resource(&ResourceName::new("widgets")).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_resource_is_configuration_error() {
        let db = Database::new(Arc::new(ObjectStoreBlob::in_memory()));
        assert!(matches!(
            db.resource(&ResourceName::new("missing")).await,
            Err(ResourceError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn after_create_resource_hook_fires_synchronously() {
        let db = Database::new(Arc::new(ObjectStoreBlob::in_memory()));
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        db.on_after_create_resource(Arc::new(move |_resource| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .await;
        db.create_resource(schema("widgets")).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn capability_round_trips_by_resource_and_tag() {
        let db = Database::new(Arc::new(ObjectStoreBlob::in_memory()));
        db.register_capability(&ResourceName::new("widgets"), "queue", Arc::new(42u32)).await;
        let got = db.capability::<u32>(&ResourceName::new("widgets"), "queue").await;
        assert_eq!(got, Some(Arc::new(42u32)));
    }

    #[tokio::test]
    async fn capability_absent_for_unregistered_tag() {
        let db = Database::new(Arc::new(ObjectStoreBlob::in_memory()));
        assert!(db.capability::<u32>(&ResourceName::new("widgets"), "queue").await.is_none());
    }
}
