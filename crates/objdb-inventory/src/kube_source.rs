use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::Client;
use objdb_types::InventoryItem;
use serde_json::Value;

use crate::error::InventoryError;
use crate::source::ClusterSource;

/// One API group/version/kind this cluster source discovers, e.g.
/// `{group: "apps", version: "v1", kind: "Deployment"}`.
#[derive(Debug, Clone)]
pub struct WatchedKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl WatchedKind {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        WatchedKind { group: group.into(), version: version.into(), kind: kind.into() }
    }

    fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(&self.group, &self.version, &self.kind);
        ApiResource::from_gvk(&gvk)
    }
}

/// `ClusterSource` backed by `kube`/`k8s-openapi` dynamic-object discovery:
/// for each configured `WatchedKind`, lists every instance across all
/// namespaces (or cluster-scoped, for cluster resources) and normalizes it
/// into an `InventoryItem`.
pub struct KubeSource {
    cluster_id: String,
    client: Client,
    kinds: Vec<WatchedKind>,
}

impl KubeSource {
    pub fn new(cluster_id: impl Into<String>, client: Client, kinds: Vec<WatchedKind>) -> Self {
        KubeSource { cluster_id: cluster_id.into(), client, kinds }
    }

    async fn list_kind(&self, watched: &WatchedKind) -> Result<Vec<InventoryItem>, InventoryError> {
        let ar = watched.api_resource();
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &ar);
        let objects = api
            .list(&ListParams::default())
            .await
            .map_err(|e| InventoryError::Discovery(format!("{}/{}: {e}", watched.group, watched.kind)))?;
        Ok(objects.items.into_iter().map(|obj| self.normalize(&ar, obj)).collect())
    }

    fn normalize(&self, ar: &ApiResource, obj: DynamicObject) -> InventoryItem {
        let metadata: ObjectMeta = obj.metadata.clone();
        let api_version =
            obj.types.as_ref().map(|t| t.api_version.clone()).unwrap_or_else(|| ar.api_version.clone());
        let kind = obj.types.as_ref().map(|t| t.kind.clone()).unwrap_or_else(|| ar.kind.clone());
        let raw = serde_json::to_value(&obj).unwrap_or(Value::Null);

        InventoryItem {
            cluster_id: self.cluster_id.clone(),
            resource_type: ar.kind.clone(),
            namespace: metadata.namespace.clone(),
            resource_id: metadata.name.clone().unwrap_or_default(),
            uid: metadata.uid.clone(),
            name: metadata.name.unwrap_or_default(),
            api_version,
            kind,
            labels: metadata.labels.unwrap_or_default(),
            annotations: metadata.annotations.unwrap_or_default(),
            configuration: obj.data,
            raw,
        }
    }
}

#[async_trait]
impl ClusterSource for KubeSource {
    fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    async fn discover(&self) -> Result<BoxStream<'static, Result<InventoryItem, InventoryError>>, InventoryError> {
        let mut items = Vec::new();
        for watched in &self.kinds {
            match self.list_kind(watched).await {
                Ok(found) => items.extend(found.into_iter().map(Ok)),
                Err(e) => items.push(Err(e)),
            }
        }
        Ok(stream::iter(items).boxed())
    }
}
