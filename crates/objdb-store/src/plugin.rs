use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::blob::{BlobStore, PutCondition, PutOpts};
use crate::error::StoreError;
use objdb_types::VersionTag;

/// KV veneer over the blob store for plugin scratch data: namespaced keys,
/// TTL metadata, leases. Every plugin (queue, coordinator, replication,
/// inventory) stores its bookkeeping here rather than reaching for the
/// blob store directly.
#[derive(Clone)]
pub struct PluginStorage {
    store: Arc<dyn BlobStore>,
    plugin: String,
    namespace: Option<String>,
}

impl PluginStorage {
    pub fn new(store: Arc<dyn BlobStore>, plugin: impl Into<String>) -> Self {
        PluginStorage { store, plugin: plugin.into(), namespace: None }
    }

    pub fn namespaced(&self, namespace: impl Into<String>) -> Self {
        PluginStorage {
            store: self.store.clone(),
            plugin: self.plugin.clone(),
            namespace: Some(namespace.into()),
        }
    }

    /// Builds `plugins/<plugin>[/<namespace>]/<...parts>`.
    pub fn key(&self, parts: &[&str]) -> String {
        let mut segments = vec!["plugins".to_string(), self.plugin.clone()];
        if let Some(ns) = &self.namespace {
            segments.push(ns.clone());
        }
        segments.extend(parts.iter().map(|p| p.to_string()));
        segments.join("/")
    }

    pub async fn put_json<T: Serialize>(
        &self,
        parts: &[&str],
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<VersionTag, StoreError> {
        let body = Bytes::from(serde_json::to_vec(value)?);
        let mut metadata = std::collections::HashMap::new();
        if let Some(ttl) = ttl {
            let expires_at = chrono::Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
            metadata.insert("expires_at".to_string(), expires_at.to_rfc3339());
        }
        self.store.put(&self.key(parts), body, PutOpts::default().with_metadata(metadata)).await
    }

    pub async fn put_json_conditional<T: Serialize>(
        &self,
        parts: &[&str],
        value: &T,
        condition: PutCondition,
    ) -> Result<VersionTag, StoreError> {
        let body = Bytes::from(serde_json::to_vec(value)?);
        self.store
            .put(&self.key(parts), body, PutOpts { condition: Some(condition), metadata: Default::default() })
            .await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        parts: &[&str],
    ) -> Result<Option<(T, VersionTag)>, StoreError> {
        match self.store.get_opt(&self.key(parts)).await? {
            None => Ok(None),
            Some(obj) => {
                // TTL expiry is best-effort: an object past its recorded
                // expiry may still be visible briefly, matching the blob
                // store contract.
                if let Some(expires_at) = obj.metadata.get("expires_at") {
                    if let Ok(expires_at) = chrono::DateTime::parse_from_rfc3339(expires_at) {
                        if expires_at < chrono::Utc::now() {
                            return Ok(None);
                        }
                    }
                }
                let value: T = serde_json::from_slice(&obj.body)?;
                Ok(Some((value, obj.etag)))
            }
        }
    }

    pub async fn delete(&self, parts: &[&str]) -> Result<(), StoreError> {
        self.store.delete(&self.key(parts)).await
    }

    pub async fn list_keys(&self, parts: &[&str]) -> Result<Vec<String>, StoreError> {
        let prefix = self.key(parts);
        let page = self.store.list(&prefix, None).await?;
        Ok(page.objects.into_iter().map(|o| o.key).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::ObjectStoreBlob;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Scratch {
        value: u32,
    }

    fn storage() -> PluginStorage {
        PluginStorage::new(Arc::new(ObjectStoreBlob::in_memory()), "s3queue")
    }

    #[test]
    fn key_builder_namespaces_by_plugin() {
        let s = storage();
        assert_eq!(s.key(&["widgets", "queue"]), "plugins/s3queue/widgets/queue");
    }

    #[test]
    fn key_builder_includes_namespace_when_set() {
        let s = storage().namespaced("widgets");
        assert_eq!(s.key(&["queue"]), "plugins/s3queue/widgets/queue");
    }

    #[tokio::test]
    async fn put_json_then_get_json_round_trips() {
        let s = storage();
        s.put_json(&["a"], &Scratch { value: 7 }, None).await.unwrap();
        let (got, _etag) = s.get_json::<Scratch>(&["a"]).await.unwrap().unwrap();
        assert_eq!(got, Scratch { value: 7 });
    }

    #[tokio::test]
    async fn get_json_missing_returns_none() {
        let s = storage();
        assert!(s.get_json::<Scratch>(&["missing"]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent() {
        let s = storage();
        s.put_json(&["ttl"], &Scratch { value: 1 }, Some(Duration::from_millis(0))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(s.get_json::<Scratch>(&["ttl"]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let s = storage();
        s.put_json(&["a"], &Scratch { value: 1 }, None).await.unwrap();
        s.delete(&["a"]).await.unwrap();
        assert!(s.get_json::<Scratch>(&["a"]).await.unwrap().is_none());
    }
}
