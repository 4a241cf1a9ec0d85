use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::path::Path as ObjectPath;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, PutMode, PutOptions, PutPayload,
    UpdateVersion,
};
use objdb_types::VersionTag;

use crate::error::StoreError;

/// Precondition a `put` must satisfy before the backend accepts the write.
#[derive(Debug, Clone)]
pub enum PutCondition {
    /// No precondition; last writer wins.
    None,
    /// Succeeds only if the object's current version tag equals this one.
    IfMatch(VersionTag),
    /// Succeeds only if no object currently exists at this key.
    IfNoneMatch,
}

#[derive(Debug, Clone, Default)]
pub struct PutOpts {
    pub condition: Option<PutCondition>,
    /// Caller-supplied object metadata, round-tripped through backend
    /// attributes and returned verbatim on `get`.
    pub metadata: HashMap<String, String>,
}

impl PutOpts {
    pub fn if_match(etag: VersionTag) -> Self {
        PutOpts { condition: Some(PutCondition::IfMatch(etag)), ..Default::default() }
    }

    pub fn if_none_match() -> Self {
        PutOpts { condition: Some(PutCondition::IfNoneMatch), ..Default::default() }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone)]
pub struct GetObject {
    pub body: Bytes,
    pub etag: VersionTag,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ListedObject {
    pub key: String,
    pub etag: Option<VersionTag>,
}

#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ListedObject>,
    pub continuation_token: Option<String>,
}

/// Single-object GET/PUT/DELETE/LIST over a blob store, with conditional
/// write semantics (`IfMatch`/`IfNoneMatch`) and an opaque version tag
/// surfaced on every read and write. Every operation in the resource
/// runtime, queue and coordinator bottoms out here.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    async fn put(&self, key: &str, body: Bytes, opts: PutOpts) -> Result<VersionTag, StoreError>;
    async fn get(&self, key: &str) -> Result<GetObject, StoreError>;
    async fn get_opt(&self, key: &str) -> Result<Option<GetObject>, StoreError> {
        match self.get(key).await {
            Ok(obj) => Ok(Some(obj)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
    async fn list(&self, prefix: &str, max_keys: Option<usize>) -> Result<ListPage, StoreError>;
}

const METADATA_PREFIX: &str = "x-objdb-meta-";

fn attributes_from_metadata(metadata: &HashMap<String, String>) -> Attributes {
    let mut attrs = Attributes::new();
    for (k, v) in metadata {
        attrs.insert(
            Attribute::Metadata(format!("{METADATA_PREFIX}{k}").into()),
            AttributeValue::from(v.clone()),
        );
    }
    attrs
}

fn metadata_from_attributes(attrs: &Attributes) -> HashMap<String, String> {
    attrs
        .iter()
        .filter_map(|(k, v)| match k {
            Attribute::Metadata(name) => {
                name.strip_prefix(METADATA_PREFIX).map(|k| (k.to_string(), v.to_string()))
            }
            _ => None,
        })
        .collect()
}

/// Adapts any `object_store::ObjectStore` backend (in-memory, local
/// filesystem, or S3-compatible) to [`BlobStore`]'s conditional-write
/// contract.
pub struct ObjectStoreBlob {
    inner: Arc<dyn ObjectStore>,
}

impl ObjectStoreBlob {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        ObjectStoreBlob { inner }
    }

    /// Backed entirely by process memory. Data does not survive restart.
    pub fn in_memory() -> Self {
        ObjectStoreBlob::new(Arc::new(object_store::memory::InMemory::new()))
    }

    /// Backed by a directory on the local filesystem. Survives restarts;
    /// intended for single-node production use without an external bucket.
    pub fn local(root: &std::path::Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(root).map_err(|e| StoreError::Internal(e.to_string()))?;
        let fs = object_store::local::LocalFileSystem::new_with_prefix(root)
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(ObjectStoreBlob::new(Arc::new(fs)))
    }
}

fn map_put_error(key: &str, e: object_store::Error) -> StoreError {
    match &e {
        object_store::Error::Precondition { .. } | object_store::Error::AlreadyExists { .. } => {
            StoreError::PreconditionFailed { key: key.to_string() }
        }
        object_store::Error::NotFound { .. } => StoreError::NotFound(key.to_string()),
        _ => StoreError::Backend(e),
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlob {
    async fn put(&self, key: &str, body: Bytes, opts: PutOpts) -> Result<VersionTag, StoreError> {
        let path = ObjectPath::from(key);
        let mode = match opts.condition {
            None | Some(PutCondition::None) => PutMode::Overwrite,
            Some(PutCondition::IfNoneMatch) => PutMode::Create,
            Some(PutCondition::IfMatch(etag)) => PutMode::Update(UpdateVersion {
                e_tag: Some(etag.0),
                version: None,
            }),
        };
        let put_opts = PutOptions {
            mode,
            attributes: attributes_from_metadata(&opts.metadata),
            ..Default::default()
        };
        let result = self
            .inner
            .put_opts(&path, PutPayload::from_bytes(body), put_opts)
            .await
            .map_err(|e| map_put_error(key, e))?;
        let etag = result.e_tag.ok_or_else(|| {
            StoreError::Internal(format!("backend returned no etag for {key}"))
        })?;
        Ok(VersionTag::new(etag))
    }

    async fn get(&self, key: &str) -> Result<GetObject, StoreError> {
        let path = ObjectPath::from(key);
        let result = self.inner.get(&path).await.map_err(|e| map_put_error(key, e))?;
        let etag = result
            .meta
            .e_tag
            .clone()
            .ok_or_else(|| StoreError::Internal(format!("backend returned no etag for {key}")))?;
        let metadata = metadata_from_attributes(&result.attributes);
        let body = result.bytes().await.map_err(|e| StoreError::Backend(e))?;
        Ok(GetObject { body, etag: VersionTag::new(etag), metadata })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = ObjectPath::from(key);
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(StoreError::Backend(e)),
        }
    }

    async fn list(&self, prefix: &str, max_keys: Option<usize>) -> Result<ListPage, StoreError> {
        let path = ObjectPath::from(prefix);
        let mut stream = self.inner.list(Some(&path));
        let mut objects = Vec::new();
        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(StoreError::Backend)?;
            objects.push(ListedObject {
                key: meta.location.to_string(),
                etag: meta.e_tag.map(VersionTag::new),
            });
            if let Some(max) = max_keys {
                if objects.len() >= max {
                    break;
                }
            }
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(ListPage { objects, continuation_token: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ObjectStoreBlob {
        ObjectStoreBlob::in_memory()
    }

    #[tokio::test]
    async fn put_then_get_round_trips_body() {
        let s = store();
        s.put("widgets/1", Bytes::from_static(b"{}"), PutOpts::default()).await.unwrap();
        let got = s.get("widgets/1").await.unwrap();
        assert_eq!(got.body, Bytes::from_static(b"{}"));
    }

    #[tokio::test]
    async fn if_none_match_fails_when_object_exists() {
        let s = store();
        s.put("widgets/1", Bytes::from_static(b"a"), PutOpts::if_none_match()).await.unwrap();
        let err = s
            .put("widgets/1", Bytes::from_static(b"b"), PutOpts::if_none_match())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn if_match_fails_on_stale_etag() {
        let s = store();
        let etag = s.put("widgets/1", Bytes::from_static(b"a"), PutOpts::default()).await.unwrap();
        s.put("widgets/1", Bytes::from_static(b"b"), PutOpts::default()).await.unwrap();
        let err = s
            .put("widgets/1", Bytes::from_static(b"c"), PutOpts::if_match(etag))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn if_match_succeeds_on_current_etag() {
        let s = store();
        let etag = s.put("widgets/1", Bytes::from_static(b"a"), PutOpts::default()).await.unwrap();
        let result = s.put("widgets/1", Bytes::from_static(b"b"), PutOpts::if_match(etag)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn get_missing_returns_not_found() {
        let s = store();
        let err = s.get("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_opt_returns_none_for_missing() {
        let s = store();
        assert!(s.get_opt("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn metadata_round_trips() {
        let s = store();
        let mut meta = HashMap::new();
        meta.insert("owner".to_string(), "alice".to_string());
        s.put("widgets/1", Bytes::from_static(b"{}"), PutOpts::default().with_metadata(meta))
            .await
            .unwrap();
        let got = s.get("widgets/1").await.unwrap();
        assert_eq!(got.metadata.get("owner"), Some(&"alice".to_string()));
    }

    #[tokio::test]
    async fn list_returns_keys_under_prefix() {
        let s = store();
        s.put("widgets/1", Bytes::from_static(b"a"), PutOpts::default()).await.unwrap();
        s.put("widgets/2", Bytes::from_static(b"b"), PutOpts::default()).await.unwrap();
        s.put("gadgets/1", Bytes::from_static(b"c"), PutOpts::default()).await.unwrap();
        let page = s.list("widgets/", None).await.unwrap();
        assert_eq!(page.objects.len(), 2);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let s = store();
        s.put("widgets/1", Bytes::from_static(b"a"), PutOpts::default()).await.unwrap();
        s.delete("widgets/1").await.unwrap();
        s.delete("widgets/1").await.unwrap();
        assert!(s.get_opt("widgets/1").await.unwrap().is_none());
    }
}
