use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::StreamExt;
use objdb_store::{BlobStore, PutCondition, PutOpts};
use objdb_types::{ConditionalUpdateResult, Event, Record, ResourceName, ResourceSchema, VersionTag};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::codec;
use crate::error::ResourceError;
use crate::partition;

/// Mutates the payload in place before validation/write. Returning `Err`
/// aborts the operation; the store is never touched.
pub type BeforeHook = Arc<dyn Fn(&mut HashMap<String, Value>) -> Result<(), ResourceError> + Send + Sync>;

/// Subscriber invoked after a mutation has been durably committed.
pub type EventHandler = Arc<dyn Fn(Event) -> BoxFuture<'static, ()> + Send + Sync>;

const PARTITION_FANOUT: usize = 8;

/// One named collection of records, persisted as individual blob-store
/// objects under `<resource>/<id>` with auxiliary partition index objects
/// under `<resource>/_partitions/<partition>/<value>/<id>`.
pub struct Resource {
    schema: ResourceSchema,
    store: Arc<dyn BlobStore>,
    before_insert: RwLock<Vec<BeforeHook>>,
    before_update: RwLock<Vec<BeforeHook>>,
    before_patch: RwLock<Vec<BeforeHook>>,
    event_handlers: RwLock<Vec<EventHandler>>,
}

impl Resource {
    pub fn new(schema: ResourceSchema, store: Arc<dyn BlobStore>) -> Self {
        Resource {
            schema,
            store,
            before_insert: RwLock::new(Vec::new()),
            before_update: RwLock::new(Vec::new()),
            before_patch: RwLock::new(Vec::new()),
            event_handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &ResourceName {
        &self.schema.name
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    pub async fn on_before_insert(&self, hook: BeforeHook) {
        self.before_insert.write().await.push(hook);
    }

    pub async fn on_before_update(&self, hook: BeforeHook) {
        self.before_update.write().await.push(hook);
    }

    pub async fn on_before_patch(&self, hook: BeforeHook) {
        self.before_patch.write().await.push(hook);
    }

    pub async fn on_event(&self, handler: EventHandler) {
        self.event_handlers.write().await.push(handler);
    }

    /// Fires every subscriber as its own detached task rather than awaiting
    /// them in line: a mutating call's latency ends at its own write +
    /// partition-index + emission, not at however long downstream
    /// subscribers (replication fan-out, metrics) take to react.
    async fn emit(&self, event: Event) {
        let handlers = self.event_handlers.read().await;
        for handler in handlers.iter() {
            let handler = handler.clone();
            let event = event.clone();
            tokio::spawn(async move {
                handler(event).await;
            });
        }
    }

    fn primary_key(&self, id: &str) -> String {
        format!("{}/{}", self.schema.name.as_str(), id)
    }

    async fn run_hooks(&self, hooks: &RwLock<Vec<BeforeHook>>, data: &mut HashMap<String, Value>) -> Result<(), ResourceError> {
        for hook in hooks.read().await.iter() {
            hook(data)?;
        }
        Ok(())
    }

    fn touch_timestamps(&self, data: &mut HashMap<String, Value>, is_insert: bool) {
        if !self.schema.timestamps {
            return;
        }
        let now = Value::String(Utc::now().to_rfc3339());
        if is_insert {
            data.entry("createdAt".to_string()).or_insert_with(|| now.clone());
        }
        data.insert("updatedAt".to_string(), now);
    }

    async fn write_partitions(&self, data: &HashMap<String, Value>, id: &str) {
        if self.schema.partitions.is_empty() {
            return;
        }
        let write = |def: &objdb_types::PartitionDef| {
            let value = partition::partition_value(def, data);
            let store = self.store.clone();
            let resource = self.schema.name.as_str().to_string();
            let partition_name = def.name.clone();
            let id = id.to_string();
            async move {
                if let Some(value) = value {
                    let key = partition::partition_key(&resource, &partition_name, &value, &id);
                    if let Err(e) = store.put(&key, bytes::Bytes::new(), PutOpts::default()).await {
                        tracing::warn!(resource = %resource, partition = %partition_name, error = %e, "partition write failed");
                    }
                }
            }
        };

        if self.schema.async_partitions {
            for def in &self.schema.partitions {
                tokio::spawn(write(def));
            }
        } else {
            futures::stream::iter(self.schema.partitions.iter().map(write))
                .for_each_concurrent(PARTITION_FANOUT, |f| f)
                .await;
        }
    }

    async fn clear_partitions(&self, data: &HashMap<String, Value>, id: &str) {
        for def in &self.schema.partitions {
            if let Some(value) = partition::partition_value(def, data) {
                let key = partition::partition_key(self.schema.name.as_str(), &def.name, &value, id);
                if let Err(e) = self.store.delete(&key).await {
                    tracing::warn!(resource = %self.schema.name, partition = %def.name, error = %e, "partition cleanup failed");
                }
            }
        }
    }

    fn record_from(&self, id: &str, data: HashMap<String, Value>, etag: VersionTag) -> Record {
        Record { id: id.to_string(), data, etag: Some(etag) }
    }

    pub async fn insert(&self, mut data: HashMap<String, Value>) -> Result<Record, ResourceError> {
        let id = data
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ResourceError::Validation("missing required attribute 'id'".to_string()))?;

        self.run_hooks(&self.before_insert, &mut data).await?;
        self.touch_timestamps(&mut data, true);
        codec::validate(&self.schema, &data)?;

        let (body, metadata) = codec::encode(&self.schema, &data)?;
        let key = self.primary_key(&id);
        let etag = self
            .store
            .put(&key, body, PutOpts::if_none_match().with_metadata(metadata))
            .await
            .map_err(|e| match e {
                objdb_store::StoreError::PreconditionFailed { .. } => {
                    ResourceError::AlreadyExists(id.clone())
                }
                other => ResourceError::Store(other),
            })?;

        self.write_partitions(&data, &id).await;
        let record = self.record_from(&id, data, etag);
        self.emit(Event::Inserted { resource: self.schema.name.clone(), record: record.clone() }).await;
        Ok(record)
    }

    async fn read_current(&self, id: &str) -> Result<Record, ResourceError> {
        let key = self.primary_key(id);
        let obj = self
            .store
            .get(&key)
            .await
            .map_err(|e| match e {
                objdb_store::StoreError::NotFound(_) => ResourceError::NotFound(id.to_string()),
                other => ResourceError::Store(other),
            })?;
        let data = codec::decode(&self.schema, &obj.body, &obj.metadata)?;
        Ok(self.record_from(id, data, obj.etag))
    }

    /// Read-modify-write retry loop shared by `update`/`patch`. Transparent
    /// to the caller: a lost conditional-write race is retried rather than
    /// surfaced, unlike [`Resource::update_conditional`].
    async fn merge_write(
        &self,
        id: &str,
        fields: HashMap<String, Value>,
        hooks: &RwLock<Vec<BeforeHook>>,
    ) -> Result<Record, ResourceError> {
        const MAX_ATTEMPTS: u32 = 5;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let before = self.read_current(id).await?;
            let mut merged = before.data.clone();
            for (k, v) in &fields {
                merged.insert(k.clone(), v.clone());
            }
            self.run_hooks(hooks, &mut merged).await?;
            self.touch_timestamps(&mut merged, false);
            codec::validate(&self.schema, &merged)?;

            let (body, metadata) = codec::encode(&self.schema, &merged)?;
            let key = self.primary_key(id);
            let current_etag = before.etag.clone().expect("read_current always sets etag");
            match self
                .store
                .put(&key, body, PutOpts::if_match(current_etag).with_metadata(metadata))
                .await
            {
                Ok(etag) => {
                    self.write_partitions(&merged, id).await;
                    let record = self.record_from(id, merged, etag);
                    self.emit(Event::Updated {
                        resource: self.schema.name.clone(),
                        record: record.clone(),
                        before,
                    })
                    .await;
                    return Ok(record);
                }
                Err(objdb_store::StoreError::PreconditionFailed { .. }) if attempt < MAX_ATTEMPTS => {
                    continue;
                }
                Err(e) => return Err(ResourceError::Store(e)),
            }
        }
    }

    pub async fn update(&self, id: &str, fields: HashMap<String, Value>) -> Result<Record, ResourceError> {
        self.merge_write(id, fields, &self.before_update).await
    }

    pub async fn patch(&self, id: &str, fields: HashMap<String, Value>) -> Result<Record, ResourceError> {
        self.merge_write(id, fields, &self.before_patch).await
    }

    /// The sole atomicity primitive the queue relies on. A stale `ifMatch`
    /// is a normal outcome (`success: false`), never an `Err`.
    pub async fn update_conditional(
        &self,
        id: &str,
        fields: HashMap<String, Value>,
        if_match: VersionTag,
    ) -> Result<ConditionalUpdateResult, ResourceError> {
        let before = match self.read_current(id).await {
            Ok(r) => r,
            Err(ResourceError::NotFound(_)) => {
                return Ok(ConditionalUpdateResult {
                    success: false,
                    data: None,
                    etag: None,
                    error: Some("not found".to_string()),
                })
            }
            Err(e) => return Err(e),
        };
        let mut merged = before.data.clone();
        for (k, v) in fields {
            merged.insert(k, v);
        }
        codec::validate(&self.schema, &merged)?;
        let (body, metadata) = codec::encode(&self.schema, &merged)?;
        let key = self.primary_key(id);
        match self.store.put(&key, body, PutOpts::if_match(if_match).with_metadata(metadata)).await {
            Ok(etag) => {
                self.write_partitions(&merged, id).await;
                let record = self.record_from(id, merged, etag.clone());
                self.emit(Event::Updated {
                    resource: self.schema.name.clone(),
                    record: record.clone(),
                    before,
                })
                .await;
                Ok(ConditionalUpdateResult {
                    success: true,
                    data: Some(record),
                    etag: Some(etag),
                    error: None,
                })
            }
            Err(objdb_store::StoreError::PreconditionFailed { .. }) => Ok(ConditionalUpdateResult {
                success: false,
                data: None,
                etag: None,
                error: Some("precondition failed".to_string()),
            }),
            Err(e) => Err(ResourceError::Store(e)),
        }
    }

    pub async fn delete(&self, id: &str) -> Result<Record, ResourceError> {
        let before = self.read_current(id).await?;
        self.store.delete(&self.primary_key(id)).await?;
        self.clear_partitions(&before.data, id).await;
        self.emit(Event::Deleted { resource: self.schema.name.clone(), record: before.clone() }).await;
        Ok(before)
    }

    pub async fn delete_many(&self, ids: &[String]) -> Vec<Result<Record, ResourceError>> {
        futures::stream::iter(ids.iter().map(|id| self.delete(id)))
            .buffer_unordered(PARTITION_FANOUT)
            .collect()
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Record, ResourceError> {
        self.read_current(id).await
    }

    pub async fn get_or_null(&self, id: &str) -> Result<Option<Record>, ResourceError> {
        match self.read_current(id).await {
            Ok(r) => Ok(Some(r)),
            Err(ResourceError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn get_many(&self, ids: &[String]) -> Result<Vec<Record>, ResourceError> {
        let results: Vec<_> = futures::stream::iter(ids.iter().map(|id| self.get_or_null(id)))
            .buffer_unordered(PARTITION_FANOUT)
            .collect()
            .await;
        results.into_iter().filter_map(|r| r.transpose()).collect()
    }

    /// Lists primary-key ids under this resource, excluding the
    /// `_partitions` sub-prefix.
    pub async fn list_ids(&self) -> Result<Vec<String>, ResourceError> {
        let prefix = format!("{}/", self.schema.name.as_str());
        let page = self.store.list(&prefix, None).await?;
        let partitions_prefix = format!("{prefix}_partitions/");
        Ok(page
            .objects
            .into_iter()
            .filter(|o| !o.key.starts_with(&partitions_prefix))
            .filter_map(|o| o.key.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    pub async fn list(&self, limit: Option<usize>, offset: Option<usize>) -> Result<Vec<Record>, ResourceError> {
        let ids = self.list_ids().await?;
        let ids = apply_window(ids, limit, offset);
        self.get_many(&ids).await
    }

    pub async fn page(&self, offset: usize, size: usize) -> Result<Vec<Record>, ResourceError> {
        self.list(Some(size), Some(offset)).await
    }

    pub async fn query(&self, filter: impl Fn(&Record) -> bool) -> Result<Vec<Record>, ResourceError> {
        let all = self.list(None, None).await?;
        Ok(all.into_iter().filter(filter).collect())
    }

    pub async fn count(&self, filter: Option<&dyn Fn(&Record) -> bool>) -> Result<usize, ResourceError> {
        match filter {
            None => Ok(self.list_ids().await?.len()),
            Some(f) => Ok(self.list(None, None).await?.iter().filter(|r| f(r)).count()),
        }
    }

    /// Lists ids whose partition value matches `value`, or every id under
    /// the partition when `value` is `None`. Under `asyncPartitions`
    /// callers must tolerate lag between a write and its visibility here.
    pub async fn list_partition(
        &self,
        partition_name: &str,
        value: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<String>, ResourceError> {
        let prefix = partition::partition_prefix(self.schema.name.as_str(), partition_name, value);
        let page = self.store.list(&prefix, limit).await?;
        Ok(page.objects.into_iter().filter_map(|o| o.key.rsplit('/').next().map(str::to_string)).collect())
    }
}

fn apply_window(mut ids: Vec<String>, limit: Option<usize>, offset: Option<usize>) -> Vec<String> {
    if let Some(offset) = offset {
        if offset >= ids.len() {
            return Vec::new();
        }
        ids = ids.split_off(offset);
    }
    if let Some(limit) = limit {
        ids.truncate(limit);
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use objdb_store::ObjectStoreBlob;
    use objdb_types::{AttributeDef, AttributeType, PartitionDef, ResourceBehavior};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn widgets(behavior: ResourceBehavior) -> Resource {
        let schema = ResourceSchema {
            name: ResourceName::new("widgets"),
            attributes: vec![
                AttributeDef { name: "id".into(), attr_type: AttributeType::String, required: true },
                AttributeDef { name: "owner".into(), attr_type: AttributeType::String, required: false },
            ],
            behavior,
            partitions: vec![PartitionDef { name: "byOwner".into(), fields: vec!["owner".into()], max_length: None }],
            timestamps: false,
            async_partitions: false,
        };
        Resource::new(schema, Arc::new(ObjectStoreBlob::in_memory()))
    }

    fn rec(id: &str, owner: &str) -> HashMap<String, Value> {
        let mut m = HashMap::new();
        m.insert("id".to_string(), json!(id));
        m.insert("owner".to_string(), json!(owner));
        m
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let r = widgets(ResourceBehavior::BodyOnly);
        r.insert(rec("w1", "alice")).await.unwrap();
        let got = r.get("w1").await.unwrap();
        assert_eq!(got.get("owner"), Some(&json!("alice")));
    }

    #[tokio::test]
    async fn insert_duplicate_id_fails() {
        let r = widgets(ResourceBehavior::BodyOnly);
        r.insert(rec("w1", "alice")).await.unwrap();
        let err = r.insert(rec("w1", "bob")).await.unwrap_err();
        assert!(matches!(err, ResourceError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let r = widgets(ResourceBehavior::BodyOnly);
        assert!(matches!(r.get("missing").await, Err(ResourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn get_or_null_returns_none_for_missing() {
        let r = widgets(ResourceBehavior::BodyOnly);
        assert!(r.get_or_null("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let r = widgets(ResourceBehavior::BodyOnly);
        r.insert(rec("w1", "alice")).await.unwrap();
        let mut fields = HashMap::new();
        fields.insert("owner".to_string(), json!("bob"));
        r.update("w1", fields).await.unwrap();
        let got = r.get("w1").await.unwrap();
        assert_eq!(got.get("owner"), Some(&json!("bob")));
    }

    #[tokio::test]
    async fn update_conditional_fails_on_stale_etag() {
        let r = widgets(ResourceBehavior::BodyOnly);
        let rec1 = r.insert(rec("w1", "alice")).await.unwrap();
        let mut fields = HashMap::new();
        fields.insert("owner".to_string(), json!("bob"));
        r.update("w1", fields.clone()).await.unwrap();

        let result = r.update_conditional("w1", fields, rec1.etag.unwrap()).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn update_conditional_succeeds_on_current_etag() {
        let r = widgets(ResourceBehavior::BodyOnly);
        let rec1 = r.insert(rec("w1", "alice")).await.unwrap();
        let mut fields = HashMap::new();
        fields.insert("owner".to_string(), json!("bob"));
        let result = r.update_conditional("w1", fields, rec1.etag.unwrap()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.data.unwrap().get("owner"), Some(&json!("bob")));
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let r = widgets(ResourceBehavior::BodyOnly);
        r.insert(rec("w1", "alice")).await.unwrap();
        r.delete("w1").await.unwrap();
        assert!(r.get_or_null("w1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_partition_finds_matching_value() {
        let r = widgets(ResourceBehavior::BodyOnly);
        r.insert(rec("w1", "alice")).await.unwrap();
        r.insert(rec("w2", "bob")).await.unwrap();
        let ids = r.list_partition("byOwner", Some("alice"), None).await.unwrap();
        assert_eq!(ids, vec!["w1".to_string()]);
    }

    #[tokio::test]
    async fn list_ids_excludes_partition_keys() {
        let r = widgets(ResourceBehavior::BodyOnly);
        r.insert(rec("w1", "alice")).await.unwrap();
        let ids = r.list_ids().await.unwrap();
        assert_eq!(ids, vec!["w1".to_string()]);
    }

    #[tokio::test]
    async fn query_filters_by_predicate() {
        let r = widgets(ResourceBehavior::BodyOnly);
        r.insert(rec("w1", "alice")).await.unwrap();
        r.insert(rec("w2", "bob")).await.unwrap();
        let results = r.query(|rec| rec.get("owner") == Some(&json!("bob"))).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "w2");
    }

    #[tokio::test]
    async fn event_handler_fires_on_insert() {
        let r = widgets(ResourceBehavior::BodyOnly);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        r.on_event(Arc::new(move |event| {
            let counter = counter.clone();
            Box::pin(async move {
                if matches!(event, Event::Inserted { .. }) {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
        }))
        .await;
        r.insert(rec("w1", "alice")).await.unwrap();
        // emit() detaches handlers onto their own tasks; give the runtime a
        // chance to run it before asserting.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn before_insert_hook_can_mutate_payload() {
        let r = widgets(ResourceBehavior::BodyOnly);
        r.on_before_insert(Arc::new(|data| {
            data.insert("owner".to_string(), json!("system"));
            Ok(())
        }))
        .await;
        r.insert(rec("w1", "alice")).await.unwrap();
        let got = r.get("w1").await.unwrap();
        assert_eq!(got.get("owner"), Some(&json!("system")));
    }

    #[tokio::test]
    async fn before_insert_hook_error_aborts_write() {
        let r = widgets(ResourceBehavior::BodyOnly);
        r.on_before_insert(Arc::new(|_| Err(ResourceError::Validation("nope".into())))).await;
        assert!(r.insert(rec("w1", "alice")).await.is_err());
        assert!(r.get_or_null("w1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncate_data_behavior_drops_unknown_field_on_read() {
        let r = widgets(ResourceBehavior::TruncateData);
        let mut data = rec("w1", "alice");
        data.insert("junk".to_string(), json!("x"));
        r.insert(data).await.unwrap();
        let got = r.get("w1").await.unwrap();
        assert!(!got.data.contains_key("junk"));
    }
}
