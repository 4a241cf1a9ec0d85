use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use objdb_resource::Resource;
use objdb_types::{Event, MutationOp, PluginEvent, PluginEventBus, Record, ReplicationLogEntry, ReplicationStatus};
use objdb_util::new_id;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::ReplicationError;
use crate::filter::ResourceSelector;
use crate::replicator::Replicator;
use crate::schema::{fields_to_log_entry, log_entry_to_fields};

const DEFAULT_CONCURRENCY: usize = 5;
const BACKOFF_BASE: Duration = Duration::from_secs(1);

fn sanitize(data: &HashMap<String, Value>) -> Value {
    let cleaned: serde_json::Map<String, Value> = data
        .iter()
        .filter(|(key, _)| !key.starts_with('_') && !matches!(key.as_str(), "$overflow" | "$before" | "$after"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Value::Object(cleaned)
}

/// Installs post-mutation listeners across every managed resource
/// (excluding the internal log resource and anything the global filter
/// excludes) and fans each event out to every interested replicator.
pub struct ReplicationFabric {
    resources: HashMap<String, Arc<Resource>>,
    log: Arc<Resource>,
    replicators: Vec<Arc<dyn Replicator>>,
    global_filter: ResourceSelector,
    concurrency: usize,
    max_retries: u32,
    event_bus: PluginEventBus,
}

impl ReplicationFabric {
    pub fn new(
        resources: HashMap<String, Arc<Resource>>,
        log: Arc<Resource>,
        replicators: Vec<Arc<dyn Replicator>>,
    ) -> Arc<Self> {
        Arc::new(ReplicationFabric {
            resources,
            log,
            replicators,
            global_filter: ResourceSelector::All,
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: 3,
            event_bus: PluginEventBus::new(),
        })
    }

    /// Subscribes this fabric's `plg:replicator:*` emissions to a shared
    /// bus. Defaults to an unsubscribed, private bus so existing callers
    /// are unaffected.
    pub fn with_event_bus(mut self: Arc<Self>, bus: PluginEventBus) -> Arc<Self> {
        Arc::get_mut(&mut self).expect("fabric not yet shared").event_bus = bus;
        self
    }

    pub fn with_global_filter(mut self: Arc<Self>, filter: ResourceSelector) -> Arc<Self> {
        Arc::get_mut(&mut self).expect("fabric not yet shared").global_filter = filter;
        self
    }

    pub fn with_concurrency(mut self: Arc<Self>, concurrency: usize) -> Arc<Self> {
        Arc::get_mut(&mut self).expect("fabric not yet shared").concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_retries(mut self: Arc<Self>, max_retries: u32) -> Arc<Self> {
        Arc::get_mut(&mut self).expect("fabric not yet shared").max_retries = max_retries;
        self
    }

    /// Registers the fan-out handler on every managed, non-excluded
    /// resource's event bus. Call once after constructing the fabric.
    pub async fn install(self: &Arc<Self>) {
        for (name, resource) in &self.resources {
            if resource.name().as_str() == self.log.name().as_str() {
                continue;
            }
            if !self.global_filter.allows(name) {
                continue;
            }
            let fabric = self.clone();
            resource
                .on_event(Arc::new(move |event| {
                    let fabric = fabric.clone();
                    Box::pin(async move { fabric.handle_event(event).await })
                }))
                .await;
        }
    }

    async fn handle_event(&self, event: Event) {
        let resource_name = event.resource().as_str().to_string();
        let (op, record, before_data) = match &event {
            Event::Inserted { record, .. } => (MutationOp::Insert, record.clone(), None),
            Event::Updated { record, before, .. } => (MutationOp::Update, record.clone(), Some(sanitize(&before.data))),
            Event::Deleted { record, .. } => (MutationOp::Delete, record.clone(), None),
        };

        let fallback = sanitize(&record.data);
        let data = self.enrich(&resource_name, &record.id, fallback).await;

        let candidates: Vec<Arc<dyn Replicator>> = self
            .replicators
            .iter()
            .filter(|r| r.should_replicate_resource(&resource_name, op))
            .cloned()
            .collect();

        let id = record.id.clone();
        let before_data = before_data.clone();
        let resource_name_for_tasks = resource_name.clone();
        let data_for_tasks = data.clone();
        let max_retries = self.max_retries;
        let results = objdb_tasks::map_bounded(candidates, self.concurrency, move |replicator| {
            let resource_name = resource_name_for_tasks.clone();
            let data = data_for_tasks.clone();
            let id = id.clone();
            let before_data = before_data.clone();
            async move { (replicator.clone(), replicate_with_backoff(&*replicator, &resource_name, op, &data, &id, before_data.as_ref(), max_retries).await) }
        })
        .await;

        for outcome in results.into_iter().flatten() {
            let (replicator, result) = outcome;
            match result {
                Ok(()) => {
                    info!(replicator = replicator.id(), resource = %resource_name, "replicated");
                    self.event_bus.emit(PluginEvent::ReplicatorReplicated {
                        replicator: replicator.id().to_string(),
                        resource: resource_name.clone(),
                        op,
                    });
                }
                Err(e) => {
                    warn!(replicator = replicator.id(), resource = %resource_name, error = %e, "replication failed");
                    self.event_bus.emit(PluginEvent::ReplicatorError {
                        replicator: replicator.id().to_string(),
                        resource: resource_name.clone(),
                        op,
                        error: e.to_string(),
                    });
                    let _ = self.log_failure(replicator.id(), &resource_name, op, &data, &record.id, &e.to_string()).await;
                }
            }
        }
    }

    async fn enrich(&self, resource_name: &str, id: &str, fallback: Value) -> Value {
        if let Some(resource) = self.resources.get(resource_name) {
            if let Ok(Some(record)) = resource.get_or_null(id).await {
                return sanitize(&record.data);
            }
        }
        fallback
    }

    async fn log_failure(
        &self,
        replicator: &str,
        resource: &str,
        op: MutationOp,
        data: &Value,
        id: &str,
        error: &str,
    ) -> Result<(), ReplicationError> {
        let entry = ReplicationLogEntry {
            id: new_id(),
            replicator: replicator.to_string(),
            resource: resource.to_string(),
            operation: op,
            data: data.clone(),
            timestamp: Utc::now(),
            created_at: Utc::now(),
            status: ReplicationStatus::Failed,
            error: Some(error.to_string()),
            retry_count: 0,
        };
        self.log.insert(log_entry_to_fields(&entry)?).await?;
        Ok(())
    }

    /// Replays every record of every resource `replicator_id` cares about
    /// as an `insert`, paged by `batch_size`. A single page error aborts
    /// the whole sync with that error.
    pub async fn sync_all_data(&self, replicator_id: &str, batch_size: usize) -> Result<usize, ReplicationError> {
        let replicator = self
            .replicators
            .iter()
            .find(|r| r.id() == replicator_id)
            .cloned()
            .ok_or_else(|| ReplicationError::HttpStatus { url: replicator_id.to_string(), status: 404 })?;

        let mut total = 0usize;
        for (name, resource) in &self.resources {
            if resource.name().as_str() == self.log.name().as_str() {
                continue;
            }
            if !replicator.should_replicate_resource(name, MutationOp::Insert) {
                continue;
            }
            let mut offset = 0usize;
            loop {
                let page: Vec<Record> = resource.page(offset, batch_size).await?;
                if page.is_empty() {
                    break;
                }
                let replicator = replicator.clone();
                let name = name.clone();
                let results = objdb_tasks::map_bounded(page.clone(), self.concurrency, move |record| {
                    let replicator = replicator.clone();
                    let name = name.clone();
                    async move {
                        let data = sanitize(&record.data);
                        replicator.replicate(&name, MutationOp::Insert, &data, &record.id, None).await
                    }
                })
                .await;
                for outcome in results {
                    match outcome {
                        Some(Ok(())) => total += 1,
                        Some(Err(e)) => return Err(e),
                        None => {}
                    }
                }
                offset += page.len();
            }
        }
        Ok(total)
    }

    /// Re-drives every `status=failed` log entry through the same
    /// replicator, patching the row to `success` or back to `failed` with
    /// `retryCount` incremented.
    pub async fn retry_failed_replicators(&self) -> Result<(usize, usize), ReplicationError> {
        let failed_ids = self.log.list_partition("byStatus", Some("failed"), None).await?;
        let mut succeeded = 0usize;
        let mut still_failed = 0usize;

        for id in failed_ids {
            let Some(record) = self.log.get_or_null(&id).await? else { continue };
            let entry = fields_to_log_entry(&record.data)?;
            let Some(replicator) = self.replicators.iter().find(|r| r.id() == entry.replicator) else { continue };

            let result = replicator
                .replicate(&entry.resource, entry.operation, &entry.data, &record.id, None)
                .await;

            let mut fields = HashMap::new();
            fields.insert("retry_count".to_string(), Value::Number((entry.retry_count + 1).into()));
            match result {
                Ok(()) => {
                    fields.insert("status".to_string(), Value::String("success".to_string()));
                    fields.insert("error".to_string(), Value::Null);
                    succeeded += 1;
                }
                Err(e) => {
                    fields.insert("status".to_string(), Value::String("failed".to_string()));
                    fields.insert("error".to_string(), Value::String(e.to_string()));
                    still_failed += 1;
                }
            }
            self.log.patch(&id, fields).await?;
        }
        Ok((succeeded, still_failed))
    }
}

async fn replicate_with_backoff(
    replicator: &dyn Replicator,
    resource: &str,
    op: MutationOp,
    data: &Value,
    id: &str,
    before: Option<&Value>,
    max_retries: u32,
) -> Result<(), ReplicationError> {
    let mut attempt = 0;
    loop {
        match replicator.replicate(resource, op, data, id, before).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < max_retries => {
                attempt += 1;
                let delay = BACKOFF_BASE * 2u32.pow(attempt - 1);
                warn!(replicator = replicator.id(), attempt, ?delay, error = %e, "retrying replication");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
