use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use objdb_coordinator::{Coordinator, WorkerRegistry};
use objdb_resource::Resource;
use objdb_store::{Lease, PluginStorage, PutCondition, StoreError};
use objdb_types::{DispatchTicket, PluginEvent, PluginEventBus, QueueEntry, QueueStatus, TicketStatus};
use objdb_util::{new_id, new_prefixed_id};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::cache::TimedCache;
use crate::config::{retry_backoff, FailureStrategy, OrderingMode, QueueConfig};
use crate::entry::{dead_letter_resource_schema, entry_to_fields, fields_to_entry, DeadLetterRecord};
use crate::error::QueueError;

/// Reason a `renewLock` call was rejected. Emitted as `lock-renewal-rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewRejectReason {
    TerminalState,
    LockReleased,
    TokenMismatch,
    InvalidState,
}

/// At-most-once-per-ticket, FIFO-preserving distributed queue over a
/// managed resource. Queue entries are themselves records in a managed
/// resource (`plg_s3queue_<resource>_queue`).
pub struct S3Queue {
    target: Arc<Resource>,
    entries: Arc<Resource>,
    dead_letter: Option<Arc<Resource>>,
    storage: PluginStorage,
    coordinator: Option<Arc<Coordinator>>,
    worker_registry: Option<Arc<WorkerRegistry>>,
    config: QueueConfig,
    worker_id: String,
    processed_cache: Mutex<TimedCache>,
    recovery_in_flight: AtomicBool,
    event_bus: PluginEventBus,
}

impl S3Queue {
    pub fn new(
        target: Arc<Resource>,
        entries: Arc<Resource>,
        dead_letter: Option<Arc<Resource>>,
        storage: PluginStorage,
        coordinator: Option<Arc<Coordinator>>,
        worker_registry: Option<Arc<WorkerRegistry>>,
        config: QueueConfig,
        worker_id: impl Into<String>,
    ) -> Result<Self, QueueError> {
        config.validate()?;
        if config.failure_strategy != FailureStrategy::Retry && dead_letter.is_none() {
            return Err(QueueError::Configuration(
                "dead-letter/hybrid strategy requires a dead-letter resource".to_string(),
            ));
        }
        let processed_cache_ttl = config.processed_cache_ttl;
        Ok(S3Queue {
            target,
            entries,
            dead_letter,
            storage: storage.namespaced("queue"),
            coordinator,
            worker_registry,
            config,
            worker_id: worker_id.into(),
            processed_cache: Mutex::new(TimedCache::new(processed_cache_ttl)),
            recovery_in_flight: AtomicBool::new(false),
            event_bus: PluginEventBus::new(),
        })
    }

    /// Subscribes this queue's `plg:s3-queue:*` emissions to a shared bus.
    /// Defaults to an unsubscribed, private bus so existing callers are
    /// unaffected.
    pub fn with_event_bus(mut self, bus: PluginEventBus) -> Self {
        self.event_bus = bus;
        self
    }

    pub fn dead_letter_schema(target_resource: &str) -> objdb_types::ResourceSchema {
        dead_letter_resource_schema(target_resource)
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Inserts the target record, then a `pending` queue entry referencing
    /// it. FIFO ordering downstream is by `queuedAt`, `id` as tiebreaker.
    pub async fn enqueue(&self, data: std::collections::HashMap<String, Value>) -> Result<QueueEntry, QueueError> {
        let record = self.target.insert(data).await?;
        let now = Utc::now();
        let entry = QueueEntry {
            id: new_prefixed_id("msg"),
            original_id: record.id,
            status: QueueStatus::Pending,
            visible_at: now,
            claimed_by: None,
            claimed_at: None,
            lock_token: None,
            attempts: 0,
            max_attempts: self.config.max_attempts,
            queued_at: now,
            error: None,
            result: None,
            created_at: now,
            completed_at: None,
        };
        let fields = entry_to_fields(&entry)?;
        self.entries.insert(fields).await?;
        Ok(entry)
    }

    fn sort_candidates(&self, candidates: &mut [QueueEntry]) {
        match self.config.ordering_mode {
            OrderingMode::Fifo => candidates.sort_by(|a, b| a.queued_at.cmp(&b.queued_at).then(a.id.cmp(&b.id))),
            OrderingMode::Lifo => candidates.sort_by(|a, b| b.queued_at.cmp(&a.queued_at).then(a.id.cmp(&b.id))),
        }
    }

    async fn list_claimable_pending(&self, batch: usize) -> Result<Vec<QueueEntry>, QueueError> {
        let ids = self.entries.list_partition("byStatus", Some("pending"), None).await?;
        let now = Utc::now();
        let mut out = Vec::new();
        for id in ids {
            if let Some(record) = self.entries.get_or_null(&id).await? {
                let entry = fields_to_entry(&record.data)?;
                if entry.eligible_for_claim(now) {
                    out.push(entry);
                }
            }
            if out.len() >= batch {
                break;
            }
        }
        Ok(out)
    }

    async fn processed_marker_present(&self, queue_id: &str) -> Result<bool, QueueError> {
        let local_hit = self.processed_cache.lock().await.contains(queue_id);
        if local_hit {
            return Ok(true);
        }
        Ok(self.storage.get_json::<bool>(&["processed", queue_id]).await?.is_some())
    }

    async fn mark_processed(&self, queue_id: &str) -> Result<(), QueueError> {
        self.processed_cache.lock().await.insert(queue_id.to_string());
        self.storage.put_json(&["processed", queue_id], &true, Some(self.config.processed_cache_ttl)).await?;
        Ok(())
    }

    async fn clear_processed_marker(&self, queue_id: &str) -> Result<(), QueueError> {
        self.processed_cache.lock().await.remove(queue_id);
        self.storage.delete(&["processed", queue_id]).await?;
        Ok(())
    }

    /// Acquires a short-lived exclusive lease on `queue_id`, checks/sets the
    /// processed marker, releases the lease, then attempts the conditional
    /// claim itself. Returns `None` on any lost race rather than erroring.
    async fn conditional_claim(&self, queue_id: &str) -> Result<Option<QueueEntry>, QueueError> {
        let lock_key = format!("msg-{queue_id}");
        let lease = Lease::new(self.storage.clone());
        if !lease.acquire(&lock_key, &self.worker_id, self.config.lock_ttl).await? {
            return Ok(None);
        }

        if self.processed_marker_present(queue_id).await? {
            lease.release(&lock_key, &self.worker_id).await?;
            return Ok(None);
        }
        self.mark_processed(queue_id).await?;
        lease.release(&lock_key, &self.worker_id).await?;

        let record = match self.entries.get_or_null(queue_id).await? {
            Some(r) => r,
            None => {
                self.clear_processed_marker(queue_id).await?;
                return Ok(None);
            }
        };
        let mut entry = fields_to_entry(&record.data)?;
        let now = Utc::now();
        if entry.status != QueueStatus::Pending || entry.visible_at > now {
            self.clear_processed_marker(queue_id).await?;
            return Ok(None);
        }

        let lock_token = new_id();
        entry.status = QueueStatus::Processing;
        entry.claimed_by = Some(self.worker_id.clone());
        entry.claimed_at = Some(now);
        entry.lock_token = Some(lock_token);
        entry.visible_at = now + chrono::Duration::from_std(self.config.visibility_timeout).unwrap_or_default();
        entry.attempts += 1;

        let fields = entry_to_fields(&entry)?;
        let etag = record.etag.clone().expect("read always sets etag");
        let result = self.entries.update_conditional(queue_id, fields, etag).await?;
        if result.success {
            Ok(Some(entry))
        } else {
            self.clear_processed_marker(queue_id).await?;
            Ok(None)
        }
    }

    async fn claim_via_tickets(&self) -> Result<Option<QueueEntry>, QueueError> {
        for ticket in self.list_available_tickets().await? {
            if !self.try_claim_ticket(&ticket).await? {
                continue;
            }
            match self.conditional_claim(&ticket.message_id).await? {
                Some(entry) => {
                    self.delete_ticket(&ticket.ticket_id).await?;
                    return Ok(Some(entry));
                }
                None => {
                    self.release_ticket(&ticket.ticket_id).await?;
                }
            }
        }
        Ok(None)
    }

    async fn claim_via_poll(&self) -> Result<Option<QueueEntry>, QueueError> {
        self.recover_stalled_messages().await?;
        let mut candidates = self.list_claimable_pending(self.config.poll_batch_size).await?;
        self.sort_candidates(&mut candidates);

        if self.config.ordering_guarantee && self.coordinator.is_some() {
            let lease = Lease::new(self.storage.clone());
            let order_key = format!("order-{}", self.queue_name());
            if !lease.acquire(&order_key, &self.worker_id, self.config.ordering_lock_ttl).await? {
                return Ok(None);
            }
            let result = match candidates.first() {
                Some(first) => self.conditional_claim(&first.id).await?,
                None => None,
            };
            lease.release(&order_key, &self.worker_id).await?;
            if result.is_none() && !candidates.is_empty() {
                tracing::debug!(queue = %self.queue_name(), "ordering-best-effort");
            }
            return Ok(result);
        }

        for candidate in candidates {
            if let Some(entry) = self.conditional_claim(&candidate.id).await? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Full claim protocol: ticket path when a coordinator is present and
    /// ordering is guaranteed, poll path otherwise.
    pub async fn claim(&self) -> Result<Option<QueueEntry>, QueueError> {
        if self.coordinator.is_some() && self.config.ordering_guarantee {
            return self.claim_via_tickets().await;
        }
        self.claim_via_poll().await
    }

    pub async fn renew_lock(
        &self,
        queue_id: &str,
        lock_token: &str,
        extra: Duration,
    ) -> Result<Result<(), RenewRejectReason>, QueueError> {
        let record = match self.entries.get_or_null(queue_id).await? {
            Some(r) => r,
            None => {
                self.emit_renewal_rejected(queue_id, RenewRejectReason::TerminalState);
                return Ok(Err(RenewRejectReason::TerminalState));
            }
        };
        let entry = fields_to_entry(&record.data)?;
        if entry.status != QueueStatus::Processing {
            self.emit_renewal_rejected(queue_id, RenewRejectReason::TerminalState);
            return Ok(Err(RenewRejectReason::TerminalState));
        }
        match &entry.lock_token {
            None => {
                self.emit_renewal_rejected(queue_id, RenewRejectReason::LockReleased);
                return Ok(Err(RenewRejectReason::LockReleased));
            }
            Some(token) if token != lock_token => {
                self.emit_renewal_rejected(queue_id, RenewRejectReason::TokenMismatch);
                return Ok(Err(RenewRejectReason::TokenMismatch));
            }
            _ => {}
        }

        let mut updated = entry;
        updated.visible_at =
            std::cmp::max(updated.visible_at, Utc::now()) + chrono::Duration::from_std(extra).unwrap_or_default();
        let fields = entry_to_fields(&updated)?;
        let etag = record.etag.clone().expect("read always sets etag");
        let result = self.entries.update_conditional(queue_id, fields, etag).await?;
        if result.success {
            self.event_bus.emit(PluginEvent::LockRenewed { queue: self.queue_name().to_string(), id: queue_id.to_string() });
            Ok(Ok(()))
        } else {
            self.emit_renewal_rejected(queue_id, RenewRejectReason::InvalidState);
            Ok(Err(RenewRejectReason::InvalidState))
        }
    }

    fn emit_renewal_rejected(&self, queue_id: &str, reason: RenewRejectReason) {
        self.event_bus.emit(PluginEvent::LockRenewalRejected {
            queue: self.queue_name().to_string(),
            id: queue_id.to_string(),
            reason: format!("{reason:?}"),
        });
    }

    pub async fn complete_message(
        &self,
        queue_id: &str,
        lock_token: &str,
        result_value: Option<Value>,
    ) -> Result<bool, QueueError> {
        let record = self.entries.get(queue_id).await?;
        let entry = fields_to_entry(&record.data)?;
        if entry.lock_token.as_deref() != Some(lock_token) {
            return Ok(false);
        }
        let attempts = entry.attempts;
        let max_attempts = entry.max_attempts;
        let original_id = entry.original_id.clone();
        let mut updated = entry;
        updated.status = QueueStatus::Completed;
        updated.lock_token = None;
        updated.completed_at = Some(Utc::now());
        updated.result = result_value;
        let fields = entry_to_fields(&updated)?;
        let etag = record.etag.clone().expect("read always sets etag");
        let success = self.entries.update_conditional(queue_id, fields, etag).await?.success;
        if success {
            let queue = self.queue_name().to_string();
            self.event_bus.emit(PluginEvent::MessageCompleted { queue: queue.clone(), original_id: original_id.clone() });
            self.event_bus.emit(PluginEvent::MessageOutcome {
                queue,
                original_id,
                final_status: QueueStatus::Completed,
                attempts,
                max_attempts,
            });
        }
        Ok(success)
    }

    async fn route_to_dead_letter(&self, entry: &QueueEntry, error: &str) -> Result<(), QueueError> {
        let Some(dead_letter) = &self.dead_letter else {
            return Err(QueueError::Configuration(
                "dead-letter/hybrid strategy requires a dead-letter resource".to_string(),
            ));
        };
        let record = DeadLetterRecord {
            id: new_id(),
            original_id: entry.original_id.clone(),
            queue_id: entry.id.clone(),
            data: entry.result.clone().unwrap_or(Value::Null),
            error: error.to_string(),
            attempts: entry.attempts,
            created_at: Utc::now(),
        };
        let Value::Object(map) = serde_json::to_value(&record)? else {
            unreachable!("DeadLetterRecord always serializes to an object")
        };
        dead_letter.insert(map.into_iter().collect()).await?;
        Ok(())
    }

    /// Applies the failure strategy: retry-with-backoff, dead-letter, or
    /// hybrid. A terminal state is always reached.
    pub async fn fail_message(
        &self,
        queue_id: &str,
        lock_token: &str,
        error: impl Into<String>,
    ) -> Result<bool, QueueError> {
        let error = error.into();
        let record = self.entries.get(queue_id).await?;
        let entry = fields_to_entry(&record.data)?;
        if entry.lock_token.as_deref() != Some(lock_token) {
            return Ok(false);
        }

        let mut updated = entry.clone();
        updated.error = Some(error.clone());
        updated.lock_token = None;
        let exhausted = entry.attempts >= entry.max_attempts;

        let should_dead_letter = match self.config.failure_strategy {
            FailureStrategy::Retry => false,
            FailureStrategy::DeadLetter => true,
            FailureStrategy::Hybrid => exhausted,
        };

        if should_dead_letter {
            self.route_to_dead_letter(&updated, &error).await?;
            updated.status = QueueStatus::Dead;
            updated.completed_at = Some(Utc::now());
        } else if exhausted {
            updated.status = QueueStatus::Failed;
            updated.completed_at = Some(Utc::now());
        } else {
            updated.status = QueueStatus::Pending;
            updated.visible_at = Utc::now() + chrono::Duration::from_std(retry_backoff(entry.attempts)).unwrap_or_default();
            updated.claimed_by = None;
            updated.claimed_at = None;
        }

        let fields = entry_to_fields(&updated)?;
        let etag = record.etag.clone().expect("read always sets etag");
        let success = self.entries.update_conditional(queue_id, fields, etag).await?.success;
        if success {
            let queue = self.queue_name().to_string();
            let original_id = updated.original_id.clone();
            match updated.status {
                QueueStatus::Pending => {
                    self.event_bus.emit(PluginEvent::MessageRetry {
                        queue,
                        original_id,
                        attempts: entry.attempts,
                    });
                }
                QueueStatus::Failed => {
                    self.event_bus.emit(PluginEvent::MessageFailed {
                        queue: queue.clone(),
                        original_id: original_id.clone(),
                        error: error.clone(),
                    });
                    self.event_bus.emit(PluginEvent::MessageOutcome {
                        queue,
                        original_id,
                        final_status: QueueStatus::Failed,
                        attempts: entry.attempts,
                        max_attempts: entry.max_attempts,
                    });
                }
                QueueStatus::Dead => {
                    self.event_bus.emit(PluginEvent::MessageDead { queue: queue.clone(), original_id: original_id.clone(), error: error.clone() });
                    self.event_bus.emit(PluginEvent::MessageOutcome {
                        queue,
                        original_id,
                        final_status: QueueStatus::Dead,
                        attempts: entry.attempts,
                        max_attempts: entry.max_attempts,
                    });
                }
                _ => {}
            }
        }
        Ok(success)
    }

    /// Reverts stale `processing` entries (`visibleAt <= now`) to `pending`,
    /// or routes them to a terminal state when attempts are exhausted.
    /// Single-flight: overlapping calls while one is in progress are no-ops.
    pub async fn recover_stalled_messages(&self) -> Result<usize, QueueError> {
        if self.recovery_in_flight.swap(true, Ordering::SeqCst) {
            return Ok(0);
        }
        let result = self.recover_stalled_messages_inner().await;
        self.recovery_in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn recover_stalled_messages_inner(&self) -> Result<usize, QueueError> {
        let ids = self.entries.list_partition("byStatus", Some("processing"), None).await?;
        let now = Utc::now();
        let mut recovered = 0;
        for id in ids {
            let Some(record) = self.entries.get_or_null(&id).await? else { continue };
            let entry = fields_to_entry(&record.data)?;
            if entry.status != QueueStatus::Processing || entry.visible_at > now {
                continue;
            }

            let mut updated = entry.clone();
            updated.lock_token = None;
            if entry.attempts >= entry.max_attempts {
                if matches!(self.config.failure_strategy, FailureStrategy::DeadLetter | FailureStrategy::Hybrid) {
                    self.route_to_dead_letter(&updated, "visibility timeout exceeded; attempts exhausted").await?;
                    updated.status = QueueStatus::Dead;
                } else {
                    updated.status = QueueStatus::Failed;
                }
                updated.completed_at = Some(now);
            } else {
                updated.status = QueueStatus::Pending;
                updated.visible_at = now;
                updated.claimed_by = None;
                updated.claimed_at = None;
            }

            let fields = entry_to_fields(&updated)?;
            let etag = record.etag.clone().expect("read always sets etag");
            if self.entries.update_conditional(&id, fields, etag).await?.success {
                self.clear_processed_marker(&id).await?;
                recovered += 1;
                let queue = self.queue_name().to_string();
                let original_id = updated.original_id.clone();
                match updated.status {
                    QueueStatus::Failed => {
                        self.event_bus.emit(PluginEvent::MessageFailed {
                            queue: queue.clone(),
                            original_id: original_id.clone(),
                            error: "visibility timeout exceeded; attempts exhausted".to_string(),
                        });
                        self.event_bus.emit(PluginEvent::MessageOutcome {
                            queue,
                            original_id,
                            final_status: QueueStatus::Failed,
                            attempts: entry.attempts,
                            max_attempts: entry.max_attempts,
                        });
                    }
                    QueueStatus::Dead => {
                        self.event_bus.emit(PluginEvent::MessageDead {
                            queue: queue.clone(),
                            original_id: original_id.clone(),
                            error: "visibility timeout exceeded; attempts exhausted".to_string(),
                        });
                        self.event_bus.emit(PluginEvent::MessageOutcome {
                            queue,
                            original_id,
                            final_status: QueueStatus::Dead,
                            attempts: entry.attempts,
                            max_attempts: entry.max_attempts,
                        });
                    }
                    QueueStatus::Pending => {
                        self.event_bus.emit(PluginEvent::MessageRetry { queue, original_id, attempts: entry.attempts });
                    }
                    _ => {}
                }
            }
        }
        Ok(recovered)
    }

    fn queue_name(&self) -> &str {
        self.entries.name().as_str()
    }

    async fn list_available_tickets(&self) -> Result<Vec<DispatchTicket>, QueueError> {
        let keys = self.storage.list_keys(&["tickets"]).await?;
        let mut tickets = Vec::new();
        for key in keys {
            let ticket_id = key.rsplit('/').next().unwrap_or_default();
            if let Some((ticket, _)) = self.storage.get_json::<DispatchTicket>(&["tickets", ticket_id]).await? {
                if ticket.status == TicketStatus::Available {
                    tickets.push(ticket);
                }
            }
        }
        tickets.sort_by_key(|t| t.order_index);
        Ok(tickets)
    }

    async fn try_claim_ticket(&self, ticket: &DispatchTicket) -> Result<bool, QueueError> {
        let parts = ["tickets", ticket.ticket_id.as_str()];
        let Some((mut current, etag)) = self.storage.get_json::<DispatchTicket>(&parts).await? else {
            return Ok(false);
        };
        if current.status != TicketStatus::Available {
            return Ok(false);
        }
        current.status = TicketStatus::Claimed;
        current.claimed_by = Some(self.worker_id.clone());
        current.claimed_at = Some(Utc::now());
        match self.storage.put_json_conditional(&parts, &current, PutCondition::IfMatch(etag)).await {
            Ok(_) => Ok(true),
            Err(StoreError::PreconditionFailed { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn release_ticket(&self, ticket_id: &str) -> Result<(), QueueError> {
        let parts = ["tickets", ticket_id];
        if let Some((mut ticket, etag)) = self.storage.get_json::<DispatchTicket>(&parts).await? {
            ticket.status = TicketStatus::Available;
            ticket.claimed_by = None;
            ticket.claimed_at = None;
            if self.storage.put_json_conditional(&parts, &ticket, PutCondition::IfMatch(etag)).await.is_err() {
                tracing::debug!(ticket_id, "ticket release raced with another claim; ignoring");
            }
        }
        Ok(())
    }

    async fn delete_ticket(&self, ticket_id: &str) -> Result<(), QueueError> {
        self.storage.delete(&["tickets", ticket_id]).await?;
        Ok(())
    }

    fn order_index(&self, queued_at: chrono::DateTime<Utc>) -> u64 {
        let millis = queued_at.timestamp_millis().max(0) as u64;
        match self.config.ordering_mode {
            OrderingMode::Fifo => millis,
            OrderingMode::Lifo => u64::MAX - millis,
        }
    }

    /// Coordinator leader duty: publish up to `ticketBatchSize -
    /// |existingAvailableTickets|` tickets for the earliest-ordered pending
    /// entries. No-op when this worker is not the elected leader.
    pub async fn publish_tickets(&self) -> Result<usize, QueueError> {
        let Some(coordinator) = &self.coordinator else { return Ok(0) };
        if !coordinator.is_leader() {
            return Ok(0);
        }

        let existing = self.list_available_tickets().await?;
        let budget = self.config.ticket_batch_size.saturating_sub(existing.len());
        if budget == 0 {
            return Ok(0);
        }
        let existing_ids: HashSet<String> = existing.iter().map(|t| t.message_id.clone()).collect();

        let mut candidates = self.list_claimable_pending(budget + existing.len()).await?;
        self.sort_candidates(&mut candidates);

        let mut published = 0;
        for entry in candidates.into_iter().filter(|e| !existing_ids.contains(&e.id)).take(budget) {
            let ticket = DispatchTicket {
                ticket_id: new_id(),
                message_id: entry.id.clone(),
                original_id: entry.original_id.clone(),
                queued_at: entry.queued_at,
                order_index: self.order_index(entry.queued_at),
                published_at: Utc::now(),
                published_by: self.worker_id.clone(),
                status: TicketStatus::Available,
                claimed_by: None,
                claimed_at: None,
                ticket_ttl: self.config.ticket_ttl(),
            };
            self.storage
                .put_json(&["tickets", &ticket.ticket_id], &ticket, Some(self.config.ticket_ttl()))
                .await?;
            published += 1;
        }
        if published > 0 {
            tracing::info!(queue = %self.queue_name(), published, "tickets-published");
            self.event_bus.emit(PluginEvent::TicketsPublished { queue: self.queue_name().to_string(), count: published });
        }
        Ok(published)
    }

    /// Releases tickets claimed by workers whose heartbeat has gone stale.
    pub async fn release_stale_ticket_claims(&self) -> Result<usize, QueueError> {
        let Some(registry) = &self.worker_registry else { return Ok(0) };
        let keys = self.storage.list_keys(&["tickets"]).await?;
        let mut released = 0;
        for key in keys {
            let ticket_id = key.rsplit('/').next().unwrap_or_default().to_string();
            if let Some((ticket, _)) = self.storage.get_json::<DispatchTicket>(&["tickets", &ticket_id]).await? {
                if ticket.status != TicketStatus::Claimed {
                    continue;
                }
                if let Some(worker) = &ticket.claimed_by {
                    if registry.is_stale(worker).await? {
                        self.release_ticket(&ticket_id).await?;
                        released += 1;
                    }
                }
            }
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objdb_store::ObjectStoreBlob;
    use objdb_types::{AttributeDef, AttributeType, ResourceBehavior, ResourceName, ResourceSchema};
    use std::collections::HashMap;

    fn target_schema() -> ResourceSchema {
        ResourceSchema {
            name: ResourceName::new("jobs"),
            attributes: vec![AttributeDef { name: "id".into(), attr_type: AttributeType::String, required: true }],
            behavior: ResourceBehavior::BodyOnly,
            partitions: vec![],
            timestamps: false,
            async_partitions: false,
        }
    }

    fn entries_schema() -> ResourceSchema {
        crate::entry::queue_resource_schema("jobs")
    }

    async fn make_queue(config: QueueConfig) -> S3Queue {
        let store = Arc::new(ObjectStoreBlob::in_memory());
        let target = Arc::new(Resource::new(target_schema(), store.clone()));
        let entries = Arc::new(Resource::new(entries_schema(), store.clone()));
        let dead_letter = Arc::new(Resource::new(S3Queue::dead_letter_schema("jobs"), store.clone()));
        let storage = PluginStorage::new(store, "s3queue");
        S3Queue::new(target, entries, Some(dead_letter), storage, None, None, config, "worker-a").unwrap()
    }

    fn job(id: &str) -> HashMap<String, Value> {
        let mut m = HashMap::new();
        m.insert("id".to_string(), Value::String(id.to_string()));
        m
    }

    #[tokio::test]
    async fn enqueue_creates_pending_entry() {
        let q = make_queue(QueueConfig::default()).await;
        let entry = q.enqueue(job("j1")).await.unwrap();
        assert_eq!(entry.status, QueueStatus::Pending);
        assert_eq!(entry.original_id, "j1");
    }

    #[tokio::test]
    async fn claim_moves_entry_to_processing() {
        let q = make_queue(QueueConfig::default()).await;
        q.enqueue(job("j1")).await.unwrap();
        let claimed = q.claim().await.unwrap().expect("should claim");
        assert_eq!(claimed.status, QueueStatus::Processing);
        assert!(claimed.lock_token.is_some());
        assert_eq!(claimed.attempts, 1);
    }

    #[tokio::test]
    async fn double_claim_only_one_worker_wins() {
        let q = make_queue(QueueConfig::default()).await;
        let entry = q.enqueue(job("j1")).await.unwrap();
        // Simulate two racing claims against the same entry directly.
        let a = q.conditional_claim(&entry.id).await.unwrap();
        let b = q.conditional_claim(&entry.id).await.unwrap();
        assert!(a.is_some());
        assert!(b.is_none());
    }

    #[tokio::test]
    async fn complete_message_requires_matching_lock_token() {
        let q = make_queue(QueueConfig::default()).await;
        q.enqueue(job("j1")).await.unwrap();
        let claimed = q.claim().await.unwrap().unwrap();
        assert!(!q.complete_message(&claimed.id, "wrong-token", None).await.unwrap());
        assert!(q
            .complete_message(&claimed.id, claimed.lock_token.as_ref().unwrap(), None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn fail_message_retries_until_max_attempts_then_fails() {
        let q = make_queue(QueueConfig { max_attempts: 1, ..QueueConfig::default() }).await;
        q.enqueue(job("j1")).await.unwrap();
        let claimed = q.claim().await.unwrap().unwrap();
        let token = claimed.lock_token.clone().unwrap();
        q.fail_message(&claimed.id, &token, "boom").await.unwrap();
        let record = q.entries.get(&claimed.id).await.unwrap();
        let entry = fields_to_entry(&record.data).unwrap();
        assert_eq!(entry.status, QueueStatus::Failed);
    }

    #[tokio::test]
    async fn hybrid_strategy_dead_letters_on_exhaustion() {
        let q = make_queue(QueueConfig {
            max_attempts: 1,
            failure_strategy: FailureStrategy::Hybrid,
            ..QueueConfig::default()
        })
        .await;
        q.enqueue(job("j1")).await.unwrap();
        let claimed = q.claim().await.unwrap().unwrap();
        let token = claimed.lock_token.clone().unwrap();
        q.fail_message(&claimed.id, &token, "boom").await.unwrap();
        let record = q.entries.get(&claimed.id).await.unwrap();
        let entry = fields_to_entry(&record.data).unwrap();
        assert_eq!(entry.status, QueueStatus::Dead);
        let dead_letter = q.dead_letter.as_ref().unwrap();
        assert_eq!(dead_letter.list_ids().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn visibility_timeout_recovery_reverts_to_pending_with_attempts_under_max() {
        let q = make_queue(QueueConfig { visibility_timeout: Duration::from_millis(1), max_attempts: 5, ..QueueConfig::default() })
            .await;
        q.enqueue(job("j1")).await.unwrap();
        let claimed = q.claim().await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let recovered = q.recover_stalled_messages().await.unwrap();
        assert_eq!(recovered, 1);
        let record = q.entries.get(&claimed.id).await.unwrap();
        let entry = fields_to_entry(&record.data).unwrap();
        assert_eq!(entry.status, QueueStatus::Pending);
        assert_eq!(entry.attempts, 1);
    }

    #[tokio::test]
    async fn visibility_timeout_recovery_routes_to_failed_when_max_attempts_is_one() {
        let q = make_queue(QueueConfig { visibility_timeout: Duration::from_millis(1), max_attempts: 1, ..QueueConfig::default() })
            .await;
        q.enqueue(job("j1")).await.unwrap();
        let claimed = q.claim().await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        q.recover_stalled_messages().await.unwrap();
        let record = q.entries.get(&claimed.id).await.unwrap();
        let entry = fields_to_entry(&record.data).unwrap();
        assert_eq!(entry.status, QueueStatus::Failed);
    }

    #[tokio::test]
    async fn renew_lock_rejects_token_mismatch() {
        let q = make_queue(QueueConfig::default()).await;
        q.enqueue(job("j1")).await.unwrap();
        let claimed = q.claim().await.unwrap().unwrap();
        let result = q.renew_lock(&claimed.id, "wrong", Duration::from_secs(10)).await.unwrap();
        assert_eq!(result, Err(RenewRejectReason::TokenMismatch));
    }

    #[tokio::test]
    async fn renew_lock_extends_visibility_with_correct_token() {
        let q = make_queue(QueueConfig::default()).await;
        q.enqueue(job("j1")).await.unwrap();
        let claimed = q.claim().await.unwrap().unwrap();
        let token = claimed.lock_token.clone().unwrap();
        let result = q.renew_lock(&claimed.id, &token, Duration::from_secs(60)).await.unwrap();
        assert!(result.is_ok());
        let record = q.entries.get(&claimed.id).await.unwrap();
        let entry = fields_to_entry(&record.data).unwrap();
        assert!(entry.visible_at > claimed.visible_at);
    }

    #[tokio::test]
    async fn zero_max_attempts_plus_dead_letter_is_invalid_config() {
        let config = QueueConfig { failure_strategy: FailureStrategy::DeadLetter, max_attempts: 0, ..QueueConfig::default() };
        assert!(config.validate().is_err());
    }
}
