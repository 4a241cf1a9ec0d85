use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use crate::types::{MutationOp, QueueStatus};

/// The `plg:*` emissions named in the event bus contract: coordinator,
/// queue, and replication outcomes a subscriber registers against by
/// variant, the same way [`crate::Event`] types resource mutations.
#[derive(Debug, Clone)]
pub enum PluginEvent {
    MessageOutcome { queue: String, original_id: String, final_status: QueueStatus, attempts: u32, max_attempts: u32 },
    MessageCompleted { queue: String, original_id: String },
    MessageRetry { queue: String, original_id: String, attempts: u32 },
    MessageFailed { queue: String, original_id: String, error: String },
    MessageDead { queue: String, original_id: String, error: String },
    CoordinatorElected { lease_key: String, worker_id: String },
    TicketsPublished { queue: String, count: usize },
    LockRenewed { queue: String, id: String },
    LockRenewalRejected { queue: String, id: String, reason: String },
    ReplicatorReplicated { replicator: String, resource: String, op: MutationOp },
    ReplicatorError { replicator: String, resource: String, op: MutationOp, error: String },
}

impl PluginEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PluginEvent::MessageOutcome { .. } => "plg:s3-queue:message-outcome",
            PluginEvent::MessageCompleted { .. } => "plg:s3-queue:message-completed",
            PluginEvent::MessageRetry { .. } => "plg:s3-queue:message-retry",
            PluginEvent::MessageFailed { .. } => "plg:s3-queue:message-failed",
            PluginEvent::MessageDead { .. } => "plg:s3-queue:message-dead",
            PluginEvent::CoordinatorElected { .. } => "plg:s3-queue:coordinator-elected",
            PluginEvent::TicketsPublished { .. } => "plg:s3-queue:tickets-published",
            PluginEvent::LockRenewed { .. } => "plg:s3-queue:lock-renewed",
            PluginEvent::LockRenewalRejected { .. } => "plg:s3-queue:lock-renewal-rejected",
            PluginEvent::ReplicatorReplicated { .. } => "plg:replicator:replicated",
            PluginEvent::ReplicatorError { .. } => "plg:replicator:error",
        }
    }
}

pub type PluginEventHandler = Arc<dyn Fn(PluginEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Shared observer list for `PluginEvent`. Cloning shares the same
/// subscriber list (it's an `Arc` handle), so one bus can be constructed by
/// the entrypoint and handed to the queue, coordinator, and replication
/// fabric alike.
#[derive(Clone, Default)]
pub struct PluginEventBus {
    handlers: Arc<Mutex<Vec<PluginEventHandler>>>,
}

impl PluginEventBus {
    pub fn new() -> Self {
        PluginEventBus::default()
    }

    pub fn on_event(&self, handler: PluginEventHandler) {
        self.handlers.lock().expect("plugin event bus lock poisoned").push(handler);
    }

    /// Fires every subscriber on its own detached task. Never awaited by
    /// the caller: a publisher's own work is done once `emit` returns.
    pub fn emit(&self, event: PluginEvent) {
        let handlers = self.handlers.lock().expect("plugin event bus lock poisoned");
        for handler in handlers.iter() {
            let handler = handler.clone();
            let event = event.clone();
            tokio::spawn(async move {
                handler(event).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn registered_handler_observes_emitted_event() {
        let bus = PluginEventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        bus.on_event(Arc::new(move |event| {
            let counter = counter.clone();
            Box::pin(async move {
                if matches!(event, PluginEvent::TicketsPublished { .. }) {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
        }));

        bus.emit(PluginEvent::TicketsPublished { queue: "jobs".to_string(), count: 3 });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_names_match_the_event_bus_contract() {
        let ev = PluginEvent::LockRenewalRejected {
            queue: "jobs".to_string(),
            id: "msg-1".to_string(),
            reason: "token_mismatch".to_string(),
        };
        assert_eq!(ev.name(), "plg:s3-queue:lock-renewal-rejected");
    }
}
