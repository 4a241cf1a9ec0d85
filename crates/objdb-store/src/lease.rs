use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blob::PutCondition;
use crate::error::StoreError;
use crate::plugin::PluginStorage;

/// Time-bounded exclusive assertion held via a TTL'd store key. Backs the
/// entry lease, ordering lease, coordinator lease, and inventory sync
/// lease — all four are this same primitive at different TTLs and key
/// prefixes.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LeaseRecord {
    holder: String,
    expires_at: DateTime<Utc>,
}

impl LeaseRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

pub struct Lease {
    storage: PluginStorage,
}

impl Lease {
    pub fn new(storage: PluginStorage) -> Self {
        Lease { storage }
    }

    fn parts(key: &str) -> Vec<&str> {
        vec!["leases", key]
    }

    /// Attempts to acquire `key` for `holder`, held for `ttl`. Returns
    /// `true` iff the lease is now held by `holder` — either because no
    /// lease existed, or because the prior holder's lease had expired.
    pub async fn acquire(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Utc::now();
        let record = LeaseRecord {
            holder: holder.to_string(),
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
        };
        let parts = Self::parts(key);

        match self.storage.put_json_conditional(&parts, &record, PutCondition::IfNoneMatch).await {
            Ok(_) => return Ok(true),
            Err(StoreError::PreconditionFailed { .. }) => {}
            Err(e) => return Err(e),
        }

        match self.storage.get_json::<LeaseRecord>(&parts).await? {
            None => {
                // Raced with a concurrent release; retry once as a fresh create.
                match self
                    .storage
                    .put_json_conditional(&parts, &record, PutCondition::IfNoneMatch)
                    .await
                {
                    Ok(_) => Ok(true),
                    Err(StoreError::PreconditionFailed { .. }) => Ok(false),
                    Err(e) => Err(e),
                }
            }
            Some((existing, etag)) => {
                if existing.holder == holder {
                    return self.renew(key, holder, ttl).await;
                }
                if !existing.is_expired(now) {
                    return Ok(false);
                }
                match self
                    .storage
                    .put_json_conditional(&parts, &record, PutCondition::IfMatch(etag))
                    .await
                {
                    Ok(_) => Ok(true),
                    Err(StoreError::PreconditionFailed { .. }) => Ok(false),
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Extends an already-held lease. Fails (returns `false`) if the lease
    /// is held by someone else or has already expired out from under the
    /// caller.
    pub async fn renew(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, StoreError> {
        let parts = Self::parts(key);
        let Some((existing, etag)) = self.storage.get_json::<LeaseRecord>(&parts).await? else {
            return Ok(false);
        };
        if existing.holder != holder {
            return Ok(false);
        }
        let record = LeaseRecord {
            holder: holder.to_string(),
            expires_at: Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default(),
        };
        match self.storage.put_json_conditional(&parts, &record, PutCondition::IfMatch(etag)).await {
            Ok(_) => Ok(true),
            Err(StoreError::PreconditionFailed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Releases the lease iff currently held by `holder`. A no-op (not an
    /// error) if the lease was never held, already expired, or held by
    /// someone else.
    pub async fn release(&self, key: &str, holder: &str) -> Result<(), StoreError> {
        let parts = Self::parts(key);
        if let Some((existing, _)) = self.storage.get_json::<LeaseRecord>(&parts).await? {
            if existing.holder == holder {
                self.storage.delete(&parts).await?;
            }
        }
        Ok(())
    }

    pub async fn current_holder(&self, key: &str) -> Result<Option<String>, StoreError> {
        let parts = Self::parts(key);
        Ok(self
            .storage
            .get_json::<LeaseRecord>(&parts)
            .await?
            .filter(|(r, _)| !r.is_expired(Utc::now()))
            .map(|(r, _)| r.holder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::ObjectStoreBlob;
    use std::sync::Arc;

    fn lease() -> Lease {
        Lease::new(PluginStorage::new(Arc::new(ObjectStoreBlob::in_memory()), "coordinator"))
    }

    #[tokio::test]
    async fn acquire_succeeds_when_unheld() {
        let l = lease();
        assert!(l.acquire("queue-1", "worker-a", Duration::from_secs(30)).await.unwrap());
    }

    #[tokio::test]
    async fn second_acquire_by_different_holder_fails() {
        let l = lease();
        assert!(l.acquire("queue-1", "worker-a", Duration::from_secs(30)).await.unwrap());
        assert!(!l.acquire("queue-1", "worker-b", Duration::from_secs(30)).await.unwrap());
    }

    #[tokio::test]
    async fn acquire_by_same_holder_renews() {
        let l = lease();
        assert!(l.acquire("queue-1", "worker-a", Duration::from_secs(30)).await.unwrap());
        assert!(l.acquire("queue-1", "worker-a", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn acquire_succeeds_after_expiry() {
        let l = lease();
        assert!(l.acquire("queue-1", "worker-a", Duration::from_millis(1)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(l.acquire("queue-1", "worker-b", Duration::from_secs(30)).await.unwrap());
    }

    #[tokio::test]
    async fn release_by_non_holder_is_noop() {
        let l = lease();
        l.acquire("queue-1", "worker-a", Duration::from_secs(30)).await.unwrap();
        l.release("queue-1", "worker-b").await.unwrap();
        assert_eq!(l.current_holder("queue-1").await.unwrap(), Some("worker-a".to_string()));
    }

    #[tokio::test]
    async fn release_then_acquire_by_other_succeeds() {
        let l = lease();
        l.acquire("queue-1", "worker-a", Duration::from_secs(30)).await.unwrap();
        l.release("queue-1", "worker-a").await.unwrap();
        assert!(l.acquire("queue-1", "worker-b", Duration::from_secs(30)).await.unwrap());
    }
}
