//! Bounded-concurrency fan-out: drives a batch of futures through a
//! `tokio::sync::Semaphore`-gated `JoinSet`, capturing one `Result` per
//! item rather than short-circuiting on the first failure. Used by
//! replication fan-out, inventory sync paging, and `deleteMany`.

use std::future::Future;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs `f(item)` for every item in `items` with at most `concurrency`
/// futures in flight at once, returning results in the same order as
/// `items`. A panicking task surfaces as `None` at that index rather than
/// propagating, so one bad item never loses the rest of the batch.
pub async fn map_bounded<T, F, Fut, R>(items: Vec<T>, concurrency: usize, f: F) -> Vec<Option<R>>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Send + 'static,
{
    let concurrency = concurrency.max(1);
    let semaphore = std::sync::Arc::new(Semaphore::new(concurrency));
    let f = std::sync::Arc::new(f);
    let mut set = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let permit = semaphore.clone();
        let f = f.clone();
        set.spawn(async move {
            let _permit = permit.acquire_owned().await.expect("semaphore never closed");
            (index, f(item).await)
        });
    }

    let mut slots: Vec<Option<R>> = (0..set.len()).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        if let Ok((index, result)) = joined {
            slots[index] = Some(result);
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn preserves_input_order() {
        let items: Vec<u32> = (0..20).collect();
        let results = map_bounded(items.clone(), 4, |n| async move { n * 2 }).await;
        let expected: Vec<Option<u32>> = items.iter().map(|n| Some(n * 2)).collect();
        assert_eq!(results, expected);
    }

    #[tokio::test]
    async fn never_exceeds_concurrency_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let items: Vec<u32> = (0..30).collect();
        let in_flight_f = in_flight.clone();
        let max_seen_f = max_seen.clone();
        map_bounded(items, 3, move |_| {
            let in_flight = in_flight_f.clone();
            let max_seen = max_seen_f.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;
        assert!(max_seen.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn empty_input_returns_empty_output() {
        let results: Vec<Option<u32>> = map_bounded(Vec::<u32>::new(), 4, |n| async move { n }).await;
        assert!(results.is_empty());
    }
}
