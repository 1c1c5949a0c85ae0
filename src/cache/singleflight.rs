//! In-flight request coalescing.

use super::key::CacheKey;
use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// A coalesced computation that did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlightError {
    #[error("in-flight computation panicked")]
    Panicked,
    #[error("in-flight computation was cancelled by the runtime")]
    Cancelled,
}

type Flight<V> = Shared<BoxFuture<'static, Result<V, FlightError>>>;
type Registry<V> = Arc<Mutex<HashMap<CacheKey, Flight<V>>>>;

/// Removes the key once the computation settles or is dropped.
///
/// Never created while the registry lock is held: its drop takes that lock.
struct FlightGuard<V> {
    registry: Registry<V>,
    key: CacheKey,
}

impl<V> Drop for FlightGuard<V> {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// At most one running computation per key.
///
/// The computation is spawned onto the tokio runtime, so it keeps running
/// (and its side effects still land) when every waiter goes away.
pub struct Singleflight<V> {
    flights: Registry<V>,
}

impl<V> Default for Singleflight<V> {
    fn default() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<V> Singleflight<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `compute` unless a computation for `key` is already underway, in
    /// which case the existing one is awaited instead and `compute` is dropped
    /// uncalled. Must be called from within a tokio runtime.
    pub async fn run_exclusive<F, Fut>(&self, key: &CacheKey, compute: F) -> Result<V, FlightError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (flight, tx) = {
            let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
            match flights.get(key) {
                Some(existing) => {
                    debug!(key = %key, "joining in-flight computation");
                    (existing.clone(), None)
                }
                None => {
                    let (tx, rx) = oneshot::channel::<Result<V, FlightError>>();
                    let flight = rx
                        .map(|settled| settled.unwrap_or(Err(FlightError::Cancelled)))
                        .boxed()
                        .shared();
                    flights.insert(key.clone(), flight.clone());
                    (flight, Some(tx))
                }
            }
        };

        // Registry lock released: the guard's drop takes it, even when `compute` panics.
        if let Some(tx) = tx {
            let guard = FlightGuard {
                registry: Arc::clone(&self.flights),
                key: key.clone(),
            };
            let work = compute();
            tokio::spawn(async move {
                let _guard = guard;
                let settled = AssertUnwindSafe(work)
                    .catch_unwind()
                    .await
                    .map_err(|_| FlightError::Panicked);
                let _ = tx.send(settled);
            });
        }
        flight.await
    }

    /// Number of keys with a computation currently underway.
    pub fn in_flight(&self) -> usize {
        self.flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn k(s: &str) -> CacheKey {
        CacheKey::builder().field(s).build()
    }

    fn explode() -> u8 {
        panic!("collaborator exploded")
    }

    fn explode_before_future() -> std::future::Ready<u8> {
        panic!("collaborator exploded before producing a future")
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_computation() {
        let flights = Arc::new(Singleflight::<u64>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];
        for _ in 0..16 {
            let flights = Arc::clone(&flights);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flights
                    .run_exclusive(&k("same"), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        42
                    })
                    .await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_registry_cleared_after_settle() {
        let flights = Singleflight::<String>::new();
        let v = flights
            .run_exclusive(&k("a"), || async { "first".to_string() })
            .await;
        assert_eq!(v.as_deref(), Ok("first"));
        assert!(!flights.is_in_flight(&k("a")));

        // A later call recomputes.
        let v = flights
            .run_exclusive(&k("a"), || async { "second".to_string() })
            .await;
        assert_eq!(v.as_deref(), Ok("second"));
    }

    #[tokio::test]
    async fn test_panicking_computation_releases_key() {
        let flights = Singleflight::<u8>::new();
        let res = flights.run_exclusive(&k("boom"), || async { explode() }).await;
        assert_eq!(res, Err(FlightError::Panicked));
        assert_eq!(flights.in_flight(), 0);

        let res = flights.run_exclusive(&k("boom"), || async { 7 }).await;
        assert_eq!(res, Ok(7));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_compute_panicking_synchronously_releases_registry() {
        let flights = Arc::new(Singleflight::<u8>::new());
        let caller = {
            let flights = Arc::clone(&flights);
            tokio::spawn(async move { flights.run_exclusive(&k("sync"), explode_before_future).await })
        };
        let joined = tokio::time::timeout(Duration::from_secs(3), caller)
            .await
            .expect("registry deadlocked");
        assert!(joined.unwrap_err().is_panic());
        assert_eq!(flights.in_flight(), 0);

        let other = tokio::time::timeout(
            Duration::from_secs(3),
            flights.run_exclusive(&k("other"), || async { 3 }),
        )
        .await;
        assert_eq!(other, Ok(Ok(3)));
        let retry = flights.run_exclusive(&k("sync"), || async { 4 }).await;
        assert_eq!(retry, Ok(4));
    }

    #[tokio::test]
    async fn test_waiters_observe_same_error_value() {
        let flights = Arc::new(Singleflight::<Result<u8, String>>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let run = |flights: Arc<Singleflight<Result<u8, String>>>, calls: Arc<AtomicUsize>| async move {
            flights
                .run_exclusive(&k("err"), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Err::<u8, String>("backend down".into())
                })
                .await
        };
        let (a, b) = tokio::join!(
            run(Arc::clone(&flights), Arc::clone(&calls)),
            run(Arc::clone(&flights), Arc::clone(&calls))
        );
        assert_eq!(a, Ok(Err("backend down".to_string())));
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let flights = Arc::new(Singleflight::<&'static str>::new());
        let slow = {
            let flights = Arc::clone(&flights);
            tokio::spawn(async move {
                flights
                    .run_exclusive(&k("slow"), || async {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        "slow"
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        let fast = tokio::time::timeout(
            Duration::from_secs(1),
            flights.run_exclusive(&k("fast"), || async { "fast" }),
        )
        .await;
        assert_eq!(fast, Ok(Ok("fast")));
        slow.abort();
    }

    #[tokio::test]
    async fn test_abandoned_waiter_does_not_cancel_work() {
        let flights = Arc::new(Singleflight::<()>::new());
        let done = Arc::new(AtomicUsize::new(0));
        {
            let done = Arc::clone(&done);
            let key = k("bg");
            let waiting = flights.run_exclusive(&key, || async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
            let _ = tokio::time::timeout(Duration::from_millis(5), waiting).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }
}
