//! Collapses concurrent identical requests into one.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type Registry<T> = Arc<Mutex<HashMap<String, Pending<T>>>>;

struct Pending<T: Clone> {
  id: u64,
  future: Shared<BoxFuture<'static, T>>,
}

/// Tracks at most one outstanding future per key.
///
/// Every caller that arrives while a key is pending awaits the same shared
/// future and observes the same settled value.
pub struct InFlightTracker<T: Clone> {
  pending: Registry<T>,
  next_id: AtomicU64,
}

/// Removes the registration when the producer future settles or is dropped.
struct Unregister<T: Clone> {
  pending: Registry<T>,
  key: String,
  id: u64,
}

impl<T: Clone> Drop for Unregister<T> {
  fn drop(&mut self) {
    let mut pending = lock(&self.pending);
    // A newer registration under the same key is not ours to remove.
    if pending.get(&self.key).is_some_and(|p| p.id == self.id) {
      pending.remove(&self.key);
    }
  }
}

fn lock<T: Clone>(registry: &Registry<T>) -> MutexGuard<'_, HashMap<String, Pending<T>>> {
  registry.lock().unwrap_or_else(|e| e.into_inner())
}

impl<T> InFlightTracker<T>
where
  T: Clone + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      pending: Arc::new(Mutex::new(HashMap::new())),
      next_id: AtomicU64::new(0),
    }
  }

  /// Join the pending future for `key`, or start one with `producer`.
  ///
  /// `producer` runs at most once per outstanding key and is invoked while the
  /// registry lock is held, so it must only build the future, not drive it.
  pub async fn dedupe<F, Fut>(&self, key: &str, producer: F) -> T
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T> + Send + 'static,
  {
    let future = {
      let mut pending = lock(&self.pending);
      match pending.get(key) {
        Some(existing) => {
          debug!(key, "joining in-flight request");
          existing.future.clone()
        }
        None => {
          // Guard only after `producer` returns; its drop takes this lock.
          let inner = producer();
          let id = self.next_id.fetch_add(1, Ordering::Relaxed);
          let guard = Unregister {
            pending: Arc::clone(&self.pending),
            key: key.to_string(),
            id,
          };
          let shared = async move {
            let _guard = guard;
            inner.await
          }
          .boxed()
          .shared();

          pending.insert(
            key.to_string(),
            Pending {
              id,
              future: shared.clone(),
            },
          );
          shared
        }
      }
    };

    future.await
  }

  pub fn is_pending(&self, key: &str) -> bool {
    lock(&self.pending).contains_key(key)
  }

  pub fn len(&self) -> usize {
    lock(&self.pending).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<T> Default for InFlightTracker<T>
where
  T: Clone + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicU32;
  use std::time::Duration;

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_callers_share_one_producer() {
    let tracker: InFlightTracker<Result<u32, String>> = InFlightTracker::new();
    let calls = Arc::new(AtomicU32::new(0));

    let producer = || {
      let calls = Arc::clone(&calls);
      move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(42)
      }
    };

    let (a, b) = tokio::join!(
      tracker.dedupe("/x", producer()),
      tracker.dedupe("/x", producer())
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a, Ok(42));
    assert_eq!(a, b);
    assert!(tracker.is_empty());
  }

  #[tokio::test]
  async fn test_panicking_producer_leaves_tracker_usable() {
    use futures::FutureExt;
    use std::panic::AssertUnwindSafe;

    let tracker: InFlightTracker<u32> = InFlightTracker::new();

    let outcome = AssertUnwindSafe(tracker.dedupe("/p", || -> std::future::Ready<u32> {
      panic!("producer failed")
    }))
    .catch_unwind()
    .await;

    assert!(outcome.is_err());
    assert!(!tracker.is_pending("/p"));
    assert_eq!(tracker.dedupe("/p", || async { 5 }).await, 5);
  }

  #[tokio::test]
  async fn test_failure_also_unregisters() {
    let tracker: InFlightTracker<Result<u32, String>> = InFlightTracker::new();

    let result = tracker
      .dedupe("/fail", || async { Err("boom".to_string()) })
      .await;
    assert_eq!(result, Err("boom".to_string()));
    assert!(!tracker.is_pending("/fail"));

    // A later call starts a fresh request.
    let result = tracker.dedupe("/fail", || async { Ok(1) }).await;
    assert_eq!(result, Ok(1));
  }

  #[tokio::test(start_paused = true)]
  async fn test_different_keys_do_not_collapse() {
    let tracker: InFlightTracker<u32> = InFlightTracker::new();
    let calls = Arc::new(AtomicU32::new(0));

    let make = |value: u32| {
      let calls = Arc::clone(&calls);
      move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        value
      }
    };

    let (a, b) = tokio::join!(tracker.dedupe("/a", make(1)), tracker.dedupe("/b", make(2)));
    assert_eq!((a, b), (1, 2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_key_registered_while_pending() {
    let tracker: Arc<InFlightTracker<u32>> = Arc::new(InFlightTracker::new());
    let handle = {
      let tracker = Arc::clone(&tracker);
      tokio::spawn(async move {
        tracker
          .dedupe("/slow", || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            7
          })
          .await
      })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(tracker.is_pending("/slow"));

    assert_eq!(handle.await.unwrap(), 7);
    assert!(!tracker.is_pending("/slow"));
  }
}
