//! Periodic sweep of expired cache entries.

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use super::ttl::TtlCache;

/// Spawn a task that purges expired entries from `cache` every `period`.
///
/// The task holds only a weak reference and stops once the cache is dropped.
pub fn spawn<V>(cache: &Arc<TtlCache<V>>, period: Duration) -> JoinHandle<()>
where
  V: Clone + Send + 'static,
{
  let cache: Weak<TtlCache<V>> = Arc::downgrade(cache);

  tokio::spawn(async move {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
      ticker.tick().await;
      let Some(cache) = cache.upgrade() else {
        break;
      };
      let removed = cache.purge_expired();
      if removed > 0 {
        debug!(removed, "purged expired cache entries");
      }
    }
  })
}
