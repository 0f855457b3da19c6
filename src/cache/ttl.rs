//! Time-bounded in-memory cache.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// A cached value and when it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
  pub value: V,
  pub inserted_at: Instant,
}

/// Snapshot of what the cache currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
  pub total_entries: usize,
  pub valid_entries: usize,
  pub expired_entries: usize,
  pub cache_timeout_ms: u64,
}

/// Key -> value cache where an entry is valid while `now - inserted_at < timeout`.
///
/// Expiry is lazy: `get` treats an expired entry as absent but leaves it in
/// place. Only `purge_expired` (driven by the janitor) and `stats` scan.
#[derive(Debug)]
pub struct TtlCache<V> {
  entries: Mutex<HashMap<String, CacheEntry<V>>>,
  timeout: Duration,
  /// Accepted from config but not enforced yet.
  max_size: Option<usize>,
}

impl<V: Clone> TtlCache<V> {
  pub fn new(timeout: Duration) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      timeout,
      max_size: None,
    }
  }

  pub fn with_max_size(mut self, max_size: usize) -> Self {
    self.max_size = Some(max_size);
    self
  }

  pub fn timeout(&self) -> Duration {
    self.timeout
  }

  pub fn max_size(&self) -> Option<usize> {
    self.max_size
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
    // Entries stay consistent even if a holder panicked; nothing spans two writes.
    self.entries.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn is_valid(&self, entry: &CacheEntry<V>, now: Instant) -> bool {
    now.saturating_duration_since(entry.inserted_at) < self.timeout
  }

  pub fn get(&self, key: &str) -> Option<V> {
    let now = Instant::now();
    self
      .entries()
      .get(key)
      .filter(|entry| self.is_valid(entry, now))
      .map(|entry| entry.value.clone())
  }

  /// Store `value`, replacing any previous entry and restarting its clock.
  pub fn set(&self, key: impl Into<String>, value: V) {
    self.entries().insert(
      key.into(),
      CacheEntry {
        value,
        inserted_at: Instant::now(),
      },
    );
  }

  pub fn invalidate(&self, key: &str) -> bool {
    self.entries().remove(key).is_some()
  }

  pub fn clear(&self) {
    self.entries().clear();
  }

  /// Drop every expired entry, returning how many were removed.
  pub fn purge_expired(&self) -> usize {
    let now = Instant::now();
    let mut entries = self.entries();
    let before = entries.len();
    entries.retain(|_, entry| now.saturating_duration_since(entry.inserted_at) < self.timeout);
    before - entries.len()
  }

  pub fn stats(&self) -> CacheStats {
    let now = Instant::now();
    let entries = self.entries();
    let valid_entries = entries
      .values()
      .filter(|entry| self.is_valid(entry, now))
      .count();

    CacheStats {
      total_entries: entries.len(),
      valid_entries,
      expired_entries: entries.len() - valid_entries,
      cache_timeout_ms: self.timeout.as_millis() as u64,
    }
  }
}
