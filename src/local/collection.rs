use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use super::storage::KeyValueStore;
use crate::error::StoreError;

/// Identity used for the namespace when nobody is signed in.
pub const ANONYMOUS: &str = "anonymous";

/// `"{prefix}_{identity}"`, e.g. `tasks_42` or `tasks_anonymous`.
pub fn namespace_key(prefix: &str, identity: Option<&str>) -> String {
  format!("{}_{}", prefix, identity.unwrap_or(ANONYMOUS))
}

/// Typed collections and records over a [`KeyValueStore`].
///
/// A missing key reads as empty. A value that does not parse is reported as
/// [`StoreError::Corrupted`] and left untouched.
#[derive(Clone)]
pub struct LocalCollectionStore {
  kv: Arc<dyn KeyValueStore>,
}

impl LocalCollectionStore {
  pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
    Self { kv }
  }

  pub fn read_collection<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
    Ok(self.read_record(key)?.unwrap_or_default())
  }

  /// Replace the whole collection in a single write.
  pub fn write_collection<T: Serialize>(&self, key: &str, entities: &[T]) -> Result<(), StoreError> {
    self.write_record(key, &entities)
  }

  pub fn read_record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
    match self.kv.get(key)? {
      Some(raw) => serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| StoreError::Corrupted {
          key: key.to_string(),
          message: e.to_string(),
        }),
      None => Ok(None),
    }
  }

  pub fn write_record<T: Serialize + ?Sized>(&self, key: &str, record: &T) -> Result<(), StoreError> {
    let raw = serde_json::to_string(record)
      .map_err(|e| StoreError::Backend(format!("failed to serialize {}: {}", key, e)))?;
    self.kv.set(key, &raw)
  }

  pub fn remove_record(&self, key: &str) -> Result<(), StoreError> {
    self.kv.remove(key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::local::MemoryKvStore;

  fn store() -> (Arc<MemoryKvStore>, LocalCollectionStore) {
    let kv = Arc::new(MemoryKvStore::new());
    (kv.clone(), LocalCollectionStore::new(kv))
  }

  #[test]
  fn test_namespace_key() {
    assert_eq!(namespace_key("tasks", Some("7")), "tasks_7");
    assert_eq!(namespace_key("tasks", None), "tasks_anonymous");
  }

  #[test]
  fn test_missing_collection_is_empty() {
    let (_, local) = store();
    let items: Vec<u32> = local.read_collection("tasks_anonymous").unwrap();
    assert!(items.is_empty());
  }

  #[test]
  fn test_write_replaces_whole_collection() {
    let (_, local) = store();
    local.write_collection("k", &[1, 2, 3]).unwrap();
    local.write_collection("k", &[4]).unwrap();
    assert_eq!(local.read_collection::<u32>("k").unwrap(), vec![4]);
  }

  #[test]
  fn test_corrupted_value_is_reported_and_kept() {
    let (kv, local) = store();
    kv.set("tasks_1", "{not json").unwrap();

    let err = local.read_collection::<u32>("tasks_1").unwrap_err();
    assert!(matches!(err, StoreError::Corrupted { ref key, .. } if key == "tasks_1"));
    assert_eq!(kv.get("tasks_1").unwrap().as_deref(), Some("{not json"));
  }

  #[test]
  fn test_records() {
    let (_, local) = store();
    assert_eq!(local.read_record::<String>("session").unwrap(), None);
    local.write_record("session", "abc").unwrap();
    assert_eq!(local.read_record::<String>("session").unwrap().as_deref(), Some("abc"));
    local.remove_record("session").unwrap();
    assert_eq!(local.read_record::<String>("session").unwrap(), None);
  }
}
