//! Local persistent store: the fallback of record and the only store in
//! local-only mode.

mod collection;
mod storage;

pub use collection::{namespace_key, LocalCollectionStore, ANONYMOUS};
pub use storage::{KeyValueStore, MemoryKvStore, SqliteKvStore};
