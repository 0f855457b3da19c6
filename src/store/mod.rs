//! Dual-backend domain stores.
//!
//! Each store tries the remote gateway when a remote session is present and
//! falls back to the local collection store otherwise, or when the remote call
//! fails. Callers get the same entity shape from either path.

pub mod auth;
pub mod fallback;
pub mod password;
pub mod profile;
pub mod session;
pub mod tasks;
pub mod token;

use std::sync::Arc;

use crate::error::StoreError;
use crate::local::{KeyValueStore, LocalCollectionStore};
use crate::remote::RemoteGateway;

pub use auth::AuthStore;
pub use fallback::{with_fallback, Outcome, Source};
pub use password::{PasswordHasher, SaltedSha256};
pub use profile::ProfileStore;
pub use session::{AuthCapability, SessionState};
pub use tasks::TaskStore;

/// The three domain stores wired to one gateway, one local store and one
/// shared session.
pub struct Stores {
  pub gateway: Option<Arc<RemoteGateway>>,
  pub session: Arc<SessionState>,
  pub auth: AuthStore,
  pub tasks: TaskStore,
  pub profile: ProfileStore,
}

impl Stores {
  /// `gateway` is `None` in local-only mode.
  pub fn new(
    gateway: Option<Arc<RemoteGateway>>,
    kv: Arc<dyn KeyValueStore>,
  ) -> Result<Self, StoreError> {
    Self::with_hasher(gateway, kv, Arc::new(SaltedSha256))
  }

  pub fn with_hasher(
    gateway: Option<Arc<RemoteGateway>>,
    kv: Arc<dyn KeyValueStore>,
    hasher: Arc<dyn PasswordHasher>,
  ) -> Result<Self, StoreError> {
    let local = LocalCollectionStore::new(kv);
    let session = Arc::new(SessionState::restore(local.clone())?);
    let capability: Arc<dyn AuthCapability> = session.clone();

    Ok(Self {
      auth: AuthStore::new(gateway.clone(), local.clone(), session.clone(), hasher),
      tasks: TaskStore::new(gateway.clone(), local.clone(), capability.clone()),
      profile: ProfileStore::new(gateway.clone(), local, capability),
      gateway,
      session,
    })
  }
}
