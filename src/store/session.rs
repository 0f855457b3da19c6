//! The current sign-in, persisted in the local store.

use chrono::Utc;
use std::sync::{Mutex, MutexGuard};

use super::token;
use crate::error::StoreError;
use crate::local::LocalCollectionStore;
use crate::types::{Session, SessionOrigin, UserProfile};

pub const SESSION_KEY: &str = "session";

/// What the domain stores need to know about who is signed in.
pub trait AuthCapability: Send + Sync {
  /// A remote session with a usable bearer token is present.
  fn is_authenticated(&self) -> bool;

  /// Bearer token of the remote session.
  fn current_credential(&self) -> Option<String>;

  /// Id of the signed-in user on either path; namespaces local collections.
  fn current_identity(&self) -> Option<String>;

  fn current_user(&self) -> Option<UserProfile>;
}

/// Session held in memory and mirrored to the local store on every change.
pub struct SessionState {
  local: LocalCollectionStore,
  current: Mutex<Option<Session>>,
}

impl SessionState {
  /// Load the persisted session, if any.
  pub fn restore(local: LocalCollectionStore) -> Result<Self, StoreError> {
    let current = local.read_record::<Session>(SESSION_KEY)?;
    Ok(Self {
      local,
      current: Mutex::new(current),
    })
  }

  fn current(&self) -> MutexGuard<'_, Option<Session>> {
    self.current.lock().unwrap_or_else(|e| e.into_inner())
  }

  pub fn session(&self) -> Option<Session> {
    self.current().clone()
  }

  pub fn start(&self, session: Session) -> Result<(), StoreError> {
    self.local.write_record(SESSION_KEY, &session)?;
    *self.current() = Some(session);
    Ok(())
  }

  pub fn clear(&self) -> Result<(), StoreError> {
    *self.current() = None;
    self.local.remove_record(SESSION_KEY)
  }

  /// Swap in a fresher copy of the signed-in user.
  pub fn replace_user(&self, user: UserProfile) -> Result<(), StoreError> {
    let mut current = self.current();
    let Some(session) = current.as_mut() else {
      return Err(StoreError::NotAuthenticated);
    };
    session.user = user;
    self.local.write_record(SESSION_KEY, &*session)
  }
}

impl AuthCapability for SessionState {
  fn is_authenticated(&self) -> bool {
    self.current_credential().is_some()
  }

  /// An already expired token does not count; one without a readable expiry does.
  fn current_credential(&self) -> Option<String> {
    let current = self.current();
    let session = current.as_ref()?;
    if session.origin != SessionOrigin::Remote {
      return None;
    }
    let token = session.token.as_ref()?;
    match token::expires_at(token) {
      Some(exp) if exp <= Utc::now() => None,
      _ => Some(token.clone()),
    }
  }

  fn current_identity(&self) -> Option<String> {
    self.current().as_ref().map(|s| s.user.id.clone())
  }

  fn current_user(&self) -> Option<UserProfile> {
    self.current().as_ref().map(|s| s.user.clone())
  }
}
