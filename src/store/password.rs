//! Password hashing capability used by local accounts.

use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Hash and verify passwords for accounts kept in the local store.
pub trait PasswordHasher: Send + Sync {
  fn hash(&self, password: &str) -> String;
  fn verify(&self, password: &str, stored: &str) -> bool;
}

/// Salted SHA-256, stored as `"{salt}${digest}"` in hex.
///
/// Not a key-derivation function. Swap in a stronger [`PasswordHasher`] where
/// the local store is exposed to other users.
#[derive(Debug, Default)]
pub struct SaltedSha256;

static SALT_COUNTER: AtomicU64 = AtomicU64::new(0);

impl SaltedSha256 {
  fn salt() -> String {
    let nanos = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_nanos())
      .unwrap_or_default();
    let count = SALT_COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut hasher = Sha256::new();
    hasher.update(nanos.to_le_bytes());
    hasher.update(count.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hex::encode(&hasher.finalize()[..16])
  }

  fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"$");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl PasswordHasher for SaltedSha256 {
  fn hash(&self, password: &str) -> String {
    let salt = Self::salt();
    let digest = Self::digest(&salt, password);
    format!("{}${}", salt, digest)
  }

  fn verify(&self, password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
      Some((salt, digest)) => Self::digest(salt, password) == digest,
      None => false,
    }
  }
}
