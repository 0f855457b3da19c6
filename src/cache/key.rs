//! Stable keys for request deduplication.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Derive the dedup key for a call to `endpoint` with `options`.
///
/// Options are serialized to JSON (object keys in sorted order), so two calls
/// with the same endpoint and equal options collapse into one. The result is
/// hashed so that credentials carried in the options never appear in logs.
pub fn request_key<O: Serialize + ?Sized>(endpoint: &str, options: &O) -> String {
  let options = serde_json::to_value(options)
    .map(|v| v.to_string())
    .unwrap_or_default();
  let input = format!("{}-{}", endpoint, options);

  // SHA256 hash for stable, fixed-length keys
  let mut hasher = Sha256::new();
  hasher.update(input.as_bytes());
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_equal_options_give_equal_keys() {
    let a = request_key("/api/tasks", &json!({"method": "GET", "headers": {"a": 1, "b": 2}}));
    let b = request_key("/api/tasks", &json!({"headers": {"b": 2, "a": 1}, "method": "GET"}));
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
  }

  #[test]
  fn test_endpoint_and_options_both_matter() {
    let base = request_key("/api/tasks", &json!({"method": "GET"}));
    assert_ne!(base, request_key("/api/users", &json!({"method": "GET"})));
    assert_ne!(base, request_key("/api/tasks", &json!({"method": "POST"})));
  }

  #[test]
  fn test_key_does_not_leak_credentials() {
    let key = request_key("/api/auth/me", &json!({"bearer": "secret-token"}));
    assert!(!key.contains("secret"));
  }
}
