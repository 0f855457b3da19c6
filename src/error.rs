//! Error taxonomy for the remote and local paths.

use thiserror::Error;

/// Failure of a single remote call.
///
/// `Clone` because one settled value is handed to every caller that joined
/// the same in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
  /// Network unreachable, connection reset, timeout.
  #[error("network error: {0}")]
  Transport(String),

  /// The service answered with a non-2xx status.
  #[error("HTTP error! status: {status}: {message}")]
  Rejected { status: u16, message: String },

  /// The response body could not be decoded into the expected shape.
  #[error("malformed response: {0}")]
  Malformed(String),
}

impl GatewayError {
  /// Malformed-payload error from a serde decode failure.
  pub fn malformed(context: &str, err: serde_json::Error) -> Self {
    Self::Malformed(format!("{}: {}", context, err))
  }
}

impl From<reqwest::Error> for GatewayError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      Self::Malformed(err.to_string())
    } else {
      Self::Transport(err.to_string())
    }
  }
}

/// Failure of an operation against the local persistent store, or a domain
/// rule violated while applying it.
#[derive(Debug, Error)]
pub enum StoreError {
  /// The stored collection could not be parsed. Never auto-repaired.
  #[error("stored collection '{key}' is corrupted: {message}")]
  Corrupted { key: String, message: String },

  #[error("local storage failure: {0}")]
  Backend(String),

  #[error("{0} not found")]
  NotFound(String),

  #[error("{0}")]
  Conflict(String),

  #[error("invalid credentials")]
  InvalidCredentials,

  #[error("not signed in")]
  NotAuthenticated,

  #[error("{0}")]
  Validation(String),

  #[error(transparent)]
  Remote(#[from] GatewayError),
}

impl From<rusqlite::Error> for StoreError {
  fn from(err: rusqlite::Error) -> Self {
    Self::Backend(err.to_string())
  }
}
