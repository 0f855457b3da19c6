//! Remote-first execution with a local fallback.

use std::future::Future;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::result::ApiResult;

/// Which path served an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<R, L = R> {
  Remote(R),
  Local(L),
}

/// Which backend the last operation of a store used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
  Remote,
  Local,
}

impl<R, L> Outcome<R, L> {
  pub fn source(&self) -> Source {
    match self {
      Outcome::Remote(_) => Source::Remote,
      Outcome::Local(_) => Source::Local,
    }
  }
}

impl<T> Outcome<T, T> {
  pub fn into_inner(self) -> T {
    match self {
      Outcome::Remote(value) | Outcome::Local(value) => value,
    }
  }
}

/// Run `remote` if present, falling back to `local` when it is absent or
/// reports failure.
///
/// `remote` is `None` when the capability for the remote path is missing,
/// which is not an error. A remote failure never reaches the caller; only the
/// local path's error does.
pub async fn with_fallback<R, L, Fut, F>(
  operation: &str,
  remote: Option<Fut>,
  local: F,
) -> Result<Outcome<R, L>, StoreError>
where
  Fut: Future<Output = ApiResult<R>>,
  F: FnOnce() -> Result<L, StoreError>,
{
  match remote {
    Some(call) => match call.await {
      ApiResult::Success(value) => return Ok(Outcome::Remote(value)),
      ApiResult::Failure(failure) => {
        warn!("{}: remote failed, using local storage: {}", operation, failure.error);
      }
    },
    None => debug!("{}: no remote session, using local storage", operation),
  }

  local().map(Outcome::Local)
}
