//! The uniform result shape returned by every public operation.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt::Display;

/// Details of a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
  pub error: String,
  pub timestamp: DateTime<Utc>,
}

/// Either `{ success: true, data }` or `{ success: false, error, timestamp }`.
///
/// Public operations return this instead of `Result` so that nothing is ever
/// raised across the boundary; the caller only inspects the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResult<T> {
  Success(T),
  Failure(Failure),
}

impl<T> ApiResult<T> {
  pub fn success(data: T) -> Self {
    Self::Success(data)
  }

  /// Failure stamped with the current time.
  pub fn failure(error: impl Into<String>) -> Self {
    Self::Failure(Failure {
      error: error.into(),
      timestamp: Utc::now(),
    })
  }

  pub fn is_success(&self) -> bool {
    matches!(self, Self::Success(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      Self::Success(data) => Some(data),
      Self::Failure(_) => None,
    }
  }

  pub fn into_data(self) -> Option<T> {
    match self {
      Self::Success(data) => Some(data),
      Self::Failure(_) => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      Self::Success(_) => None,
      Self::Failure(failure) => Some(&failure.error),
    }
  }

  pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ApiResult<U> {
    match self {
      Self::Success(data) => ApiResult::Success(f(data)),
      Self::Failure(failure) => ApiResult::Failure(failure),
    }
  }
}

impl<T, E: Display> From<Result<T, E>> for ApiResult<T> {
  fn from(result: Result<T, E>) -> Self {
    match result {
      Ok(data) => Self::success(data),
      Err(err) => Self::failure(err.to_string()),
    }
  }
}

impl<T: Serialize> Serialize for ApiResult<T> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Self::Success(data) => {
        let mut state = serializer.serialize_struct("ApiResult", 2)?;
        state.serialize_field("success", &true)?;
        state.serialize_field("data", data)?;
        state.end()
      }
      Self::Failure(failure) => {
        let mut state = serializer.serialize_struct("ApiResult", 3)?;
        state.serialize_field("success", &false)?;
        state.serialize_field("error", &failure.error)?;
        state.serialize_field("timestamp", &failure.timestamp)?;
        state.end()
      }
    }
  }
}
