//! Bearer token inspection.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::debug;

/// A token is refreshed once less than this many seconds of lifetime remain.
pub const REFRESH_WINDOW_SECS: i64 = 60 * 60;

#[derive(Deserialize)]
struct Claims {
  exp: Option<i64>,
}

/// `exp` claim of a JWT, without verifying the signature.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
  let payload = token.split('.').nth(1)?;
  let trimmed = payload.trim_end_matches('=');
  let bytes = URL_SAFE_NO_PAD
    .decode(trimmed)
    .or_else(|_| STANDARD.decode(payload))
    .ok()?;
  let claims: Claims = serde_json::from_slice(&bytes).ok()?;
  DateTime::from_timestamp(claims.exp?, 0)
}

/// True when the token expires within [`REFRESH_WINDOW_SECS`] of `now`.
///
/// A token that cannot be read is reported as not expiring.
pub fn is_expiring_soon(token: &str, now: DateTime<Utc>) -> bool {
  match expires_at(token) {
    Some(exp) => exp - now < Duration::seconds(REFRESH_WINDOW_SECS),
    None => {
      debug!("token carries no readable exp claim");
      false
    }
  }
}

#[cfg(test)]
pub(crate) fn token_expiring_at(exp: DateTime<Utc>) -> String {
  let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"userId":1,"exp":{}}}"#, exp.timestamp()));
  format!("header.{}.signature", payload)
}
