use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::result::ApiResult;

/// Bounded retry with linear backoff.
///
/// Attempt `n` failing waits `base_delay * n` before attempt `n + 1`, so
/// three attempts with a one second base wait 1s then 2s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  max_attempts: u32,
  base_delay: Duration,
}

impl RetryPolicy {
  /// `max_attempts` counts the first try; zero is treated as one.
  pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
    Self {
      max_attempts: max_attempts.max(1),
      base_delay,
    }
  }

  /// No retries at all.
  pub fn single() -> Self {
    Self::new(1, Duration::ZERO)
  }

  pub fn max_attempts(&self) -> u32 {
    self.max_attempts
  }

  pub fn base_delay(&self) -> Duration {
    self.base_delay
  }

  /// Delay after attempt `attempt` (1-based) fails.
  pub fn delay_after(&self, attempt: u32) -> Duration {
    self.base_delay.saturating_mul(attempt)
  }

  /// Run `operation` until it succeeds or attempts run out.
  ///
  /// The closure receives the 1-based attempt number. Exhaustion yields a
  /// failure carrying the last error's message; nothing is raised.
  pub async fn execute<T, F, Fut>(&self, mut operation: F) -> ApiResult<T>
  where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
  {
    let mut attempt = 1;

    loop {
      match operation(attempt).await {
        Ok(result) => {
          if attempt > 1 {
            debug!("request succeeded on attempt {}", attempt);
          }
          return ApiResult::success(result);
        }
        Err(err) => {
          warn!("Request failed (attempt {}/{}): {}", attempt, self.max_attempts, err);
          if attempt >= self.max_attempts {
            return ApiResult::failure(err.to_string());
          }
          sleep(self.delay_after(attempt)).await;
          attempt += 1;
        }
      }
    }
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::new(3, Duration::from_millis(1000))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use tokio::time::Instant;

  #[test]
  fn test_delay_is_linear() {
    let policy = RetryPolicy::new(5, Duration::from_millis(1000));
    assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
    assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
    assert_eq!(policy.delay_after(3), Duration::from_millis(3000));
  }

  #[test]
  fn test_zero_attempts_means_one() {
    assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_always_failing_runs_exactly_max_attempts() {
    let policy = RetryPolicy::new(3, Duration::from_millis(1000));
    let calls = Arc::new(AtomicU32::new(0));
    let start = Instant::now();

    let result: ApiResult<()> = policy
      .execute(|_| {
        let calls = Arc::clone(&calls);
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          Err(GatewayError::Transport("connection refused".to_string()))
        }
      })
      .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.error(), Some("network error: connection refused"));
    assert!(start.elapsed() >= Duration::from_millis(3000));
  }

  #[tokio::test(start_paused = true)]
  async fn test_recovers_on_second_attempt() {
    let policy = RetryPolicy::new(3, Duration::from_millis(1000));
    let start = Instant::now();
    let mut seen = Vec::new();

    let result = policy
      .execute(|attempt| {
        seen.push(attempt);
        async move {
          if attempt == 1 {
            Err(GatewayError::Rejected {
              status: 500,
              message: "Internal Server Error".to_string(),
            })
          } else {
            Ok("ok")
          }
        }
      })
      .await;

    assert_eq!(result, ApiResult::success("ok"));
    assert_eq!(seen, vec![1, 2]);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(1000));
    assert!(elapsed < Duration::from_millis(2000));
  }

  #[tokio::test]
  async fn test_last_error_message_is_reported() {
    let policy = RetryPolicy::new(2, Duration::ZERO);
    let result: ApiResult<()> = policy
      .execute(|attempt| async move {
        Err(GatewayError::Malformed(format!("bad body {}", attempt)))
      })
      .await;

    assert_eq!(result.error(), Some("malformed response: bad body 2"));
  }
}
