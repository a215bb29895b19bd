//! Bounded retry with exponential backoff for collaborator calls.

use std::{future::Future, time::Duration};

use sightline_core::provider::ProviderError;
use tracing::debug;

use crate::{Error, Result, config::RetryConfig};

/// Upper bound on the backoff exponent.
const MAX_DOUBLINGS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts, including the first. Zero is treated as one.
  pub attempts:   u32,
  pub base_delay: Duration,
  /// Applied to each attempt separately.
  pub timeout:    Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      attempts:   3,
      base_delay: Duration::from_secs(2),
      timeout:    Duration::from_secs(30),
    }
  }
}

impl From<&RetryConfig> for RetryPolicy {
  fn from(cfg: &RetryConfig) -> Self {
    Self {
      attempts:   cfg.attempts,
      base_delay: Duration::from_millis(cfg.base_delay_ms),
      timeout:    Duration::from_secs(cfg.timeout_secs),
    }
  }
}

impl RetryPolicy {
  /// Delay slept after the `attempt`-th failure (1-based).
  pub fn delay_for(&self, attempt: u32) -> Duration {
    self
      .base_delay
      .saturating_mul(2_u32.pow(attempt.saturating_sub(1).min(MAX_DOUBLINGS)))
  }

  /// Run `op` until it succeeds, fails permanently, or attempts run out.
  ///
  /// [`ProviderError::Unavailable`] and per-attempt timeouts are retried;
  /// [`ProviderError::Rejected`] is returned immediately.
  pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
  {
    let attempts = self.attempts.max(1);
    let mut attempt = 0;

    loop {
      attempt += 1;
      // `None` marks a timeout.
      let failure = match tokio::time::timeout(self.timeout, op()).await {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(e)) if !e.is_transient() => return Err(Error::Provider(e)),
        Ok(Err(e)) => Some(e),
        Err(_) => None,
      };

      if attempt >= attempts {
        return Err(match failure {
          Some(last) => Error::RetryExhausted { attempts, last },
          None => Error::Timeout(self.timeout),
        });
      }

      let delay = self.delay_for(attempt);
      match &failure {
        Some(e) => debug!(what, attempt, ?delay, error = %e, "retrying"),
        None => debug!(what, attempt, ?delay, "attempt timed out, retrying"),
      }
      tokio::time::sleep(delay).await;
    }
  }
}
