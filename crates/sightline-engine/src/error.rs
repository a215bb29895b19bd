//! Error type for `sightline-engine`.

use std::time::Duration;

use sightline_core::provider::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// A collaborator failed permanently; not retried.
  #[error("provider error: {0}")]
  Provider(#[from] ProviderError),

  #[error("gave up after {attempts} attempts: {last}")]
  RetryExhausted { attempts: u32, last: ProviderError },

  #[error("timed out after {0:?}")]
  Timeout(Duration),
}

impl Error {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
