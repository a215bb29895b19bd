//! Error type for `sightline-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] sightline_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A stored column could not be decoded back into its domain type.
  #[error("decode error: {0}")]
  Decode(String),

  /// Attempted to attach an analysis to a URL that is not tracked.
  #[error("url not tracked: {0}")]
  UrlNotFound(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
