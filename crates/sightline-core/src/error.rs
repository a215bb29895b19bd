//! Error types for `sightline-core`.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("keyword text is empty after normalization")]
  EmptyKeyword,

  #[error("invalid search position: {0}")]
  InvalidPosition(i64),

  #[error("unknown {kind} status: {value:?}")]
  UnknownStatus { kind: &'static str, value: String },

  #[error("insufficient data: {0}")]
  InsufficientData(String),

  /// A stored or submitted `mentioned` flag disagrees with the flag derived
  /// from its answer text.
  #[error(
    "mention flag for {keyword:?}/{model_name} on {check_date} is {stored}, \
     answer text derives {derived}"
  )]
  ConsistencyViolation {
    keyword:    String,
    model_name: String,
    check_date: NaiveDate,
    stored:     bool,
    derived:    bool,
  },

  #[error("invalid url: {0}")]
  InvalidUrl(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
