//! Keywords, the stable identity every ranking observation hangs off.
//!
//! Keywords are created on first sight and never deleted. The text is
//! normalized once at registration and is immutable afterwards.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Surrogate identity of a registered keyword.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct KeywordId(pub Uuid);

impl KeywordId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for KeywordId {
  fn default() -> Self { Self::new() }
}

impl fmt::Display for KeywordId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.hyphenated().fmt(f)
  }
}

/// A tracked search keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
  pub keyword_id: KeywordId,
  /// Normalized text; see [`normalize_keyword`].
  pub text:       String,
  pub created_at: DateTime<Utc>,
}

/// Normalize keyword text: trimmed and case-folded.
///
/// Two inputs that normalize to the same string name the same keyword.
pub fn normalize_keyword(text: &str) -> Result<String> {
  let normalized = text.trim().to_lowercase();
  if normalized.is_empty() {
    return Err(Error::EmptyKeyword);
  }
  Ok(normalized)
}
