//! Error types for the sitemap codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("malformed XML: {0}")]
  Xml(String),

  #[error("document has no root element")]
  MissingRoot,

  #[error("unexpected root element <{0}>; expected <urlset> or <sitemapindex>")]
  UnknownRoot(String),

  #[error("invalid W3C datetime: {0:?}")]
  InvalidDate(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
