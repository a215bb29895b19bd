//! External collaborators consumed by the tracking engine.
//!
//! Every trait here wraps a network call. Implementations report transient
//! trouble (timeouts, 5xx, rate limits) as [`ProviderError::Unavailable`] so
//! the engine can retry, and permanent trouble (bad credentials, malformed
//! replies) as [`ProviderError::Rejected`].

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{analysis::Analysis, discovery::SitemapEntry, ranking::Position};

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
  #[error("unavailable: {0}")]
  Unavailable(String),

  #[error("rejected: {0}")]
  Rejected(String),
}

impl ProviderError {
  pub fn is_transient(&self) -> bool { matches!(self, Self::Unavailable(_)) }
}

/// Result of a single rank check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankCheck {
  pub position: Position,
  /// The URL of the domain that ranked, if it ranked.
  pub url:      Option<String>,
}

/// Looks up where a domain ranks for a keyword in conventional search.
pub trait RankChecker: Send + Sync {
  fn check<'a>(
    &'a self,
    keyword: &'a str,
    domain: &'a str,
    date: NaiveDate,
  ) -> impl Future<Output = Result<RankCheck, ProviderError>> + Send + 'a;
}

/// One configured AI model.
pub trait LlmProvider: Send + Sync {
  /// Display name the observations are recorded under.
  fn model_name(&self) -> &str;

  fn ask<'a>(
    &'a self,
    keyword: &'a str,
  ) -> impl Future<Output = Result<String, ProviderError>> + Send + 'a;
}

/// Downloads and parses a sitemap into its URL entries.
pub trait SitemapFetcher: Send + Sync {
  fn fetch<'a>(
    &'a self,
    sitemap_url: &'a str,
  ) -> impl Future<Output = Result<Vec<SitemapEntry>, ProviderError>> + Send + 'a;
}

/// Downloads a page's content for analysis.
pub trait PageFetcher: Send + Sync {
  fn fetch_page<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = Result<String, ProviderError>> + Send + 'a;
}

/// Summarizes and categorizes page content.
pub trait ContentAnalyzer: Send + Sync {
  /// Version tag of the analysis logic; bumping it invalidates the cache.
  fn version(&self) -> u32;

  fn analyze<'a>(
    &'a self,
    url: &'a str,
    content: &'a str,
  ) -> impl Future<Output = Result<Analysis, ProviderError>> + Send + 'a;
}
