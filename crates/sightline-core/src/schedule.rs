//! Cycle selection: which sitemaps and keys are due for work.
//!
//! Scheduling state is an explicit value rather than ambient process state so
//! a cycle's selection can be inspected and tested deterministically.

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  discovery::{SitemapRecord, SitemapStatus},
  keyword::{Keyword, KeywordId},
  provider::LlmProvider,
};

/// Longest backoff exponent applied to repeated sitemap failures.
const MAX_BACKOFF_DOUBLINGS: u32 = 6;

// ─── Sitemaps ────────────────────────────────────────────────────────────────

/// What [`SitemapSchedule::requeue`] decided for a sitemap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requeue {
  /// A failed sitemap whose backoff has elapsed.
  RetryAfterFailure,
  /// A run that started long ago and never finished (e.g. a cancelled cycle).
  StuckProcessing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SitemapSchedule {
  /// Minimum time between successful runs of the same sitemap.
  pub min_interval:    TimeDelta,
  /// Base delay before a failed sitemap returns to `pending`; doubles per
  /// consecutive failure.
  pub failure_backoff: TimeDelta,
  /// A `processing` run older than this is assumed abandoned.
  pub stuck_after:     TimeDelta,
}

impl Default for SitemapSchedule {
  fn default() -> Self {
    Self {
      min_interval:    TimeDelta::hours(24),
      failure_backoff: TimeDelta::minutes(15),
      stuck_after:     TimeDelta::hours(2),
    }
  }
}

impl SitemapSchedule {
  /// Backoff before the next retry after `failures` consecutive failures.
  pub fn backoff_for(&self, failures: u32) -> TimeDelta {
    let doublings = failures.saturating_sub(1).min(MAX_BACKOFF_DOUBLINGS);
    self
      .failure_backoff
      .checked_mul(2_i32.pow(doublings))
      .unwrap_or(TimeDelta::MAX)
  }

  /// Whether a sitemap should be processed in a cycle starting at `now`.
  ///
  /// `processing` sitemaps are never due, and `failed` ones only become due
  /// after [`requeue`](Self::requeue) has moved them back to `pending`.
  pub fn is_due(&self, record: &SitemapRecord, now: DateTime<Utc>) -> bool {
    match record.status {
      SitemapStatus::Processing | SitemapStatus::Failed => false,
      SitemapStatus::Pending | SitemapStatus::Completed => match record.last_processed {
        None => true,
        Some(last) => now - last >= self.min_interval,
      },
    }
  }

  /// The due subset of `records`, in input order.
  pub fn due(&self, records: &[SitemapRecord], now: DateTime<Utc>) -> Vec<String> {
    records
      .iter()
      .filter(|r| self.is_due(r, now))
      .map(|r| r.sitemap_url.clone())
      .collect()
  }

  /// Whether a sitemap should move back to `pending` at `now`.
  pub fn requeue(&self, record: &SitemapRecord, now: DateTime<Utc>) -> Option<Requeue> {
    let attempted = record.last_attempted?;
    match record.status {
      SitemapStatus::Failed if now - attempted >= self.backoff_for(record.consecutive_failures) => {
        Some(Requeue::RetryAfterFailure)
      }
      SitemapStatus::Processing if now - attempted >= self.stuck_after => {
        Some(Requeue::StuckProcessing)
      }
      _ => None,
    }
  }
}

// ─── Observation cycles ──────────────────────────────────────────────────────

/// The `(keyword, domain)` pairs a ranking cycle should check.
///
/// With `already_recorded` empty every pair is returned; passing the keys
/// recorded earlier the same day resumes an interrupted cycle.
pub fn ranking_work<'a>(
  keywords: &'a [Keyword],
  domains: &'a [String],
  already_recorded: &HashSet<(KeywordId, String)>,
) -> Vec<(&'a Keyword, &'a str)> {
  keywords
    .iter()
    .flat_map(|k| domains.iter().map(move |d| (k, d.as_str())))
    .filter(|(k, d)| !already_recorded.contains(&(k.keyword_id, (*d).to_owned())))
    .collect()
}

/// The `(keyword, model)` pairs a mention cycle should ask, skipping any in
/// `already_recorded`. Keywords are normalized texts.
pub fn mention_work<'a, M>(
  keywords: &'a [String],
  models: &'a [M],
  already_recorded: &HashSet<(String, String)>,
) -> Vec<(&'a str, &'a M)>
where
  M: LlmProvider,
{
  keywords
    .iter()
    .flat_map(|k| models.iter().map(move |m| (k.as_str(), m)))
    .filter(|(k, m)| {
      !already_recorded.contains(&((*k).to_owned(), m.model_name().trim().to_owned()))
    })
    .collect()
}
