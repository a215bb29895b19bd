//! Store traits for the visibility tracker.
//!
//! The traits are implemented by storage backends (e.g.
//! `sightline-store-sqlite`). The engine and the analytics API depend on these
//! abstractions, not on any concrete backend.
//!
//! Every write is keyed: a write for a key that already exists overwrites it
//! in place ("latest wins"), so retried fetches never duplicate rows and no
//! write spans more than one logical key, except for a sitemap run, which is
//! applied as one unit.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::{collections::HashSet, future::Future};

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
  analysis::{NewAnalysis, UrlAnalysis, needs_analysis},
  discovery::{ReconcileSummary, SitemapEntry, SitemapRecord, UrlQuery, UrlRecord, UrlStats},
  keyword::{Keyword, KeywordId},
  mention::{
    BrandMatcher, MentionObservation, MentionQuery, MentionRate, MentionViolation, NewMention,
    mention_rate,
  },
  ranking::{NewRanking, RankedResult, RankingObservation, RankingQuery},
  schedule::{Requeue, SitemapSchedule},
};

// ─── Base ────────────────────────────────────────────────────────────────────

/// Shared error type for a storage backend.
pub trait Store: Send + Sync {
  type Error: std::error::Error + From<crate::Error> + Send + Sync + 'static;
}

// ─── Keywords ────────────────────────────────────────────────────────────────

pub trait KeywordRegistry: Store {
  /// Register `text`, or return the existing keyword with the same normalized
  /// text. Idempotent.
  fn register_keyword<'a>(
    &'a self,
    text: &'a str,
  ) -> impl Future<Output = Result<Keyword, Self::Error>> + Send + 'a;

  /// Look up a keyword by (un-normalized) text.
  fn resolve_keyword<'a>(
    &'a self,
    text: &'a str,
  ) -> impl Future<Output = Result<Option<Keyword>, Self::Error>> + Send + 'a;

  fn get_keyword(
    &self,
    id: KeywordId,
  ) -> impl Future<Output = Result<Option<Keyword>, Self::Error>> + Send + '_;

  /// All keywords, ordered by text.
  fn list_keywords(&self) -> impl Future<Output = Result<Vec<Keyword>, Self::Error>> + Send + '_;
}

// ─── Rankings ────────────────────────────────────────────────────────────────

pub trait RankingStore: Store {
  /// Insert or overwrite the observation for `(keyword_id, domain, check_date)`.
  fn upsert_ranking(
    &self,
    input: NewRanking,
  ) -> impl Future<Output = Result<RankingObservation, Self::Error>> + Send + '_;

  /// The observation with the greatest `check_date`, if any.
  fn latest_ranking<'a>(
    &'a self,
    keyword_id: KeywordId,
    domain: &'a str,
  ) -> impl Future<Output = Result<Option<RankingObservation>, Self::Error>> + Send + 'a;

  /// Observations with `from <= check_date <= to`, ordered by `check_date`.
  fn ranking_history<'a>(
    &'a self,
    keyword_id: KeywordId,
    domain: &'a str,
    from: NaiveDate,
    to: NaiveDate,
  ) -> impl Future<Output = Result<Vec<RankingObservation>, Self::Error>> + Send + 'a;

  /// `(keyword_id, domain)` keys already observed on `date`.
  fn ranking_keys_on(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<HashSet<(KeywordId, String)>, Self::Error>> + Send + '_;

  /// Observations whose keyword is not in the registry.
  fn orphaned_rankings(
    &self,
  ) -> impl Future<Output = Result<Vec<RankingObservation>, Self::Error>> + Send + '_;

  /// The analytics read contract; see [`RankingQuery`].
  fn query_rankings<'a>(
    &'a self,
    query: &'a RankingQuery,
  ) -> impl Future<Output = Result<Vec<RankedResult>, Self::Error>> + Send + 'a;
}

// ─── Mentions ────────────────────────────────────────────────────────────────

pub trait MentionStore: Store {
  /// The predicate every stored `mentioned` flag is derived with.
  fn brand_matcher(&self) -> &dyn BrandMatcher;

  /// Derive `mentioned` and insert or overwrite the observation for
  /// `(keyword, check_date, model_name)`.
  fn record_mention(
    &self,
    input: NewMention,
  ) -> impl Future<Output = Result<MentionObservation, Self::Error>> + Send + '_;

  /// Store an already-flagged observation (e.g. from a legacy export).
  ///
  /// Fails with [`crate::Error::ConsistencyViolation`] and writes nothing if
  /// the flag does not re-derive from the answer text.
  fn import_mention(
    &self,
    observation: MentionObservation,
  ) -> impl Future<Output = Result<MentionObservation, Self::Error>> + Send + '_;

  fn list_mentions<'a>(
    &'a self,
    query: &'a MentionQuery,
  ) -> impl Future<Output = Result<Vec<MentionObservation>, Self::Error>> + Send + 'a;

  /// `(keyword, model_name)` keys already observed on `date`.
  fn mention_keys_on(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<HashSet<(String, String)>, Self::Error>> + Send + '_;

  /// Distinct model names with at least one observation.
  fn list_models(&self) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Mention rate for one keyword and model over `from..=to`.
  ///
  /// Fails with [`crate::Error::InsufficientData`] when the range is empty.
  fn mention_rate<'a>(
    &'a self,
    keyword: &'a str,
    model_name: &'a str,
    from: NaiveDate,
    to: NaiveDate,
  ) -> impl Future<Output = Result<MentionRate, Self::Error>> + Send + 'a {
    async move {
      let query = MentionQuery {
        keyword:    Some(keyword.to_owned()),
        model_name: Some(model_name.to_owned()),
        from:       Some(from),
        to:         Some(to),
      };
      let rows = self.list_mentions(&query).await?;
      Ok(mention_rate(&rows)?)
    }
  }

  /// Re-derive every stored flag and report the ones that disagree.
  fn audit_mentions(
    &self,
  ) -> impl Future<Output = Result<Vec<MentionViolation>, Self::Error>> + Send + '_ {
    async move {
      let rows = self.list_mentions(&MentionQuery::default()).await?;
      let matcher = self.brand_matcher();
      Ok(rows.iter().filter_map(|o| o.violation(matcher)).collect())
    }
  }

  /// Rewrite every inconsistent row with a freshly derived flag, e.g. after
  /// the brand matcher changed. Returns the repaired rows.
  fn rederive_mentions(
    &self,
  ) -> impl Future<Output = Result<Vec<MentionObservation>, Self::Error>> + Send + '_ {
    async move {
      let rows = self.list_mentions(&MentionQuery::default()).await?;
      let mut repaired = Vec::new();
      for row in rows {
        if row.violation(self.brand_matcher()).is_none() {
          continue;
        }
        let fixed = self
          .record_mention(NewMention {
            keyword:     row.keyword,
            check_date:  row.check_date,
            model_name:  row.model_name,
            answer_text: row.answer_text,
          })
          .await?;
        repaired.push(fixed);
      }
      Ok(repaired)
    }
  }
}

// ─── URL discovery ───────────────────────────────────────────────────────────

pub trait UrlTracker: Store {
  /// Register a sitemap in `pending` state. Idempotent.
  fn register_sitemap<'a>(
    &'a self,
    sitemap_url: &'a str,
  ) -> impl Future<Output = Result<SitemapRecord, Self::Error>> + Send + 'a;

  fn get_sitemap<'a>(
    &'a self,
    sitemap_url: &'a str,
  ) -> impl Future<Output = Result<Option<SitemapRecord>, Self::Error>> + Send + 'a;

  fn list_sitemaps(
    &self,
  ) -> impl Future<Output = Result<Vec<SitemapRecord>, Self::Error>> + Send + '_;

  /// Move a sitemap to `processing`, registering it first if needed.
  fn begin_sitemap_run<'a>(
    &'a self,
    sitemap_url: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<SitemapRecord, Self::Error>> + Send + 'a;

  /// Reconcile `listing` against the stored URLs and mark the sitemap
  /// `completed`, all in one transaction.
  fn complete_sitemap_run<'a>(
    &'a self,
    sitemap_url: &'a str,
    listing: Vec<SitemapEntry>,
    now: DateTime<Utc>,
    removal_grace_runs: u32,
  ) -> impl Future<Output = Result<ReconcileSummary, Self::Error>> + Send + 'a;

  /// Mark a sitemap `failed`. No URL record is touched.
  fn fail_sitemap_run<'a>(
    &'a self,
    sitemap_url: &'a str,
    error: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<SitemapRecord, Self::Error>> + Send + 'a;

  /// Move sitemaps back to `pending` where `schedule` says so.
  fn requeue_sitemaps<'a>(
    &'a self,
    schedule: &'a SitemapSchedule,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<(String, Requeue)>, Self::Error>> + Send + 'a;

  /// Sitemaps due for processing at `now`.
  fn due_sitemaps<'a>(
    &'a self,
    schedule: &'a SitemapSchedule,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a {
    async move {
      let records = self.list_sitemaps().await?;
      Ok(schedule.due(&records, now))
    }
  }

  fn get_url<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = Result<Option<UrlRecord>, Self::Error>> + Send + 'a;

  fn list_urls<'a>(
    &'a self,
    query: &'a UrlQuery,
  ) -> impl Future<Output = Result<Vec<UrlRecord>, Self::Error>> + Send + 'a;

  fn url_stats(&self) -> impl Future<Output = Result<UrlStats, Self::Error>> + Send + '_;
}

// ─── Content analysis ────────────────────────────────────────────────────────

pub trait AnalysisCache: UrlTracker {
  fn get_analysis<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = Result<Option<UrlAnalysis>, Self::Error>> + Send + 'a;

  /// Insert or overwrite the analysis for `input.url`, stamping
  /// `last_analyzed` with the current time.
  fn store_analysis(
    &self,
    input: NewAnalysis,
  ) -> impl Future<Output = Result<UrlAnalysis, Self::Error>> + Send + '_;

  /// Whether `url` must be (re-)analyzed. Untracked URLs never need analysis.
  ///
  /// Callers that act on the answer must hold a per-URL lock across the check
  /// and the following [`store_analysis`](Self::store_analysis).
  fn needs_analysis<'a>(
    &'a self,
    url: &'a str,
    current_version: u32,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a {
    async move {
      let Some(record) = self.get_url(url).await? else {
        return Ok(false);
      };
      let analysis = self.get_analysis(url).await?;
      Ok(needs_analysis(&record, analysis.as_ref(), current_version))
    }
  }
}

// ─── Aggregate ───────────────────────────────────────────────────────────────

/// Everything the tracking engine needs from a backend.
pub trait VisibilityStore: KeywordRegistry + RankingStore + MentionStore + AnalysisCache {}

impl<T> VisibilityStore for T where T: KeywordRegistry + RankingStore + MentionStore + AnalysisCache {}
