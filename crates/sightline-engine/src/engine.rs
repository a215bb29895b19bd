//! The visibility tracking engine.
//!
//! An [`Engine`] runs batch cycles that pull from external collaborators and
//! write through a [`VisibilityStore`]. Cycles are best-effort: a failing key
//! is logged and counted in the returned report, and never stops the rest of
//! the cycle. Independent keys run concurrently; work on the same key is
//! serialized through [`KeyLocks`].

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};
use futures::{StreamExt as _, stream};
use sightline_core::{
  analysis::{NewAnalysis, needs_analysis},
  discovery::{ReconcileSummary, UrlQuery, UrlStatus},
  keyword::Keyword,
  mention::NewMention,
  provider::{ContentAnalyzer, LlmProvider, PageFetcher, RankChecker, SitemapFetcher},
  ranking::{NewRanking, normalize_domain},
  schedule::{SitemapSchedule, mention_work, ranking_work},
  store::VisibilityStore,
};
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  locks::KeyLocks,
  report::{CycleReport, DiscoveryReport, Outcome},
  retry::RetryPolicy,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
  /// Keys processed at once within a cycle.
  pub concurrency:        usize,
  /// Consecutive missed sitemap runs before a URL is `removed`.
  pub removal_grace_runs: u32,
  pub schedule:           SitemapSchedule,
  /// Analysis version discovery compares cached analyses against.
  pub analysis_version:   u32,
  /// Skip ranking and mention keys already recorded for the cycle's date.
  pub resume:             bool,
}

impl Default for EngineOptions {
  fn default() -> Self {
    Self {
      concurrency:        4,
      removal_grace_runs: 2,
      schedule:           SitemapSchedule::default(),
      analysis_version:   1,
      resume:             false,
    }
  }
}

pub struct Engine<S> {
  store:   Arc<S>,
  retry:   RetryPolicy,
  locks:   KeyLocks,
  options: EngineOptions,
}

impl<S> Engine<S>
where
  S: VisibilityStore,
{
  pub fn new(store: Arc<S>, retry: RetryPolicy, options: EngineOptions) -> Self {
    Self { store, retry, locks: KeyLocks::new(), options }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn options(&self) -> &EngineOptions { &self.options }

  fn tally<T>(&self, report: &mut CycleReport, kind: &str, outcomes: Vec<(String, Result<T>)>)
  where
    T: Into<Outcome>,
  {
    for (key, outcome) in outcomes {
      if let Err(e) = &outcome {
        warn!(kind, %key, error = %e, "key failed");
      }
      report.record(key, outcome.map(Into::into));
    }
  }

  // ─── Rankings ──────────────────────────────────────────────────────────────

  /// Check every `keyword × domain` pair for `date` and record the positions.
  ///
  /// Keywords are registered on first sight. A keyword that cannot be
  /// registered counts as one failure and its pairs are not checked.
  pub async fn run_ranking_cycle<C>(
    &self,
    checker: &C,
    keywords: &[String],
    domains: &[String],
    date: NaiveDate,
  ) -> CycleReport
  where
    C: RankChecker,
  {
    info!(%date, keywords = keywords.len(), domains = domains.len(), "ranking cycle started");
    let mut report = CycleReport::default();

    let mut registered: Vec<Keyword> = Vec::with_capacity(keywords.len());
    for text in keywords {
      match self.store.register_keyword(text).await {
        Ok(keyword) if !registered.iter().any(|k| k.keyword_id == keyword.keyword_id) => {
          registered.push(keyword)
        }
        Ok(_) => {}
        Err(e) => {
          warn!(keyword = %text, error = %e, "keyword registration failed");
          report.fail(text.as_str(), &e);
        }
      }
    }

    let mut domains: Vec<String> = domains.iter().map(|d| normalize_domain(d)).collect();
    domains.sort();
    domains.dedup();

    let done = if self.options.resume {
      self.store.ranking_keys_on(date).await.unwrap_or_else(|e| {
        warn!(error = %e, "could not load recorded rankings, checking everything");
        HashSet::new()
      })
    } else {
      HashSet::new()
    };

    let work = ranking_work(&registered, &domains, &done);
    let skipped = registered.len() * domains.len() - work.len();
    if skipped > 0 {
      debug!(skipped, "rankings already recorded");
      report.skip(skipped);
    }

    let outcomes: Vec<(String, Result<()>)> =
      stream::iter(work.into_iter().map(|(keyword, domain)| {
        async move {
          let key = format!("{}|{domain}|{date}", keyword.text);
          (key, self.rank_one(checker, keyword, domain, date).await)
        }
      }))
      .buffer_unordered(self.options.concurrency.max(1))
      .collect()
      .await;

    self.tally(&mut report, "ranking", outcomes);
    info!(
      %date,
      succeeded = report.succeeded,
      skipped = report.skipped,
      failed = report.failures.len(),
      "ranking cycle finished"
    );
    report
  }

  async fn rank_one<C>(
    &self,
    checker: &C,
    keyword: &Keyword,
    domain: &str,
    date: NaiveDate,
  ) -> Result<()>
  where
    C: RankChecker,
  {
    let _guard = self
      .locks
      .lock(format!("rank|{}|{domain}|{date}", keyword.keyword_id))
      .await;

    let check = self
      .retry
      .run(&keyword.text, || checker.check(&keyword.text, domain, date))
      .await?;

    self
      .store
      .upsert_ranking(NewRanking {
        keyword_id:   keyword.keyword_id,
        domain:       domain.to_owned(),
        check_date:   date,
        position:     check.position,
        observed_url: check.url,
      })
      .await
      .map_err(Error::store)?;
    Ok(())
  }

  // ─── Mentions ──────────────────────────────────────────────────────────────

  /// Ask every model about every keyword and record the answers for `date`.
  ///
  /// Keywords are registered on first sight, as in
  /// [`run_ranking_cycle`](Self::run_ranking_cycle).
  pub async fn run_mention_cycle<M>(
    &self,
    models: &[M],
    keywords: &[String],
    date: NaiveDate,
  ) -> CycleReport
  where
    M: LlmProvider,
  {
    info!(%date, keywords = keywords.len(), models = models.len(), "mention cycle started");
    let mut report = CycleReport::default();

    let mut normalized: Vec<String> = Vec::with_capacity(keywords.len());
    for text in keywords {
      match self.store.register_keyword(text).await {
        Ok(keyword) if !normalized.contains(&keyword.text) => normalized.push(keyword.text),
        Ok(_) => {}
        Err(e) => {
          warn!(keyword = %text, error = %e, "keyword registration failed");
          report.fail(text.as_str(), &e);
        }
      }
    }

    let done = if self.options.resume {
      self.store.mention_keys_on(date).await.unwrap_or_else(|e| {
        warn!(error = %e, "could not load recorded mentions, asking everything");
        HashSet::new()
      })
    } else {
      HashSet::new()
    };

    let work = mention_work(&normalized, models, &done);
    let skipped = normalized.len() * models.len() - work.len();
    if skipped > 0 {
      debug!(skipped, "mentions already recorded");
      report.skip(skipped);
    }

    let outcomes: Vec<(String, Result<()>)> =
      stream::iter(work.into_iter().map(|(keyword, model)| {
        async move {
          let key = format!("{keyword}|{date}|{}", model.model_name().trim());
          (key, self.mention_one(model, keyword, date).await)
        }
      }))
      .buffer_unordered(self.options.concurrency.max(1))
      .collect()
      .await;

    self.tally(&mut report, "mention", outcomes);
    info!(
      %date,
      succeeded = report.succeeded,
      skipped = report.skipped,
      failed = report.failures.len(),
      "mention cycle finished"
    );
    report
  }

  async fn mention_one<M>(
    &self,
    model: &M,
    keyword: &str,
    date: NaiveDate,
  ) -> Result<()>
  where
    M: LlmProvider,
  {
    let model_name = model.model_name().trim();
    let _guard = self
      .locks
      .lock(format!("mention|{keyword}|{date}|{model_name}"))
      .await;

    let answer_text = self.retry.run(keyword, || model.ask(keyword)).await?;

    let obs = self
      .store
      .record_mention(NewMention {
        keyword:    keyword.to_owned(),
        check_date: date,
        model_name: model_name.to_owned(),
        answer_text,
      })
      .await
      .map_err(Error::store)?;
    debug!(keyword, model = model_name, mentioned = obs.mentioned, "mention recorded");
    Ok(())
  }

  // ─── Discovery ─────────────────────────────────────────────────────────────

  /// Fetch one sitemap and reconcile its listing against the tracked URLs.
  ///
  /// A fetch failure marks the sitemap `failed` and leaves every URL record
  /// untouched.
  pub async fn process_sitemap<F>(
    &self,
    fetcher: &F,
    sitemap_url: &str,
    now: DateTime<Utc>,
  ) -> Result<ReconcileSummary>
  where
    F: SitemapFetcher,
  {
    let _guard = self.locks.lock(format!("sitemap|{sitemap_url}")).await;

    self
      .store
      .begin_sitemap_run(sitemap_url, now)
      .await
      .map_err(Error::store)?;

    let listing = match self.retry.run(sitemap_url, || fetcher.fetch(sitemap_url)).await {
      Ok(listing) => listing,
      Err(e) => return Err(self.fail_run(sitemap_url, e, now).await),
    };

    let summary = match self
      .store
      .complete_sitemap_run(sitemap_url, listing, now, self.options.removal_grace_runs)
      .await
    {
      Ok(summary) => summary,
      Err(e) => return Err(self.fail_run(sitemap_url, Error::store(e), now).await),
    };

    info!(
      sitemap = sitemap_url,
      listed = summary.listed,
      discovered = summary.discovered,
      modified = summary.modified,
      reappeared = summary.reappeared,
      stale = summary.stale,
      removed = summary.removed,
      "sitemap processed"
    );
    Ok(summary)
  }

  async fn fail_run(&self, sitemap_url: &str, error: Error, now: DateTime<Utc>) -> Error {
    if let Err(e) = self
      .store
      .fail_sitemap_run(sitemap_url, &error.to_string(), now)
      .await
    {
      warn!(sitemap = sitemap_url, error = %e, "could not mark sitemap failed");
    }
    error
  }

  /// Requeue, select and process due sitemaps, then queue the URLs whose
  /// analysis is missing or out of date.
  pub async fn run_discovery_cycle<F>(&self, fetcher: &F, now: DateTime<Utc>) -> DiscoveryReport
  where
    F: SitemapFetcher,
  {
    let schedule = &self.options.schedule;
    let mut report = DiscoveryReport::default();

    match self.store.requeue_sitemaps(schedule, now).await {
      Ok(requeued) => {
        for (url, reason) in &requeued {
          info!(sitemap = %url, ?reason, "sitemap requeued");
        }
        report.requeued = requeued;
      }
      Err(e) => warn!(error = %e, "requeue failed"),
    }

    let due = match self.store.due_sitemaps(schedule, now).await {
      Ok(due) => due,
      Err(e) => {
        warn!(error = %e, "could not select due sitemaps");
        report.sitemaps.fail("due sitemaps", &e);
        return report;
      }
    };
    info!(due = due.len(), "discovery cycle started");

    let outcomes: Vec<(String, Result<ReconcileSummary>)> =
      stream::iter(due.into_iter().map(|url| {
        async move {
          let outcome = self.process_sitemap(fetcher, &url, now).await;
          (url, outcome)
        }
      }))
      .buffer_unordered(self.options.concurrency.max(1))
      .collect()
      .await;

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for (url, outcome) in outcomes {
      match outcome {
        Ok(summary) => {
          for candidate in &summary.analysis_candidates {
            if seen.insert(candidate.clone()) {
              candidates.push(candidate.clone());
            }
          }
          report.summaries.push(summary);
          report.sitemaps.record(url, Ok(Outcome::Done));
        }
        Err(e) => {
          warn!(sitemap = %url, error = %e, "sitemap failed");
          report.sitemaps.record(url, Err(e));
        }
      }
    }
    report.summaries.sort_by(|a, b| a.sitemap_url.cmp(&b.sitemap_url));

    for url in candidates {
      let check = self
        .store
        .needs_analysis(&url, self.options.analysis_version)
        .await;
      match &check {
        Ok(false) => debug!(%url, "analysis is current"),
        Err(e) => warn!(%url, error = %e, "could not check analysis cache; queueing anyway"),
        Ok(true) => {}
      }
      report.admit(url, check);
    }

    info!(
      processed = report.sitemaps.succeeded,
      failed = report.sitemaps.failures.len(),
      queued = report.analysis_queue.len(),
      "discovery cycle finished"
    );
    report
  }

  // ─── Analysis ──────────────────────────────────────────────────────────────

  /// Tracked `discovered`/`active` URLs whose analysis is missing or stale.
  pub async fn pending_analysis(&self) -> Result<Vec<String>> {
    let mut pending = Vec::new();
    for status in [UrlStatus::Discovered, UrlStatus::Active] {
      let query = UrlQuery { status: Some(status), ..Default::default() };
      let records = self.store.list_urls(&query).await.map_err(Error::store)?;
      for record in records {
        let cached = self
          .store
          .get_analysis(&record.url)
          .await
          .map_err(Error::store)?;
        if needs_analysis(&record, cached.as_ref(), self.options.analysis_version) {
          pending.push(record.url);
        }
      }
    }
    Ok(pending)
  }

  /// `discovered` followed by every other URL in [`pending_analysis`], without
  /// duplicates. This picks up earlier failures and a bumped analysis version
  /// even when a discovery cycle changed nothing.
  ///
  /// [`pending_analysis`]: Self::pending_analysis
  pub async fn analysis_queue(&self, discovered: &[String]) -> Result<Vec<String>> {
    let mut seen: HashSet<String> = discovered.iter().cloned().collect();
    let mut queue = discovered.to_vec();
    for url in self.pending_analysis().await? {
      if seen.insert(url.clone()) {
        queue.push(url);
      }
    }
    Ok(queue)
  }

  /// Fetch, analyze and cache every URL in `urls` that needs it.
  pub async fn run_analysis_cycle<P, A>(&self, pages: &P, analyzer: &A, urls: &[String]) -> CycleReport
  where
    P: PageFetcher,
    A: ContentAnalyzer,
  {
    info!(urls = urls.len(), version = analyzer.version(), "analysis cycle started");
    let mut report = CycleReport::default();

    let outcomes: Vec<(String, Result<Outcome>)> = stream::iter(urls.iter().map(|url| {
      async move { (url.clone(), self.analyze_one(pages, analyzer, url).await) }
    }))
    .buffer_unordered(self.options.concurrency.max(1))
    .collect()
    .await;

    self.tally(&mut report, "analysis", outcomes);
    info!(
      succeeded = report.succeeded,
      skipped = report.skipped,
      failed = report.failures.len(),
      "analysis cycle finished"
    );
    report
  }

  async fn analyze_one<P, A>(&self, pages: &P, analyzer: &A, url: &str) -> Result<Outcome>
  where
    P: PageFetcher,
    A: ContentAnalyzer,
  {
    // Held across the check and the write so concurrent cycles analyze once.
    let _guard = self.locks.lock(format!("analysis|{url}")).await;

    let needed = self
      .store
      .needs_analysis(url, analyzer.version())
      .await
      .map_err(Error::store)?;
    if !needed {
      debug!(url, "analysis is current");
      return Ok(Outcome::Skipped);
    }

    let content = self.retry.run(url, || pages.fetch_page(url)).await?;
    let analysis = self
      .retry
      .run(url, || analyzer.analyze(url, &content))
      .await?;

    self
      .store
      .store_analysis(NewAnalysis { url: url.to_owned(), analysis })
      .await
      .map_err(Error::store)?;
    Ok(Outcome::Done)
  }
}
