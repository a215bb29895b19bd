//! Engine cycles against an in-memory store and fake collaborators.

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use sightline_core::{
  analysis::{Analysis, PageMetadata},
  discovery::{SitemapEntry, SitemapStatus, UrlStatus},
  mention::SubstringMatcher,
  provider::{
    ContentAnalyzer, LlmProvider, PageFetcher, ProviderError, RankCheck, RankChecker,
    SitemapFetcher,
  },
  ranking::{KeywordFilter, Position, RankBucket, RankingQuery},
  schedule::Requeue,
  store::{AnalysisCache, KeywordRegistry, MentionStore, RankingStore, UrlTracker},
};
use sightline_store_sqlite::SqliteStore;

use crate::{Engine, EngineOptions, RetryPolicy};

// ─── Fakes ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeChecker {
  positions: HashMap<String, u32>,
  /// Remaining transient failures per keyword.
  flaky:     Mutex<HashMap<String, u32>>,
  rejected:  HashSet<String>,
  calls:     AtomicUsize,
}

impl FakeChecker {
  fn ranking(pairs: &[(&str, u32)]) -> Self {
    Self {
      positions: pairs.iter().map(|(k, p)| ((*k).to_owned(), *p)).collect(),
      ..Default::default()
    }
  }

  fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl RankChecker for FakeChecker {
  async fn check(
    &self,
    keyword: &str,
    domain: &str,
    _date: NaiveDate,
  ) -> Result<RankCheck, ProviderError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.rejected.contains(keyword) {
      return Err(ProviderError::Rejected("quota exhausted".into()));
    }
    {
      let mut flaky = self.flaky.lock().unwrap();
      if let Some(left) = flaky.get_mut(keyword)
        && *left > 0
      {
        *left -= 1;
        return Err(ProviderError::Unavailable("503".into()));
      }
    }
    Ok(match self.positions.get(keyword) {
      Some(p) => RankCheck {
        position: Position::Ranked(*p),
        url:      Some(format!("https://{domain}/{}/", keyword.replace(' ', "-"))),
      },
      None => RankCheck { position: Position::Unranked, url: None },
    })
  }
}

struct FakeModel {
  name:   String,
  answer: String,
  fail:   bool,
  calls:  AtomicUsize,
}

impl FakeModel {
  fn answering(name: &str, answer: &str) -> Self {
    Self { name: name.into(), answer: answer.into(), fail: false, calls: AtomicUsize::new(0) }
  }

  fn broken(name: &str) -> Self { Self { fail: true, ..Self::answering(name, "") } }
}

impl LlmProvider for FakeModel {
  fn model_name(&self) -> &str { &self.name }

  async fn ask(&self, keyword: &str) -> Result<String, ProviderError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.fail {
      return Err(ProviderError::Rejected("invalid model".into()));
    }
    Ok(format!("For {keyword}: {}", self.answer))
  }
}

#[derive(Default)]
struct FakeSitemaps {
  listings: Mutex<HashMap<String, Vec<SitemapEntry>>>,
  down:     Mutex<HashSet<String>>,
  calls:    AtomicUsize,
}

impl FakeSitemaps {
  fn list(&self, sitemap: &str, urls: &[&str]) {
    let entries = urls.iter().map(|u| SitemapEntry::new(*u)).collect();
    self.listings.lock().unwrap().insert(sitemap.to_owned(), entries);
  }

  fn set_down(&self, sitemap: &str, down: bool) {
    let mut set = self.down.lock().unwrap();
    if down {
      set.insert(sitemap.to_owned());
    } else {
      set.remove(sitemap);
    }
  }
}

impl SitemapFetcher for FakeSitemaps {
  async fn fetch(&self, sitemap_url: &str) -> Result<Vec<SitemapEntry>, ProviderError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.down.lock().unwrap().contains(sitemap_url) {
      return Err(ProviderError::Unavailable("connection reset".into()));
    }
    self
      .listings
      .lock()
      .unwrap()
      .get(sitemap_url)
      .cloned()
      .ok_or_else(|| ProviderError::Rejected("404".into()))
  }
}

#[derive(Default)]
struct FakePages {
  calls: AtomicUsize,
}

impl PageFetcher for FakePages {
  async fn fetch_page(&self, url: &str) -> Result<String, ProviderError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if url.contains("broken") {
      return Err(ProviderError::Rejected("403".into()));
    }
    Ok(format!("<p>All about {url}</p>"))
  }
}

struct FakeAnalyzer {
  version: u32,
  calls:   AtomicUsize,
}

impl FakeAnalyzer {
  fn v(version: u32) -> Self { Self { version, calls: AtomicUsize::new(0) } }

  fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl ContentAnalyzer for FakeAnalyzer {
  fn version(&self) -> u32 { self.version }

  async fn analyze(&self, url: &str, content: &str) -> Result<Analysis, ProviderError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    // Give concurrent callers a chance to interleave.
    tokio::time::sleep(Duration::from_millis(5)).await;
    Ok(Analysis {
      summary:              format!("About {url}"),
      category:             "Blog Post".into(),
      primary_keyword:      "data catalog".into(),
      estimated_word_count: content.split_whitespace().count() as u32,
      version:              self.version,
      page:                 PageMetadata {
        word_count: Some(content.split_whitespace().count() as u32),
        ..Default::default()
      },
    })
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn policy() -> RetryPolicy {
  RetryPolicy {
    attempts:   3,
    base_delay: Duration::from_millis(1),
    timeout:    Duration::from_secs(5),
  }
}

async fn engine_with(options: EngineOptions) -> Engine<SqliteStore> {
  let store = SqliteStore::open_in_memory(Arc::new(SubstringMatcher::new("Atlan")))
    .await
    .expect("in-memory store");
  Engine::new(Arc::new(store), policy(), options)
}

async fn engine() -> Engine<SqliteStore> { engine_with(EngineOptions::default()).await }

fn day(m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, m, d).unwrap() }

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap() }

fn strings(items: &[&str]) -> Vec<String> { items.iter().map(|s| (*s).to_owned()).collect() }

const SITEMAP: &str = "https://atlan.com/sitemap.xml";

/// Register [`SITEMAP`] listing `urls` and run one discovery cycle at [`t0`].
async fn discover(engine: &Engine<SqliteStore>, fetcher: &FakeSitemaps, urls: &[&str]) {
  fetcher.list(SITEMAP, urls);
  engine.store().register_sitemap(SITEMAP).await.unwrap();
  engine.run_discovery_cycle(fetcher, t0()).await;
}

// ─── Rankings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ranking_cycles_build_a_history() {
  let engine = engine().await;
  let keywords = strings(&["data catalog", "Data Catalog "]);
  let domains = strings(&["atlan.com", "www.Atlan.com"]);

  let first = engine
    .run_ranking_cycle(&FakeChecker::ranking(&[("data catalog", 45)]), &keywords, &domains, day(1, 1))
    .await;
  assert_eq!(first.attempted, 1);
  assert_eq!(first.succeeded, 1);

  engine
    .run_ranking_cycle(&FakeChecker::ranking(&[("data catalog", 8)]), &keywords, &domains, day(2, 1))
    .await;

  let store = engine.store();
  let keyword = store.resolve_keyword("data catalog").await.unwrap().unwrap();
  let latest = store
    .latest_ranking(keyword.keyword_id, "atlan.com")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(latest.position, Position::Ranked(8));
  assert_eq!(latest.observed_url.as_deref(), Some("https://atlan.com/data-catalog/"));

  let report = store
    .query_rankings(&RankingQuery {
      keyword: Some(KeywordFilter::Exact("data catalog".into())),
      domain: Some("atlan.com".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(report.len(), 1);
  assert_eq!(report[0].bucket, RankBucket::Top10);
}

#[tokio::test]
async fn unranked_domains_are_recorded() {
  let engine = engine().await;
  let report = engine
    .run_ranking_cycle(
      &FakeChecker::default(),
      &strings(&["data mesh"]),
      &strings(&["atlan.com"]),
      day(3, 1),
    )
    .await;
  assert!(report.is_clean());

  let keyword = engine.store().resolve_keyword("data mesh").await.unwrap().unwrap();
  let latest = engine
    .store()
    .latest_ranking(keyword.keyword_id, "atlan.com")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(latest.position, Position::Unranked);
}

#[tokio::test]
async fn transient_rank_failures_are_retried() {
  let engine = engine().await;
  let checker = FakeChecker::ranking(&[("data catalog", 3)]);
  checker.flaky.lock().unwrap().insert("data catalog".into(), 2);

  let report = engine
    .run_ranking_cycle(&checker, &strings(&["data catalog"]), &strings(&["atlan.com"]), day(1, 1))
    .await;
  assert_eq!(report.succeeded, 1);
  assert_eq!(checker.calls(), 3);
}

#[tokio::test]
async fn one_failing_keyword_does_not_stop_the_cycle() {
  let engine = engine().await;
  let mut checker = FakeChecker::ranking(&[("data catalog", 5), ("data lineage", 9)]);
  checker.rejected.insert("data lineage".into());

  let report = engine
    .run_ranking_cycle(
      &checker,
      &strings(&["data catalog", "data lineage", "   "]),
      &strings(&["atlan.com"]),
      day(1, 1),
    )
    .await;

  assert_eq!(report.attempted, 3);
  assert_eq!(report.succeeded, 1);
  let failed: HashSet<&str> = report.failures.iter().map(|f| f.key.as_str()).collect();
  assert_eq!(failed, HashSet::from(["   ", "data lineage|atlan.com|2024-01-01"]));
  // Rejections are not retried.
  assert_eq!(checker.calls(), 2);

  let catalog = engine.store().resolve_keyword("data catalog").await.unwrap().unwrap();
  assert!(
    engine
      .store()
      .latest_ranking(catalog.keyword_id, "atlan.com")
      .await
      .unwrap()
      .is_some()
  );
}

#[tokio::test]
async fn resume_skips_recorded_rankings() {
  let engine = engine_with(EngineOptions { resume: true, ..Default::default() }).await;
  let checker = FakeChecker::ranking(&[("data catalog", 4)]);
  let keywords = strings(&["data catalog"]);
  let domains = strings(&["atlan.com", "alation.com"]);

  engine.run_ranking_cycle(&checker, &keywords, &domains, day(1, 1)).await;
  assert_eq!(checker.calls(), 2);

  let again = engine.run_ranking_cycle(&checker, &keywords, &domains, day(1, 1)).await;
  assert_eq!(again.attempted, 2);
  assert_eq!(again.skipped, 2);
  assert_eq!(checker.calls(), 2);

  engine.run_ranking_cycle(&checker, &keywords, &domains, day(1, 2)).await;
  assert_eq!(checker.calls(), 4);
}

#[tokio::test]
async fn without_resume_a_rerun_overwrites() {
  let engine = engine().await;
  let keywords = strings(&["data catalog"]);
  let domains = strings(&["atlan.com"]);

  engine
    .run_ranking_cycle(&FakeChecker::ranking(&[("data catalog", 12)]), &keywords, &domains, day(1, 1))
    .await;
  let report = engine
    .run_ranking_cycle(&FakeChecker::ranking(&[("data catalog", 7)]), &keywords, &domains, day(1, 1))
    .await;
  assert_eq!(report.succeeded, 1);

  let keyword = engine.store().resolve_keyword("data catalog").await.unwrap().unwrap();
  let history = engine
    .store()
    .ranking_history(keyword.keyword_id, "atlan.com", day(1, 1), day(1, 1))
    .await
    .unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].position, Position::Ranked(7));
}

// ─── Mentions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn mention_cycle_derives_flags() {
  let engine = engine().await;
  let models = [
    FakeModel::answering("gpt_4o_mini", "Atlan and Alation are popular."),
    FakeModel::answering("claude_3_haiku", "Collibra is a common choice."),
  ];

  let report = engine
    .run_mention_cycle(&models, &strings(&["Data Catalog"]), day(4, 1))
    .await;
  assert_eq!(report.succeeded, 2);

  let store = engine.store();
  let gpt = store
    .mention_rate("data catalog", "gpt_4o_mini", day(4, 1), day(4, 1))
    .await
    .unwrap();
  assert_eq!(gpt.fraction, 1.0);
  let claude = store
    .mention_rate("data catalog", "claude_3_haiku", day(4, 1), day(4, 1))
    .await
    .unwrap();
  assert_eq!(claude.fraction, 0.0);
  assert!(store.audit_mentions().await.unwrap().is_empty());
}

#[tokio::test]
async fn mention_keywords_are_registered() {
  let engine = engine().await;
  let models = [FakeModel::answering("gpt_4o_mini", "Atlan.")];

  engine
    .run_mention_cycle(&models, &strings(&["  Data Governance ", "data governance"]), day(4, 1))
    .await;

  let keywords = engine.store().list_keywords().await.unwrap();
  let texts: Vec<&str> = keywords.iter().map(|k| k.text.as_str()).collect();
  assert_eq!(texts, vec!["data governance"]);
  assert_eq!(models[0].calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failing_model_is_isolated() {
  let engine = engine().await;
  let models = [FakeModel::answering("gpt_4o_mini", "Atlan."), FakeModel::broken("retired")];

  let report = engine
    .run_mention_cycle(&models, &strings(&["data catalog", ""]), day(4, 1))
    .await;

  assert_eq!(report.attempted, 3);
  assert_eq!(report.succeeded, 1);
  let failed: HashSet<&str> = report.failures.iter().map(|f| f.key.as_str()).collect();
  assert_eq!(failed, HashSet::from(["", "data catalog|2024-04-01|retired"]));
  assert_eq!(engine.store().list_models().await.unwrap(), vec!["gpt_4o_mini".to_owned()]);
}

#[tokio::test]
async fn resume_skips_recorded_mentions() {
  let engine = engine_with(EngineOptions { resume: true, ..Default::default() }).await;
  let models = [FakeModel::answering("gpt_4o_mini", "Atlan.")];
  let keywords = strings(&["data catalog"]);

  engine.run_mention_cycle(&models, &keywords, day(4, 1)).await;
  let again = engine.run_mention_cycle(&models, &keywords, day(4, 1)).await;

  assert_eq!(again.skipped, 1);
  assert_eq!(models[0].calls.load(Ordering::SeqCst), 1);
}

// ─── Discovery and analysis ──────────────────────────────────────────────────

#[tokio::test]
async fn discovery_feeds_the_analysis_queue() {
  let engine = engine().await;
  let fetcher = FakeSitemaps::default();
  fetcher.list(SITEMAP, &["https://atlan.com/a", "https://atlan.com/b"]);
  engine.store().register_sitemap(SITEMAP).await.unwrap();

  let report = engine.run_discovery_cycle(&fetcher, t0()).await;
  assert_eq!(report.sitemaps.succeeded, 1);
  assert_eq!(report.summaries[0].discovered, 2);
  let mut queue = report.analysis_queue.clone();
  queue.sort();
  assert_eq!(queue, strings(&["https://atlan.com/a", "https://atlan.com/b"]));

  let sitemap = engine.store().get_sitemap(SITEMAP).await.unwrap().unwrap();
  assert_eq!(sitemap.status, SitemapStatus::Completed);
  assert_eq!(sitemap.last_processed, Some(t0()));

  let pages = FakePages::default();
  let analyzer = FakeAnalyzer::v(1);
  let analyzed = engine.run_analysis_cycle(&pages, &analyzer, &queue).await;
  assert_eq!(analyzed.succeeded, 2);

  let cached = engine
    .store()
    .get_analysis("https://atlan.com/a")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(cached.analysis_version, 1);
  assert_eq!(cached.summary, "About https://atlan.com/a");

  // Cached analyses are reused.
  let again = engine.run_analysis_cycle(&pages, &analyzer, &queue).await;
  assert_eq!(again.skipped, 2);
  assert_eq!(analyzer.calls(), 2);
  assert!(engine.pending_analysis().await.unwrap().is_empty());
}

#[tokio::test]
async fn analysis_writes_page_metadata_to_the_url() {
  let engine = engine().await;
  discover(&engine, &FakeSitemaps::default(), &["https://atlan.com/a"]).await;

  let urls = strings(&["https://atlan.com/a"]);
  let report = engine
    .run_analysis_cycle(&FakePages::default(), &FakeAnalyzer::v(1), &urls)
    .await;
  assert_eq!(report.succeeded, 1);

  let url = engine.store().get_url("https://atlan.com/a").await.unwrap().unwrap();
  // "<p>All about https://atlan.com/a</p>"
  assert_eq!(url.word_count, Some(3));
  assert!(url.last_processed.is_some());
}

#[tokio::test]
async fn failed_analyses_are_retried_without_new_discoveries() {
  let engine = engine().await;
  let fetcher = FakeSitemaps::default();
  fetcher.list(SITEMAP, &["https://atlan.com/a", "https://atlan.com/broken"]);
  engine.store().register_sitemap(SITEMAP).await.unwrap();

  let first = engine.run_discovery_cycle(&fetcher, t0()).await;
  let queue = engine.analysis_queue(&first.analysis_queue).await.unwrap();
  assert_eq!(queue.len(), 2);
  let analyzed = engine
    .run_analysis_cycle(&FakePages::default(), &FakeAnalyzer::v(1), &queue)
    .await;
  assert_eq!(analyzed.failures.len(), 1);

  // The listing is unchanged, so discovery queues nothing.
  let next = engine
    .run_discovery_cycle(&fetcher, t0() + TimeDelta::hours(25))
    .await;
  assert!(next.analysis_queue.is_empty());
  assert_eq!(
    engine.analysis_queue(&next.analysis_queue).await.unwrap(),
    strings(&["https://atlan.com/broken"])
  );
}

#[tokio::test]
async fn analysis_queue_includes_stale_versions_once() {
  let engine = engine().await;
  discover(&engine, &FakeSitemaps::default(), &["https://atlan.com/a", "https://atlan.com/b"])
    .await;
  let urls = strings(&["https://atlan.com/a", "https://atlan.com/b"]);
  engine
    .run_analysis_cycle(&FakePages::default(), &FakeAnalyzer::v(1), &urls)
    .await;
  assert!(engine.analysis_queue(&[]).await.unwrap().is_empty());

  let bumped = Engine::new(
    engine.store().clone(),
    policy(),
    EngineOptions { analysis_version: 2, ..Default::default() },
  );
  let mut queue = bumped
    .analysis_queue(&strings(&["https://atlan.com/b"]))
    .await
    .unwrap();
  assert_eq!(queue[0], "https://atlan.com/b");
  queue.sort();
  assert_eq!(queue, urls);
}

#[tokio::test]
async fn recently_processed_sitemaps_are_not_due() {
  let engine = engine().await;
  let fetcher = FakeSitemaps::default();
  discover(&engine, &fetcher, &["https://atlan.com/a"]).await;

  let soon = engine
    .run_discovery_cycle(&fetcher, t0() + TimeDelta::hours(1))
    .await;

  assert_eq!(soon.sitemaps.attempted, 0);
  assert!(soon.summaries.is_empty());
  assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_fetch_leaves_urls_untouched_and_backs_off() {
  let engine = engine().await;
  let fetcher = FakeSitemaps::default();
  discover(&engine, &fetcher, &["https://atlan.com/a"]).await;

  fetcher.set_down(SITEMAP, true);
  let later = t0() + TimeDelta::hours(25);
  let report = engine.run_discovery_cycle(&fetcher, later).await;
  assert_eq!(report.sitemaps.failures.len(), 1);
  assert!(report.analysis_queue.is_empty());

  let sitemap = engine.store().get_sitemap(SITEMAP).await.unwrap().unwrap();
  assert_eq!(sitemap.status, SitemapStatus::Failed);
  assert_eq!(sitemap.consecutive_failures, 1);
  assert_eq!(sitemap.last_processed, Some(t0()));

  let url = engine.store().get_url("https://atlan.com/a").await.unwrap().unwrap();
  assert_eq!(url.status, UrlStatus::Discovered);
  assert_eq!(url.missed_runs, 0);
  assert_eq!(url.last_checked, t0());

  // Still inside the 15 minute backoff.
  fetcher.set_down(SITEMAP, false);
  let early = engine
    .run_discovery_cycle(&fetcher, later + TimeDelta::minutes(10))
    .await;
  assert!(early.requeued.is_empty());
  assert_eq!(early.sitemaps.attempted, 0);

  let retry = engine
    .run_discovery_cycle(&fetcher, later + TimeDelta::minutes(16))
    .await;
  assert_eq!(retry.requeued, vec![(SITEMAP.to_owned(), Requeue::RetryAfterFailure)]);
  assert_eq!(retry.sitemaps.succeeded, 1);

  let sitemap = engine.store().get_sitemap(SITEMAP).await.unwrap().unwrap();
  assert_eq!(sitemap.status, SitemapStatus::Completed);
  assert_eq!(sitemap.consecutive_failures, 0);
}

#[tokio::test]
async fn analysis_version_bump_reanalyzes() {
  let engine = engine().await;
  discover(&engine, &FakeSitemaps::default(), &["https://atlan.com/a"]).await;

  let urls = strings(&["https://atlan.com/a"]);
  let pages = FakePages::default();
  engine.run_analysis_cycle(&pages, &FakeAnalyzer::v(1), &urls).await;

  let v2 = FakeAnalyzer::v(2);
  let report = engine.run_analysis_cycle(&pages, &v2, &urls).await;
  assert_eq!(report.succeeded, 1);
  assert_eq!(v2.calls(), 1);
  let cached = engine
    .store()
    .get_analysis("https://atlan.com/a")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(cached.analysis_version, 2);
}

#[tokio::test]
async fn concurrent_analysis_of_one_url_runs_once() {
  let engine = engine().await;
  discover(&engine, &FakeSitemaps::default(), &["https://atlan.com/a"]).await;

  let urls = strings(&["https://atlan.com/a"]);
  let pages = FakePages::default();
  let analyzer = FakeAnalyzer::v(1);
  let (left, right) = tokio::join!(
    engine.run_analysis_cycle(&pages, &analyzer, &urls),
    engine.run_analysis_cycle(&pages, &analyzer, &urls),
  );

  assert_eq!(analyzer.calls(), 1);
  assert_eq!(left.succeeded + right.succeeded, 1);
  assert_eq!(left.skipped + right.skipped, 1);
}

#[tokio::test]
async fn analysis_failures_and_untracked_urls() {
  let engine = engine().await;
  discover(&engine, &FakeSitemaps::default(), &["https://atlan.com/a", "https://atlan.com/broken"])
    .await;

  let urls = strings(&[
    "https://atlan.com/a",
    "https://atlan.com/broken",
    "https://atlan.com/never-listed",
  ]);
  let pages = FakePages::default();
  let report = engine
    .run_analysis_cycle(&pages, &FakeAnalyzer::v(1), &urls)
    .await;

  assert_eq!(report.attempted, 3);
  assert_eq!(report.succeeded, 1);
  // Untracked URLs never need analysis.
  assert_eq!(report.skipped, 1);
  assert_eq!(report.failures.len(), 1);
  assert_eq!(report.failures[0].key, "https://atlan.com/broken");

  assert_eq!(engine.pending_analysis().await.unwrap(), strings(&["https://atlan.com/broken"]));
}
