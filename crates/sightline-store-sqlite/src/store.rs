//! [`SqliteStore`], the SQLite implementation of the Sightline store traits.

use std::{collections::HashSet, path::Path, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use tracing::warn;

use sightline_core::{
  analysis::{NewAnalysis, UrlAnalysis},
  discovery::{
    ReconcileSummary, SitemapEntry, SitemapRecord, UrlQuery, UrlRecord, UrlStats, UrlStatus,
    reconcile,
  },
  keyword::{Keyword, KeywordId, normalize_keyword},
  mention::{BrandMatcher, MentionObservation, MentionQuery, NewMention},
  ranking::{
    KeywordFilter, NewRanking, RankedResult, RankingObservation, RankingQuery, finish_report,
    normalize_domain,
  },
  schedule::{Requeue, SitemapSchedule},
  store::{AnalysisCache, KeywordRegistry, MentionStore, RankingStore, Store, UrlTracker},
};

use crate::{
  Error, Result,
  encode::{
    ANALYSIS_COLUMNS, KEYWORD_COLUMNS, MENTION_COLUMNS, RANKING_COLUMNS, RawAnalysis, RawKeyword,
    RawMention, RawRankedRow, RawRanking, RawSitemap, RawUrl, SITEMAP_COLUMNS, URL_COLUMNS,
    UrlParams, decode_id, encode_date, encode_dt, encode_id, encode_position, in_call,
  },
  schema::SCHEMA,
};

/// Upsert for one `urls` row; parameters in [`URL_COLUMNS`] order.
const UPSERT_URL: &str = "
  INSERT INTO urls (url, sitemap_url, word_count, date_published, date_modified,
                    last_checked, discovery_date, domain_name, status,
                    last_processed, missed_runs)
  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
  ON CONFLICT(url) DO UPDATE SET
    sitemap_url    = excluded.sitemap_url,
    word_count     = excluded.word_count,
    date_published = excluded.date_published,
    date_modified  = excluded.date_modified,
    last_checked   = excluded.last_checked,
    status         = excluded.status,
    last_processed = excluded.last_processed,
    missed_runs    = excluded.missed_runs";

/// Shared `WHERE` clause of the ranking report: exact keyword, keyword
/// substring, domain.
const RANKING_FILTER: &str = "(?1 IS NULL OR k.text = ?1)
   AND (?2 IS NULL OR instr(k.text, ?2) > 0)
   AND (?3 IS NULL OR r.domain = ?3)";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A visibility store backed by a single SQLite file.
///
/// Cloning is cheap; the connection and brand matcher are reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  matcher: Arc<dyn BrandMatcher>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  ///
  /// `matcher` derives every stored `mentioned` flag.
  pub async fn open(path: impl AsRef<Path>, matcher: Arc<dyn BrandMatcher>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, matcher };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory(matcher: Arc<dyn BrandMatcher>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, matcher };
    store.init_schema().await?;
    Ok(store)
  }

  /// A handle on the same database that derives mention flags with
  /// `matcher`, e.g. to re-derive stored flags after the brand changed.
  pub fn with_brand_matcher(&self, matcher: Arc<dyn BrandMatcher>) -> Self {
    Self { conn: self.conn.clone(), matcher }
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn write_mention(&self, obs: &MentionObservation) -> Result<()> {
    let keyword  = obs.keyword.clone();
    let date     = encode_date(obs.check_date);
    let model    = obs.model_name.clone();
    let answer   = obs.answer_text.clone();
    let flag     = obs.mentioned;
    let recorded = encode_dt(obs.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO mentions (keyword, check_date, model_name, answer_text, mentioned, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT(keyword, check_date, model_name) DO UPDATE SET
             answer_text = excluded.answer_text,
             mentioned   = excluded.mentioned,
             recorded_at = excluded.recorded_at",
          rusqlite::params![keyword, date, model, answer, flag, recorded],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn sitemap_row(&self, sitemap_url: &str) -> Result<Option<SitemapRecord>> {
    let url = sitemap_url.to_owned();

    let raw: Option<RawSitemap> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SITEMAP_COLUMNS} FROM sitemaps WHERE sitemap_url = ?1"),
              rusqlite::params![url],
              RawSitemap::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSitemap::into_record).transpose()
  }

  /// Fetch a sitemap row that the preceding write guarantees exists.
  async fn expect_sitemap(&self, sitemap_url: &str) -> Result<SitemapRecord> {
    self
      .sitemap_row(sitemap_url)
      .await?
      .ok_or_else(|| Error::Decode(format!("sitemap row vanished: {sitemap_url}")))
  }
}

impl Store for SqliteStore {
  type Error = Error;
}

// ─── Keywords ────────────────────────────────────────────────────────────────

impl KeywordRegistry for SqliteStore {
  async fn register_keyword(&self, text: &str) -> Result<Keyword> {
    let text   = normalize_keyword(text)?;
    let id_str = encode_id(KeywordId::new());
    let at_str = encode_dt(Utc::now());

    let raw: RawKeyword = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO keywords (keyword_id, text, created_at) VALUES (?1, ?2, ?3)
           ON CONFLICT(text) DO NOTHING",
          rusqlite::params![id_str, text, at_str],
        )?;
        Ok(conn.query_row(
          &format!("SELECT {KEYWORD_COLUMNS} FROM keywords WHERE text = ?1"),
          rusqlite::params![text],
          RawKeyword::from_row,
        )?)
      })
      .await?;

    raw.into_keyword()
  }

  async fn resolve_keyword(&self, text: &str) -> Result<Option<Keyword>> {
    let text = normalize_keyword(text)?;

    let raw: Option<RawKeyword> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {KEYWORD_COLUMNS} FROM keywords WHERE text = ?1"),
              rusqlite::params![text],
              RawKeyword::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawKeyword::into_keyword).transpose()
  }

  async fn get_keyword(&self, id: KeywordId) -> Result<Option<Keyword>> {
    let id_str = encode_id(id);

    let raw: Option<RawKeyword> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {KEYWORD_COLUMNS} FROM keywords WHERE keyword_id = ?1"),
              rusqlite::params![id_str],
              RawKeyword::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawKeyword::into_keyword).transpose()
  }

  async fn list_keywords(&self) -> Result<Vec<Keyword>> {
    let raws: Vec<RawKeyword> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {KEYWORD_COLUMNS} FROM keywords ORDER BY text"))?;
        let rows = stmt
          .query_map([], RawKeyword::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawKeyword::into_keyword).collect()
  }
}

// ─── Rankings ────────────────────────────────────────────────────────────────

impl RankingStore for SqliteStore {
  async fn upsert_ranking(&self, input: NewRanking) -> Result<RankingObservation> {
    let obs = RankingObservation {
      keyword_id:   input.keyword_id,
      domain:       normalize_domain(&input.domain),
      check_date:   input.check_date,
      position:     input.position,
      observed_url: input.observed_url,
      recorded_at:  Utc::now(),
    };

    let id_str   = encode_id(obs.keyword_id);
    let domain   = obs.domain.clone();
    let date     = encode_date(obs.check_date);
    let position = encode_position(obs.position);
    let url      = obs.observed_url.clone();
    let recorded = encode_dt(obs.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO rankings (keyword_id, domain, check_date, position, observed_url, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT(keyword_id, domain, check_date) DO UPDATE SET
             position     = excluded.position,
             observed_url = excluded.observed_url,
             recorded_at  = excluded.recorded_at",
          rusqlite::params![id_str, domain, date, position, url, recorded],
        )?;
        Ok(())
      })
      .await?;

    Ok(obs)
  }

  async fn latest_ranking(
    &self,
    keyword_id: KeywordId,
    domain: &str,
  ) -> Result<Option<RankingObservation>> {
    let id_str = encode_id(keyword_id);
    let domain = normalize_domain(domain);

    let raw: Option<RawRanking> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {RANKING_COLUMNS} FROM rankings r
                 WHERE r.keyword_id = ?1 AND r.domain = ?2
                 ORDER BY r.check_date DESC LIMIT 1"
              ),
              rusqlite::params![id_str, domain],
              RawRanking::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRanking::into_observation).transpose()
  }

  async fn ranking_history(
    &self,
    keyword_id: KeywordId,
    domain: &str,
    from: NaiveDate,
    to: NaiveDate,
  ) -> Result<Vec<RankingObservation>> {
    let id_str = encode_id(keyword_id);
    let domain = normalize_domain(domain);
    let from   = encode_date(from);
    let to     = encode_date(to);

    let raws: Vec<RawRanking> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RANKING_COLUMNS} FROM rankings r
           WHERE r.keyword_id = ?1 AND r.domain = ?2
             AND r.check_date >= ?3 AND r.check_date <= ?4
           ORDER BY r.check_date"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str, domain, from, to], RawRanking::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRanking::into_observation).collect()
  }

  async fn ranking_keys_on(&self, date: NaiveDate) -> Result<HashSet<(KeywordId, String)>> {
    let date = encode_date(date);

    let pairs: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT keyword_id, domain FROM rankings WHERE check_date = ?1")?;
        let rows = stmt
          .query_map(rusqlite::params![date], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    pairs
      .into_iter()
      .map(|(id, domain)| Ok((decode_id(&id)?, domain)))
      .collect()
  }

  async fn orphaned_rankings(&self) -> Result<Vec<RankingObservation>> {
    let raws: Vec<RawRanking> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RANKING_COLUMNS} FROM rankings r
           LEFT JOIN keywords k ON k.keyword_id = r.keyword_id
           WHERE k.keyword_id IS NULL
           ORDER BY r.check_date, r.domain"
        ))?;
        let rows = stmt
          .query_map([], RawRanking::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRanking::into_observation).collect()
  }

  async fn query_rankings(&self, query: &RankingQuery) -> Result<Vec<RankedResult>> {
    let (exact, substring) = match &query.keyword {
      Some(KeywordFilter::Exact(text)) => (Some(normalize_keyword(text)?), None),
      Some(KeywordFilter::Substring(text)) => (None, Some(text.trim().to_lowercase())),
      None => (None, None),
    };
    let domain = query.domain.as_deref().map(normalize_domain);
    let date   = query.date.map(encode_date);

    let raws: Vec<RawRankedRow> = self
      .conn
      .call(move |conn| {
        let date = match date {
          Some(d) => Some(d),
          None => conn.query_row(
            &format!(
              "SELECT MAX(r.check_date) FROM rankings r
               JOIN keywords k ON k.keyword_id = r.keyword_id
               WHERE {RANKING_FILTER}"
            ),
            rusqlite::params![exact, substring, domain],
            |row| row.get::<_, Option<String>>(0),
          )?,
        };
        let Some(date) = date else {
          return Ok(Vec::new());
        };

        let mut stmt = conn.prepare(&format!(
          "SELECT {RANKING_COLUMNS}, k.text FROM rankings r
           JOIN keywords k ON k.keyword_id = r.keyword_id
           WHERE {RANKING_FILTER} AND r.check_date = ?4"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![exact, substring, domain, date], RawRankedRow::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let rows = raws
      .into_iter()
      .map(RawRankedRow::into_result)
      .collect::<Result<Vec<_>>>()?;
    Ok(finish_report(rows, query))
  }
}

// ─── Mentions ────────────────────────────────────────────────────────────────

impl MentionStore for SqliteStore {
  fn brand_matcher(&self) -> &dyn BrandMatcher { self.matcher.as_ref() }

  async fn record_mention(&self, input: NewMention) -> Result<MentionObservation> {
    let input = NewMention {
      keyword: normalize_keyword(&input.keyword)?,
      model_name: input.model_name.trim().to_owned(),
      ..input
    };
    let obs = MentionObservation::derive(input, self.brand_matcher(), Utc::now());
    self.write_mention(&obs).await?;
    Ok(obs)
  }

  async fn import_mention(&self, observation: MentionObservation) -> Result<MentionObservation> {
    let obs = MentionObservation {
      keyword: normalize_keyword(&observation.keyword)?,
      model_name: observation.model_name.trim().to_owned(),
      ..observation
    };
    if let Err(e) = obs.verify(self.brand_matcher()) {
      warn!(keyword = %obs.keyword, model = %obs.model_name, date = %obs.check_date, "rejected mention import: {e}");
      return Err(e.into());
    }
    self.write_mention(&obs).await?;
    Ok(obs)
  }

  async fn list_mentions(&self, query: &MentionQuery) -> Result<Vec<MentionObservation>> {
    let keyword = query.keyword.as_deref().map(normalize_keyword).transpose()?;
    let model   = query.model_name.as_deref().map(|m| m.trim().to_owned());
    let from    = query.from.map(encode_date);
    let to      = query.to.map(encode_date);

    let raws: Vec<RawMention> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MENTION_COLUMNS} FROM mentions
           WHERE (?1 IS NULL OR keyword = ?1)
             AND (?2 IS NULL OR model_name = ?2)
             AND (?3 IS NULL OR check_date >= ?3)
             AND (?4 IS NULL OR check_date <= ?4)
           ORDER BY check_date, keyword, model_name"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![keyword, model, from, to], RawMention::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMention::into_observation).collect()
  }

  async fn mention_keys_on(&self, date: NaiveDate) -> Result<HashSet<(String, String)>> {
    let date = encode_date(date);

    let pairs: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT keyword, model_name FROM mentions WHERE check_date = ?1")?;
        let rows = stmt
          .query_map(rusqlite::params![date], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(pairs.into_iter().collect())
  }

  async fn list_models(&self) -> Result<Vec<String>> {
    let models: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT DISTINCT model_name FROM mentions ORDER BY model_name")?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(models)
  }
}

// ─── URL discovery ───────────────────────────────────────────────────────────

impl UrlTracker for SqliteStore {
  async fn register_sitemap(&self, sitemap_url: &str) -> Result<SitemapRecord> {
    let url    = sitemap_url.trim().to_owned();
    let at_str = encode_dt(Utc::now());

    let raw: RawSitemap = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sitemaps (sitemap_url, status, registered_at) VALUES (?1, 'pending', ?2)
           ON CONFLICT(sitemap_url) DO NOTHING",
          rusqlite::params![url, at_str],
        )?;
        Ok(conn.query_row(
          &format!("SELECT {SITEMAP_COLUMNS} FROM sitemaps WHERE sitemap_url = ?1"),
          rusqlite::params![url],
          RawSitemap::from_row,
        )?)
      })
      .await?;

    raw.into_record()
  }

  async fn get_sitemap(&self, sitemap_url: &str) -> Result<Option<SitemapRecord>> {
    self.sitemap_row(sitemap_url.trim()).await
  }

  async fn list_sitemaps(&self) -> Result<Vec<SitemapRecord>> {
    let raws: Vec<RawSitemap> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {SITEMAP_COLUMNS} FROM sitemaps ORDER BY sitemap_url"))?;
        let rows = stmt
          .query_map([], RawSitemap::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSitemap::into_record).collect()
  }

  async fn begin_sitemap_run(&self, sitemap_url: &str, now: DateTime<Utc>) -> Result<SitemapRecord> {
    let url     = sitemap_url.trim().to_owned();
    let now_str = encode_dt(now);

    self
      .conn
      .call({
        let url = url.clone();
        move |conn| {
          conn.execute(
            "INSERT INTO sitemaps (sitemap_url, status, registered_at) VALUES (?1, 'pending', ?2)
             ON CONFLICT(sitemap_url) DO NOTHING",
            rusqlite::params![url, now_str],
          )?;
          conn.execute(
            "UPDATE sitemaps SET status = 'processing', last_attempted = ?2 WHERE sitemap_url = ?1",
            rusqlite::params![url, now_str],
          )?;
          Ok(())
        }
      })
      .await?;

    self.expect_sitemap(&url).await
  }

  async fn complete_sitemap_run(
    &self,
    sitemap_url: &str,
    listing: Vec<SitemapEntry>,
    now: DateTime<Utc>,
    removal_grace_runs: u32,
  ) -> Result<ReconcileSummary> {
    let url     = sitemap_url.trim().to_owned();
    let now_str = encode_dt(now);
    let listed  = listing.len();

    let (summary, normalized) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO sitemaps (sitemap_url, status, registered_at) VALUES (?1, 'pending', ?2)
           ON CONFLICT(sitemap_url) DO NOTHING",
          rusqlite::params![url, now_str],
        )?;

        // Everything attributed to this sitemap, plus listed URLs that
        // currently belong to another one.
        let existing = {
          let mut own = tx.prepare(&format!("SELECT {URL_COLUMNS} FROM urls WHERE sitemap_url = ?1"))?;
          let mut raws = own
            .query_map(rusqlite::params![url], RawUrl::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

          let mut foreign = tx.prepare(&format!(
            "SELECT {URL_COLUMNS} FROM urls WHERE url = ?1 AND sitemap_url != ?2"
          ))?;
          let mut seen = HashSet::new();
          for entry in &listing {
            if !seen.insert(entry.url.as_str()) {
              continue;
            }
            if let Some(raw) = foreign
              .query_row(rusqlite::params![entry.url, url], RawUrl::from_row)
              .optional()?
            {
              raws.push(raw);
            }
          }

          raws
            .into_iter()
            .map(|raw| raw.into_record().map_err(in_call))
            .collect::<rusqlite::Result<Vec<UrlRecord>>>()?
        };

        let plan = reconcile(&url, &existing, &listing, now, removal_grace_runs);

        {
          let mut upsert = tx.prepare(UPSERT_URL)?;
          for (_, record) in &plan.writes {
            let p = UrlParams::from(record);
            upsert.execute(rusqlite::params![
              p.url,
              p.sitemap_url,
              p.word_count,
              p.date_published,
              p.date_modified,
              p.last_checked,
              p.discovery_date,
              p.domain_name,
              p.status,
              p.last_processed,
              p.missed_runs,
            ])?;
          }
        }

        tx.execute(
          "UPDATE sitemaps
           SET status = 'completed', last_processed = ?2,
               consecutive_failures = 0, last_error = NULL
           WHERE sitemap_url = ?1",
          rusqlite::params![url, now_str],
        )?;
        tx.commit()?;

        Ok((plan.summarize(&url, listed), plan.normalized))
      })
      .await?;

    for entry in &normalized {
      warn!(url = %entry, "listing date_modified precedes date_published; raised to match");
    }

    Ok(summary)
  }

  async fn fail_sitemap_run(
    &self,
    sitemap_url: &str,
    error: &str,
    now: DateTime<Utc>,
  ) -> Result<SitemapRecord> {
    let url     = sitemap_url.trim().to_owned();
    let error   = error.to_owned();
    let now_str = encode_dt(now);

    self
      .conn
      .call({
        let url = url.clone();
        move |conn| {
          conn.execute(
            "INSERT INTO sitemaps (sitemap_url, status, registered_at) VALUES (?1, 'pending', ?2)
             ON CONFLICT(sitemap_url) DO NOTHING",
            rusqlite::params![url, now_str],
          )?;
          conn.execute(
            "UPDATE sitemaps
             SET status = 'failed',
                 consecutive_failures = consecutive_failures + 1,
                 last_error = ?2,
                 last_attempted = COALESCE(last_attempted, ?3)
             WHERE sitemap_url = ?1",
            rusqlite::params![url, error, now_str],
          )?;
          Ok(())
        }
      })
      .await?;

    self.expect_sitemap(&url).await
  }

  async fn requeue_sitemaps(
    &self,
    schedule: &SitemapSchedule,
    now: DateTime<Utc>,
  ) -> Result<Vec<(String, Requeue)>> {
    let decisions: Vec<(String, &'static str, Requeue)> = self
      .list_sitemaps()
      .await?
      .into_iter()
      .filter_map(|r| {
        let decision = schedule.requeue(&r, now)?;
        Some((r.sitemap_url, r.status.as_str(), decision))
      })
      .collect();

    if decisions.is_empty() {
      return Ok(Vec::new());
    }

    let guarded: Vec<(String, &'static str)> =
      decisions.iter().map(|(url, status, _)| (url.clone(), *status)).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          // The status guard skips rows that moved on since they were read.
          let mut stmt = tx.prepare(
            "UPDATE sitemaps SET status = 'pending' WHERE sitemap_url = ?1 AND status = ?2",
          )?;
          for (url, status) in &guarded {
            stmt.execute(rusqlite::params![url, status])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(decisions.into_iter().map(|(url, _, decision)| (url, decision)).collect())
  }

  async fn get_url(&self, url: &str) -> Result<Option<UrlRecord>> {
    let url = url.trim().to_owned();

    let raw: Option<RawUrl> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {URL_COLUMNS} FROM urls WHERE url = ?1"),
              rusqlite::params![url],
              RawUrl::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUrl::into_record).transpose()
  }

  async fn list_urls(&self, query: &UrlQuery) -> Result<Vec<UrlRecord>> {
    let sitemap = query.sitemap_url.clone();
    let domain  = query.domain.as_deref().map(normalize_domain);
    let status  = query.status.map(UrlStatus::as_str);
    // SQLite treats a negative LIMIT as "no limit".
    let limit   = query.limit.map_or(-1, |n| n as i64);

    let raws: Vec<RawUrl> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {URL_COLUMNS} FROM urls
           WHERE (?1 IS NULL OR sitemap_url = ?1)
             AND (?2 IS NULL OR domain_name = ?2)
             AND (?3 IS NULL OR status = ?3)
           ORDER BY url
           LIMIT ?4"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![sitemap, domain, status, limit], RawUrl::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUrl::into_record).collect()
  }

  async fn url_stats(&self) -> Result<UrlStats> {
    let (by_status, by_domain): (Vec<(String, i64)>, Vec<(String, i64)>) = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT status, COUNT(*) FROM urls GROUP BY status ORDER BY status")?;
        let by_status = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT domain_name, COUNT(*) AS n FROM urls
           GROUP BY domain_name ORDER BY n DESC, domain_name",
        )?;
        let by_domain = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((by_status, by_domain))
      })
      .await?;

    let mut stats = UrlStats::default();
    for (status, n) in by_status {
      let n = n as usize;
      stats.total += n;
      stats.by_status.push((UrlStatus::parse(&status)?, n));
    }
    stats.by_status.sort();
    stats.by_domain = by_domain.into_iter().map(|(d, n)| (d, n as usize)).collect();
    Ok(stats)
  }
}

// ─── Content analysis ────────────────────────────────────────────────────────

impl AnalysisCache for SqliteStore {
  async fn get_analysis(&self, url: &str) -> Result<Option<UrlAnalysis>> {
    let url = url.trim().to_owned();

    let raw: Option<RawAnalysis> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ANALYSIS_COLUMNS} FROM url_analysis WHERE url = ?1"),
              rusqlite::params![url],
              RawAnalysis::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAnalysis::into_analysis).transpose()
  }

  async fn store_analysis(&self, input: NewAnalysis) -> Result<UrlAnalysis> {
    let analysis = UrlAnalysis {
      url:                  input.url.trim().to_owned(),
      summary:              input.analysis.summary,
      category:             input.analysis.category,
      primary_keyword:      input.analysis.primary_keyword,
      estimated_word_count: input.analysis.estimated_word_count,
      analysis_version:     input.analysis.version,
      last_analyzed:        Utc::now(),
    };

    let url      = analysis.url.clone();
    let summary  = analysis.summary.clone();
    let category = analysis.category.clone();
    let primary  = analysis.primary_keyword.clone();
    let words    = i64::from(analysis.estimated_word_count);
    let version  = i64::from(analysis.analysis_version);
    let at       = analysis.last_analyzed;
    let page     = input.analysis.page;

    // `None` when the URL is untracked, else whether its dates were raised.
    let written: Option<bool> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = tx
          .query_row(
            &format!("SELECT {URL_COLUMNS} FROM urls WHERE url = ?1"),
            rusqlite::params![url],
            RawUrl::from_row,
          )
          .optional()?;
        let Some(raw) = raw else {
          return Ok(None);
        };
        let mut record = raw.into_record().map_err(in_call)?;
        let normalized = page.apply_to(&mut record);
        record.last_processed = Some(at);

        tx.execute(
          "INSERT INTO url_analysis (url, summary, category, primary_keyword,
                                     estimated_word_count, analysis_version, last_analyzed)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT(url) DO UPDATE SET
             summary              = excluded.summary,
             category             = excluded.category,
             primary_keyword      = excluded.primary_keyword,
             estimated_word_count = excluded.estimated_word_count,
             analysis_version     = excluded.analysis_version,
             last_analyzed        = excluded.last_analyzed",
          rusqlite::params![url, summary, category, primary, words, version, encode_dt(at)],
        )?;

        let p = UrlParams::from(&record);
        tx.execute(UPSERT_URL, rusqlite::params![
          p.url,
          p.sitemap_url,
          p.word_count,
          p.date_published,
          p.date_modified,
          p.last_checked,
          p.discovery_date,
          p.domain_name,
          p.status,
          p.last_processed,
          p.missed_runs,
        ])?;
        tx.commit()?;
        Ok(Some(normalized))
      })
      .await?;

    match written {
      None => return Err(Error::UrlNotFound(analysis.url)),
      Some(true) => {
        warn!(url = %analysis.url, "page date_modified precedes date_published; raised to match")
      }
      Some(false) => {}
    }
    Ok(analysis)
  }
}
