//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, calendar dates as `YYYY-MM-DD`
//! and UUIDs as hyphenated lowercase strings. Each table has a `Raw*` row type
//! holding the column values exactly as read, decoded afterwards so that
//! decode failures surface as [`Error`] rather than as SQLite errors.

use chrono::{DateTime, NaiveDate, Utc};
use sightline_core::{
  analysis::UrlAnalysis,
  discovery::{SitemapRecord, SitemapStatus, UrlRecord, UrlStatus},
  keyword::{Keyword, KeywordId},
  mention::MentionObservation,
  ranking::{Position, RankBucket, RankedResult, RankingObservation},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_id(id: KeywordId) -> String { id.0.hyphenated().to_string() }

pub fn decode_id(s: &str) -> Result<KeywordId> { Ok(KeywordId(Uuid::parse_str(s)?)) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

pub fn encode_position(p: Position) -> Option<i64> { p.as_option().map(i64::from) }

fn decode_count(column: &str, n: i64) -> Result<u32> {
  u32::try_from(n).map_err(|_| Error::Decode(format!("{column} out of range: {n}")))
}

/// Flatten a decode error into a SQLite error, for decoding that has to happen
/// inside a transaction closure.
pub fn in_call(e: Error) -> rusqlite::Error { rusqlite::Error::ToSqlConversionFailure(e.to_string().into()) }

// ─── Keywords ────────────────────────────────────────────────────────────────

pub const KEYWORD_COLUMNS: &str = "keyword_id, text, created_at";

pub struct RawKeyword {
  pub keyword_id: String,
  pub text:       String,
  pub created_at: String,
}

impl RawKeyword {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { keyword_id: row.get(0)?, text: row.get(1)?, created_at: row.get(2)? })
  }

  pub fn into_keyword(self) -> Result<Keyword> {
    Ok(Keyword {
      keyword_id: decode_id(&self.keyword_id)?,
      text:       self.text,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

// ─── Rankings ────────────────────────────────────────────────────────────────

pub const RANKING_COLUMNS: &str =
  "r.keyword_id, r.domain, r.check_date, r.position, r.observed_url, r.recorded_at";

pub struct RawRanking {
  pub keyword_id:   String,
  pub domain:       String,
  pub check_date:   String,
  pub position:     Option<i64>,
  pub observed_url: Option<String>,
  pub recorded_at:  String,
}

impl RawRanking {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      keyword_id:   row.get(0)?,
      domain:       row.get(1)?,
      check_date:   row.get(2)?,
      position:     row.get(3)?,
      observed_url: row.get(4)?,
      recorded_at:  row.get(5)?,
    })
  }

  pub fn into_observation(self) -> Result<RankingObservation> {
    Ok(RankingObservation {
      keyword_id:   decode_id(&self.keyword_id)?,
      domain:       self.domain,
      check_date:   decode_date(&self.check_date)?,
      position:     Position::from_column(self.position)?,
      observed_url: self.observed_url,
      recorded_at:  decode_dt(&self.recorded_at)?,
    })
  }
}

/// A ranking row joined with its keyword text.
pub struct RawRankedRow {
  pub ranking: RawRanking,
  pub keyword: String,
}

impl RawRankedRow {
  /// Reads [`RANKING_COLUMNS`] followed by `k.text`.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { ranking: RawRanking::from_row(row)?, keyword: row.get(6)? })
  }

  pub fn into_result(self) -> Result<RankedResult> {
    let obs = self.ranking.into_observation()?;
    Ok(RankedResult {
      keyword_id:   obs.keyword_id,
      keyword:      self.keyword,
      domain:       obs.domain,
      check_date:   obs.check_date,
      position:     obs.position,
      bucket:       RankBucket::classify(obs.position),
      observed_url: obs.observed_url,
    })
  }
}

// ─── Mentions ────────────────────────────────────────────────────────────────

pub const MENTION_COLUMNS: &str =
  "keyword, check_date, model_name, answer_text, mentioned, recorded_at";

pub struct RawMention {
  pub keyword:     String,
  pub check_date:  String,
  pub model_name:  String,
  pub answer_text: String,
  pub mentioned:   bool,
  pub recorded_at: String,
}

impl RawMention {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      keyword:     row.get(0)?,
      check_date:  row.get(1)?,
      model_name:  row.get(2)?,
      answer_text: row.get(3)?,
      mentioned:   row.get(4)?,
      recorded_at: row.get(5)?,
    })
  }

  pub fn into_observation(self) -> Result<MentionObservation> {
    Ok(MentionObservation {
      keyword:     self.keyword,
      check_date:  decode_date(&self.check_date)?,
      model_name:  self.model_name,
      answer_text: self.answer_text,
      mentioned:   self.mentioned,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

// ─── Sitemaps ────────────────────────────────────────────────────────────────

pub const SITEMAP_COLUMNS: &str = "sitemap_url, status, last_processed, last_attempted, \
                                   consecutive_failures, last_error, registered_at";

pub struct RawSitemap {
  pub sitemap_url:          String,
  pub status:               String,
  pub last_processed:       Option<String>,
  pub last_attempted:       Option<String>,
  pub consecutive_failures: i64,
  pub last_error:           Option<String>,
  pub registered_at:        String,
}

impl RawSitemap {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      sitemap_url:          row.get(0)?,
      status:               row.get(1)?,
      last_processed:       row.get(2)?,
      last_attempted:       row.get(3)?,
      consecutive_failures: row.get(4)?,
      last_error:           row.get(5)?,
      registered_at:        row.get(6)?,
    })
  }

  pub fn into_record(self) -> Result<SitemapRecord> {
    Ok(SitemapRecord {
      sitemap_url:          self.sitemap_url,
      status:               SitemapStatus::parse(&self.status)?,
      last_processed:       decode_opt_dt(self.last_processed)?,
      last_attempted:       decode_opt_dt(self.last_attempted)?,
      consecutive_failures: decode_count("consecutive_failures", self.consecutive_failures)?,
      last_error:           self.last_error,
      registered_at:        decode_dt(&self.registered_at)?,
    })
  }
}

// ─── URLs ────────────────────────────────────────────────────────────────────

pub const URL_COLUMNS: &str = "url, sitemap_url, word_count, date_published, date_modified, \
                               last_checked, discovery_date, domain_name, status, \
                               last_processed, missed_runs";

pub struct RawUrl {
  pub url:            String,
  pub sitemap_url:    String,
  pub word_count:     Option<i64>,
  pub date_published: Option<String>,
  pub date_modified:  Option<String>,
  pub last_checked:   String,
  pub discovery_date: String,
  pub domain_name:    String,
  pub status:         String,
  pub last_processed: Option<String>,
  pub missed_runs:    i64,
}

impl RawUrl {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      url:            row.get(0)?,
      sitemap_url:    row.get(1)?,
      word_count:     row.get(2)?,
      date_published: row.get(3)?,
      date_modified:  row.get(4)?,
      last_checked:   row.get(5)?,
      discovery_date: row.get(6)?,
      domain_name:    row.get(7)?,
      status:         row.get(8)?,
      last_processed: row.get(9)?,
      missed_runs:    row.get(10)?,
    })
  }

  pub fn into_record(self) -> Result<UrlRecord> {
    Ok(UrlRecord {
      url:            self.url,
      sitemap_url:    self.sitemap_url,
      word_count:     self.word_count.map(|n| decode_count("word_count", n)).transpose()?,
      date_published: decode_opt_dt(self.date_published)?,
      date_modified:  decode_opt_dt(self.date_modified)?,
      last_checked:   decode_dt(&self.last_checked)?,
      discovery_date: decode_dt(&self.discovery_date)?,
      domain_name:    self.domain_name,
      status:         UrlStatus::parse(&self.status)?,
      last_processed: decode_opt_dt(self.last_processed)?,
      missed_runs:    decode_count("missed_runs", self.missed_runs)?,
    })
  }
}

/// Column values for writing a [`UrlRecord`], in [`URL_COLUMNS`] order.
pub struct UrlParams {
  pub url:            String,
  pub sitemap_url:    String,
  pub word_count:     Option<i64>,
  pub date_published: Option<String>,
  pub date_modified:  Option<String>,
  pub last_checked:   String,
  pub discovery_date: String,
  pub domain_name:    String,
  pub status:         &'static str,
  pub last_processed: Option<String>,
  pub missed_runs:    i64,
}

impl From<&UrlRecord> for UrlParams {
  fn from(r: &UrlRecord) -> Self {
    Self {
      url:            r.url.clone(),
      sitemap_url:    r.sitemap_url.clone(),
      word_count:     r.word_count.map(i64::from),
      date_published: r.date_published.map(encode_dt),
      date_modified:  r.date_modified.map(encode_dt),
      last_checked:   encode_dt(r.last_checked),
      discovery_date: encode_dt(r.discovery_date),
      domain_name:    r.domain_name.clone(),
      status:         r.status.as_str(),
      last_processed: r.last_processed.map(encode_dt),
      missed_runs:    i64::from(r.missed_runs),
    }
  }
}

// ─── Analysis ────────────────────────────────────────────────────────────────

pub const ANALYSIS_COLUMNS: &str = "url, summary, category, primary_keyword, \
                                    estimated_word_count, analysis_version, last_analyzed";

pub struct RawAnalysis {
  pub url:                  String,
  pub summary:              String,
  pub category:             String,
  pub primary_keyword:      String,
  pub estimated_word_count: i64,
  pub analysis_version:     i64,
  pub last_analyzed:        String,
}

impl RawAnalysis {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      url:                  row.get(0)?,
      summary:              row.get(1)?,
      category:             row.get(2)?,
      primary_keyword:      row.get(3)?,
      estimated_word_count: row.get(4)?,
      analysis_version:     row.get(5)?,
      last_analyzed:        row.get(6)?,
    })
  }

  pub fn into_analysis(self) -> Result<UrlAnalysis> {
    Ok(UrlAnalysis {
      url:                  self.url,
      summary:              self.summary,
      category:             self.category,
      primary_keyword:      self.primary_keyword,
      estimated_word_count: decode_count("estimated_word_count", self.estimated_word_count)?,
      analysis_version:     decode_count("analysis_version", self.analysis_version)?,
      last_analyzed:        decode_dt(&self.last_analyzed)?,
    })
  }
}
