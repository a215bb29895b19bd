//! Ranking observations: one search position per keyword, domain and day.
//!
//! Observations are keyed by `(keyword_id, domain, check_date)`. A later fetch
//! for the same key overwrites the earlier one, so retried rank checks never
//! produce duplicates, while different dates accumulate into a history.
//!
//! Buckets ([`RankBucket`], [`PositionRange`]) are derived at read time from
//! the stored position and are never persisted.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, keyword::KeywordId};

// ─── Position ────────────────────────────────────────────────────────────────

/// A search position. `Ranked(1)` is the top result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
  Ranked(u32),
  /// The domain did not appear in the checked results.
  Unranked,
}

impl Position {
  /// Build a ranked position, rejecting zero and negative values.
  pub fn ranked(position: i64) -> Result<Self> {
    match u32::try_from(position) {
      Ok(p) if p >= 1 => Ok(Self::Ranked(p)),
      _ => Err(Error::InvalidPosition(position)),
    }
  }

  /// Map a nullable stored column back to a position.
  pub fn from_column(value: Option<i64>) -> Result<Self> {
    value.map_or(Ok(Self::Unranked), Self::ranked)
  }

  pub fn as_option(self) -> Option<u32> {
    match self {
      Self::Ranked(p) => Some(p),
      Self::Unranked => None,
    }
  }

  /// Sort key with unranked positions ordered after every ranked one.
  pub fn sort_key(self) -> u32 { self.as_option().unwrap_or(u32::MAX) }
}

impl fmt::Display for Position {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Ranked(p) => write!(f, "{p}"),
      Self::Unranked => f.write_str("unranked"),
    }
  }
}

// ─── Observations ────────────────────────────────────────────────────────────

/// Input to [`RankingStore::upsert_ranking`](crate::store::RankingStore::upsert_ranking).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRanking {
  pub keyword_id:   KeywordId,
  pub domain:       String,
  pub check_date:   NaiveDate,
  pub position:     Position,
  pub observed_url: Option<String>,
}

/// A persisted ranking observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingObservation {
  pub keyword_id:   KeywordId,
  pub domain:       String,
  pub check_date:   NaiveDate,
  pub position:     Position,
  pub observed_url: Option<String>,
  /// When the winning fetch for this key was written.
  pub recorded_at:  DateTime<Utc>,
}

/// Lower-case a domain and strip a leading `www.` so `WWW.Atlan.com` and
/// `atlan.com` name the same ranking series.
pub fn normalize_domain(domain: &str) -> String {
  let lower = domain.trim().trim_end_matches('/').to_lowercase();
  lower
    .strip_prefix("www.")
    .map(str::to_owned)
    .unwrap_or(lower)
}

// ─── Buckets ─────────────────────────────────────────────────────────────────

/// Coarse reporting bucket for a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RankBucket {
  #[serde(rename = "Top 10")]
  Top10,
  #[serde(rename = "Top 20")]
  Top20,
  #[serde(rename = "Top 50")]
  Top50,
  #[serde(rename = "Beyond Top 50")]
  BeyondTop50,
}

impl RankBucket {
  pub fn classify(position: Position) -> Self {
    match position {
      Position::Ranked(1..=10) => Self::Top10,
      Position::Ranked(11..=20) => Self::Top20,
      Position::Ranked(21..=50) => Self::Top50,
      _ => Self::BeyondTop50,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::Top10 => "Top 10",
      Self::Top20 => "Top 20",
      Self::Top50 => "Top 50",
      Self::BeyondTop50 => "Beyond Top 50",
    }
  }
}

impl fmt::Display for RankBucket {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

/// Fine-grained position range used by the ranking-distribution report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PositionRange {
  #[serde(rename = "1-3")]
  Podium,
  #[serde(rename = "4-10")]
  FirstPage,
  #[serde(rename = "11-20")]
  SecondPage,
  #[serde(rename = "21-50")]
  Deep,
  #[serde(rename = "51-100")]
  Tail,
}

impl PositionRange {
  pub fn classify(position: Position) -> Self {
    match position {
      Position::Ranked(1..=3) => Self::Podium,
      Position::Ranked(4..=10) => Self::FirstPage,
      Position::Ranked(11..=20) => Self::SecondPage,
      Position::Ranked(21..=50) => Self::Deep,
      _ => Self::Tail,
    }
  }
}

// ─── Movements ───────────────────────────────────────────────────────────────

/// One step of a ranking series compared with the previous check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankMovement {
  pub check_date:        NaiveDate,
  pub position:          Position,
  pub previous_position: Option<Position>,
  /// Positive when the domain moved up (towards position 1).
  pub change:            Option<i64>,
  /// Absolute size of the move; zero for the first observation or when either
  /// side is unranked.
  pub volatility:        u32,
}

/// Compute day-over-day movements for a single `(keyword, domain)` history.
///
/// The input does not need to be sorted.
pub fn movements(history: &[RankingObservation]) -> Vec<RankMovement> {
  let mut sorted: Vec<&RankingObservation> = history.iter().collect();
  sorted.sort_by_key(|o| o.check_date);

  let mut previous: Option<Position> = None;
  sorted
    .into_iter()
    .map(|obs| {
      let change = match (previous.and_then(Position::as_option), obs.position.as_option()) {
        (Some(prev), Some(cur)) => Some(i64::from(prev) - i64::from(cur)),
        _ => None,
      };
      let movement = RankMovement {
        check_date: obs.check_date,
        position: obs.position,
        previous_position: previous,
        change,
        volatility: change.map_or(0, |c| c.unsigned_abs() as u32),
      };
      previous = Some(obs.position);
      movement
    })
    .collect()
}

// ─── Analytics query ─────────────────────────────────────────────────────────

/// How the keyword filter of a [`RankingQuery`] matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", content = "text", rename_all = "snake_case")]
pub enum KeywordFilter {
  Exact(String),
  Substring(String),
}

/// Parameters for [`RankingStore::query_rankings`](crate::store::RankingStore::query_rankings).
#[derive(Debug, Clone, Default)]
pub struct RankingQuery {
  pub keyword:      Option<KeywordFilter>,
  pub domain:       Option<String>,
  /// Check date to report; defaults to the latest date among matching rows.
  pub date:         Option<NaiveDate>,
  /// Only include ranked positions at or above this one.
  pub max_position: Option<u32>,
  pub limit:        Option<usize>,
}

/// A single row of the ranking report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedResult {
  pub keyword_id:   KeywordId,
  pub keyword:      String,
  pub domain:       String,
  pub check_date:   NaiveDate,
  pub position:     Position,
  pub bucket:       RankBucket,
  pub observed_url: Option<String>,
}

/// Apply the read-contract ordering and position cap to report rows.
///
/// Position ascending with unranked rows last; ties broken by keyword text,
/// then domain.
pub fn finish_report(mut rows: Vec<RankedResult>, query: &RankingQuery) -> Vec<RankedResult> {
  if let Some(max) = query.max_position {
    rows.retain(|r| matches!(r.position, Position::Ranked(p) if p <= max));
  }
  rows.sort_by(|a, b| {
    a.position
      .sort_key()
      .cmp(&b.position.sort_key())
      .then_with(|| a.keyword.cmp(&b.keyword))
      .then_with(|| a.domain.cmp(&b.domain))
  });
  if let Some(limit) = query.limit {
    rows.truncate(limit);
  }
  rows
}

#[cfg(test)]
mod tests {
  use super::*;

  fn obs(day: u32, position: Position) -> RankingObservation {
    RankingObservation {
      keyword_id:   KeywordId(uuid::Uuid::nil()),
      domain:       "atlan.com".into(),
      check_date:   NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
      position,
      observed_url: None,
      recorded_at:  Utc::now(),
    }
  }

  #[test]
  fn bucket_boundaries() {
    assert_eq!(RankBucket::classify(Position::Ranked(1)), RankBucket::Top10);
    assert_eq!(RankBucket::classify(Position::Ranked(10)), RankBucket::Top10);
    assert_eq!(RankBucket::classify(Position::Ranked(11)), RankBucket::Top20);
    assert_eq!(RankBucket::classify(Position::Ranked(45)), RankBucket::Top50);
    assert_eq!(RankBucket::classify(Position::Ranked(51)), RankBucket::BeyondTop50);
    assert_eq!(RankBucket::classify(Position::Unranked), RankBucket::BeyondTop50);
    assert_eq!(RankBucket::Top10.to_string(), "Top 10");
  }

  #[test]
  fn zero_position_is_invalid() {
    assert!(matches!(Position::ranked(0), Err(Error::InvalidPosition(0))));
    assert!(Position::ranked(-3).is_err());
    assert_eq!(Position::from_column(None).unwrap(), Position::Unranked);
  }

  #[test]
  fn domains_normalize() {
    assert_eq!(normalize_domain("WWW.Atlan.com/"), "atlan.com");
    assert_eq!(normalize_domain("atlan.com"), "atlan.com");
  }

  #[test]
  fn movements_track_previous_position() {
    let history = vec![
      obs(3, Position::Ranked(8)),
      obs(1, Position::Ranked(45)),
      obs(2, Position::Unranked),
    ];
    let moves = movements(&history);
    assert_eq!(moves.len(), 3);
    assert_eq!(moves[0].previous_position, None);
    assert_eq!(moves[1].previous_position, Some(Position::Ranked(45)));
    assert_eq!(moves[1].change, None);
    assert_eq!(moves[2].previous_position, Some(Position::Unranked));
    assert_eq!(moves[2].volatility, 0);
  }

  #[test]
  fn movement_change_is_positive_when_climbing() {
    let moves = movements(&[obs(1, Position::Ranked(45)), obs(2, Position::Ranked(8))]);
    assert_eq!(moves[1].change, Some(37));
    assert_eq!(moves[1].volatility, 37);
  }

  #[test]
  fn report_orders_by_position_then_keyword() {
    let row = |kw: &str, position| RankedResult {
      keyword_id: KeywordId(uuid::Uuid::nil()),
      keyword: kw.into(),
      domain: "atlan.com".into(),
      check_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
      position,
      bucket: RankBucket::classify(position),
      observed_url: None,
    };
    let rows = vec![
      row("zeta", Position::Ranked(3)),
      row("alpha", Position::Unranked),
      row("beta", Position::Ranked(3)),
      row("gamma", Position::Ranked(1)),
    ];

    let sorted = finish_report(rows.clone(), &RankingQuery::default());
    let order: Vec<&str> = sorted.iter().map(|r| r.keyword.as_str()).collect();
    assert_eq!(order, ["gamma", "beta", "zeta", "alpha"]);

    let capped = finish_report(rows, &RankingQuery { max_position: Some(2), ..Default::default() });
    assert_eq!(capped.len(), 1);
    assert_eq!(capped[0].keyword, "gamma");
  }
}
