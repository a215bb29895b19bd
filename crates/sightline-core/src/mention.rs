//! Mention observations: whether an AI model names the brand when asked
//! about a keyword.
//!
//! Storage is normalized: one observation per `(keyword, check_date,
//! model_name)`. The per-model wide layout (one answer/flag column pair per
//! model) is produced only by [`wide_rows`] at the read boundary, so adding a
//! model never touches historical rows.
//!
//! The `mentioned` flag is always derived from `answer_text` through a
//! [`BrandMatcher`]; it is never written independently.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Brand matching ──────────────────────────────────────────────────────────

/// Decides whether an answer mentions the tracked brand.
pub trait BrandMatcher: Send + Sync {
  fn contains_brand(&self, answer_text: &str) -> bool;
}

/// Case-insensitive substring match against a single brand name.
#[derive(Debug, Clone)]
pub struct SubstringMatcher {
  needle: String,
}

impl SubstringMatcher {
  pub fn new(brand: &str) -> Self { Self { needle: brand.trim().to_lowercase() } }

  pub fn brand(&self) -> &str { &self.needle }
}

impl BrandMatcher for SubstringMatcher {
  fn contains_brand(&self, answer_text: &str) -> bool {
    !self.needle.is_empty() && answer_text.to_lowercase().contains(&self.needle)
  }
}

/// Sanitize a model display name into its stable column key.
///
/// `"GPT-4o mini"` becomes `"gpt_4o_mini"`; names starting with a digit get an
/// `n_` prefix so the key is always a valid identifier.
pub fn model_column_name(name: &str) -> String {
  let mut safe: String = name
    .trim()
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
    .collect();
  if safe.starts_with(|c: char| c.is_ascii_digit()) {
    safe.insert_str(0, "n_");
  }
  safe
}

// ─── Observations ────────────────────────────────────────────────────────────

/// Input to [`MentionStore::record_mention`](crate::store::MentionStore::record_mention).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMention {
  pub keyword:     String,
  pub check_date:  NaiveDate,
  pub model_name:  String,
  pub answer_text: String,
}

/// A persisted mention observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionObservation {
  pub keyword:     String,
  pub check_date:  NaiveDate,
  pub model_name:  String,
  pub answer_text: String,
  pub mentioned:   bool,
  pub recorded_at: DateTime<Utc>,
}

impl MentionObservation {
  /// Build an observation, deriving `mentioned` from the answer.
  pub fn derive(input: NewMention, matcher: &dyn BrandMatcher, recorded_at: DateTime<Utc>) -> Self {
    let mentioned = matcher.contains_brand(&input.answer_text);
    Self {
      keyword: input.keyword,
      check_date: input.check_date,
      model_name: input.model_name,
      answer_text: input.answer_text,
      mentioned,
      recorded_at,
    }
  }

  /// Compare the stored flag with a fresh derivation.
  pub fn violation(&self, matcher: &dyn BrandMatcher) -> Option<MentionViolation> {
    let derived = matcher.contains_brand(&self.answer_text);
    (derived != self.mentioned).then(|| MentionViolation {
      keyword: self.keyword.clone(),
      model_name: self.model_name.clone(),
      check_date: self.check_date,
      stored: self.mentioned,
      derived,
    })
  }

  /// Verify the stored flag against a fresh derivation.
  pub fn verify(&self, matcher: &dyn BrandMatcher) -> Result<()> {
    match self.violation(matcher) {
      None => Ok(()),
      Some(v) => Err(v.into()),
    }
  }
}

/// A stored `mentioned` flag that no longer matches its answer text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionViolation {
  pub keyword:    String,
  pub model_name: String,
  pub check_date: NaiveDate,
  pub stored:     bool,
  pub derived:    bool,
}

impl From<MentionViolation> for Error {
  fn from(v: MentionViolation) -> Self {
    Error::ConsistencyViolation {
      keyword:    v.keyword,
      model_name: v.model_name,
      check_date: v.check_date,
      stored:     v.stored,
      derived:    v.derived,
    }
  }
}

/// Parameters for [`MentionStore::list_mentions`](crate::store::MentionStore::list_mentions).
#[derive(Debug, Clone, Default)]
pub struct MentionQuery {
  pub keyword:    Option<String>,
  pub model_name: Option<String>,
  pub from:       Option<NaiveDate>,
  pub to:         Option<NaiveDate>,
}

// ─── Rates ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MentionRate {
  pub mentioned: usize,
  pub total:     usize,
  pub fraction:  f64,
}

/// Fraction of observations that mention the brand.
///
/// Fails with [`Error::InsufficientData`] when there are no observations.
pub fn mention_rate(observations: &[MentionObservation]) -> Result<MentionRate> {
  let total = observations.len();
  if total == 0 {
    return Err(Error::InsufficientData("no mention observations in range".into()));
  }
  let mentioned = observations.iter().filter(|o| o.mentioned).count();
  Ok(MentionRate { mentioned, total, fraction: mentioned as f64 / total as f64 })
}

/// Per-date mention percentage for each model, rounded to one decimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMentionRates {
  pub check_date: NaiveDate,
  pub rates:      BTreeMap<String, f64>,
}

/// Build the per-date, per-model mention-rate table, newest date first.
pub fn daily_mention_rates(observations: &[MentionObservation]) -> Vec<DailyMentionRates> {
  let mut counts: BTreeMap<NaiveDate, BTreeMap<String, (usize, usize)>> = BTreeMap::new();
  for obs in observations {
    let entry = counts
      .entry(obs.check_date)
      .or_default()
      .entry(obs.model_name.clone())
      .or_default();
    entry.1 += 1;
    if obs.mentioned {
      entry.0 += 1;
    }
  }

  counts
    .into_iter()
    .rev()
    .map(|(check_date, models)| DailyMentionRates {
      check_date,
      rates: models
        .into_iter()
        .map(|(model, (hit, total))| {
          let pct = (hit as f64 * 1000.0 / total as f64).round() / 10.0;
          (model, pct)
        })
        .collect(),
    })
    .collect()
}

// ─── Wide projection ─────────────────────────────────────────────────────────

/// One model's answer inside a [`WideMentionRow`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelAnswer {
  pub answer:    String,
  pub mentioned: bool,
}

/// Export row with one answer/flag pair per model, keyed by
/// [`model_column_name`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WideMentionRow {
  pub keyword:    String,
  pub check_date: NaiveDate,
  pub models:     BTreeMap<String, ModelAnswer>,
}

/// Project normalized observations into the wide layout.
///
/// Rows are ordered by keyword then date. A model with no observation for a
/// row is simply absent from that row's map.
pub fn wide_rows(observations: &[MentionObservation]) -> Vec<WideMentionRow> {
  let mut rows: BTreeMap<(String, NaiveDate), BTreeMap<String, ModelAnswer>> = BTreeMap::new();
  for obs in observations {
    rows
      .entry((obs.keyword.clone(), obs.check_date))
      .or_default()
      .insert(model_column_name(&obs.model_name), ModelAnswer {
        answer:    obs.answer_text.clone(),
        mentioned: obs.mentioned,
      });
  }
  rows
    .into_iter()
    .map(|((keyword, check_date), models)| WideMentionRow { keyword, check_date, models })
    .collect()
}

// ─── Competitors ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorMentions {
  pub check_date: NaiveDate,
  pub company:    String,
  /// Number of `(keyword, date)` rows where any model's answer names the company.
  pub mentions:   usize,
}

/// Count, per date, the rows in which any model answer names each company.
pub fn competitor_mentions(
  observations: &[MentionObservation],
  companies: &[String],
) -> Vec<CompetitorMentions> {
  let matchers: Vec<(String, SubstringMatcher)> = companies
    .iter()
    .map(|c| (c.clone(), SubstringMatcher::new(c)))
    .collect();

  // (date, keyword) -> set of companies named in any answer
  let mut hits: BTreeMap<NaiveDate, BTreeMap<&str, BTreeSet<usize>>> = BTreeMap::new();
  for obs in observations {
    let named = hits
      .entry(obs.check_date)
      .or_default()
      .entry(obs.keyword.as_str())
      .or_default();
    for (idx, (_, matcher)) in matchers.iter().enumerate() {
      if matcher.contains_brand(&obs.answer_text) {
        named.insert(idx);
      }
    }
  }

  let mut out = Vec::new();
  for (check_date, by_keyword) in hits {
    for (idx, (company, _)) in matchers.iter().enumerate() {
      let mentions = by_keyword.values().filter(|set| set.contains(&idx)).count();
      out.push(CompetitorMentions { check_date, company: company.clone(), mentions });
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn day(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, 3, d).unwrap() }

  fn observe(keyword: &str, d: u32, model: &str, answer: &str) -> MentionObservation {
    MentionObservation::derive(
      NewMention {
        keyword:     keyword.into(),
        check_date:  day(d),
        model_name:  model.into(),
        answer_text: answer.into(),
      },
      &SubstringMatcher::new("Atlan"),
      Utc::now(),
    )
  }

  #[test]
  fn substring_matcher_ignores_case() {
    let m = SubstringMatcher::new("Atlan");
    assert!(m.contains_brand("Tools like ATLAN and Alation"));
    assert!(!m.contains_brand("Collibra is popular"));
    assert!(!SubstringMatcher::new("  ").contains_brand("anything"));
  }

  #[test]
  fn model_names_are_sanitized() {
    assert_eq!(model_column_name("GPT-4o mini"), "gpt_4o_mini");
    assert_eq!(model_column_name("gpt_4o_mini"), "gpt_4o_mini");
    assert_eq!(model_column_name("3.5 Sonnet"), "n_3_5_sonnet");
  }

  #[test]
  fn derive_then_verify_is_consistent() {
    let obs = observe("data catalog", 1, "gpt_4o_mini", "Atlan is a data catalog");
    assert!(obs.mentioned);
    obs.verify(&SubstringMatcher::new("Atlan")).unwrap();
  }

  #[test]
  fn tampered_flag_is_a_violation() {
    let mut obs = observe("data catalog", 1, "gpt_4o_mini", "Collibra only");
    obs.mentioned = true;
    let err = obs.verify(&SubstringMatcher::new("Atlan")).unwrap_err();
    assert!(matches!(err, Error::ConsistencyViolation { stored: true, derived: false, .. }));
  }

  #[test]
  fn rate_over_empty_range_is_insufficient() {
    assert!(matches!(mention_rate(&[]), Err(Error::InsufficientData(_))));
  }

  #[test]
  fn rate_counts_mentions() {
    let rows = vec![
      observe("a", 1, "m", "atlan"),
      observe("b", 1, "m", "nothing"),
      observe("c", 1, "m", "Atlan!"),
      observe("d", 1, "m", "nope"),
    ];
    let rate = mention_rate(&rows).unwrap();
    assert_eq!(rate.mentioned, 2);
    assert_eq!(rate.total, 4);
    assert!((rate.fraction - 0.5).abs() < f64::EPSILON);
  }

  #[test]
  fn wide_rows_group_models_per_keyword_and_date() {
    let rows = wide_rows(&[
      observe("data catalog", 1, "GPT-4o mini", "Atlan"),
      observe("data catalog", 1, "Claude 3", "Alation"),
      observe("data catalog", 2, "GPT-4o mini", "none"),
    ]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].models.len(), 2);
    assert!(rows[0].models["gpt_4o_mini"].mentioned);
    assert!(!rows[0].models["claude_3"].mentioned);
    assert_eq!(rows[1].models.len(), 1);
  }

  #[test]
  fn daily_rates_are_percentages_newest_first() {
    let rates = daily_mention_rates(&[
      observe("a", 1, "m1", "Atlan"),
      observe("b", 1, "m1", "no"),
      observe("c", 1, "m1", "no"),
      observe("a", 2, "m1", "Atlan"),
    ]);
    assert_eq!(rates[0].check_date, day(2));
    assert_eq!(rates[0].rates["m1"], 100.0);
    assert_eq!(rates[1].rates["m1"], 33.3);
  }

  #[test]
  fn competitors_counted_once_per_keyword_row() {
    let counts = competitor_mentions(
      &[
        observe("a", 1, "m1", "Atlan and Collibra"),
        observe("a", 1, "m2", "Collibra"),
        observe("b", 1, "m1", "Alation"),
      ],
      &["Atlan".into(), "Alation".into(), "Collibra".into()],
    );
    let get = |c: &str| counts.iter().find(|r| r.company == c).unwrap().mentions;
    assert_eq!(get("Atlan"), 1);
    assert_eq!(get("Alation"), 1);
    assert_eq!(get("Collibra"), 1);
  }
}
