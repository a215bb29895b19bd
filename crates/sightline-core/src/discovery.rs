//! Sitemap-driven URL discovery.
//!
//! Each registered sitemap moves through `pending → processing → {completed,
//! failed}`. A successful run reconciles the sitemap's current listing
//! against the stored URL records with [`reconcile`]; the resulting
//! [`ReconcilePlan`] is applied by the store in a single transaction, so a
//! failed fetch never leaves a partially-updated URL set behind.
//!
//! URL records move through `discovered → active → stale → removed`. Removal
//! is a missing-presence heuristic: a URL is `removed` once it has been
//! absent from `removal_grace_runs` consecutive listings of its sitemap.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Sitemaps ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SitemapStatus {
  Pending,
  Processing,
  Completed,
  Failed,
}

impl SitemapStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Processing => "processing",
      Self::Completed => "completed",
      Self::Failed => "failed",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "pending" => Ok(Self::Pending),
      "processing" => Ok(Self::Processing),
      "completed" => Ok(Self::Completed),
      "failed" => Ok(Self::Failed),
      other => Err(Error::UnknownStatus { kind: "sitemap", value: other.to_owned() }),
    }
  }
}

/// Crawl bookkeeping for one sitemap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapRecord {
  pub sitemap_url:          String,
  pub status:               SitemapStatus,
  /// Set only by a successful run.
  pub last_processed:       Option<DateTime<Utc>>,
  /// Start of the most recent run, successful or not.
  pub last_attempted:       Option<DateTime<Utc>>,
  pub consecutive_failures: u32,
  pub last_error:           Option<String>,
  pub registered_at:        DateTime<Utc>,
}

// ─── URLs ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlStatus {
  /// First seen in the most recent listing that contained it.
  Discovered,
  /// Listed and known to have changed since discovery.
  Active,
  /// Missing from the latest listing(s) but still within the grace period.
  Stale,
  /// Missing from enough consecutive listings to be considered gone.
  Removed,
}

impl UrlStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Discovered => "discovered",
      Self::Active => "active",
      Self::Stale => "stale",
      Self::Removed => "removed",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "discovered" => Ok(Self::Discovered),
      "active" => Ok(Self::Active),
      "stale" => Ok(Self::Stale),
      "removed" => Ok(Self::Removed),
      other => Err(Error::UnknownStatus { kind: "url", value: other.to_owned() }),
    }
  }
}

/// A URL discovered through a sitemap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
  pub url:            String,
  /// The sitemap that most recently listed this URL.
  pub sitemap_url:    String,
  pub word_count:     Option<u32>,
  pub date_published: Option<DateTime<Utc>>,
  pub date_modified:  Option<DateTime<Utc>>,
  pub last_checked:   DateTime<Utc>,
  pub discovery_date: DateTime<Utc>,
  pub domain_name:    String,
  pub status:         UrlStatus,
  /// When content analysis last completed for this URL.
  pub last_processed: Option<DateTime<Utc>>,
  /// Consecutive sitemap runs this URL was absent from.
  pub missed_runs:    u32,
}

impl UrlRecord {
  /// Raise `date_modified` to `date_published` when it is earlier. Returns
  /// whether anything changed.
  pub fn normalize_dates(&mut self) -> bool {
    match (self.date_published, self.date_modified) {
      (Some(published), Some(modified)) if modified < published => {
        self.date_modified = Some(published);
        true
      }
      _ => false,
    }
  }
}

/// One `<url>` entry of a sitemap listing, as returned by a
/// [`SitemapFetcher`](crate::provider::SitemapFetcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapEntry {
  pub url:            String,
  pub date_published: Option<DateTime<Utc>>,
  pub date_modified:  Option<DateTime<Utc>>,
  pub word_count:     Option<u32>,
}

impl SitemapEntry {
  pub fn new(url: impl Into<String>) -> Self {
    Self { url: url.into(), date_published: None, date_modified: None, word_count: None }
  }
}

/// Host part of `url`, without a leading `www.`.
pub fn domain_of(url: &str) -> Result<String> {
  let parsed = url::Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
  let host = parsed
    .host_str()
    .ok_or_else(|| Error::InvalidUrl(format!("{url}: no host")))?;
  Ok(crate::ranking::normalize_domain(host))
}

/// Parameters for [`UrlTracker::list_urls`](crate::store::UrlTracker::list_urls).
#[derive(Debug, Clone, Default)]
pub struct UrlQuery {
  pub sitemap_url: Option<String>,
  pub domain:      Option<String>,
  pub status:      Option<UrlStatus>,
  pub limit:       Option<usize>,
}

/// Tracker-wide counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlStats {
  pub total:     usize,
  pub by_status: Vec<(UrlStatus, usize)>,
  pub by_domain: Vec<(String, usize)>,
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

/// What a sitemap run did to a single URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlChange {
  /// Never seen before; inserted as `discovered`.
  Discovered,
  /// Listed with a newer `date_modified`; now `active`.
  Modified,
  /// Listed and unchanged; only `last_checked` moves.
  Unchanged,
  /// Was `stale` or `removed` and is listed again; back to `active`.
  Reappeared,
  /// Absent, still within the grace period; now `stale`.
  Missed,
  /// Absent for `removal_grace_runs` consecutive runs; now `removed`.
  Removed,
}

impl UrlChange {
  /// Whether the URL entered or updated `discovered`/`active` state and so
  /// may need content analysis.
  pub fn wants_analysis(self) -> bool {
    matches!(self, Self::Discovered | Self::Modified | Self::Reappeared)
  }
}

/// The full set of record writes for one sitemap run.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
  /// Records to insert or overwrite, paired with what happened to them.
  pub writes:     Vec<(UrlChange, UrlRecord)>,
  /// Listing entries whose `date_modified` preceded `date_published` and was
  /// raised to match it.
  pub normalized: Vec<String>,
  /// Listing entries skipped because the URL could not be parsed.
  pub rejected:   Vec<String>,
}

/// Counts and follow-up work produced by applying a [`ReconcilePlan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
  pub sitemap_url:         String,
  pub listed:              usize,
  pub discovered:          usize,
  pub modified:            usize,
  pub unchanged:           usize,
  pub reappeared:          usize,
  pub stale:               usize,
  pub removed:             usize,
  pub rejected:            usize,
  /// URLs that entered or updated `discovered`/`active` state.
  pub analysis_candidates: Vec<String>,
}

impl ReconcilePlan {
  pub fn summarize(&self, sitemap_url: &str, listed: usize) -> ReconcileSummary {
    let mut summary = ReconcileSummary {
      sitemap_url: sitemap_url.to_owned(),
      listed,
      rejected: self.rejected.len(),
      ..Default::default()
    };
    for (change, record) in &self.writes {
      match change {
        UrlChange::Discovered => summary.discovered += 1,
        UrlChange::Modified => summary.modified += 1,
        UrlChange::Unchanged => summary.unchanged += 1,
        UrlChange::Reappeared => summary.reappeared += 1,
        UrlChange::Missed => summary.stale += 1,
        UrlChange::Removed => summary.removed += 1,
      }
      if change.wants_analysis() {
        summary.analysis_candidates.push(record.url.clone());
      }
    }
    summary
  }
}

/// Diff a sitemap listing against the stored URL records.
///
/// `existing` must contain every record currently attributed to
/// `sitemap_url` plus any record for a URL that appears in `listing` (a URL
/// may move between sitemaps). Absence is only counted against records
/// attributed to `sitemap_url`.
pub fn reconcile(
  sitemap_url: &str,
  existing: &[UrlRecord],
  listing: &[SitemapEntry],
  now: DateTime<Utc>,
  removal_grace_runs: u32,
) -> ReconcilePlan {
  let grace = removal_grace_runs.max(1);
  let mut plan = ReconcilePlan::default();
  let known: HashMap<&str, &UrlRecord> = existing.iter().map(|r| (r.url.as_str(), r)).collect();

  // Collapse duplicate listing entries, keeping the most recent modification.
  let mut listed: HashMap<String, SitemapEntry> = HashMap::new();
  let mut order: Vec<String> = Vec::new();
  for entry in listing {
    let mut entry = entry.clone();
    if let (Some(published), Some(modified)) = (entry.date_published, entry.date_modified)
      && modified < published
    {
      entry.date_modified = Some(published);
      plan.normalized.push(entry.url.clone());
    }
    match listed.get_mut(&entry.url) {
      Some(prev) => {
        if entry.date_modified > prev.date_modified {
          *prev = entry;
        }
      }
      None => {
        order.push(entry.url.clone());
        listed.insert(entry.url.clone(), entry);
      }
    }
  }

  for url in &order {
    let entry = &listed[url.as_str()];
    match known.get(url.as_str()) {
      None => {
        let domain_name = match domain_of(url) {
          Ok(d) => d,
          Err(_) => {
            plan.rejected.push(url.clone());
            continue;
          }
        };
        plan.writes.push((UrlChange::Discovered, UrlRecord {
          url: url.clone(),
          sitemap_url: sitemap_url.to_owned(),
          word_count: entry.word_count,
          date_published: entry.date_published,
          date_modified: entry.date_modified,
          last_checked: now,
          discovery_date: now,
          domain_name,
          status: UrlStatus::Discovered,
          last_processed: None,
          missed_runs: 0,
        }));
      }
      Some(stored) => {
        let mut record = (*stored).clone();
        record.sitemap_url = sitemap_url.to_owned();
        record.last_checked = now.max(record.discovery_date);
        record.missed_runs = 0;

        let advanced = match (entry.date_modified, stored.date_modified) {
          (Some(new), Some(old)) => new > old,
          (Some(_), None) => true,
          (None, _) => false,
        };

        let change = if advanced {
          record.date_modified = entry.date_modified;
          record.date_published = entry.date_published.or(record.date_published);
          record.word_count = entry.word_count.or(record.word_count);
          if record.normalize_dates() && !plan.normalized.contains(url) {
            plan.normalized.push(url.clone());
          }
          record.status = UrlStatus::Active;
          UrlChange::Modified
        } else if matches!(stored.status, UrlStatus::Stale | UrlStatus::Removed) {
          record.status = UrlStatus::Active;
          UrlChange::Reappeared
        } else {
          UrlChange::Unchanged
        };
        plan.writes.push((change, record));
      }
    }
  }

  for stored in existing {
    if stored.sitemap_url != sitemap_url
      || stored.status == UrlStatus::Removed
      || listed.contains_key(stored.url.as_str())
    {
      continue;
    }
    let mut record = stored.clone();
    record.missed_runs += 1;
    let change = if record.missed_runs >= grace {
      record.status = UrlStatus::Removed;
      UrlChange::Removed
    } else {
      record.status = UrlStatus::Stale;
      UrlChange::Missed
    };
    plan.writes.push((change, record));
  }

  plan
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  const SITEMAP: &str = "https://atlan.com/sitemap.xml";

  fn t(day: u32) -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap() }

  fn entry(url: &str, modified: Option<DateTime<Utc>>) -> SitemapEntry {
    SitemapEntry { date_modified: modified, ..SitemapEntry::new(url) }
  }

  /// Apply a plan to an in-memory record set, the way the store does.
  fn apply(records: &mut Vec<UrlRecord>, plan: &ReconcilePlan) {
    for (_, rec) in &plan.writes {
      match records.iter_mut().find(|r| r.url == rec.url) {
        Some(slot) => *slot = rec.clone(),
        None => records.push(rec.clone()),
      }
    }
  }

  /// Run one sitemap pass over `records` and apply it.
  fn step(records: &mut Vec<UrlRecord>, listing: &[SitemapEntry], now: DateTime<Utc>) {
    let plan = reconcile(SITEMAP, records, listing, now, 2);
    apply(records, &plan);
  }

  fn status_of(records: &[UrlRecord], url: &str) -> UrlStatus {
    records.iter().find(|r| r.url == url).unwrap().status
  }

  #[test]
  fn unseen_urls_are_discovered() {
    let plan = reconcile(SITEMAP, &[], &[entry("https://atlan.com/a", None)], t(1), 2);
    assert_eq!(plan.writes.len(), 1);
    let (change, rec) = &plan.writes[0];
    assert_eq!(*change, UrlChange::Discovered);
    assert_eq!(rec.status, UrlStatus::Discovered);
    assert_eq!(rec.discovery_date, t(1));
    assert_eq!(rec.last_checked, t(1));
    assert_eq!(rec.domain_name, "atlan.com");
  }

  #[test]
  fn newer_modification_activates() {
    let mut records = Vec::new();
    apply(&mut records, &reconcile(SITEMAP, &[], &[entry("https://atlan.com/a", Some(t(1)))], t(1), 2));

    let plan = reconcile(SITEMAP, &records, &[entry("https://atlan.com/a", Some(t(3)))], t(4), 2);
    let (change, rec) = &plan.writes[0];
    assert_eq!(*change, UrlChange::Modified);
    assert_eq!(rec.status, UrlStatus::Active);
    assert_eq!(rec.date_modified, Some(t(3)));
    assert_eq!(rec.last_checked, t(4));
    assert!(change.wants_analysis());
  }

  #[test]
  fn unchanged_only_touches_last_checked() {
    let mut records = Vec::new();
    apply(&mut records, &reconcile(SITEMAP, &[], &[entry("https://atlan.com/a", Some(t(1)))], t(1), 2));
    let before = records[0].clone();

    let plan = reconcile(SITEMAP, &records, &[entry("https://atlan.com/a", Some(t(1)))], t(2), 2);
    let (change, rec) = &plan.writes[0];
    assert_eq!(*change, UrlChange::Unchanged);
    assert_eq!(rec.last_checked, t(2));
    assert_eq!(rec.status, before.status);
    assert_eq!(rec.date_modified, before.date_modified);
    assert!(!change.wants_analysis());
  }

  #[test]
  fn absent_for_grace_runs_is_removed() {
    let mut records = Vec::new();
    let listing = [entry("https://atlan.com/a", None), entry("https://atlan.com/b", None)];
    apply(&mut records, &reconcile(SITEMAP, &[], &listing, t(1), 2));

    let only_a = [entry("https://atlan.com/a", None)];
    step(&mut records, &only_a, t(2));
    assert_eq!(status_of(&records, "https://atlan.com/b"), UrlStatus::Stale);

    step(&mut records, &only_a, t(3));
    assert_eq!(status_of(&records, "https://atlan.com/b"), UrlStatus::Removed);

    // Removed URLs are not counted again.
    let plan = reconcile(SITEMAP, &records, &only_a, t(4), 2);
    assert!(plan.writes.iter().all(|(_, r)| r.url != "https://atlan.com/b"));
  }

  #[test]
  fn reappearing_resets_miss_counter() {
    let mut records = Vec::new();
    let both = [entry("https://atlan.com/a", None), entry("https://atlan.com/b", None)];
    let only_a = [entry("https://atlan.com/a", None)];
    apply(&mut records, &reconcile(SITEMAP, &[], &both, t(1), 2));
    step(&mut records, &only_a, t(2));
    assert_eq!(status_of(&records, "https://atlan.com/b"), UrlStatus::Stale);

    let plan = reconcile(SITEMAP, &records, &both, t(3), 2);
    let (change, rec) = plan.writes.iter().find(|(_, r)| r.url == "https://atlan.com/b").unwrap();
    assert_eq!(*change, UrlChange::Reappeared);
    assert_eq!(rec.missed_runs, 0);
    apply(&mut records, &plan);

    // One more miss is only `stale` again, not `removed`.
    step(&mut records, &only_a, t(4));
    assert_eq!(status_of(&records, "https://atlan.com/b"), UrlStatus::Stale);
  }

  #[test]
  fn urls_of_other_sitemaps_are_not_missed() {
    let mut records = Vec::new();
    apply(&mut records, &reconcile("https://other/sitemap.xml", &[], &[entry("https://other/x", None)], t(1), 2));
    let plan = reconcile(SITEMAP, &records, &[], t(2), 2);
    assert!(plan.writes.is_empty());
  }

  #[test]
  fn modified_before_published_is_normalized() {
    let listing = [SitemapEntry {
      date_published: Some(t(5)),
      date_modified: Some(t(5) - Duration::days(2)),
      ..SitemapEntry::new("https://atlan.com/a")
    }];
    let plan = reconcile(SITEMAP, &[], &listing, t(6), 2);
    assert_eq!(plan.normalized, ["https://atlan.com/a"]);
    assert_eq!(plan.writes[0].1.date_modified, Some(t(5)));
  }

  #[test]
  fn modified_before_stored_published_is_normalized() {
    let first = [SitemapEntry { date_published: Some(t(5)), ..SitemapEntry::new("https://atlan.com/a") }];
    let mut records = Vec::new();
    apply(&mut records, &reconcile(SITEMAP, &[], &first, t(5), 2));

    let later = [entry("https://atlan.com/a", Some(t(3)))];
    let plan = reconcile(SITEMAP, &records, &later, t(6), 2);
    let (change, rec) = &plan.writes[0];
    assert_eq!(*change, UrlChange::Modified);
    assert_eq!(rec.date_published, Some(t(5)));
    assert_eq!(rec.date_modified, Some(t(5)));
    assert_eq!(plan.normalized, ["https://atlan.com/a"]);
  }

  #[test]
  fn duplicates_and_bad_urls() {
    let listing = [
      entry("https://atlan.com/a", Some(t(1))),
      entry("https://atlan.com/a", Some(t(2))),
      entry("not a url", None),
    ];
    let plan = reconcile(SITEMAP, &[], &listing, t(3), 2);
    assert_eq!(plan.writes.len(), 1);
    assert_eq!(plan.writes[0].1.date_modified, Some(t(2)));
    assert_eq!(plan.rejected, ["not a url"]);

    let summary = plan.summarize(SITEMAP, listing.len());
    assert_eq!(summary.discovered, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.analysis_candidates, ["https://atlan.com/a"]);
  }
}
