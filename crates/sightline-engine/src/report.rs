//! Outcome summaries returned by engine cycles.

use serde::Serialize;
use sightline_core::{discovery::ReconcileSummary, schedule::Requeue};

use crate::Error;

/// A single key that failed during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyFailure {
  pub key:   String,
  pub error: String,
}

/// What happened to one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Done,
  /// Nothing to do (already recorded, or analysis is current).
  Skipped,
}

impl From<()> for Outcome {
  fn from((): ()) -> Self { Self::Done }
}

/// Totals for one best-effort cycle.
///
/// `attempted == succeeded + skipped + failures.len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
  pub attempted: usize,
  pub succeeded: usize,
  pub skipped:   usize,
  pub failures:  Vec<KeyFailure>,
}

impl CycleReport {
  pub fn record(&mut self, key: impl Into<String>, outcome: Result<Outcome, Error>) {
    self.attempted += 1;
    match outcome {
      Ok(Outcome::Done) => self.succeeded += 1,
      Ok(Outcome::Skipped) => self.skipped += 1,
      Err(e) => self.failures.push(KeyFailure { key: key.into(), error: e.to_string() }),
    }
  }

  /// Count `n` keys that needed no work.
  pub fn skip(&mut self, n: usize) {
    self.attempted += n;
    self.skipped += n;
  }

  /// Count `key` as attempted and failed without running it.
  pub fn fail(&mut self, key: impl Into<String>, error: &dyn std::fmt::Display) {
    self.attempted += 1;
    self.failures.push(KeyFailure { key: key.into(), error: error.to_string() });
  }

  pub fn is_clean(&self) -> bool { self.failures.is_empty() }
}

/// Result of a discovery cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
  /// Sitemaps moved back to `pending` before selection.
  pub requeued:       Vec<(String, Requeue)>,
  /// Per-sitemap outcomes.
  pub sitemaps:       CycleReport,
  pub summaries:      Vec<ReconcileSummary>,
  /// URLs that entered or updated `discovered`/`active` state and whose
  /// cached analysis is missing or out of date.
  pub analysis_queue: Vec<String>,
  /// Candidates whose cache check failed. They are queued anyway; the
  /// analysis cycle checks again before doing any work.
  pub check_failures: Vec<KeyFailure>,
}

impl DiscoveryReport {
  /// Queue `url` unless its cache check says the analysis is current.
  pub fn admit<E: std::fmt::Display>(&mut self, url: String, check: Result<bool, E>) {
    match check {
      Ok(true) => self.analysis_queue.push(url),
      Ok(false) => {}
      Err(e) => {
        self.check_failures.push(KeyFailure { key: url.clone(), error: e.to_string() });
        self.analysis_queue.push(url);
      }
    }
  }
}
