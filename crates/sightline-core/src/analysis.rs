//! Content analysis cache.
//!
//! A URL's analysis (summary, category, primary keyword, word count) is
//! expensive to produce, so it is cached alongside the URL record and only
//! recomputed when the page changed after the last analysis or the analysis
//! logic itself moved to a newer version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::discovery::UrlRecord;

/// Output of a [`ContentAnalyzer`](crate::provider::ContentAnalyzer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
  pub summary:              String,
  pub category:             String,
  pub primary_keyword:      String,
  pub estimated_word_count: u32,
  pub version:              u32,
  /// Metadata read from the page, written back to its URL record.
  #[serde(default)]
  pub page:                 PageMetadata,
}

/// Dates and length a page declares about itself (JSON-LD, `<meta>` tags,
/// text length).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
  pub word_count:     Option<u32>,
  pub date_published: Option<DateTime<Utc>>,
  pub date_modified:  Option<DateTime<Utc>>,
}

impl PageMetadata {
  /// Overlay the known fields onto `record`, keeping `date_modified` at or
  /// after `date_published`. Returns whether `date_modified` had to be
  /// raised.
  pub fn apply_to(&self, record: &mut UrlRecord) -> bool {
    record.word_count = self.word_count.or(record.word_count);
    record.date_published = self.date_published.or(record.date_published);
    record.date_modified = self.date_modified.or(record.date_modified);
    record.normalize_dates()
  }
}

/// Input to [`AnalysisCache::store_analysis`](crate::store::AnalysisCache::store_analysis).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAnalysis {
  pub url:      String,
  pub analysis: Analysis,
}

/// A cached analysis. One per URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlAnalysis {
  pub url:                  String,
  pub summary:              String,
  pub category:             String,
  pub primary_keyword:      String,
  pub estimated_word_count: u32,
  pub analysis_version:     u32,
  pub last_analyzed:        DateTime<Utc>,
}

/// Whether `record` must be (re-)analyzed under `current_version`.
///
/// True when there is no cached analysis, when the page's `date_modified`
/// advanced past `last_analyzed`, or when the cached analysis was produced by
/// an older version of the analysis logic.
pub fn needs_analysis(
  record: &UrlRecord,
  analysis: Option<&UrlAnalysis>,
  current_version: u32,
) -> bool {
  let Some(analysis) = analysis else {
    return true;
  };
  if analysis.analysis_version < current_version {
    return true;
  }
  record
    .date_modified
    .is_some_and(|modified| modified > analysis.last_analyzed)
}
