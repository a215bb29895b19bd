//! Engine configuration.
//!
//! Loaded by the binary from an optional TOML file layered with `SIGHTLINE_*`
//! environment variables. Every field has a default so a partial file (or
//! none at all) still deserializes.

use std::{path::PathBuf, time::Duration};

use chrono::TimeDelta;
use serde::Deserialize;
use sightline_core::schedule::SitemapSchedule;

use crate::engine::EngineOptions;

/// One AI model to query in mention cycles.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelConfig {
  /// Provider-side identifier, e.g. `openai/gpt-4o-mini`.
  pub id:   String,
  /// Display name observations are recorded under.
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  pub attempts:      u32,
  pub base_delay_ms: u64,
  pub timeout_secs:  u64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self { attempts: 3, base_delay_ms: 2_000, timeout_secs: 30 }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub store_path:                PathBuf,
  pub host:                      String,
  pub port:                      u16,
  /// Brand whose visibility is tracked; drives the `mentioned` flag.
  pub brand:                     String,
  pub competitors:               Vec<String>,
  pub domains:                   Vec<String>,
  pub keywords:                  Vec<String>,
  pub sitemaps:                  Vec<String>,
  pub models:                    Vec<ModelConfig>,
  pub serper_api_key:            String,
  pub openrouter_api_key:        String,
  /// Model used by the content analyzer.
  pub analysis_model:            String,
  pub analysis_version:          u32,
  pub removal_grace_runs:        u32,
  pub sitemap_min_interval_secs: u64,
  pub failure_backoff_secs:      u64,
  pub stuck_after_secs:          u64,
  pub cycle_interval_secs:       u64,
  pub concurrency:               usize,
  /// Skip keys already recorded for the cycle's date.
  pub resume:                    bool,
  pub retry:                     RetryConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      store_path:                PathBuf::from("sightline.db"),
      host:                      "127.0.0.1".to_owned(),
      port:                      8080,
      brand:                     String::new(),
      competitors:               Vec::new(),
      domains:                   Vec::new(),
      keywords:                  Vec::new(),
      sitemaps:                  Vec::new(),
      models:                    Vec::new(),
      serper_api_key:            String::new(),
      openrouter_api_key:        String::new(),
      analysis_model:            "google/gemini-flash-1.5".to_owned(),
      analysis_version:          1,
      removal_grace_runs:        2,
      sitemap_min_interval_secs: 24 * 60 * 60,
      failure_backoff_secs:      15 * 60,
      stuck_after_secs:          2 * 60 * 60,
      cycle_interval_secs:       24 * 60 * 60,
      concurrency:               4,
      resume:                    false,
      retry:                     RetryConfig::default(),
    }
  }
}

fn secs(n: u64) -> TimeDelta {
  TimeDelta::from_std(Duration::from_secs(n)).unwrap_or(TimeDelta::MAX)
}

impl EngineConfig {
  pub fn schedule(&self) -> SitemapSchedule {
    SitemapSchedule {
      min_interval:    secs(self.sitemap_min_interval_secs),
      failure_backoff: secs(self.failure_backoff_secs),
      stuck_after:     secs(self.stuck_after_secs),
    }
  }

  pub fn engine_options(&self) -> EngineOptions {
    EngineOptions {
      concurrency:        self.concurrency.max(1),
      removal_grace_runs: self.removal_grace_runs,
      schedule:           self.schedule(),
      analysis_version:   self.analysis_version,
      resume:             self.resume,
    }
  }

  pub fn cycle_interval(&self) -> Duration { Duration::from_secs(self.cycle_interval_secs.max(1)) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_config_keeps_defaults() {
    let cfg: EngineConfig = serde_json::from_value(serde_json::json!({
      "brand": "Atlan",
      "models": [{ "id": "openai/gpt-4o-mini", "name": "GPT-4o mini" }],
      "retry": { "attempts": 5 }
    }))
    .unwrap();

    assert_eq!(cfg.brand, "Atlan");
    assert_eq!(cfg.models[0].name, "GPT-4o mini");
    assert_eq!(cfg.retry.attempts, 5);
    assert_eq!(cfg.retry.base_delay_ms, 2_000);
    assert_eq!(cfg.removal_grace_runs, 2);
    assert_eq!(cfg.schedule(), SitemapSchedule::default());
  }

  #[test]
  fn concurrency_is_at_least_one() {
    let cfg = EngineConfig { concurrency: 0, ..Default::default() };
    assert_eq!(cfg.engine_options().concurrency, 1);
  }
}
