//! Rank checks through the Serper Google search API.

use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sightline_core::{
  discovery::domain_of,
  provider::{ProviderError, RankCheck, RankChecker},
  ranking::{Position, normalize_domain},
};

use super::send;

const ENDPOINT: &str = "https://google.serper.dev/search";

#[derive(Clone)]
pub struct SerperRankChecker {
  client:   Client,
  api_key:  String,
  endpoint: String,
  /// Organic results requested per query.
  depth:    u32,
}

impl SerperRankChecker {
  pub fn new(client: Client, api_key: impl Into<String>) -> Self {
    Self { client, api_key: api_key.into(), endpoint: ENDPOINT.to_owned(), depth: 100 }
  }

  pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
    self.endpoint = endpoint.into();
    self
  }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
  #[serde(default)]
  organic: Vec<Organic>,
}

#[derive(Debug, Deserialize)]
struct Organic {
  link:     String,
  position: Option<i64>,
}

/// First organic result served from `domain` or one of its subdomains.
fn find_rank(results: &[Organic], domain: &str) -> Result<RankCheck, ProviderError> {
  let domain = normalize_domain(domain);
  let suffix = format!(".{domain}");

  for (idx, result) in results.iter().enumerate() {
    let Ok(host) = domain_of(&result.link) else {
      continue;
    };
    if host == domain || host.ends_with(&suffix) {
      let raw = result.position.unwrap_or(idx as i64 + 1);
      let position = Position::ranked(raw).map_err(|e| ProviderError::Rejected(e.to_string()))?;
      return Ok(RankCheck { position, url: Some(result.link.clone()) });
    }
  }
  Ok(RankCheck { position: Position::Unranked, url: None })
}

impl RankChecker for SerperRankChecker {
  // Serper only serves live results, so the check date is not sent.
  async fn check(
    &self,
    keyword: &str,
    domain: &str,
    _date: NaiveDate,
  ) -> Result<RankCheck, ProviderError> {
    let req = self
      .client
      .post(&self.endpoint)
      .header("X-API-KEY", &self.api_key)
      .json(&json!({ "q": keyword, "num": self.depth }));

    let body: SearchResponse = send("serper search", req)
      .await?
      .json()
      .await
      .map_err(|e| ProviderError::Rejected(format!("serper reply: {e}")))?;

    find_rank(&body.organic, domain)
  }
}
