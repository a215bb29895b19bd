//! HTTP-backed implementations of the collaborator traits.

mod analyzer;
mod metadata;
mod openrouter;
mod page;
mod serper;
mod sitemap;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use sightline_core::provider::ProviderError;

pub use analyzer::LlmAnalyzer;
pub use openrouter::{OpenRouterClient, OpenRouterModel};
pub use page::HttpPageFetcher;
pub use serper::SerperRankChecker;
pub use sitemap::HttpSitemapFetcher;

/// Build the shared HTTP client.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
  Client::builder()
    .timeout(timeout)
    .user_agent(concat!("sightline/", env!("CARGO_PKG_VERSION")))
    .build()
}

/// Rate limits and server errors are worth retrying; other failures are not.
fn status_error(what: &str, status: StatusCode) -> ProviderError {
  let message = format!("{what} → {status}");
  if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
    ProviderError::Unavailable(message)
  } else {
    ProviderError::Rejected(message)
  }
}

fn transport_error(what: &str, err: reqwest::Error) -> ProviderError {
  let message = format!("{what}: {err}");
  if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
    ProviderError::Unavailable(message)
  } else {
    ProviderError::Rejected(message)
  }
}

/// Send `req` and return the response if its status is a success.
async fn send(what: &str, req: reqwest::RequestBuilder) -> Result<reqwest::Response, ProviderError> {
  let resp = req.send().await.map_err(|e| transport_error(what, e))?;
  if !resp.status().is_success() {
    return Err(status_error(what, resp.status()));
  }
  Ok(resp)
}
