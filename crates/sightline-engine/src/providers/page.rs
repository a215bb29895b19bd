use reqwest::Client;
use sightline_core::provider::{PageFetcher, ProviderError};

use super::send;

/// Downloads raw page HTML.
#[derive(Clone)]
pub struct HttpPageFetcher {
  client: Client,
}

impl HttpPageFetcher {
  pub fn new(client: Client) -> Self { Self { client } }
}

impl PageFetcher for HttpPageFetcher {
  async fn fetch_page(&self, url: &str) -> Result<String, ProviderError> {
    send(url, self.client.get(url))
      .await?
      .text()
      .await
      .map_err(|e| ProviderError::Unavailable(format!("{url}: {e}")))
  }
}
