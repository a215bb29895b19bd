//! Sitemap download over HTTP.

use reqwest::Client;
use sightline_core::{
  discovery::SitemapEntry,
  provider::{ProviderError, SitemapFetcher},
};
use sightline_sitemap::Sitemap;
use tracing::{debug, warn};

use super::send;

/// Fetches a sitemap, following one level of `<sitemapindex>`.
#[derive(Clone)]
pub struct HttpSitemapFetcher {
  client: Client,
}

impl HttpSitemapFetcher {
  pub fn new(client: Client) -> Self { Self { client } }

  async fn download(&self, url: &str) -> Result<Sitemap, ProviderError> {
    let bytes = send(url, self.client.get(url))
      .await?
      .bytes()
      .await
      .map_err(|e| ProviderError::Unavailable(format!("{url}: {e}")))?;
    sightline_sitemap::parse(&bytes).map_err(|e| ProviderError::Rejected(format!("{url}: {e}")))
  }
}

impl SitemapFetcher for HttpSitemapFetcher {
  async fn fetch(&self, sitemap_url: &str) -> Result<Vec<SitemapEntry>, ProviderError> {
    let children = match self.download(sitemap_url).await? {
      Sitemap::UrlSet(entries) => return Ok(entries),
      Sitemap::Index(children) => children,
    };

    debug!(sitemap = sitemap_url, children = children.len(), "following sitemap index");
    let mut entries = Vec::new();
    for child in children {
      match self.download(&child).await? {
        Sitemap::UrlSet(found) => entries.extend(found),
        Sitemap::Index(_) => warn!(sitemap = %child, "nested sitemap index ignored"),
      }
    }
    Ok(entries)
  }
}
