//! Handlers for `/sitemaps` and `/urls` endpoints.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use sightline_core::{
  analysis::UrlAnalysis,
  discovery::{SitemapRecord, UrlQuery, UrlRecord, UrlStats, UrlStatus},
  store::{AnalysisCache, UrlTracker},
};

use crate::error::ApiError;

/// `GET /sitemaps`
pub async fn sitemaps<S>(State(store): State<Arc<S>>) -> Result<Json<Vec<SitemapRecord>>, ApiError>
where
  S: UrlTracker,
{
  Ok(Json(store.list_sitemaps().await.map_err(ApiError::store)?))
}

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub sitemap: Option<String>,
  pub domain:  Option<String>,
  pub status:  Option<UrlStatus>,
  pub limit:   Option<usize>,
}

/// `GET /urls[?sitemap=...][&domain=...][&status=...][&limit=...]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<UrlRecord>>, ApiError>
where
  S: UrlTracker,
{
  let query = UrlQuery {
    sitemap_url: params.sitemap,
    domain:      params.domain,
    status:      params.status,
    limit:       params.limit,
  };
  Ok(Json(store.list_urls(&query).await.map_err(ApiError::store)?))
}

/// `GET /urls/stats`
pub async fn stats<S>(State(store): State<Arc<S>>) -> Result<Json<UrlStats>, ApiError>
where
  S: UrlTracker,
{
  Ok(Json(store.url_stats().await.map_err(ApiError::store)?))
}

#[derive(Debug, Deserialize)]
pub struct AnalysisParams {
  pub url: String,
}

/// `GET /urls/analysis?url=...`, 404 if the URL has not been analyzed.
pub async fn analysis<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<AnalysisParams>,
) -> Result<Json<UrlAnalysis>, ApiError>
where
  S: AnalysisCache,
{
  store
    .get_analysis(&params.url)
    .await
    .map_err(ApiError::store)?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("no analysis for {}", params.url)))
}
