//! Handlers for `/rankings` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/rankings` | Bucketed report; see [`ReportParams`] |
//! | `GET`  | `/rankings/latest` | `?keyword=&domain=`; 404 if never observed |
//! | `GET`  | `/rankings/history` | `?keyword=&domain=[&from=][&to=]` |
//! | `GET`  | `/rankings/movements` | Same params as history |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sightline_core::{
  keyword::Keyword,
  ranking::{
    KeywordFilter, RankBucket, RankMovement, RankedResult, RankingObservation, RankingQuery,
    movements,
  },
  store::{KeywordRegistry, RankingStore},
};

use crate::error::ApiError;

async fn resolve<S>(store: &S, text: &str) -> Result<Keyword, ApiError>
where
  S: KeywordRegistry,
{
  store
    .resolve_keyword(text)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("keyword {text:?}")))
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
  Exact,
  #[default]
  Substring,
}

#[derive(Debug, Deserialize, Default)]
pub struct ReportParams {
  pub keyword:      Option<String>,
  /// How `keyword` matches; defaults to substring.
  #[serde(rename = "match", default)]
  pub match_mode:   MatchMode,
  pub domain:       Option<String>,
  /// Defaults to the latest date among matching rows.
  pub date:         Option<NaiveDate>,
  pub max_position: Option<u32>,
  pub limit:        Option<usize>,
}

/// `GET /rankings[?keyword=...][&match=exact|substring][&domain=...][&date=...][&max_position=...][&limit=...]`
pub async fn report<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ReportParams>,
) -> Result<Json<Vec<RankedResult>>, ApiError>
where
  S: RankingStore,
{
  let query = RankingQuery {
    keyword:      params.keyword.map(|text| match params.match_mode {
      MatchMode::Exact => KeywordFilter::Exact(text),
      MatchMode::Substring => KeywordFilter::Substring(text),
    }),
    domain:       params.domain,
    date:         params.date,
    max_position: params.max_position,
    limit:        params.limit,
  };

  let rows = store.query_rankings(&query).await.map_err(ApiError::store)?;
  Ok(Json(rows))
}

// ─── Series ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SeriesParams {
  pub keyword: String,
  pub domain:  String,
  /// Defaults to 1970-01-01.
  pub from:    Option<NaiveDate>,
  /// Defaults to today (UTC).
  pub to:      Option<NaiveDate>,
}

/// `GET /rankings/latest?keyword=...&domain=...`
pub async fn latest<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<SeriesParams>,
) -> Result<Json<RankedResult>, ApiError>
where
  S: KeywordRegistry + RankingStore,
{
  let keyword = resolve(store.as_ref(), &params.keyword).await?;
  let obs = store
    .latest_ranking(keyword.keyword_id, &params.domain)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("no ranking for {:?} on {}", keyword.text, params.domain))
    })?;

  Ok(Json(RankedResult {
    keyword_id:   obs.keyword_id,
    keyword:      keyword.text,
    domain:       obs.domain,
    check_date:   obs.check_date,
    position:     obs.position,
    bucket:       RankBucket::classify(obs.position),
    observed_url: obs.observed_url,
  }))
}

async fn series<S>(store: &S, params: &SeriesParams) -> Result<Vec<RankingObservation>, ApiError>
where
  S: KeywordRegistry + RankingStore,
{
  let keyword = resolve(store, &params.keyword).await?;
  store
    .ranking_history(
      keyword.keyword_id,
      &params.domain,
      params.from.unwrap_or_default(),
      params.to.unwrap_or_else(|| Utc::now().date_naive()),
    )
    .await
    .map_err(ApiError::store)
}

/// `GET /rankings/history?keyword=...&domain=...[&from=...][&to=...]`
pub async fn history<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<SeriesParams>,
) -> Result<Json<Vec<RankingObservation>>, ApiError>
where
  S: KeywordRegistry + RankingStore,
{
  Ok(Json(series(store.as_ref(), &params).await?))
}

/// `GET /rankings/movements?keyword=...&domain=...[&from=...][&to=...]`
pub async fn movement<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<SeriesParams>,
) -> Result<Json<Vec<RankMovement>>, ApiError>
where
  S: KeywordRegistry + RankingStore,
{
  let history = series(store.as_ref(), &params).await?;
  Ok(Json(movements(&history)))
}
