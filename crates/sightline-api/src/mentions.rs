//! Handlers for `/mentions` endpoints.
//!
//! All endpoints accept the same optional filters, `keyword`, `model`, `from`
//! and `to`. Wide, daily and competitor views are projections computed from
//! the normalized rows at read time.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sightline_core::{
  mention::{
    CompetitorMentions, DailyMentionRates, MentionObservation, MentionQuery, MentionRate,
    WideMentionRow, competitor_mentions, daily_mention_rates, wide_rows,
  },
  store::MentionStore,
};

use crate::error::ApiError;

#[derive(Debug, Deserialize, Default)]
pub struct MentionParams {
  pub keyword:   Option<String>,
  pub model:     Option<String>,
  pub from:      Option<NaiveDate>,
  pub to:        Option<NaiveDate>,
  /// Comma-separated company names; used by `/mentions/competitors` only.
  pub companies: Option<String>,
}

impl MentionParams {
  fn query(&self) -> MentionQuery {
    MentionQuery {
      keyword:    self.keyword.clone(),
      model_name: self.model.clone(),
      from:       self.from,
      to:         self.to,
    }
  }
}

async fn rows<S>(store: &S, params: &MentionParams) -> Result<Vec<MentionObservation>, ApiError>
where
  S: MentionStore,
{
  store.list_mentions(&params.query()).await.map_err(ApiError::store)
}

/// `GET /mentions`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<MentionParams>,
) -> Result<Json<Vec<MentionObservation>>, ApiError>
where
  S: MentionStore,
{
  Ok(Json(rows(store.as_ref(), &params).await?))
}

/// `GET /mentions/rate?keyword=...&model=...[&from=...][&to=...]`
///
/// 422 when no observation falls in the range.
pub async fn rate<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<MentionParams>,
) -> Result<Json<MentionRate>, ApiError>
where
  S: MentionStore,
{
  let (Some(keyword), Some(model)) = (params.keyword.as_deref(), params.model.as_deref()) else {
    return Err(ApiError::BadRequest("`keyword` and `model` are required".into()));
  };
  let rate = store
    .mention_rate(
      keyword,
      model,
      params.from.unwrap_or_default(),
      params.to.unwrap_or_else(|| Utc::now().date_naive()),
    )
    .await
    .map_err(ApiError::store)?;
  Ok(Json(rate))
}

/// `GET /mentions/wide`: one row per keyword and date, one column pair per model.
pub async fn wide<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<MentionParams>,
) -> Result<Json<Vec<WideMentionRow>>, ApiError>
where
  S: MentionStore,
{
  Ok(Json(wide_rows(&rows(store.as_ref(), &params).await?)))
}

/// `GET /mentions/daily`: per-date mention percentage by model, newest first.
pub async fn daily<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<MentionParams>,
) -> Result<Json<Vec<DailyMentionRates>>, ApiError>
where
  S: MentionStore,
{
  Ok(Json(daily_mention_rates(&rows(store.as_ref(), &params).await?)))
}

/// `GET /mentions/competitors?companies=Atlan,Alation,Collibra`
pub async fn competitors<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<MentionParams>,
) -> Result<Json<Vec<CompetitorMentions>>, ApiError>
where
  S: MentionStore,
{
  let companies: Vec<String> = params
    .companies
    .as_deref()
    .unwrap_or_default()
    .split(',')
    .map(str::trim)
    .filter(|c| !c.is_empty())
    .map(str::to_owned)
    .collect();
  if companies.is_empty() {
    return Err(ApiError::BadRequest("`companies` is required".into()));
  }

  let observations = rows(store.as_ref(), &params).await?;
  Ok(Json(competitor_mentions(&observations, &companies)))
}
