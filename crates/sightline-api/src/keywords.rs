//! Handlers for `/keywords` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/keywords` | Ordered by text |
//! | `POST` | `/keywords` | Body: `{"text":"data catalog"}`; idempotent |

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use sightline_core::{keyword::Keyword, store::KeywordRegistry};

use crate::error::ApiError;

/// `GET /keywords`
pub async fn list<S>(State(store): State<Arc<S>>) -> Result<Json<Vec<Keyword>>, ApiError>
where
  S: KeywordRegistry,
{
  let keywords = store.list_keywords().await.map_err(ApiError::store)?;
  Ok(Json(keywords))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub text: String,
}

/// `POST /keywords` with body `{"text":"data catalog"}`
///
/// Registering an existing keyword returns the original record.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: KeywordRegistry,
{
  let keyword = store
    .register_keyword(&body.text)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(keyword)))
}
