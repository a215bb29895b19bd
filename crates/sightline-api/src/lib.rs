//! Read-only JSON analytics API for Sightline.
//!
//! Exposes an axum [`Router`] backed by any
//! [`VisibilityStore`](sightline_core::store::VisibilityStore). The only write
//! is keyword registration; observations are ingested by the engine.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", sightline_api::api_router(store.clone()))
//! ```

pub mod error;
pub mod keywords;
pub mod mentions;
pub mod rankings;
pub mod urls;

use std::sync::Arc;

use axum::{Router, routing::get};
use sightline_core::store::VisibilityStore;

pub use error::ApiError;

/// Build the analytics router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: VisibilityStore + 'static,
{
  Router::new()
    // Keywords
    .route("/keywords", get(keywords::list::<S>).post(keywords::create::<S>))
    // Rankings
    .route("/rankings", get(rankings::report::<S>))
    .route("/rankings/latest", get(rankings::latest::<S>))
    .route("/rankings/history", get(rankings::history::<S>))
    .route("/rankings/movements", get(rankings::movement::<S>))
    // Mentions
    .route("/mentions", get(mentions::list::<S>))
    .route("/mentions/rate", get(mentions::rate::<S>))
    .route("/mentions/wide", get(mentions::wide::<S>))
    .route("/mentions/daily", get(mentions::daily::<S>))
    .route("/mentions/competitors", get(mentions::competitors::<S>))
    // Discovery
    .route("/sitemaps", get(urls::sitemaps::<S>))
    .route("/urls", get(urls::list::<S>))
    .route("/urls/stats", get(urls::stats::<S>))
    .route("/urls/analysis", get(urls::analysis::<S>))
    .with_state(store)
}
