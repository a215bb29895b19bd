//! Ingestion engine for Sightline.
//!
//! [`Engine`] drives ranking, mention, discovery and analysis cycles against a
//! [`VisibilityStore`](sightline_core::store::VisibilityStore). The
//! [`providers`] module holds the HTTP-backed collaborators the `sightline`
//! binary wires in.

pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod providers;
pub mod report;
pub mod retry;

pub use config::EngineConfig;
pub use engine::{Engine, EngineOptions};
pub use error::{Error, Result};
pub use report::{CycleReport, DiscoveryReport};
pub use retry::RetryPolicy;

#[cfg(test)]
mod tests;
