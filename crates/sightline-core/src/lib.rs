//! Core types and trait definitions for the Sightline visibility tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement the traits in [`store`]; external
//! collaborators (rank checkers, LLMs, sitemap fetchers, analyzers) implement
//! the traits in [`provider`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod analysis;
pub mod discovery;
pub mod error;
pub mod keyword;
pub mod mention;
pub mod provider;
pub mod ranking;
pub mod schedule;
pub mod store;

pub use error::{Error, Result};
