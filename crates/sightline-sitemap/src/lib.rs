//! Sitemap protocol codec for Sightline.
//!
//! Parses `<urlset>` listings into [`SitemapEntry`] values and
//! `<sitemapindex>` documents into child sitemap URLs. Pure synchronous; the
//! HTTP side lives in the engine.
//!
//! ```no_run
//! use sightline_sitemap::{Sitemap, parse};
//!
//! let xml = br#"<urlset><url><loc>https://atlan.com/</loc></url></urlset>"#;
//! if let Sitemap::UrlSet(entries) = parse(xml).unwrap() {
//!   println!("{} urls", entries.len());
//! }
//! ```

pub mod error;
mod parse;

pub use error::{Error, Result};
pub use parse::parse_lastmod;
use sightline_core::discovery::SitemapEntry;

/// A parsed sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sitemap {
  /// A `<urlset>` listing of pages.
  UrlSet(Vec<SitemapEntry>),
  /// A `<sitemapindex>` pointing at child sitemaps.
  Index(Vec<String>),
}

/// Parse a sitemap or sitemap index.
///
/// Namespace prefixes are ignored. Entries without a `<loc>` are skipped, and
/// an unparseable `<lastmod>` leaves the entry's `date_modified` unset rather
/// than failing the whole listing.
pub fn parse(xml: &[u8]) -> Result<Sitemap> { parse::parse(xml) }
