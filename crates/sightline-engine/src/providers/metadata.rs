//! Dates a page declares about itself.
//!
//! JSON-LD `datePublished`/`dateModified` win; `<meta>` tags fill whatever
//! JSON-LD left out.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use sightline_core::analysis::PageMetadata;
use sightline_sitemap::parse_lastmod;

static JSON_LD: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"(?si)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
    .expect("static regex")
});

static META: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)<meta\b[^>]*>").expect("static regex"));

static ATTR: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"(?i)([a-z_:.-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("static regex")
});

const PUBLISHED_META: &[&str] = &[
  "article:published_time",
  "og:published_time",
  "published_time",
  "publication-date",
  "article:published",
  "date",
];

const MODIFIED_META: &[&str] = &[
  "article:modified_time",
  "og:modified_time",
  "modified_time",
  "last-modified",
];

/// Dates found in `html`. `word_count` is left to the caller.
///
/// Dates in the future are dropped.
pub fn page_metadata(html: &str, now: DateTime<Utc>) -> PageMetadata {
  let (mut published, mut modified) = json_ld_dates(html);
  if published.is_none() || modified.is_none() {
    let tags = meta_tags(html);
    published = published.or_else(|| first_meta(&tags, PUBLISHED_META));
    modified = modified.or_else(|| first_meta(&tags, MODIFIED_META));
  }

  PageMetadata {
    word_count:     None,
    date_published: published.filter(|d| *d <= now),
    date_modified:  modified.filter(|d| *d <= now),
  }
}

fn page_date(s: &str) -> Option<DateTime<Utc>> {
  let s = s.trim();
  parse_lastmod(s).ok().or_else(|| {
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z")
      .ok()
      .map(|d| d.with_timezone(&Utc))
  })
}

fn json_ld_dates(html: &str) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
  for cap in JSON_LD.captures_iter(html) {
    let Ok(value) = serde_json::from_str::<Value>(&cap[1]) else {
      continue;
    };
    let dates = ld_node_dates(&value);
    if dates.0.is_some() || dates.1.is_some() {
      return dates;
    }
  }
  (None, None)
}

/// First node carrying either date: the value itself, array items, then
/// `@graph` members.
fn ld_node_dates(value: &Value) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
  match value {
    Value::Array(items) => items
      .iter()
      .map(ld_node_dates)
      .find(|d| d.0.is_some() || d.1.is_some())
      .unwrap_or((None, None)),
    Value::Object(map) => {
      let date = |key: &str| map.get(key).and_then(Value::as_str).and_then(page_date);
      let own = (date("datePublished"), date("dateModified"));
      if own.0.is_some() || own.1.is_some() {
        return own;
      }
      map.get("@graph").map_or((None, None), ld_node_dates)
    }
    _ => (None, None),
  }
}

/// `(name or property, content)` of every `<meta>` tag, key lower-cased.
fn meta_tags(html: &str) -> Vec<(String, String)> {
  META
    .find_iter(html)
    .filter_map(|tag| {
      let mut key = None;
      let mut content = None;
      for attr in ATTR.captures_iter(tag.as_str()) {
        let value = attr.get(2).or_else(|| attr.get(3)).map_or("", |m| m.as_str());
        match attr[1].to_ascii_lowercase().as_str() {
          "name" | "property" => key = Some(value.to_ascii_lowercase()),
          "content" => content = Some(value.to_owned()),
          _ => {}
        }
      }
      Some((key?, content?))
    })
    .collect()
}

fn first_meta(tags: &[(String, String)], names: &[&str]) -> Option<DateTime<Utc>> {
  names.iter().find_map(|name| {
    tags
      .iter()
      .filter(|(key, _)| key == name)
      .find_map(|(_, content)| page_date(content))
  })
}
