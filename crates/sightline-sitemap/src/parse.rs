//! Streaming sitemap parser built on `quick-xml`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use quick_xml::events::Event;
use sightline_core::discovery::SitemapEntry;

use crate::{Error, Result, Sitemap};

#[derive(Debug, Clone, Copy)]
enum Root {
  UrlSet,
  Index,
}

impl Root {
  fn from_local(local: &[u8]) -> Result<Self> {
    match local {
      b"urlset" => Ok(Self::UrlSet),
      b"sitemapindex" => Ok(Self::Index),
      other => Err(Error::UnknownRoot(String::from_utf8_lossy(other).into_owned())),
    }
  }
}

/// Child elements of `<url>` / `<sitemap>` that carry data.
#[derive(Debug, Clone, Copy)]
enum Field {
  Loc,
  LastMod,
  /// `<news:publication_date>` from Google News sitemaps.
  PublicationDate,
}

impl Field {
  /// The field an element at `depth` inside an item carries, if any.
  ///
  /// `loc` and `lastmod` count only as direct children of the item, so
  /// `<image:loc>` is ignored. `publication_date` sits inside `<news:news>`.
  fn at(local: &[u8], depth: usize) -> Option<Self> {
    match local {
      b"loc" if depth == 3 => Some(Self::Loc),
      b"lastmod" if depth == 3 => Some(Self::LastMod),
      b"publication_date" => Some(Self::PublicationDate),
      _ => None,
    }
  }
}

#[derive(Debug, Default)]
struct Item {
  loc:       String,
  lastmod:   String,
  published: String,
}

impl Item {
  fn push(&mut self, field: Field, text: &str) {
    let slot = match field {
      Field::Loc => &mut self.loc,
      Field::LastMod => &mut self.lastmod,
      Field::PublicationDate => &mut self.published,
    };
    slot.push_str(text.trim());
  }
}

fn optional_date(s: &str) -> Option<DateTime<Utc>> {
  if s.is_empty() { None } else { parse_lastmod(s).ok() }
}

pub fn parse(xml: &[u8]) -> Result<Sitemap> {
  let mut reader = quick_xml::Reader::from_reader(xml);
  reader.config_mut().trim_text(true);

  let mut root: Option<Root> = None;
  // Depth 1 is the root, 2 an item, 3 and below an item's fields.
  let mut depth = 0usize;
  let mut item: Option<Item> = None;
  let mut field: Option<(Field, usize)> = None;
  let mut entries: Vec<SitemapEntry> = Vec::new();
  let mut children: Vec<String> = Vec::new();
  let mut buf = Vec::new();

  loop {
    match reader.read_event_into(&mut buf) {
      Ok(Event::Start(ref e)) => {
        depth += 1;
        let name_buf = e.name();
        let local = local_name(name_buf.as_ref());
        match depth {
          1 => root = Some(Root::from_local(local)?),
          2 if matches!(local, b"url" | b"sitemap") => item = Some(Item::default()),
          d if d >= 3 && item.is_some() && field.is_none() => {
            field = Field::at(local, d).map(|f| (f, d));
          }
          _ => {}
        }
      }
      Ok(Event::Empty(ref e)) if depth == 0 => {
        let name_buf = e.name();
        root = Some(Root::from_local(local_name(name_buf.as_ref()))?);
      }
      Ok(Event::Text(ref e)) => {
        if let (Some((f, _)), Some(it)) = (field, item.as_mut()) {
          let text = e.unescape().map_err(|e| Error::Xml(e.to_string()))?;
          it.push(f, &text);
        }
      }
      Ok(Event::CData(e)) => {
        if let (Some((f, _)), Some(it)) = (field, item.as_mut()) {
          it.push(f, &String::from_utf8_lossy(&e.into_inner()));
        }
      }
      Ok(Event::End(_)) => {
        match depth {
          d if field.is_some_and(|(_, at)| at == d) => field = None,
          2 => {
            if let Some(it) = item.take()
              && !it.loc.is_empty()
            {
              match root {
                Some(Root::UrlSet) => entries.push(SitemapEntry {
                  url:            it.loc,
                  date_published: optional_date(&it.published),
                  date_modified:  optional_date(&it.lastmod),
                  word_count:     None,
                }),
                Some(Root::Index) => children.push(it.loc),
                None => {}
              }
            }
          }
          _ => {}
        }
        depth = depth.saturating_sub(1);
      }
      Ok(Event::Eof) => break,
      Err(e) => return Err(Error::Xml(e.to_string())),
      _ => {}
    }
    buf.clear();
  }

  match root {
    Some(Root::UrlSet) => Ok(Sitemap::UrlSet(entries)),
    Some(Root::Index) => Ok(Sitemap::Index(children)),
    None => Err(Error::MissingRoot),
  }
}

fn local_name(name: &[u8]) -> &[u8] {
  // strip "prefix:" if present
  match name.iter().rposition(|&b| b == b':') {
    Some(pos) => &name[pos + 1..],
    None => name,
  }
}

/// Parse a W3C datetime as used by `<lastmod>`.
///
/// Accepts full RFC 3339 timestamps, minute precision with an offset, naive
/// timestamps (taken as UTC), and the reduced `YYYY-MM-DD`, `YYYY-MM` and
/// `YYYY` forms (taken as midnight UTC on the first day of the period).
pub fn parse_lastmod(s: &str) -> Result<DateTime<Utc>> {
  let s = s.trim();

  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M%:z") {
    return Ok(dt.with_timezone(&Utc));
  }
  if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
    return Ok(dt.and_utc());
  }

  let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .or_else(|_| NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d"))
    .or_else(|_| NaiveDate::parse_from_str(&format!("{s}-01-01"), "%Y-%m-%d"))
    .map_err(|_| Error::InvalidDate(s.to_owned()))?;
  Ok(date.and_time(NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn urlset(xml: &str) -> Vec<SitemapEntry> {
    match parse(xml.as_bytes()).unwrap() {
      Sitemap::UrlSet(entries) => entries,
      other => panic!("expected urlset, got {other:?}"),
    }
  }

  #[test]
  fn parses_urlset_with_lastmod() {
    let entries = urlset(
      r#"<?xml version="1.0" encoding="UTF-8"?>
      <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
        <url>
          <loc>https://atlan.com/data-catalog/</loc>
          <lastmod>2024-03-05T10:30:00+00:00</lastmod>
        </url>
        <url><loc> https://atlan.com/about/ </loc></url>
      </urlset>"#,
    );

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].url, "https://atlan.com/data-catalog/");
    assert_eq!(
      entries[0].date_modified,
      Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap())
    );
    assert_eq!(entries[1].url, "https://atlan.com/about/");
    assert_eq!(entries[1].date_modified, None);
  }

  #[test]
  fn parses_sitemap_index() {
    let doc = parse(
      br#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
        <sitemap><loc>https://atlan.com/post-sitemap.xml</loc><lastmod>2024-01-01</lastmod></sitemap>
        <sitemap><loc>https://atlan.com/page-sitemap.xml</loc></sitemap>
      </sitemapindex>"#,
    )
    .unwrap();

    assert_eq!(
      doc,
      Sitemap::Index(vec![
        "https://atlan.com/post-sitemap.xml".into(),
        "https://atlan.com/page-sitemap.xml".into(),
      ])
    );
  }

  #[test]
  fn image_loc_does_not_replace_page_loc() {
    let entries = urlset(
      r#"<urlset xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
        <url>
          <loc>https://atlan.com/blog/</loc>
          <image:image><image:loc>https://atlan.com/hero.png</image:loc></image:image>
        </url>
      </urlset>"#,
    );
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].url, "https://atlan.com/blog/");
  }

  #[test]
  fn news_publication_date_is_captured() {
    let entries = urlset(
      r#"<urlset xmlns:news="http://www.google.com/schemas/sitemap-news/0.9">
        <url>
          <loc>https://atlan.com/news/launch</loc>
          <news:news><news:publication_date>2024-02-01</news:publication_date></news:news>
        </url>
        <url>
          <loc>https://atlan.com/news/direct</loc>
          <news:publication_date>2024-02-02</news:publication_date>
        </url>
      </urlset>"#,
    );
    assert_eq!(
      entries[0].date_published,
      Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(
      entries[1].date_published,
      Some(Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap())
    );
  }

  #[test]
  fn nested_news_metadata_does_not_leak_into_loc() {
    let entries = urlset(
      r#"<urlset>
        <url>
          <loc>https://atlan.com/news/n</loc>
          <news:news>
            <news:publication><news:name>Atlan</news:name></news:publication>
            <news:publication_date>2024-02-01T09:00:00Z</news:publication_date>
            <news:title>Launch</news:title>
          </news:news>
          <image:image><image:loc>https://atlan.com/n.png</image:loc></image:image>
        </url>
      </urlset>"#,
    );
    assert_eq!(entries[0].url, "https://atlan.com/news/n");
    assert_eq!(
      entries[0].date_published,
      Some(Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap())
    );
    assert_eq!(entries[0].date_modified, None);
  }

  #[test]
  fn escaped_and_cdata_locations() {
    let entries = urlset(
      r#"<urlset>
        <url><loc>https://atlan.com/?a=1&amp;b=2</loc></url>
        <url><loc><![CDATA[https://atlan.com/cdata]]></loc></url>
      </urlset>"#,
    );
    assert_eq!(entries[0].url, "https://atlan.com/?a=1&b=2");
    assert_eq!(entries[1].url, "https://atlan.com/cdata");
  }

  #[test]
  fn entries_without_loc_and_bad_dates_are_tolerated() {
    let entries = urlset(
      r#"<urlset>
        <url><lastmod>2024-01-01</lastmod></url>
        <url><loc>https://atlan.com/x</loc><lastmod>last tuesday</lastmod></url>
      </urlset>"#,
    );
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].date_modified, None);
  }

  #[test]
  fn empty_urlset() {
    assert_eq!(parse(b"<urlset/>").unwrap(), Sitemap::UrlSet(vec![]));
  }

  #[test]
  fn rejects_unknown_root_and_empty_input() {
    assert!(matches!(parse(b"<html><body/></html>"), Err(Error::UnknownRoot(r)) if r == "html"));
    assert!(matches!(parse(b""), Err(Error::MissingRoot)));
  }

  #[test]
  fn lastmod_formats() {
    let midnight = |y, m, d| Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap();
    assert_eq!(parse_lastmod("2024-06-09").unwrap(), midnight(2024, 6, 9));
    assert_eq!(parse_lastmod("2024-06").unwrap(), midnight(2024, 6, 1));
    assert_eq!(parse_lastmod("2024").unwrap(), midnight(2024, 1, 1));
    assert_eq!(
      parse_lastmod("2024-06-09T12:00+02:00").unwrap(),
      Utc.with_ymd_and_hms(2024, 6, 9, 10, 0, 0).unwrap()
    );
    assert_eq!(
      parse_lastmod("2024-06-09T12:00:00").unwrap(),
      Utc.with_ymd_and_hms(2024, 6, 9, 12, 0, 0).unwrap()
    );
    assert!(matches!(parse_lastmod("June 9th"), Err(Error::InvalidDate(_))));
  }
}
