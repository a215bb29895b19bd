//! LLM-backed page analysis.
//!
//! The page HTML is flattened to text with `html2text`, which also gives the
//! word count. The model is asked for a JSON object with the summary,
//! category and primary keyword. Dates the page declares are read from its
//! markup and returned alongside.

use chrono::Utc;
use serde::Deserialize;
use sightline_core::{
  analysis::{Analysis, PageMetadata},
  provider::{ContentAnalyzer, ProviderError},
};

use super::{OpenRouterClient, metadata::page_metadata};

/// Characters of page text included in the prompt.
const PROMPT_CHARS: usize = 5_000;

pub const CATEGORIES: &[&str] = &[
  "Product Page",
  "Comparison Page",
  "Integration Page",
  "Educational Page",
  "Blog Post",
  "News Article",
  "Documentation",
  "Other",
];

#[derive(Clone)]
pub struct LlmAnalyzer {
  client:  OpenRouterClient,
  model:   String,
  version: u32,
}

impl LlmAnalyzer {
  pub fn new(client: OpenRouterClient, model: impl Into<String>, version: u32) -> Self {
    Self { client, model: model.into(), version }
  }
}

#[derive(Debug, Deserialize)]
struct Reply {
  summary:         String,
  category:        String,
  primary_keyword: String,
}

fn page_text(html: &str) -> String {
  html2text::from_read(html.as_bytes(), 100).unwrap_or_default()
}

/// Whitespace-separated tokens with at least one letter or digit, so the
/// `#`/`*` markers html2text emits are not counted.
fn word_count(text: &str) -> u32 {
  let words = text
    .split_whitespace()
    .filter(|w| w.chars().any(char::is_alphanumeric))
    .count();
  u32::try_from(words).unwrap_or(u32::MAX)
}

fn prompt(url: &str, text: &str) -> String {
  let excerpt: String = text.chars().take(PROMPT_CHARS).collect();
  format!(
    "Analyze this webpage content from {url}.\n\n{excerpt}\n\n\
     Reply with ONLY a JSON object with these keys:\n\
     \"summary\": a concise 2-3 sentence summary of what the page is about,\n\
     \"category\": one of {categories},\n\
     \"primary_keyword\": the single most important keyword or term the page focuses on.",
    categories = CATEGORIES.join(", "),
  )
}

/// Pull the JSON object out of a reply that may be wrapped in prose or a
/// code fence.
fn parse_reply(raw: &str) -> Result<Reply, ProviderError> {
  let start = raw.find('{');
  let end = raw.rfind('}');
  let json = match (start, end) {
    (Some(s), Some(e)) if s < e => &raw[s..=e],
    _ => return Err(ProviderError::Rejected("analysis reply has no JSON object".into())),
  };
  let mut reply: Reply = serde_json::from_str(json)
    .map_err(|e| ProviderError::Rejected(format!("analysis reply: {e}")))?;

  reply.category = CATEGORIES
    .iter()
    .find(|c| c.eq_ignore_ascii_case(reply.category.trim()))
    .map_or("Other", |c| *c)
    .to_owned();
  reply.summary = reply.summary.trim().to_owned();
  reply.primary_keyword = reply.primary_keyword.trim().to_owned();
  Ok(reply)
}

impl ContentAnalyzer for LlmAnalyzer {
  fn version(&self) -> u32 { self.version }

  async fn analyze(&self, url: &str, content: &str) -> Result<Analysis, ProviderError> {
    let text = page_text(content);
    let words = word_count(&text);
    let page = PageMetadata { word_count: Some(words), ..page_metadata(content, Utc::now()) };

    let raw = self.client.complete(&self.model, &prompt(url, &text)).await?;
    let reply = parse_reply(&raw)?;

    Ok(Analysis {
      summary:              reply.summary,
      category:             reply.category,
      primary_keyword:      reply.primary_keyword,
      estimated_word_count: words,
      version:              self.version,
      page,
    })
  }
}
