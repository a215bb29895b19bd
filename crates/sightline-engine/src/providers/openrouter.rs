//! Chat completions through OpenRouter.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sightline_core::provider::{LlmProvider, ProviderError};

use super::send;

const ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Minimal OpenRouter chat client shared by models and the analyzer.
#[derive(Clone)]
pub struct OpenRouterClient {
  client:   Client,
  api_key:  String,
  endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  #[serde(default)]
  choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
  message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
  #[serde(default)]
  content: Option<String>,
}

impl OpenRouterClient {
  pub fn new(client: Client, api_key: impl Into<String>) -> Self {
    Self { client, api_key: api_key.into(), endpoint: ENDPOINT.to_owned() }
  }

  pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
    self.endpoint = endpoint.into();
    self
  }

  /// Send a single user message to `model` and return the reply text.
  pub async fn complete(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
    let req = self
      .client
      .post(&self.endpoint)
      .bearer_auth(&self.api_key)
      .json(&json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }],
      }));

    let body: ChatResponse = send(model, req)
      .await?
      .json()
      .await
      .map_err(|e| ProviderError::Rejected(format!("{model} reply: {e}")))?;

    reply_text(model, body)
  }
}

fn reply_text(model: &str, body: ChatResponse) -> Result<String, ProviderError> {
  body
    .choices
    .into_iter()
    .next()
    .and_then(|c| c.message.content)
    .filter(|text| !text.trim().is_empty())
    .ok_or_else(|| ProviderError::Rejected(format!("{model} returned an empty reply")))
}

/// One configured model, asked the keyword verbatim.
#[derive(Clone)]
pub struct OpenRouterModel {
  client: OpenRouterClient,
  id:     String,
  name:   String,
}

impl OpenRouterModel {
  pub fn new(client: OpenRouterClient, id: impl Into<String>, name: impl Into<String>) -> Self {
    Self { client, id: id.into(), name: name.into() }
  }

  pub fn id(&self) -> &str { &self.id }
}

impl LlmProvider for OpenRouterModel {
  fn model_name(&self) -> &str { &self.name }

  async fn ask(&self, keyword: &str) -> Result<String, ProviderError> {
    self.client.complete(&self.id, keyword).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn first_choice_is_the_reply() {
    let body: ChatResponse = serde_json::from_str(
      r#"{"choices":[{"message":{"role":"assistant","content":"Atlan is a data catalog."}}]}"#,
    )
    .unwrap();
    assert_eq!(reply_text("m", body).unwrap(), "Atlan is a data catalog.");
  }

  #[test]
  fn empty_replies_are_rejected() {
    for raw in [r#"{"choices":[]}"#, r#"{"choices":[{"message":{"content":"  "}}]}"#, "{}"] {
      let body: ChatResponse = serde_json::from_str(raw).unwrap();
      assert!(matches!(reply_text("m", body), Err(ProviderError::Rejected(_))));
    }
  }
}
