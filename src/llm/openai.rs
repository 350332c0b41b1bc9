//! Minimal OpenAI-compatible client for our use-case.
//!
//! We only call chat.completions and request plain text.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use super::{timeout_from_env, LlmError, TextGenerator};

const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub temperature: f32,
  timeout: Duration,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(temperature: f32) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model =
      std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    Self::new(&base_url, &api_key, &model, temperature, timeout_from_env(DEFAULT_TIMEOUT_SECS))
  }

  pub fn new(base_url: &str, api_key: &str, model: &str, temperature: f32, timeout: Duration) -> Option<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .ok()?;
    Some(Self {
      client,
      api_key: api_key.to_string(),
      base_url: base_url.trim_end_matches('/').to_string(),
      model: model.to_string(),
      temperature,
      timeout,
    })
  }

  /// Plain-text chat completion.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model, system_len = system.len(), user_len = user.len()))]
  async fn chat_plain(&self, system: &str, user: &str) -> Result<String, LlmError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature: self.temperature,
      max_tokens: None,
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "studygen-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| {
        if e.is_timeout() { LlmError::Timeout(self.timeout.as_secs()) } else { LlmError::Network(e.to_string()) }
      })?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      error!(target: "llm", status, elapsed = ?start.elapsed(), "OpenAI call failed");
      if status == 404 {
        return Err(LlmError::ModelNotFound(format!("{}: {}", self.model, message)));
      }
      return Err(LlmError::Api { status, message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| LlmError::Malformed(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(target: "llm", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();
    info!(target: "llm", elapsed = ?start.elapsed(), reply_len = text.len(), "Model response received");

    if text.is_empty() { return Err(LlmError::Empty); }
    Ok(text)
  }
}

#[async_trait]
impl TextGenerator for OpenAI {
  fn name(&self) -> &str { "openai" }
  fn model(&self) -> &str { &self.model }

  async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
    self.chat_plain(system, user).await
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use wiremock::matchers::{header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client(uri: &str) -> OpenAI {
    OpenAI::new(uri, "sk-test", "gpt-4o-mini", 0.2, Duration::from_secs(5)).unwrap()
  }

  #[tokio::test]
  async fn returns_trimmed_reply_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(header("authorization", "Bearer sk-test"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": "  **Topic Summary - OOP:**\nClasses...  "}}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
      })))
      .mount(&server)
      .await;

    let text = client(&server.uri()).generate("sys", "User's topic: OOP").await.unwrap();
    assert_eq!(text, "**Topic Summary - OOP:**\nClasses...");
  }

  #[tokio::test]
  async fn api_errors_surface_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
        "error": {"message": "Incorrect API key provided"}
      })))
      .mount(&server)
      .await;

    let err = client(&server.uri()).generate("sys", "user").await.unwrap_err();
    assert!(matches!(err, LlmError::Api { status: 401, .. }));
    assert!(err.to_string().contains("Incorrect API key"));
  }

  #[tokio::test]
  async fn empty_choice_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
      .mount(&server)
      .await;

    let err = client(&server.uri()).generate("sys", "user").await.unwrap_err();
    assert!(matches!(err, LlmError::Empty));
  }
}
