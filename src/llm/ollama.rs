//! Ollama (local LLM) client. Non-streaming `/api/chat`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{timeout_from_env, LlmError, TextGenerator};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3.1:8b-instruct-q2_K";
const DEFAULT_TIMEOUT_SECS: u64 = 300; // Local models are slower

pub struct Ollama {
  base_url: String,
  model: String,
  temperature: f32,
  timeout: Duration,
  client: reqwest::Client,
}

impl Ollama {
  pub fn from_env(temperature: f32) -> Option<Self> {
    let base_url = std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
    Self::new(&base_url, &model, temperature, timeout_from_env(DEFAULT_TIMEOUT_SECS))
  }

  pub fn new(base_url: &str, model: &str, temperature: f32, timeout: Duration) -> Option<Self> {
    let base = if base_url.is_empty() { DEFAULT_BASE_URL } else { base_url };
    let client = reqwest::Client::builder().timeout(timeout).build().ok()?;
    Some(Self {
      base_url: base.trim_end_matches('/').to_string(),
      model: model.to_string(),
      temperature,
      timeout,
      client,
    })
  }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
  model: &'a str,
  messages: [OllamaMessage<'a>; 2],
  stream: bool,
  options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
  role: &'a str,
  content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
  temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
  message: OllamaResponseMessage,
  #[serde(default)]
  prompt_eval_count: Option<u32>,
  #[serde(default)]
  eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
  content: String,
}

#[async_trait]
impl TextGenerator for Ollama {
  fn name(&self) -> &str { "ollama" }
  fn model(&self) -> &str { &self.model }

  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model, system_len = system.len(), user_len = user.len()))]
  async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
    let start = Instant::now();
    let body = OllamaRequest {
      model: &self.model,
      messages: [
        OllamaMessage { role: "system", content: system },
        OllamaMessage { role: "user", content: user },
      ],
      stream: false,
      options: OllamaOptions { temperature: self.temperature },
    };

    let response = self
      .client
      .post(format!("{}/api/chat", self.base_url))
      .json(&body)
      .send()
      .await
      .map_err(|e| {
        if e.is_timeout() {
          LlmError::Timeout(self.timeout.as_secs())
        } else if e.is_connect() {
          LlmError::Network(format!(
            "Ollama not reachable at {}. Is it running? Start with: ollama serve",
            self.base_url
          ))
        } else {
          LlmError::Network(e.to_string())
        }
      })?;

    let status = response.status().as_u16();
    if status == 404 {
      return Err(LlmError::ModelNotFound(format!(
        "Model '{}' not found locally. Pull it with: ollama pull {}",
        self.model, self.model
      )));
    }
    if status >= 400 {
      let message = response.text().await.unwrap_or_default();
      return Err(LlmError::Api { status, message });
    }

    let api: OllamaResponse = response
      .json()
      .await
      .map_err(|e| LlmError::Malformed(format!("failed to parse response: {e}")))?;

    info!(
      target: "llm",
      elapsed = ?start.elapsed(),
      prompt_tokens = ?api.prompt_eval_count,
      completion_tokens = ?api.eval_count,
      reply_len = api.message.content.len(),
      "Model response received"
    );

    let text = api.message.content.trim().to_string();
    if text.is_empty() {
      return Err(LlmError::Empty);
    }
    Ok(text)
  }
}
