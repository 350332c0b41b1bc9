//! Text-generation backends.
//!
//! The service only ever needs "one system instruction + one user message in, one block
//! of text out". `TextGenerator` is that seam; `ollama` and `openai` implement it over HTTP.
//!
//! Env variables:
//!   LLM_BACKEND      : "ollama" (default), "openai" or "none"
//!   LLM_TIMEOUT_SECS : per-request timeout (default 300 for ollama, 20 for openai)
//!   OLLAMA_BASE_URL / OLLAMA_MODEL
//!   OPENAI_API_KEY / OPENAI_BASE_URL / OPENAI_MODEL

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::LlmSettings;

pub mod ollama;
pub mod openai;

pub use ollama::Ollama;
pub use openai::OpenAI;

#[derive(Debug, Error)]
pub enum LlmError {
  #[error("request timed out after {0}s")]
  Timeout(u64),
  #[error("network error: {0}")]
  Network(String),
  #[error("model not found: {0}")]
  ModelNotFound(String),
  #[error("API error (HTTP {status}): {message}")]
  Api { status: u16, message: String },
  #[error("malformed response: {0}")]
  Malformed(String),
  #[error("empty response from model")]
  Empty,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
  /// Backend name for logs, e.g. "ollama".
  fn name(&self) -> &str;
  fn model(&self) -> &str;
  /// Send one system + one user message and return the reply text, trimmed.
  async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

fn timeout_from_env(default_secs: u64) -> Duration {
  let secs = std::env::var("LLM_TIMEOUT_SECS")
    .ok()
    .and_then(|s| s.parse::<u64>().ok())
    .unwrap_or(default_secs);
  Duration::from_secs(secs)
}

/// Pick and build a backend from the environment. None when the chosen backend cannot be built.
pub fn from_env(settings: &LlmSettings) -> Option<Arc<dyn TextGenerator>> {
  let backend = std::env::var("LLM_BACKEND").unwrap_or_else(|_| "ollama".into());
  let generator: Option<Arc<dyn TextGenerator>> = match backend.to_ascii_lowercase().as_str() {
    "openai" => OpenAI::from_env(settings.temperature).map(|c| Arc::new(c) as Arc<dyn TextGenerator>),
    "ollama" => Ollama::from_env(settings.temperature).map(|c| Arc::new(c) as Arc<dyn TextGenerator>),
    "none" => None,
    other => {
      warn!(target: "llm", backend = %other, "Unknown LLM_BACKEND; content generation disabled");
      None
    }
  };
  match &generator {
    Some(g) => info!(target: "llm", backend = %g.name(), model = %g.model(), "Text generation enabled."),
    None => warn!(target: "llm", %backend, "Text generation disabled; student content requests will fail."),
  }
  generator
}
