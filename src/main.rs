//! StudyGen · Adaptive Study Material Backend
//!
//! - Axum HTTP API for teachers, system admins and students
//! - File-backed student roster (JSON roll numbers or CSV PRN sheets)
//! - Pluggable text generation (local Ollama or an OpenAI-compatible API)
//! - Static frontend fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT             : u16 (default 3000)
//!   APP_CONFIG_PATH  : path to TOML config (prompts, topics, roster, auth hashes)
//!   ROSTER_PATH      : overrides the roster file path
//!   ROSTER_FORMAT    : "json" or "csv"
//!   LLM_BACKEND      : "ollama" (default), "openai" or "none"
//!   OLLAMA_BASE_URL  : default "http://localhost:11434"
//!   OLLAMA_MODEL     : default "llama3.1:8b-instruct-q2_K"
//!   OPENAI_API_KEY   : required for the "openai" backend
//!   OPENAI_BASE_URL  : default "https://api.openai.com/v1"
//!   OPENAI_MODEL     : default "gpt-4o-mini"
//!   LLM_TIMEOUT_SECS : request timeout for the backend
//!   LOG_LEVEL        : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT       : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod category;
mod config;
mod roster;
mod auth;
mod extract;
mod session;
mod llm;
mod dispatch;
mod error;
mod protocol;
mod state;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: config, roster store, sessions, text generator, verifier.
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(
    target: "studygen",
    %addr,
    backend = state.llm.as_ref().map(|g| g.name()).unwrap_or("none"),
    roster = %state.roster.path().display(),
    roster_format = ?state.roster.format(),
    "HTTP server listening"
  );
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "studygen", error = %e, "Failed to listen for shutdown signal");
    return;
  }
  info!(target: "studygen", "Shutdown signal received");
}
