//! Request-level errors and their HTTP mapping.
//!
//! Validation and authorization problems are reported back verbatim; generation and
//! storage failures are logged in full and surfaced with a generic message.

use axum::{
  extract::rejection::{JsonRejection, QueryRejection},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use thiserror::Error;
use tracing::error;

use crate::auth::AuthError;
use crate::llm::LlmError;
use crate::protocol::ErrorOut;
use crate::roster::RosterError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("{0}")]
  Validation(String),
  #[error(transparent)]
  Unauthorized(#[from] AuthError),
  #[error("this action is not available to the current role")]
  Forbidden,
  #[error("{0}")]
  NotFound(String),
  #[error(transparent)]
  Session(#[from] SessionError),
  #[error("content generation is not configured")]
  GenerationUnavailable,
  #[error("content generation failed: {0}")]
  Generation(#[from] LlmError),
  #[error("roster error: {0}")]
  Roster(RosterError),
}

impl From<RosterError> for AppError {
  fn from(e: RosterError) -> Self {
    match e {
      RosterError::UnknownStudent(id) => AppError::NotFound(format!("No student found with id {id}.")),
      RosterError::UnknownColumn(c) => AppError::Validation(format!("Unknown score column {c}.")),
      other => AppError::Roster(other),
    }
  }
}

impl From<JsonRejection> for AppError {
  fn from(e: JsonRejection) -> Self {
    AppError::Validation(format!("Invalid request body: {}", e.body_text()))
  }
}

impl From<QueryRejection> for AppError {
  fn from(e: QueryRejection) -> Self {
    AppError::Validation(format!("Invalid query string: {}", e.body_text()))
  }
}

impl AppError {
  fn kind(&self) -> &'static str {
    match self {
      AppError::Validation(_) => "validation",
      AppError::Unauthorized(_) => "unauthorized",
      AppError::Forbidden => "forbidden",
      AppError::NotFound(_) => "not_found",
      AppError::Session(SessionError::AlreadySubmitted) => "conflict",
      AppError::Session(_) => "validation",
      AppError::GenerationUnavailable => "unavailable",
      AppError::Generation(_) => "generation",
      AppError::Roster(_) => "internal",
    }
  }

  fn status(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden => StatusCode::FORBIDDEN,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Session(SessionError::AlreadySubmitted) => StatusCode::CONFLICT,
      AppError::Session(_) => StatusCode::BAD_REQUEST,
      AppError::GenerationUnavailable => StatusCode::SERVICE_UNAVAILABLE,
      AppError::Generation(_) => StatusCode::BAD_GATEWAY,
      AppError::Roster(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// What the client gets to see.
  fn public_message(&self) -> String {
    match self {
      AppError::Unauthorized(AuthError::BadHash(_)) => "Login is misconfigured. Contact the administrator.".into(),
      AppError::Unauthorized(_) => "Invalid credentials.".into(),
      AppError::Generation(_) => "Could not generate study material right now. Please try again.".into(),
      AppError::Roster(_) => "Something went wrong while accessing student records.".into(),
      other => other.to_string(),
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> axum::response::Response {
    match &self {
      AppError::Generation(_) | AppError::Roster(_) | AppError::Unauthorized(AuthError::BadHash(_)) => {
        error!(target: "studygen", error = %self, "Request failed");
      }
      _ => tracing::debug!(target: "studygen", error = %self, "Request rejected"),
    }
    let body = ErrorOut { kind: self.kind(), message: self.public_message() };
    (self.status(), Json(body)).into_response()
  }
}

pub type AppResult<T> = Result<T, AppError>;
