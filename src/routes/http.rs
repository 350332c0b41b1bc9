//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; failures are mapped to responses by `AppError`.

use std::sync::Arc;
use axum::{
  extract::{FromRequest, FromRequestParts, State},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::domain::{Role, StudyMode};
use crate::error::{AppError, AppResult};
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

/// JSON body extractor whose rejections use the API error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query-string extractor whose rejections use the API error shape.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_catalog(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(CatalogOut {
    roles: Role::ALL.to_vec(),
    topics: state.topics.clone(),
    modes: StudyMode::ALL.to_vec(),
  })
}

#[instrument(level = "info", skip(state, body), fields(role = %body.role))]
pub async fn http_open_session(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<SessionIn>,
) -> AppResult<Json<SessionOut>> {
  let session_id = logic::open_session(&state, body.role, body.password.as_deref()).await?;
  Ok(Json(SessionOut { session_id, role: body.role }))
}

// ---- Teacher ----

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id, student = %body.student_id))]
pub async fn http_update_score(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<ScoreUpdateIn>,
) -> AppResult<Json<ScoreUpdateOut>> {
  let out = logic::update_score(&state, &body.session_id, &body.student_id, body.score, body.column.as_deref()).await?;
  info!(target: "roster", student = %out.student_id, score = out.score, "HTTP score updated");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, q), fields(session = %q.session_id, student = %q.student_id))]
pub async fn http_check_category(
  State(state): State<Arc<AppState>>,
  ApiQuery(q): ApiQuery<StudentQuery>,
) -> AppResult<Json<CategoryOut>> {
  Ok(Json(logic::check_category(&state, &q.session_id, &q.student_id).await?))
}

#[instrument(level = "info", skip(state, q), fields(session = %q.session_id))]
pub async fn http_performance(
  State(state): State<Arc<AppState>>,
  ApiQuery(q): ApiQuery<SessionQuery>,
) -> AppResult<Json<RosterOut>> {
  let rows = logic::score_table(&state, &q.session_id, Role::Teacher).await?;
  Ok(Json(RosterOut { rows }))
}

// ---- System admin ----

#[instrument(level = "info", skip(state, q), fields(session = %q.session_id))]
pub async fn http_admin_scores(
  State(state): State<Arc<AppState>>,
  ApiQuery(q): ApiQuery<SessionQuery>,
) -> AppResult<Json<RosterOut>> {
  let rows = logic::score_table(&state, &q.session_id, Role::SystemAdmin).await?;
  Ok(Json(RosterOut { rows }))
}

// ---- Student ----

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id))]
pub async fn http_revise(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<ReviseIn>,
) -> AppResult<Json<ReviseOut>> {
  Ok(Json(logic::revise(&state, &body.session_id, &body.student_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id, topic = %body.topic))]
pub async fn http_summary(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<TopicIn>,
) -> AppResult<Json<SummaryOut>> {
  Ok(Json(logic::summary(&state, &body.session_id, &body.topic).await?))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id, topic = %body.topic))]
pub async fn http_quiz(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<TopicIn>,
) -> AppResult<Json<QuizOut>> {
  let out = logic::quiz(&state, &body.session_id, &body.topic).await?;
  info!(target: "studygen", questions = out.questions.len(), status = ?out.status, "HTTP quiz served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id, option = %body.option))]
pub async fn http_quiz_answer(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<QuizAnswerIn>,
) -> AppResult<Json<QuizOut>> {
  Ok(Json(logic::answer_question(&state, &body.session_id, &body.question, body.option).await?))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id))]
pub async fn http_quiz_submit(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<SessionQuery>,
) -> AppResult<Json<QuizOut>> {
  Ok(Json(logic::submit_quiz(&state, &body.session_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id, topic = %body.topic))]
pub async fn http_flashcards(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<TopicIn>,
) -> AppResult<Json<FlashcardsOut>> {
  let out = logic::flashcards(&state, &body.session_id, &body.topic).await?;
  info!(target: "studygen", cards = out.cards.len(), status = ?out.status, "HTTP flashcards served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id, index = body.index))]
pub async fn http_flip(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<FlipIn>,
) -> AppResult<Json<CardOut>> {
  Ok(Json(logic::flip_card(&state, &body.session_id, body.index).await?))
}
