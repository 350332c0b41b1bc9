//! Core behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - Opening sessions (with credential checks for privileged roles)
//!   - Teacher actions: score updates, category lookup, performance data
//!   - Admin score table
//!   - Student flow: revise → summary / quiz / flashcards, answers, submission, flips

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::dispatch::dispatch;
use crate::domain::{Category, OptionLabel, Role, StudyMode};
use crate::error::{AppError, AppResult};
use crate::extract::{extract_flashcards, extract_quiz};
use crate::llm::TextGenerator;
use crate::protocol::*;
use crate::roster::{Roster, StudentRow};
use crate::session::{FlashcardDeck, QuizSession, Session, StudentContext};
use crate::state::AppState;

// -------- Sessions & access --------

#[instrument(level = "info", skip(state, password), fields(%role, has_password = password.is_some()))]
pub async fn open_session(state: &AppState, role: Role, password: Option<&str>) -> AppResult<Uuid> {
  state.verifier.verify(role, password)?;
  let id = state.sessions.create(role).await;
  let live_sessions = state.sessions.len().await;
  info!(target: "studygen", session = %id, %role, live_sessions, "Session opened");
  Ok(id)
}

/// Fetch a session and check that it belongs to `role`.
async fn session_for(state: &AppState, session_id: &Uuid, role: Role) -> AppResult<Session> {
  let session = state
    .sessions
    .get(session_id)
    .await
    .ok_or_else(|| AppError::NotFound("Unknown session. Select your role again.".into()))?;
  if session.role != role {
    warn!(target: "studygen", session = %session_id, have = %session.role, want = %role, "Role mismatch");
    return Err(AppError::Forbidden);
  }
  Ok(session)
}

fn validate_id(state: &AppState, raw: &str) -> AppResult<String> {
  state.roster.id_rule().validate(raw).map_err(AppError::Validation)
}

/// Load the roster and classify one student.
async fn lookup_student(state: &AppState, id: &str) -> AppResult<(f64, Category)> {
  let roster: Roster = state.roster.load().await?;
  let record = roster
    .find(id)
    .ok_or_else(|| AppError::NotFound(format!("No student found with id {id}.")))?;
  let score = crate::category::mean(&record.scores)
    .map_err(|_| AppError::Validation(format!("Student {id} has no recorded scores.")))?;
  let category = state
    .roster
    .thresholds()
    .classify(score)
    .map_err(|e| AppError::Validation(format!("Stored score for student {id} is invalid: {e}.")))?;
  Ok((score, category))
}

// -------- Teacher / admin --------

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn update_score(
  state: &AppState,
  session_id: &Uuid,
  raw_id: &str,
  score: f64,
  column: Option<&str>,
) -> AppResult<ScoreUpdateOut> {
  session_for(state, session_id, Role::Teacher).await?;
  let id = validate_id(state, raw_id)?;
  let t = state.roster.thresholds();
  let score = t
    .check(score)
    .map_err(|_| AppError::Validation(format!("Enter a valid score ({}-{}).", t.min, t.max)))?;
  state.roster.update_score(&id, column, score).await?;
  Ok(ScoreUpdateOut {
    message: format!("Test score for student {id} updated to {score}."),
    student_id: id,
    score,
  })
}

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn check_category(state: &AppState, session_id: &Uuid, raw_id: &str) -> AppResult<CategoryOut> {
  session_for(state, session_id, Role::Teacher).await?;
  let id = validate_id(state, raw_id)?;
  let (score, category) = lookup_student(state, &id).await?;
  Ok(CategoryOut { student_id: id, score, category })
}

/// All students with aggregate score and category, sorted by id.
#[instrument(level = "info", skip(state), fields(%session_id, %role))]
pub async fn score_table(state: &AppState, session_id: &Uuid, role: Role) -> AppResult<Vec<StudentRow>> {
  session_for(state, session_id, role).await?;
  let roster = state.roster.load().await?;
  let rows = roster.rows(state.roster.thresholds());
  let unclassified = rows.iter().filter(|r| r.category.is_none()).count();
  if unclassified > 0 {
    warn!(target: "roster", unclassified, "Some stored scores are outside the accepted range");
  }
  Ok(rows)
}

// -------- Student --------

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn revise(state: &AppState, session_id: &Uuid, raw_id: &str) -> AppResult<ReviseOut> {
  session_for(state, session_id, Role::Student).await?;
  let id = validate_id(state, raw_id)?;
  let (_, category) = lookup_student(state, &id).await?;
  let ctx = StudentContext { id: id.clone(), category };
  state.sessions.with_session(session_id, |s| s.set_student(ctx)).await;
  info!(target: "studygen", session = %session_id, student = %id, %category, "Student verified");
  Ok(ReviseOut {
    student_id: id,
    category,
    topics: state.topics.clone(),
    modes: StudyMode::ALL.to_vec(),
  })
}

/// Verified student + validated topic + configured backend, or the reason why not.
async fn student_request(
  state: &AppState,
  session_id: &Uuid,
  topic: &str,
) -> AppResult<(StudentContext, Arc<dyn TextGenerator>)> {
  let session = session_for(state, session_id, Role::Student).await?;
  let student = session
    .student
    .ok_or_else(|| AppError::Validation("Enter your roll number and choose Revise Topics first.".into()))?;
  if !state.has_topic(topic) {
    return Err(AppError::Validation(format!("Unknown topic: {topic}. Choose one of: {}.", state.topics.join(", "))));
  }
  let generator = state.llm.clone().ok_or(AppError::GenerationUnavailable)?;
  Ok((student, generator))
}

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn summary(state: &AppState, session_id: &Uuid, topic: &str) -> AppResult<SummaryOut> {
  let (student, generator) = student_request(state, session_id, topic).await?;
  let text = dispatch(generator.as_ref(), &state.prompts, StudyMode::Summary, student.category, topic).await?;
  Ok(SummaryOut { topic: topic.to_string(), category: student.category, text })
}

/// Return the cached quiz for this topic and category, generating a fresh one otherwise.
#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn quiz(state: &AppState, session_id: &Uuid, topic: &str) -> AppResult<QuizOut> {
  let (student, generator) = student_request(state, session_id, topic).await?;

  let cached = state
    .sessions
    .with_session(session_id, |s| {
      s.quiz.as_ref().filter(|q| q.is_for(topic, student.category)).map(|q| quiz_out(q, None))
    })
    .await
    .flatten();
  if let Some(out) = cached {
    debug!(target: "studygen", session = %session_id, "Serving cached quiz");
    return Ok(out);
  }

  let reply = dispatch(generator.as_ref(), &state.prompts, StudyMode::Quiz, student.category, topic).await?;
  let extraction = extract_quiz(&reply);
  info!(
    target: "studygen",
    session = %session_id,
    questions = extraction.records.len(),
    warnings = extraction.warnings.len(),
    status = ?extraction.status(),
    "Quiz extracted"
  );
  let quiz = QuizSession::new(topic, student.category, extraction);
  let out = quiz_out(&quiz, None);
  state.sessions.with_session(session_id, |s| s.quiz = Some(quiz)).await;
  Ok(out)
}

#[instrument(level = "info", skip(state, question), fields(%session_id, %option))]
pub async fn answer_question(
  state: &AppState,
  session_id: &Uuid,
  question: &str,
  option: OptionLabel,
) -> AppResult<QuizOut> {
  session_for(state, session_id, Role::Student).await?;
  state
    .sessions
    .with_session(session_id, |s| -> AppResult<QuizOut> {
      let quiz = s.quiz.as_mut().ok_or_else(no_quiz)?;
      quiz.select(question, option)?;
      Ok(quiz_out(quiz, None))
    })
    .await
    .unwrap_or_else(|| Err(unknown_session()))
}

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn submit_quiz(state: &AppState, session_id: &Uuid) -> AppResult<QuizOut> {
  session_for(state, session_id, Role::Student).await?;
  state
    .sessions
    .with_session(session_id, |s| -> AppResult<QuizOut> {
      let quiz = s.quiz.as_mut().ok_or_else(no_quiz)?;
      quiz.submit();
      info!(target: "studygen", answered = quiz.answers().len(), questions = quiz.items.len(), "Quiz submitted");
      Ok(quiz_out(quiz, Some("Answers Submitted!".into())))
    })
    .await
    .unwrap_or_else(|| Err(unknown_session()))
}

/// Return the cached deck for this topic and category, generating a fresh one otherwise.
#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn flashcards(state: &AppState, session_id: &Uuid, topic: &str) -> AppResult<FlashcardsOut> {
  let (student, generator) = student_request(state, session_id, topic).await?;

  let cached = state
    .sessions
    .with_session(session_id, |s| {
      s.flashcards.as_ref().filter(|d| d.is_for(topic, student.category)).map(flashcards_out)
    })
    .await
    .flatten();
  if let Some(out) = cached {
    debug!(target: "studygen", session = %session_id, "Serving cached flashcards");
    return Ok(out);
  }

  let reply = dispatch(generator.as_ref(), &state.prompts, StudyMode::Flashcards, student.category, topic).await?;
  let extraction = extract_flashcards(&reply);
  info!(
    target: "studygen",
    session = %session_id,
    cards = extraction.records.len(),
    warnings = extraction.warnings.len(),
    status = ?extraction.status(),
    "Flashcards extracted"
  );
  let deck = FlashcardDeck::new(topic, student.category, extraction);
  let out = flashcards_out(&deck);
  state.sessions.with_session(session_id, |s| s.flashcards = Some(deck)).await;
  Ok(out)
}

#[instrument(level = "info", skip(state), fields(%session_id, index))]
pub async fn flip_card(state: &AppState, session_id: &Uuid, index: usize) -> AppResult<CardOut> {
  session_for(state, session_id, Role::Student).await?;
  state
    .sessions
    .with_session(session_id, |s| -> AppResult<CardOut> {
      let deck = s
        .flashcards
        .as_mut()
        .ok_or_else(|| AppError::Validation("No flashcards yet. Choose a topic and the Flashcards mode first.".into()))?;
      let view = deck.flip(index)?;
      Ok(card_out(index, view))
    })
    .await
    .unwrap_or_else(|| Err(unknown_session()))
}

fn no_quiz() -> AppError {
  AppError::Validation("No quiz yet. Choose a topic and the Quiz mode first.".into())
}

fn unknown_session() -> AppError {
  AppError::NotFound("Unknown session. Select your role again.".into())
}
