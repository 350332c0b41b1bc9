//! Per-client session state.
//!
//! A `Session` replaces the implicit per-browser key-value store: it records who the
//! client is, the verified student (if any), and the cached quiz / flashcards for the
//! current topic and category. Picking a different topic or category drops the cache
//! together with any recorded answers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Category, Flashcard, OptionLabel, QuizItem, Role};
use crate::extract::{ExtractStatus, ExtractWarning, Extraction};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
  #[error("Your answers have been submitted. You cannot change them now.")]
  AlreadySubmitted,
  #[error("unknown question: {0}")]
  UnknownQuestion(String),
  #[error("no flashcard at index {0}")]
  NoSuchCard(usize),
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuizPhase {
  Collecting,
  Submitted,
}

/// Quiz for one topic/category, with the answers picked so far.
#[derive(Clone, Debug)]
pub struct QuizSession {
  pub topic: String,
  pub category: Category,
  pub items: Vec<QuizItem>,
  pub warnings: Vec<ExtractWarning>,
  status: ExtractStatus,
  answers: BTreeMap<String, OptionLabel>,
  phase: QuizPhase,
}

impl QuizSession {
  pub fn new(topic: &str, category: Category, extraction: Extraction<QuizItem>) -> Self {
    Self {
      topic: topic.to_string(),
      category,
      status: extraction.status(),
      items: extraction.records,
      warnings: extraction.warnings,
      answers: BTreeMap::new(),
      phase: QuizPhase::Collecting,
    }
  }

  /// How cleanly the quiz was recovered from the model reply.
  pub fn status(&self) -> ExtractStatus { self.status }
  pub fn phase(&self) -> QuizPhase { self.phase }
  pub fn answers(&self) -> &BTreeMap<String, OptionLabel> { &self.answers }

  pub fn is_for(&self, topic: &str, category: Category) -> bool {
    self.topic == topic && self.category == category
  }

  /// Record (or overwrite) the answer for one question. Rejected once submitted.
  pub fn select(&mut self, question_key: &str, label: OptionLabel) -> Result<(), SessionError> {
    if self.phase == QuizPhase::Submitted {
      return Err(SessionError::AlreadySubmitted);
    }
    if !self.items.iter().any(|q| q.key() == question_key) {
      return Err(SessionError::UnknownQuestion(question_key.to_string()));
    }
    self.answers.insert(question_key.to_string(), label);
    Ok(())
  }

  /// Freeze the answers. Submitting twice is harmless.
  pub fn submit(&mut self) {
    self.phase = QuizPhase::Submitted;
  }
}

/// One flashcard and which side is showing.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CardView {
  #[serde(flatten)]
  pub card: Flashcard,
  pub showing_front: bool,
}

impl CardView {
  pub fn flip(&mut self) {
    self.showing_front = !self.showing_front;
  }

  /// Text for the side currently showing.
  pub fn visible_text(&self) -> &str {
    if self.showing_front { &self.card.front } else { &self.card.back }
  }
}

#[derive(Clone, Debug)]
pub struct FlashcardDeck {
  pub topic: String,
  pub category: Category,
  pub cards: Vec<CardView>,
  pub warnings: Vec<ExtractWarning>,
  status: ExtractStatus,
}

impl FlashcardDeck {
  pub fn new(topic: &str, category: Category, extraction: Extraction<Flashcard>) -> Self {
    Self {
      topic: topic.to_string(),
      category,
      status: extraction.status(),
      cards: extraction.records.into_iter().map(|card| CardView { card, showing_front: true }).collect(),
      warnings: extraction.warnings,
    }
  }

  pub fn status(&self) -> ExtractStatus { self.status }

  pub fn is_for(&self, topic: &str, category: Category) -> bool {
    self.topic == topic && self.category == category
  }

  pub fn flip(&mut self, index: usize) -> Result<&CardView, SessionError> {
    let card = self.cards.get_mut(index).ok_or(SessionError::NoSuchCard(index))?;
    card.flip();
    Ok(card)
  }
}

/// Verified student for this session.
#[derive(Clone, Debug, PartialEq)]
pub struct StudentContext {
  pub id: String,
  pub category: Category,
}

#[derive(Clone, Debug)]
pub struct Session {
  pub role: Role,
  pub student: Option<StudentContext>,
  pub quiz: Option<QuizSession>,
  pub flashcards: Option<FlashcardDeck>,
  last_seen: Instant,
}

impl Session {
  pub fn new(role: Role) -> Self {
    Self { role, student: None, quiz: None, flashcards: None, last_seen: Instant::now() }
  }

  fn expired(&self, idle_ttl: Duration) -> bool {
    self.last_seen.elapsed() >= idle_ttl
  }

  /// Switch to another student. Cached content belongs to the previous one, so it goes too.
  pub fn set_student(&mut self, student: StudentContext) {
    if self.student.as_ref() != Some(&student) {
      self.quiz = None;
      self.flashcards = None;
    }
    self.student = Some(student);
  }
}

/// All live sessions, keyed by the id handed to the client.
///
/// A session idle for longer than `idle_ttl` is gone: lookups treat it as unknown and
/// `create` sweeps it out. At most `max_live` sessions are kept; the least recently
/// used one is evicted to make room.
#[derive(Clone)]
pub struct SessionStore {
  inner: Arc<RwLock<HashMap<Uuid, Session>>>,
  idle_ttl: Duration,
  max_live: usize,
}

impl Default for SessionStore {
  fn default() -> Self {
    Self::new(Duration::from_secs(2 * 60 * 60), 10_000)
  }
}

impl SessionStore {
  pub fn new(idle_ttl: Duration, max_live: usize) -> Self {
    Self { inner: Arc::default(), idle_ttl, max_live: max_live.max(1) }
  }

  pub async fn create(&self, role: Role) -> Uuid {
    let id = Uuid::new_v4();
    let mut map = self.inner.write().await;
    let before = map.len();
    map.retain(|_, s| !s.expired(self.idle_ttl));
    if map.len() >= self.max_live {
      let oldest = map.iter().min_by_key(|(_, s)| s.last_seen).map(|(k, _)| *k);
      if let Some(k) = oldest {
        map.remove(&k);
      }
    }
    let dropped = before - map.len();
    if dropped > 0 {
      debug!(target: "studygen", dropped, live = map.len(), "Dropped idle sessions");
    }
    map.insert(id, Session::new(role));
    id
  }

  /// Snapshot of a live session. Counts as activity.
  pub async fn get(&self, id: &Uuid) -> Option<Session> {
    self.with_session(id, |s| s.clone()).await
  }

  /// Run `f` against the session under the write lock. Counts as activity.
  pub async fn with_session<R>(&self, id: &Uuid, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
    let mut map = self.inner.write().await;
    if map.get(id).is_some_and(|s| s.expired(self.idle_ttl)) {
      map.remove(id);
      return None;
    }
    map.get_mut(id).map(|s| {
      s.last_seen = Instant::now();
      f(s)
    })
  }

  pub async fn len(&self) -> usize {
    self.inner.read().await.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(n: u32) -> QuizItem {
    QuizItem {
      number: n,
      question: format!("Question number {n}?"),
      options: ["a".into(), "b".into(), "c".into(), "d".into()],
      answer: Some(OptionLabel::A),
    }
  }

  fn quiz(items: Vec<QuizItem>) -> QuizSession {
    QuizSession::new("OOP", Category::Weak, Extraction { records: items, warnings: vec![] })
  }

  #[test]
  fn selection_overwrites_until_submitted() {
    let mut quiz = quiz(vec![item(1), item(2)]);
    let k1 = quiz.items[0].key();
    quiz.select(&k1, OptionLabel::A).unwrap();
    quiz.select(&k1, OptionLabel::C).unwrap();
    assert_eq!(quiz.answers().get(&k1), Some(&OptionLabel::C));

    quiz.submit();
    assert_eq!(quiz.phase(), QuizPhase::Submitted);
    assert_eq!(quiz.select(&k1, OptionLabel::D), Err(SessionError::AlreadySubmitted));
    let k2 = quiz.items[1].key();
    assert_eq!(quiz.select(&k2, OptionLabel::B), Err(SessionError::AlreadySubmitted));
    assert_eq!(quiz.answers().len(), 1);
    assert_eq!(quiz.answers().get(&k1), Some(&OptionLabel::C));
  }

  #[test]
  fn unknown_question_is_rejected() {
    let mut quiz = quiz(vec![item(1)]);
    assert_eq!(quiz.status(), ExtractStatus::Complete);
    assert!(matches!(quiz.select("9. Nope?", OptionLabel::A), Err(SessionError::UnknownQuestion(_))));
  }

  #[test]
  fn flipping_twice_restores_the_front() {
    let mut deck = FlashcardDeck::new(
      "OOP",
      Category::Average,
      Extraction {
        records: vec![Flashcard { front: "Q".into(), back: "A".into() }, Flashcard { front: "Q2".into(), back: "A2".into() }],
        warnings: vec![ExtractWarning::MissingBack { card: 3 }],
      },
    );
    assert_eq!(deck.status(), ExtractStatus::Partial);
    assert_eq!(deck.flip(0).unwrap().visible_text(), "A");
    assert!(deck.cards[1].showing_front);
    assert_eq!(deck.flip(0).unwrap().visible_text(), "Q");
    assert_eq!(deck.flip(5).unwrap_err(), SessionError::NoSuchCard(5));
  }

  #[test]
  fn switching_student_drops_cached_content() {
    let mut s = Session::new(Role::Student);
    s.set_student(StudentContext { id: "1".into(), category: Category::Weak });
    s.quiz = Some(quiz(vec![item(1)]));
    s.set_student(StudentContext { id: "1".into(), category: Category::Weak });
    assert!(s.quiz.is_some());
    s.set_student(StudentContext { id: "2".into(), category: Category::Weak });
    assert!(s.quiz.is_none());
  }

  #[tokio::test]
  async fn idle_sessions_expire() {
    let store = SessionStore::new(Duration::from_millis(40), 100);
    let id = store.create(Role::Student).await;
    assert!(store.get(&id).await.is_some());
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(store.get(&id).await.is_none());
    assert!(store.with_session(&id, |_| ()).await.is_none());
    assert_eq!(store.len().await, 0);
  }

  #[tokio::test]
  async fn full_store_evicts_least_recently_used() {
    let store = SessionStore::new(Duration::from_secs(60), 2);
    let a = store.create(Role::Student).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let b = store.create(Role::Teacher).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    store.get(&a).await.unwrap();
    let c = store.create(Role::Student).await;
    assert_eq!(store.len().await, 2);
    assert!(store.get(&a).await.is_some());
    assert!(store.get(&b).await.is_none());
    assert!(store.get(&c).await.is_some());
  }

  #[tokio::test]
  async fn store_mutations_are_visible() {
    let store = SessionStore::default();
    let id = store.create(Role::Student).await;
    store
      .with_session(&id, |s| s.student = Some(StudentContext { id: "3".into(), category: Category::Advanced }))
      .await
      .unwrap();
    assert_eq!(store.get(&id).await.unwrap().student.unwrap().id, "3");
    assert!(store.get(&Uuid::new_v4()).await.is_none());
    assert_eq!(store.len().await, 1);
  }
}
