//! Domain models used by the backend: roles, categories, study modes, quiz items and flashcards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Who is using the service?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Teacher,
  SystemAdmin,
  Student,
}

impl Role {
  pub const ALL: [Role; 3] = [Role::Teacher, Role::SystemAdmin, Role::Student];

  pub fn as_str(&self) -> &'static str {
    match self {
      Role::Teacher => "teacher",
      Role::SystemAdmin => "system_admin",
      Role::Student => "student",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Difficulty tier derived from a student's score.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
  Weak,
  Average,
  Advanced,
}

impl Category {
  pub fn as_str(&self) -> &'static str {
    match self {
      Category::Weak => "Weak",
      Category::Average => "Average",
      Category::Advanced => "Advanced",
    }
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// What kind of study material the student asked for.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StudyMode {
  Summary,
  Quiz,
  Flashcards,
}

impl StudyMode {
  pub const ALL: [StudyMode; 3] = [StudyMode::Summary, StudyMode::Quiz, StudyMode::Flashcards];

  pub fn as_str(&self) -> &'static str {
    match self {
      StudyMode::Summary => "summary",
      StudyMode::Quiz => "quiz",
      StudyMode::Flashcards => "flashcards",
    }
  }
}

impl fmt::Display for StudyMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Option label of a multiple-choice question.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OptionLabel {
  A,
  B,
  C,
  D,
}

impl OptionLabel {
  pub const ALL: [OptionLabel; 4] = [OptionLabel::A, OptionLabel::B, OptionLabel::C, OptionLabel::D];

  pub fn from_char(c: char) -> Option<Self> {
    match c.to_ascii_uppercase() {
      'A' => Some(OptionLabel::A),
      'B' => Some(OptionLabel::B),
      'C' => Some(OptionLabel::C),
      'D' => Some(OptionLabel::D),
      _ => None,
    }
  }

  pub fn index(&self) -> usize {
    match self {
      OptionLabel::A => 0,
      OptionLabel::B => 1,
      OptionLabel::C => 2,
      OptionLabel::D => 3,
    }
  }

  pub fn as_char(&self) -> char {
    match self {
      OptionLabel::A => 'A',
      OptionLabel::B => 'B',
      OptionLabel::C => 'C',
      OptionLabel::D => 'D',
    }
  }
}

impl fmt::Display for OptionLabel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_char()) }
}

/// One multiple-choice question recovered from a model reply.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QuizItem {
  pub number: u32,
  pub question: String,
  /// Always four entries, A..D in order.
  pub options: [String; 4],
  /// Present only when the reply carried an `Answer: X` line.
  #[serde(default)] pub answer: Option<OptionLabel>,
}

impl QuizItem {
  /// Identity of the question inside a quiz session, e.g. `"1. What is Big-O?"`.
  pub fn key(&self) -> String {
    format!("{}. {}", self.number, self.question)
  }

  pub fn option(&self, label: OptionLabel) -> &str {
    &self.options[label.index()]
  }
}

/// One flashcard recovered from a model reply.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flashcard {
  pub front: String,
  pub back: String,
}
