//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Category, OptionLabel, QuizItem, Role, StudyMode};
use crate::extract::{ExtractStatus, ExtractWarning};
use crate::roster::StudentRow;
use crate::session::{CardView, FlashcardDeck, QuizPhase, QuizSession};

//
// Sessions
//

#[derive(Debug, Deserialize)]
pub struct SessionIn {
    pub role: Role,
    #[serde(default)]
    pub password: Option<String>,
}
#[derive(Debug, Serialize)]
pub struct SessionOut {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
}

#[derive(Serialize)]
pub struct CatalogOut {
    pub roles: Vec<Role>,
    pub topics: Vec<String>,
    pub modes: Vec<StudyMode>,
}

//
// Teacher / admin
//

#[derive(Debug, Deserialize)]
pub struct ScoreUpdateIn {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    #[serde(rename = "studentId")]
    pub student_id: String,
    pub score: f64,
    /// Score column to overwrite (CSV rosters); defaults to the first one.
    #[serde(default)]
    pub column: Option<String>,
}
#[derive(Debug, Serialize)]
pub struct ScoreUpdateOut {
    #[serde(rename = "studentId")]
    pub student_id: String,
    pub score: f64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct StudentQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    #[serde(rename = "studentId")]
    pub student_id: String,
}
#[derive(Debug, Serialize)]
pub struct CategoryOut {
    #[serde(rename = "studentId")]
    pub student_id: String,
    pub score: f64,
    pub category: Category,
}

#[derive(Debug, Serialize)]
pub struct RosterOut {
    pub rows: Vec<StudentRow>,
}

//
// Student
//

#[derive(Debug, Deserialize)]
pub struct ReviseIn {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    #[serde(rename = "studentId")]
    pub student_id: String,
}
#[derive(Debug, Serialize)]
pub struct ReviseOut {
    #[serde(rename = "studentId")]
    pub student_id: String,
    pub category: Category,
    pub topics: Vec<String>,
    pub modes: Vec<StudyMode>,
}

#[derive(Debug, Deserialize)]
pub struct TopicIn {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    pub topic: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryOut {
    pub topic: String,
    pub category: Category,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct QuizAnswerIn {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    /// Question key, e.g. "1. What is Big-O?"
    pub question: String,
    pub option: OptionLabel,
}

#[derive(Debug, Serialize)]
pub struct OptionOut {
    pub label: OptionLabel,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct QuestionOut {
    pub key: String,
    pub number: u32,
    pub question: String,
    pub options: Vec<OptionOut>,
    pub selected: Option<OptionLabel>,
    /// Only revealed after submission, and only when the reply carried an answer line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<OptionLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct QuizOut {
    pub topic: String,
    pub category: Category,
    pub phase: QuizPhase,
    pub status: ExtractStatus,
    pub warnings: Vec<ExtractWarning>,
    pub questions: Vec<QuestionOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FlipIn {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    pub index: usize,
}

#[derive(Debug, Serialize)]
pub struct CardOut {
    pub index: usize,
    /// Button label, e.g. "Flip Flashcard 1".
    pub label: String,
    pub showing_front: bool,
    /// "Question: ..." or "Answer: ..." depending on the side showing.
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct FlashcardsOut {
    pub topic: String,
    pub category: Category,
    pub status: ExtractStatus,
    pub warnings: Vec<ExtractWarning>,
    pub cards: Vec<CardOut>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub kind: &'static str,
    pub message: String,
}

//
// Conversions from session state
//

fn question_out(item: &QuizItem, selected: Option<OptionLabel>, submitted: bool) -> QuestionOut {
    let (correct_answer, is_correct) = match (submitted, item.answer) {
        (true, Some(key)) => (Some(key), Some(selected == Some(key))),
        _ => (None, None),
    };
    QuestionOut {
        key: item.key(),
        number: item.number,
        question: item.question.clone(),
        options: OptionLabel::ALL
            .iter()
            .map(|&label| OptionOut { label, text: item.option(label).to_string() })
            .collect(),
        selected,
        correct_answer,
        is_correct,
    }
}

pub fn quiz_out(q: &QuizSession, message: Option<String>) -> QuizOut {
    let submitted = q.phase() == QuizPhase::Submitted;
    QuizOut {
        topic: q.topic.clone(),
        category: q.category,
        phase: q.phase(),
        status: q.status(),
        warnings: q.warnings.clone(),
        questions: q
            .items
            .iter()
            .map(|item| question_out(item, q.answers().get(&item.key()).copied(), submitted))
            .collect(),
        message,
    }
}

pub fn card_out(index: usize, view: &CardView) -> CardOut {
    let text = if view.showing_front {
        format!("Question: {}", view.visible_text())
    } else {
        format!("Answer: {}", view.visible_text())
    };
    CardOut { index, label: format!("Flip Flashcard {}", index + 1), showing_front: view.showing_front, text }
}

pub fn flashcards_out(deck: &FlashcardDeck) -> FlashcardsOut {
    FlashcardsOut {
        topic: deck.topic.clone(),
        category: deck.category,
        status: deck.status(),
        warnings: deck.warnings.clone(),
        cards: deck.cards.iter().enumerate().map(|(i, c)| card_out(i, c)).collect(),
    }
}
