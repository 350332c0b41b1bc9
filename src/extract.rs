//! Recovering quiz questions and flashcards from free-form model replies.
//!
//! Both extractors are line-oriented and tolerant: they never fail. Anything that
//! does not fit the expected layout is skipped and reported as an `ExtractWarning`
//! next to the records that were recovered.
//!
//! Expected quiz layout (markup around the header and labels is optional):
//!
//! ```text
//! **Question 1:** What is Big-O?
//!
//! A) Metric
//! B) Notation
//! C) Algorithm
//! D) Data
//!
//! Answer: B
//! ```
//!
//! Expected flashcard layout:
//!
//! ```text
//! **Card 1:**
//! Front: What is a stack?
//! Back: A LIFO collection.
//! ```

use std::collections::HashSet;

use serde::Serialize;

use crate::domain::{Flashcard, OptionLabel, QuizItem};
use crate::util::{collapse_whitespace, strip_emphasis};

pub const NO_QUESTION: &str = "No question provided.";
pub const NO_ANSWER: &str = "No answer provided.";

/// Something the extractor had to skip or patch.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractWarning {
  /// A question header without all four options; the question was dropped.
  IncompleteQuestion { number: u32, options_found: usize },
  /// A question header with no question text; dropped.
  EmptyQuestion { number: u32 },
  /// Same `"{number}. {question}"` key seen twice; the later one was dropped.
  DuplicateQuestion { key: String },
  /// Card without a usable `Front:`; placeholder used.
  MissingFront { card: u32 },
  /// Card without a usable `Back:`; placeholder used.
  MissingBack { card: u32 },
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractStatus {
  Complete,
  Partial,
  Empty,
}

/// Records recovered from one reply, plus what went wrong along the way.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Extraction<T> {
  pub records: Vec<T>,
  pub warnings: Vec<ExtractWarning>,
}

impl<T> Extraction<T> {
  pub fn status(&self) -> ExtractStatus {
    if self.records.is_empty() {
      ExtractStatus::Empty
    } else if self.warnings.is_empty() {
      ExtractStatus::Complete
    } else {
      ExtractStatus::Partial
    }
  }
}

// ---------------- Quiz ----------------

/// Question being assembled while scanning lines.
struct PendingQuestion {
  number: u32,
  text: Vec<String>,
  options: [Option<String>; 4],
  /// Raw text after `Answer:`, resolved against the options once they are all known.
  answer: Option<String>,
  in_options: bool,
}

impl PendingQuestion {
  fn new(number: u32, first_line: &str) -> Self {
    let mut text = Vec::new();
    if !first_line.is_empty() {
      text.push(first_line.to_string());
    }
    Self { number, text, options: [None, None, None, None], answer: None, in_options: false }
  }

  fn finish(self, seen: &mut HashSet<String>, out: &mut Extraction<QuizItem>) {
    let question = collapse_whitespace(&self.text.join(" "));
    if question.is_empty() {
      out.warnings.push(ExtractWarning::EmptyQuestion { number: self.number });
      return;
    }
    let found = self.options.iter().filter(|o| o.is_some()).count();
    let [Some(a), Some(b), Some(c), Some(d)] = self.options else {
      out.warnings.push(ExtractWarning::IncompleteQuestion { number: self.number, options_found: found });
      return;
    };
    let options = [a, b, c, d];
    let answer = self.answer.as_deref().and_then(|text| resolve_answer(text, &options));
    let item = QuizItem { number: self.number, question, options, answer };
    let key = item.key();
    if !seen.insert(key.clone()) {
      out.warnings.push(ExtractWarning::DuplicateQuestion { key });
      return;
    }
    out.records.push(item);
  }
}

/// Extract quiz questions in order of appearance.
pub fn extract_quiz(reply: &str) -> Extraction<QuizItem> {
  let mut out = Extraction { records: Vec::new(), warnings: Vec::new() };
  let mut seen = HashSet::new();
  let mut pending: Option<PendingQuestion> = None;

  for line in reply.lines() {
    if let Some((number, rest)) = parse_question_header(line) {
      if let Some(q) = pending.take() {
        q.finish(&mut seen, &mut out);
      }
      pending = Some(PendingQuestion::new(number, rest));
      continue;
    }

    let Some(q) = pending.as_mut() else { continue };
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }
    if let Some((label, text)) = parse_option_line(trimmed) {
      let slot = &mut q.options[label.index()];
      if slot.is_none() {
        *slot = Some(text.to_string());
      }
      q.in_options = true;
    } else if let Some(text) = parse_answer_line(trimmed) {
      q.answer = Some(text.to_string());
    } else if !q.in_options {
      q.text.push(trimmed.to_string());
    }
  }
  if let Some(q) = pending.take() {
    q.finish(&mut seen, &mut out);
  }
  out
}

/// `**Question 12:** text` → `(12, "text")`. Bold markers and a leading `#` heading are optional.
fn parse_question_header(line: &str) -> Option<(u32, &str)> {
  let s = line.trim().trim_start_matches('#').trim_start().trim_start_matches('*').trim_start();
  let head = s.get(..8)?;
  if !head.eq_ignore_ascii_case("question") {
    return None;
  }
  let s = s[8..].trim_start();
  let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
  if digits_end == 0 {
    return None;
  }
  let number = s[..digits_end].parse::<u32>().ok()?;
  let rest = s[digits_end..].trim_start().strip_prefix(':')?;
  Some((number, strip_emphasis(rest)))
}

/// `A) text`, `A. text`, `A: text` or `(A) text` → `(A, "text")`.
fn parse_option_line(line: &str) -> Option<(OptionLabel, &str)> {
  let s = line.trim_start_matches('*').trim_start();
  let s = s.strip_prefix('(').unwrap_or(s);
  let mut chars = s.chars();
  let label = chars.next().filter(|c| c.is_ascii_uppercase()).and_then(OptionLabel::from_char)?;
  let rest = chars.as_str();
  let rest = rest.strip_prefix(')').or_else(|| rest.strip_prefix('.')).or_else(|| rest.strip_prefix(':'))?;
  Some((label, strip_emphasis(rest)))
}

/// `Answer: B`, `**Answer:** B) Notation`, `Correct answer: (b)` → the text after the colon.
fn parse_answer_line(line: &str) -> Option<&str> {
  let s = line.trim_start_matches('*').trim_start();
  let lower = s.to_ascii_lowercase();
  let skip = if lower.starts_with("answer") {
    "answer".len()
  } else if lower.starts_with("correct answer") {
    "correct answer".len()
  } else {
    return None;
  };
  let rest = s[skip..].trim_start().strip_prefix(':')?;
  Some(strip_emphasis(rest))
}

/// Map answer text to a label. A letter counts only when it stands alone (`B`, `(b)`,
/// `B) Notation`, `B Notation`); otherwise the text must equal one option's text.
fn resolve_answer(text: &str, options: &[String; 4]) -> Option<OptionLabel> {
  let s = text.strip_prefix("Option ").unwrap_or(text).trim_start();
  let s = s.strip_prefix('(').unwrap_or(s);
  let mut chars = s.chars();
  if let Some(label) = chars.next().and_then(OptionLabel::from_char) {
    let rest = chars.as_str();
    match rest.chars().next() {
      None | Some(')' | '.' | ':') => return Some(label),
      Some(c) if c.is_whitespace() && same_text(rest, &options[label.index()]) => return Some(label),
      _ => {}
    }
  }
  OptionLabel::ALL.into_iter().find(|l| same_text(text, &options[l.index()]))
}

fn same_text(a: &str, b: &str) -> bool {
  let norm = |s: &str| collapse_whitespace(strip_emphasis(s)).trim_end_matches('.').to_lowercase();
  norm(a) == norm(b)
}

// ---------------- Flashcards ----------------

/// Extract flashcards. Every `Card N:` marker yields one card; missing sides get placeholders.
pub fn extract_flashcards(reply: &str) -> Extraction<Flashcard> {
  let mut out = Extraction { records: Vec::new(), warnings: Vec::new() };
  let markers = find_card_markers(reply);

  for (i, &(_, body_start, number)) in markers.iter().enumerate() {
    let body_end = markers.get(i + 1).map(|m| m.0).unwrap_or(reply.len());
    let segment = &reply[body_start..body_end];

    let front_at = segment.find("Front:");
    let back_at = match front_at {
      Some(f) => segment[f..].find("Back:").map(|b| f + b),
      None => segment.find("Back:"),
    };

    let front = front_at
      .map(|f| {
        let end = back_at.unwrap_or(segment.len());
        clean_side(&segment[f + "Front:".len()..end])
      })
      .filter(|s| !s.is_empty());
    let back = back_at
      .map(|b| clean_side(first_paragraph(&segment[b + "Back:".len()..])))
      .filter(|s| !s.is_empty());

    if front.is_none() {
      out.warnings.push(ExtractWarning::MissingFront { card: number });
    }
    if back.is_none() {
      out.warnings.push(ExtractWarning::MissingBack { card: number });
    }
    out.records.push(Flashcard {
      front: front.unwrap_or_else(|| NO_QUESTION.to_string()),
      back: back.unwrap_or_else(|| NO_ANSWER.to_string()),
    });
  }
  out
}

/// Positions of every `Card N:` marker: (marker start, body start, N).
fn find_card_markers(text: &str) -> Vec<(usize, usize, u32)> {
  let mut markers = Vec::new();
  for (start, _) in text.match_indices("Card ") {
    let after = &text[start + "Card ".len()..];
    let digits_end = after.find(|c: char| !c.is_ascii_digit()).unwrap_or(after.len());
    if digits_end == 0 || !after[digits_end..].starts_with(':') {
      continue;
    }
    let Ok(number) = after[..digits_end].parse::<u32>() else { continue };
    markers.push((start, start + "Card ".len() + digits_end + 1, number));
  }
  markers
}

/// Text up to the first blank line, so trailing chatter after the last card is not absorbed.
fn first_paragraph(s: &str) -> &str {
  let lead = s.len() - s.trim_start().len();
  match s[lead..].find("\n\n") {
    Some(end) => &s[..lead + end],
    None => s,
  }
}

fn clean_side(s: &str) -> String {
  collapse_whitespace(strip_emphasis(s))
}
