//! Prompt dispatcher: picks the system instruction for a mode and category, builds the
//! user message for the topic, and sends both to the text-generation backend.

use std::time::Instant;

use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::{Category, StudyMode};
use crate::llm::{LlmError, TextGenerator};
use crate::util::fill_template;

/// System + user message pair for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
  pub system: String,
  pub user: String,
}

pub fn build_prompt(prompts: &Prompts, mode: StudyMode, category: Category, topic: &str) -> PromptPair {
  let pairs = [("topic", topic)];
  PromptPair {
    system: fill_template(prompts.system_for(mode, category), &pairs),
    user: fill_template(&prompts.user_template, &pairs),
  }
}

/// Ask the backend for study material. Returns the raw reply text.
#[instrument(level = "info", skip(generator, prompts), fields(%mode, %category, backend = %generator.name()))]
pub async fn dispatch(
  generator: &dyn TextGenerator,
  prompts: &Prompts,
  mode: StudyMode,
  category: Category,
  topic: &str,
) -> Result<String, LlmError> {
  let prompt = build_prompt(prompts, mode, category, topic);
  let start = Instant::now();
  let result = generator.generate(&prompt.system, &prompt.user).await;
  let elapsed = start.elapsed();

  match &result {
    Ok(text) => info!(target: "llm", ?elapsed, reply_len = text.len(), "Study material generated"),
    Err(e) => error!(target: "llm", ?elapsed, error = %e, "Study material generation failed"),
  }
  result
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{Arc, Mutex};

  use crate::llm::testing::MockGenerator;

  #[test]
  fn user_message_carries_the_topic() {
    let p = build_prompt(&Prompts::default(), StudyMode::Quiz, Category::Weak, "Object-Oriented Programming");
    assert_eq!(p.user, "User's topic: Object-Oriented Programming");
    assert!(p.system.contains("basic conceptual quiz"));
  }

  #[test]
  fn topic_placeholder_in_system_prompt_is_filled() {
    let mut prompts = Prompts::default();
    prompts.summary.advanced = "Summarise {topic} in depth.".into();
    let p = build_prompt(&prompts, StudyMode::Summary, Category::Advanced, "Graphs");
    assert_eq!(p.system, "Summarise Graphs in depth.");
  }

  #[tokio::test]
  async fn dispatch_sends_the_tiered_prompt() {
    let gen = MockGenerator::replying("**Topic Summary - Graphs:**\nNodes and edges.");
    let text = dispatch(&gen, &Prompts::default(), StudyMode::Summary, Category::Average, "Graphs")
      .await
      .unwrap();
    assert!(text.starts_with("**Topic Summary"));
    let (system, user) = gen.last_prompt.lock().unwrap().clone().unwrap();
    assert!(system.contains("quickly revise important concepts"));
    assert_eq!(user, "User's topic: Graphs");
    assert_eq!(gen.call_count(), 1);
  }

  /// Collects formatted log output.
  #[derive(Clone, Default)]
  struct Capture(Arc<Mutex<Vec<u8>>>);

  impl std::io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
      self.0.lock().unwrap().extend_from_slice(buf);
      Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
  }

  #[tokio::test]
  async fn reply_text_stays_out_of_the_logs() {
    let capture = Capture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
      .with_max_level(tracing::Level::TRACE)
      .with_ansi(false)
      .with_writer(move || writer.clone())
      .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let gen = MockGenerator::replying("Stacks are LIFO zebra-marker");
    dispatch(&gen, &Prompts::default(), StudyMode::Summary, Category::Weak, "Graphs").await.unwrap();

    let logs = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
    assert!(logs.contains("Study material generated"), "{logs}");
    assert!(!logs.contains("zebra-marker"), "{logs}");
  }

  #[tokio::test]
  async fn dispatch_propagates_backend_errors() {
    let gen = MockGenerator::failing("connection refused");
    let err = dispatch(&gen, &Prompts::default(), StudyMode::Quiz, Category::Weak, "Graphs").await.unwrap_err();
    assert!(err.to_string().contains("connection refused"));
  }
}
