//! Loading application configuration (prompts, topics, roster, auth) from TOML.
//!
//! Every section is optional; anything missing falls back to the built-in defaults.
//! See `AppConfig` for the expected schema.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::category::Thresholds;
use crate::domain::{Category, Role, StudyMode};

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default = "default_topics")]
  pub topics: Vec<String>,
  #[serde(default)]
  pub roster: RosterConfig,
  #[serde(default)]
  pub auth: AuthConfig,
  #[serde(default)]
  pub llm: LlmSettings,
  #[serde(default)]
  pub sessions: SessionSettings,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      prompts: Prompts::default(),
      topics: default_topics(),
      roster: RosterConfig::default(),
      auth: AuthConfig::default(),
      llm: LlmSettings::default(),
      sessions: SessionSettings::default(),
    }
  }
}

fn default_topics() -> Vec<String> {
  vec!["Data Structures and Algorithms".into(), "Object-Oriented Programming".into()]
}

/// On-disk roster layout.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RosterFormat {
  /// `{"students": [{"roll_no": "1", "score": 7.5}]}`
  Json,
  /// `PRN,IE1,MTE,IE2,ETE` header + one row per student.
  Csv,
}

impl RosterFormat {
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "json" => Some(RosterFormat::Json),
      "csv" => Some(RosterFormat::Csv),
      _ => None,
    }
  }

  pub fn default_thresholds(&self) -> Thresholds {
    match self {
      RosterFormat::Json => Thresholds::CGPA,
      RosterFormat::Csv => Thresholds::PERCENT,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RosterConfig {
  #[serde(default = "default_roster_path")]
  pub path: PathBuf,
  #[serde(default = "default_roster_format")]
  pub format: RosterFormat,
  /// Highest accepted roll number for the JSON roster (ids are 1..=max_roll_no).
  #[serde(default = "default_max_roll_no")]
  pub max_roll_no: u32,
  /// Overrides the format's built-in thresholds.
  #[serde(default)]
  pub thresholds: Option<Thresholds>,
}

impl Default for RosterConfig {
  fn default() -> Self {
    Self {
      path: default_roster_path(),
      format: default_roster_format(),
      max_roll_no: default_max_roll_no(),
      thresholds: None,
    }
  }
}

impl RosterConfig {
  pub fn thresholds(&self) -> Thresholds {
    self.thresholds.unwrap_or_else(|| self.format.default_thresholds())
  }
}

fn default_roster_path() -> PathBuf { PathBuf::from("student_scores.json") }
fn default_roster_format() -> RosterFormat { RosterFormat::Json }
fn default_max_roll_no() -> u32 { 10 }

/// bcrypt hashes per privileged role. A role without a hash is open.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct AuthConfig {
  #[serde(default)] pub teacher_password_hash: Option<String>,
  #[serde(default)] pub admin_password_hash: Option<String>,
}

impl AuthConfig {
  pub fn hash_for(&self, role: Role) -> Option<&str> {
    match role {
      Role::Teacher => self.teacher_password_hash.as_deref(),
      Role::SystemAdmin => self.admin_password_hash.as_deref(),
      Role::Student => None,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmSettings {
  #[serde(default = "default_temperature")]
  pub temperature: f32,
}

impl Default for LlmSettings {
  fn default() -> Self { Self { temperature: default_temperature() } }
}

fn default_temperature() -> f32 { 0.7 }

/// Limits for the in-memory session store.
#[derive(Clone, Debug, Deserialize)]
pub struct SessionSettings {
  /// Sessions idle for this long are dropped.
  #[serde(default = "default_idle_ttl_secs")]
  pub idle_ttl_secs: u64,
  #[serde(default = "default_max_live")]
  pub max_live: usize,
}

impl Default for SessionSettings {
  fn default() -> Self { Self { idle_ttl_secs: default_idle_ttl_secs(), max_live: default_max_live() } }
}

fn default_idle_ttl_secs() -> u64 { 2 * 60 * 60 }
fn default_max_live() -> usize { 10_000 }

/// One system prompt per category.
#[derive(Clone, Debug, Deserialize)]
pub struct TieredPrompt {
  pub weak: String,
  pub average: String,
  pub advanced: String,
}

impl TieredPrompt {
  pub fn for_category(&self, category: Category) -> &str {
    match category {
      Category::Weak => &self.weak,
      Category::Average => &self.average,
      Category::Advanced => &self.advanced,
    }
  }
}

/// Prompts used by the text-generation backend. `{topic}` is filled in everywhere.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  pub summary: TieredPrompt,
  pub quiz: TieredPrompt,
  pub flashcards: TieredPrompt,
  pub user_template: String,
}

impl Prompts {
  pub fn system_for(&self, mode: StudyMode, category: Category) -> &str {
    match mode {
      StudyMode::Summary => self.summary.for_category(category),
      StudyMode::Quiz => self.quiz.for_category(category),
      StudyMode::Flashcards => self.flashcards.for_category(category),
    }
  }
}

const SUMMARY_FORMAT: &str = "Use the following format:
**Topic Summary - [Topic]:**
[Summary in markdown format]";

const QUIZ_FORMAT: &str = "(The square brackets are placeholders)
Generate a quiz of 10 questions in the following format, provide the answer after each question:

**Quiz on [Topic]:**

**Instructions:** Choose the correct answer for each question. All the best!

**Question [Question number]:** [Question]

A) [Option A]
B) [Option B]
C) [Option C]
D) [Option D]

Answer: [Answer Option]";

const FLASHCARD_FORMAT: &str = "Generate 10 flashcards in the same format:

**Card [Card number]:**
Front: [Question]
Back: [Answer]";

impl Default for Prompts {
  fn default() -> Self {
    let summary = |lead: &str| format!("{lead}\n{SUMMARY_FORMAT}");
    let quiz = |lead: &str| format!("{lead}\n{QUIZ_FORMAT}");
    let cards = |lead: &str| format!("{lead}\n\n{FLASHCARD_FORMAT}");
    Self {
      summary: TieredPrompt {
        weak: summary("You are an AI assistant who generates very detailed academic notes of the user's topic. It should revise all the basic concepts."),
        average: summary("You are an AI assistant who generates a detailed academic summary of the user's topic. It should quickly revise important concepts."),
        advanced: summary("You are an AI assistant who generates an academic summary of the user's topic. It should quickly revise key concepts, but in depth."),
      },
      quiz: TieredPrompt {
        weak: quiz("You are an AI assistant who creates a basic conceptual quiz based on the user's topic."),
        average: quiz("You are an AI assistant who creates a moderate level quiz based on the user's topic."),
        advanced: quiz("You are an AI assistant who creates a hard quiz based on the user's topic."),
      },
      flashcards: TieredPrompt {
        weak: cards("You are an AI assistant who creates flashcards with basic questions and short answers based on the user's topic."),
        average: cards("You are an AI assistant who creates flashcards with concept based questions and short answers based on the user's topic."),
        advanced: cards("You are an AI assistant who creates flashcards with tough questions and short answers based on the user's topic."),
      },
      user_template: "User's topic: {topic}".into(),
    }
  }
}

/// Read config from APP_CONFIG_PATH (if set), then apply ROSTER_PATH / ROSTER_FORMAT overrides.
/// Parse or IO errors are logged and the defaults are used instead.
pub fn load_app_config_from_env() -> AppConfig {
  let mut cfg = match std::env::var("APP_CONFIG_PATH") {
    Ok(path) => load_from_path(&path).unwrap_or_default(),
    Err(_) => AppConfig::default(),
  };

  if let Ok(p) = std::env::var("ROSTER_PATH") {
    cfg.roster.path = PathBuf::from(p);
  }
  if let Ok(f) = std::env::var("ROSTER_FORMAT") {
    match RosterFormat::parse(&f) {
      Some(format) => cfg.roster.format = format,
      None => warn!(target: "studygen", value = %f, "Ignoring unknown ROSTER_FORMAT"),
    }
  }
  cfg
}

fn load_from_path(path: &str) -> Option<AppConfig> {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "studygen", %path, "Loaded app config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "studygen", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "studygen", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
