//! Student roster: flat-file persistence (JSON or CSV), id validation and score updates.
//!
//! The file is read in full on every interface entry and overwritten wholesale on save.
//! `RosterStore` serialises load-modify-save cycles inside this process only.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::category::{mean, Thresholds};
use crate::config::{RosterConfig, RosterFormat};
use crate::domain::Category;

#[derive(Debug, Error)]
pub enum RosterError {
  #[error("failed to read roster {path}: {source}")]
  Read { path: PathBuf, #[source] source: std::io::Error },
  #[error("failed to write roster {path}: {source}")]
  Write { path: PathBuf, #[source] source: std::io::Error },
  #[error("malformed JSON roster: {0}")]
  Json(#[from] serde_json::Error),
  #[error("malformed CSV roster at line {line}: {message}")]
  Csv { line: usize, message: String },
  #[error("no student with id {0}")]
  UnknownStudent(String),
  #[error("unknown score column {0}")]
  UnknownColumn(String),
}

/// One student and their raw scores, in column order.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreRecord {
  /// Id exactly as stored in the file; written back unchanged.
  pub id: String,
  /// Normalised id used for lookups (`"01"` and `"1"` match).
  pub key: String,
  pub scores: Vec<f64>,
}

impl ScoreRecord {
  fn new(id: String, scores: Vec<f64>) -> Self {
    Self { key: id.clone(), id, scores }
  }
}

/// Aggregated view of one student, used by the teacher and admin tables.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct StudentRow {
  pub id: String,
  pub score: f64,
  /// `None` when the stored score is outside the configured range.
  pub category: Option<Category>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Roster {
  pub format: RosterFormat,
  /// Header of the id column, e.g. `roll_no` or `PRN`.
  pub id_column: String,
  /// Score column names, e.g. `["score"]` or `["IE1", "MTE", "IE2", "ETE"]`.
  pub columns: Vec<String>,
  pub records: Vec<ScoreRecord>,
}

impl Roster {
  pub fn find(&self, id: &str) -> Option<&ScoreRecord> {
    self.records.iter().find(|r| r.key == id)
  }

  /// Overwrite one score. `column` defaults to the first score column.
  pub fn update_score(&mut self, id: &str, column: Option<&str>, value: f64) -> Result<(), RosterError> {
    let idx = match column {
      None => 0,
      Some(c) => self
        .columns
        .iter()
        .position(|name| name.eq_ignore_ascii_case(c))
        .ok_or_else(|| RosterError::UnknownColumn(c.to_string()))?,
    };
    let rec = self
      .records
      .iter_mut()
      .find(|r| r.key == id)
      .ok_or_else(|| RosterError::UnknownStudent(id.to_string()))?;
    if let Some(slot) = rec.scores.get_mut(idx) {
      *slot = value;
    }
    Ok(())
  }

  /// One row per student with the mean score and its category.
  pub fn rows(&self, thresholds: &Thresholds) -> Vec<StudentRow> {
    let mut rows: Vec<StudentRow> = self
      .records
      .iter()
      .map(|r| {
        let score = mean(&r.scores).unwrap_or(f64::NAN);
        StudentRow { id: r.key.clone(), score, category: thresholds.classify(score).ok() }
      })
      .collect();
    rows.sort_by(|a, b| match (a.id.parse::<u64>(), b.id.parse::<u64>()) {
      (Ok(x), Ok(y)) => x.cmp(&y),
      _ => a.id.cmp(&b.id),
    });
    rows
  }

  // ---- JSON ----

  pub fn from_json(text: &str) -> Result<Self, RosterError> {
    let file: JsonRoster = serde_json::from_str(text)?;
    let records = file
      .students
      .into_iter()
      .map(|s| ScoreRecord::new(s.roll_no.into_string(), vec![s.score]))
      .collect();
    Ok(Self { format: RosterFormat::Json, id_column: "roll_no".into(), columns: vec!["score".into()], records })
  }

  pub fn to_json(&self) -> Result<String, RosterError> {
    let file = JsonRoster {
      students: self
        .records
        .iter()
        .map(|r| JsonStudent {
          roll_no: RollNo::Text(r.id.clone()),
          score: r.scores.first().copied().unwrap_or_default(),
        })
        .collect(),
    };
    let mut buf = Vec::new();
    let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
    file.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
  }

  // ---- CSV ----

  pub fn from_csv(text: &str) -> Result<Self, RosterError> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
    let Some((_, header)) = lines.next() else {
      return Err(RosterError::Csv { line: 1, message: "missing header row".into() });
    };
    let header = parse_csv_record(header);
    if header.len() < 2 {
      return Err(RosterError::Csv { line: 1, message: "expected an id column and at least one score column".into() });
    }
    let columns = header[1..].to_vec();

    let mut records = Vec::new();
    for (i, line) in lines {
      let line_no = i + 1;
      let fields = parse_csv_record(line);
      if fields.len() != header.len() {
        return Err(RosterError::Csv {
          line: line_no,
          message: format!("expected {} fields, found {}", header.len(), fields.len()),
        });
      }
      let scores = fields[1..]
        .iter()
        .map(|f| {
          f.parse::<f64>().map_err(|_| RosterError::Csv { line: line_no, message: format!("invalid score {f:?}") })
        })
        .collect::<Result<Vec<_>, _>>()?;
      records.push(ScoreRecord::new(fields[0].clone(), scores));
    }
    Ok(Self { format: RosterFormat::Csv, id_column: header[0].clone(), columns, records })
  }

  pub fn to_csv(&self) -> String {
    let mut out = csv_quote(&self.id_column);
    for c in &self.columns {
      out.push(',');
      out.push_str(&csv_quote(c));
    }
    out.push('\n');
    for r in &self.records {
      out.push_str(&csv_quote(&r.id));
      for s in &r.scores {
        out.push(',');
        out.push_str(&s.to_string());
      }
      out.push('\n');
    }
    out
  }

  pub fn parse(format: RosterFormat, text: &str) -> Result<Self, RosterError> {
    match format {
      RosterFormat::Json => Self::from_json(text),
      RosterFormat::Csv => Self::from_csv(text),
    }
  }

  pub fn render(&self) -> Result<String, RosterError> {
    match self.format {
      RosterFormat::Json => self.to_json(),
      RosterFormat::Csv => Ok(self.to_csv()),
    }
  }
}

/// Split one CSV line, honouring double quotes (`""` is an escaped quote). Fields are trimmed.
fn parse_csv_record(line: &str) -> Vec<String> {
  let mut out = Vec::new();
  let mut buf = String::new();
  let mut in_quotes = false;
  let mut chars = line.chars().peekable();
  while let Some(ch) = chars.next() {
    match ch {
      '"' if in_quotes && chars.peek() == Some(&'"') => {
        buf.push('"');
        chars.next();
      }
      '"' => in_quotes = !in_quotes,
      ',' if !in_quotes => out.push(std::mem::take(&mut buf).trim().to_string()),
      _ => buf.push(ch),
    }
  }
  out.push(buf.trim().to_string());
  out
}

fn csv_quote(s: &str) -> String {
  if s.contains([',', '"', '\n', '\r']) {
    format!("\"{}\"", s.replace('"', "\"\""))
  } else {
    s.to_string()
  }
}

#[derive(Serialize, Deserialize)]
struct JsonRoster {
  students: Vec<JsonStudent>,
}

#[derive(Serialize, Deserialize)]
struct JsonStudent {
  roll_no: RollNo,
  score: f64,
}

/// Roll numbers are written as strings but older files may carry bare numbers.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RollNo {
  Text(String),
  Number(u64),
}

impl RollNo {
  fn into_string(self) -> String {
    match self {
      RollNo::Text(s) => s.trim().to_string(),
      RollNo::Number(n) => n.to_string(),
    }
  }
}

/// How student identifiers are validated and normalised.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdRule {
  /// Decimal roll number in `1..=max`.
  RollNumber { max: u32 },
  /// Non-empty ASCII alphanumeric PRN.
  Prn,
}

impl IdRule {
  pub fn for_config(cfg: &RosterConfig) -> Self {
    match cfg.format {
      RosterFormat::Json => IdRule::RollNumber { max: cfg.max_roll_no },
      RosterFormat::Csv => IdRule::Prn,
    }
  }

  /// Returns the normalised id, or the user-facing validation message.
  pub fn validate(&self, raw: &str) -> Result<String, String> {
    let s = raw.trim();
    match *self {
      IdRule::RollNumber { max } => {
        let ok = !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        match s.parse::<u32>() {
          Ok(n) if ok && (1..=max).contains(&n) => Ok(n.to_string()),
          _ => Err(format!("Invalid roll number. Please enter a roll number between 1 and {max}.")),
        }
      }
      IdRule::Prn => {
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()) {
          Ok(s.to_string())
        } else {
          Err("Invalid PRN. Please enter a non-empty alphanumeric PRN.".into())
        }
      }
    }
  }

  /// Normalise an id read from the file so lookups match validated input ("01" == "1").
  fn normalize_stored(&self, id: &str) -> String {
    match self {
      IdRule::RollNumber { .. } => id.trim().parse::<u32>().map(|n| n.to_string()).unwrap_or_else(|_| id.trim().to_string()),
      IdRule::Prn => id.trim().to_string(),
    }
  }
}

/// File-backed roster with the validation rules of its configuration.
pub struct RosterStore {
  path: PathBuf,
  format: RosterFormat,
  id_rule: IdRule,
  thresholds: Thresholds,
  write_lock: Mutex<()>,
}

impl RosterStore {
  pub fn new(path: PathBuf, format: RosterFormat, id_rule: IdRule, thresholds: Thresholds) -> Self {
    Self { path, format, id_rule, thresholds, write_lock: Mutex::new(()) }
  }

  pub fn path(&self) -> &Path { &self.path }
  pub fn format(&self) -> RosterFormat { self.format }
  pub fn id_rule(&self) -> IdRule { self.id_rule }
  pub fn thresholds(&self) -> &Thresholds { &self.thresholds }

  /// Read the whole file.
  #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
  pub async fn load(&self) -> Result<Roster, RosterError> {
    let text = tokio::fs::read_to_string(&self.path)
      .await
      .map_err(|source| RosterError::Read { path: self.path.clone(), source })?;
    let mut roster = Roster::parse(self.format, &text)?;
    for r in &mut roster.records {
      r.key = self.id_rule.normalize_stored(&r.id);
    }
    debug!(target: "roster", students = roster.records.len(), "Roster loaded");
    Ok(roster)
  }

  /// Overwrite the whole file.
  #[instrument(level = "debug", skip(self, roster), fields(path = %self.path.display(), students = roster.records.len()))]
  pub async fn save(&self, roster: &Roster) -> Result<(), RosterError> {
    let text = roster.render()?;
    tokio::fs::write(&self.path, text)
      .await
      .map_err(|source| RosterError::Write { path: self.path.clone(), source })
  }

  /// Load, update one score and save, holding the process-wide write lock throughout.
  #[instrument(level = "info", skip(self), fields(path = %self.path.display()))]
  pub async fn update_score(&self, id: &str, column: Option<&str>, value: f64) -> Result<(), RosterError> {
    let _guard = self.write_lock.lock().await;
    let mut roster = self.load().await?;
    roster.update_score(id, column, value)?;
    self.save(&roster).await?;
    info!(target: "roster", %id, column = column.unwrap_or("<first>"), value, "Score updated");
    Ok(())
  }
}
