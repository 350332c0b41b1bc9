//! Score → category classification.
//!
//! Boundaries: `s <= weak_max` is Weak, `weak_max < s < advanced_min` is Average,
//! `s >= advanced_min` is Advanced. Scores outside `[min, max]` are rejected.

use serde::Deserialize;
use thiserror::Error;

use crate::domain::Category;

#[derive(Debug, Error, PartialEq)]
pub enum ScoreError {
  #[error("score {value} is outside the accepted range {min}-{max}")]
  OutOfRange { value: f64, min: f64, max: f64 },
  #[error("no scores to classify")]
  Empty,
}

/// Thresholds for one roster configuration.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct Thresholds {
  pub min: f64,
  pub max: f64,
  pub weak_max: f64,
  pub advanced_min: f64,
}

impl Thresholds {
  /// CGPA scale used by the JSON roster (1-10).
  pub const CGPA: Thresholds = Thresholds { min: 1.0, max: 10.0, weak_max: 5.0, advanced_min: 7.5 };
  /// Percentage scale used by the CSV roster (0-100).
  pub const PERCENT: Thresholds = Thresholds { min: 0.0, max: 100.0, weak_max: 40.0, advanced_min: 75.0 };

  /// Reject configurations that would leave a gap or overlap.
  pub fn is_monotonic(&self) -> bool {
    self.min <= self.weak_max && self.weak_max < self.advanced_min && self.advanced_min <= self.max
  }

  pub fn check(&self, value: f64) -> Result<f64, ScoreError> {
    if !value.is_finite() || value < self.min || value > self.max {
      return Err(ScoreError::OutOfRange { value, min: self.min, max: self.max });
    }
    Ok(value)
  }

  pub fn classify(&self, score: f64) -> Result<Category, ScoreError> {
    let s = self.check(score)?;
    Ok(if s <= self.weak_max {
      Category::Weak
    } else if s < self.advanced_min {
      Category::Average
    } else {
      Category::Advanced
    })
  }
}

pub fn mean(scores: &[f64]) -> Result<f64, ScoreError> {
  if scores.is_empty() {
    return Err(ScoreError::Empty);
  }
  Ok(scores.iter().sum::<f64>() / scores.len() as f64)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cgpa_boundaries_follow_inclusive_exclusive_rule() {
    let t = Thresholds::CGPA;
    assert_eq!(t.classify(1.0), Ok(Category::Weak));
    assert_eq!(t.classify(5.0), Ok(Category::Weak));
    assert_eq!(t.classify(5.01), Ok(Category::Average));
    assert_eq!(t.classify(7.49), Ok(Category::Average));
    assert_eq!(t.classify(7.5), Ok(Category::Advanced));
    assert_eq!(t.classify(10.0), Ok(Category::Advanced));
  }

  #[test]
  fn out_of_range_scores_are_rejected() {
    let t = Thresholds::CGPA;
    assert!(matches!(t.classify(0.99), Err(ScoreError::OutOfRange { .. })));
    assert!(matches!(t.classify(10.01), Err(ScoreError::OutOfRange { .. })));
    assert!(matches!(t.classify(f64::NAN), Err(ScoreError::OutOfRange { .. })));
  }

  #[test]
  fn percent_scale_uses_mean() {
    let t = Thresholds::PERCENT;
    let classify = |s: &[f64]| mean(s).and_then(|m| t.classify(m));
    assert_eq!(classify(&[40.0, 40.0, 40.0, 40.0]), Ok(Category::Weak));
    assert_eq!(classify(&[30.0, 50.0, 60.0, 70.0]), Ok(Category::Average));
    assert_eq!(classify(&[75.0, 75.0]), Ok(Category::Advanced));
    assert_eq!(classify(&[]), Err(ScoreError::Empty));
  }

  #[test]
  fn percent_boundaries_follow_inclusive_exclusive_rule() {
    let t = Thresholds::PERCENT;
    assert_eq!(t.classify(0.0), Ok(Category::Weak));
    assert_eq!(t.classify(40.0), Ok(Category::Weak));
    assert_eq!(t.classify(40.01), Ok(Category::Average));
    assert_eq!(t.classify(74.99), Ok(Category::Average));
    assert_eq!(t.classify(75.0), Ok(Category::Advanced));
    assert_eq!(t.classify(100.0), Ok(Category::Advanced));
    assert!(matches!(t.classify(100.5), Err(ScoreError::OutOfRange { .. })));
    let classify = |s: &[f64]| mean(s).and_then(|m| t.classify(m));
    assert_eq!(classify(&[40.0, 40.0, 40.0, 40.04]), Ok(Category::Average));
    assert_eq!(classify(&[74.0, 75.0, 75.0, 75.0]), Ok(Category::Average));
  }

  #[test]
  fn presets_are_monotonic() {
    assert!(Thresholds::CGPA.is_monotonic());
    assert!(Thresholds::PERCENT.is_monotonic());
    let broken = Thresholds { min: 0.0, max: 10.0, weak_max: 8.0, advanced_min: 6.0 };
    assert!(!broken.is_monotonic());
  }
}
