//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Collapse every run of whitespace (including newlines) into a single space and trim.
pub fn collapse_whitespace(s: &str) -> String {
  s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove markdown bold/italic markers (`*`) from both ends, then trim.
pub fn strip_emphasis(s: &str) -> &str {
  s.trim().trim_matches('*').trim()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn template_replaces_all_occurrences() {
    let out = fill_template("User's topic: {topic} ({topic})", &[("topic", "OOP")]);
    assert_eq!(out, "User's topic: OOP (OOP)");
  }

  #[test]
  fn whitespace_is_collapsed() {
    assert_eq!(collapse_whitespace("  a\n\n b\t c  "), "a b c");
  }

  #[test]
  fn emphasis_is_stripped_at_edges_only() {
    assert_eq!(strip_emphasis("** keep *this* **"), "keep *this*");
  }
}
