use serde::{Deserialize, Serialize};

/// The raw content of a cell as supplied by the caller, before any parsing.
///
/// Formula cells keep their original text so `FORMULATEXT` and serialization
/// can reproduce the user's input verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RawCellContent {
    Empty,
    Number(f64),
    Bool(bool),
    Text(String),
    Formula(String),
}

impl RawCellContent {
    /// Classify a text input. Formula detection and apostrophe escaping
    /// happen here; literal recognition (numbers, dates, distributions) is
    /// the engine's job.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        if text.is_empty() {
            return RawCellContent::Empty;
        }
        if is_formula(text) {
            return RawCellContent::Formula(text.to_string());
        }
        if let Some(escaped) = text.strip_prefix('\'') {
            return RawCellContent::Text(escaped.to_string());
        }
        RawCellContent::Text(text.to_string())
    }

    #[must_use]
    pub fn is_formula(&self) -> bool {
        matches!(self, RawCellContent::Formula(_))
    }
}

/// A cell input is a formula iff it starts with `=`.
#[must_use]
pub fn is_formula(text: &str) -> bool {
    text.starts_with('=')
}

/// A leading apostrophe turns the rest of the input into a verbatim string
/// (`'=A1` stores the text `=A1`).
#[must_use]
pub fn is_escaped_text(text: &str) -> bool {
    text.starts_with('\'')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formula_detection() {
        assert!(is_formula("=A1+1"));
        assert!(!is_formula(" =A1"));
        assert!(!is_formula("1+1"));
    }

    #[test]
    fn apostrophe_escapes_formula() {
        assert_eq!(
            RawCellContent::from_text("'=A1"),
            RawCellContent::Text("=A1".to_string())
        );
    }
}
