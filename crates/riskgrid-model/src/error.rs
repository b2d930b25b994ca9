use core::fmt;

use serde::{Deserialize, Serialize};

/// Spreadsheet error taxonomy shared by every layer of the engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// `#DIV/0!` — division by zero or an effectively-zero denominator.
    DivByZero,
    /// `#NAME?` — unknown function or named expression.
    Name,
    /// `#VALUE!` — wrong type of argument or operand.
    Value,
    /// `#NUM!` — invalid numeric value (overflow, non-finite sample).
    Num,
    /// `#N/A` — value not available.
    Na,
    /// `#CYCLE!` — the cell participates in a circular reference.
    Cycle,
    /// `#REF!` — reference to a removed cell, row, column or sheet.
    Ref,
    /// `#SPILL!` — an array result could not materialise.
    Spill,
    /// `#LIC!` — feature not available under the current license.
    Lic,
    /// `#ERROR!` — generic error, including retained parse failures.
    Error,
}

impl ErrorKind {
    /// Canonical spelling of the error code (including punctuation).
    #[must_use]
    pub const fn as_code(self) -> &'static str {
        match self {
            ErrorKind::DivByZero => "#DIV/0!",
            ErrorKind::Name => "#NAME?",
            ErrorKind::Value => "#VALUE!",
            ErrorKind::Num => "#NUM!",
            ErrorKind::Na => "#N/A",
            ErrorKind::Cycle => "#CYCLE!",
            ErrorKind::Ref => "#REF!",
            ErrorKind::Spill => "#SPILL!",
            ErrorKind::Lic => "#LIC!",
            ErrorKind::Error => "#ERROR!",
        }
    }

    /// Parse a canonical error literal into an [`ErrorKind`].
    ///
    /// Returns `None` for unknown literals; translated codes are resolved by
    /// the engine's translation package before reaching this point.
    #[must_use]
    pub fn from_code(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let all = [
            ErrorKind::DivByZero,
            ErrorKind::Name,
            ErrorKind::Value,
            ErrorKind::Num,
            ErrorKind::Na,
            ErrorKind::Cycle,
            ErrorKind::Ref,
            ErrorKind::Spill,
            ErrorKind::Lic,
            ErrorKind::Error,
        ];
        all.into_iter()
            .find(|kind| raw.eq_ignore_ascii_case(kind.as_code()))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_roundtrip() {
        for kind in [
            ErrorKind::DivByZero,
            ErrorKind::Name,
            ErrorKind::Value,
            ErrorKind::Num,
            ErrorKind::Na,
            ErrorKind::Cycle,
            ErrorKind::Ref,
            ErrorKind::Spill,
            ErrorKind::Lic,
            ErrorKind::Error,
        ] {
            assert_eq!(ErrorKind::from_code(kind.as_code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code("#BOGUS!"), None);
    }

    #[test]
    fn parsing_is_case_insensitive() {
        assert_eq!(ErrorKind::from_code("#div/0!"), Some(ErrorKind::DivByZero));
        assert_eq!(ErrorKind::from_code(" #n/a "), Some(ErrorKind::Na));
    }
}
