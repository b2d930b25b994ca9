use std::collections::HashMap;

use riskgrid_model::ErrorKind;

/// Translated error codes and function names.
///
/// The engine parses and evaluates canonical (English) function names; a
/// translation package maps localized spellings to canonical ones on the way
/// in and error kinds to localized codes on the way out. The default package
/// is the identity English mapping.
#[derive(Clone, Debug)]
pub struct TranslationPackage {
    /// Localized function name (uppercased) -> canonical name.
    functions_to_canonical: HashMap<String, String>,
    /// Localized error code for each kind.
    error_codes: HashMap<ErrorKind, String>,
}

impl Default for TranslationPackage {
    fn default() -> Self {
        Self::english()
    }
}

impl TranslationPackage {
    /// The built-in English package: canonical names map to themselves.
    #[must_use]
    pub fn english() -> Self {
        Self {
            functions_to_canonical: HashMap::new(),
            error_codes: HashMap::new(),
        }
    }

    /// Build a package from explicit mappings. Function keys are the
    /// localized spellings; values are canonical names.
    #[must_use]
    pub fn new(
        functions: impl IntoIterator<Item = (String, String)>,
        error_codes: impl IntoIterator<Item = (ErrorKind, String)>,
    ) -> Self {
        let functions_to_canonical = functions
            .into_iter()
            .map(|(localized, canonical)| {
                (
                    localized.to_uppercase(),
                    canonical.to_ascii_uppercase(),
                )
            })
            .collect();
        Self {
            functions_to_canonical,
            error_codes: error_codes.into_iter().collect(),
        }
    }

    /// Canonicalise a function name as written in a formula.
    ///
    /// Unknown names pass through uppercased, so the dispatcher can still
    /// report `#NAME?` with the user's spelling intact elsewhere.
    #[must_use]
    pub fn canonical_function_name(&self, written: &str) -> String {
        let upper = written.to_uppercase();
        self.functions_to_canonical
            .get(&upper)
            .cloned()
            .unwrap_or(upper)
    }

    /// The localized code for an error kind (falls back to the canonical
    /// spelling).
    #[must_use]
    pub fn error_code(&self, kind: ErrorKind) -> String {
        self.error_codes
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| kind.as_code().to_string())
    }

    /// Resolve an error literal, trying localized codes before canonical
    /// ones.
    #[must_use]
    pub fn parse_error_code(&self, raw: &str) -> Option<ErrorKind> {
        let trimmed = raw.trim();
        for (kind, code) in &self.error_codes {
            if trimmed.eq_ignore_ascii_case(code) {
                return Some(*kind);
            }
        }
        ErrorKind::from_code(trimmed)
    }
}
