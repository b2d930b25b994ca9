use std::sync::Arc;

use thiserror::Error;

use crate::locale::TranslationPackage;

/// Engine configuration. Supplied at construction and immutable per engine
/// instance; the parser, arithmetic engine and serializer all read from the
/// same shared copy.
#[derive(Clone, Debug)]
pub struct Config {
    /// Length of every generated sample vector.
    pub sample_size: usize,
    /// Relative epsilon for float comparison and near-zero snapping.
    pub precision_epsilon: f64,
    /// Significant digits used by smart rounding on output.
    pub precision_rounding: u8,
    /// Round displayed numbers half-away-from-zero to
    /// `precision_rounding` significant digits.
    pub smart_rounding: bool,
    /// Currency symbols accepted by the literal parser.
    pub currency_symbols: Vec<String>,
    /// Decimal separator used by number literals (`.` or `,`).
    pub decimal_separator: char,
    /// Optional thousand separator; must differ from the decimal separator.
    pub thousand_separator: Option<char>,
    /// Separator between function-call arguments.
    pub function_arg_separator: char,
    /// String comparison sensitivity.
    pub case_sensitive: bool,
    pub accent_sensitive: bool,
    /// Criteria matching options (SEARCH and friends).
    pub match_whole_cell: bool,
    pub use_wildcards: bool,
    pub use_regular_expressions: bool,
    /// Seed for the engine's deterministic sample generator.
    pub seed: u64,
    /// Translated error codes and function names.
    pub translation: Arc<TranslationPackage>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_size: 10_000,
            precision_epsilon: 1e-13,
            precision_rounding: 14,
            smart_rounding: true,
            currency_symbols: vec!["$".to_string()],
            decimal_separator: '.',
            thousand_separator: None,
            function_arg_separator: ',',
            case_sensitive: false,
            accent_sensitive: false,
            match_whole_cell: true,
            use_wildcards: true,
            use_regular_expressions: false,
            seed: 0,
            translation: Arc::new(TranslationPackage::default()),
        }
    }
}

/// Rejected configuration combinations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("decimal separator must be '.' or ','")]
    InvalidDecimalSeparator,
    #[error("thousand separator must differ from the decimal separator")]
    SeparatorCollision,
    #[error("function argument separator must differ from the decimal separator")]
    ArgSeparatorCollision,
    #[error("sample size must be at least 2")]
    SampleSizeTooSmall,
}

impl Config {
    /// Check separator and sampling constraints. Called by the engine
    /// constructor; an invalid config never produces a running engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decimal_separator != '.' && self.decimal_separator != ',' {
            return Err(ConfigError::InvalidDecimalSeparator);
        }
        if self.thousand_separator == Some(self.decimal_separator)
            || self.thousand_separator == Some(self.function_arg_separator)
        {
            return Err(ConfigError::SeparatorCollision);
        }
        if self.function_arg_separator == self.decimal_separator {
            return Err(ConfigError::ArgSeparatorCollision);
        }
        if self.sample_size < 2 {
            return Err(ConfigError::SampleSizeTooSmall);
        }
        Ok(())
    }

    /// Threshold below which a value is treated as zero.
    ///
    /// Division uses a wider guard band than the rest of the engine; both
    /// are floored so a tiny configured epsilon cannot disable the check.
    #[must_use]
    pub fn zero_threshold(&self, for_division: bool) -> f64 {
        let eps = if for_division {
            self.precision_epsilon * 1000.0
        } else {
            self.precision_epsilon
        };
        eps.max(1e-12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn separator_collisions_are_rejected() {
        let mut config = Config {
            decimal_separator: ',',
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ArgSeparatorCollision));

        config.function_arg_separator = ';';
        assert_eq!(config.validate(), Ok(()));

        config.thousand_separator = Some(',');
        assert_eq!(config.validate(), Err(ConfigError::SeparatorCollision));
    }

    #[test]
    fn zero_threshold_is_floored() {
        let config = Config {
            precision_epsilon: 1e-20,
            ..Config::default()
        };
        assert_eq!(config.zero_threshold(false), 1e-12);
        assert_eq!(config.zero_threshold(true), 1e-12);

        let default = Config::default();
        assert_eq!(default.zero_threshold(true), 1e-10);
        assert_eq!(default.zero_threshold(false), 1e-12);
    }
}
