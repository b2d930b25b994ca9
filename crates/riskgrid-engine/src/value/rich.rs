use std::sync::Arc;

use crate::dist;

/// Fine-grained tag of a [`RichNumber`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NumberType {
    Raw,
    Currency,
    Percent,
    Date,
    Time,
    DateTime,
    Gaussian,
    LogNormal,
    Uniform,
    ConfidenceInterval,
    Sampled,
}

impl NumberType {
    #[must_use]
    pub const fn is_distribution(self) -> bool {
        matches!(
            self,
            NumberType::Gaussian
                | NumberType::LogNormal
                | NumberType::Uniform
                | NumberType::ConfidenceInterval
                | NumberType::Sampled
        )
    }
}

/// How a confidence interval's bounds are read as a distribution.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CiInterpretation {
    Normal,
    Uniform,
    LogNormal,
    /// Choose log-normal for wide positive intervals (`hi/lo >= 2`),
    /// normal otherwise.
    Auto,
}

/// Which literal form produced a confidence interval.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CiSource {
    /// `CI[a, b]` or bare `[a, b]`.
    Brackets,
    /// `a to b`.
    Keyword,
    /// Legacy `P<conf>[a, b]`.
    Legacy,
    /// Produced by arithmetic or a function rather than a literal.
    Derived,
}

/// A numeric cell value that also carries semantic type: plain float,
/// currency, percentage, date/time, or one of the distribution kinds.
///
/// Sample buffers are immutable after creation (`Arc<[f64]>`); cloning a
/// value shares the buffer, and arithmetic always allocates a fresh one for
/// its result. Parametric variants may omit their buffer and regenerate it
/// on demand from the stored parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum RichNumber {
    Raw(f64),
    Currency {
        val: f64,
        symbol: String,
    },
    /// Stored as a fraction: `5%` is `0.05`.
    Percent {
        val: f64,
    },
    /// Serial day number since the spreadsheet epoch (1899-12-30).
    Date {
        val: f64,
        format: Option<String>,
    },
    /// Fraction of a day.
    Time {
        val: f64,
        format: Option<String>,
    },
    DateTime {
        val: f64,
        format: Option<String>,
    },
    Gaussian {
        mean: f64,
        variance: f64,
        samples: Option<Arc<[f64]>>,
    },
    /// `X = exp(Y)` with `Y ~ N(mu, sigma_sq)`.
    LogNormal {
        mu: f64,
        sigma_sq: f64,
        samples: Option<Arc<[f64]>>,
    },
    /// Half-open interval `[lo, hi)`.
    Uniform {
        lo: f64,
        hi: f64,
        samples: Option<Arc<[f64]>>,
    },
    /// Input-only distribution form; converts to its parametric family when
    /// arithmetic needs samples.
    ConfidenceInterval {
        lo: f64,
        hi: f64,
        confidence: f64,
        interpretation: CiInterpretation,
        source: CiSource,
    },
    /// Monte-Carlo result.
    Sampled {
        samples: Arc<[f64]>,
    },
}

impl RichNumber {
    /// Construct a confidence interval, normalising reversed bounds and
    /// applying the log-normal positivity fallback: a `LogNormal`
    /// interpretation with a non-positive bound degrades to `Normal`.
    #[must_use]
    pub fn confidence_interval(
        lo: f64,
        hi: f64,
        confidence: f64,
        interpretation: CiInterpretation,
        source: CiSource,
    ) -> Self {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let interpretation = match interpretation {
            CiInterpretation::LogNormal if lo <= 0.0 => CiInterpretation::Normal,
            other => other,
        };
        RichNumber::ConfidenceInterval {
            lo,
            hi,
            confidence,
            interpretation,
            source,
        }
    }

    #[must_use]
    pub const fn number_type(&self) -> NumberType {
        match self {
            RichNumber::Raw(_) => NumberType::Raw,
            RichNumber::Currency { .. } => NumberType::Currency,
            RichNumber::Percent { .. } => NumberType::Percent,
            RichNumber::Date { .. } => NumberType::Date,
            RichNumber::Time { .. } => NumberType::Time,
            RichNumber::DateTime { .. } => NumberType::DateTime,
            RichNumber::Gaussian { .. } => NumberType::Gaussian,
            RichNumber::LogNormal { .. } => NumberType::LogNormal,
            RichNumber::Uniform { .. } => NumberType::Uniform,
            RichNumber::ConfidenceInterval { .. } => NumberType::ConfidenceInterval,
            RichNumber::Sampled { .. } => NumberType::Sampled,
        }
    }

    #[must_use]
    pub const fn is_distribution(&self) -> bool {
        self.number_type().is_distribution()
    }

    /// The effective interpretation of a confidence interval, with `Auto`
    /// resolved: log-normal for positive intervals at least a factor of two
    /// wide, normal otherwise.
    #[must_use]
    pub fn effective_ci_interpretation(
        lo: f64,
        hi: f64,
        interpretation: CiInterpretation,
    ) -> CiInterpretation {
        match interpretation {
            CiInterpretation::Auto => {
                if lo > 0.0 && hi / lo >= 2.0 {
                    CiInterpretation::LogNormal
                } else {
                    CiInterpretation::Normal
                }
            }
            CiInterpretation::LogNormal if lo <= 0.0 => CiInterpretation::Normal,
            other => other,
        }
    }

    /// Representative scalar used for display, comparison and scalar
    /// contexts.
    #[must_use]
    pub fn val(&self) -> f64 {
        match self {
            RichNumber::Raw(v) => *v,
            RichNumber::Currency { val, .. } => *val,
            RichNumber::Percent { val } => *val,
            RichNumber::Date { val, .. } => *val,
            RichNumber::Time { val, .. } => *val,
            RichNumber::DateTime { val, .. } => *val,
            RichNumber::Gaussian { mean, .. } => *mean,
            RichNumber::LogNormal { mu, sigma_sq, .. } => (mu + sigma_sq / 2.0).exp(),
            RichNumber::Uniform { lo, hi, .. } => (lo + hi) / 2.0,
            RichNumber::ConfidenceInterval {
                lo,
                hi,
                interpretation,
                ..
            } => match Self::effective_ci_interpretation(*lo, *hi, *interpretation) {
                CiInterpretation::LogNormal => (lo * hi).sqrt(),
                _ => (lo + hi) / 2.0,
            },
            RichNumber::Sampled { samples } => dist::mean(samples),
        }
    }

    /// Clone this value with a new representative scalar, preserving
    /// auxiliary data: format and symbol for plain kinds, spread for
    /// distribution kinds, bounds width and interpretation for confidence
    /// intervals. Cached sample buffers are dropped (they describe the old
    /// value).
    #[must_use]
    pub fn with_value(&self, val: f64) -> RichNumber {
        match self {
            RichNumber::Raw(_) => RichNumber::Raw(val),
            RichNumber::Currency { symbol, .. } => RichNumber::Currency {
                val,
                symbol: symbol.clone(),
            },
            RichNumber::Percent { .. } => RichNumber::Percent { val },
            RichNumber::Date { format, .. } => RichNumber::Date {
                val,
                format: format.clone(),
            },
            RichNumber::Time { format, .. } => RichNumber::Time {
                val,
                format: format.clone(),
            },
            RichNumber::DateTime { format, .. } => RichNumber::DateTime {
                val,
                format: format.clone(),
            },
            RichNumber::Gaussian { variance, .. } => RichNumber::Gaussian {
                mean: val,
                variance: *variance,
                samples: None,
            },
            RichNumber::LogNormal { sigma_sq, .. } => {
                if val > 0.0 {
                    RichNumber::LogNormal {
                        mu: val.ln() - sigma_sq / 2.0,
                        sigma_sq: *sigma_sq,
                        samples: None,
                    }
                } else {
                    RichNumber::Raw(val)
                }
            }
            RichNumber::Uniform { lo, hi, .. } => {
                let half_width = (hi - lo) / 2.0;
                RichNumber::Uniform {
                    lo: val - half_width,
                    hi: val + half_width,
                    samples: None,
                }
            }
            RichNumber::ConfidenceInterval {
                lo,
                hi,
                confidence,
                interpretation,
                ..
            } => {
                let shift = val - self.val();
                RichNumber::confidence_interval(
                    lo + shift,
                    hi + shift,
                    *confidence,
                    *interpretation,
                    CiSource::Derived,
                )
            }
            RichNumber::Sampled { samples } => {
                let shift = val - dist::mean(samples);
                RichNumber::Sampled {
                    samples: samples.iter().map(|x| x + shift).collect(),
                }
            }
        }
    }
}

/// Result type of `+` and `-` for non-distribution operands.
///
/// Distribution operands never reach this table; they classify through the
/// sampling engine instead.
#[must_use]
pub fn additive_result_type(left: NumberType, right: NumberType) -> NumberType {
    use NumberType::*;
    match (left, right) {
        (Date, Time) | (Time, Date) => DateTime,
        (DateTime, Date) | (Date, DateTime) => Raw,
        (Raw, other) => other,
        (other, _) => other,
    }
}

/// Result type of `*`, `/` and `^` for non-distribution operands.
///
/// Percentages are demoted to plain numbers before combining, so
/// `10% * 10%` is a plain `0.01` rather than a percentage of a percentage.
#[must_use]
pub fn multiplicative_result_type(left: NumberType, right: NumberType) -> NumberType {
    use NumberType::*;
    let left = if left == Percent { Raw } else { left };
    let right = if right == Percent { Raw } else { right };
    match (left, right) {
        (Raw, other) => other,
        (other, Raw) => other,
        _ => Raw,
    }
}
