//! The arithmetic engine: scalar operators with near-zero safety, and the
//! Monte-Carlo propagation path for distribution operands.
//!
//! Every operation where at least one operand is a distribution runs
//! elementwise over sample buffers and re-classifies the result: parametric
//! families are preserved only where the operation provably preserves them
//! (and the parameters are then refitted from the result samples); everything
//! else becomes a `Sampled` value.

use std::sync::Arc;

use rayon::prelude::*;
use riskgrid_model::ErrorKind;

use crate::config::Config;
use crate::dist::{self, SeededRng};
use crate::value::{
    additive_result_type, multiplicative_result_type, CellError, CiInterpretation, CiSource,
    NumberType, RichNumber,
};

/// Largest magnitude a division is allowed to produce (`2^53 - 1`); beyond
/// this the result would silently lose integer precision.
pub const MAX_SAFE_MAGNITUDE: f64 = 9_007_199_254_740_991.0;

/// `l + r`, snapped to zero when the sum is negligible relative to `l`.
#[must_use]
pub fn add_with_epsilon_raw(l: f64, r: f64, epsilon: f64) -> f64 {
    let sum = l + r;
    if sum.abs() < epsilon * l.abs() {
        0.0
    } else {
        sum
    }
}

/// Whether `value` is indistinguishable from zero at the configured
/// precision. Division uses a wider guard band.
#[must_use]
pub fn is_effectively_zero(value: f64, for_division: bool, config: &Config) -> bool {
    value.abs() < config.zero_threshold(for_division)
}

/// Division with zero- and overflow-guards.
pub fn safe_division(a: f64, b: f64, config: &Config) -> Result<f64, ErrorKind> {
    if b == 0.0 || is_effectively_zero(b, true, config) {
        return Err(ErrorKind::DivByZero);
    }
    let result = a / b;
    if !result.is_finite() || result.abs() > MAX_SAFE_MAGNITUDE {
        return Err(ErrorKind::DivByZero);
    }
    Ok(result)
}

/// Multiplication that returns exactly zero when either operand is
/// effectively zero, so denormal noise cannot survive a product.
#[must_use]
pub fn safe_multiplication(a: f64, b: f64, config: &Config) -> f64 {
    if is_effectively_zero(a, false, config) || is_effectively_zero(b, false, config) {
        return 0.0;
    }
    a * b
}

/// Exponentiation with spreadsheet error mapping: `0` to a negative power is
/// a division by zero, any non-finite result is `#NUM!`.
pub fn safe_pow(base: f64, exponent: f64) -> Result<f64, ErrorKind> {
    if base == 0.0 && exponent < 0.0 {
        return Err(ErrorKind::DivByZero);
    }
    let result = base.powf(exponent);
    if !result.is_finite() {
        return Err(ErrorKind::Num);
    }
    Ok(result)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum NumOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Distribution family used for result classification. Confidence intervals
/// classify as their effective parametric family.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Family {
    Scalar,
    Gaussian,
    LogNormal,
    Uniform,
    Sampled,
}

fn family_of(n: &RichNumber) -> Family {
    match n.number_type() {
        NumberType::Gaussian => Family::Gaussian,
        NumberType::LogNormal => Family::LogNormal,
        NumberType::Uniform => Family::Uniform,
        NumberType::Sampled => Family::Sampled,
        NumberType::ConfidenceInterval => match n {
            RichNumber::ConfidenceInterval {
                lo,
                hi,
                interpretation,
                ..
            } => match RichNumber::effective_ci_interpretation(*lo, *hi, *interpretation) {
                CiInterpretation::Normal => Family::Gaussian,
                CiInterpretation::Uniform => Family::Uniform,
                CiInterpretation::LogNormal => Family::LogNormal,
                CiInterpretation::Auto => Family::Gaussian,
            },
            _ => Family::Sampled,
        },
        _ => Family::Scalar,
    }
}

/// The arithmetic engine proper. Holds the shared configuration and the
/// engine's deterministic generator; one instance lives for the duration of
/// a recompute pass.
pub struct ArithContext<'a> {
    config: &'a Config,
    rng: &'a mut SeededRng,
}

impl<'a> ArithContext<'a> {
    pub fn new(config: &'a Config, rng: &'a mut SeededRng) -> Self {
        Self { config, rng }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        self.config
    }

    pub fn rng(&mut self) -> &mut SeededRng {
        self.rng
    }

    pub fn add(&mut self, l: &RichNumber, r: &RichNumber) -> Result<RichNumber, CellError> {
        if l.is_distribution() || r.is_distribution() {
            return self.combine(NumOp::Add, l, r);
        }
        let val = add_with_epsilon_raw(l.val(), r.val(), self.config.precision_epsilon);
        Ok(wrap_additive(l, r, val))
    }

    pub fn sub(&mut self, l: &RichNumber, r: &RichNumber) -> Result<RichNumber, CellError> {
        if l.is_distribution() || r.is_distribution() {
            return self.combine(NumOp::Sub, l, r);
        }
        let val = add_with_epsilon_raw(l.val(), -r.val(), self.config.precision_epsilon);
        Ok(wrap_additive(l, r, val))
    }

    pub fn mul(&mut self, l: &RichNumber, r: &RichNumber) -> Result<RichNumber, CellError> {
        if l.is_distribution() || r.is_distribution() {
            return self.combine(NumOp::Mul, l, r);
        }
        let val = safe_multiplication(l.val(), r.val(), self.config);
        Ok(wrap_multiplicative(l, r, val))
    }

    pub fn div(&mut self, l: &RichNumber, r: &RichNumber) -> Result<RichNumber, CellError> {
        if l.is_distribution() || r.is_distribution() {
            return self.combine(NumOp::Div, l, r);
        }
        let val = safe_division(l.val(), r.val(), self.config).map_err(CellError::new)?;
        Ok(wrap_multiplicative(l, r, val))
    }

    pub fn pow(&mut self, l: &RichNumber, r: &RichNumber) -> Result<RichNumber, CellError> {
        if l.is_distribution() || r.is_distribution() {
            return self.combine(NumOp::Pow, l, r);
        }
        let val = safe_pow(l.val(), r.val()).map_err(CellError::new)?;
        Ok(wrap_multiplicative(l, r, val))
    }

    /// Ordered comparison by representative value, under the configured
    /// epsilon band. Distributions compare by their representative scalar;
    /// sampling an ordering elementwise has no spreadsheet meaning.
    #[must_use]
    pub fn compare(&self, l: &RichNumber, r: &RichNumber) -> std::cmp::Ordering {
        crate::value::float_cmp(l.val(), r.val(), self.config.precision_epsilon)
    }

    #[must_use]
    pub fn lt(&self, l: &RichNumber, r: &RichNumber) -> bool {
        self.compare(l, r) == std::cmp::Ordering::Less
    }

    #[must_use]
    pub fn leq(&self, l: &RichNumber, r: &RichNumber) -> bool {
        self.compare(l, r) != std::cmp::Ordering::Greater
    }

    #[must_use]
    pub fn gt(&self, l: &RichNumber, r: &RichNumber) -> bool {
        self.compare(l, r) == std::cmp::Ordering::Greater
    }

    #[must_use]
    pub fn geq(&self, l: &RichNumber, r: &RichNumber) -> bool {
        self.compare(l, r) != std::cmp::Ordering::Less
    }

    #[must_use]
    pub fn eq(&self, l: &RichNumber, r: &RichNumber) -> bool {
        self.compare(l, r) == std::cmp::Ordering::Equal
    }

    #[must_use]
    pub fn neq(&self, l: &RichNumber, r: &RichNumber) -> bool {
        !self.eq(l, r)
    }

    /// Negation. Affine, so every parametric family survives with mapped
    /// parameters; log-normals lose their family (their support flips sign).
    #[must_use]
    pub fn unary_minus(&mut self, x: &RichNumber) -> RichNumber {
        match x {
            RichNumber::Gaussian {
                mean,
                variance,
                samples,
            } => RichNumber::Gaussian {
                mean: -mean,
                variance: *variance,
                samples: samples.as_ref().map(|s| negated(s)),
            },
            RichNumber::Uniform { lo, hi, samples } => RichNumber::Uniform {
                lo: -hi,
                hi: -lo,
                samples: samples.as_ref().map(|s| negated(s)),
            },
            RichNumber::Sampled { samples } => RichNumber::Sampled {
                samples: negated(samples),
            },
            RichNumber::LogNormal { .. } => match self.samples_of(x) {
                Ok(samples) => RichNumber::Sampled {
                    samples: negated(&samples),
                },
                Err(_) => RichNumber::Raw(-x.val()),
            },
            RichNumber::ConfidenceInterval {
                lo,
                hi,
                confidence,
                interpretation,
                ..
            } => RichNumber::confidence_interval(
                -hi,
                -lo,
                *confidence,
                *interpretation,
                CiSource::Derived,
            ),
            scalar => scalar.with_value(-scalar.val()),
        }
    }

    /// Identity.
    #[must_use]
    pub fn unary_plus(&self, x: &RichNumber) -> RichNumber {
        x.clone()
    }

    /// The postfix `%` operator: divide by 100. Affine, so parametric
    /// families keep their shape with scaled parameters.
    #[must_use]
    pub fn unary_percent(&self, x: &RichNumber) -> RichNumber {
        const SCALE: f64 = 0.01;
        match x {
            RichNumber::Gaussian {
                mean,
                variance,
                samples,
            } => RichNumber::Gaussian {
                mean: mean * SCALE,
                variance: variance * SCALE * SCALE,
                samples: samples.as_ref().map(|s| scaled(s, SCALE)),
            },
            RichNumber::Uniform { lo, hi, samples } => RichNumber::Uniform {
                lo: lo * SCALE,
                hi: hi * SCALE,
                samples: samples.as_ref().map(|s| scaled(s, SCALE)),
            },
            RichNumber::LogNormal {
                mu,
                sigma_sq,
                samples,
            } => RichNumber::LogNormal {
                mu: mu + SCALE.ln(),
                sigma_sq: *sigma_sq,
                samples: samples.as_ref().map(|s| scaled(s, SCALE)),
            },
            RichNumber::Sampled { samples } => RichNumber::Sampled {
                samples: scaled(samples, SCALE),
            },
            RichNumber::ConfidenceInterval {
                lo,
                hi,
                confidence,
                interpretation,
                ..
            } => RichNumber::confidence_interval(
                lo * SCALE,
                hi * SCALE,
                *confidence,
                *interpretation,
                CiSource::Derived,
            ),
            scalar => RichNumber::Percent {
                val: scalar.val() * SCALE,
            },
        }
    }

    /// Obtain a sample buffer for any rich number.
    ///
    /// Distribution kinds reuse their cached buffer or draw a fresh one of
    /// `sample_size` draws from their parameters; confidence intervals
    /// convert to their parametric form first; scalars lift to a constant
    /// vector. Non-finite draws surface as `#NUM!`.
    pub fn samples_of(&mut self, n: &RichNumber) -> Result<Arc<[f64]>, CellError> {
        let size = self.config.sample_size;
        let samples: Vec<f64> = match n {
            RichNumber::Gaussian {
                mean,
                variance,
                samples,
            } => match samples {
                Some(s) => return Ok(Arc::clone(s)),
                None => dist::gaussian_samples(*mean, *variance, size, self.rng),
            },
            RichNumber::LogNormal {
                mu,
                sigma_sq,
                samples,
            } => match samples {
                Some(s) => return Ok(Arc::clone(s)),
                None => dist::lognormal_samples(*mu, *sigma_sq, size, self.rng),
            },
            RichNumber::Uniform { lo, hi, samples } => match samples {
                Some(s) => return Ok(Arc::clone(s)),
                None => dist::uniform_samples(*lo, *hi, size, self.rng),
            },
            RichNumber::Sampled { samples } => return Ok(Arc::clone(samples)),
            RichNumber::ConfidenceInterval {
                lo,
                hi,
                confidence,
                interpretation,
                ..
            } => self.ci_samples(*lo, *hi, *confidence, *interpretation),
            scalar => dist::constant_samples(scalar.val(), size),
        };

        if samples.iter().any(|x| !x.is_finite()) {
            return Err(CellError::with_message(
                ErrorKind::Num,
                "sample generation overflowed",
            ));
        }
        Ok(samples.into())
    }

    /// Confidence-interval draws under the effective interpretation.
    ///
    /// The z-score divisor is keyed off the requested confidence level for
    /// all three interpretations, including the log-normal one.
    fn ci_samples(
        &mut self,
        lo: f64,
        hi: f64,
        confidence: f64,
        interpretation: CiInterpretation,
    ) -> Vec<f64> {
        let size = self.config.sample_size;
        let z = dist::z_score(confidence);
        match RichNumber::effective_ci_interpretation(lo, hi, interpretation) {
            CiInterpretation::Uniform => dist::uniform_samples(lo, hi, size, self.rng),
            CiInterpretation::LogNormal => {
                let ln_lo = lo.ln();
                let ln_hi = hi.ln();
                let mu = (ln_lo + ln_hi) / 2.0;
                let sigma = (ln_hi - ln_lo) / (2.0 * z);
                dist::lognormal_samples(mu, sigma * sigma, size, self.rng)
            }
            _ => {
                let mean = (lo + hi) / 2.0;
                let sigma = (hi - lo) / (2.0 * z);
                dist::gaussian_samples(mean, sigma * sigma, size, self.rng)
            }
        }
    }

    /// The Monte-Carlo path: elementwise application plus family
    /// classification and refitting.
    fn combine(
        &mut self,
        op: NumOp,
        l: &RichNumber,
        r: &RichNumber,
    ) -> Result<RichNumber, CellError> {
        let ls = self.samples_of(l)?;
        let rs = self.samples_of(r)?;
        let out = elementwise(op, &ls, &rs, self.config).map_err(CellError::new)?;

        if out.iter().any(|x| !x.is_finite()) {
            return Err(CellError::with_message(
                ErrorKind::Num,
                "sample propagation overflowed",
            ));
        }

        Ok(classify_and_fit(op, l, r, out))
    }
}

fn negated(samples: &Arc<[f64]>) -> Arc<[f64]> {
    samples.iter().map(|x| -x).collect()
}

fn scaled(samples: &Arc<[f64]>, factor: f64) -> Arc<[f64]> {
    samples.iter().map(|x| x * factor).collect()
}

/// Elementwise operator application with the safety wrappers. A single
/// failing element fails the whole operation (no partial results).
fn elementwise(op: NumOp, ls: &[f64], rs: &[f64], config: &Config) -> Result<Vec<f64>, ErrorKind> {
    let pairs = ls.par_iter().zip(rs.par_iter());
    match op {
        NumOp::Add => Ok(pairs.map(|(a, b)| a + b).collect()),
        NumOp::Sub => Ok(pairs.map(|(a, b)| a - b).collect()),
        NumOp::Mul => Ok(pairs
            .map(|(a, b)| safe_multiplication(*a, *b, config))
            .collect()),
        NumOp::Div => pairs
            .map(|(a, b)| safe_division(*a, *b, config))
            .collect::<Result<Vec<f64>, ErrorKind>>(),
        NumOp::Pow => pairs
            .map(|(a, b)| safe_pow(*a, *b))
            .collect::<Result<Vec<f64>, ErrorKind>>(),
    }
}

/// Decide the result family and refit its parameters from the samples.
fn classify_and_fit(op: NumOp, l: &RichNumber, r: &RichNumber, samples: Vec<f64>) -> RichNumber {
    let lf = family_of(l);
    let rf = family_of(r);

    let family = match op {
        NumOp::Add | NumOp::Sub => additive_family(lf, rf),
        NumOp::Mul => multiplicative_family(lf, rf, l, r, true),
        NumOp::Div => multiplicative_family(lf, rf, l, r, false),
        NumOp::Pow => {
            if lf == Family::LogNormal && rf == Family::Scalar {
                Family::LogNormal
            } else {
                Family::Sampled
            }
        }
    };

    let samples: Arc<[f64]> = samples.into();
    match family {
        Family::Gaussian => {
            let (mean, variance) = dist::fit_normal(&samples);
            RichNumber::Gaussian {
                mean,
                variance,
                samples: Some(samples),
            }
        }
        Family::Uniform => {
            let (lo, hi) = dist::fit_uniform(&samples);
            RichNumber::Uniform {
                lo,
                hi,
                samples: Some(samples),
            }
        }
        Family::LogNormal => match dist::fit_lognormal(&samples) {
            Some((mu, sigma_sq)) => RichNumber::LogNormal {
                mu,
                sigma_sq,
                samples: Some(samples),
            },
            None => RichNumber::Sampled { samples },
        },
        Family::Scalar | Family::Sampled => RichNumber::Sampled { samples },
    }
}

/// `+`/`-` preservation: normality survives shifts by scalars and sums with
/// other normals; uniformity survives shifts by scalars only.
fn additive_family(lf: Family, rf: Family) -> Family {
    match (lf, rf) {
        (Family::Gaussian, Family::Gaussian)
        | (Family::Gaussian, Family::Scalar)
        | (Family::Scalar, Family::Gaussian) => Family::Gaussian,
        (Family::Uniform, Family::Scalar) | (Family::Scalar, Family::Uniform) => Family::Uniform,
        _ => Family::Sampled,
    }
}

/// `*`/`/` preservation: log-normality survives products/quotients with
/// other log-normals and with positive scalars; uniformity survives scaling
/// by a scalar (numerator side only for division). A Gaussian times a
/// Gaussian is not preserved.
fn multiplicative_family(
    lf: Family,
    rf: Family,
    l: &RichNumber,
    r: &RichNumber,
    symmetric: bool,
) -> Family {
    let positive_scalar = |n: &RichNumber| n.val() > 0.0;
    match (lf, rf) {
        (Family::LogNormal, Family::LogNormal) => Family::LogNormal,
        (Family::LogNormal, Family::Scalar) if positive_scalar(r) => Family::LogNormal,
        (Family::Scalar, Family::LogNormal) if positive_scalar(l) => Family::LogNormal,
        (Family::Uniform, Family::Scalar) => Family::Uniform,
        (Family::Scalar, Family::Uniform) if symmetric => Family::Uniform,
        _ => Family::Sampled,
    }
}

/// Wrap a scalar additive result with the promoted type, carrying the format
/// of whichever operand donated the type.
fn wrap_additive(l: &RichNumber, r: &RichNumber, val: f64) -> RichNumber {
    let result_type = additive_result_type(l.number_type(), r.number_type());
    wrap_scalar(result_type, l, r, val)
}

fn wrap_multiplicative(l: &RichNumber, r: &RichNumber, val: f64) -> RichNumber {
    let result_type = multiplicative_result_type(l.number_type(), r.number_type());
    wrap_scalar(result_type, l, r, val)
}

fn wrap_scalar(result_type: NumberType, l: &RichNumber, r: &RichNumber, val: f64) -> RichNumber {
    if l.number_type() == result_type {
        return l.with_value(val);
    }
    if r.number_type() == result_type {
        return r.with_value(val);
    }
    // Synthesized types (Date + Time -> DateTime, demotions -> Raw).
    match result_type {
        NumberType::DateTime => RichNumber::DateTime { val, format: None },
        NumberType::Percent => RichNumber::Percent { val },
        _ => RichNumber::Raw(val),
    }
}
