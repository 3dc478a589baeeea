use std::fmt::Debug;
use std::ops::Range;

use num_traits::Float;

use crate::bias::{compute_bias, confidence_interval, constant, Interval, Preanalytical};
use crate::config::Config;
use crate::curve::{BiasCurve, Visualization};
use crate::profile::{Analyte, ParameterProfile, ParameterTable};
use crate::Result;

/// Outcome of inverting a bias
///
/// A bias of exactly -100% maps every true value to zero, so nothing can be recovered from the
/// measurement. That case is carried as [`Correction::Undefined`] rather than as a NaN.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Correction<T> {
    Defined(T),
    Undefined,
}

impl<T> Correction<T> {
    pub const fn is_defined(&self) -> bool {
        matches!(self, Self::Defined(_))
    }

    pub fn value(self) -> Option<T> {
        match self {
            Self::Defined(value) => Some(value),
            Self::Undefined => None,
        }
    }
}

fn defined_if_finite<E: Float>(value: E) -> Correction<E> {
    if value.is_finite() {
        Correction::Defined(value)
    } else {
        Correction::Undefined
    }
}

/// Remove a relative bias from a measured value
///
/// $$
///     v_c = \frac{v}{1 + p / 100}
/// $$
///
/// ```
/// use hemobias::correction::invert_bias;
/// use hemobias::Correction;
///
/// assert_eq!(invert_bias(12.0, 20.0), Correction::Defined(10.0));
/// assert_eq!(invert_bias(12.0, -100.0), Correction::Undefined);
/// ```
pub fn invert_bias<E: Float>(value: E, percent_bias: E) -> Correction<E> {
    let denominator = E::one() + percent_bias / constant(100.0);
    if denominator == E::zero() {
        return Correction::Undefined;
    }
    defined_if_finite(value / denominator)
}

/// Map a confidence interval on the bias onto the corrected value
///
/// The correction $v / (1 + p/100)$ decreases with $p$ for a positive value, so the lower
/// corrected bound usually comes from the upper bias bound. For a negative value the map
/// increases with $p$ and the bounds keep their order. Either way the result is ordered
/// `low <= high`.
///
/// An interval reaching -100% contains the pole of the correction and has no finite image.
pub fn invert_interval<E: Float>(value: E, interval: Interval<E>) -> Correction<Interval<E>> {
    let pole: E = constant(-100.0);
    if interval.low <= pole && pole <= interval.high {
        return Correction::Undefined;
    }

    match (
        invert_bias(value, interval.high),
        invert_bias(value, interval.low),
    ) {
        (Correction::Defined(first), Correction::Defined(second)) => {
            Correction::Defined(Interval {
                low: first.min(second),
                high: first.max(second),
            })
        }
        _ => Correction::Undefined,
    }
}

/// A single correction request
#[derive(Clone, Copy, Debug)]
pub struct CorrectionInput<'a, E> {
    pub parameter: &'a ParameterProfile<E>,
    /// Free hemoglobin concentration as entered
    pub hb: E,
    /// The value reported by the analyser
    pub measured_value: E,
    pub conditions: Preanalytical,
}

/// Everything derived from a [`CorrectionInput`]
#[derive(Clone, Debug, PartialEq)]
pub struct CorrectionResult<E> {
    pub analyte: Analyte,
    /// Hb as entered
    pub hb: E,
    /// Hb the regression was evaluated at
    pub effective_hb: E,
    /// Bias predicted by the regression alone
    pub regression_bias: E,
    /// Handling conditions the request was made with
    pub conditions: Preanalytical,
    /// Bias after the preanalytical adjustment
    pub percent_bias: E,
    /// 95% confidence interval on `percent_bias`
    pub interval: Interval<E>,
    pub measured_value: E,
    pub corrected_value: Correction<E>,
    /// Image of `interval` under the correction
    pub corrected_interval: Correction<Interval<E>>,
}

impl<E: Float> CorrectionResult<E> {
    pub const fn preanalytical_adjusted(&self) -> bool {
        self.conditions.count() > 0
    }
}

/// Computes corrections against a fixed parameter table
///
/// The corrector holds no per-request state. Each call to [`BiasCorrector::compute`] is a pure
/// function of its input and the immutable table and config.
#[derive(Clone, Debug)]
pub struct BiasCorrector<E> {
    table: ParameterTable<E>,
    config: Config,
}

impl<E: Float + Debug> BiasCorrector<E> {
    /// # Errors
    /// Returns an error if `config` fails [`Config::validate`].
    pub fn new(table: ParameterTable<E>, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { table, config })
    }

    pub const fn table(&self) -> &ParameterTable<E> {
        &self.table
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Build a request for the parameter called `name`
    ///
    /// # Errors
    /// Returns [`crate::Error::UnknownParameter`] if `name` is not in the table.
    pub fn input(
        &self,
        name: &str,
        hb: E,
        measured_value: E,
        conditions: Preanalytical,
    ) -> Result<CorrectionInput<'_, E>> {
        Ok(CorrectionInput {
            parameter: self.table.get(name)?,
            hb,
            measured_value,
            conditions,
        })
    }

    /// Hb at which the regression is evaluated
    pub fn effective_hb(&self, hb: E) -> E {
        if self.config.unit_hb_when_missing && hb <= E::zero() {
            E::one()
        } else {
            hb
        }
    }

    /// Correct a measured value for hemolysis and preanalytical handling
    pub fn compute(&self, input: &CorrectionInput<'_, E>) -> CorrectionResult<E> {
        let profile = input.parameter;
        let effective_hb = self.effective_hb(input.hb);

        let regression_bias = compute_bias(effective_hb, profile.a(), profile.b());
        let percent_bias = self
            .config
            .strategy
            .apply(regression_bias, input.hb, input.conditions);
        let interval = confidence_interval(percent_bias, profile.r_squared());

        let corrected_value = invert_bias(input.measured_value, percent_bias);
        let corrected_interval = invert_interval(input.measured_value, interval);

        tracing::debug!(
            analyte = %profile.name(),
            hb = ?input.hb,
            ?effective_hb,
            ?percent_bias,
            ?interval,
            ?corrected_value,
            "computed correction"
        );
        if !corrected_value.is_defined() {
            tracing::warn!(
                analyte = %profile.name(),
                ?percent_bias,
                "correction is undefined at this bias"
            );
        }

        CorrectionResult {
            analyte: profile.name().clone(),
            hb: input.hb,
            effective_hb,
            regression_bias,
            conditions: input.conditions,
            percent_bias,
            interval,
            measured_value: input.measured_value,
            corrected_value,
            corrected_interval,
        }
    }

    /// Look up `name` and compute its correction in one step
    ///
    /// # Errors
    /// Returns [`crate::Error::UnknownParameter`] if `name` is not in the table.
    pub fn correct(
        &self,
        name: &str,
        hb: E,
        measured_value: E,
        conditions: Preanalytical,
    ) -> Result<CorrectionResult<E>> {
        let input = self.input(name, hb, measured_value, conditions)?;
        Ok(self.compute(&input))
    }

    /// The bias curve of `profile` over the configured Hb domain
    pub fn curve(&self, profile: &ParameterProfile<E>) -> BiasCurve<E> {
        BiasCurve::for_profile(profile, self.domain(), self.config.samples)
    }

    fn domain(&self) -> Range<E> {
        constant(self.config.hb_min)..constant(self.config.hb_max)
    }

    /// Series for plotting `result`
    ///
    /// # Errors
    /// Returns [`crate::Error::UnknownParameter`] if `result` was computed against a parameter
    /// missing from this corrector's table.
    pub fn visualize(&self, result: &CorrectionResult<E>) -> Result<Visualization<E>> {
        let profile = self.table.get(result.analyte.as_str())?;
        Ok(Visualization::new(&self.curve(profile), result))
    }
}
