use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Two-sided 95% quantile of the standard normal distribution
pub const Z_95: f64 = 1.96;

/// Extra relative bias when exactly one preanalytical factor applies
pub const SINGLE_FACTOR_EXTRA: f64 = 0.40;

/// Extra relative bias when both preanalytical factors apply
pub const BOTH_FACTORS_EXTRA: f64 = 0.60;

pub(crate) fn constant<E: Float>(value: f64) -> E {
    E::from(value).expect("f64 constant must be representable in `E`")
}

/// Percent bias at Hb concentration `hb` for the regression $p = a H + b$
pub fn compute_bias<E: Float>(hb: E, a: E, b: E) -> E {
    a * hb + b
}

/// Sample handling conditions before analysis
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Preanalytical {
    /// The sample was transported at room temperature
    pub room_temp: bool,
    /// More than eight hours passed before the sample was processed
    pub delay_over_8h: bool,
}

impl Preanalytical {
    pub const fn new(room_temp: bool, delay_over_8h: bool) -> Self {
        Self {
            room_temp,
            delay_over_8h,
        }
    }

    /// Number of adverse handling conditions present
    pub const fn count(self) -> usize {
        self.room_temp as usize + self.delay_over_8h as usize
    }

    /// The fractional increase in bias attributed to handling: 0.60 for both factors, 0.40 for
    /// either one, zero otherwise.
    pub fn extra_bias<E: Float>(self) -> E {
        match self.count() {
            0 => E::zero(),
            1 => constant(SINGLE_FACTOR_EXTRA),
            _ => constant(BOTH_FACTORS_EXTRA),
        }
    }
}

/// Policy used to scale the hemolysis bias for preanalytical handling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Scale the bias by `1 + extra`, independent of Hb
    #[default]
    Multiplicative,
    /// Scale the bias by `1 + extra` below Hb = 1 and by `1 + extra * Hb` from Hb = 1 upwards.
    ///
    /// The factor grows without bound with Hb, so at high hemolysis the handling term dominates
    /// the regression. Treat results far above Hb = 1 with care.
    HbProportional,
}

impl Strategy {
    /// Apply the handling adjustment to `percent_bias`
    ///
    /// `hb` is the Hb value as entered, before any fallback for a missing entry.
    pub fn apply<E: Float>(self, percent_bias: E, hb: E, conditions: Preanalytical) -> E {
        let extra: E = conditions.extra_bias();
        if extra == E::zero() {
            return percent_bias;
        }

        match self {
            Self::Multiplicative => percent_bias * (E::one() + extra),
            Self::HbProportional => {
                if hb < E::one() {
                    percent_bias * (E::one() + extra)
                } else {
                    percent_bias * (E::one() + extra * hb)
                }
            }
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "multiplicative" => Ok(Self::Multiplicative),
            "hb-proportional" | "proportional" => Ok(Self::HbProportional),
            other => Err(format!("unknown strategy {other:?}")),
        }
    }
}

/// A symmetric interval around a percent bias
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval<E> {
    pub low: E,
    pub high: E,
}

impl<E: Float> Interval<E> {
    pub fn contains(&self, value: E) -> bool {
        self.low <= value && value <= self.high
    }

    pub fn width(&self) -> E {
        self.high - self.low
    }
}

/// 95% confidence interval on `percent_bias` given the regression's coefficient of
/// determination
///
/// The standard error is taken relative to the bias itself
///
/// $$
///     SE = |p| \sqrt{1 - R^2}
/// $$
///
/// and the interval is $p \pm 1.96 \, SE$. `r_squared` is validated into `[0, 1]` when a
/// [`crate::ParameterProfile`] is built, so the square root is always real.
pub fn confidence_interval<E: Float>(percent_bias: E, r_squared: E) -> Interval<E> {
    let standard_error = percent_bias.abs() * (E::one() - r_squared).sqrt();
    let half_width = constant::<E>(Z_95) * standard_error;
    Interval {
        low: percent_bias - half_width,
        high: percent_bias + half_width,
    }
}

#[cfg(test)]
mod test {
    use ndarray_rand::rand::{Rng, SeedableRng};
    use rand_isaac::Isaac64Rng;

    use super::{compute_bias, confidence_interval, Preanalytical, Strategy};

    const NONE: Preanalytical = Preanalytical::new(false, false);
    const ROOM_TEMP: Preanalytical = Preanalytical::new(true, false);
    const DELAYED: Preanalytical = Preanalytical::new(false, true);
    const BOTH: Preanalytical = Preanalytical::new(true, true);

    #[test]
    fn bias_is_linear_in_hb() {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);

        for _ in 0..100 {
            let hb: f64 = rng.gen_range(0.0..10.0);
            let a: f64 = rng.gen_range(-10.0..10.0);
            let b: f64 = rng.gen_range(-10.0..10.0);
            assert_eq!(compute_bias(hb, a, b), a * hb + b);
        }
    }

    #[test]
    fn beta_hydroxybutyrate_bias_at_unit_hb() {
        approx::assert_relative_eq!(
            compute_bias(1.0, 5.3201, 0.957),
            6.2771,
            max_relative = 1e-12
        );
    }

    #[test]
    fn extra_bias_depends_on_number_of_conditions() {
        approx::assert_relative_eq!(NONE.extra_bias::<f64>(), 0.0);
        approx::assert_relative_eq!(ROOM_TEMP.extra_bias::<f64>(), 0.4);
        approx::assert_relative_eq!(DELAYED.extra_bias::<f64>(), 0.4);
        approx::assert_relative_eq!(BOTH.extra_bias::<f64>(), 0.6);
    }

    #[test]
    fn multiplicative_strategy_ignores_hb() {
        let strategy = Strategy::Multiplicative;
        for hb in [0.0, 0.5, 1.0, 7.5] {
            approx::assert_relative_eq!(strategy.apply(10.0, hb, NONE), 10.0);
            approx::assert_relative_eq!(strategy.apply(10.0, hb, ROOM_TEMP), 14.0);
            approx::assert_relative_eq!(strategy.apply(10.0, hb, DELAYED), 14.0);
            approx::assert_relative_eq!(strategy.apply(10.0, hb, BOTH), 16.0);
        }
    }

    #[test]
    fn multiplicative_strategy_scales_beta_hydroxybutyrate_with_both_factors() {
        let bias = Strategy::Multiplicative.apply(6.2771, 1.0, BOTH);
        approx::assert_relative_eq!(bias, 10.043_36, max_relative = 1e-12);
    }

    #[test]
    fn proportional_strategy_uses_full_effect_below_unit_hb() {
        let strategy = Strategy::HbProportional;
        for hb in [-1.0, 0.0, 0.25, 0.999] {
            approx::assert_relative_eq!(strategy.apply(10.0, hb, ROOM_TEMP), 14.0);
            approx::assert_relative_eq!(strategy.apply(10.0, hb, BOTH), 16.0);
        }
    }

    #[test]
    fn proportional_strategy_scales_with_hb_from_unit_hb() {
        let strategy = Strategy::HbProportional;
        approx::assert_relative_eq!(strategy.apply(10.0, 1.0, DELAYED), 14.0);
        approx::assert_relative_eq!(strategy.apply(10.0, 2.0, DELAYED), 18.0);
        approx::assert_relative_eq!(strategy.apply(10.0, 5.0, BOTH), 40.0);
    }

    #[test]
    fn proportional_strategy_is_identity_without_conditions() {
        approx::assert_relative_eq!(Strategy::HbProportional.apply(10.0, 5.0, NONE), 10.0);
    }

    #[test]
    fn strategies_parse_from_their_cli_names() {
        assert_eq!("multiplicative".parse(), Ok(Strategy::Multiplicative));
        assert_eq!("Hb-Proportional".parse(), Ok(Strategy::HbProportional));
        assert!("additive".parse::<Strategy>().is_err());
    }

    #[test]
    fn beta_hydroxybutyrate_confidence_interval() {
        let interval = confidence_interval(6.2771, 0.9913);
        let standard_error = 6.2771 * (1.0 - 0.9913_f64).sqrt();

        approx::assert_relative_eq!(standard_error, 0.5855, max_relative = 1e-3);
        approx::assert_relative_eq!(
            interval.low,
            6.2771 - 1.96 * standard_error,
            max_relative = 1e-12
        );
        approx::assert_relative_eq!(
            interval.high,
            6.2771 + 1.96 * standard_error,
            max_relative = 1e-12
        );
        approx::assert_relative_eq!(interval.low, 5.13, epsilon = 5e-3);
        approx::assert_relative_eq!(interval.high, 7.42, epsilon = 5e-3);
    }

    #[test]
    fn perfect_fit_gives_a_zero_width_interval() {
        let interval = confidence_interval(12.5, 1.0);
        approx::assert_relative_eq!(interval.width(), 0.0);
        assert!(interval.contains(12.5));
    }

    #[test]
    fn negative_bias_interval_is_ordered() {
        let interval = confidence_interval(-20.0, 0.5);
        assert!(interval.low < -20.0);
        assert!(interval.high > -20.0);
    }
}
