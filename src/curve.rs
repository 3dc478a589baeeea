//! Numeric series for plotting a correction
//!
//! Nothing in here draws anything. The series are plain points which a plotting front end, or
//! the CSV export in [`crate::report`], consumes.
use std::ops::Range;

use num_traits::Float;

use crate::bias::{compute_bias, confidence_interval, constant, Interval};
use crate::correction::{invert_bias, Correction, CorrectionResult};
use crate::profile::ParameterProfile;

/// Smallest width of the measured-value axis
pub const MIN_SPAN: f64 = 1.0;

/// One sample of the bias curve
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurvePoint<E> {
    pub hb: E,
    pub bias: E,
    pub interval: Interval<E>,
}

/// The regression bias with its confidence band, sampled on a fixed Hb domain
///
/// The curve is a description, not a buffer: every call to [`BiasCurve::iter`] starts a fresh
/// pass over the same `samples` points, both ends of the domain included.
#[derive(Clone, Debug, PartialEq)]
pub struct BiasCurve<E> {
    domain: Range<E>,
    samples: usize,
    a: E,
    b: E,
    r_squared: E,
}

impl<E: Float> BiasCurve<E> {
    pub fn new(domain: Range<E>, samples: usize, a: E, b: E, r_squared: E) -> Self {
        Self {
            domain,
            samples,
            a,
            b,
            r_squared,
        }
    }

    pub fn for_profile(profile: &ParameterProfile<E>, domain: Range<E>, samples: usize) -> Self {
        Self::new(domain, samples, profile.a(), profile.b(), profile.r_squared())
    }

    pub const fn samples(&self) -> usize {
        self.samples
    }

    pub fn iter(&self) -> CurveIter<'_, E> {
        CurveIter {
            curve: self,
            index: 0,
        }
    }

    fn point(&self, index: usize) -> CurvePoint<E> {
        let hb = sample_at(&self.domain, self.samples, index);
        let bias = compute_bias(hb, self.a, self.b);
        CurvePoint {
            hb,
            bias,
            interval: confidence_interval(bias, self.r_squared),
        }
    }
}

impl<'a, E: Float> IntoIterator for &'a BiasCurve<E> {
    type Item = CurvePoint<E>;
    type IntoIter = CurveIter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Clone, Debug)]
pub struct CurveIter<'a, E> {
    curve: &'a BiasCurve<E>,
    index: usize,
}

impl<'a, E: Float> Iterator for CurveIter<'a, E> {
    type Item = CurvePoint<E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.curve.samples {
            return None;
        }
        let point = self.curve.point(self.index);
        self.index += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.curve.samples.saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<'a, E: Float> ExactSizeIterator for CurveIter<'a, E> {}

/// The `index`th of `samples` evenly spaced points on `domain`, both ends included
fn sample_at<E: Float>(domain: &Range<E>, samples: usize, index: usize) -> E {
    if samples < 2 {
        return domain.start;
    }
    let fraction = E::from(index).expect("index must fit in `E`")
        / E::from(samples - 1).expect("sample count must fit in `E`");
    domain.start + (domain.end - domain.start) * fraction
}

/// `samples` evenly spaced points on `domain`, both ends included
pub fn linspace<E: Float>(domain: Range<E>, samples: usize) -> impl Iterator<Item = E> + Clone {
    (0..samples).map(move |index| sample_at(&domain, samples, index))
}

/// Domain of the measured-value axis
///
/// Runs from zero to twice `measured`, on whichever side of zero `measured` lies. A measurement
/// at or near zero would give an empty axis, so the range is never narrower than [`MIN_SPAN`].
pub fn value_range<E: Float>(measured: E) -> Range<E> {
    let far = measured * constant(2.0);
    let span = far.abs().max(constant(MIN_SPAN));
    if far < E::zero() {
        -span..E::zero()
    } else {
        E::zero()..span
    }
}

/// A measured value and its correction at a fixed bias
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValuePoint<E> {
    pub measured: E,
    pub corrected: Correction<E>,
}

/// A point in (Hb, bias, value) space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScatterPoint<E> {
    pub hb: E,
    pub bias: E,
    pub value: E,
}

/// The measured point, the corrected point and the segment joining them
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scatter<E> {
    pub measured: ScatterPoint<E>,
    pub corrected: ScatterPoint<E>,
}

impl<E: Float> Scatter<E> {
    /// `n` evenly spaced points along the segment from the measured to the corrected point
    pub fn segment(&self, n: usize) -> Vec<ScatterPoint<E>> {
        let last = E::from(n.saturating_sub(1).max(1)).expect("count must fit in `E`");
        (0..n)
            .map(|ii| {
                let t = E::from(ii).expect("index must fit in `E`") / last;
                let lerp = |from: E, to: E| from + (to - from) * t;
                ScatterPoint {
                    hb: lerp(self.measured.hb, self.corrected.hb),
                    bias: lerp(self.measured.bias, self.corrected.bias),
                    value: lerp(self.measured.value, self.corrected.value),
                }
            })
            .collect()
    }
}

/// All series needed to plot a single correction
#[derive(Clone, Debug, PartialEq)]
pub struct Visualization<E> {
    pub bias_curve: Vec<CurvePoint<E>>,
    pub value_curve: Vec<ValuePoint<E>>,
    /// Absent when the correction is undefined
    pub scatter: Option<Scatter<E>>,
}

impl<E: Float> Visualization<E> {
    /// Sample `curve` and a value curve of the same length around `result`
    pub fn new(curve: &BiasCurve<E>, result: &CorrectionResult<E>) -> Self {
        let bias_curve = curve.iter().collect();

        let value_curve = linspace(value_range(result.measured_value), curve.samples())
            .map(|measured| ValuePoint {
                measured,
                corrected: invert_bias(measured, result.percent_bias),
            })
            .collect();

        let scatter = result.corrected_value.value().map(|corrected| Scatter {
            measured: ScatterPoint {
                hb: result.effective_hb,
                bias: result.percent_bias,
                value: result.measured_value,
            },
            corrected: ScatterPoint {
                hb: result.effective_hb,
                bias: result.percent_bias,
                value: corrected,
            },
        });

        Self {
            bias_curve,
            value_curve,
            scatter,
        }
    }
}
