//! Human readable output and CSV export of plotting series
use std::fmt::{self, Display};
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::bias::Interval;
use crate::correction::{Correction, CorrectionResult};
use crate::curve::Visualization;
use crate::Result;

const UNDEFINED: &str = "undefined";

/// Number of points used to draw the segment between measured and corrected value
const SEGMENT_POINTS: usize = 20;

fn two_decimals<E: Display>(value: E) -> String {
    format!("{value:.2}")
}

fn interval<E: Display>(interval: &Interval<E>) -> String {
    format!("[{:.2}, {:.2}]", interval.low, interval.high)
}

fn correction<T>(value: Correction<T>, format: impl Fn(T) -> String) -> String {
    match value {
        Correction::Defined(value) => format(value),
        Correction::Undefined => UNDEFINED.to_owned(),
    }
}

/// The output surface of a correction, every number rendered to two decimals
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Formatted {
    pub parameter: String,
    pub hb: String,
    pub percent_bias: String,
    pub interval: String,
    pub measured_value: String,
    pub corrected_value: String,
    pub corrected_interval: String,
    pub preanalytical_adjusted: bool,
}

impl<E: num_traits::Float + Display> From<&CorrectionResult<E>> for Formatted {
    fn from(result: &CorrectionResult<E>) -> Self {
        Self {
            parameter: result.analyte.to_string(),
            hb: two_decimals(result.hb),
            percent_bias: two_decimals(result.percent_bias),
            interval: interval(&result.interval),
            measured_value: two_decimals(result.measured_value),
            corrected_value: correction(result.corrected_value, two_decimals),
            corrected_interval: correction(result.corrected_interval, |value| interval(&value)),
            preanalytical_adjusted: result.preanalytical_adjusted(),
        }
    }
}

impl Display for Formatted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "parameter:          {}", self.parameter)?;
        writeln!(f, "hb:                 {}", self.hb)?;
        writeln!(f, "percent bias:       {} %", self.percent_bias)?;
        writeln!(f, "95% CI:             {} %", self.interval)?;
        writeln!(
            f,
            "preanalytical:      {}",
            if self.preanalytical_adjusted {
                "adjusted"
            } else {
                "none"
            }
        )?;
        writeln!(f, "measured value:     {}", self.measured_value)?;
        writeln!(f, "corrected value:    {}", self.corrected_value)?;
        write!(f, "corrected 95% CI:   {}", self.corrected_interval)
    }
}

#[derive(Serialize)]
struct CurveRow<E> {
    hb: E,
    bias: E,
    ci_low: E,
    ci_high: E,
}

#[derive(Serialize)]
struct ValueRow<E> {
    measured: E,
    /// Empty when the correction is undefined
    corrected: Option<E>,
}

#[derive(Serialize)]
struct ScatterRow<E> {
    point: &'static str,
    hb: E,
    bias: E,
    value: E,
}

/// Write `bias_curve.csv`, `value_curve.csv` and `scatter.csv` into `directory`
///
/// The directory is created if it does not exist. `scatter.csv` only has a header when the
/// correction is undefined.
///
/// # Errors
/// Returns an error if the directory or any file cannot be written.
pub fn write_series<E: num_traits::Float + Serialize>(
    directory: &Path,
    series: &Visualization<E>,
) -> Result<()> {
    fs::create_dir_all(directory)?;

    let mut writer = csv::Writer::from_path(directory.join("bias_curve.csv"))?;
    for point in &series.bias_curve {
        writer.serialize(CurveRow {
            hb: point.hb,
            bias: point.bias,
            ci_low: point.interval.low,
            ci_high: point.interval.high,
        })?;
    }
    writer.flush()?;

    let mut writer = csv::Writer::from_path(directory.join("value_curve.csv"))?;
    for point in &series.value_curve {
        writer.serialize(ValueRow {
            measured: point.measured,
            corrected: point.corrected.value(),
        })?;
    }
    writer.flush()?;

    let mut writer = csv::WriterBuilder::new().from_path(directory.join("scatter.csv"))?;
    match &series.scatter {
        Some(scatter) => {
            let endpoints = [("measured", scatter.measured), ("corrected", scatter.corrected)];
            let segment = scatter
                .segment(SEGMENT_POINTS)
                .into_iter()
                .map(|point| ("segment", point));
            for (label, point) in endpoints.into_iter().chain(segment) {
                writer.serialize(ScatterRow {
                    point: label,
                    hb: point.hb,
                    bias: point.bias,
                    value: point.value,
                })?;
            }
        }
        None => writer.write_record(["point", "hb", "bias", "value"])?,
    }
    writer.flush()?;

    tracing::info!(directory = %directory.display(), "wrote plotting series");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::Formatted;
    use crate::bias::Preanalytical;
    use crate::{BiasCorrector, Config, ParameterProfile, ParameterTable, Result};

    fn corrector() -> Result<BiasCorrector<f64>> {
        let table = ParameterTable::new(vec![
            ParameterProfile::new("BHB", 5.3201, 0.957, 0.9913)?,
            ParameterProfile::new("LOSS", -10.0, -90.0, 0.9)?,
            ParameterProfile::new("FLAT", 0.0, 0.0, 0.9)?,
        ])?;
        BiasCorrector::new(table, Config::default())
    }

    #[test]
    fn handling_is_reported_when_it_leaves_the_bias_unchanged() -> Result<()> {
        let result = corrector()?.correct("FLAT", 0.0, 10.0, Preanalytical::new(true, true))?;
        let formatted = Formatted::from(&result);

        assert_eq!(formatted.percent_bias, "0.00");
        assert!(formatted.preanalytical_adjusted);
        assert!(formatted.to_string().contains("adjusted"));
        Ok(())
    }

    #[test]
    fn beta_hydroxybutyrate_is_rendered_to_two_decimals() -> Result<()> {
        let result = corrector()?.correct("BHB", 1.0, 10.0, Preanalytical::default())?;
        let formatted = Formatted::from(&result);

        assert_eq!(formatted.parameter, "BHB");
        assert_eq!(formatted.percent_bias, "6.28");
        assert_eq!(formatted.interval, "[5.13, 7.42]");
        assert_eq!(formatted.corrected_value, "9.41");
        assert!(!formatted.preanalytical_adjusted);
        Ok(())
    }

    #[test]
    fn undefined_correction_is_rendered_as_text() -> Result<()> {
        let result = corrector()?.correct("LOSS", 1.0, 10.0, Preanalytical::default())?;
        let formatted = Formatted::from(&result);

        assert_eq!(formatted.percent_bias, "-100.00");
        assert_eq!(formatted.corrected_value, "undefined");
        assert_eq!(formatted.corrected_interval, "undefined");
        assert!(!formatted.to_string().contains("NaN"));
        Ok(())
    }
}
