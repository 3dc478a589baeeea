//! Derive interference coefficients from hemolysis study data
//!
//! A study spikes a sample pool with increasing amounts of hemolysate and records the percent
//! deviation of each analyte from the unspiked baseline. Each analyte's data lives in its own
//! CSV file, named after the analyte, with the header `hb,bias`.
use std::ffi::OsStr;
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use itertools::{Itertools, MinMaxResult};
use ndarray::Array1;
use num_traits::Float;
use serde::{de::DeserializeOwned, Deserialize};

use crate::profile::{ParameterProfile, ParameterTable};
use crate::{Error, Result};

/// One observation from an interference study
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Sample<E> {
    /// Free hemoglobin concentration
    pub hb: E,
    /// Observed percent bias at that concentration
    pub bias: E,
}

/// Ordinary least-squares line through `samples`
///
/// With $\bar{H}$ and $\bar{p}$ the sample means, the slope and intercept are
///
/// $$
///     a = \frac{\sum (H_i - \bar{H})(p_i - \bar{p})}{\sum (H_i - \bar{H})^2}, \quad
///     b = \bar{p} - a \bar{H}
/// $$
///
/// and $R^2 = 1 - SS_{res} / SS_{tot}$. A set of samples with no spread in bias is fitted
/// exactly and gets $R^2 = 1$.
///
/// # Errors
/// Returns [`Error::InsufficientData`] for fewer than two samples or when every sample has the
/// same Hb, and [`Error::InvalidParameterConfig`] if the resulting coefficients are not finite.
pub fn fit_profile<E: Float + 'static>(
    name: &str,
    samples: &[Sample<E>],
) -> Result<ParameterProfile<E>> {
    let insufficient = |reason: &str| Error::InsufficientData {
        name: name.to_owned(),
        reason: reason.to_owned(),
    };

    if samples.len() < 2 {
        return Err(insufficient("at least two samples are required"));
    }

    let hb: Array1<E> = samples.iter().map(|sample| sample.hb).collect();
    let bias: Array1<E> = samples.iter().map(|sample| sample.bias).collect();
    let n = E::from(samples.len()).expect("sample count must fit in `E`");

    let hb_mean = hb.sum() / n;
    let bias_mean = bias.sum() / n;
    let hb_deviation = hb.mapv(|value| value - hb_mean);
    let bias_deviation = bias.mapv(|value| value - bias_mean);

    let s_hh = hb_deviation.dot(&hb_deviation);
    if s_hh == E::zero() {
        return Err(insufficient("samples must cover more than one Hb value"));
    }
    let s_hp = hb_deviation.dot(&bias_deviation);

    let a = s_hp / s_hh;
    let b = bias_mean - a * hb_mean;

    let residuals = &bias - &hb.mapv(|value| a * value + b);
    let ss_res = residuals.dot(&residuals);
    let ss_tot = bias_deviation.dot(&bias_deviation);
    let r_squared = if ss_tot == E::zero() {
        E::one()
    } else {
        // Rounding can push a perfect fit a hair outside [0, 1]
        (E::one() - ss_res / ss_tot).max(E::zero()).min(E::one())
    };

    ParameterProfile::new(name, a, b, r_squared)
}

/// Read the samples of a single study file
///
/// # Errors
/// Returns an error if the file is missing or a row cannot be parsed.
pub fn read_samples<E: DeserializeOwned>(path: &Path) -> Result<Vec<Sample<E>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let samples = reader
        .deserialize()
        .collect::<std::result::Result<Vec<Sample<E>>, csv::Error>>()?;
    Ok(samples)
}

fn analyte_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Fit a single study file. The analyte is named after the file stem.
///
/// # Errors
/// Returns an error if the file cannot be read or the data cannot be fitted.
pub fn from_csv<E: Float + Debug + DeserializeOwned + 'static>(
    path: &Path,
) -> Result<ParameterProfile<E>> {
    let name = analyte_name(path);
    let samples: Vec<Sample<E>> = read_samples(path)?;
    let profile = fit_profile(&name, &samples)?;

    let window = match samples.iter().map(|sample| sample.hb).minmax() {
        MinMaxResult::MinMax(low, high) => Some((low, high)),
        MinMaxResult::OneElement(only) => Some((only, only)),
        MinMaxResult::NoElements => None,
    };
    tracing::info!(
        analyte = %profile.name(),
        samples = samples.len(),
        hb_window = ?window,
        a = ?profile.a(),
        b = ?profile.b(),
        r2 = ?profile.r_squared(),
        "fitted interference profile"
    );
    Ok(profile)
}

/// Fit every `csv` file in `directory` into a table
///
/// Files are processed in path order so the result does not depend on directory listing order.
///
/// # Errors
/// Returns an error if the directory cannot be read, any file fails to fit or two files map to
/// the same analyte.
pub fn from_directory<E: Float + Debug + DeserializeOwned + 'static>(
    directory: &Path,
) -> Result<ParameterTable<E>> {
    let paths = fs::read_dir(directory)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<PathBuf>>>()?
        .into_iter()
        .filter(|path| path.extension().and_then(OsStr::to_str) == Some("csv"))
        .sorted()
        .collect::<Vec<_>>();

    if paths.is_empty() {
        tracing::warn!(directory = %directory.display(), "no study files found");
    }

    let profiles = paths
        .iter()
        .map(|path| from_csv(path))
        .collect::<Result<Vec<_>>>()?;
    ParameterTable::new(profiles)
}
