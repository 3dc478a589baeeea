use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bias::Strategy;
use crate::{Error, Result};

/// Settings shared by every request handled by a [`crate::BiasCorrector`]
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// How preanalytical handling scales the bias
    pub strategy: Strategy,
    /// Lower end of the Hb domain of the bias curve
    pub hb_min: f64,
    /// Upper end of the Hb domain of the bias curve
    pub hb_max: f64,
    /// Number of points in the bias and value curves
    pub samples: usize,
    /// Treat an Hb entry of zero or below as "not entered" and compute the bias at Hb = 1
    pub unit_hb_when_missing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            hb_min: 0.0,
            hb_max: 10.0,
            samples: 100,
            unit_hb_when_missing: false,
        }
    }
}

impl Config {
    /// Read a config from a TOML file. Missing keys take their default value.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid TOML or describes an empty Hb
    /// domain.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        tracing::info!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    /// Check the curve domain is usable
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameterConfig`] when the Hb domain is empty or not finite, or
    /// fewer than two samples are requested.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidParameterConfig {
            name: "config".to_owned(),
            reason: reason.to_owned(),
        };
        if !self.hb_min.is_finite() || !self.hb_max.is_finite() || self.hb_min >= self.hb_max {
            return Err(invalid("hb_min must be finite and below hb_max"));
        }
        if self.samples < 2 {
            return Err(invalid("at least two curve samples are required"));
        }
        Ok(())
    }
}
