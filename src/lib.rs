#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod bias;
pub mod config;
pub mod correction;
pub mod curve;
pub mod fit;
pub mod profile;
pub mod report;

pub use bias::{Preanalytical, Strategy};
pub use config::Config;
pub use correction::{BiasCorrector, Correction, CorrectionInput, CorrectionResult};
pub use profile::{Analyte, ParameterProfile, ParameterTable};

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration for parameter {name:?}: {reason}")]
    InvalidParameterConfig { name: String, reason: String },

    #[error("unknown parameter {0:?}")]
    UnknownParameter(String),

    #[error("cannot fit parameter {name:?}: {reason}")]
    InsufficientData { name: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to parse toml: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("failed to write toml: {0}")]
    TomlSer(#[from] toml::ser::Error),
}
