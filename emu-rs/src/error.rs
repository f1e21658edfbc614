//! Error type shared by the whole crate.
use crate::Real;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EmuError>;

/// Errors raised while configuring or evaluating a calibration.
#[derive(Error, Debug)]
pub enum EmuError {
    /// A vector-valued parameter does not have the length the model declares.
    #[error("dimension mismatch for '{name}': expected {expected}, found {found}")]
    DimensionMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// A parameter required by the model was neither fixed nor sampled.
    #[error("missing parameter '{0}'")]
    MissingParameter(String),

    /// A parameter was found but with the wrong shape (scalar vs. vector).
    #[error("parameter '{name}' must be a {expected}")]
    ParameterShape { name: String, expected: &'static str },

    /// Prior family name not in the supported set.
    #[error("unknown distribution family '{0}'")]
    UnknownDistribution(String),

    /// Prior arguments are missing, duplicated or out of range.
    #[error("invalid prior {family}: {reason}")]
    InvalidPrior { family: String, reason: String },

    /// Quantile level outside [0, 1].
    #[error("invalid quantile level {0}")]
    InvalidQuantile(Real),

    /// An observed series carries the same date twice.
    #[error("duplicate date {0} in observed series")]
    DuplicateDate(chrono::NaiveDate),

    /// Inconsistent model or sampler settings.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Simulation input outside the model's domain.
    #[error("invalid model input '{name}': {reason}")]
    InvalidModelInput { name: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Date(#[from] chrono::ParseError),
}

impl EmuError {
    pub(crate) fn invalid_prior(family: &str, reason: impl ToString) -> Self {
        EmuError::InvalidPrior {
            family: family.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for errors caused by parameter values outside the model's domain.
    /// Samplers treat these as zero posterior density.
    pub fn is_domain_error(&self) -> bool {
        matches!(
            self,
            EmuError::InvalidModelInput { .. } | EmuError::InvalidPrior { .. }
        )
    }

    pub(crate) fn invalid_input(name: &str, reason: impl ToString) -> Self {
        EmuError::InvalidModelInput {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}
