//! Error types for the solver crate.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type TspResult<T> = Result<T, TspError>;

/// Failures that can surface from building instances or running solvers.
///
/// Running out of an iteration or time budget is not an error; see
/// [`crate::tempering::Termination`].
#[derive(Debug, Error)]
pub enum TspError {
    /// Malformed or degenerate input (too few cities, non-finite coordinates).
    #[error("invalid instance: {reason}")]
    InvalidInstance {
        /// What was wrong with the input.
        reason: String,
    },

    /// The exact solver refuses instances above its configured ceiling.
    #[error("instance has {cities} cities, exact solver ceiling is {max}")]
    InstanceTooLarge {
        /// Number of cities in the rejected instance.
        cities: usize,
        /// Configured ceiling.
        max: usize,
    },

    /// A solver parameter is out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Which parameter and why.
        message: String,
    },

    /// YAML configuration could not be parsed.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Reading an input file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TspError {
    #[must_use]
    pub fn invalid_instance(reason: impl Into<String>) -> Self {
        Self::InvalidInstance {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
