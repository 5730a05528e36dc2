//! Client-side error types.

use std::path::PathBuf;

use thiserror::Error;

pub use gellyfish_core::error::ApiError;

/// Errors from loading or using the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The named environment is not configured.
    #[error("environment '{name}' not found in config. Available: {available:?}")]
    UnknownEnvironment {
        name: String,
        available: Vec<String>,
    },

    /// A model name that cannot be used in a schema query.
    #[error("invalid model name: {0:?}")]
    InvalidModelName(String),
}
