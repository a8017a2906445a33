//! Error hierarchy for Warden.
//!
//! The decision engine itself is total and never fails. Errors only surface at
//! the edges: parsing user-supplied names, loading configuration, and callers
//! turning a denial into an early return.

use thiserror::Error;

/// Top-level error type for all Warden operations.
#[derive(Debug, Error)]
pub enum WardenError {
    #[error("Permission denied for '{action}': {reason}")]
    Denied { action: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid {what}: '{value}'")]
    InvalidInput { what: &'static str, value: String },
}

impl WardenError {
    /// Shorthand for an unrecognized name of the given category.
    pub fn invalid(what: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidInput {
            what,
            value: value.into(),
        }
    }
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}
