//! Runtime-level errors: configuration validation and bridge wiring.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value failed validation before the core was built.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required platform bridge was not supplied to the builder.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    /// An invariant inside the runtime itself broke.
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
