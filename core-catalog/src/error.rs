//! Catalog API error types.

use std::time::Duration;
use thiserror::Error;

/// Errors from the catalog and checkout-intent clients.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Transport-level failure from the HTTP bridge.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] bridge_traits::BridgeError),

    /// The API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("Failed to decode API response: {0}")]
    Decode(String),

    /// A checkout-intent request exceeded its bounded wait.
    ///
    /// Treated as a failed initiation; retries must be user-triggered to
    /// avoid duplicate charges.
    #[error("Checkout intent request timed out after {0:?}")]
    IntentTimeout(Duration),
}

impl CatalogError {
    /// Returns `true` if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Transport(_) | CatalogError::IntentTimeout(_) => true,
            CatalogError::Api { status, .. } => *status >= 500 || *status == 429,
            CatalogError::Decode(_) => false,
        }
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
