//! Purchase-flow error types.

use thiserror::Error;

/// Errors produced by the entitlement and purchase layer.
///
/// Recovery is always local: every variant leaves the orchestrator in a
/// well-defined stage the user can act on, and none of them ever leaks into
/// the playback failure domain.
#[derive(Error, Debug)]
pub enum PurchaseError {
    /// The backend could not issue a checkout intent (or the bounded wait
    /// elapsed). Retryable by the user; the flow stays at gateway selection.
    #[error("Checkout initiation failed: {message}")]
    CheckoutInitiationFailed { message: String },

    /// The gateway reported a failure (declined, network, provider outage).
    /// The flow returns to gateway selection for an explicit retry.
    #[error("Gateway {gateway_id} failed: {message}")]
    Gateway { gateway_id: String, message: String },

    /// No configured gateway can settle in the chosen currency. The flow
    /// returns to currency selection.
    #[error("No gateway supports currency {0}")]
    UnsupportedCurrency(String),

    /// The named gateway is not registered or cannot take this currency.
    #[error("Unknown gateway: {0}")]
    UnknownGateway(String),

    /// A checkout is already pending. A routine signal rather than a fault:
    /// new requests are rejected, never queued.
    #[error("A purchase is already in progress")]
    AlreadyInProgress,

    /// The requested action does not apply to the flow's current stage
    /// (e.g. choosing a gateway before a currency).
    #[error("Action not valid in stage {stage}: {action}")]
    InvalidStage {
        stage: &'static str,
        action: &'static str,
    },

    /// The item carries no price quote to purchase with.
    #[error("No price quotes available for item {0}")]
    NoPriceQuotes(String),

    /// Catalog/intent API failure.
    #[error("Catalog error: {0}")]
    Catalog(#[from] core_catalog::CatalogError),

    /// Bridge-level failure (gateway SDK initialization and the like).
    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),
}

/// Result type for purchase operations.
pub type Result<T> = std::result::Result<T, PurchaseError>;
