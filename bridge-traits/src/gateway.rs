//! Payment Gateway Surface Abstraction
//!
//! Each supported payment provider exposes an external checkout UI (usually a
//! cross-origin widget or redirect). The purchase orchestrator depends only on
//! this minimal capability interface so that gateways stay interchangeable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Server-issued order descriptor handed to a gateway's checkout UI.
///
/// Produced by the Checkout Intent API for one `(item, amount, currency)`
/// tuple; opaque to the core beyond the fields below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayIntent {
    /// Server-assigned intent identifier.
    pub intent_id: String,
    /// Amount in the selected currency, pre-converted server-side.
    pub amount: f64,
    /// Uppercase ISO-4217 currency code.
    pub currency: String,
    /// Optional display line for the checkout UI.
    pub description: Option<String>,
}

/// Terminal outcome of one gateway checkout attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome {
    /// The gateway reported a completed payment.
    Succeeded {
        /// Provider-side transaction reference, when available.
        reference: Option<String>,
    },
    /// The user closed the checkout UI without paying. Not an error.
    Dismissed,
    /// The gateway reported a failure (declined, network, provider outage).
    Failed {
        /// Message suitable for surfacing to the user.
        message: String,
    },
}

/// External checkout UI of one payment provider.
///
/// Implementations wrap the provider's client SDK. `open` resolves when the
/// user finishes or abandons the checkout; the provider's success/error/
/// dismiss callbacks map onto the [`GatewayOutcome`] variants.
#[async_trait]
pub trait PaymentGatewaySurface: Send + Sync {
    /// Stable identifier for this gateway (e.g. `"stripe"`, `"razorpay"`).
    fn id(&self) -> &str;

    /// Human-readable name for selection UIs.
    fn display_name(&self) -> &str;

    /// Uppercase ISO-4217 codes this gateway can settle in.
    fn supported_currencies(&self) -> Vec<String>;

    /// Initialize the provider SDK with its publishable key.
    ///
    /// Must be called once before `open`. Idempotent.
    async fn initialize(&self, public_key: &str) -> Result<()>;

    /// Open the external checkout UI for the given intent.
    ///
    /// This is a long suspension point: the user may take minutes or close
    /// the surface. A `Dismissed` outcome must never be turned into an error
    /// by implementations.
    async fn open(&self, intent: &GatewayIntent) -> Result<GatewayOutcome>;
}
