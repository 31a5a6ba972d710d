//! # Entitlement & Purchase Orchestration
//!
//! Decides whether a user may play or must buy an item, and drives the
//! multi-step, multi-currency, multi-gateway checkout when they must.
//!
//! Three layers, leaves first:
//!
//! - [`ledger`]: the local mirror of the user's purchases, hydrated from
//!   the server profile and updated optimistically on gateway success.
//! - [`resolver`]: the pure decision table mapping (user, item) to an
//!   [`EntitlementDecision`](resolver::EntitlementDecision).
//! - [`orchestrator`]: the checkout state machine consuming the resolver's
//!   verdicts and the registered payment gateways.
//!
//! Purchase failures are their own failure domain: nothing in this crate
//! ever cascades into playback.

pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod resolver;

pub use error::{PurchaseError, Result};
pub use ledger::{LedgerEntry, Provenance, PurchaseLedger};
pub use orchestrator::{
    CheckoutOutcome, FlowSnapshot, PurchaseOrchestrator, PurchaseRequest, SubscriptionOffer,
};
pub use resolver::{decide, EntitlementDecision, ItemAccess};
