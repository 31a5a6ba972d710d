//! # Purchase Orchestrator
//!
//! The state machine driving a checkout:
//!
//! ```text
//! IDLE → CURRENCY_SELECTION → GATEWAY_SELECTION → CHECKOUT_PENDING
//!              │ (single quote skips)                    │
//!              ◄──── no gateway for currency ────────────┤
//!                                    {SUCCEEDED | FAILED | CANCELLED}
//! ```
//!
//! One flow at a time: a new request while a checkout is pending is rejected
//! with [`PurchaseError::AlreadyInProgress`], never queued. Gateway success
//! updates the local ledger optimistically and exactly once; a user dismiss
//! is silent and touches nothing; a gateway failure returns the flow to
//! gateway selection so retry is always explicit.
//!
//! Subscribe-before-purchase coupling: when the requested item needs an
//! artist subscription as a purchase prerequisite, the orchestrator first
//! runs the subscription purchase as its own flow and stashes the original
//! request; the original re-enters currency selection only on the
//! subscription's success.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use bridge_traits::gateway::{GatewayIntent, GatewayOutcome};
use core_catalog::checkout::{CheckoutIntentApi, CheckoutIntentRequest};
use core_catalog::types::{ItemType, Price};
use core_runtime::config::GatewayRegistration;
use core_runtime::events::{CoreEvent, EventBus, PurchaseEvent};

use crate::error::{PurchaseError, Result};
use crate::ledger::PurchaseLedger;

// ============================================================================
// Requests & snapshots
// ============================================================================

/// The artist-subscription offer attached to a purchase that requires one.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionOffer {
    pub artist_id: String,
    /// Currency quotes for the subscription itself.
    pub quotes: Vec<Price>,
    pub description: Option<String>,
}

/// One purchase ask, composed by the service layer from catalog data.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseRequest {
    pub item_type: ItemType,
    pub item_id: String,
    pub artist_id: String,
    /// Currency quotes, base price first.
    pub quotes: Vec<Price>,
    pub description: Option<String>,
    /// Present when the resolver flagged the artist subscription as a
    /// purchase prerequisite.
    pub subscription_offer: Option<SubscriptionOffer>,
}

/// Externally visible stage of the flow.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowSnapshot {
    Idle,
    CurrencySelection {
        item_id: String,
        options: Vec<Price>,
    },
    GatewaySelection {
        item_id: String,
        currency: String,
        amount: f64,
        gateway_ids: Vec<String>,
    },
    CheckoutPending {
        item_id: String,
        currency: String,
        amount: f64,
        gateway_id: String,
        /// Known once the server issued the intent.
        intent_id: Option<String>,
    },
}

/// Terminal result of one gateway round.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    /// Payment landed; the ledger was updated. When this completed a
    /// subscription prerequisite, the orchestrator has already re-entered
    /// the original purchase's currency selection; check
    /// [`PurchaseOrchestrator::stage`].
    Completed { item_type: ItemType, item_id: String },
    /// The user dismissed the gateway UI. Entitlement untouched.
    Cancelled,
}

// ============================================================================
// Internal flow state
// ============================================================================

#[derive(Debug, Clone)]
enum Stage {
    CurrencySelection,
    GatewaySelection {
        currency: String,
        amount: f64,
        gateway_ids: Vec<String>,
    },
    CheckoutPending {
        currency: String,
        amount: f64,
        gateway_id: String,
        intent_id: Option<String>,
    },
}

#[derive(Debug, Clone)]
struct ActiveFlow {
    item_type: ItemType,
    item_id: String,
    quotes: Vec<Price>,
    description: Option<String>,
    stage: Stage,
    /// The original purchase waiting for this subscription sub-flow.
    resume_after: Option<PurchaseRequest>,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Single writer of the purchase flow and (on success) the ledger.
pub struct PurchaseOrchestrator {
    intents: Arc<dyn CheckoutIntentApi>,
    gateways: Vec<GatewayRegistration>,
    ledger: Arc<PurchaseLedger>,
    events: EventBus,
    flow: Mutex<Option<ActiveFlow>>,
}

impl PurchaseOrchestrator {
    pub fn new(
        intents: Arc<dyn CheckoutIntentApi>,
        gateways: Vec<GatewayRegistration>,
        ledger: Arc<PurchaseLedger>,
        events: EventBus,
    ) -> Self {
        Self {
            intents,
            gateways,
            ledger,
            events,
            flow: Mutex::new(None),
        }
    }

    /// The flow's current stage.
    pub fn stage(&self) -> FlowSnapshot {
        let guard = self.flow.lock();
        match guard.as_ref() {
            None => FlowSnapshot::Idle,
            Some(flow) => snapshot_of(flow),
        }
    }

    /// Registered gateways as `(id, display name)`, in registration order.
    pub fn gateway_directory(&self) -> Vec<(String, String)> {
        self.gateways
            .iter()
            .map(|g| {
                (
                    g.surface.id().to_string(),
                    g.surface.display_name().to_string(),
                )
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Flow entry
    // ------------------------------------------------------------------

    /// Start a purchase flow for the given request.
    ///
    /// When the request carries a subscription prerequisite the user does
    /// not yet satisfy, the subscription purchase starts instead and the
    /// original request is stashed until it succeeds.
    ///
    /// # Errors
    ///
    /// - [`PurchaseError::AlreadyInProgress`] while a checkout is pending
    /// - [`PurchaseError::NoPriceQuotes`] when the item has no quotes
    #[instrument(skip(self, request), fields(item_id = %request.item_id))]
    pub fn begin_purchase(&self, mut request: PurchaseRequest) -> Result<FlowSnapshot> {
        let mut guard = self.flow.lock();
        if let Some(flow) = guard.as_ref() {
            if matches!(flow.stage, Stage::CheckoutPending { .. }) {
                return Err(PurchaseError::AlreadyInProgress);
            }
            // A not-yet-committed flow is abandoned in favor of the new ask.
            debug!(abandoned = %flow.item_id, "replacing unstarted purchase flow");
        }

        let offer = request.subscription_offer.take();
        if let Some(offer) = offer {
            if !self.ledger.has_artist_subscription(&offer.artist_id) {
                self.emit(PurchaseEvent::SubscriptionPrerequisite {
                    item_id: request.item_id.clone(),
                    artist_id: offer.artist_id.clone(),
                });
                let subscription = PurchaseRequest {
                    item_type: ItemType::ArtistSubscription,
                    item_id: offer.artist_id.clone(),
                    artist_id: offer.artist_id,
                    quotes: offer.quotes,
                    description: offer.description,
                    subscription_offer: None,
                };
                return self.start_flow(&mut guard, subscription, Some(request), false);
            }
        }

        self.start_flow(&mut guard, request, None, false)
    }

    /// Choose the checkout currency.
    ///
    /// Valid from currency selection, or from gateway selection to change
    /// one's mind. An empty gateway filter bounces back to currency
    /// selection with [`PurchaseError::UnsupportedCurrency`].
    pub fn choose_currency(&self, currency: &str) -> Result<FlowSnapshot> {
        let mut guard = self.flow.lock();
        let flow = guard.as_mut().ok_or(PurchaseError::InvalidStage {
            stage: "idle",
            action: "choose_currency",
        })?;

        match flow.stage {
            Stage::CurrencySelection | Stage::GatewaySelection { .. } => {}
            Stage::CheckoutPending { .. } => return Err(PurchaseError::AlreadyInProgress),
        }

        let Some(quote) = flow.quotes.iter().find(|p| p.currency == currency) else {
            return Err(PurchaseError::UnsupportedCurrency(currency.to_string()));
        };
        let amount = quote.amount;

        let gateway_ids = self.gateways_for(currency);
        if gateway_ids.is_empty() {
            flow.stage = Stage::CurrencySelection;
            self.emit(PurchaseEvent::NoGatewayForCurrency {
                currency: currency.to_string(),
            });
            return Err(PurchaseError::UnsupportedCurrency(currency.to_string()));
        }

        flow.stage = Stage::GatewaySelection {
            currency: currency.to_string(),
            amount,
            gateway_ids: gateway_ids.clone(),
        };
        self.emit(PurchaseEvent::GatewaySelectionRequired {
            item_id: flow.item_id.clone(),
            currency: currency.to_string(),
            gateways: gateway_ids,
        });
        Ok(snapshot_of(flow))
    }

    /// Tear down the current flow. Silent; entitlement untouched.
    pub fn cancel(&self) {
        let abandoned = self.flow.lock().take();
        if let Some(flow) = abandoned {
            self.emit(PurchaseEvent::Cancelled {
                item_id: flow.item_id,
            });
        }
    }

    // ------------------------------------------------------------------
    // Checkout
    // ------------------------------------------------------------------

    /// Hand the flow to the chosen gateway: issue the checkout intent, open
    /// the gateway UI, and settle the ledger from its outcome.
    ///
    /// # Errors
    ///
    /// - [`PurchaseError::CheckoutInitiationFailed`]: intent request failed
    ///   or exceeded its bounded wait; the flow stays at gateway selection
    /// - [`PurchaseError::Gateway`]: the gateway declined or errored; the
    ///   flow returns to gateway selection for an explicit retry
    #[instrument(skip(self), fields(gateway_id))]
    pub async fn choose_gateway(&self, gateway_id: &str) -> Result<CheckoutOutcome> {
        // Validate and claim the checkout under the lock, then release it
        // for the long awaits.
        let (item_type, item_id, description, currency, amount, registration) = {
            let mut guard = self.flow.lock();
            let flow = guard.as_mut().ok_or(PurchaseError::InvalidStage {
                stage: "idle",
                action: "choose_gateway",
            })?;

            let (currency, amount) = match &flow.stage {
                Stage::GatewaySelection {
                    currency,
                    amount,
                    gateway_ids,
                } => {
                    if !gateway_ids.iter().any(|id| id == gateway_id) {
                        return Err(PurchaseError::UnknownGateway(gateway_id.to_string()));
                    }
                    (currency.clone(), *amount)
                }
                Stage::CheckoutPending { .. } => return Err(PurchaseError::AlreadyInProgress),
                Stage::CurrencySelection => {
                    return Err(PurchaseError::InvalidStage {
                        stage: "currency-selection",
                        action: "choose_gateway",
                    })
                }
            };

            let registration = self
                .gateways
                .iter()
                .find(|g| g.surface.id() == gateway_id)
                .cloned()
                .ok_or_else(|| PurchaseError::UnknownGateway(gateway_id.to_string()))?;

            flow.stage = Stage::CheckoutPending {
                currency: currency.clone(),
                amount,
                gateway_id: gateway_id.to_string(),
                intent_id: None,
            };
            (
                flow.item_type,
                flow.item_id.clone(),
                flow.description.clone(),
                currency,
                amount,
                registration,
            )
        };

        if let Err(error) = registration
            .surface
            .initialize(&registration.public_key)
            .await
        {
            self.return_to_gateway_selection(&currency, amount);
            return Err(PurchaseError::Gateway {
                gateway_id: gateway_id.to_string(),
                message: format!("initialization failed: {error}"),
            });
        }

        let intent_request = CheckoutIntentRequest {
            item_type,
            item_id: item_id.clone(),
            amount,
            currency: currency.clone(),
        };
        let intent = match self.intents.create_intent(&intent_request).await {
            Ok(intent) => intent,
            Err(error) => {
                warn!(%error, "checkout intent creation failed");
                self.return_to_gateway_selection(&currency, amount);
                self.emit(PurchaseEvent::Failed {
                    item_id: item_id.clone(),
                    message: error.to_string(),
                });
                return Err(PurchaseError::CheckoutInitiationFailed {
                    message: error.to_string(),
                });
            }
        };

        {
            let mut guard = self.flow.lock();
            if let Some(flow) = guard.as_mut() {
                if let Stage::CheckoutPending { intent_id, .. } = &mut flow.stage {
                    *intent_id = Some(intent.id.clone());
                }
            }
        }
        self.emit(PurchaseEvent::CheckoutPending {
            intent_id: intent.id.clone(),
            amount: intent.amount,
            currency: intent.currency.clone(),
        });

        let gateway_intent = GatewayIntent {
            intent_id: intent.id.clone(),
            amount: intent.amount,
            currency: intent.currency.clone(),
            description,
        };
        let outcome = match registration.surface.open(&gateway_intent).await {
            Ok(outcome) => outcome,
            Err(error) => {
                self.return_to_gateway_selection(&currency, amount);
                self.emit(PurchaseEvent::Failed {
                    item_id: item_id.clone(),
                    message: error.to_string(),
                });
                return Err(PurchaseError::Gateway {
                    gateway_id: gateway_id.to_string(),
                    message: error.to_string(),
                });
            }
        };

        match outcome {
            GatewayOutcome::Succeeded { reference } => {
                debug!(?reference, "gateway reported success");
                // Money moved even if the flow was torn down meanwhile;
                // the ledger update must happen regardless.
                self.ledger
                    .record_optimistic(item_type, &item_id, amount, &currency);
                self.emit(PurchaseEvent::Succeeded {
                    item_type: item_type.as_str().to_string(),
                    item_id: item_id.clone(),
                });
                self.finish_success();
                Ok(CheckoutOutcome::Completed { item_type, item_id })
            }
            GatewayOutcome::Dismissed => {
                // Silent: no error, no entitlement change, stash dropped.
                *self.flow.lock() = None;
                self.emit(PurchaseEvent::Cancelled { item_id });
                Ok(CheckoutOutcome::Cancelled)
            }
            GatewayOutcome::Failed { message } => {
                self.return_to_gateway_selection(&currency, amount);
                self.emit(PurchaseEvent::Failed {
                    item_id,
                    message: message.clone(),
                });
                Err(PurchaseError::Gateway {
                    gateway_id: gateway_id.to_string(),
                    message,
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // Internal transitions
    // ------------------------------------------------------------------

    fn start_flow(
        &self,
        guard: &mut Option<ActiveFlow>,
        request: PurchaseRequest,
        resume_after: Option<PurchaseRequest>,
        resuming: bool,
    ) -> Result<FlowSnapshot> {
        if request.quotes.is_empty() {
            *guard = None;
            return Err(PurchaseError::NoPriceQuotes(request.item_id));
        }

        if !resuming {
            self.emit(PurchaseEvent::FlowStarted {
                item_type: request.item_type.as_str().to_string(),
                item_id: request.item_id.clone(),
            });
        }

        let mut flow = ActiveFlow {
            item_type: request.item_type,
            item_id: request.item_id.clone(),
            quotes: request.quotes.clone(),
            description: request.description,
            stage: Stage::CurrencySelection,
            resume_after,
        };

        if request.quotes.len() == 1 {
            // Single quote skips currency selection.
            let quote = &request.quotes[0];
            let gateway_ids = self.gateways_for(&quote.currency);
            if gateway_ids.is_empty() {
                self.emit(PurchaseEvent::NoGatewayForCurrency {
                    currency: quote.currency.clone(),
                });
                *guard = Some(flow);
                return Err(PurchaseError::UnsupportedCurrency(quote.currency.clone()));
            }
            flow.stage = Stage::GatewaySelection {
                currency: quote.currency.clone(),
                amount: quote.amount,
                gateway_ids: gateway_ids.clone(),
            };
            self.emit(PurchaseEvent::GatewaySelectionRequired {
                item_id: request.item_id,
                currency: quote.currency.clone(),
                gateways: gateway_ids,
            });
        } else {
            self.emit(PurchaseEvent::CurrencySelectionRequired {
                item_id: request.item_id,
                currencies: request.quotes.iter().map(|p| p.currency.clone()).collect(),
            });
        }

        let snapshot = snapshot_of(&flow);
        *guard = Some(flow);
        Ok(snapshot)
    }

    /// On success, either clear the flow or re-enter the stashed original
    /// purchase at currency selection.
    fn finish_success(&self) {
        let mut guard = self.flow.lock();
        let resume = guard.take().and_then(|flow| flow.resume_after);
        if let Some(original) = resume {
            if let Err(error) = self.start_flow(&mut guard, original, None, true) {
                warn!(%error, "resuming original purchase after subscription failed");
            }
        }
    }

    fn return_to_gateway_selection(&self, currency: &str, amount: f64) {
        let mut guard = self.flow.lock();
        if let Some(flow) = guard.as_mut() {
            flow.stage = Stage::GatewaySelection {
                currency: currency.to_string(),
                amount,
                gateway_ids: self.gateways_for(currency),
            };
        }
    }

    fn gateways_for(&self, currency: &str) -> Vec<String> {
        self.gateways
            .iter()
            .filter(|g| {
                g.surface
                    .supported_currencies()
                    .iter()
                    .any(|c| c == currency)
            })
            .map(|g| g.surface.id().to_string())
            .collect()
    }

    fn emit(&self, event: PurchaseEvent) {
        self.events.emit(CoreEvent::Purchase(event)).ok();
    }
}

impl std::fmt::Debug for PurchaseOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurchaseOrchestrator")
            .field("stage", &self.stage())
            .field("gateways", &self.gateways.len())
            .finish()
    }
}

fn snapshot_of(flow: &ActiveFlow) -> FlowSnapshot {
    match &flow.stage {
        Stage::CurrencySelection => FlowSnapshot::CurrencySelection {
            item_id: flow.item_id.clone(),
            options: flow.quotes.clone(),
        },
        Stage::GatewaySelection {
            currency,
            amount,
            gateway_ids,
        } => FlowSnapshot::GatewaySelection {
            item_id: flow.item_id.clone(),
            currency: currency.clone(),
            amount: *amount,
            gateway_ids: gateway_ids.clone(),
        },
        Stage::CheckoutPending {
            currency,
            amount,
            gateway_id,
            intent_id,
        } => FlowSnapshot::CheckoutPending {
            item_id: flow.item_id.clone(),
            currency: currency.clone(),
            amount: *amount,
            gateway_id: gateway_id.clone(),
            intent_id: intent_id.clone(),
        },
    }
}
