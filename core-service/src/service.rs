//! # Client Core Facade
//!
//! Wires the session store, attachment manager, transport, ledger, resolver
//! and purchase orchestrator into the operations a host UI calls. The
//! session object is created once here and owned for the application's
//! lifetime; hosts hold an `Arc<ClientCore>` and subscribe to the event bus
//! and the session watch channel.
//!
//! Every play action passes through the entitlement gate first. A blocked
//! gate does not error: it starts the appropriate purchase flow and reports
//! that redirection in the returned [`PlayOutcome`].

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use core_catalog::checkout::{CheckoutIntentApi, HttpCheckoutIntentClient};
use core_catalog::types::{ItemType, Price, Track, UserProfile};
use core_catalog::CatalogClient;
use core_entitlement::{
    decide, CheckoutOutcome, EntitlementDecision, FlowSnapshot, ItemAccess, PurchaseLedger,
    PurchaseOrchestrator, PurchaseRequest, SubscriptionOffer,
};
use core_playback::{
    ContextKind, PlaybackContext, PlaybackError, RepeatMode, SessionStore,
    StreamingAttachmentManager, TrackSource, TransportController,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;

use crate::error::{Result, ServiceError};

/// What happened to a play request after the entitlement gate.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    /// The gate passed and playback started.
    Playing { track_id: String },
    /// The gate blocked and the purchase flow took over. `stage` is where
    /// the flow now stands (currency or gateway selection).
    PurchaseStarted {
        decision: EntitlementDecision,
        stage: FlowSnapshot,
    },
}

/// [`TrackSource`] backed by the catalog read client.
struct CatalogTrackSource {
    catalog: CatalogClient,
}

#[async_trait]
impl TrackSource for CatalogTrackSource {
    async fn track(&self, id: &str) -> core_playback::Result<Track> {
        self.catalog.track(id).await.map_err(PlaybackError::from)
    }
}

/// The application-root owner of the whole client core.
pub struct ClientCore {
    catalog: CatalogClient,
    session: Arc<SessionStore>,
    attachment: Arc<StreamingAttachmentManager>,
    transport: Arc<TransportController>,
    ledger: Arc<PurchaseLedger>,
    orchestrator: Arc<PurchaseOrchestrator>,
    events: EventBus,
    profile: RwLock<Option<UserProfile>>,
    sink_loop: Mutex<Option<JoinHandle<()>>>,
}

impl ClientCore {
    /// Build and start the core from a validated configuration.
    ///
    /// Hydrates the session from persisted preferences and starts the sink
    /// event loop. Call once at application startup.
    pub async fn initialize(config: CoreConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let events = EventBus::new(config.event_buffer);
        let session = SessionStore::hydrate(config.settings_store.clone(), events.clone()).await;
        let attachment = Arc::new(StreamingAttachmentManager::new(
            config.media_sink.clone(),
            config.stream_factory.clone(),
            session.clone(),
            events.clone(),
        ));

        let catalog = CatalogClient::new(config.http_client.clone(), &config.api_base_url);
        let tracks: Arc<dyn TrackSource> = Arc::new(CatalogTrackSource {
            catalog: catalog.clone(),
        });
        let transport = Arc::new(TransportController::new(
            session.clone(),
            attachment.clone(),
            config.media_sink.clone(),
            tracks,
            events.clone(),
        ));
        let sink_loop = transport.spawn_event_loop();

        let intents: Arc<dyn CheckoutIntentApi> = Arc::new(HttpCheckoutIntentClient::new(
            config.http_client.clone(),
            &config.api_base_url,
            config.checkout_timeout,
        ));
        let ledger = Arc::new(PurchaseLedger::new());
        let orchestrator = Arc::new(PurchaseOrchestrator::new(
            intents,
            config.gateways.clone(),
            ledger.clone(),
            events.clone(),
        ));

        info!(api = %config.api_base_url, "client core initialized");
        Ok(Arc::new(Self {
            catalog,
            session,
            attachment,
            transport,
            ledger,
            orchestrator,
            events,
            profile: RwLock::new(None),
            sink_loop: Mutex::new(Some(sink_loop)),
        }))
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// The core-wide event bus.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The reactive session store.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// The local purchase ledger (membership queries and the explicit
    /// compensating step for optimistic entries).
    pub fn ledger(&self) -> &Arc<PurchaseLedger> {
        &self.ledger
    }

    // ------------------------------------------------------------------
    // Account lifecycle
    // ------------------------------------------------------------------

    /// Fetch the user profile and hydrate the purchase ledger from it.
    #[instrument(skip(self))]
    pub async fn sign_in(&self) -> Result<UserProfile> {
        let profile = self.catalog.profile().await?;
        self.ledger.hydrate_from_profile(&profile);
        *self.profile.write() = Some(profile.clone());
        info!(user = %profile.id, "signed in");
        Ok(profile)
    }

    /// Re-fetch the profile, replacing the ledger with server truth.
    pub async fn refresh_profile(&self) -> Result<UserProfile> {
        self.sign_in().await
    }

    /// Sign the user out: stop playback, drop entitlement state, and reset
    /// the session while keeping persisted preferences.
    pub async fn sign_out(&self) {
        self.orchestrator.cancel();
        self.attachment.destroy_current().await;
        self.session.reset();
        self.ledger.clear();
        *self.profile.write() = None;
        info!("signed out");
    }

    /// Stop the sink event loop. Idempotent; used on application shutdown.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sink_loop.lock().take() {
            handle.abort();
        }
    }

    // ------------------------------------------------------------------
    // Entitlement gate & playback
    // ------------------------------------------------------------------

    /// Resolve the entitlement decision for a track under the signed-in
    /// user (anonymous users count as unprivileged with an empty ledger).
    pub fn get_entitlement(&self, track: &Track) -> EntitlementDecision {
        let unrestricted = self
            .profile
            .read()
            .as_ref()
            .map(UserProfile::is_unrestricted)
            .unwrap_or(false);
        decide(&self.ledger, unrestricted, &ItemAccess::for_track(track))
    }

    /// Play a track, gated by entitlement.
    ///
    /// A passing gate starts playback; a blocked gate starts the purchase
    /// flow the decision calls for and reports it in the outcome.
    #[instrument(skip(self), fields(track_id))]
    pub async fn play_track(&self, track_id: &str) -> Result<PlayOutcome> {
        let track = self.catalog.track(track_id).await?;
        let decision = self.get_entitlement(&track);

        if decision.allows_playback() {
            self.transport.select_track(track).await?;
            return Ok(PlayOutcome::Playing {
                track_id: track_id.to_string(),
            });
        }

        debug!(?decision, "play blocked by entitlement gate");
        let stage = self.begin_purchase_for(&track, decision).await?;
        Ok(PlayOutcome::PurchaseStarted { decision, stage })
    }

    /// Replace the playback context with an album and play its first track
    /// through the gate.
    pub async fn play_album(&self, album_id: &str) -> Result<PlayOutcome> {
        let album = self.catalog.album(album_id).await?;
        let first = album
            .track_ids
            .first()
            .cloned()
            .ok_or_else(|| ServiceError::Playback(PlaybackError::TrackNotFound(format!(
                "album {album_id} has no tracks"
            ))))?;
        self.session
            .set_context(PlaybackContext {
                kind: ContextKind::Album,
                context_id: Some(album.id.clone()),
                track_ids: album.track_ids.clone(),
            })
            .await;
        self.play_track(&first).await
    }

    /// Replace the playback context with the catalog feed.
    pub async fn browse_feed(&self) -> Result<()> {
        let track_ids = self.catalog.feed_track_ids().await?;
        self.session
            .set_context(PlaybackContext {
                kind: ContextKind::Feed,
                context_id: None,
                track_ids,
            })
            .await;
        Ok(())
    }

    /// The track id the UI should display, freezing a random default from
    /// the current context when nothing was ever selected.
    pub async fn display_track_id(&self) -> Option<String> {
        let candidates = self.session.snapshot().context.track_ids.clone();
        self.session.resolve_display_track(&candidates).await
    }

    // ------------------------------------------------------------------
    // Transport passthrough
    // ------------------------------------------------------------------

    pub async fn toggle_play(&self) -> Result<()> {
        Ok(self.transport.toggle_play().await?)
    }

    pub async fn toggle_mute(&self) -> Result<()> {
        Ok(self.transport.toggle_mute().await?)
    }

    pub async fn next(&self) -> Result<()> {
        Ok(self.transport.next().await?)
    }

    pub async fn prev(&self) -> Result<()> {
        Ok(self.transport.prev().await?)
    }

    pub async fn seek(&self, seconds: f64) -> Result<()> {
        Ok(self.transport.seek(seconds).await?)
    }

    pub async fn set_volume_percent(&self, percent: f32) -> Result<()> {
        Ok(self.transport.set_volume_percent(percent).await?)
    }

    pub async fn set_shuffle_mode(&self, enabled: bool) {
        self.session.set_shuffle_mode(enabled).await;
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) {
        self.session.set_repeat_mode(mode).await;
    }

    // ------------------------------------------------------------------
    // Purchase flow
    // ------------------------------------------------------------------

    /// Start a purchase flow for a track, composing quotes (and the artist
    /// subscription prerequisite, when the resolver demands one) from the
    /// catalog.
    #[instrument(skip(self), fields(track_id))]
    pub async fn request_purchase(&self, track_id: &str) -> Result<FlowSnapshot> {
        let track = self.catalog.track(track_id).await?;
        let decision = self.get_entitlement(&track);
        if decision == EntitlementDecision::Purchased {
            return Err(ServiceError::AlreadyOwned(track_id.to_string()));
        }
        self.begin_purchase_for(&track, decision).await
    }

    /// Choose the checkout currency (also the entry point the host calls to
    /// re-select after a "no gateway for this currency" bounce).
    pub fn request_currency_selection(&self, currency: &str) -> Result<FlowSnapshot> {
        Ok(self.orchestrator.choose_currency(currency)?)
    }

    /// Hand the checkout to a gateway and wait for its outcome.
    pub async fn request_checkout(&self, gateway_id: &str) -> Result<CheckoutOutcome> {
        Ok(self.orchestrator.choose_gateway(gateway_id).await?)
    }

    /// Abandon the current purchase flow. Silent.
    pub fn cancel_purchase(&self) {
        self.orchestrator.cancel();
    }

    /// Current stage of the purchase flow.
    pub fn purchase_stage(&self) -> FlowSnapshot {
        self.orchestrator.stage()
    }

    /// Registered gateways as `(id, display name)`.
    pub fn gateway_directory(&self) -> Vec<(String, String)> {
        self.orchestrator.gateway_directory()
    }

    /// Compensating step: drop an optimistic ledger entry after server-side
    /// confirmation disagreed with the gateway. Host-invoked only.
    pub fn revert_optimistic_purchase(&self, item_type: ItemType, item_id: &str) -> bool {
        self.ledger.revert_optimistic(item_type, item_id)
    }

    // ------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------

    /// Build the purchase request a blocked decision calls for and start it.
    async fn begin_purchase_for(
        &self,
        track: &Track,
        decision: EntitlementDecision,
    ) -> Result<FlowSnapshot> {
        let request = match decision {
            EntitlementDecision::PurchaseRequired => PurchaseRequest {
                item_type: ItemType::Song,
                item_id: track.id.clone(),
                artist_id: track.artist_id.clone(),
                quotes: track.price_options(),
                description: Some(track.title.clone()),
                subscription_offer: None,
            },
            EntitlementDecision::SubscriptionRequired {
                purchase_prerequisite: true,
            } => PurchaseRequest {
                item_type: ItemType::Song,
                item_id: track.id.clone(),
                artist_id: track.artist_id.clone(),
                quotes: track.price_options(),
                description: Some(track.title.clone()),
                subscription_offer: Some(self.subscription_offer(&track.artist_id).await?),
            },
            EntitlementDecision::SubscriptionRequired {
                purchase_prerequisite: false,
            } => {
                // The subscription itself is the item to buy.
                let offer = self.subscription_offer(&track.artist_id).await?;
                PurchaseRequest {
                    item_type: ItemType::ArtistSubscription,
                    item_id: offer.artist_id.clone(),
                    artist_id: offer.artist_id.clone(),
                    quotes: offer.quotes,
                    description: offer.description,
                    subscription_offer: None,
                }
            }
            EntitlementDecision::Free
            | EntitlementDecision::Subscribed
            | EntitlementDecision::Purchased => {
                // Nothing to buy; callers gate on allows_playback first.
                return Err(ServiceError::AlreadyOwned(track.id.clone()));
            }
        };
        Ok(self.orchestrator.begin_purchase(request)?)
    }

    async fn subscription_offer(&self, artist_id: &str) -> Result<SubscriptionOffer> {
        let artist = self.catalog.artist(artist_id).await?;
        let mut quotes: Vec<Price> = Vec::new();
        if let Some(base) = artist.subscription_price {
            quotes.push(base);
        }
        for price in artist.converted_subscription_prices {
            if !quotes.iter().any(|p| p.currency == price.currency) {
                quotes.push(price);
            }
        }
        Ok(SubscriptionOffer {
            artist_id: artist.id,
            quotes,
            description: Some(format!("Subscription to {}", artist.name)),
        })
    }
}

impl std::fmt::Debug for ClientCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCore")
            .field("signed_in", &self.profile.read().is_some())
            .field("purchase_stage", &self.orchestrator.stage())
            .finish()
    }
}
