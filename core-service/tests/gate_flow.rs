//! Facade-level flows over stub bridges: the entitlement gate in front of
//! play, the redirect into the purchase machine, and sign-out semantics.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::gateway::{GatewayIntent, GatewayOutcome, PaymentGatewaySurface};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::media::{MediaSink, MediaSinkEvent};
use bridge_traits::memory::MemorySettingsStore;
use bridge_traits::stream::{AdaptiveStreamClient, AdaptiveStreamFactory, StreamManifestInfo};
use core_entitlement::{EntitlementDecision, FlowSnapshot};
use core_runtime::config::CoreConfig;
use core_service::{ClientCore, PlayOutcome};

// ============================================================================
// Stub HTTP backend with a canned catalog
// ============================================================================

struct StubApi {
    admin: bool,
}

impl StubApi {
    fn respond(&self, request: &HttpRequest) -> Option<String> {
        let path = request.url.strip_prefix("https://api.test")?;
        match (request.method, path) {
            (HttpMethod::Get, "/tracks/song-free") => Some(track_json(
                "song-free",
                "free",
                r#"{"currency":"USD","amount":0.0}"#,
                "[]",
            )),
            (HttpMethod::Get, "/tracks/song-sub") => Some(track_json(
                "song-sub",
                "subscription",
                r#"{"currency":"USD","amount":0.0}"#,
                "[]",
            )),
            (HttpMethod::Get, "/tracks/song-buy") => Some(track_json(
                "song-buy",
                "purchase-only",
                r#"{"currency":"USD","amount":5.0}"#,
                r#"[{"currency":"EUR","amount":4.5},{"currency":"INR","amount":400.0}]"#,
            )),
            (HttpMethod::Get, "/artists/artist-x") => Some(
                r#"{"id":"artist-x","name":"Artist X",
                    "subscriptionPrice":{"currency":"USD","amount":10.0},
                    "convertedSubscriptionPrices":[]}"#
                    .to_string(),
            ),
            (HttpMethod::Get, "/me") => Some(if self.admin {
                r#"{"id":"u1","displayName":"Root","roles":["admin"]}"#.to_string()
            } else {
                r#"{"id":"u1","displayName":"Ada","roles":["listener"]}"#.to_string()
            }),
            (HttpMethod::Get, "/feed/tracks") => {
                Some(r#"["song-free","song-sub","song-buy"]"#.to_string())
            }
            (HttpMethod::Post, "/checkout/intents") => {
                let body = request.body.as_ref()?;
                let req: serde_json::Value = serde_json::from_slice(body).ok()?;
                Some(format!(
                    r#"{{"id":"intent-1","amount":{},"currency":{}}}"#,
                    req["amount"], req["currency"]
                ))
            }
            _ => None,
        }
    }
}

fn track_json(id: &str, access: &str, base: &str, converted: &str) -> String {
    format!(
        r#"{{"id":"{id}","title":"Track {id}","artistId":"artist-x",
            "durationSeconds":180.0,
            "streamingManifestUrl":"https://cdn.test/{id}/master.m3u8",
            "accessType":"{access}","basePrice":{base},"convertedPrices":{converted}}}"#
    )
}

#[async_trait]
impl HttpClient for StubApi {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        match self.respond(&request) {
            Some(body) => Ok(HttpResponse {
                status: 200,
                headers: Default::default(),
                body: Bytes::from(body),
            }),
            None => Ok(HttpResponse {
                status: 404,
                headers: Default::default(),
                body: Bytes::from_static(b"not found"),
            }),
        }
    }
}

// ============================================================================
// Stub sink / stream factory / gateway
// ============================================================================

struct StubSink {
    tx: broadcast::Sender<MediaSinkEvent>,
    plays: Mutex<u32>,
}

impl StubSink {
    fn new() -> Arc<Self> {
        let (tx, _) = broadcast::channel(16);
        Arc::new(Self {
            tx,
            plays: Mutex::new(0),
        })
    }
}

#[async_trait]
impl MediaSink for StubSink {
    async fn set_source_url(&self, _url: &str) -> BridgeResult<()> {
        Ok(())
    }
    async fn clear_source(&self) -> BridgeResult<()> {
        Ok(())
    }
    async fn play(&self) -> BridgeResult<()> {
        *self.plays.lock() += 1;
        Ok(())
    }
    async fn pause(&self) -> BridgeResult<()> {
        Ok(())
    }
    async fn seek(&self, _seconds: f64) -> BridgeResult<()> {
        Ok(())
    }
    async fn set_volume(&self, _volume: f32) -> BridgeResult<()> {
        Ok(())
    }
    async fn set_muted(&self, _muted: bool) -> BridgeResult<()> {
        Ok(())
    }
    fn can_play_container(&self, _container: &str) -> bool {
        false
    }
    fn subscribe(&self) -> broadcast::Receiver<MediaSinkEvent> {
        self.tx.subscribe()
    }
}

struct ReadyClient;

#[async_trait]
impl AdaptiveStreamClient for ReadyClient {
    async fn load(&self, _manifest_url: &str) -> BridgeResult<StreamManifestInfo> {
        Ok(StreamManifestInfo {
            duration_seconds: Some(180.0),
            container: "mpegurl".to_string(),
            bitrates: vec![128_000],
        })
    }
    async fn destroy(&self) -> BridgeResult<()> {
        Ok(())
    }
}

struct ReadyFactory;

impl AdaptiveStreamFactory for ReadyFactory {
    fn is_supported(&self) -> bool {
        true
    }
    fn create(&self, _sink: Arc<dyn MediaSink>) -> Arc<dyn AdaptiveStreamClient> {
        Arc::new(ReadyClient)
    }
}

struct HappyGateway;

#[async_trait]
impl PaymentGatewaySurface for HappyGateway {
    fn id(&self) -> &str {
        "stripe"
    }
    fn display_name(&self) -> &str {
        "Stripe"
    }
    fn supported_currencies(&self) -> Vec<String> {
        vec!["USD".to_string(), "EUR".to_string(), "INR".to_string()]
    }
    async fn initialize(&self, _public_key: &str) -> BridgeResult<()> {
        Ok(())
    }
    async fn open(&self, _intent: &GatewayIntent) -> BridgeResult<GatewayOutcome> {
        Ok(GatewayOutcome::Succeeded { reference: None })
    }
}

// ============================================================================
// Harness
// ============================================================================

async fn core(admin: bool) -> (Arc<ClientCore>, Arc<StubSink>) {
    let sink = StubSink::new();
    let config = CoreConfig::builder()
        .api_base_url("https://api.test")
        .http_client(Arc::new(StubApi { admin }))
        .settings_store(Arc::new(MemorySettingsStore::new()))
        .media_sink(sink.clone())
        .stream_factory(Arc::new(ReadyFactory))
        .gateway(Arc::new(HappyGateway), "pk_test")
        .build()
        .unwrap();

    let core = ClientCore::initialize(config).await.unwrap();
    core.sign_in().await.unwrap();
    (core, sink)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn free_track_passes_the_gate_and_plays() {
    let (core, sink) = core(false).await;

    let outcome = core.play_track("song-free").await.unwrap();
    assert_eq!(
        outcome,
        PlayOutcome::Playing {
            track_id: "song-free".to_string()
        }
    );
    assert_eq!(*sink.plays.lock(), 1);
    assert!(core.session().snapshot().is_playing);
}

#[tokio::test]
async fn subscription_track_redirects_into_subscription_purchase() {
    let (core, sink) = core(false).await;

    let outcome = core.play_track("song-sub").await.unwrap();
    let PlayOutcome::PurchaseStarted { decision, stage } = outcome else {
        panic!("gate should have blocked");
    };
    assert_eq!(
        decision,
        EntitlementDecision::SubscriptionRequired {
            purchase_prerequisite: false
        }
    );
    // Single USD quote skips currency selection; the item is the artist
    // subscription itself.
    assert!(matches!(
        stage,
        FlowSnapshot::GatewaySelection { ref item_id, .. } if item_id == "artist-x"
    ));
    assert_eq!(*sink.plays.lock(), 0, "blocked gate never touches the sink");

    // Completing the checkout flips the entitlement; play now proceeds.
    core.request_checkout("stripe").await.unwrap();
    let outcome = core.play_track("song-sub").await.unwrap();
    assert!(matches!(outcome, PlayOutcome::Playing { .. }));
}

#[tokio::test]
async fn purchase_only_track_runs_subscription_prerequisite_then_purchase() {
    let (core, _sink) = core(false).await;

    let outcome = core.play_track("song-buy").await.unwrap();
    let PlayOutcome::PurchaseStarted { decision, stage } = outcome else {
        panic!("gate should have blocked");
    };
    assert_eq!(
        decision,
        EntitlementDecision::SubscriptionRequired {
            purchase_prerequisite: true
        }
    );
    // The prerequisite subscription flow runs first.
    assert!(matches!(
        stage,
        FlowSnapshot::GatewaySelection { ref item_id, .. } if item_id == "artist-x"
    ));

    // Subscription succeeds; the original song purchase re-enters currency
    // selection with all three quotes.
    core.request_checkout("stripe").await.unwrap();
    let stage = core.purchase_stage();
    let FlowSnapshot::CurrencySelection { item_id, options } = stage else {
        panic!("original purchase should have resumed");
    };
    assert_eq!(item_id, "song-buy");
    assert_eq!(options.len(), 3);

    core.request_currency_selection("INR").unwrap();
    core.request_checkout("stripe").await.unwrap();

    let outcome = core.play_track("song-buy").await.unwrap();
    assert!(matches!(outcome, PlayOutcome::Playing { .. }));
}

#[tokio::test]
async fn admin_role_short_circuits_every_gate() {
    let (core, _sink) = core(true).await;

    for id in ["song-free", "song-sub", "song-buy"] {
        let outcome = core.play_track(id).await.unwrap();
        assert!(matches!(outcome, PlayOutcome::Playing { .. }), "{id}");
    }
}

#[tokio::test]
async fn sign_out_resets_session_and_forgets_entitlements() {
    let (core, _sink) = core(false).await;
    core.browse_feed().await.unwrap();
    core.set_volume_percent(60.0).await.unwrap();
    core.play_track("song-free").await.unwrap();

    core.sign_out().await;

    let snap = core.session().snapshot();
    assert!(snap.selected_track.is_none());
    assert!(!snap.is_playing);
    assert!((snap.volume - 0.6).abs() < 1e-6, "volume preserved");
    assert_eq!(snap.context.track_ids.len(), 3, "context preserved");
    assert!(core.ledger().entries().is_empty());
}

#[tokio::test]
async fn display_track_is_frozen_from_the_context() {
    let (core, _sink) = core(false).await;
    core.browse_feed().await.unwrap();

    let first = core.display_track_id().await.unwrap();
    let second = core.display_track_id().await.unwrap();
    assert_eq!(first, second);
    assert!(["song-free", "song-sub", "song-buy"].contains(&first.as_str()));
}
