//! # Core Configuration Module
//!
//! Configuration management for the streaming client core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all bridge handles and settings the core needs. It
//! enforces fail-fast validation so a missing capability surfaces at startup
//! rather than mid-playback.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - catalog and checkout-intent API calls
//! - `SettingsStore` - persisted session fields (volume, context, modes)
//! - `MediaSink` - the single media output element
//! - `AdaptiveStreamFactory` - creates adaptive-streaming clients
//! - at least one `PaymentGatewaySurface` registration
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://api.example.com")
//!     .http_client(Arc::new(MyHttpClient))
//!     .settings_store(Arc::new(MySettingsStore))
//!     .media_sink(Arc::new(MySink))
//!     .stream_factory(Arc::new(MyFactory))
//!     .gateway(Arc::new(StripeSurface), "pk_live_...")
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    gateway::PaymentGatewaySurface, http::HttpClient, media::MediaSink,
    storage::SettingsStore, stream::AdaptiveStreamFactory,
};
use std::sync::Arc;
use std::time::Duration;

/// Default bounded wait for a checkout-intent round trip.
///
/// An intent request that does not resolve within this window is treated as
/// failed; retries are user-triggered, never automatic (duplicate-charge
/// hazard).
pub const DEFAULT_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(30);

/// One registered payment gateway plus its publishable key.
#[derive(Clone)]
pub struct GatewayRegistration {
    /// The gateway's checkout surface.
    pub surface: Arc<dyn PaymentGatewaySurface>,
    /// Publishable key passed to `initialize`.
    pub public_key: String,
}

/// Aggregated configuration and bridge handles for the client core.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL of the Catalog/Entitlement API.
    pub api_base_url: String,
    /// HTTP client bridge.
    pub http_client: Arc<dyn HttpClient>,
    /// Durable key-value persistence bridge.
    pub settings_store: Arc<dyn SettingsStore>,
    /// The session's single media output element.
    pub media_sink: Arc<dyn MediaSink>,
    /// Factory producing adaptive-streaming clients.
    pub stream_factory: Arc<dyn AdaptiveStreamFactory>,
    /// Registered payment gateways, in display order.
    pub gateways: Vec<GatewayRegistration>,
    /// Bounded wait for checkout-intent requests.
    pub checkout_timeout: Duration,
    /// Event bus buffer capacity.
    pub event_buffer: usize,
}

impl CoreConfig {
    /// Start building a configuration.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validate invariants that are cheap to check after construction.
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.is_empty() {
            return Err(Error::Config("API base URL cannot be empty".to_string()));
        }
        if self.checkout_timeout.is_zero() {
            return Err(Error::Config(
                "Checkout timeout must be greater than zero".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(Error::Config(
                "Event buffer capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`CoreConfig`] with fail-fast validation.
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    media_sink: Option<Arc<dyn MediaSink>>,
    stream_factory: Option<Arc<dyn AdaptiveStreamFactory>>,
    gateways: Vec<GatewayRegistration>,
    checkout_timeout: Option<Duration>,
    event_buffer: Option<usize>,
}

impl CoreConfigBuilder {
    /// Set the Catalog/Entitlement API base URL.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Provide the HTTP client bridge.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Provide the durable settings store bridge.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Provide the media sink bridge.
    pub fn media_sink(mut self, sink: Arc<dyn MediaSink>) -> Self {
        self.media_sink = Some(sink);
        self
    }

    /// Provide the adaptive-stream factory bridge.
    pub fn stream_factory(mut self, factory: Arc<dyn AdaptiveStreamFactory>) -> Self {
        self.stream_factory = Some(factory);
        self
    }

    /// Register a payment gateway with its publishable key.
    ///
    /// May be called multiple times; registration order is display order.
    pub fn gateway(
        mut self,
        surface: Arc<dyn PaymentGatewaySurface>,
        public_key: impl Into<String>,
    ) -> Self {
        self.gateways.push(GatewayRegistration {
            surface,
            public_key: public_key.into(),
        });
        self
    }

    /// Override the bounded wait for checkout-intent requests.
    pub fn checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout = Some(timeout);
        self
    }

    /// Override the event bus buffer capacity.
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = Some(capacity);
        self
    }

    /// Build the configuration, failing fast on missing capabilities.
    ///
    /// # Errors
    ///
    /// Returns `Error::CapabilityMissing` naming the first absent bridge, or
    /// `Error::Config` for invalid settings.
    pub fn build(self) -> Result<CoreConfig> {
        let api_base_url = self
            .api_base_url
            .ok_or_else(|| Error::Config("API base URL is required".to_string()))?;

        let http_client = self.http_client.ok_or_else(|| Error::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: "No HTTP client implementation provided. \
                      Desktop: use bridge_desktop::ReqwestHttpClient."
                .to_string(),
        })?;

        let settings_store = self
            .settings_store
            .ok_or_else(|| Error::CapabilityMissing {
                capability: "SettingsStore".to_string(),
                message: "No settings store provided. \
                          Desktop: use bridge_desktop::SqliteSettingsStore."
                    .to_string(),
            })?;

        let media_sink = self.media_sink.ok_or_else(|| Error::CapabilityMissing {
            capability: "MediaSink".to_string(),
            message: "No media sink provided. \
                      Wire the host's audio element adapter."
                .to_string(),
        })?;

        let stream_factory = self
            .stream_factory
            .ok_or_else(|| Error::CapabilityMissing {
                capability: "AdaptiveStreamFactory".to_string(),
                message: "No adaptive-stream factory provided. \
                          Wire the host's streaming engine adapter."
                    .to_string(),
            })?;

        if self.gateways.is_empty() {
            return Err(Error::CapabilityMissing {
                capability: "PaymentGatewaySurface".to_string(),
                message: "At least one payment gateway must be registered".to_string(),
            });
        }

        let config = CoreConfig {
            api_base_url,
            http_client,
            settings_store,
            media_sink,
            stream_factory,
            gateways: self.gateways,
            checkout_timeout: self.checkout_timeout.unwrap_or(DEFAULT_CHECKOUT_TIMEOUT),
            event_buffer: self
                .event_buffer
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::gateway::{GatewayIntent, GatewayOutcome};
    use bridge_traits::http::{HttpRequest, HttpResponse};
    use bridge_traits::media::MediaSinkEvent;
    use bridge_traits::memory::MemorySettingsStore;
    use bridge_traits::stream::{AdaptiveStreamClient, StreamManifestInfo};
    use tokio::sync::broadcast;

    struct StubHttp;

    #[async_trait]
    impl HttpClient for StubHttp {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Ok(HttpResponse {
                status: 200,
                headers: Default::default(),
                body: Default::default(),
            })
        }
    }

    struct StubSink {
        tx: broadcast::Sender<MediaSinkEvent>,
    }

    impl StubSink {
        fn new() -> Self {
            let (tx, _) = broadcast::channel(8);
            Self { tx }
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
            true
        }
        fn subscribe(&self) -> broadcast::Receiver<MediaSinkEvent> {
            self.tx.subscribe()
        }
    }

    struct StubStreamClient;

    #[async_trait]
    impl AdaptiveStreamClient for StubStreamClient {
        async fn load(&self, _manifest_url: &str) -> BridgeResult<StreamManifestInfo> {
            Ok(StreamManifestInfo {
                duration_seconds: None,
                container: "mpegurl".to_string(),
                bitrates: vec![],
            })
        }
        async fn destroy(&self) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct StubFactory;

    impl AdaptiveStreamFactory for StubFactory {
        fn is_supported(&self) -> bool {
            true
        }
        fn create(&self, _sink: Arc<dyn MediaSink>) -> Arc<dyn AdaptiveStreamClient> {
            Arc::new(StubStreamClient)
        }
    }

    struct StubGateway;

    #[async_trait]
    impl PaymentGatewaySurface for StubGateway {
        fn id(&self) -> &str {
            "stub"
        }
        fn display_name(&self) -> &str {
            "Stub Gateway"
        }
        fn supported_currencies(&self) -> Vec<String> {
            vec!["USD".to_string()]
        }
        async fn initialize(&self, _public_key: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn open(&self, _intent: &GatewayIntent) -> BridgeResult<GatewayOutcome> {
            Ok(GatewayOutcome::Dismissed)
        }
    }

    fn full_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .api_base_url("https://api.example.com")
            .http_client(Arc::new(StubHttp))
            .settings_store(Arc::new(MemorySettingsStore::new()))
            .media_sink(Arc::new(StubSink::new()))
            .stream_factory(Arc::new(StubFactory))
            .gateway(Arc::new(StubGateway), "pk_test_123")
    }

    #[test]
    fn build_with_all_capabilities() {
        let config = full_builder().build().unwrap();
        assert_eq!(config.gateways.len(), 1);
        assert_eq!(config.checkout_timeout, DEFAULT_CHECKOUT_TIMEOUT);
    }

    #[test]
    fn missing_media_sink_fails_fast() {
        let result = CoreConfig::builder()
            .api_base_url("https://api.example.com")
            .http_client(Arc::new(StubHttp))
            .settings_store(Arc::new(MemorySettingsStore::new()))
            .stream_factory(Arc::new(StubFactory))
            .gateway(Arc::new(StubGateway), "pk_test_123")
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "MediaSink");
            }
            other => panic!("expected CapabilityMissing, got {:?}", other.err()),
        }
    }

    #[test]
    fn no_gateways_fails_fast() {
        let result = CoreConfig::builder()
            .api_base_url("https://api.example.com")
            .http_client(Arc::new(StubHttp))
            .settings_store(Arc::new(MemorySettingsStore::new()))
            .media_sink(Arc::new(StubSink::new()))
            .stream_factory(Arc::new(StubFactory))
            .build();

        assert!(matches!(result, Err(Error::CapabilityMissing { .. })));
    }

    #[test]
    fn zero_checkout_timeout_rejected() {
        let result = full_builder()
            .checkout_timeout(Duration::from_secs(0))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
