//! Checkout Intent API client.
//!
//! The only write endpoint the core talks to: `POST /checkout/intents`
//! exchanges `(itemType, itemId, amount, currency)` for a server-issued
//! [`CheckoutIntent`] the chosen gateway can consume.
//!
//! The request carries a bounded wait. An intent that does not resolve in
//! time is a failed initiation, never silently retried, since a duplicate
//! request risks a duplicate charge if the first one landed server-side.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::error::{CatalogError, Result};
use crate::types::{CheckoutIntent, ItemType};

/// Request body for intent creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutIntentRequest {
    pub item_type: ItemType,
    pub item_id: String,
    pub amount: f64,
    pub currency: String,
}

/// Seam for intent creation, mockable in orchestrator tests.
#[async_trait]
pub trait CheckoutIntentApi: Send + Sync {
    /// Request a server-issued checkout intent.
    ///
    /// # Errors
    ///
    /// - `CatalogError::IntentTimeout` when the bounded wait elapses
    /// - `CatalogError::Api` on a non-success response
    async fn create_intent(&self, request: &CheckoutIntentRequest) -> Result<CheckoutIntent>;
}

/// HTTP implementation of [`CheckoutIntentApi`].
#[derive(Clone)]
pub struct HttpCheckoutIntentClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    bounded_wait: Duration,
}

impl HttpCheckoutIntentClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        bounded_wait: Duration,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http,
            base_url,
            bounded_wait,
        }
    }
}

#[async_trait]
impl CheckoutIntentApi for HttpCheckoutIntentClient {
    #[instrument(skip(self, request), fields(item_id = %request.item_id, currency = %request.currency))]
    async fn create_intent(&self, request: &CheckoutIntentRequest) -> Result<CheckoutIntent> {
        let url = format!("{}/checkout/intents", self.base_url);
        let http_request = HttpRequest::new(HttpMethod::Post, &url).json(request)?;

        debug!(amount = request.amount, "Requesting checkout intent");

        let response = match timeout(self.bounded_wait, self.http.execute(http_request)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(wait = ?self.bounded_wait, "Checkout intent request exceeded bounded wait");
                return Err(CatalogError::IntentTimeout(self.bounded_wait));
            }
        };

        if !response.is_success() {
            return Err(CatalogError::Api {
                status: response.status,
                message: response.text().unwrap_or_default(),
            });
        }

        response
            .json::<CheckoutIntent>()
            .map_err(|e| CatalogError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpResponse;
    use bytes::Bytes;

    struct SlowHttp;

    #[async_trait]
    impl HttpClient for SlowHttp {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("the bounded wait must fire first")
        }
    }

    struct OkHttp;

    #[async_trait]
    impl HttpClient for OkHttp {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            // Echo the amount/currency back the way the API does.
            let req: CheckoutIntentRequest =
                serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
            let body = format!(
                r#"{{"id":"intent-1","amount":{},"currency":"{}"}}"#,
                req.amount, req.currency
            );
            Ok(HttpResponse {
                status: 200,
                headers: Default::default(),
                body: Bytes::from(body),
            })
        }
    }

    fn request() -> CheckoutIntentRequest {
        CheckoutIntentRequest {
            item_type: ItemType::Song,
            item_id: "song-1".to_string(),
            amount: 400.0,
            currency: "INR".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_wait_maps_to_timeout_error() {
        let client = HttpCheckoutIntentClient::new(
            Arc::new(SlowHttp),
            "https://api.example.com",
            Duration::from_secs(5),
        );

        let err = client.create_intent(&request()).await.unwrap_err();
        assert!(matches!(err, CatalogError::IntentTimeout(_)));
    }

    #[tokio::test]
    async fn intent_echoes_amount_and_currency() {
        let client = HttpCheckoutIntentClient::new(
            Arc::new(OkHttp),
            "https://api.example.com",
            Duration::from_secs(5),
        );

        let intent = client.create_intent(&request()).await.unwrap();
        assert_eq!(intent.id, "intent-1");
        assert_eq!(intent.amount, 400.0);
        assert_eq!(intent.currency, "INR");
    }
}
