//! Catalog/Entitlement API read client.

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{CatalogError, Result};
use crate::types::{Album, Artist, Track, UserProfile};

/// Thin typed wrapper over the catalog's read endpoints.
///
/// Each method is one GET; no caching, no pagination, no rendering concerns.
#[derive(Clone)]
pub struct CatalogClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
}

impl CatalogClient {
    /// Create a client against the given API base URL (no trailing slash).
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { http, base_url }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Catalog GET");

        let response = self
            .http
            .execute(HttpRequest::new(HttpMethod::Get, &url))
            .await?;

        if !response.is_success() {
            return Err(CatalogError::Api {
                status: response.status,
                message: response.text().unwrap_or_default(),
            });
        }

        response
            .json::<T>()
            .map_err(|e| CatalogError::Decode(e.to_string()))
    }

    /// Fetch one track by id.
    #[instrument(skip(self))]
    pub async fn track(&self, id: &str) -> Result<Track> {
        self.get_json(&format!("/tracks/{}", id)).await
    }

    /// Fetch one album by id.
    #[instrument(skip(self))]
    pub async fn album(&self, id: &str) -> Result<Album> {
        self.get_json(&format!("/albums/{}", id)).await
    }

    /// Fetch one artist by id.
    #[instrument(skip(self))]
    pub async fn artist(&self, id: &str) -> Result<Artist> {
        self.get_json(&format!("/artists/{}", id)).await
    }

    /// Fetch the signed-in user's profile with purchase history.
    #[instrument(skip(self))]
    pub async fn profile(&self) -> Result<UserProfile> {
        self.get_json("/me").await
    }

    /// Fetch all track ids of the catalog feed, in feed order.
    #[instrument(skip(self))]
    pub async fn feed_track_ids(&self) -> Result<Vec<String>> {
        self.get_json("/feed/tracks").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpResponse;
    use bytes::Bytes;
    use parking_lot::Mutex;

    struct CannedHttp {
        responses: Mutex<Vec<(u16, &'static str)>>,
        requests: Mutex<Vec<String>>,
    }

    impl CannedHttp {
        fn new(responses: Vec<(u16, &'static str)>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpClient for CannedHttp {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.requests.lock().push(request.url.clone());
            let (status, body) = self.responses.lock().remove(0);
            Ok(HttpResponse {
                status,
                headers: Default::default(),
                body: Bytes::from_static(body.as_bytes()),
            })
        }
    }

    #[tokio::test]
    async fn track_fetch_decodes() {
        let body = r#"{
            "id": "song-1",
            "title": "First Light",
            "artistId": "artist-1",
            "durationSeconds": 241.0,
            "streamingManifestUrl": "https://cdn.example.com/song-1/master.m3u8",
            "accessType": "free",
            "basePrice": {"currency": "USD", "amount": 0.0}
        }"#;
        let http = Arc::new(CannedHttp::new(vec![(200, body)]));
        let client = CatalogClient::new(http.clone(), "https://api.example.com/");

        let track = client.track("song-1").await.unwrap();
        assert_eq!(track.id, "song-1");
        assert_eq!(
            http.requests.lock()[0],
            "https://api.example.com/tracks/song-1"
        );
    }

    #[tokio::test]
    async fn non_success_maps_to_api_error() {
        let http = Arc::new(CannedHttp::new(vec![(404, "not found")]));
        let client = CatalogClient::new(http, "https://api.example.com");

        let err = client.track("missing").await.unwrap_err();
        match err {
            CatalogError::Api { status, .. } => assert_eq!(status, 404),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bad_body_maps_to_decode_error() {
        let http = Arc::new(CannedHttp::new(vec![(200, "<html>")]));
        let client = CatalogClient::new(http, "https://api.example.com");

        let err = client.profile().await.unwrap_err();
        assert!(matches!(err, CatalogError::Decode(_)));
    }
}
