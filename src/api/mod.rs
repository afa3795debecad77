//! HTTP client for the consultant backend.
//!
//! # Example
//!
//! ```rust,no_run
//! use durian_chat::api::Client;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new("http://localhost:8000")?;
//!
//! // Speech to text
//! let text = client.asr().transcribe("question.m4a").await?;
//!
//! // Auth
//! let client = client.with_bearer_token("token");
//! let me = client.auth().me().await?;
//!
//! // Start watering until the soil reaches 60% moisture
//! client.irrigation().on(60).await?;
//! # Ok(())
//! # }
//! ```

mod asr;
mod auth;
mod blog;
mod chat;
mod irrigation;
pub mod types;

pub use asr::AsrApi;
pub use auth::AuthApi;
pub use blog::{ALL_POSTS_TAG, BlogApi, DEFAULT_POST_TAG};
pub use chat::ChatApi;
pub use irrigation::{IrrigationApi, MAX_MOISTURE_LIMIT};
pub use types::*;

use reqwest::{Method, RequestBuilder};
use url::Url;

use crate::error::{Error, Result};
use crate::stream::ResponseBody;

/// Header the ngrok tunnel in front of the backend needs to skip its HTML interstitial.
const NGROK_SKIP_WARNING: &str = "ngrok-skip-browser-warning";

/// Opens chat requests on behalf of the reconciler.
///
/// Implemented by [`Client`] for the real backend and by in-memory fakes in
/// tests. Dropping the returned future or body aborts the request.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync + std::fmt::Debug {
    /// Send the request and return the response body once headers arrive.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    async fn open(&self, req: ChatRequest) -> Result<ResponseBody>;
}

/// HTTP client for the backend API.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    http: reqwest::Client,
    token: Option<String>,
}

impl Client {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the backend (e.g., "http://localhost:8000")
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a new client with a custom reqwest client.
    pub fn with_client(base_url: impl AsRef<str>, http: reqwest::Client) -> Result<Self> {
        let mut base_url = Url::parse(base_url.as_ref())?;
        // Relative joins must append to the base path, not replace its last segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            http,
            token: None,
        })
    }

    /// Attach a bearer token to every request.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The bearer token in use, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the streaming chat API.
    pub fn chat(&self) -> ChatApi<'_> {
        ChatApi { client: self }
    }

    /// Access the speech recognition API.
    pub fn asr(&self) -> AsrApi<'_> {
        AsrApi { client: self }
    }

    /// Access the auth API.
    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi { client: self }
    }

    /// Access the pump control API.
    pub fn irrigation(&self) -> IrrigationApi<'_> {
        IrrigationApi { client: self }
    }

    /// Access the community feed API.
    pub fn blog(&self) -> BlogApi<'_> {
        BlogApi { client: self }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let mut rb = self
            .http
            .request(method, self.url(path)?)
            .header(NGROK_SKIP_WARNING, "true");
        if let Some(token) = &self.token {
            rb = rb.bearer_auth(token);
        }
        Ok(rb)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::api_error(response).await)
        }
    }

    /// Convert a failed response into [`Error::Api`], preferring `{"detail"}`.
    async fn api_error(response: reqwest::Response) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<types::ErrorDetail>(&body)
            .map(|e| e.detail)
            .ok()
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
            .or_else(|| status.canonical_reason().map(ToString::to_string))
            .unwrap_or_else(|| "Unknown error".to_string());
        Error::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for Client {
    async fn open(&self, req: ChatRequest) -> Result<ResponseBody> {
        self.chat().open(&req).await
    }
}
