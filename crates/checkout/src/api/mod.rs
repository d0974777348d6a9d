//! Commerce API client.
//!
//! # Architecture
//!
//! - The catalog/pricing service is the source of truth - NO local discount
//!   arithmetic, the cart is re-fetched after every mutation
//! - [`CommerceApi`] is the seam between the engine and the transport;
//!   [`HttpCommerceClient`] is the production REST/JSON implementation
//! - Session-cookie auth; a 401 maps to [`ApiError::SessionExpired`] so the
//!   embedding application can escalate to its auth layer
//!
//! Cart reads and mutations are never cached: shipping quotes are
//! destination-dependent and must be fetched fresh.

pub mod types;

pub use types::*;

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;
use verdon_core::AddressId;

use crate::config::CheckoutConfig;

/// Errors that can occur when calling the commerce API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP transport failure (includes timeouts).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Server returned a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        message: String,
    },

    /// Session cookie was rejected (401).
    #[error("session expired")]
    SessionExpired,
}

impl ApiError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Decode(_) | Self::SessionExpired => false,
        }
    }
}

/// Operations the engine consumes from the commerce platform.
///
/// Implemented by [`HttpCommerceClient`] in production and by in-memory
/// mocks in tests. Every operation is an async suspension point; callers
/// must not assume ordering between two independently-triggered calls.
#[allow(async_fn_in_trait)]
pub trait CommerceApi {
    /// Fetch the active cart. With a destination the server also computes
    /// the shipping fee and returns the available shipping options.
    async fn get_cart(&self, destination: Option<&Destination>) -> Result<CartEnvelope, ApiError>;

    /// Apply a promotion code to the server-side cart.
    async fn apply_promotion(&self, code: &str) -> Result<(), ApiError>;

    /// Remove the applied promotion code.
    async fn remove_promotion(&self) -> Result<(), ApiError>;

    /// Apply a gift card code to the server-side cart.
    async fn apply_gift_card(&self, code: &str) -> Result<(), ApiError>;

    /// Remove the applied gift card code.
    async fn remove_gift_card(&self) -> Result<(), ApiError>;

    /// Submit the final checkout request.
    async fn submit_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutConfirmation, ApiError>;

    /// Create a new saved address; returns the updated profile.
    async fn add_address(&self, address: &Address) -> Result<CustomerProfile, ApiError>;

    /// Edit a saved address; returns the updated profile.
    async fn edit_address(
        &self,
        id: AddressId,
        patch: &Address,
    ) -> Result<CustomerProfile, ApiError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Client
// ─────────────────────────────────────────────────────────────────────────────

/// REST/JSON client for the commerce platform.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct HttpCommerceClient {
    inner: Arc<HttpCommerceClientInner>,
}

struct HttpCommerceClientInner {
    client: reqwest::Client,
    base_url: url::Url,
    session_cookie: String,
}

impl HttpCommerceClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &CheckoutConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpCommerceClientInner {
                client,
                base_url: config.api_base_url.clone(),
                session_cookie: format!(
                    "verdon_session={}",
                    config.session_cookie.expose_secret()
                ),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        format!("{base}{path}")
    }

    /// Send a request and decode the JSON response.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request
            .header("Cookie", &self.inner.session_cookie)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::SessionExpired);
        }

        // Read the body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Commerce API returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %body.chars().take(500).collect::<String>(),
                    "Failed to decode commerce API response"
                );
                Err(ApiError::Decode(e))
            }
        }
    }

    /// Execute a mutation whose response body is irrelevant.
    async fn execute_unit(&self, request: reqwest::RequestBuilder) -> Result<(), ApiError> {
        let _: serde_json::Value = self.execute(request).await?;
        Ok(())
    }
}

impl CommerceApi for HttpCommerceClient {
    #[instrument(skip(self))]
    async fn get_cart(&self, destination: Option<&Destination>) -> Result<CartEnvelope, ApiError> {
        let mut request = self.inner.client.get(self.endpoint("/api/cart"));
        if let Some(dest) = destination {
            request = request.query(&[
                ("country", dest.country_code.as_str()),
                ("postal_code", dest.postal_code.as_str()),
            ]);
        }
        self.execute(request).await
    }

    #[instrument(skip(self, code))]
    async fn apply_promotion(&self, code: &str) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("/api/cart/promotion"))
            .json(&serde_json::json!({ "code": code }));
        self.execute_unit(request).await
    }

    #[instrument(skip(self))]
    async fn remove_promotion(&self) -> Result<(), ApiError> {
        let request = self.inner.client.delete(self.endpoint("/api/cart/promotion"));
        self.execute_unit(request).await
    }

    #[instrument(skip(self, code))]
    async fn apply_gift_card(&self, code: &str) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("/api/cart/gift-card"))
            .json(&serde_json::json!({ "code": code }));
        self.execute_unit(request).await
    }

    #[instrument(skip(self))]
    async fn remove_gift_card(&self) -> Result<(), ApiError> {
        let request = self.inner.client.delete(self.endpoint("/api/cart/gift-card"));
        self.execute_unit(request).await
    }

    #[instrument(skip(self, request), fields(payment_method = ?request.payment_method))]
    async fn submit_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutConfirmation, ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("/api/checkout"))
            .json(request);
        self.execute(request).await
    }

    #[instrument(skip(self, address))]
    async fn add_address(&self, address: &Address) -> Result<CustomerProfile, ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("/api/account/addresses"))
            .json(address);
        self.execute(request).await
    }

    #[instrument(skip(self, patch), fields(address_id = %id))]
    async fn edit_address(
        &self,
        id: AddressId,
        patch: &Address,
    ) -> Result<CustomerProfile, ApiError> {
        let request = self
            .inner
            .client
            .put(self.endpoint(&format!("/api/account/addresses/{id}")))
            .json(patch);
        self.execute(request).await
    }
}
