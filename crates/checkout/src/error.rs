//! Engine-level error taxonomy.
//!
//! Components return these explicitly - no panics cross component
//! boundaries - and only the embedding application turns them into
//! user-visible notifications. Stale quote responses are not errors at all;
//! they are a silent [`crate::shipping::QuoteResult::Superseded`] outcome.

use thiserror::Error;

use crate::api::ApiError;
use crate::validate::ValidationFailure;

/// Errors surfaced by checkout engine operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Local validation failure; no network call was made and no cart or
    /// address state changed.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    /// The commerce service failed; state rolled back to the pre-call
    /// snapshot and the operation may be retried.
    #[error("commerce service error: {0}")]
    Service(ApiError),

    /// The customer session was rejected; the auth layer must take over
    /// and further checkout actions are blocked.
    #[error("session expired")]
    SessionExpired,

    /// The checkout session was torn down; the operation was refused.
    #[error("checkout session closed")]
    Closed,
}

impl From<ApiError> for CheckoutError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::SessionExpired => Self::SessionExpired,
            other => Self::Service(other),
        }
    }
}

impl CheckoutError {
    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Service(err) => err.is_transient(),
            Self::Validation(_) | Self::SessionExpired | Self::Closed => false,
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, CheckoutError>;
