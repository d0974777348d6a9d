//! Destination-priced shipping quotes with stale-response protection.
//!
//! Every quote attempt claims a monotonically increasing token. A
//! completion applies only while its token is still the newest one; a
//! response that lost the race is discarded silently. This replaces
//! implicit watcher ordering with an explicit, testable rule: the last
//! *issued* query wins, never the last *resolved* one.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::api::{ApiError, CartEnvelope, CommerceApi, Destination, ShippingOption};

/// Token identifying one quote attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteToken(u64);

/// Outcome of a quote attempt.
#[derive(Debug)]
pub enum QuoteResult {
    /// The quote was current when it completed; the envelope replaces cart
    /// and options. The token lets the caller re-check currency under its
    /// own state lock before applying.
    Fresh(QuoteToken, CartEnvelope),
    /// A newer quote was issued while this one was in flight; the result
    /// was discarded.
    Superseded,
    /// The quote failed while still current.
    Failed(ApiError),
}

/// Fetches shipping quotes and discards superseded completions.
#[derive(Debug, Default)]
pub struct ShippingRateFetcher {
    epoch: AtomicU64,
}

impl ShippingRateFetcher {
    /// Create a fetcher with no quotes issued.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            epoch: AtomicU64::new(0),
        }
    }

    /// Claim a token for a new quote attempt, superseding all earlier ones.
    pub fn claim(&self) -> QuoteToken {
        QuoteToken(self.epoch.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether a token still identifies the newest quote attempt.
    #[must_use]
    pub fn is_current(&self, token: QuoteToken) -> bool {
        self.epoch.load(Ordering::SeqCst) == token.0
    }

    /// Invalidate every outstanding token.
    ///
    /// Called on teardown so in-flight completion handlers cannot mutate
    /// now-dead state.
    pub fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Fetch a quote for a destination.
    ///
    /// The returned [`QuoteResult`] encodes a first stale check; a
    /// superseded response is reported as such even when the underlying
    /// call failed, because its failure belongs to a query nobody is
    /// waiting on anymore. A fresh result carries its token so the caller
    /// can re-check currency under its own state lock before applying.
    pub async fn quote<C: CommerceApi>(
        &self,
        api: &C,
        destination: &Destination,
    ) -> QuoteResult {
        let token = self.claim();
        let result = api.get_cart(Some(destination)).await;

        if !self.is_current(token) {
            tracing::debug!(
                country = %destination.country_code,
                postal_code = %destination.postal_code,
                "Discarding superseded shipping quote"
            );
            return QuoteResult::Superseded;
        }

        match result {
            Ok(envelope) => QuoteResult::Fresh(token, envelope),
            Err(e) => QuoteResult::Failed(e),
        }
    }
}

/// The shipping options and selection for the current destination.
#[derive(Debug, Default, Clone)]
pub struct ShippingState {
    /// Options quoted for the current destination.
    pub options: Vec<ShippingOption>,
    /// The selected option; defaults to the cheapest.
    pub selected: Option<ShippingOption>,
}

impl ShippingState {
    /// Install freshly quoted options and default-select the cheapest.
    pub fn apply(&mut self, options: Vec<ShippingOption>) {
        self.selected = default_option(&options).cloned();
        self.options = options;
    }

    /// Clear options and selection after a failed quote.
    pub fn clear(&mut self) {
        self.options.clear();
        self.selected = None;
    }
}

/// The default option: minimum cost, ties broken by first-seen order.
#[must_use]
pub fn default_option(options: &[ShippingOption]) -> Option<&ShippingOption> {
    options.iter().min_by_key(|option| option.cost)
}
