//! Promotion and gift-card code application.
//!
//! Each operation is one mutation round trip followed by a mandatory
//! wholesale cart re-fetch - the server alone computes discount amounts.
//! Operations of the same kind are serialized through an in-flight flag
//! (a second apply while one runs is ignored, not queued); promotion and
//! gift-card operations are independent and may overlap.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::api::{CartEnvelope, CommerceApi, Destination};
use crate::error::CheckoutError;
use crate::validate::{ValidationFailure, ValidationReason};

/// One-at-a-time guard for a logical operation type.
#[derive(Debug, Default)]
pub struct OpFlag(AtomicBool);

impl OpFlag {
    /// Try to claim the flag; `None` while an operation is in flight.
    pub fn try_begin(&self) -> Option<OpGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| OpGuard(&self.0))
    }

    /// Whether an operation currently holds the flag.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Releases the owning [`OpFlag`] on drop, on both success and error paths.
#[derive(Debug)]
pub struct OpGuard<'a>(&'a AtomicBool);

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Outcome of a ledger operation.
#[derive(Debug)]
pub enum LedgerOutcome {
    /// The mutation ran; the envelope is the re-fetched authoritative cart.
    Applied(CartEnvelope),
    /// Nothing happened: either the same operation type was already in
    /// flight, or a removal found no code applied.
    Ignored,
}

/// Applies and removes promotion/gift-card codes against the active cart.
#[derive(Debug, Default)]
pub struct PromotionLedger {
    promotion: OpFlag,
    gift_card: OpFlag,
}

impl PromotionLedger {
    /// Create an idle ledger.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            promotion: OpFlag(AtomicBool::new(false)),
            gift_card: OpFlag(AtomicBool::new(false)),
        }
    }

    /// Apply a promotion code, then re-fetch the cart.
    ///
    /// # Errors
    ///
    /// Fails validation when the code is empty after trimming; otherwise
    /// propagates API failures (the cart stays at its last fetched value).
    pub async fn apply_promotion<C: CommerceApi>(
        &self,
        api: &C,
        code: &str,
        destination: Option<&Destination>,
    ) -> Result<LedgerOutcome, CheckoutError> {
        let code = non_empty_code(code)?;
        let Some(_guard) = self.promotion.try_begin() else {
            return Ok(LedgerOutcome::Ignored);
        };

        api.apply_promotion(code).await?;
        let envelope = api.get_cart(destination).await?;
        Ok(LedgerOutcome::Applied(envelope))
    }

    /// Remove the applied promotion code, then re-fetch the cart.
    ///
    /// Removing when nothing is applied is a no-op with no network call.
    ///
    /// # Errors
    ///
    /// Propagates API failures.
    pub async fn remove_promotion<C: CommerceApi>(
        &self,
        api: &C,
        has_applied_code: bool,
        destination: Option<&Destination>,
    ) -> Result<LedgerOutcome, CheckoutError> {
        if !has_applied_code {
            return Ok(LedgerOutcome::Ignored);
        }
        let Some(_guard) = self.promotion.try_begin() else {
            return Ok(LedgerOutcome::Ignored);
        };

        api.remove_promotion().await?;
        let envelope = api.get_cart(destination).await?;
        Ok(LedgerOutcome::Applied(envelope))
    }

    /// Apply a gift card code, then re-fetch the cart.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::apply_promotion`].
    pub async fn apply_gift_card<C: CommerceApi>(
        &self,
        api: &C,
        code: &str,
        destination: Option<&Destination>,
    ) -> Result<LedgerOutcome, CheckoutError> {
        let code = non_empty_code(code)?;
        let Some(_guard) = self.gift_card.try_begin() else {
            return Ok(LedgerOutcome::Ignored);
        };

        api.apply_gift_card(code).await?;
        let envelope = api.get_cart(destination).await?;
        Ok(LedgerOutcome::Applied(envelope))
    }

    /// Remove the applied gift card code, then re-fetch the cart.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::remove_promotion`].
    pub async fn remove_gift_card<C: CommerceApi>(
        &self,
        api: &C,
        has_applied_code: bool,
        destination: Option<&Destination>,
    ) -> Result<LedgerOutcome, CheckoutError> {
        if !has_applied_code {
            return Ok(LedgerOutcome::Ignored);
        }
        let Some(_guard) = self.gift_card.try_begin() else {
            return Ok(LedgerOutcome::Ignored);
        };

        api.remove_gift_card().await?;
        let envelope = api.get_cart(destination).await?;
        Ok(LedgerOutcome::Applied(envelope))
    }
}

/// Reject codes that are empty after trimming.
fn non_empty_code(code: &str) -> Result<&str, CheckoutError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(CheckoutError::Validation(ValidationFailure::new(
            ValidationReason::EmptyCode,
        )));
    }
    Ok(code)
}
