//! The authoritative cart snapshot for one checkout session.
//!
//! The commerce platform owns cart arithmetic; this type only replaces the
//! snapshot wholesale and resets the shipping fields when a quote fails.
//! Partial/optimistic updates to discount fields are deliberately not
//! offered.

use crate::api::Cart;

/// Owner of the cart snapshot shared by every checkout component.
#[derive(Debug, Default)]
pub struct CartSession {
    cart: Option<Cart>,
}

impl CartSession {
    /// Create an unloaded session.
    #[must_use]
    pub const fn new() -> Self {
        Self { cart: None }
    }

    /// The current snapshot, if one has been loaded.
    #[must_use]
    pub const fn cart(&self) -> Option<&Cart> {
        self.cart.as_ref()
    }

    /// Whether the cart is loaded and has at least one line.
    #[must_use]
    pub fn has_items(&self) -> bool {
        self.cart.as_ref().is_some_and(|cart| !cart.is_empty())
    }

    /// Replace the snapshot wholesale with a freshly fetched cart.
    ///
    /// A server cart that fails the total invariant is still accepted (the
    /// server is the source of truth) but logged for investigation.
    pub fn replace(&mut self, cart: Cart) {
        if !cart.is_consistent() {
            tracing::warn!(
                total = %cart.total,
                computed = %cart.computed_total(),
                "Server cart total does not match its aggregate fields"
            );
        }
        self.cart = Some(cart);
    }

    /// Zero the shipping-dependent fields after a failed quote.
    ///
    /// Checkout must remain possible with zero shipping rather than
    /// blocking, so the local total is recomputed here - the single place
    /// the client recomputes anything. The next successful fetch replaces
    /// the snapshot wholesale.
    pub fn reset_shipping(&mut self) {
        if let Some(cart) = self.cart.as_mut() {
            cart.shipping_fee = verdon_core::Money::ZERO;
            cart.shipping_discount = verdon_core::Money::ZERO;
            cart.total = cart.computed_total();
        }
    }

    /// Drop the snapshot once checkout has succeeded.
    pub fn consume(&mut self) {
        self.cart = None;
    }
}
