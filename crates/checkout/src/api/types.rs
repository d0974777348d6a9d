//! Wire types for the commerce API.
//!
//! These mirror the REST/JSON payloads of the catalog/pricing service and
//! the customer profile store. The server computes all cart arithmetic; the
//! types here carry helpers for checking (never correcting) that arithmetic.

use serde::{Deserialize, Serialize};
use verdon_core::{AddressId, CustomerId, Money, OrderId};

// ─────────────────────────────────────────────────────────────────────────────
// Cart Types
// ─────────────────────────────────────────────────────────────────────────────

/// Minimal product data carried on a cart line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Catalog identifier of the product.
    pub id: String,
    /// Display name at the time the line was added.
    pub name: String,
}

/// A single line in the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    /// Server-issued line identifier.
    pub id: String,
    /// Product data snapshotted when the line was created.
    pub product: ProductSnapshot,
    /// Quantity ordered.
    pub quantity: u32,
    /// Unit price.
    pub unit_price: Money,
    /// Line total as computed by the server.
    pub line_total: Money,
}

/// The authoritative cart snapshot.
///
/// All aggregate amounts are server-computed. The engine replaces this
/// wholesale after every mutation; it never patches individual discount
/// fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    /// Ordered cart lines.
    #[serde(default)]
    pub items: Vec<CartItem>,
    /// Sum of line totals.
    #[serde(default)]
    pub subtotal: Money,
    /// Tax amount.
    #[serde(default)]
    pub tax: Money,
    /// Shipping fee for the currently-quoted destination.
    #[serde(default)]
    pub shipping_fee: Money,
    /// Discount from an applied promotion code.
    #[serde(default)]
    pub promotion_discount: Money,
    /// Discount from an applied gift card.
    #[serde(default)]
    pub gift_card_discount: Money,
    /// Shipping-specific discount.
    #[serde(default)]
    pub shipping_discount: Money,
    /// Grand total as computed by the server.
    #[serde(default)]
    pub total: Money,
    /// Currently applied promotion code, if any.
    #[serde(default)]
    pub applied_promotion_code: Option<String>,
    /// Currently applied gift card code, if any.
    #[serde(default)]
    pub applied_gift_card_code: Option<String>,
}

impl Cart {
    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// The total the aggregate fields imply, floored at zero.
    ///
    /// `subtotal + shipping_fee + tax` minus all discounts. Discounts reduce
    /// the total but must not drive it negative.
    #[must_use]
    pub fn computed_total(&self) -> Money {
        let gross = self.subtotal + self.shipping_fee + self.tax;
        let discounts = self.promotion_discount + self.gift_card_discount + self.shipping_discount;
        gross.saturating_sub(discounts)
    }

    /// Whether the server-reported total matches the aggregate fields to
    /// two decimal places.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.total == self.computed_total()
    }
}

/// A cart fetch response: the snapshot, plus shipping options when the
/// request carried a destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartEnvelope {
    /// The cart snapshot.
    pub cart: Cart,
    /// Shipping options for the requested destination (empty when the fetch
    /// carried no destination).
    #[serde(default)]
    pub shipping_options: Vec<ShippingOption>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Shipping Types
// ─────────────────────────────────────────────────────────────────────────────

/// A carrier option quoted for a destination.
///
/// Never persisted; fetched fresh per destination query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOption {
    /// Carrier/service identifier.
    pub carrier: String,
    /// Human-readable label.
    pub label: String,
    /// Delivery delay as displayed to the customer (e.g., "2-3 days").
    pub delay: String,
    /// Cost of this option.
    pub cost: Money,
}

/// A quote destination: ISO country code plus postal code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Two-letter lowercase country code.
    pub country_code: String,
    /// Postal code.
    pub postal_code: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Customer Types
// ─────────────────────────────────────────────────────────────────────────────

/// Whether an account (or a billing form) is a private or a business party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    /// Private customer.
    #[default]
    Client,
    /// Business customer with company/registration fields.
    Business,
}

/// A saved customer address.
///
/// `id` is the server-issued key; `label` is a human-chosen name that acts
/// as a fallback key when no id exists, so labels must be unique per
/// customer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    /// Server-issued identifier, absent for drafts not yet saved.
    #[serde(default)]
    pub id: Option<AddressId>,
    /// Human-chosen display label ("Home", "Office").
    #[serde(default)]
    pub label: Option<String>,
    /// First name of the recipient.
    #[serde(default)]
    pub first_name: String,
    /// Last name of the recipient.
    #[serde(default)]
    pub last_name: String,
    /// Contact phone number.
    #[serde(default)]
    pub phone: String,
    /// Street address.
    #[serde(default)]
    pub street: String,
    /// City.
    #[serde(default)]
    pub city: String,
    /// Postal code.
    #[serde(default)]
    pub postal_code: String,
    /// Country display name (e.g., "France").
    #[serde(default)]
    pub country: String,
    /// Company name (business addresses).
    #[serde(default)]
    pub company: Option<String>,
    /// Company registration number.
    #[serde(default)]
    pub registration_number: Option<String>,
    /// VAT number.
    #[serde(default)]
    pub vat_number: Option<String>,
    /// Fiscal number.
    #[serde(default)]
    pub fiscal_number: Option<String>,
    /// Whether this is the customer's default address.
    #[serde(default)]
    pub is_default: bool,
}

/// The customer profile as served by profile storage, saved addresses
/// embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    /// Customer identifier.
    pub id: CustomerId,
    /// First name.
    #[serde(default)]
    pub first_name: String,
    /// Last name.
    #[serde(default)]
    pub last_name: String,
    /// Contact phone number.
    #[serde(default)]
    pub phone: String,
    /// Private or business account.
    #[serde(default)]
    pub customer_type: CustomerType,
    /// Business name (business accounts).
    #[serde(default)]
    pub business_name: Option<String>,
    /// Company registration number (business accounts).
    #[serde(default)]
    pub registration_number: Option<String>,
    /// VAT number (business accounts).
    #[serde(default)]
    pub vat_number: Option<String>,
    /// Fiscal number (business accounts).
    #[serde(default)]
    pub fiscal_number: Option<String>,
    /// Saved addresses, in server order.
    #[serde(default)]
    pub addresses: Vec<Address>,
}

impl CustomerProfile {
    /// The customer's full name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Checkout Types
// ─────────────────────────────────────────────────────────────────────────────

/// Selected payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card payment through the gateway (may redirect).
    CreditCard,
    /// Bank transfer, confirmed synchronously.
    BankTransfer,
    /// Payment by check, confirmed synchronously.
    Check,
}

/// The billing identity carried on a checkout request.
///
/// Either an enriched copy of the shipping address or an independently
/// entered form; exactly one of the two is active at submission time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingProfile {
    /// Private or business billing party.
    pub billing_type: CustomerType,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Contact phone number.
    pub phone: String,
    /// Street address.
    pub street: String,
    /// City.
    pub city: String,
    /// Postal code.
    pub postal_code: String,
    /// Country display name.
    pub country: String,
    /// Company name (business billing).
    #[serde(default)]
    pub company: Option<String>,
    /// Company registration number (business billing).
    #[serde(default)]
    pub registration_number: Option<String>,
    /// VAT number (business billing).
    #[serde(default)]
    pub vat_number: Option<String>,
    /// Fiscal number (business billing).
    #[serde(default)]
    pub fiscal_number: Option<String>,
}

/// The final checkout submission. Built once, immutable, submitted exactly
/// once per attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Customer placing the order.
    pub customer_id: CustomerId,
    /// Fully resolved, business-enriched shipping address.
    pub shipping_address: Address,
    /// Billing identity per the active billing path.
    pub billing_address: BillingProfile,
    /// Selected payment method.
    pub payment_method: PaymentMethod,
    /// Optional order note.
    #[serde(default)]
    pub note: Option<String>,
}

/// The payment instruction returned by a successful checkout call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfirmation {
    /// Gateway URL to redirect to, present for card payments.
    #[serde(default)]
    pub payment_link: Option<String>,
    /// Identifier of the created order.
    pub order_id: OrderId,
    /// Human-readable order number.
    pub order_number: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart_with_totals() -> Cart {
        Cart {
            subtotal: Money::from_cents(10_000),
            tax: Money::from_cents(2_000),
            shipping_fee: Money::from_cents(500),
            promotion_discount: Money::from_cents(1_000),
            gift_card_discount: Money::from_cents(1_500),
            shipping_discount: Money::ZERO,
            total: Money::from_cents(10_000),
            ..Cart::default()
        }
    }

    #[test]
    fn test_computed_total_subtracts_all_discounts() {
        let cart = cart_with_totals();
        assert_eq!(cart.computed_total(), Money::from_cents(10_000));
        assert!(cart.is_consistent());
    }

    #[test]
    fn test_computed_total_floors_at_zero() {
        let mut cart = cart_with_totals();
        cart.gift_card_discount = Money::from_cents(100_000);
        assert_eq!(cart.computed_total(), Money::ZERO);
    }

    #[test]
    fn test_inconsistent_server_total_detected() {
        let mut cart = cart_with_totals();
        cart.total = Money::from_cents(9_999);
        assert!(!cart.is_consistent());
    }

    #[test]
    fn test_payment_method_serde_names() {
        let json = serde_json::to_string(&PaymentMethod::CreditCard).unwrap();
        assert_eq!(json, "\"credit_card\"");
        let json = serde_json::to_string(&PaymentMethod::BankTransfer).unwrap();
        assert_eq!(json, "\"bank_transfer\"");
    }

    #[test]
    fn test_customer_type_defaults_to_client() {
        let profile: CustomerProfile =
            serde_json::from_str(r#"{"id": 1, "first_name": "Ana", "last_name": "Blanc"}"#)
                .unwrap();
        assert_eq!(profile.customer_type, CustomerType::Client);
        assert_eq!(profile.full_name(), "Ana Blanc");
    }
}
