//! End-to-end checkout flows against an in-memory commerce API.
//!
//! The mock plays the role of the pricing service: it owns the cart
//! arithmetic, recomputes totals after every mutation, and quotes
//! destination-dependent shipping with configurable latency so the
//! stale-response scenarios are deterministic under paused time.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use verdon_checkout::address::AddressSelection;
use verdon_checkout::api::{
    Address, ApiError, Cart, CartEnvelope, CartItem, CheckoutConfirmation, CheckoutRequest,
    CommerceApi, CustomerProfile, CustomerType, Destination, PaymentMethod, ProductSnapshot,
    ShippingOption,
};
use verdon_checkout::engine::CodeApplication;
use verdon_checkout::submit::{SubmitOutcome, SubmitPhase};
use verdon_checkout::validate::ValidationReason;
use verdon_checkout::{CheckoutEngine, CheckoutError, CustomerContext};
use verdon_core::{AddressId, CustomerId, Money, OrderId};

// ─────────────────────────────────────────────────────────────────────────────
// Mock Commerce API
// ─────────────────────────────────────────────────────────────────────────────

/// Per-destination quote behaviour, keyed by postal code.
struct Rate {
    options: Vec<ShippingOption>,
    latency: Duration,
}

struct MockInner {
    cart: Mutex<Cart>,
    profile: Mutex<CustomerProfile>,
    rates: HashMap<String, Rate>,
    payment_link: Option<String>,
    fail_quotes: AtomicBool,
    quote_calls: AtomicU32,
    mutation_calls: AtomicU32,
    submit_calls: AtomicU32,
}

#[derive(Clone)]
struct MockApi {
    inner: Arc<MockInner>,
}

impl MockApi {
    fn new(cart: Cart, profile: CustomerProfile) -> Self {
        Self {
            inner: Arc::new(MockInner {
                cart: Mutex::new(cart),
                profile: Mutex::new(profile),
                rates: HashMap::new(),
                payment_link: None,
                fail_quotes: AtomicBool::new(false),
                quote_calls: AtomicU32::new(0),
                mutation_calls: AtomicU32::new(0),
                submit_calls: AtomicU32::new(0),
            }),
        }
    }

    fn with_rate(mut self, postal_code: &str, options: Vec<ShippingOption>, latency_ms: u64) -> Self {
        let inner = Arc::get_mut(&mut self.inner).unwrap();
        inner.rates.insert(
            postal_code.to_string(),
            Rate {
                options,
                latency: Duration::from_millis(latency_ms),
            },
        );
        self
    }

    fn with_payment_link(mut self, link: &str) -> Self {
        Arc::get_mut(&mut self.inner).unwrap().payment_link = Some(link.to_string());
        self
    }

    fn fail_quotes(&self, fail: bool) {
        self.inner.fail_quotes.store(fail, Ordering::SeqCst);
    }

    fn quote_calls(&self) -> u32 {
        self.inner.quote_calls.load(Ordering::SeqCst)
    }

    fn mutation_calls(&self) -> u32 {
        self.inner.mutation_calls.load(Ordering::SeqCst)
    }

    fn submit_calls(&self) -> u32 {
        self.inner.submit_calls.load(Ordering::SeqCst)
    }

    fn cart_snapshot(&self) -> Cart {
        self.inner.cart.lock().unwrap().clone()
    }
}

/// The server recomputes the grand total after every mutation.
fn settle(cart: &mut Cart) {
    cart.total = cart.computed_total();
}

impl CommerceApi for MockApi {
    async fn get_cart(&self, destination: Option<&Destination>) -> Result<CartEnvelope, ApiError> {
        let (latency, options) = match destination {
            Some(dest) => {
                self.inner.quote_calls.fetch_add(1, Ordering::SeqCst);
                let rate = self.inner.rates.get(&dest.postal_code);
                let latency = rate.map_or(Duration::ZERO, |r| r.latency);
                let options = rate.map(|r| r.options.clone()).unwrap_or_default();
                (latency, options)
            }
            None => (Duration::ZERO, Vec::new()),
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if destination.is_some() && self.inner.fail_quotes.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 503,
                message: "carrier backend unavailable".to_string(),
            });
        }

        let mut cart = self.inner.cart.lock().unwrap();
        if destination.is_some() {
            cart.shipping_fee = options
                .iter()
                .map(|option| option.cost)
                .min()
                .unwrap_or(Money::ZERO);
        }
        settle(&mut cart);
        Ok(CartEnvelope {
            cart: cart.clone(),
            shipping_options: options,
        })
    }

    async fn apply_promotion(&self, code: &str) -> Result<(), ApiError> {
        self.inner.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let mut cart = self.inner.cart.lock().unwrap();
        cart.applied_promotion_code = Some(code.to_string());
        cart.promotion_discount = Money::from_cents(10_00);
        settle(&mut cart);
        Ok(())
    }

    async fn remove_promotion(&self) -> Result<(), ApiError> {
        self.inner.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let mut cart = self.inner.cart.lock().unwrap();
        cart.applied_promotion_code = None;
        cart.promotion_discount = Money::ZERO;
        settle(&mut cart);
        Ok(())
    }

    async fn apply_gift_card(&self, code: &str) -> Result<(), ApiError> {
        self.inner.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let mut cart = self.inner.cart.lock().unwrap();
        cart.applied_gift_card_code = Some(code.to_string());
        cart.gift_card_discount = Money::from_cents(15_00);
        settle(&mut cart);
        Ok(())
    }

    async fn remove_gift_card(&self) -> Result<(), ApiError> {
        self.inner.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let mut cart = self.inner.cart.lock().unwrap();
        cart.applied_gift_card_code = None;
        cart.gift_card_discount = Money::ZERO;
        settle(&mut cart);
        Ok(())
    }

    async fn submit_checkout(
        &self,
        _request: &CheckoutRequest,
    ) -> Result<CheckoutConfirmation, ApiError> {
        self.inner.submit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(CheckoutConfirmation {
            payment_link: self.inner.payment_link.clone(),
            order_id: OrderId::new(4242),
            order_number: "VRD-2026-4242".to_string(),
        })
    }

    async fn add_address(&self, address: &Address) -> Result<CustomerProfile, ApiError> {
        let mut profile = self.inner.profile.lock().unwrap();
        let next_id = profile
            .addresses
            .iter()
            .filter_map(|a| a.id)
            .map(|id| id.as_i64())
            .max()
            .unwrap_or(0)
            + 1;
        let mut saved = address.clone();
        saved.id = Some(AddressId::new(next_id));
        profile.addresses.push(saved);
        Ok(profile.clone())
    }

    async fn edit_address(
        &self,
        id: AddressId,
        patch: &Address,
    ) -> Result<CustomerProfile, ApiError> {
        let mut profile = self.inner.profile.lock().unwrap();
        if let Some(slot) = profile.addresses.iter_mut().find(|a| a.id == Some(id)) {
            let mut updated = patch.clone();
            updated.id = Some(id);
            *slot = updated;
        }
        Ok(profile.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────────

fn money(cents: i64) -> Money {
    Money::from_cents(cents)
}

fn option(carrier: &str, cost_cents: i64) -> ShippingOption {
    ShippingOption {
        carrier: carrier.to_string(),
        label: carrier.to_string(),
        delay: "2-3 days".to_string(),
        cost: money(cost_cents),
    }
}

fn saved_address(id: i64, label: &str, postal_code: &str, is_default: bool) -> Address {
    Address {
        id: Some(AddressId::new(id)),
        label: Some(label.to_string()),
        first_name: "Ana".to_string(),
        last_name: "Blanc".to_string(),
        phone: "0600000000".to_string(),
        street: "12 rue des Lilas".to_string(),
        city: "Lyon".to_string(),
        postal_code: postal_code.to_string(),
        country: "France".to_string(),
        is_default,
        ..Address::default()
    }
}

fn profile(addresses: Vec<Address>) -> CustomerProfile {
    CustomerProfile {
        id: CustomerId::new(7),
        first_name: "Ana".to_string(),
        last_name: "Blanc".to_string(),
        phone: "0600000000".to_string(),
        customer_type: CustomerType::Client,
        business_name: None,
        registration_number: None,
        vat_number: None,
        fiscal_number: None,
        addresses,
    }
}

/// Subtotal 100.00, tax 20.00, one line.
fn seeded_cart() -> Cart {
    let mut cart = Cart {
        items: vec![CartItem {
            id: "line-1".to_string(),
            product: ProductSnapshot {
                id: "sku-77".to_string(),
                name: "Verdon field jacket".to_string(),
            },
            quantity: 2,
            unit_price: money(50_00),
            line_total: money(100_00),
        }],
        subtotal: money(100_00),
        tax: money(20_00),
        ..Cart::default()
    };
    settle(&mut cart);
    cart
}

fn engine_for(api: &MockApi) -> CheckoutEngine<MockApi> {
    let profile = api.inner.profile.lock().unwrap().clone();
    CheckoutEngine::new(api.clone(), CustomerContext::new(profile))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn saved_selection(id: i64) -> AddressSelection {
    AddressSelection::Saved(verdon_checkout::address::AddressKey::Id(AddressId::new(id)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_happy_path_bank_transfer_confirms_and_consumes_cart() {
    init_tracing();
    let api = MockApi::new(
        seeded_cart(),
        profile(vec![saved_address(1, "Home", "69000", true)]),
    )
    .with_rate("69000", vec![option("colissimo", 5_00)], 0);
    let engine = engine_for(&api);

    engine.start().await.unwrap();

    // 100 subtotal + 20 tax + 5 shipping
    let cart = engine.cart().unwrap();
    assert_eq!(cart.total, money(125_00));
    assert_eq!(
        engine.selected_shipping().map(|o| o.carrier),
        Some("colissimo".to_string())
    );

    engine.set_payment_method(PaymentMethod::BankTransfer);
    engine.set_note(Some("Leave at the gate".to_string()));
    let outcome = engine.submit().await.unwrap();

    assert_eq!(
        outcome,
        SubmitOutcome::Confirmed {
            order_id: OrderId::new(4242),
            order_number: "VRD-2026-4242".to_string(),
        }
    );
    assert!(engine.phase().is_terminal());
    // The cart is consumed on confirmation
    assert!(engine.cart().is_none());
    assert_eq!(api.submit_calls(), 1);
}

#[tokio::test]
async fn test_promotion_and_gift_card_stack_then_unwind() {
    init_tracing();
    let api = MockApi::new(
        seeded_cart(),
        profile(vec![saved_address(1, "Home", "69000", true)]),
    )
    .with_rate("69000", vec![option("colissimo", 5_00)], 0);
    let engine = engine_for(&api);
    engine.start().await.unwrap();

    let applied = engine.apply_promotion("SPRING10").await.unwrap();
    assert_eq!(applied, CodeApplication::Applied);
    let applied = engine.apply_gift_card("GC-15").await.unwrap();
    assert_eq!(applied, CodeApplication::Applied);

    // 125 - 10 promotion - 15 gift card
    let cart = engine.cart().unwrap();
    assert_eq!(cart.total, money(100_00));
    assert_eq!(cart.applied_promotion_code.as_deref(), Some("SPRING10"));

    let removed = engine.remove_promotion().await.unwrap();
    assert_eq!(removed, CodeApplication::Applied);
    assert_eq!(engine.cart().unwrap().total, money(110_00));
}

#[tokio::test]
async fn test_empty_code_is_rejected_without_network() {
    init_tracing();
    let api = MockApi::new(
        seeded_cart(),
        profile(vec![saved_address(1, "Home", "69000", true)]),
    )
    .with_rate("69000", vec![option("colissimo", 5_00)], 0);
    let engine = engine_for(&api);
    engine.start().await.unwrap();
    let before = api.mutation_calls();

    let err = engine.apply_promotion("   ").await.unwrap_err();
    assert!(matches!(err, CheckoutError::Validation(failure)
        if failure.reason == ValidationReason::EmptyCode));
    assert_eq!(api.mutation_calls(), before);
}

#[tokio::test]
async fn test_remove_without_applied_code_is_a_local_noop() {
    init_tracing();
    let api = MockApi::new(
        seeded_cart(),
        profile(vec![saved_address(1, "Home", "69000", true)]),
    )
    .with_rate("69000", vec![option("colissimo", 5_00)], 0);
    let engine = engine_for(&api);
    engine.start().await.unwrap();
    let before = api.mutation_calls();

    let outcome = engine.remove_gift_card().await.unwrap();
    assert_eq!(outcome, CodeApplication::Ignored);
    assert_eq!(api.mutation_calls(), before);
}

#[tokio::test]
async fn test_credit_card_submit_redirects_to_gateway() {
    init_tracing();
    let api = MockApi::new(
        seeded_cart(),
        profile(vec![saved_address(1, "Home", "69000", true)]),
    )
    .with_rate("69000", vec![option("colissimo", 5_00)], 0)
    .with_payment_link("https://pay.example/p/xyz");
    let engine = engine_for(&api);
    engine.start().await.unwrap();

    engine.set_payment_method(PaymentMethod::CreditCard);
    let outcome = engine.submit().await.unwrap();

    assert_eq!(
        outcome,
        SubmitOutcome::Redirect("https://pay.example/p/xyz".to_string())
    );
    assert_eq!(
        engine.phase(),
        SubmitPhase::Redirecting("https://pay.example/p/xyz".to_string())
    );
    // Redirecting is terminal but the order is not confirmed locally, so
    // the cart snapshot is kept until the gateway round-trip completes
    assert!(engine.cart().is_some());
}

#[tokio::test]
async fn test_submit_without_payment_method_makes_no_network_call() {
    init_tracing();
    let api = MockApi::new(
        seeded_cart(),
        profile(vec![saved_address(1, "Home", "69000", true)]),
    )
    .with_rate("69000", vec![option("colissimo", 5_00)], 0);
    let engine = engine_for(&api);
    engine.start().await.unwrap();

    let err = engine.submit().await.unwrap_err();
    assert!(matches!(err, CheckoutError::Validation(failure)
        if failure.reason == ValidationReason::PaymentMethodMissing));
    assert_eq!(api.submit_calls(), 0);
    assert_eq!(engine.phase(), SubmitPhase::Idle);
    assert!(engine.last_validation().is_some());

    // Fixing the form clears the failure and the retry goes through
    engine.set_payment_method(PaymentMethod::BankTransfer);
    assert!(engine.last_validation().is_none());
    engine.submit().await.unwrap();
    assert_eq!(api.submit_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_quote_for_old_address_cannot_overwrite_new_one() {
    init_tracing();
    let api = MockApi::new(
        seeded_cart(),
        profile(vec![
            saved_address(1, "Home", "75000", true),
            saved_address(2, "Office", "69000", false),
        ]),
    )
    .with_rate("75000", vec![option("colissimo", 9_90)], 500)
    .with_rate("69000", vec![option("chrono", 5_00)], 10);
    let engine = engine_for(&api);

    // Paused time fast-forwards through the slow initial quote
    engine.start().await.unwrap();
    assert_eq!(engine.cart().unwrap().shipping_fee, money(9_90));

    let slow = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.select_address("Home").await })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;
    let fast = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.select_address("Office").await })
    };

    fast.await.unwrap().unwrap();
    slow.await.unwrap().unwrap();

    // The older, slower quote resolved last but was superseded; the state
    // reflects the 69000 destination
    assert_eq!(engine.selection(), saved_selection(2));
    assert_eq!(
        engine.shipping_options(),
        vec![option("chrono", 5_00)]
    );
    assert_eq!(engine.cart().unwrap().shipping_fee, money(5_00));
    assert_eq!(engine.cart().unwrap().total, money(125_00));
    // One quote from start, one per address switch
    assert_eq!(api.quote_calls(), 3);
}

#[tokio::test]
async fn test_quote_failure_clears_options_and_zeroes_fee() {
    init_tracing();
    let api = MockApi::new(
        seeded_cart(),
        profile(vec![saved_address(1, "Home", "69000", true)]),
    )
    .with_rate("69000", vec![option("colissimo", 5_00)], 0);
    let engine = engine_for(&api);
    engine.start().await.unwrap();
    assert_eq!(engine.cart().unwrap().total, money(125_00));

    api.fail_quotes(true);
    let err = engine.refresh_shipping().await.unwrap_err();
    assert!(matches!(err, CheckoutError::Service(_)));
    assert!(err.is_retryable());

    // Checkout stays possible: options gone, fee zeroed, total recomputed
    assert!(engine.shipping_options().is_empty());
    let cart = engine.cart().unwrap();
    assert_eq!(cart.shipping_fee, Money::ZERO);
    assert_eq!(cart.total, money(120_00));
}

#[tokio::test]
async fn test_add_address_adopts_profile_and_requotes() {
    init_tracing();
    let api = MockApi::new(
        seeded_cart(),
        profile(vec![saved_address(1, "Home", "75000", true)]),
    )
    .with_rate("75000", vec![option("colissimo", 9_90)], 0)
    .with_rate("69000", vec![option("chrono", 5_00)], 0);
    let engine = engine_for(&api);
    engine.start().await.unwrap();
    assert_eq!(engine.cart().unwrap().shipping_fee, money(9_90));

    let mut new_address = saved_address(0, "Chalet", "69000", false);
    new_address.id = None;
    engine.add_address(&new_address).await.unwrap();

    // The created address (server id 2) is selected and quoted
    assert_eq!(engine.selection(), saved_selection(2));
    assert_eq!(engine.cart().unwrap().shipping_fee, money(5_00));
    assert_eq!(api.cart_snapshot().shipping_fee, money(5_00));
}

#[tokio::test]
async fn test_resubmit_after_confirmation_is_ignored() {
    init_tracing();
    let api = MockApi::new(
        seeded_cart(),
        profile(vec![saved_address(1, "Home", "69000", true)]),
    )
    .with_rate("69000", vec![option("colissimo", 5_00)], 0);
    let engine = engine_for(&api);
    engine.start().await.unwrap();
    engine.set_payment_method(PaymentMethod::BankTransfer);

    let first = engine.submit().await.unwrap();
    assert!(matches!(first, SubmitOutcome::Confirmed { .. }));

    // The cart was consumed; a stray later call must not place a second
    // order
    let second = engine.submit().await.unwrap();
    assert_eq!(second, SubmitOutcome::Ignored);
    assert!(engine.phase().is_terminal());
    assert_eq!(api.submit_calls(), 1);
}

#[tokio::test]
async fn test_closed_engine_refuses_operations() {
    init_tracing();
    let api = MockApi::new(
        seeded_cart(),
        profile(vec![saved_address(1, "Home", "69000", true)]),
    )
    .with_rate("69000", vec![option("colissimo", 5_00)], 0);
    let engine = engine_for(&api);
    engine.start().await.unwrap();

    engine.close();
    assert!(engine.cart().is_none());
    let err = engine.refresh_shipping().await.unwrap_err();
    assert!(matches!(err, CheckoutError::Closed));
    let err = engine.submit().await.unwrap_err();
    assert!(matches!(err, CheckoutError::Closed));
}
