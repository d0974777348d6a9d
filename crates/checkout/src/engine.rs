//! The checkout engine façade.
//!
//! [`CheckoutEngine`] composes the cart session, address selection,
//! shipping quotes, the promotion ledger, billing synthesis, validation,
//! and submission around one explicit [`CustomerContext`]. It is a `Clone`
//! handle over shared state: mutable state sits behind a mutex that is
//! never held across an await, and logically concurrent intents (a
//! double-clicked apply, two overlapping quotes) are resolved by per-op
//! flags and quote tokens rather than by luck of scheduling.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::instrument;
use verdon_core::AddressId;

use crate::address::{self, AddressBook, AddressKey, AddressSelection};
use crate::api::{
    Address, ApiError, CheckoutRequest, CommerceApi, CustomerProfile, CustomerType, Destination,
    PaymentMethod, ShippingOption,
};
use crate::billing::{self, BillingForm};
use crate::country::country_code;
use crate::error::{CheckoutError, Result};
use crate::promotion::{LedgerOutcome, OpFlag, PromotionLedger};
use crate::session::CartSession;
use crate::shipping::{QuoteResult, ShippingRateFetcher, ShippingState};
use crate::submit::{SubmitOutcome, SubmitPhase, terminal_phase};
use crate::validate::{CheckoutReview, ValidationFailure, ValidationReason, validate};

/// The customer this checkout session belongs to.
///
/// Created at checkout entry and torn down at exit or logout; replaces the
/// ambient global session state of older designs with an explicit value.
#[derive(Debug, Clone)]
pub struct CustomerContext {
    /// The customer profile, saved addresses embedded.
    pub profile: CustomerProfile,
}

impl CustomerContext {
    /// Wrap a freshly fetched profile.
    #[must_use]
    pub const fn new(profile: CustomerProfile) -> Self {
        Self { profile }
    }
}

/// Whether a code apply/remove actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeApplication {
    /// The mutation ran and the cart was re-fetched.
    Applied,
    /// Ignored: same operation type in flight, or removal with no code
    /// applied.
    Ignored,
}

struct EngineState {
    profile: CustomerProfile,
    session: CartSession,
    selection: AddressSelection,
    draft: Address,
    shipping: ShippingState,
    use_same_address: bool,
    billing_type: CustomerType,
    billing_form: BillingForm,
    payment_method: Option<PaymentMethod>,
    note: Option<String>,
    phase: SubmitPhase,
    last_validation: Option<ValidationFailure>,
    closed: bool,
}

struct EngineInner {
    state: Mutex<EngineState>,
    quotes: ShippingRateFetcher,
    ledger: PromotionLedger,
    submitting: OpFlag,
}

/// Orchestrator for one checkout session.
#[derive(Clone)]
pub struct CheckoutEngine<C> {
    api: C,
    inner: Arc<EngineInner>,
}

impl<C: CommerceApi> CheckoutEngine<C> {
    /// Create an engine for a customer.
    ///
    /// Selection starts on the default-flagged address, else the first
    /// saved address, else the pre-filled new-address draft.
    #[must_use]
    pub fn new(api: C, ctx: CustomerContext) -> Self {
        let CustomerContext { profile } = ctx;
        let selection = AddressBook::new(&profile.addresses).initial_selection();
        let draft = address::draft_for(&profile);

        Self {
            api,
            inner: Arc::new(EngineInner {
                state: Mutex::new(EngineState {
                    profile,
                    session: CartSession::new(),
                    selection,
                    draft,
                    shipping: ShippingState::default(),
                    use_same_address: true,
                    billing_type: CustomerType::Client,
                    billing_form: BillingForm::default(),
                    payment_method: None,
                    note: None,
                    phase: SubmitPhase::Idle,
                    last_validation: None,
                    closed: false,
                }),
                quotes: ShippingRateFetcher::new(),
                ledger: PromotionLedger::new(),
                submitting: OpFlag::default(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state().closed {
            return Err(CheckoutError::Closed);
        }
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Enter checkout: load the cart snapshot and quote shipping for the
    /// initial address selection.
    ///
    /// # Errors
    ///
    /// Propagates cart-fetch failures; a shipping-quote failure is also
    /// surfaced but leaves checkout possible with zero shipping.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        self.ensure_open()?;
        let envelope = self.api.get_cart(None).await?;
        {
            let mut state = self.state();
            state.session.replace(envelope.cart);
        }
        self.refresh_shipping().await
    }

    /// Tear the session down: invalidate in-flight quote tokens and refuse
    /// further operations.
    pub fn close(&self) {
        self.inner.quotes.invalidate();
        let mut state = self.state();
        state.closed = true;
        state.session.consume();
    }

    // =========================================================================
    // Address Selection
    // =========================================================================

    /// Change the active shipping address.
    ///
    /// Dependent state (validation errors, quoted options) is reset
    /// synchronously before the re-quote fires, so no stale totals are
    /// observable in between.
    ///
    /// # Errors
    ///
    /// Propagates shipping-quote failures for the new destination.
    #[instrument(skip(self), fields(identifier = %identifier))]
    pub async fn select_address(&self, identifier: &str) -> Result<()> {
        self.ensure_open()?;
        {
            let mut state = self.state();
            let selection = {
                let book = AddressBook::new(&state.profile.addresses);
                book.resolve(identifier)
                    .and_then(AddressKey::for_address)
                    .map_or(AddressSelection::New, AddressSelection::Saved)
            };
            state.selection = selection;
            state.last_validation = None;
            state.shipping.clear();
        }
        self.refresh_shipping().await
    }

    /// Replace the new/edit address draft.
    pub fn update_draft(&self, draft: Address) {
        let mut state = self.state();
        state.draft = draft;
        state.last_validation = None;
    }

    /// Create a saved address through profile storage, adopt the updated
    /// profile, select the new address, and re-quote shipping.
    ///
    /// # Errors
    ///
    /// Propagates storage and quote failures.
    #[instrument(skip(self, address))]
    pub async fn add_address(&self, address: &Address) -> Result<()> {
        self.ensure_open()?;
        let profile = self.api.add_address(address).await?;
        {
            let mut state = self.state();
            let known: Vec<Option<AddressId>> =
                state.profile.addresses.iter().map(|a| a.id).collect();
            let created = profile
                .addresses
                .iter()
                .find(|a| !known.contains(&a.id))
                .and_then(AddressKey::for_address);
            if let Some(key) = created {
                state.selection = AddressSelection::Saved(key);
            }
            state.profile = profile;
            state.last_validation = None;
            state.shipping.clear();
        }
        self.refresh_shipping().await
    }

    /// Edit a saved address through profile storage, adopt the updated
    /// profile, and re-quote shipping.
    ///
    /// # Errors
    ///
    /// Propagates storage and quote failures.
    #[instrument(skip(self, patch), fields(address_id = %id))]
    pub async fn edit_address(&self, id: AddressId, patch: &Address) -> Result<()> {
        self.ensure_open()?;
        let profile = self.api.edit_address(id, patch).await?;
        {
            let mut state = self.state();
            state.profile = profile;
            state.last_validation = None;
            state.shipping.clear();
        }
        self.refresh_shipping().await
    }

    // =========================================================================
    // Shipping
    // =========================================================================

    /// Re-quote shipping for the currently resolved destination.
    ///
    /// No-op without a destination or with an empty cart. A superseded
    /// response is discarded silently; a failure clears the options and
    /// zeroes the shipping fee so checkout stays possible.
    ///
    /// # Errors
    ///
    /// Surfaces quote failures as retryable service errors.
    #[instrument(skip(self))]
    pub async fn refresh_shipping(&self) -> Result<()> {
        let destination = {
            let state = self.state();
            if state.closed {
                return Err(CheckoutError::Closed);
            }
            if !state.session.has_items() {
                return Ok(());
            }
            resolved_destination(&state)
        };
        let Some(destination) = destination else {
            return Ok(());
        };

        match self.inner.quotes.quote(&self.api, &destination).await {
            QuoteResult::Fresh(token, envelope) => {
                let mut state = self.state();
                // A newer quote may have completed between the fetcher's
                // currency check and this lock acquisition
                if state.closed || !self.inner.quotes.is_current(token) {
                    return Ok(());
                }
                state.session.replace(envelope.cart);
                state.shipping.apply(envelope.shipping_options);
                Ok(())
            }
            QuoteResult::Superseded => Ok(()),
            QuoteResult::Failed(ApiError::SessionExpired) => Err(CheckoutError::SessionExpired),
            QuoteResult::Failed(err) => {
                let mut state = self.state();
                state.shipping.clear();
                state.session.reset_shipping();
                Err(CheckoutError::Service(err))
            }
        }
    }

    /// Manually select one of the quoted shipping options by carrier id.
    ///
    /// Unknown carriers leave the default selection untouched.
    pub fn select_shipping_option(&self, carrier: &str) {
        let mut state = self.state();
        if let Some(option) = state
            .shipping
            .options
            .iter()
            .find(|option| option.carrier == carrier)
            .cloned()
        {
            state.shipping.selected = Some(option);
        }
    }

    // =========================================================================
    // Promotion / Gift Card
    // =========================================================================

    /// Apply a promotion code and adopt the re-fetched cart.
    ///
    /// # Errors
    ///
    /// Fails validation on an empty code; propagates API failures (cart
    /// keeps its last fetched value).
    #[instrument(skip(self, code))]
    pub async fn apply_promotion(&self, code: &str) -> Result<CodeApplication> {
        self.ensure_open()?;
        let destination = { resolved_destination(&self.state()) };
        let outcome = self
            .inner
            .ledger
            .apply_promotion(&self.api, code, destination.as_ref())
            .await?;
        Ok(self.adopt_ledger_outcome(outcome))
    }

    /// Remove the applied promotion code; no-op when none is applied.
    ///
    /// # Errors
    ///
    /// Propagates API failures.
    #[instrument(skip(self))]
    pub async fn remove_promotion(&self) -> Result<CodeApplication> {
        self.ensure_open()?;
        let (destination, has_code) = {
            let state = self.state();
            let has_code = state
                .session
                .cart()
                .is_some_and(|cart| cart.applied_promotion_code.is_some());
            (resolved_destination(&state), has_code)
        };
        let outcome = self
            .inner
            .ledger
            .remove_promotion(&self.api, has_code, destination.as_ref())
            .await?;
        Ok(self.adopt_ledger_outcome(outcome))
    }

    /// Apply a gift card code and adopt the re-fetched cart.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::apply_promotion`].
    #[instrument(skip(self, code))]
    pub async fn apply_gift_card(&self, code: &str) -> Result<CodeApplication> {
        self.ensure_open()?;
        let destination = { resolved_destination(&self.state()) };
        let outcome = self
            .inner
            .ledger
            .apply_gift_card(&self.api, code, destination.as_ref())
            .await?;
        Ok(self.adopt_ledger_outcome(outcome))
    }

    /// Remove the applied gift card code; no-op when none is applied.
    ///
    /// # Errors
    ///
    /// Propagates API failures.
    #[instrument(skip(self))]
    pub async fn remove_gift_card(&self) -> Result<CodeApplication> {
        self.ensure_open()?;
        let (destination, has_code) = {
            let state = self.state();
            let has_code = state
                .session
                .cart()
                .is_some_and(|cart| cart.applied_gift_card_code.is_some());
            (resolved_destination(&state), has_code)
        };
        let outcome = self
            .inner
            .ledger
            .remove_gift_card(&self.api, has_code, destination.as_ref())
            .await?;
        Ok(self.adopt_ledger_outcome(outcome))
    }

    fn adopt_ledger_outcome(&self, outcome: LedgerOutcome) -> CodeApplication {
        match outcome {
            LedgerOutcome::Applied(envelope) => {
                let mut state = self.state();
                state.session.replace(envelope.cart);
                CodeApplication::Applied
            }
            LedgerOutcome::Ignored => CodeApplication::Ignored,
        }
    }

    // =========================================================================
    // Billing / Payment Form
    // =========================================================================

    /// Select the payment method.
    pub fn set_payment_method(&self, method: PaymentMethod) {
        let mut state = self.state();
        state.payment_method = Some(method);
        state.last_validation = None;
    }

    /// Set or clear the order note.
    pub fn set_note(&self, note: Option<String>) {
        self.state().note = note;
    }

    /// Toggle whether billing reuses the shipping address.
    ///
    /// Toggling on resets the independent form's identity fields to the
    /// profile's values.
    pub fn set_use_same_address(&self, use_same_address: bool) {
        let mut state = self.state();
        if use_same_address && !state.use_same_address {
            let profile = state.profile.clone();
            billing::reset_form_identity(&mut state.billing_form, &profile);
        }
        state.use_same_address = use_same_address;
        state.last_validation = None;
    }

    /// Choose the billing party type for the independent form.
    pub fn set_billing_type(&self, billing_type: CustomerType) {
        self.state().billing_type = billing_type;
    }

    /// Replace the independent billing form.
    pub fn set_billing_form(&self, form: BillingForm) {
        let mut state = self.state();
        state.billing_form = form;
        state.last_validation = None;
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Validate and submit the checkout.
    ///
    /// Non-reentrant: a second call while one is in flight returns
    /// [`SubmitOutcome::Ignored`], as does any call after a terminal phase
    /// or without a loaded cart. Validation failures make no network call
    /// and network failures preserve all entered form state; both return
    /// the machine to idle.
    ///
    /// # Errors
    ///
    /// Returns the validation failure or the service error of the attempt.
    #[instrument(skip(self))]
    pub async fn submit(&self) -> Result<SubmitOutcome> {
        self.ensure_open()?;
        let Some(_guard) = self.inner.submitting.try_begin() else {
            return Ok(SubmitOutcome::Ignored);
        };

        let request = {
            let mut state = self.state();
            // A terminal phase already placed the order and consumed the
            // cart; a stray later call must not place a second one
            if state.phase.is_terminal() || state.session.cart().is_none() {
                return Ok(SubmitOutcome::Ignored);
            }
            state.phase = SubmitPhase::Validating;
            match build_request(&state) {
                Ok(request) => {
                    state.phase = SubmitPhase::Submitting;
                    state.last_validation = None;
                    request
                }
                Err(failure) => {
                    state.phase = SubmitPhase::Idle;
                    state.last_validation = Some(failure.clone());
                    return Err(CheckoutError::Validation(failure));
                }
            }
        };

        match self.api.submit_checkout(&request).await {
            Ok(confirmation) => {
                let phase = terminal_phase(request.payment_method, confirmation);
                let mut state = self.state();
                if matches!(phase, SubmitPhase::Confirmed { .. }) {
                    state.session.consume();
                }
                let outcome = phase.to_outcome().unwrap_or(SubmitOutcome::Ignored);
                state.phase = phase;
                Ok(outcome)
            }
            Err(err) => {
                self.state().phase = SubmitPhase::Idle;
                Err(err.into())
            }
        }
    }

    // =========================================================================
    // Read Accessors
    // =========================================================================

    /// The current cart snapshot, if loaded.
    #[must_use]
    pub fn cart(&self) -> Option<crate::api::Cart> {
        self.state().session.cart().cloned()
    }

    /// The shipping options quoted for the current destination.
    #[must_use]
    pub fn shipping_options(&self) -> Vec<ShippingOption> {
        self.state().shipping.options.clone()
    }

    /// The selected shipping option.
    #[must_use]
    pub fn selected_shipping(&self) -> Option<ShippingOption> {
        self.state().shipping.selected.clone()
    }

    /// The active address selection.
    #[must_use]
    pub fn selection(&self) -> AddressSelection {
        self.state().selection.clone()
    }

    /// The current submission phase.
    #[must_use]
    pub fn phase(&self) -> SubmitPhase {
        self.state().phase.clone()
    }

    /// The most recent validation failure, cleared on any relevant edit.
    #[must_use]
    pub fn last_validation(&self) -> Option<ValidationFailure> {
        self.state().last_validation.clone()
    }
}

/// The destination implied by the active selection: the selected saved
/// address, or the draft when it has a postal code.
fn resolved_destination(state: &EngineState) -> Option<Destination> {
    let book = AddressBook::new(&state.profile.addresses);
    let address = match &state.selection {
        AddressSelection::Saved(_) => book.selected(&state.selection),
        AddressSelection::New => Some(&state.draft),
    }?;
    if address.postal_code.trim().is_empty() {
        return None;
    }
    Some(Destination {
        country_code: country_code(&address.country).to_string(),
        postal_code: address.postal_code.trim().to_string(),
    })
}

/// Validate the state and assemble the immutable checkout request.
fn build_request(state: &EngineState) -> std::result::Result<CheckoutRequest, ValidationFailure> {
    let book = AddressBook::new(&state.profile.addresses);
    let shipping = match &state.selection {
        AddressSelection::Saved(_) => book.selected(&state.selection),
        AddressSelection::New => Some(&state.draft),
    };
    // A saved address may be label-keyed (no server id); only the draft is
    // brand-new for validation purposes
    let address_is_new = matches!(state.selection, AddressSelection::New);

    let review = CheckoutReview {
        payment_method: state.payment_method,
        shipping_address: shipping,
        address_is_new,
        customer_type: state.profile.customer_type,
        use_same_address: state.use_same_address,
        billing_type: state.billing_type,
        billing_form: &state.billing_form,
    };
    validate(&review)?;

    let Some(address) = shipping else {
        return Err(ValidationFailure::new(ValidationReason::AddressUnresolved));
    };
    let Some(payment_method) = state.payment_method else {
        return Err(ValidationFailure::new(
            ValidationReason::PaymentMethodMissing,
        ));
    };

    Ok(CheckoutRequest {
        customer_id: state.profile.id,
        shipping_address: billing::enrich_business_fields(address, &state.profile),
        billing_address: billing::synthesize(
            state.use_same_address,
            address,
            &state.billing_form,
            state.billing_type,
            &state.profile,
        ),
        payment_method,
        note: state.note.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdon_core::CustomerId;

    fn profile_with_address() -> CustomerProfile {
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
            addresses: vec![Address {
                id: Some(AddressId::new(1)),
                label: Some("Home".to_string()),
                first_name: "Ana".to_string(),
                last_name: "Blanc".to_string(),
                phone: "0600000000".to_string(),
                street: "12 rue des Lilas".to_string(),
                city: "Lyon".to_string(),
                postal_code: "69000".to_string(),
                country: "France".to_string(),
                is_default: true,
                ..Address::default()
            }],
        }
    }

    fn state_for(profile: CustomerProfile) -> EngineState {
        let selection = AddressBook::new(&profile.addresses).initial_selection();
        let draft = address::draft_for(&profile);
        EngineState {
            profile,
            session: CartSession::new(),
            selection,
            draft,
            shipping: ShippingState::default(),
            use_same_address: true,
            billing_type: CustomerType::Client,
            billing_form: BillingForm::default(),
            payment_method: Some(PaymentMethod::BankTransfer),
            note: None,
            phase: SubmitPhase::Idle,
            last_validation: None,
            closed: false,
        }
    }

    #[test]
    fn test_build_request_without_payment_method_makes_no_request() {
        let mut state = state_for(profile_with_address());
        state.payment_method = None;
        let failure = build_request(&state).unwrap_err();
        assert_eq!(failure.reason, ValidationReason::PaymentMethodMissing);
    }

    #[test]
    fn test_build_request_happy_path() {
        let state = state_for(profile_with_address());
        let request = build_request(&state).unwrap();
        assert_eq!(request.customer_id, CustomerId::new(7));
        assert_eq!(request.shipping_address.city, "Lyon");
        assert_eq!(request.billing_address.city, "Lyon");
        assert_eq!(request.payment_method, PaymentMethod::BankTransfer);
    }

    #[test]
    fn test_resolved_destination_normalizes_country() {
        let state = state_for(profile_with_address());
        let destination = resolved_destination(&state).unwrap();
        assert_eq!(destination.country_code, "fr");
        assert_eq!(destination.postal_code, "69000");
    }

    #[test]
    fn test_resolved_destination_requires_postal_code() {
        let mut profile = profile_with_address();
        profile.addresses = vec![];
        let state = state_for(profile);
        // Selection fell back to the draft, which has no postal code yet
        assert!(resolved_destination(&state).is_none());
    }

    #[test]
    fn test_draft_request_marks_address_new_for_business() {
        let mut profile = profile_with_address();
        profile.customer_type = CustomerType::Business;
        profile.addresses = vec![];
        let mut state = state_for(profile);
        state.draft.street = "3 rue Neuve".to_string();
        state.draft.city = "Lille".to_string();
        state.draft.postal_code = "59000".to_string();
        // Draft has no company, so the brand-new business address is rejected
        let failure = build_request(&state).unwrap_err();
        assert_eq!(failure.reason, ValidationReason::ShippingFieldsMissing);
        assert_eq!(failure.missing, vec!["company"]);
    }

    #[test]
    fn test_saved_label_keyed_address_is_not_treated_as_new() {
        // A saved address may have no server id and be keyed by its label;
        // the company relaxation for saved addresses still applies to it
        let mut profile = profile_with_address();
        profile.customer_type = CustomerType::Business;
        profile.business_name = Some("Acme".to_string());
        profile.addresses[0].id = None;
        let state = state_for(profile);
        assert_eq!(
            state.selection,
            AddressSelection::Saved(AddressKey::Label("Home".to_string()))
        );

        let request = build_request(&state).unwrap();
        assert_eq!(request.shipping_address.company.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_build_request_enriches_business_shipping_address() {
        let mut profile = profile_with_address();
        profile.customer_type = CustomerType::Business;
        profile.business_name = Some("Acme".to_string());
        profile.vat_number = Some("FR00123456789".to_string());
        let state = state_for(profile);
        let request = build_request(&state).unwrap();
        assert_eq!(request.shipping_address.company.as_deref(), Some("Acme"));
        assert_eq!(
            request.billing_address.vat_number.as_deref(),
            Some("FR00123456789")
        );
    }
}
