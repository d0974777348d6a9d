//! Pre-submission validation.
//!
//! Rules run in order and short-circuit: payment method, resolvable
//! shipping address, required shipping fields, then the independent billing
//! form when one is active. No network calls are made here and no state is
//! mutated; the caller decides how to surface a failure.

use thiserror::Error;

use crate::api::{Address, CustomerType, PaymentMethod};
use crate::billing::BillingForm;

/// Why validation rejected the checkout, in rule order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    /// No payment method selected.
    PaymentMethodMissing,
    /// Neither a saved address nor a draft under edit could be resolved.
    AddressUnresolved,
    /// The shipping address is missing required fields.
    ShippingFieldsMissing,
    /// The independent billing form is missing required fields.
    BillingFieldsMissing,
    /// A promotion/gift-card code was empty after trimming.
    EmptyCode,
}

/// A local validation failure: surfaced immediately, never retried
/// automatically, and no network call was made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.describe())]
pub struct ValidationFailure {
    /// Which rule rejected the checkout.
    pub reason: ValidationReason,
    /// Names of the missing fields, when the rule is field-based.
    pub missing: Vec<&'static str>,
}

impl ValidationFailure {
    /// A failure with no field detail.
    #[must_use]
    pub const fn new(reason: ValidationReason) -> Self {
        Self {
            reason,
            missing: Vec::new(),
        }
    }

    /// A field-based failure.
    #[must_use]
    pub const fn with_missing(reason: ValidationReason, missing: Vec<&'static str>) -> Self {
        Self { reason, missing }
    }

    fn describe(&self) -> String {
        let message = match self.reason {
            ValidationReason::PaymentMethodMissing => "no payment method selected",
            ValidationReason::AddressUnresolved => "no shipping address could be resolved",
            ValidationReason::ShippingFieldsMissing => "shipping address is incomplete",
            ValidationReason::BillingFieldsMissing => "billing form is incomplete",
            ValidationReason::EmptyCode => "code is empty",
        };
        if self.missing.is_empty() {
            message.to_string()
        } else {
            format!("{message}: missing {}", self.missing.join(", "))
        }
    }
}

/// Everything the validator needs to gate a submission.
#[derive(Debug)]
pub struct CheckoutReview<'a> {
    /// Selected payment method, if any.
    pub payment_method: Option<PaymentMethod>,
    /// The resolved shipping address: the selected saved address, or the
    /// draft when "new"/editing.
    pub shipping_address: Option<&'a Address>,
    /// Whether the address being validated is a brand-new draft rather
    /// than an already-saved address.
    pub address_is_new: bool,
    /// The customer's account type.
    pub customer_type: CustomerType,
    /// Whether billing reuses the shipping address.
    pub use_same_address: bool,
    /// Billing party type chosen on the independent form.
    pub billing_type: CustomerType,
    /// The independent billing form.
    pub billing_form: &'a BillingForm,
}

/// Validate a checkout ahead of submission.
///
/// # Errors
///
/// Returns the first failed rule with the fields it found missing.
pub fn validate(review: &CheckoutReview<'_>) -> Result<(), ValidationFailure> {
    if review.payment_method.is_none() {
        return Err(ValidationFailure::new(
            ValidationReason::PaymentMethodMissing,
        ));
    }

    let Some(address) = review.shipping_address else {
        return Err(ValidationFailure::new(ValidationReason::AddressUnresolved));
    };

    let mut missing = missing_base_fields(
        &address.first_name,
        &address.last_name,
        &address.street,
        &address.city,
        &address.postal_code,
        &address.phone,
    );
    // Company is required only for business customers on a brand-new
    // address; already-saved addresses without one must not block checkout.
    if review.customer_type == CustomerType::Business
        && review.address_is_new
        && is_blank(address.company.as_deref().unwrap_or_default())
    {
        missing.push("company");
    }
    if !missing.is_empty() {
        return Err(ValidationFailure::with_missing(
            ValidationReason::ShippingFieldsMissing,
            missing,
        ));
    }

    if !review.use_same_address {
        let form = review.billing_form;
        let mut missing = missing_base_fields(
            &form.first_name,
            &form.last_name,
            &form.street,
            &form.city,
            &form.postal_code,
            &form.phone,
        );
        if review.billing_type == CustomerType::Business
            && is_blank(form.company.as_deref().unwrap_or_default())
        {
            missing.push("company");
        }
        if !missing.is_empty() {
            return Err(ValidationFailure::with_missing(
                ValidationReason::BillingFieldsMissing,
                missing,
            ));
        }
    }

    Ok(())
}

fn missing_base_fields(
    first_name: &str,
    last_name: &str,
    street: &str,
    city: &str,
    postal_code: &str,
    phone: &str,
) -> Vec<&'static str> {
    let fields = [
        ("first_name", first_name),
        ("last_name", last_name),
        ("street", street),
        ("city", city),
        ("postal_code", postal_code),
        ("phone", phone),
    ];
    fields
        .into_iter()
        .filter(|(_, value)| is_blank(value))
        .map(|(name, _)| name)
        .collect()
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
