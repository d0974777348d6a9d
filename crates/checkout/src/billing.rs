//! Billing synthesis.
//!
//! The billing identity on a checkout request comes from exactly one of two
//! paths: an enriched copy of the shipping address, or an independently
//! entered form. Enrichment is best-effort - business fields fall back from
//! the address to the profile, and for the company name alone down to the
//! customer's own name - and is deliberately not validated on the
//! same-address path.

use serde::{Deserialize, Serialize};

use crate::api::{Address, BillingProfile, CustomerProfile, CustomerType};

/// The independently entered billing form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingForm {
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
    pub company: Option<String>,
    /// Company registration number.
    pub registration_number: Option<String>,
    /// VAT number.
    pub vat_number: Option<String>,
    /// Fiscal number.
    pub fiscal_number: Option<String>,
}

/// Derive the billing profile for the final checkout request.
///
/// With `use_same_address` the shipping address is copied and, for business
/// customers, enriched through the fallback chain; the tag follows the
/// customer's account type. Without it, the form is taken verbatim and
/// tagged with the user-chosen `billing_type`, independent of the account
/// type.
#[must_use]
pub fn synthesize(
    use_same_address: bool,
    shipping: &Address,
    form: &BillingForm,
    billing_type: CustomerType,
    profile: &CustomerProfile,
) -> BillingProfile {
    if use_same_address {
        let enriched = enrich_business_fields(shipping, profile);
        BillingProfile {
            billing_type: profile.customer_type,
            first_name: enriched.first_name,
            last_name: enriched.last_name,
            phone: enriched.phone,
            street: enriched.street,
            city: enriched.city,
            postal_code: enriched.postal_code,
            country: enriched.country,
            company: enriched.company,
            registration_number: enriched.registration_number,
            vat_number: enriched.vat_number,
            fiscal_number: enriched.fiscal_number,
        }
    } else {
        BillingProfile {
            billing_type,
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            phone: form.phone.clone(),
            street: form.street.clone(),
            city: form.city.clone(),
            postal_code: form.postal_code.clone(),
            country: form.country.clone(),
            company: form.company.clone(),
            registration_number: form.registration_number.clone(),
            vat_number: form.vat_number.clone(),
            fiscal_number: form.fiscal_number.clone(),
        }
    }
}

/// Overlay business fields on an address copy for a business customer.
///
/// Fallback chain per field: the address's own value, else the profile's.
/// The company name alone has a final fallback to `"{first} {last}"` so a
/// business order never ships without one. Client accounts get the address
/// back unchanged, business fields stripped.
#[must_use]
pub fn enrich_business_fields(address: &Address, profile: &CustomerProfile) -> Address {
    let mut enriched = address.clone();

    if profile.customer_type == CustomerType::Business {
        enriched.company = first_filled(address.company.as_deref(), profile.business_name.as_deref())
            .or_else(|| Some(profile.full_name()));
        enriched.registration_number = first_filled(
            address.registration_number.as_deref(),
            profile.registration_number.as_deref(),
        );
        enriched.vat_number =
            first_filled(address.vat_number.as_deref(), profile.vat_number.as_deref());
        enriched.fiscal_number = first_filled(
            address.fiscal_number.as_deref(),
            profile.fiscal_number.as_deref(),
        );
    } else {
        enriched.company = None;
        enriched.registration_number = None;
        enriched.vat_number = None;
        enriched.fiscal_number = None;
    }

    enriched
}

/// Reset the form's identity fields to the profile's values.
///
/// Applied when the same-address toggle turns on, as a convenience so the
/// form is sensible if the user toggles back off.
pub fn reset_form_identity(form: &mut BillingForm, profile: &CustomerProfile) {
    form.first_name = profile.first_name.clone();
    form.last_name = profile.last_name.clone();
    form.phone = profile.phone.clone();
}

fn first_filled(primary: Option<&str>, fallback: Option<&str>) -> Option<String> {
    for candidate in [primary, fallback] {
        if let Some(value) = candidate
            && !value.trim().is_empty()
        {
            return Some(value.to_string());
        }
    }
    None
}
