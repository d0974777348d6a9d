//! Saved-address resolution and checkout selection state.
//!
//! Addresses are addressed by either a server-issued id or a human-chosen
//! label; [`AddressKey`] keeps the two cases distinct so the lookup chain is
//! exhaustive. Selection state is transient - it belongs to the checkout
//! session and is never persisted.

use serde::{Deserialize, Serialize};
use verdon_core::AddressId;

use crate::api::{Address, CustomerProfile};

/// Identifier for inputs that select an address.
pub const NEW_ADDRESS_SENTINEL: &str = "new";

/// Stable identity of a saved address.
///
/// The label doubles as a fallback key for addresses that never got a
/// server id, so labels must be unique per customer; duplicates resolve
/// first-wins in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressKey {
    /// Server-issued id.
    Id(AddressId),
    /// Human-chosen display label.
    Label(String),
}

impl AddressKey {
    /// Derive the key of a saved address, preferring the server id.
    #[must_use]
    pub fn for_address(address: &Address) -> Option<Self> {
        if let Some(id) = address.id {
            return Some(Self::Id(id));
        }
        address.label.clone().map(Self::Label)
    }
}

/// Which address is active for the current checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressSelection {
    /// A saved address.
    Saved(AddressKey),
    /// The "new address" draft is active.
    New,
}

/// Read-only index over a customer's saved addresses.
pub struct AddressBook<'a> {
    addresses: &'a [Address],
}

impl<'a> AddressBook<'a> {
    /// Build a book over the profile's saved addresses.
    #[must_use]
    pub const fn new(addresses: &'a [Address]) -> Self {
        Self { addresses }
    }

    /// Whether the customer has no saved addresses.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Look up an address by its key.
    #[must_use]
    pub fn get(&self, key: &AddressKey) -> Option<&'a Address> {
        self.addresses.iter().find(|addr| match key {
            AddressKey::Id(id) => addr.id == Some(*id),
            AddressKey::Label(label) => addr.label.as_deref() == Some(label.as_str()),
        })
    }

    /// Resolve a raw identifier to a saved address.
    ///
    /// Accepts a server id, a label, or the sentinel `"new"`. A
    /// numeric-looking identifier first tries positional lookup, then
    /// id-or-label lookup. Any failed non-sentinel lookup falls back to the
    /// first saved address, so this returns `None` only for `"new"` or when
    /// the customer has no addresses at all.
    #[must_use]
    pub fn resolve(&self, identifier: &str) -> Option<&'a Address> {
        let identifier = identifier.trim();
        if identifier.eq_ignore_ascii_case(NEW_ADDRESS_SENTINEL) {
            return None;
        }

        if let Ok(numeric) = identifier.parse::<i64>() {
            let positional = usize::try_from(numeric)
                .ok()
                .and_then(|index| self.addresses.get(index));
            if let Some(address) = positional {
                return Some(address);
            }
            if let Some(address) = self.get(&AddressKey::Id(AddressId::new(numeric))) {
                return Some(address);
            }
        }

        self.get(&AddressKey::Label(identifier.to_string()))
            .or_else(|| self.addresses.first())
    }

    /// Resolve the current selection to a saved address.
    #[must_use]
    pub fn selected(&self, selection: &AddressSelection) -> Option<&'a Address> {
        match selection {
            AddressSelection::Saved(key) => self.get(key).or_else(|| self.addresses.first()),
            AddressSelection::New => None,
        }
    }

    /// Pick the initial selection for a fresh checkout: the default-flagged
    /// address, else the first address, else the new-address draft.
    #[must_use]
    pub fn initial_selection(&self) -> AddressSelection {
        self.addresses
            .iter()
            .find(|addr| addr.is_default)
            .or_else(|| self.addresses.first())
            .and_then(AddressKey::for_address)
            .map_or(AddressSelection::New, AddressSelection::Saved)
    }
}

/// Build a pre-filled draft for the add/edit address flow.
///
/// Name and phone are seeded from the profile; everything else starts
/// empty.
#[must_use]
pub fn draft_for(profile: &CustomerProfile) -> Address {
    Address {
        first_name: profile.first_name.clone(),
        last_name: profile.last_name.clone(),
        phone: profile.phone.clone(),
        country: "France".to_string(),
        ..Address::default()
    }
}
