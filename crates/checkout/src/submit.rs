//! Submission phase machine.
//!
//! `Idle → Validating → Submitting → {Redirecting | Confirmed}`. Both
//! failure paths (validation, network) return the machine to `Idle` - with
//! all entered form state preserved so the user can retry - so neither is a
//! terminal phase; the error carried by the operation result is the record
//! of the failure.

use verdon_core::OrderId;

use crate::api::{CheckoutConfirmation, PaymentMethod};

/// Where the submission machine currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmitPhase {
    /// No submission in progress.
    #[default]
    Idle,
    /// Running local validation.
    Validating,
    /// Checkout request in flight.
    Submitting,
    /// Terminal: full-page navigation to the gateway URL.
    Redirecting(String),
    /// Terminal: order placed, cart consumed.
    Confirmed {
        /// Identifier of the created order.
        order_id: OrderId,
        /// Human-readable order number.
        order_number: String,
    },
}

impl SubmitPhase {
    /// Whether the machine has reached a terminal phase.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Redirecting(_) | Self::Confirmed { .. })
    }

    /// The submit outcome a terminal phase corresponds to, `None` for
    /// non-terminal phases.
    #[must_use]
    pub fn to_outcome(&self) -> Option<SubmitOutcome> {
        match self {
            Self::Redirecting(url) => Some(SubmitOutcome::Redirect(url.clone())),
            Self::Confirmed {
                order_id,
                order_number,
            } => Some(SubmitOutcome::Confirmed {
                order_id: *order_id,
                order_number: order_number.clone(),
            }),
            Self::Idle | Self::Validating | Self::Submitting => None,
        }
    }
}

/// What a submit attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Navigate to the payment gateway.
    Redirect(String),
    /// Order placed synchronously.
    Confirmed {
        /// Identifier of the created order.
        order_id: OrderId,
        /// Human-readable order number.
        order_number: String,
    },
    /// A submission was already in flight; this attempt was ignored.
    Ignored,
}

/// Map a successful checkout response to its terminal phase.
///
/// Credit card payments with a gateway link redirect; everything else is
/// confirmed synchronously.
#[must_use]
pub fn terminal_phase(
    payment_method: PaymentMethod,
    confirmation: CheckoutConfirmation,
) -> SubmitPhase {
    match (payment_method, confirmation.payment_link) {
        (PaymentMethod::CreditCard, Some(link)) => SubmitPhase::Redirecting(link),
        _ => SubmitPhase::Confirmed {
            order_id: confirmation.order_id,
            order_number: confirmation.order_number,
        },
    }
}
