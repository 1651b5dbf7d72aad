//! Payment state reader.
//!
//! Read-only view over a booking's payment standing: whether funds are
//! merely held or already captured, which payment intent is in play, and
//! where instructor-bound money goes. Never mutates anything.

use crate::domain::booking::{Booking, PaymentStatus};
use crate::domain::AccountsDirectory;
use crate::error::SettlementError;

/// Snapshot of a booking's payment standing used to decide which
/// processor operations are valid.
#[derive(Debug, Clone)]
pub struct PaymentState {
    /// Current payment status.
    pub payment_status: PaymentStatus,
    /// The processor payment intent, when one exists.
    pub payment_intent_id: Option<String>,
    /// The instructor's connected payout account.
    pub connected_account_id: String,
}

impl PaymentState {
    /// `true` when funds are held but not captured.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.payment_status == PaymentStatus::Authorized
    }

    /// `true` when funds were captured.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.payment_status == PaymentStatus::Settled
    }

    /// Returns the payment intent id or the given error when none exists.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidPaymentState`] when no intent is
    /// on file.
    pub fn require_intent(&self) -> Result<&str, SettlementError> {
        self.payment_intent_id.as_deref().ok_or_else(|| {
            SettlementError::InvalidPaymentState("no payment intent on file".to_string())
        })
    }
}

/// Reads payment state for settlement. Stateless; owns nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentStateReader;

impl PaymentStateReader {
    /// Builds the payment state for a booking.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::AccountNotFound`] when the instructor
    /// has no connected payout account on file.
    pub async fn read(
        booking: &Booking,
        accounts: &AccountsDirectory,
    ) -> Result<PaymentState, SettlementError> {
        let connected = accounts
            .connected_account(booking.instructor_id)
            .await
            .ok_or(SettlementError::AccountNotFound(
                *booking.instructor_id.as_uuid(),
            ))?;

        Ok(PaymentState {
            payment_status: booking.payment_status,
            payment_intent_id: booking.payment_intent_id.clone(),
            connected_account_id: connected.account_id,
        })
    }
}
