//! Payment processor port.
//!
//! The settlement engine never talks to the processor's HTTP API
//! directly — it consumes these five operations as opaque calls and only
//! decides which to invoke, with what amounts, in what order. The
//! platform's processor integration crate provides the production
//! implementation; tests use a scriptable mock.

use serde::{Deserialize, Serialize};

use crate::domain::Cents;

/// Result of capturing a held authorization.
///
/// `transfer_amount_cents` is the instructor-bound portion of the capture
/// (net of platform commission) as reported by the processor. Reversals
/// operate on this value, never on `amount_received_cents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOutcome {
    /// The transfer created alongside the capture.
    pub transfer_id: String,
    /// Total amount received by the platform.
    pub amount_received_cents: Cents,
    /// Instructor-bound portion of the capture.
    pub transfer_amount_cents: Cents,
}

/// Handle for a transfer created by [`PaymentProcessor::create_manual_transfer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferHandle {
    /// The new transfer's id.
    pub transfer_id: String,
}

/// Result of a refund call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundOutcome {
    /// The refund's id.
    pub refund_id: String,
    /// Amount returned to the card.
    pub amount_cents: Cents,
}

/// Failure reported by the processor for any of the five operations.
///
/// The settlement executor does not retry internally; it parks the
/// booking in a retryable payment status and surfaces the error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProcessorError {
    /// The processor declined the operation (e.g. card declined at
    /// capture time).
    #[error("processor declined: {code}: {message}")]
    Declined {
        /// Processor decline code.
        code: String,
        /// Human-readable decline message.
        message: String,
    },

    /// The processor rejected the operation as invalid for the object's
    /// current state (e.g. capturing an already-captured intent).
    #[error("invalid processor state: {0}")]
    InvalidState(String),

    /// Transport-level or processor-side outage.
    #[error("processor unavailable: {0}")]
    Unavailable(String),
}

/// The five processor operations the settlement engine drives.
///
/// All amounts are integer cents. Each call is at-most-once per
/// settlement invocation; re-running a settlement re-reads payment state
/// first, so a capture that already succeeded is never repeated.
pub trait PaymentProcessor: Send + Sync {
    /// Converts a held authorization into a charge.
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessorError`] when the capture is declined or the
    /// intent is not capturable.
    fn capture_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> impl Future<Output = Result<CaptureOutcome, ProcessorError>> + Send;

    /// Pulls back a previously created transfer, in part or in full.
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessorError`] when the transfer cannot be reversed.
    fn reverse_transfer(
        &self,
        transfer_id: &str,
        amount_cents: Cents,
    ) -> impl Future<Output = Result<(), ProcessorError>> + Send;

    /// Refunds a captured payment back to the card. `amount_cents = None`
    /// refunds in full.
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessorError`] when the refund is rejected.
    fn refund_payment(
        &self,
        payment_intent_id: &str,
        reverse_transfer: bool,
        refund_application_fee: bool,
        amount_cents: Option<Cents>,
    ) -> impl Future<Output = Result<RefundOutcome, ProcessorError>> + Send;

    /// Releases a held authorization without charging.
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessorError`] when the intent is not cancellable.
    fn cancel_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> impl Future<Output = Result<(), ProcessorError>> + Send;

    /// Moves captured funds from the platform account to a connected
    /// instructor account.
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessorError`] when the transfer is rejected.
    fn create_manual_transfer(
        &self,
        destination_account_id: &str,
        amount_cents: Cents,
    ) -> impl Future<Output = Result<TransferHandle, ProcessorError>> + Send;
}

/// Which processor operation a settlement step was executing. Drives the
/// parking status on failure: a failed capture is retryable by the
/// student fixing their payment method, everything later needs review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorOp {
    /// [`PaymentProcessor::capture_payment_intent`].
    Capture,
    /// [`PaymentProcessor::reverse_transfer`].
    ReverseTransfer,
    /// [`PaymentProcessor::refund_payment`].
    Refund,
    /// [`PaymentProcessor::cancel_payment_intent`].
    CancelAuthorization,
    /// [`PaymentProcessor::create_manual_transfer`].
    ManualTransfer,
}

impl ProcessorOp {
    /// Returns the stable tag for this operation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::ReverseTransfer => "reverse_transfer",
            Self::Refund => "refund",
            Self::CancelAuthorization => "cancel_authorization",
            Self::ManualTransfer => "manual_transfer",
        }
    }
}
