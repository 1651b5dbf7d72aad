//! Settlement error types with stable code and retryability mapping.
//!
//! [`SettlementError`] is the central error type for the engine. Each
//! variant carries a stable numeric code for caller-side mapping, and
//! [`SettlementError::retryable`] tells the booking service whether
//! re-invoking the settlement after fixing the cause is expected to
//! succeed.

use crate::domain::BookingStatus;
use crate::processor::{ProcessorError, ProcessorOp};

/// Engine-side error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category                  |
/// |-----------|---------------------------|
/// | 1000–1999 | Validation                |
/// | 2000–2999 | Not found / state         |
/// | 3000–3999 | Persistence / internal    |
/// | 4000–4999 | Processor                 |
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// Booking with the given id was not found.
    #[error("booking not found: {0}")]
    BookingNotFound(uuid::Uuid),

    /// No connected payout account exists for the given user.
    #[error("connected account not found for user: {0}")]
    AccountNotFound(uuid::Uuid),

    /// Request validation failed (wrong party, malformed lesson window).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The booking is not in a cancellable status.
    #[error("booking is not cancellable in status {}", status.as_str())]
    NotCancellable {
        /// The booking's current status.
        status: BookingStatus,
    },

    /// The booking already carries a settlement outcome. Settling twice
    /// with a different policy must fail loudly instead of silently
    /// re-applying.
    #[error("booking already settled with outcome {outcome}")]
    AlreadySettled {
        /// The recorded outcome tag.
        outcome: &'static str,
    },

    /// The payment state does not permit the classified outcome (e.g. a
    /// capture-requiring branch with no authorization on file).
    #[error("payment state does not permit settlement: {0}")]
    InvalidPaymentState(String),

    /// A processor operation failed. The booking has been parked in a
    /// retryable payment status; re-invoking the settlement resumes from
    /// re-read state.
    #[error("processor {} failed: {source}", op.as_str())]
    Processor {
        /// Which operation failed.
        op: ProcessorOp,
        /// The processor's failure.
        #[source]
        source: ProcessorError,
    },

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal invariant breach.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SettlementError {
    /// Returns the stable numeric code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::NotCancellable { .. } => 1002,
            Self::BookingNotFound(_) => 2001,
            Self::AccountNotFound(_) => 2002,
            Self::AlreadySettled { .. } => 2003,
            Self::InvalidPaymentState(_) => 2004,
            Self::Persistence(_) => 3001,
            Self::Internal(_) => 3000,
            Self::Processor { op, .. } => match op {
                ProcessorOp::Capture => 4001,
                ProcessorOp::ReverseTransfer => 4002,
                ProcessorOp::Refund => 4003,
                ProcessorOp::CancelAuthorization => 4004,
                ProcessorOp::ManualTransfer => 4005,
            },
        }
    }

    /// Returns `true` when re-invoking the failed operation is expected
    /// to succeed once the underlying cause is fixed. Processor failures
    /// are retryable by design — each settlement invocation re-reads
    /// payment state — while validation and invariant errors are not.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        matches!(self, Self::Processor { .. } | Self::Persistence(_))
    }
}
