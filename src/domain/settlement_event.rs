//! Audit events for processor actions and credit mutations.
//!
//! Every successful processor call and every credit mutation records a
//! [`SettlementEvent`]. Events are appended to the ledger journal,
//! broadcast on the [`super::EventBus`], and — when persistence is
//! enabled — inserted into the append-only `payment_events` table. They
//! are never mutated or deleted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::money::Cents;
use super::{BookingId, CreditId, UserId};

/// An append-only audit event tied to a booking.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SettlementEvent {
    /// A setup intent was created for a student with no stored customer
    /// payment profile.
    #[serde(rename = "setup_intent_created")]
    SetupIntentCreated {
        /// Booking being paid for.
        booking_id: BookingId,
        /// Student the setup intent belongs to.
        student_id: UserId,
        /// Event instant.
        timestamp: DateTime<Utc>,
    },

    /// The booking was authorized immediately on payment-method attach.
    #[serde(rename = "auth_immediate")]
    AuthorizedImmediate {
        /// Booking being paid for.
        booking_id: BookingId,
        /// Processor payment-intent id holding the funds.
        payment_intent_id: String,
        /// Amount authorized.
        amount_cents: Cents,
        /// Event instant.
        timestamp: DateTime<Utc>,
    },

    /// Authorization was deferred because the lesson is beyond the
    /// card-hold window.
    #[serde(rename = "auth_scheduled")]
    AuthorizationScheduled {
        /// Booking being paid for.
        booking_id: BookingId,
        /// Lesson start driving the schedule.
        lesson_start_utc: DateTime<Utc>,
        /// Event instant.
        timestamp: DateTime<Utc>,
    },

    /// A held authorization was voided during cancellation.
    #[serde(rename = "authorization_voided_cancel")]
    AuthorizationVoided {
        /// Booking being settled.
        booking_id: BookingId,
        /// Voided payment intent.
        payment_intent_id: String,
        /// Event instant.
        timestamp: DateTime<Utc>,
    },

    /// The authorization was captured as part of a late cancellation.
    #[serde(rename = "captured_last_minute_cancel")]
    PaymentCaptured {
        /// Booking being settled.
        booking_id: BookingId,
        /// Captured payment intent.
        payment_intent_id: String,
        /// Amount received by the platform.
        amount_received_cents: Cents,
        /// Instructor-bound portion reported by the processor.
        transfer_amount_cents: Cents,
        /// Event instant.
        timestamp: DateTime<Utc>,
    },

    /// The instructor-bound transfer was reversed in full.
    #[serde(rename = "transfer_reversed_last_minute_cancel")]
    TransferReversed {
        /// Booking being settled.
        booking_id: BookingId,
        /// Reversed transfer.
        transfer_id: String,
        /// Amount pulled back.
        amount_cents: Cents,
        /// Event instant.
        timestamp: DateTime<Utc>,
    },

    /// A manual payout transfer was created for the instructor.
    #[serde(rename = "payout_created_last_minute_cancel")]
    PayoutCreated {
        /// Booking being settled.
        booking_id: BookingId,
        /// New transfer id.
        transfer_id: String,
        /// Destination connected account.
        destination_account_id: String,
        /// Payout amount.
        amount_cents: Cents,
        /// Event instant.
        timestamp: DateTime<Utc>,
    },

    /// A lesson-price platform credit was issued during cancellation.
    #[serde(rename = "credit_created_last_minute_cancel")]
    CreditIssued {
        /// Booking the credit settles.
        booking_id: BookingId,
        /// Credit owner.
        user_id: UserId,
        /// New ledger entry.
        credit_id: CreditId,
        /// Credit amount.
        amount_cents: Cents,
        /// Credit reason tag.
        reason: String,
        /// Event instant.
        timestamp: DateTime<Utc>,
    },

    /// A full refund was issued after an instructor cancellation.
    #[serde(rename = "refund_issued_instructor_cancel")]
    RefundIssued {
        /// Booking being settled.
        booking_id: BookingId,
        /// Refunded payment intent.
        payment_intent_id: String,
        /// Amount returned to the card.
        amount_cents: Cents,
        /// Event instant.
        timestamp: DateTime<Utc>,
    },

    /// A milestone credit was issued for a completed-lesson threshold.
    #[serde(rename = "milestone_credit_created")]
    MilestoneCreditIssued {
        /// Booking that crossed the threshold.
        booking_id: BookingId,
        /// Credit owner.
        user_id: UserId,
        /// New ledger entry.
        credit_id: CreditId,
        /// Credit amount.
        amount_cents: Cents,
        /// Milestone reason tag.
        reason: String,
        /// Event instant.
        timestamp: DateTime<Utc>,
    },

    /// An unused credit was revoked after its triggering booking was
    /// invalidated.
    #[serde(rename = "credit_revoked")]
    CreditRevoked {
        /// Booking that originally produced the credit.
        source_booking_id: BookingId,
        /// Cents revoked across matching unused credits.
        amount_cents: Cents,
        /// Event instant.
        timestamp: DateTime<Utc>,
    },

    /// Credit consumed by a now-refunded booking was reinstated.
    #[serde(rename = "credit_reinstated")]
    CreditReinstated {
        /// The refunded booking whose spent credit is returned.
        refunded_booking_id: BookingId,
        /// Credit owner.
        user_id: UserId,
        /// Reinstated amount.
        amount_cents: Cents,
        /// Event instant.
        timestamp: DateTime<Utc>,
    },
}

impl SettlementEvent {
    /// Returns the booking this event belongs to.
    #[must_use]
    pub const fn booking_id(&self) -> BookingId {
        match self {
            Self::SetupIntentCreated { booking_id, .. }
            | Self::AuthorizedImmediate { booking_id, .. }
            | Self::AuthorizationScheduled { booking_id, .. }
            | Self::AuthorizationVoided { booking_id, .. }
            | Self::PaymentCaptured { booking_id, .. }
            | Self::TransferReversed { booking_id, .. }
            | Self::PayoutCreated { booking_id, .. }
            | Self::CreditIssued { booking_id, .. }
            | Self::RefundIssued { booking_id, .. }
            | Self::MilestoneCreditIssued { booking_id, .. } => *booking_id,
            Self::CreditRevoked {
                source_booking_id, ..
            } => *source_booking_id,
            Self::CreditReinstated {
                refunded_booking_id,
                ..
            } => *refunded_booking_id,
        }
    }

    /// Returns the audit tag for this event.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::SetupIntentCreated { .. } => "setup_intent_created",
            Self::AuthorizedImmediate { .. } => "auth_immediate",
            Self::AuthorizationScheduled { .. } => "auth_scheduled",
            Self::AuthorizationVoided { .. } => "authorization_voided_cancel",
            Self::PaymentCaptured { .. } => "captured_last_minute_cancel",
            Self::TransferReversed { .. } => "transfer_reversed_last_minute_cancel",
            Self::PayoutCreated { .. } => "payout_created_last_minute_cancel",
            Self::CreditIssued { .. } => "credit_created_last_minute_cancel",
            Self::RefundIssued { .. } => "refund_issued_instructor_cancel",
            Self::MilestoneCreditIssued { .. } => "milestone_credit_created",
            Self::CreditRevoked { .. } => "credit_revoked",
            Self::CreditReinstated { .. } => "credit_reinstated",
        }
    }
}
