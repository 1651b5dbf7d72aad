//! Booking aggregate: one scheduled lesson and its financial lifecycle.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::money::Cents;
use super::policy::PolicyOutcome;
use super::{BookingId, UserId};
use crate::error::SettlementError;

/// Lesson lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created, payment method not yet attached.
    Pending,
    /// Payment method attached and authorization arranged.
    Confirmed,
    /// Lesson delivered.
    Completed,
    /// Cancelled by either party.
    Cancelled,
    /// Student did not attend.
    NoShow,
}

impl BookingStatus {
    /// Returns the stable tag for this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
        }
    }

    /// Returns `true` for statuses a cancellation may act on.
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Returns `true` for terminal statuses.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }
}

/// Payment lifecycle status for a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No payment method on file yet.
    PendingPaymentMethod,
    /// Authorization deferred until closer to the lesson.
    Scheduled,
    /// Funds held on the card, not captured.
    Authorized,
    /// Funds captured.
    Settled,
    /// A capture attempt failed; the caller must fix the payment method
    /// and retry.
    PaymentMethodRequired,
    /// A post-capture processor call failed; operator attention needed
    /// before retrying.
    ManualReview,
}

impl PaymentStatus {
    /// Returns the stable tag for this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPaymentMethod => "pending_payment_method",
            Self::Scheduled => "scheduled",
            Self::Authorized => "authorized",
            Self::Settled => "settled",
            Self::PaymentMethodRequired => "payment_method_required",
            Self::ManualReview => "manual_review",
        }
    }
}

/// Input for [`Booking::create`].
#[derive(Debug, Clone)]
pub struct NewBooking {
    /// Booking student.
    pub student_id: UserId,
    /// Booking instructor.
    pub instructor_id: UserId,
    /// The instructor service (catalog entry) being booked.
    pub instructor_service_id: uuid::Uuid,
    /// Lesson date in the booking timezone.
    pub booking_date: NaiveDate,
    /// Local lesson start time.
    pub start_time: NaiveTime,
    /// Local lesson end time. Must be after `start_time` on the same date.
    pub end_time: NaiveTime,
    /// IANA timezone name snapshot taken at booking time.
    pub timezone: String,
    /// Lesson start normalized to UTC.
    pub lesson_start_utc: DateTime<Utc>,
    /// Lesson end normalized to UTC.
    pub lesson_end_utc: DateTime<Utc>,
    /// Instructor hourly rate in cents.
    pub hourly_rate: Cents,
    /// Total charged price in cents (lesson price plus any student fee).
    pub total_price: Cents,
}

/// One scheduled lesson between a student and an instructor.
///
/// The booking is the aggregate root for the lesson's financial
/// lifecycle: settlement amounts, capture results and the policy outcome
/// tag all live here. Platform credits and payment events reference the
/// booking by id but are persisted independently and outlive it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    /// Booking identifier (immutable after creation).
    pub id: BookingId,
    /// Booking student.
    pub student_id: UserId,
    /// Booking instructor.
    pub instructor_id: UserId,
    /// The instructor service being booked.
    pub instructor_service_id: uuid::Uuid,
    /// Lesson date in the booking timezone.
    pub booking_date: NaiveDate,
    /// Local lesson start time.
    pub start_time: NaiveTime,
    /// Local lesson end time.
    pub end_time: NaiveTime,
    /// IANA timezone name snapshot.
    pub timezone: String,
    /// Lesson start normalized to UTC.
    pub lesson_start_utc: DateTime<Utc>,
    /// Lesson end normalized to UTC.
    pub lesson_end_utc: DateTime<Utc>,
    /// Lesson duration in minutes, derived from the UTC bounds.
    pub duration_minutes: u32,
    /// Lesson lifecycle status.
    pub status: BookingStatus,
    /// Payment lifecycle status.
    pub payment_status: PaymentStatus,
    /// Processor payment-intent id, once one exists.
    pub payment_intent_id: Option<String>,
    /// Processor payment-method id, once attached.
    pub payment_method_id: Option<String>,
    /// Instructor hourly rate in cents.
    pub hourly_rate: Cents,
    /// Total charged price in cents.
    pub total_price: Cents,
    /// Which cancellation policy branch fired, once settled.
    pub settlement_outcome: Option<PolicyOutcome>,
    /// Platform credit issued to the student by settlement.
    pub student_credit_amount: Cents,
    /// Manual payout issued to the instructor by settlement.
    pub instructor_payout_amount: Cents,
    /// Amount refunded to the card by settlement.
    pub refunded_to_card_amount: Cents,
    /// Amount received at capture, recorded for retry resumption.
    pub captured_amount: Option<Cents>,
    /// Processor transfer id created at capture.
    pub transfer_id: Option<String>,
    /// Instructor-bound portion of the capture, as reported by the
    /// processor. Distinct from `captured_amount` — reversals operate on
    /// this value.
    pub transfer_amount: Option<Cents>,
    /// Completion instant.
    pub completed_at: Option<DateTime<Utc>>,
    /// Cancellation instant.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Cancellation reason tag.
    pub cancellation_reason: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Creates a new PENDING booking after validating the lesson window.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidRequest`] when the local end time
    /// is not after the start time (same-day wrap) or the UTC bounds are
    /// inverted.
    pub fn create(new: NewBooking) -> Result<Self, SettlementError> {
        if new.end_time <= new.start_time {
            return Err(SettlementError::InvalidRequest(format!(
                "lesson end {} must be after start {} on {}",
                new.end_time, new.start_time, new.booking_date
            )));
        }
        if new.lesson_end_utc <= new.lesson_start_utc {
            return Err(SettlementError::InvalidRequest(
                "lesson UTC end must be after UTC start".to_string(),
            ));
        }

        let duration_minutes = u32::try_from(
            new.lesson_end_utc
                .signed_duration_since(new.lesson_start_utc)
                .num_minutes(),
        )
        .map_err(|_| {
            SettlementError::InvalidRequest("lesson duration out of range".to_string())
        })?;

        Ok(Self {
            id: BookingId::new(),
            student_id: new.student_id,
            instructor_id: new.instructor_id,
            instructor_service_id: new.instructor_service_id,
            booking_date: new.booking_date,
            start_time: new.start_time,
            end_time: new.end_time,
            timezone: new.timezone,
            lesson_start_utc: new.lesson_start_utc,
            lesson_end_utc: new.lesson_end_utc,
            duration_minutes,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::PendingPaymentMethod,
            payment_intent_id: None,
            payment_method_id: None,
            hourly_rate: new.hourly_rate,
            total_price: new.total_price,
            settlement_outcome: None,
            student_credit_amount: Cents::ZERO,
            instructor_payout_amount: Cents::ZERO,
            refunded_to_card_amount: Cents::ZERO,
            captured_amount: None,
            transfer_id: None,
            transfer_amount: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: Utc::now(),
        })
    }

    /// Lesson price in cents: `hourly_rate × duration / 60`, excluding any
    /// student fee baked into `total_price`.
    #[must_use]
    pub fn lesson_price(&self) -> Cents {
        Cents::new(self.hourly_rate.get() * i64::from(self.duration_minutes) / 60)
    }

    /// Records the result of a successful capture so a retried settlement
    /// can resume without capturing twice.
    pub fn record_capture(&mut self, transfer_id: String, received: Cents, transfer: Cents) {
        self.captured_amount = Some(received);
        self.transfer_id = Some(transfer_id);
        self.transfer_amount = Some(transfer);
        self.payment_status = PaymentStatus::Settled;
    }
}

/// Lightweight booking summary for listings.
#[derive(Debug, Clone, Serialize)]
pub struct BookingSummary {
    /// Booking identifier.
    pub id: BookingId,
    /// Booking student.
    pub student_id: UserId,
    /// Booking instructor.
    pub instructor_id: UserId,
    /// Lesson date in the booking timezone.
    pub booking_date: NaiveDate,
    /// Lesson lifecycle status.
    pub status: BookingStatus,
    /// Payment lifecycle status.
    pub payment_status: PaymentStatus,
    /// Total charged price.
    pub total_price: Cents,
}

impl From<&Booking> for BookingSummary {
    fn from(booking: &Booking) -> Self {
        Self {
            id: booking.id,
            student_id: booking.student_id,
            instructor_id: booking.instructor_id,
            booking_date: booking.booking_date,
            status: booking.status,
            payment_status: booking.payment_status,
            total_price: booking.total_price,
        }
    }
}
