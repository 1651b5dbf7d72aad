//! Booking lifecycle service: creation, payment setup, completion and
//! invalidation.
//!
//! The payment authorization itself happens in the processor integration
//! glue outside this crate; this service records the resulting state
//! transitions and audit events, and triggers the milestone side-system
//! on completion.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::domain::booking::{Booking, BookingStatus, NewBooking, PaymentStatus};
use crate::domain::{
    AccountsDirectory, BookingId, BookingRegistry, Cents, PlatformCredit, SettlementEvent,
};
use crate::error::SettlementError;
use crate::service::ledger_service::LedgerService;
use crate::service::milestone_service::MilestoneService;

/// How long a card authorization stays valid. Lessons starting within
/// this window authorize immediately on payment-method attach; later
/// lessons defer until the scheduler re-runs closer to the lesson.
pub const AUTH_HOLD_DAYS: i64 = 7;

/// Booking lifecycle orchestrator.
#[derive(Debug)]
pub struct BookingService {
    registry: Arc<BookingRegistry>,
    accounts: Arc<AccountsDirectory>,
    ledger: Arc<LedgerService>,
    milestones: Arc<MilestoneService>,
}

impl BookingService {
    /// Creates a new booking service.
    #[must_use]
    pub fn new(
        registry: Arc<BookingRegistry>,
        accounts: Arc<AccountsDirectory>,
        ledger: Arc<LedgerService>,
        milestones: Arc<MilestoneService>,
    ) -> Self {
        Self {
            registry,
            accounts,
            ledger,
            milestones,
        }
    }

    /// Validates and registers a new PENDING booking. When the student
    /// has no stored customer profile a setup intent is recorded so the
    /// client can collect a payment method.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidRequest`] for an invalid lesson
    /// window, or a persistence error from event recording.
    pub async fn create_booking(&self, new: NewBooking) -> Result<Booking, SettlementError> {
        let booking = Booking::create(new)?;
        let snapshot = booking.clone();
        self.registry.insert(booking).await?;

        if self.accounts.customer(snapshot.student_id).await.is_none() {
            self.ledger
                .record_event(SettlementEvent::SetupIntentCreated {
                    booking_id: snapshot.id,
                    student_id: snapshot.student_id,
                    timestamp: Utc::now(),
                })
                .await?;
        }

        tracing::info!(booking_id = %snapshot.id, "booking created");
        Ok(snapshot)
    }

    /// Attaches a payment method and confirms the booking. Lessons
    /// starting within [`AUTH_HOLD_DAYS`] authorize immediately; later
    /// lessons record a scheduled authorization instead.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::BookingNotFound`] for an unknown
    /// booking or [`SettlementError::InvalidRequest`] when the booking is
    /// not awaiting payment setup.
    pub async fn attach_payment_method(
        &self,
        booking_id: BookingId,
        payment_method_id: String,
        payment_intent_id: String,
    ) -> Result<(), SettlementError> {
        let entry_lock = self.registry.get(booking_id).await?;
        let mut booking = entry_lock.write().await;

        if booking.status != BookingStatus::Pending {
            return Err(SettlementError::InvalidRequest(format!(
                "booking {} is not awaiting payment setup (status {})",
                booking_id,
                booking.status.as_str()
            )));
        }

        booking.payment_method_id = Some(payment_method_id);
        booking.payment_intent_id = Some(payment_intent_id.clone());
        booking.status = BookingStatus::Confirmed;

        let now = Utc::now();
        let immediate =
            booking.lesson_start_utc.signed_duration_since(now) <= Duration::days(AUTH_HOLD_DAYS);
        let event = if immediate {
            booking.payment_status = PaymentStatus::Authorized;
            SettlementEvent::AuthorizedImmediate {
                booking_id,
                payment_intent_id,
                amount_cents: booking.total_price,
                timestamp: now,
            }
        } else {
            booking.payment_status = PaymentStatus::Scheduled;
            SettlementEvent::AuthorizationScheduled {
                booking_id,
                lesson_start_utc: booking.lesson_start_utc,
                timestamp: now,
            }
        };
        drop(booking);

        self.ledger.record_event(event).await?;
        Ok(())
    }

    /// Marks a CONFIRMED booking COMPLETED and runs the milestone check
    /// for the student. Returns the milestone credit when one was issued
    /// or already existed for this booking.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::BookingNotFound`] for an unknown
    /// booking or [`SettlementError::InvalidRequest`] when the booking is
    /// not in a completable status.
    pub async fn complete_booking(
        &self,
        booking_id: BookingId,
    ) -> Result<Option<PlatformCredit>, SettlementError> {
        let entry_lock = self.registry.get(booking_id).await?;
        let mut booking = entry_lock.write().await;

        if booking.status != BookingStatus::Confirmed {
            return Err(SettlementError::InvalidRequest(format!(
                "booking {} cannot complete from status {}",
                booking_id,
                booking.status.as_str()
            )));
        }

        booking.status = BookingStatus::Completed;
        booking.completed_at = Some(Utc::now());
        let student_id = booking.student_id;
        // Release before the milestone count walks the registry.
        drop(booking);

        tracing::info!(%booking_id, "booking completed");
        self.milestones
            .maybe_issue_milestone_credit(student_id, booking_id)
            .await
    }

    /// The explicit reversion path for a COMPLETED booking: marks it
    /// CANCELLED and revokes any unused milestone credits it triggered.
    /// Returns the cents revoked (0 when the credit was already spent).
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::BookingNotFound`] for an unknown
    /// booking or [`SettlementError::InvalidRequest`] when the booking is
    /// not COMPLETED.
    pub async fn invalidate_completed(
        &self,
        booking_id: BookingId,
    ) -> Result<Cents, SettlementError> {
        let entry_lock = self.registry.get(booking_id).await?;
        let mut booking = entry_lock.write().await;

        if booking.status != BookingStatus::Completed {
            return Err(SettlementError::InvalidRequest(format!(
                "booking {} is not completed (status {})",
                booking_id,
                booking.status.as_str()
            )));
        }

        booking.status = BookingStatus::Cancelled;
        booking.cancelled_at = Some(Utc::now());
        booking.cancellation_reason = Some("completed_booking_invalidated".to_string());
        drop(booking);

        tracing::info!(%booking_id, "completed booking invalidated");
        self.milestones.revoke_milestone_credit(booking_id).await
    }
}
