//! Settlement executor: drives processor calls for a cancellation.
//!
//! Orchestration layer for the cancellation policy. Every settlement
//! follows the pattern: acquire the per-booking write lock → validate →
//! read payment state → classify → issue processor calls → record events
//! → write final booking state → return result. The lock is held from
//! classification through the final write, so concurrent cancellations
//! of one booking serialize.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::booking::{Booking, BookingStatus, PaymentStatus};
use crate::domain::policy::{classify, CancellationRole, Initiator, PolicyOutcome};
use crate::domain::{
    AccountsDirectory, BookingId, BookingRegistry, Cents, CreditReason, SettlementEvent,
};
use crate::error::SettlementError;
use crate::processor::{PaymentProcessor, ProcessorOp};
use crate::service::ledger_service::LedgerService;
use crate::service::payment_state::{PaymentState, PaymentStateReader};

/// Final money movements of one settlement.
///
/// All amounts are integer cents and mirror the fields written onto the
/// booking row for downstream reporting.
#[derive(Debug, Clone)]
pub struct SettlementResult {
    /// The settled booking.
    pub booking_id: BookingId,
    /// Which policy branch fired.
    pub outcome: PolicyOutcome,
    /// Amount received by capture during this settlement (or a prior
    /// attempt being resumed).
    pub captured_cents: Cents,
    /// Amount pulled back from the instructor transfer.
    pub transfer_reversed_cents: Cents,
    /// Platform credit issued to the student.
    pub student_credit_cents: Cents,
    /// Manual payout issued to the instructor.
    pub instructor_payout_cents: Cents,
    /// Amount refunded to the card.
    pub refunded_to_card_cents: Cents,
    /// Previously spent credit returned to the student because this
    /// booking was cancelled.
    pub credit_reinstated_cents: Cents,
}

impl SettlementResult {
    fn empty(booking_id: BookingId, outcome: PolicyOutcome) -> Self {
        Self {
            booking_id,
            outcome,
            captured_cents: Cents::ZERO,
            transfer_reversed_cents: Cents::ZERO,
            student_credit_cents: Cents::ZERO,
            instructor_payout_cents: Cents::ZERO,
            refunded_to_card_cents: Cents::ZERO,
            credit_reinstated_cents: Cents::ZERO,
        }
    }
}

/// Orchestrates cancellation settlements against the payment processor.
///
/// Generic over the processor port so tests drive a scriptable mock and
/// production wires the real integration.
#[derive(Debug)]
pub struct SettlementService<P> {
    registry: Arc<BookingRegistry>,
    accounts: Arc<AccountsDirectory>,
    ledger: Arc<LedgerService>,
    processor: Arc<P>,
}

impl<P: PaymentProcessor> SettlementService<P> {
    /// Creates a new settlement service.
    #[must_use]
    pub fn new(
        registry: Arc<BookingRegistry>,
        accounts: Arc<AccountsDirectory>,
        ledger: Arc<LedgerService>,
        processor: Arc<P>,
    ) -> Self {
        Self {
            registry,
            accounts,
            ledger,
            processor,
        }
    }

    /// Settles a cancellation for the given booking.
    ///
    /// Safe to re-invoke after a processor failure: each invocation
    /// re-reads payment state, resumes from stored capture results, and
    /// consults the event trail before repeating a reversal or payout.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError`] per the taxonomy in [`crate::error`]:
    /// validation and invariant errors leave the booking untouched;
    /// processor failures park it in a retryable payment status first.
    pub async fn settle(
        &self,
        booking_id: BookingId,
        initiator: Initiator,
    ) -> Result<SettlementResult, SettlementError> {
        let entry_lock = self.registry.get(booking_id).await?;
        // Exclusive from before classification through the final write.
        let mut booking = entry_lock.write().await;

        check_initiator(&booking, initiator)?;
        if let Some(outcome) = booking.settlement_outcome {
            return Err(SettlementError::AlreadySettled {
                outcome: outcome.as_str(),
            });
        }
        if !booking.status.is_cancellable() {
            return Err(SettlementError::NotCancellable {
                status: booking.status,
            });
        }

        let state = PaymentStateReader::read(&booking, &self.accounts).await?;
        let now = Utc::now();
        let outcome = classify(now, booking.lesson_start_utc, initiator.role);
        let mut result = SettlementResult::empty(booking_id, outcome);

        match outcome {
            PolicyOutcome::InstructorFullRefund | PolicyOutcome::OutsideWindowNoCharge => {
                self.release_or_refund(&mut booking, &state, &mut result)
                    .await?;
            }
            PolicyOutcome::FullLessonCredit => {
                self.capture_and_credit(&mut booking, &state, &mut result)
                    .await?;
            }
            PolicyOutcome::FiftyFiftySplit => {
                self.capture_and_split(&mut booking, &state, &mut result)
                    .await?;
            }
        }

        booking.settlement_outcome = Some(outcome);
        booking.status = BookingStatus::Cancelled;
        booking.cancelled_at = Some(now);
        booking.cancellation_reason = Some(
            match initiator.role {
                CancellationRole::Student => "cancelled_by_student",
                CancellationRole::Instructor => "cancelled_by_instructor",
            }
            .to_string(),
        );
        booking.student_credit_amount = result.student_credit_cents;
        booking.instructor_payout_amount = result.instructor_payout_cents;
        booking.refunded_to_card_amount = result.refunded_to_card_cents;

        result.credit_reinstated_cents = self.ledger.reinstate_used_credit(booking_id).await?;
        self.ledger.snapshot_booking(&booking).await?;

        tracing::info!(
            %booking_id,
            outcome = outcome.as_str(),
            student_credit = result.student_credit_cents.get(),
            instructor_payout = result.instructor_payout_cents.get(),
            refunded = result.refunded_to_card_cents.get(),
            "settlement complete"
        );
        Ok(result)
    }

    /// No-money outcomes: void a held authorization, or fully refund a
    /// captured one with the transfer reversed. Nothing held means
    /// nothing to do.
    async fn release_or_refund(
        &self,
        booking: &mut Booking,
        state: &PaymentState,
        result: &mut SettlementResult,
    ) -> Result<(), SettlementError> {
        if booking.captured_amount.is_some() {
            // Funds already captured (scheduled capture ran, or a prior
            // settlement attempt captured before failing): full refund
            // with the transfer pulled back.
            let intent = state.require_intent()?.to_string();
            let refund = self
                .processor
                .refund_payment(&intent, true, true, None)
                .await
                .map_err(|e| {
                    booking.payment_status = PaymentStatus::ManualReview;
                    tracing::error!(booking_id = %booking.id, error = %e, "refund failed");
                    SettlementError::Processor {
                        op: ProcessorOp::Refund,
                        source: e,
                    }
                })?;
            let refunded = if refund.amount_cents.is_zero() {
                booking.captured_amount.unwrap_or(booking.total_price)
            } else {
                refund.amount_cents
            };
            self.ledger
                .record_event(SettlementEvent::RefundIssued {
                    booking_id: booking.id,
                    payment_intent_id: intent,
                    amount_cents: refunded,
                    timestamp: Utc::now(),
                })
                .await?;
            result.refunded_to_card_cents = refunded;
        } else if state.is_authorized() {
            let intent = state.require_intent()?.to_string();
            self.processor
                .cancel_payment_intent(&intent)
                .await
                .map_err(|e| {
                    booking.payment_status = PaymentStatus::ManualReview;
                    tracing::error!(booking_id = %booking.id, error = %e, "void failed");
                    SettlementError::Processor {
                        op: ProcessorOp::CancelAuthorization,
                        source: e,
                    }
                })?;
            self.ledger
                .record_event(SettlementEvent::AuthorizationVoided {
                    booking_id: booking.id,
                    payment_intent_id: intent,
                    timestamp: Utc::now(),
                })
                .await?;
        }
        // Scheduled / pending payment method: nothing was ever held.
        Ok(())
    }

    /// Ensures the booking's authorization is captured, resuming from a
    /// prior attempt's stored results when present. Returns the transfer
    /// id and amounts for the reversal that follows.
    async fn ensure_captured(
        &self,
        booking: &mut Booking,
        state: &PaymentState,
    ) -> Result<(String, Cents, Cents), SettlementError> {
        if let (Some(transfer_id), Some(transfer_amount), Some(received)) = (
            booking.transfer_id.clone(),
            booking.transfer_amount,
            booking.captured_amount,
        ) {
            return Ok((transfer_id, transfer_amount, received));
        }

        // A prior failed capture leaves the booking in
        // PaymentMethodRequired; once the caller fixes the payment method
        // the same intent is capturable again.
        let capturable = state.is_authorized()
            || state.payment_status == PaymentStatus::PaymentMethodRequired;
        if !capturable || state.payment_intent_id.is_none() {
            booking.payment_status = PaymentStatus::ManualReview;
            return Err(SettlementError::InvalidPaymentState(format!(
                "cannot capture in payment status {}",
                state.payment_status.as_str()
            )));
        }

        let intent = state.require_intent()?.to_string();
        let capture = self
            .processor
            .capture_payment_intent(&intent)
            .await
            .map_err(|e| {
                // Retryable by fixing the payment method; no credit was
                // issued and no further calls follow.
                booking.payment_status = PaymentStatus::PaymentMethodRequired;
                tracing::error!(booking_id = %booking.id, error = %e, "capture failed");
                SettlementError::Processor {
                    op: ProcessorOp::Capture,
                    source: e,
                }
            })?;

        booking.record_capture(
            capture.transfer_id.clone(),
            capture.amount_received_cents,
            capture.transfer_amount_cents,
        );
        self.ledger
            .record_event(SettlementEvent::PaymentCaptured {
                booking_id: booking.id,
                payment_intent_id: intent,
                amount_received_cents: capture.amount_received_cents,
                transfer_amount_cents: capture.transfer_amount_cents,
                timestamp: Utc::now(),
            })
            .await?;

        Ok((
            capture.transfer_id,
            capture.transfer_amount_cents,
            capture.amount_received_cents,
        ))
    }

    /// Reverses the instructor-bound transfer in full, unless the event
    /// trail shows a prior attempt already did.
    async fn ensure_transfer_reversed(
        &self,
        booking: &mut Booking,
        transfer_id: &str,
        transfer_amount: Cents,
    ) -> Result<(), SettlementError> {
        let already_reversed = self
            .ledger
            .events_for(booking.id)
            .await
            .iter()
            .any(|e| matches!(e, SettlementEvent::TransferReversed { .. }));
        if already_reversed {
            return Ok(());
        }

        self.processor
            .reverse_transfer(transfer_id, transfer_amount)
            .await
            .map_err(|e| {
                booking.payment_status = PaymentStatus::ManualReview;
                tracing::error!(booking_id = %booking.id, error = %e, "transfer reversal failed");
                SettlementError::Processor {
                    op: ProcessorOp::ReverseTransfer,
                    source: e,
                }
            })?;
        self.ledger
            .record_event(SettlementEvent::TransferReversed {
                booking_id: booking.id,
                transfer_id: transfer_id.to_string(),
                amount_cents: transfer_amount,
                timestamp: Utc::now(),
            })
            .await?;
        Ok(())
    }

    /// 12–24h branch: capture, reverse the instructor-bound portion, and
    /// credit the full lesson price (fees excluded) back to the student.
    async fn capture_and_credit(
        &self,
        booking: &mut Booking,
        state: &PaymentState,
        result: &mut SettlementResult,
    ) -> Result<(), SettlementError> {
        let (transfer_id, transfer_amount, received) =
            self.ensure_captured(booking, state).await?;
        result.captured_cents = received;

        // Reverse the transfer amount, not the amount received — only the
        // instructor-bound portion was ever transferred.
        self.ensure_transfer_reversed(booking, &transfer_id, transfer_amount)
            .await?;
        result.transfer_reversed_cents = transfer_amount;

        let credit_amount = booking.lesson_price();
        let issued = self
            .ledger
            .issue_credit(
                booking.student_id,
                booking.id,
                credit_amount,
                CreditReason::LessonPrice,
            )
            .await?;
        if issued.newly_issued {
            self.ledger
                .record_event(SettlementEvent::CreditIssued {
                    booking_id: booking.id,
                    user_id: booking.student_id,
                    credit_id: issued.credit.id,
                    amount_cents: credit_amount,
                    reason: CreditReason::LessonPrice.as_str().to_string(),
                    timestamp: Utc::now(),
                })
                .await?;
        }
        result.student_credit_cents = credit_amount;
        Ok(())
    }

    /// Under-12h branch: capture, reverse the full transfer, then split —
    /// half the lesson price becomes student credit and half the
    /// instructor-bound amount becomes a manual payout. Both halves are
    /// floored.
    async fn capture_and_split(
        &self,
        booking: &mut Booking,
        state: &PaymentState,
        result: &mut SettlementResult,
    ) -> Result<(), SettlementError> {
        let (transfer_id, transfer_amount, received) =
            self.ensure_captured(booking, state).await?;
        result.captured_cents = received;

        self.ensure_transfer_reversed(booking, &transfer_id, transfer_amount)
            .await?;
        result.transfer_reversed_cents = transfer_amount;

        let payout_amount = transfer_amount.halved();
        let already_paid_out = self
            .ledger
            .events_for(booking.id)
            .await
            .iter()
            .any(|e| matches!(e, SettlementEvent::PayoutCreated { .. }));
        if !already_paid_out {
            let transfer = self
                .processor
                .create_manual_transfer(&state.connected_account_id, payout_amount)
                .await
                .map_err(|e| {
                    booking.payment_status = PaymentStatus::ManualReview;
                    tracing::error!(booking_id = %booking.id, error = %e, "manual payout failed");
                    SettlementError::Processor {
                        op: ProcessorOp::ManualTransfer,
                        source: e,
                    }
                })?;
            self.ledger
                .record_event(SettlementEvent::PayoutCreated {
                    booking_id: booking.id,
                    transfer_id: transfer.transfer_id,
                    destination_account_id: state.connected_account_id.clone(),
                    amount_cents: payout_amount,
                    timestamp: Utc::now(),
                })
                .await?;
        }
        result.instructor_payout_cents = payout_amount;

        let credit_amount = booking.lesson_price().halved();
        let issued = self
            .ledger
            .issue_credit(
                booking.student_id,
                booking.id,
                credit_amount,
                CreditReason::LessonPrice,
            )
            .await?;
        if issued.newly_issued {
            self.ledger
                .record_event(SettlementEvent::CreditIssued {
                    booking_id: booking.id,
                    user_id: booking.student_id,
                    credit_id: issued.credit.id,
                    amount_cents: credit_amount,
                    reason: CreditReason::LessonPrice.as_str().to_string(),
                    timestamp: Utc::now(),
                })
                .await?;
        }
        result.student_credit_cents = credit_amount;
        Ok(())
    }
}

/// Verifies the initiator is the named party on the booking.
fn check_initiator(booking: &Booking, initiator: Initiator) -> Result<(), SettlementError> {
    let expected = match initiator.role {
        CancellationRole::Student => booking.student_id,
        CancellationRole::Instructor => booking.instructor_id,
    };
    if initiator.user_id != expected {
        return Err(SettlementError::InvalidRequest(format!(
            "user {} is not the booking's {:?}",
            initiator.user_id, initiator.role
        )));
    }
    Ok(())
}
