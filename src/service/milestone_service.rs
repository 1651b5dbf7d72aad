//! Milestone credit side-system.
//!
//! Issues one-time bonus credits when a student's completed-lesson count
//! crosses a threshold, and revokes them when the triggering booking is
//! later invalidated. A small rule table plus the ledger writer's
//! idempotency — nothing here talks to the processor.

use std::sync::Arc;

use crate::domain::{BookingId, BookingRegistry, Cents, CreditReason, PlatformCredit, SettlementEvent, UserId};
use crate::error::SettlementError;
use crate::service::ledger_service::LedgerService;

/// One milestone rule: completed-lesson count, credit cents, ledger tag.
#[derive(Debug, Clone, Copy)]
struct MilestoneRule {
    threshold: u64,
    amount_cents: i64,
    reason: CreditReason,
}

/// Completed-lesson thresholds and their one-time credits.
const MILESTONE_RULES: [MilestoneRule; 2] = [
    MilestoneRule {
        threshold: 5,
        amount_cents: 1_000,
        reason: CreditReason::MilestoneS5,
    },
    MilestoneRule {
        threshold: 11,
        amount_cents: 2_000,
        reason: CreditReason::MilestoneS11,
    },
];

/// Issues and revokes milestone credits.
#[derive(Debug)]
pub struct MilestoneService {
    registry: Arc<BookingRegistry>,
    ledger: Arc<LedgerService>,
}

impl MilestoneService {
    /// Creates a new milestone service.
    #[must_use]
    pub fn new(registry: Arc<BookingRegistry>, ledger: Arc<LedgerService>) -> Self {
        Self { registry, ledger }
    }

    /// Issues a milestone credit when the student's completed-lesson
    /// count sits exactly on a threshold, tagged to the booking that
    /// crossed it. Re-invoking for the same booking returns the existing
    /// credit without creating a duplicate.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::Persistence`] when mirroring the
    /// credit to the database fails.
    pub async fn maybe_issue_milestone_credit(
        &self,
        student_id: UserId,
        booking_id: BookingId,
    ) -> Result<Option<PlatformCredit>, SettlementError> {
        let completed = self.registry.count_completed_for_student(student_id).await;

        for rule in MILESTONE_RULES {
            if completed != rule.threshold {
                continue;
            }
            let issued = self
                .ledger
                .issue_credit(
                    student_id,
                    booking_id,
                    Cents::new(rule.amount_cents),
                    rule.reason,
                )
                .await?;
            if issued.newly_issued {
                self.ledger
                    .record_event(SettlementEvent::MilestoneCreditIssued {
                        booking_id,
                        user_id: student_id,
                        credit_id: issued.credit.id,
                        amount_cents: issued.credit.amount_cents,
                        reason: rule.reason.as_str().to_string(),
                        timestamp: chrono::Utc::now(),
                    })
                    .await?;
                tracing::info!(
                    %student_id,
                    %booking_id,
                    threshold = rule.threshold,
                    "milestone credit issued"
                );
            }
            return Ok(Some(issued.credit));
        }
        Ok(None)
    }

    /// Revokes unused milestone credits sourced from a booking that was
    /// invalidated. Credits already spent stay as they are — spent
    /// credit is not clawed back — and contribute 0 to the returned
    /// total.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::Persistence`] when mirroring the
    /// updates to the database fails.
    pub async fn revoke_milestone_credit(
        &self,
        source_booking_id: BookingId,
    ) -> Result<Cents, SettlementError> {
        let mut total = Cents::ZERO;
        for rule in MILESTONE_RULES {
            total += self
                .ledger
                .revoke_credit(source_booking_id, rule.reason)
                .await?;
        }
        Ok(total)
    }
}
