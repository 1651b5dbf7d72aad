//! Ledger writer: the single entry point for credit and event writes.
//!
//! Everything that issues, revokes, reinstates or consumes platform
//! credit, and everything that records a payment event, goes through
//! [`LedgerService`]. The service enforces the per-(source booking,
//! reason) idempotency invariant, appends to the in-memory journal,
//! publishes on the event bus, and mirrors writes to PostgreSQL when
//! persistence is enabled.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::{
    Booking, BookingId, Cents, CreditLedger, CreditReason, EventBus, PlatformCredit,
    SettlementEvent, UserId,
};
use crate::error::SettlementError;
use crate::persistence::PostgresPersistence;

/// Result of [`LedgerService::issue_credit`]: the credit plus whether
/// this call created it. Re-issuing an existing (source booking, reason)
/// pair returns the original entry with `newly_issued == false`, letting
/// callers skip duplicate event records.
#[derive(Debug, Clone)]
pub struct IssuedCredit {
    /// The ledger entry.
    pub credit: PlatformCredit,
    /// `true` when this call inserted the entry.
    pub newly_issued: bool,
}

/// Single-entry-point wrapper around credit and payment-event writes.
#[derive(Debug)]
pub struct LedgerService {
    credits: Arc<CreditLedger>,
    journal: RwLock<Vec<SettlementEvent>>,
    event_bus: EventBus,
    persistence: Option<Arc<PostgresPersistence>>,
    event_log_enabled: bool,
}

impl LedgerService {
    /// Creates a ledger writer over the given stores.
    #[must_use]
    pub fn new(
        credits: Arc<CreditLedger>,
        event_bus: EventBus,
        persistence: Option<Arc<PostgresPersistence>>,
        event_log_enabled: bool,
    ) -> Self {
        Self {
            credits,
            journal: RwLock::new(Vec::new()),
            event_bus,
            persistence,
            event_log_enabled,
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns a reference to the credit store.
    #[must_use]
    pub fn credits(&self) -> &Arc<CreditLedger> {
        &self.credits
    }

    /// Records a payment event: journal append, bus publish, and an
    /// insert into the append-only event log when enabled.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::Persistence`] when the database
    /// insert fails; the journal append and bus publish still happened.
    pub async fn record_event(&self, event: SettlementEvent) -> Result<(), SettlementError> {
        self.journal.write().await.push(event.clone());
        let _ = self.event_bus.publish(event.clone());

        if self.event_log_enabled
            && let Some(persistence) = &self.persistence
        {
            let payload = serde_json::to_value(&event)
                .map_err(|e| SettlementError::Internal(e.to_string()))?;
            persistence
                .save_payment_event(*event.booking_id().as_uuid(), event.event_type_str(), &payload)
                .await?;
        }

        Ok(())
    }

    /// Returns the recorded events for a booking, in order.
    pub async fn events_for(&self, booking_id: BookingId) -> Vec<SettlementEvent> {
        self.journal
            .read()
            .await
            .iter()
            .filter(|e| e.booking_id() == booking_id)
            .cloned()
            .collect()
    }

    /// Issues a platform credit, idempotently per (source booking,
    /// reason).
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::Persistence`] when mirroring the row
    /// to the database fails.
    pub async fn issue_credit(
        &self,
        user_id: UserId,
        source_booking_id: BookingId,
        amount_cents: Cents,
        reason: CreditReason,
    ) -> Result<IssuedCredit, SettlementError> {
        if let Some(existing) = self
            .credits
            .find_by_source_and_reason(source_booking_id, reason)
            .await
        {
            tracing::debug!(
                %source_booking_id,
                reason = reason.as_str(),
                "credit already issued, skipping"
            );
            return Ok(IssuedCredit {
                credit: existing,
                newly_issued: false,
            });
        }

        let credit = PlatformCredit::issue(user_id, source_booking_id, amount_cents, reason);
        self.credits.insert(credit.clone()).await;

        if let Some(persistence) = &self.persistence {
            persistence.save_credit(&credit).await?;
        }

        tracing::info!(
            %user_id,
            %source_booking_id,
            amount_cents = amount_cents.get(),
            reason = reason.as_str(),
            "platform credit issued"
        );
        Ok(IssuedCredit {
            credit,
            newly_issued: true,
        })
    }

    /// Revokes unused credits for an idempotency key: matching entries
    /// are marked used without a consumer. Returns the cents revoked, 0
    /// when nothing matched — never an error for "nothing to revoke".
    /// Already-spent credits are intentionally left alone.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::Persistence`] when mirroring the
    /// update to the database fails.
    pub async fn revoke_credit(
        &self,
        source_booking_id: BookingId,
        reason: CreditReason,
    ) -> Result<Cents, SettlementError> {
        let now = Utc::now();
        let revoked = self
            .credits
            .revoke_unused(source_booking_id, reason, now)
            .await;
        if revoked.is_empty() {
            return Ok(Cents::ZERO);
        }

        let mut total = Cents::ZERO;
        for credit in &revoked {
            total += credit.amount_cents;
            if let Some(persistence) = &self.persistence {
                persistence
                    .mark_credit_used(*credit.id.as_uuid(), now, None)
                    .await?;
            }
        }

        self.record_event(SettlementEvent::CreditRevoked {
            source_booking_id,
            amount_cents: total,
            timestamp: now,
        })
        .await?;

        tracing::info!(
            %source_booking_id,
            reason = reason.as_str(),
            amount_cents = total.get(),
            "platform credit revoked"
        );
        Ok(total)
    }

    /// Reinstates credit consumed by a booking that was later refunded:
    /// one new `refund_reinstate` credit of the summed amount, idempotent
    /// per refunded booking. Returns 0 on rerun or when the booking
    /// consumed no credit.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::Persistence`] when mirroring the row
    /// to the database fails.
    pub async fn reinstate_used_credit(
        &self,
        refunded_booking_id: BookingId,
    ) -> Result<Cents, SettlementError> {
        if self
            .credits
            .find_by_source_and_reason(refunded_booking_id, CreditReason::RefundReinstate)
            .await
            .is_some()
        {
            return Ok(Cents::ZERO);
        }

        let consumed = self.credits.consumed_by(refunded_booking_id).await;
        let Some(first) = consumed.first() else {
            return Ok(Cents::ZERO);
        };
        let user_id = first.user_id;
        let total = consumed
            .iter()
            .fold(Cents::ZERO, |acc, c| acc + c.amount_cents);

        let issued = self
            .issue_credit(
                user_id,
                refunded_booking_id,
                total,
                CreditReason::RefundReinstate,
            )
            .await?;
        if !issued.newly_issued {
            return Ok(Cents::ZERO);
        }

        self.record_event(SettlementEvent::CreditReinstated {
            refunded_booking_id,
            user_id,
            amount_cents: total,
            timestamp: Utc::now(),
        })
        .await?;

        Ok(total)
    }

    /// Applies a user's available credit against a booking, oldest
    /// entries first, consuming whole rows only. Returns the cents
    /// applied, up to `amount_cents`.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::Persistence`] when mirroring the
    /// updates to the database fails.
    pub async fn apply_credit(
        &self,
        user_id: UserId,
        booking_id: BookingId,
        amount_cents: Cents,
    ) -> Result<Cents, SettlementError> {
        let now = Utc::now();
        let mut remaining = amount_cents;
        let mut applied = Cents::ZERO;

        for credit in self.credits.available_for_user(user_id).await {
            if remaining.is_zero() {
                break;
            }
            if credit.amount_cents > remaining {
                continue;
            }
            if let Some(consumed) = self.credits.mark_consumed(credit.id, booking_id, now).await {
                applied += consumed.amount_cents;
                remaining = remaining - consumed.amount_cents;
                if let Some(persistence) = &self.persistence {
                    persistence
                        .mark_credit_used(*consumed.id.as_uuid(), now, Some(*booking_id.as_uuid()))
                        .await?;
                }
            }
        }

        if !applied.is_zero() {
            tracing::info!(
                %user_id,
                %booking_id,
                applied_cents = applied.get(),
                "platform credit applied"
            );
        }
        Ok(applied)
    }

    /// Saves a post-settlement snapshot of the booking when persistence
    /// is enabled.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::Persistence`] when the insert fails.
    pub async fn snapshot_booking(&self, booking: &Booking) -> Result<(), SettlementError> {
        if let Some(persistence) = &self.persistence {
            let state = serde_json::to_value(booking)
                .map_err(|e| SettlementError::Internal(e.to_string()))?;
            persistence
                .save_booking_snapshot(*booking.id.as_uuid(), &state)
                .await?;
        }
        Ok(())
    }
}
