//! Platform credit ledger entries and their in-memory store.
//!
//! A platform credit is internal store credit usable against future
//! bookings — no real money moves when one is issued. The ledger enforces
//! the idempotency invariant that a given (source booking, reason) pair
//! is issued at most once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::money::Cents;
use super::{BookingId, CreditId, UserId};

/// Why a credit was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditReason {
    /// Fifth completed lesson milestone.
    MilestoneS5,
    /// Eleventh completed lesson milestone.
    MilestoneS11,
    /// Credit consumed by a booking that was later refunded.
    RefundReinstate,
    /// Lesson-price credit from a late cancellation.
    LessonPrice,
    /// Rebate of a platform fee.
    FeeRebate,
    /// Referral program credit.
    ReferralCredit,
}

impl CreditReason {
    /// Returns the stable ledger tag for this reason.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MilestoneS5 => "milestone_s5",
            Self::MilestoneS11 => "milestone_s11",
            Self::RefundReinstate => "refund_reinstate",
            Self::LessonPrice => "lesson_price_credit",
            Self::FeeRebate => "fee_rebate",
            Self::ReferralCredit => "referral_credit",
        }
    }
}

/// A store-credit ledger entry owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformCredit {
    /// Ledger entry identifier.
    pub id: CreditId,
    /// Credit owner.
    pub user_id: UserId,
    /// Credit amount in cents.
    pub amount_cents: Cents,
    /// Why the credit was issued.
    pub reason: CreditReason,
    /// Booking that produced the credit. Together with `reason` this is
    /// the idempotency key.
    pub source_booking_id: BookingId,
    /// Booking the credit was spent on, when consumed.
    pub consumed_by_booking_id: Option<BookingId>,
    /// Issue instant.
    pub created_at: DateTime<Utc>,
    /// Set when the credit is consumed or revoked. A revoked credit has
    /// `used_at` set and no consumer.
    pub used_at: Option<DateTime<Utc>>,
}

impl PlatformCredit {
    /// Creates a fresh unused credit.
    #[must_use]
    pub fn issue(
        user_id: UserId,
        source_booking_id: BookingId,
        amount_cents: Cents,
        reason: CreditReason,
    ) -> Self {
        Self {
            id: CreditId::new(),
            user_id,
            amount_cents,
            reason,
            source_booking_id,
            consumed_by_booking_id: None,
            created_at: Utc::now(),
            used_at: None,
        }
    }

    /// Returns `true` while the credit can still be applied.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.used_at.is_none()
    }
}

/// In-memory store for platform credits.
///
/// Mutation goes through the ledger writer service; the store itself only
/// guarantees consistent reads and the existence checks the writer relies
/// on. The persistence layer adds a real unique index on
/// (source_booking_id, reason) as a backstop.
#[derive(Debug, Default)]
pub struct CreditLedger {
    credits: RwLock<Vec<PlatformCredit>>,
}

impl CreditLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            credits: RwLock::new(Vec::new()),
        }
    }

    /// Appends a credit entry.
    pub async fn insert(&self, credit: PlatformCredit) {
        self.credits.write().await.push(credit);
    }

    /// Finds the credit for an idempotency key, used or not.
    pub async fn find_by_source_and_reason(
        &self,
        source_booking_id: BookingId,
        reason: CreditReason,
    ) -> Option<PlatformCredit> {
        self.credits
            .read()
            .await
            .iter()
            .find(|c| c.source_booking_id == source_booking_id && c.reason == reason)
            .cloned()
    }

    /// Returns a user's unused credits, oldest first.
    pub async fn available_for_user(&self, user_id: UserId) -> Vec<PlatformCredit> {
        let mut credits: Vec<PlatformCredit> = self
            .credits
            .read()
            .await
            .iter()
            .filter(|c| c.user_id == user_id && c.is_available())
            .cloned()
            .collect();
        credits.sort_by_key(|c| c.created_at);
        credits
    }

    /// Sums a user's unused credit.
    pub async fn balance_for_user(&self, user_id: UserId) -> Cents {
        self.credits
            .read()
            .await
            .iter()
            .filter(|c| c.user_id == user_id && c.is_available())
            .fold(Cents::ZERO, |acc, c| acc + c.amount_cents)
    }

    /// Returns the credits consumed by the given booking.
    pub async fn consumed_by(&self, booking_id: BookingId) -> Vec<PlatformCredit> {
        self.credits
            .read()
            .await
            .iter()
            .filter(|c| c.consumed_by_booking_id == Some(booking_id))
            .cloned()
            .collect()
    }

    /// Marks a credit consumed by a booking. Returns the updated entry,
    /// or `None` when the credit is missing or already used.
    pub async fn mark_consumed(
        &self,
        credit_id: CreditId,
        consumer: BookingId,
        at: DateTime<Utc>,
    ) -> Option<PlatformCredit> {
        let mut credits = self.credits.write().await;
        let credit = credits
            .iter_mut()
            .find(|c| c.id == credit_id && c.is_available())?;
        credit.consumed_by_booking_id = Some(consumer);
        credit.used_at = Some(at);
        Some(credit.clone())
    }

    /// Marks every *unused* credit matching the idempotency key as used
    /// without a consumer, returning the revoked entries. Used credits
    /// are left untouched.
    pub async fn revoke_unused(
        &self,
        source_booking_id: BookingId,
        reason: CreditReason,
        at: DateTime<Utc>,
    ) -> Vec<PlatformCredit> {
        let mut credits = self.credits.write().await;
        let mut revoked = Vec::new();
        for credit in credits.iter_mut() {
            if credit.source_booking_id == source_booking_id
                && credit.reason == reason
                && credit.is_available()
            {
                credit.used_at = Some(at);
                revoked.push(credit.clone());
            }
        }
        revoked
    }

    /// Returns the number of ledger entries.
    pub async fn len(&self) -> usize {
        self.credits.read().await.len()
    }

    /// Returns `true` when the ledger is empty.
    pub async fn is_empty(&self) -> bool {
        self.credits.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn credit_of(user: UserId, booking: BookingId, cents: i64) -> PlatformCredit {
        PlatformCredit::issue(user, booking, Cents::new(cents), CreditReason::MilestoneS5)
    }

    #[tokio::test]
    async fn insert_and_find_by_key() {
        let ledger = CreditLedger::new();
        let user = UserId::new();
        let booking = BookingId::new();
        ledger.insert(credit_of(user, booking, 1_000)).await;

        let found = ledger
            .find_by_source_and_reason(booking, CreditReason::MilestoneS5)
            .await;
        assert!(found.is_some());

        let missing = ledger
            .find_by_source_and_reason(booking, CreditReason::MilestoneS11)
            .await;
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn balance_ignores_used_credits() {
        let ledger = CreditLedger::new();
        let user = UserId::new();
        let spent_booking = BookingId::new();

        ledger.insert(credit_of(user, BookingId::new(), 1_000)).await;
        let mut spent = credit_of(user, spent_booking, 2_000);
        spent.used_at = Some(Utc::now());
        ledger.insert(spent).await;

        assert_eq!(ledger.balance_for_user(user).await, Cents::new(1_000));
        assert_eq!(ledger.available_for_user(user).await.len(), 1);
    }

    #[tokio::test]
    async fn mark_consumed_sets_consumer_and_used_at() {
        let ledger = CreditLedger::new();
        let user = UserId::new();
        let credit = credit_of(user, BookingId::new(), 1_000);
        let credit_id = credit.id;
        ledger.insert(credit).await;

        let consumer = BookingId::new();
        let updated = ledger.mark_consumed(credit_id, consumer, Utc::now()).await;
        let Some(updated) = updated else {
            panic!("expected consumed credit");
        };
        assert_eq!(updated.consumed_by_booking_id, Some(consumer));
        assert!(updated.used_at.is_some());

        // A second consumption attempt finds nothing available.
        let again = ledger.mark_consumed(credit_id, consumer, Utc::now()).await;
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn revoke_skips_used_credits() {
        let ledger = CreditLedger::new();
        let user = UserId::new();
        let booking = BookingId::new();

        let mut spent = credit_of(user, booking, 1_000);
        spent.used_at = Some(Utc::now());
        spent.consumed_by_booking_id = Some(BookingId::new());
        ledger.insert(spent).await;

        let revoked = ledger
            .revoke_unused(booking, CreditReason::MilestoneS5, Utc::now())
            .await;
        assert!(revoked.is_empty());

        // The spent entry is untouched.
        let consumed = ledger.consumed_by(BookingId::new()).await;
        assert!(consumed.is_empty());
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn revoke_marks_unused_credit() {
        let ledger = CreditLedger::new();
        let user = UserId::new();
        let booking = BookingId::new();
        ledger.insert(credit_of(user, booking, 1_000)).await;

        let revoked = ledger
            .revoke_unused(booking, CreditReason::MilestoneS5, Utc::now())
            .await;
        let total = revoked
            .iter()
            .fold(Cents::ZERO, |acc, c| acc + c.amount_cents);
        assert_eq!(total, Cents::new(1_000));
        assert_eq!(ledger.balance_for_user(user).await, Cents::ZERO);
    }

    #[tokio::test]
    async fn available_is_oldest_first() {
        let ledger = CreditLedger::new();
        let user = UserId::new();
        let mut older = credit_of(user, BookingId::new(), 100);
        older.created_at = Utc::now() - chrono::Duration::days(2);
        let newer = credit_of(user, BookingId::new(), 200);
        // Insert newest first to prove ordering comes from timestamps.
        ledger.insert(newer).await;
        ledger.insert(older).await;

        let available = ledger.available_for_user(user).await;
        let amounts: Vec<i64> = available.iter().map(|c| c.amount_cents.get()).collect();
        assert_eq!(amounts, vec![100, 200]);
    }
}
