//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::models::{BookingSnapshotRow, CreditRow, StoredPaymentEvent};
use crate::config::SettlementConfig;
use crate::domain::PlatformCredit;
use crate::error::SettlementError;

/// PostgreSQL-backed persistence layer using `sqlx::PgPool`.
///
/// The payment-event log is append-only: this type intentionally exposes
/// no update or delete for `payment_events` rows.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool according to the engine configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::Persistence`] when the pool cannot be
    /// established.
    pub async fn connect(config: &SettlementConfig) -> Result<Self, SettlementError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| SettlementError::Persistence(e.to_string()))?;

        Ok(Self::new(pool))
    }

    /// Appends an event to the payment-event log.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::Persistence`] on database failure.
    pub async fn save_payment_event(
        &self,
        booking_id: Uuid,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<i64, SettlementError> {
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO payment_events (booking_id, event_type, payload) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(booking_id)
        .bind(event_type)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SettlementError::Persistence(e.to_string()))?;

        Ok(row)
    }

    /// Loads the event trail for a booking, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::Persistence`] on database failure.
    pub async fn load_events_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<StoredPaymentEvent>, SettlementError> {
        let rows = sqlx::query_as::<_, (i64, Uuid, String, serde_json::Value, DateTime<Utc>)>(
            "SELECT id, booking_id, event_type, payload, created_at FROM payment_events \
             WHERE booking_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SettlementError::Persistence(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(
                |(id, booking_id, event_type, payload, created_at)| StoredPaymentEvent {
                    id,
                    booking_id,
                    event_type,
                    payload,
                    created_at,
                },
            )
            .collect())
    }

    /// Inserts a platform credit row. The `(source_booking_id, reason)`
    /// unique index makes a duplicate insert a no-op, backing up the
    /// ledger writer's existence check.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::Persistence`] on database failure.
    pub async fn save_credit(&self, credit: &PlatformCredit) -> Result<(), SettlementError> {
        sqlx::query(
            "INSERT INTO platform_credits \
             (id, user_id, amount_cents, reason, source_booking_id, consumed_by_booking_id, created_at, used_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (source_booking_id, reason) DO NOTHING",
        )
        .bind(credit.id.as_uuid())
        .bind(credit.user_id.as_uuid())
        .bind(credit.amount_cents.get())
        .bind(credit.reason.as_str())
        .bind(credit.source_booking_id.as_uuid())
        .bind(credit.consumed_by_booking_id.map(|id| *id.as_uuid()))
        .bind(credit.created_at)
        .bind(credit.used_at)
        .execute(&self.pool)
        .await
        .map_err(|e| SettlementError::Persistence(e.to_string()))?;

        Ok(())
    }

    /// Marks a credit row used, optionally recording the consuming booking.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::Persistence`] on database failure.
    pub async fn mark_credit_used(
        &self,
        credit_id: Uuid,
        used_at: DateTime<Utc>,
        consumed_by_booking_id: Option<Uuid>,
    ) -> Result<u64, SettlementError> {
        let result = sqlx::query(
            "UPDATE platform_credits SET used_at = $2, consumed_by_booking_id = $3 \
             WHERE id = $1 AND used_at IS NULL",
        )
        .bind(credit_id)
        .bind(used_at)
        .bind(consumed_by_booking_id)
        .execute(&self.pool)
        .await
        .map_err(|e| SettlementError::Persistence(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Loads all credit rows for a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::Persistence`] on database failure.
    pub async fn load_credits_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<CreditRow>, SettlementError> {
        let rows = sqlx::query_as::<
            _,
            (
                Uuid,
                Uuid,
                i64,
                String,
                Uuid,
                Option<Uuid>,
                DateTime<Utc>,
                Option<DateTime<Utc>>,
            ),
        >(
            "SELECT id, user_id, amount_cents, reason, source_booking_id, \
             consumed_by_booking_id, created_at, used_at \
             FROM platform_credits WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SettlementError::Persistence(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    id,
                    user_id,
                    amount_cents,
                    reason,
                    source_booking_id,
                    consumed_by_booking_id,
                    created_at,
                    used_at,
                )| CreditRow {
                    id,
                    user_id,
                    amount_cents,
                    reason,
                    source_booking_id,
                    consumed_by_booking_id,
                    created_at,
                    used_at,
                },
            )
            .collect())
    }

    /// Saves a post-settlement booking snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::Persistence`] on database failure.
    pub async fn save_booking_snapshot(
        &self,
        booking_id: Uuid,
        state_json: &serde_json::Value,
    ) -> Result<i64, SettlementError> {
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO booking_snapshots (booking_id, state_json) \
             VALUES ($1, $2) RETURNING id",
        )
        .bind(booking_id)
        .bind(state_json)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SettlementError::Persistence(e.to_string()))?;

        Ok(row)
    }

    /// Loads the latest snapshot for each booking using `DISTINCT ON`.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::Persistence`] on database failure.
    pub async fn load_latest_snapshots(&self) -> Result<Vec<BookingSnapshotRow>, SettlementError> {
        let rows = sqlx::query_as::<_, (i64, Uuid, serde_json::Value, DateTime<Utc>)>(
            "SELECT DISTINCT ON (booking_id) id, booking_id, state_json, snapshot_at \
             FROM booking_snapshots ORDER BY booking_id, snapshot_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SettlementError::Persistence(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(id, booking_id, state_json, snapshot_at)| BookingSnapshotRow {
                id,
                booking_id,
                state_json,
                snapshot_at,
            })
            .collect())
    }
}
