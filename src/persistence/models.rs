//! Database models for the payment-event log, credits and snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored event row from the append-only `payment_events` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPaymentEvent {
    /// Auto-increment row ID.
    pub id: i64,
    /// Booking that generated the event.
    pub booking_id: Uuid,
    /// Event type discriminator (e.g. `"captured_last_minute_cancel"`).
    pub event_type: String,
    /// JSONB payload echoing amounts and processor ids.
    pub payload: serde_json::Value,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A platform credit row from the `platform_credits` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditRow {
    /// Ledger entry id.
    pub id: Uuid,
    /// Credit owner.
    pub user_id: Uuid,
    /// Credit amount in cents.
    pub amount_cents: i64,
    /// Reason tag (e.g. `"milestone_s5"`).
    pub reason: String,
    /// Booking that produced the credit.
    pub source_booking_id: Uuid,
    /// Booking the credit was spent on, when consumed.
    pub consumed_by_booking_id: Option<Uuid>,
    /// Issue timestamp.
    pub created_at: DateTime<Utc>,
    /// Consumption or revocation timestamp.
    pub used_at: Option<DateTime<Utc>>,
}

/// A booking snapshot row from the `booking_snapshots` table.
///
/// Written after each settlement so reporting can read final amounts
/// without touching the live registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSnapshotRow {
    /// Auto-increment row ID.
    pub id: i64,
    /// Booking that was snapshotted.
    pub booking_id: Uuid,
    /// Full booking state as JSONB.
    pub state_json: serde_json::Value,
    /// Snapshot timestamp.
    pub snapshot_at: DateTime<Utc>,
}
