//! Persistence layer: PostgreSQL payment-event log, credit rows and
//! booking snapshots.
//!
//! Durability is optional — the engine runs fully in memory when
//! persistence is disabled. The concrete implementation uses
//! `sqlx::PgPool` for async PostgreSQL access; schema lives under
//! `migrations/`.

pub mod models;
pub mod postgres;

pub use models::{BookingSnapshotRow, CreditRow, StoredPaymentEvent};
pub use postgres::PostgresPersistence;
