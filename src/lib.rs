//! # instru-settlement
//!
//! Booking cancellation settlement and platform credit ledger for the
//! InstaInstru tutoring marketplace.
//!
//! Given a booking's time-to-lesson and who initiated cancellation, the
//! engine decides how to split money among refund-to-card, platform
//! credit, and instructor payout, and drives the payment-processor calls
//! (capture, reverse transfer, refund, manual transfer) accordingly. All
//! processor mechanics live behind the [`processor::PaymentProcessor`]
//! port — this crate is a coordination layer.
//!
//! ## Architecture
//!
//! ```text
//! Booking-management service (caller)
//!     │
//!     ├── SettlementEngine (engine.rs)
//!     │
//!     ├── SettlementService / BookingService / MilestoneService (service/)
//!     ├── LedgerService + EventBus (service/, domain/)
//!     │
//!     ├── BookingRegistry, CreditLedger, policy classifier (domain/)
//!     ├── PaymentProcessor port (processor/)
//!     │
//!     └── PostgreSQL persistence (optional, persistence/)
//! ```

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod processor;
pub mod service;

#[cfg(test)]
#[allow(clippy::panic, missing_docs)]
pub(crate) mod test_support;
