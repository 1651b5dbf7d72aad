//! Domain layer: core settlement types and in-memory aggregate stores.
//!
//! This module contains the booking aggregate and its registry, the
//! cancellation policy classifier, money and identifier newtypes, the
//! platform credit ledger, processor account mappings, and the settlement
//! event types with their broadcast bus.

pub mod accounts;
pub mod booking;
pub mod booking_registry;
pub mod credit;
pub mod event_bus;
pub mod ids;
pub mod money;
pub mod policy;
pub mod settlement_event;

pub use accounts::{AccountsDirectory, ConnectedAccount, CustomerRecord};
pub use booking::{Booking, BookingStatus, BookingSummary, NewBooking, PaymentStatus};
pub use booking_registry::BookingRegistry;
pub use credit::{CreditLedger, CreditReason, PlatformCredit};
pub use event_bus::EventBus;
pub use ids::{BookingId, CreditId, UserId};
pub use money::Cents;
pub use policy::{CancellationRole, Initiator, PolicyOutcome};
pub use settlement_event::SettlementEvent;
