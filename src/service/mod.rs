//! Service layer: settlement orchestration.
//!
//! [`SettlementService`] drives processor calls for cancellations,
//! [`LedgerService`] is the single entry point for credit and event
//! writes, [`MilestoneService`] handles completed-lesson bonus credits,
//! and [`BookingService`] covers the booking lifecycle around them.

pub mod booking_service;
pub mod ledger_service;
pub mod milestone_service;
pub mod payment_state;
pub mod settlement_service;

pub use booking_service::BookingService;
pub use ledger_service::{IssuedCredit, LedgerService};
pub use milestone_service::MilestoneService;
pub use payment_state::{PaymentState, PaymentStateReader};
pub use settlement_service::{SettlementResult, SettlementService};
