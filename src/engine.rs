//! Engine wiring: constructs and holds the shared components.
//!
//! The surrounding booking-management service builds one
//! [`SettlementEngine`] at startup and calls into its services. All
//! components are explicitly constructed and injected here — no module
//! globals, no singletons.

use std::sync::Arc;

use crate::config::SettlementConfig;
use crate::domain::{AccountsDirectory, BookingRegistry, CreditLedger, EventBus};
use crate::persistence::PostgresPersistence;
use crate::processor::PaymentProcessor;
use crate::service::{BookingService, LedgerService, MilestoneService, SettlementService};

/// Shared engine state: stores plus the services wired over them.
#[derive(Debug)]
pub struct SettlementEngine<P> {
    /// Booking store.
    pub registry: Arc<BookingRegistry>,
    /// Processor account directory.
    pub accounts: Arc<AccountsDirectory>,
    /// Event bus carrying the settlement audit stream.
    pub event_bus: EventBus,
    /// Ledger writer for credits and payment events.
    pub ledger: Arc<LedgerService>,
    /// Cancellation settlement executor.
    pub settlement: Arc<SettlementService<P>>,
    /// Milestone credit side-system.
    pub milestones: Arc<MilestoneService>,
    /// Booking lifecycle service.
    pub bookings: Arc<BookingService>,
}

impl<P: PaymentProcessor> SettlementEngine<P> {
    /// Wires the engine over the given processor, with an optional
    /// persistence layer per the configuration toggles.
    #[must_use]
    pub fn new(
        config: &SettlementConfig,
        processor: Arc<P>,
        persistence: Option<Arc<PostgresPersistence>>,
    ) -> Self {
        let registry = Arc::new(BookingRegistry::new());
        let accounts = Arc::new(AccountsDirectory::new());
        let event_bus = EventBus::new(config.event_bus_capacity);

        let ledger = Arc::new(LedgerService::new(
            Arc::new(CreditLedger::new()),
            event_bus.clone(),
            if config.persistence_enabled {
                persistence
            } else {
                None
            },
            config.event_log_enabled,
        ));

        let settlement = Arc::new(SettlementService::new(
            Arc::clone(&registry),
            Arc::clone(&accounts),
            Arc::clone(&ledger),
            processor,
        ));
        let milestones = Arc::new(MilestoneService::new(
            Arc::clone(&registry),
            Arc::clone(&ledger),
        ));
        let bookings = Arc::new(BookingService::new(
            Arc::clone(&registry),
            Arc::clone(&accounts),
            Arc::clone(&ledger),
            Arc::clone(&milestones),
        ));

        Self {
            registry,
            accounts,
            event_bus,
            ledger,
            settlement,
            milestones,
            bookings,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{CancellationRole, ConnectedAccount, Initiator};
    use crate::test_support::{authorized_booking, MockProcessor};

    #[tokio::test]
    async fn engine_wires_services_over_shared_stores() {
        let config = SettlementConfig::in_memory();
        let engine = SettlementEngine::new(
            &config,
            Arc::new(MockProcessor::reporting(10_000, 8_800)),
            None,
        );

        let booking = authorized_booking(30, 10_000, 60);
        let student = booking.student_id;
        engine
            .accounts
            .put_connected_account(ConnectedAccount {
                user_id: booking.instructor_id,
                account_id: "acct_1".to_string(),
            })
            .await;
        let inserted = engine.registry.insert(booking).await;
        let Ok(booking_id) = inserted else {
            panic!("insert failed");
        };

        let mut rx = engine.event_bus.subscribe();
        let result = engine
            .settlement
            .settle(
                booking_id,
                Initiator {
                    user_id: student,
                    role: CancellationRole::Student,
                },
            )
            .await;
        assert!(result.is_ok());

        // The settlement's audit event arrived on the shared bus.
        let event = rx.recv().await;
        let Ok(event) = event else {
            panic!("expected bus event");
        };
        assert_eq!(event.event_type_str(), "authorization_voided_cancel");
    }
}
