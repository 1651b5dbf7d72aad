//! Shared test fixtures: a scriptable mock processor and booking
//! builders. Compiled only for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, NaiveTime, Utc};

use crate::domain::booking::{Booking, BookingStatus, NewBooking, PaymentStatus};
use crate::domain::policy::{CancellationRole, Initiator};
use crate::domain::{
    AccountsDirectory, BookingId, BookingRegistry, Cents, ConnectedAccount, CreditLedger,
    CustomerRecord, EventBus,
};
use crate::processor::{
    CaptureOutcome, PaymentProcessor, ProcessorError, RefundOutcome, TransferHandle,
};
use crate::service::booking_service::BookingService;
use crate::service::ledger_service::LedgerService;
use crate::service::milestone_service::MilestoneService;
use crate::service::settlement_service::SettlementService;

/// Which mock operation a call count refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCall {
    /// Capture calls.
    Capture,
    /// Transfer reversal calls.
    Reverse,
    /// Refund calls.
    Refund,
    /// Authorization void calls.
    Cancel,
    /// Manual transfer calls.
    Transfer,
}

/// Scriptable in-memory processor double. Records every call and fails
/// on demand so tests can assert call counts, arguments and parking
/// behavior.
#[derive(Debug)]
pub struct MockProcessor {
    amount_received_cents: i64,
    transfer_amount_cents: i64,
    captures: Mutex<Vec<String>>,
    reversals: Mutex<Vec<(String, Cents)>>,
    refunds: Mutex<Vec<(String, bool, bool, Option<Cents>)>>,
    cancels: Mutex<Vec<String>>,
    transfers: Mutex<Vec<(String, Cents)>>,
    fail_capture: AtomicBool,
    fail_reverse: AtomicBool,
    fail_refund: AtomicBool,
    fail_cancel: AtomicBool,
    fail_transfer: AtomicBool,
    manual_counter: AtomicU64,
}

impl MockProcessor {
    /// A processor reporting the given capture amounts.
    pub fn reporting(amount_received_cents: i64, transfer_amount_cents: i64) -> Self {
        Self {
            amount_received_cents,
            transfer_amount_cents,
            captures: Mutex::new(Vec::new()),
            reversals: Mutex::new(Vec::new()),
            refunds: Mutex::new(Vec::new()),
            cancels: Mutex::new(Vec::new()),
            transfers: Mutex::new(Vec::new()),
            fail_capture: AtomicBool::new(false),
            fail_reverse: AtomicBool::new(false),
            fail_refund: AtomicBool::new(false),
            fail_cancel: AtomicBool::new(false),
            fail_transfer: AtomicBool::new(false),
            manual_counter: AtomicU64::new(0),
        }
    }

    /// Makes the next capture calls fail.
    pub fn fail_capture(&self) {
        self.fail_capture.store(true, Ordering::SeqCst);
    }

    /// Makes the next reversal calls fail.
    pub fn fail_reverse(&self) {
        self.fail_reverse.store(true, Ordering::SeqCst);
    }

    /// Makes the next refund calls fail.
    pub fn fail_refund(&self) {
        self.fail_refund.store(true, Ordering::SeqCst);
    }

    /// Makes the next void calls fail.
    pub fn fail_cancel(&self) {
        self.fail_cancel.store(true, Ordering::SeqCst);
    }

    /// Makes the next manual transfer calls fail.
    pub fn fail_transfer(&self) {
        self.fail_transfer.store(true, Ordering::SeqCst);
    }

    /// Clears all scripted failures.
    pub fn clear_failures(&self) {
        self.fail_capture.store(false, Ordering::SeqCst);
        self.fail_reverse.store(false, Ordering::SeqCst);
        self.fail_refund.store(false, Ordering::SeqCst);
        self.fail_cancel.store(false, Ordering::SeqCst);
        self.fail_transfer.store(false, Ordering::SeqCst);
    }

    /// Number of calls of the given kind.
    pub fn count(&self, call: MockCall) -> usize {
        match call {
            MockCall::Capture => self.captures.lock().map(|v| v.len()).unwrap_or(0),
            MockCall::Reverse => self.reversals.lock().map(|v| v.len()).unwrap_or(0),
            MockCall::Refund => self.refunds.lock().map(|v| v.len()).unwrap_or(0),
            MockCall::Cancel => self.cancels.lock().map(|v| v.len()).unwrap_or(0),
            MockCall::Transfer => self.transfers.lock().map(|v| v.len()).unwrap_or(0),
        }
    }

    /// Total calls across all operations.
    pub fn calls_total(&self) -> usize {
        [
            MockCall::Capture,
            MockCall::Reverse,
            MockCall::Refund,
            MockCall::Cancel,
            MockCall::Transfer,
        ]
        .into_iter()
        .map(|c| self.count(c))
        .sum()
    }

    /// Recorded reversal calls: (transfer id, amount).
    pub fn reverse_calls(&self) -> Vec<(String, Cents)> {
        self.reversals.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Recorded refund calls: (intent, reverse_transfer,
    /// refund_application_fee, amount).
    pub fn refund_calls(&self) -> Vec<(String, bool, bool, Option<Cents>)> {
        self.refunds.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Recorded manual transfer calls: (destination, amount).
    pub fn transfer_calls(&self) -> Vec<(String, Cents)> {
        self.transfers.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn push<T>(target: &Mutex<Vec<T>>, value: T) {
        if let Ok(mut guard) = target.lock() {
            guard.push(value);
        }
    }
}

impl PaymentProcessor for MockProcessor {
    async fn capture_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<CaptureOutcome, ProcessorError> {
        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(ProcessorError::Declined {
                code: "card_declined".to_string(),
                message: "insufficient funds".to_string(),
            });
        }
        Self::push(&self.captures, payment_intent_id.to_string());
        Ok(CaptureOutcome {
            transfer_id: format!("tr_{payment_intent_id}"),
            amount_received_cents: Cents::new(self.amount_received_cents),
            transfer_amount_cents: Cents::new(self.transfer_amount_cents),
        })
    }

    async fn reverse_transfer(
        &self,
        transfer_id: &str,
        amount_cents: Cents,
    ) -> Result<(), ProcessorError> {
        Self::push(&self.reversals, (transfer_id.to_string(), amount_cents));
        if self.fail_reverse.load(Ordering::SeqCst) {
            return Err(ProcessorError::Unavailable("timeout".to_string()));
        }
        Ok(())
    }

    async fn refund_payment(
        &self,
        payment_intent_id: &str,
        reverse_transfer: bool,
        refund_application_fee: bool,
        amount_cents: Option<Cents>,
    ) -> Result<RefundOutcome, ProcessorError> {
        if self.fail_refund.load(Ordering::SeqCst) {
            return Err(ProcessorError::Unavailable("timeout".to_string()));
        }
        Self::push(
            &self.refunds,
            (
                payment_intent_id.to_string(),
                reverse_transfer,
                refund_application_fee,
                amount_cents,
            ),
        );
        Ok(RefundOutcome {
            refund_id: format!("re_{payment_intent_id}"),
            amount_cents: amount_cents.unwrap_or(Cents::new(self.amount_received_cents)),
        })
    }

    async fn cancel_payment_intent(&self, payment_intent_id: &str) -> Result<(), ProcessorError> {
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(ProcessorError::InvalidState(
                "intent not cancellable".to_string(),
            ));
        }
        Self::push(&self.cancels, payment_intent_id.to_string());
        Ok(())
    }

    async fn create_manual_transfer(
        &self,
        destination_account_id: &str,
        amount_cents: Cents,
    ) -> Result<TransferHandle, ProcessorError> {
        if self.fail_transfer.load(Ordering::SeqCst) {
            return Err(ProcessorError::Unavailable("timeout".to_string()));
        }
        Self::push(
            &self.transfers,
            (destination_account_id.to_string(), amount_cents),
        );
        let n = self.manual_counter.fetch_add(1, Ordering::SeqCst);
        Ok(TransferHandle {
            transfer_id: format!("tr_manual_{n}"),
        })
    }
}

/// Builds a booking draft `hours_out` hours from now.
pub fn new_booking_draft(hours_out: i64, hourly_rate: i64, minutes: i64) -> NewBooking {
    let start = Utc::now() + Duration::hours(hours_out);
    let Some(start_time) = NaiveTime::from_hms_opt(9, 0, 0) else {
        panic!("valid time");
    };
    let Some(end_time) = NaiveTime::from_hms_opt(11, 0, 0) else {
        panic!("valid time");
    };
    NewBooking {
        student_id: crate::domain::UserId::new(),
        instructor_id: crate::domain::UserId::new(),
        instructor_service_id: uuid::Uuid::new_v4(),
        booking_date: start.date_naive(),
        start_time,
        end_time,
        timezone: "America/New_York".to_string(),
        lesson_start_utc: start,
        lesson_end_utc: start + Duration::minutes(minutes),
        hourly_rate: Cents::new(hourly_rate),
        total_price: Cents::new(hourly_rate * minutes / 60),
    }
}

/// A $100/hr one-hour booking draft.
pub fn pending_booking_draft(hours_out: i64) -> NewBooking {
    new_booking_draft(hours_out, 10_000, 60)
}

/// A CONFIRMED booking with an authorized payment intent on file.
pub fn authorized_booking(hours_out: i64, hourly_rate: i64, minutes: i64) -> Booking {
    let Ok(mut booking) = Booking::create(new_booking_draft(hours_out, hourly_rate, minutes))
    else {
        panic!("booking creation failed");
    };
    booking.status = BookingStatus::Confirmed;
    booking.payment_status = PaymentStatus::Authorized;
    booking.payment_intent_id = Some("pi_test".to_string());
    booking.payment_method_id = Some("pm_test".to_string());
    booking
}

/// The booking's student as a cancellation initiator.
pub fn student_initiator(booking: &Booking) -> Initiator {
    Initiator {
        user_id: booking.student_id,
        role: CancellationRole::Student,
    }
}

/// Fully wired in-memory engine over the mock processor.
#[derive(Debug)]
pub struct TestEngine {
    /// Booking store.
    pub registry: Arc<BookingRegistry>,
    /// Account directory.
    pub accounts: Arc<AccountsDirectory>,
    /// Ledger writer.
    pub ledger: Arc<LedgerService>,
    /// The mock processor.
    pub processor: Arc<MockProcessor>,
    /// Settlement executor under test.
    pub settlement: SettlementService<MockProcessor>,
    /// Milestone side-system.
    pub milestones: Arc<MilestoneService>,
    /// Booking lifecycle service.
    pub bookings: BookingService,
}

impl TestEngine {
    /// Wires all services over in-memory stores and the given processor.
    pub async fn new(processor: MockProcessor) -> Self {
        init_tracing();
        let registry = Arc::new(BookingRegistry::new());
        let accounts = Arc::new(AccountsDirectory::new());
        let ledger = Arc::new(LedgerService::new(
            Arc::new(CreditLedger::new()),
            EventBus::new(1_000),
            None,
            true,
        ));
        let processor = Arc::new(processor);
        let settlement = SettlementService::new(
            Arc::clone(&registry),
            Arc::clone(&accounts),
            Arc::clone(&ledger),
            Arc::clone(&processor),
        );
        let milestones = Arc::new(MilestoneService::new(
            Arc::clone(&registry),
            Arc::clone(&ledger),
        ));
        let bookings = BookingService::new(
            Arc::clone(&registry),
            Arc::clone(&accounts),
            Arc::clone(&ledger),
            Arc::clone(&milestones),
        );
        Self {
            registry,
            accounts,
            ledger,
            processor,
            settlement,
            milestones,
            bookings,
        }
    }

    /// Registers a booking plus the processor accounts settlement needs.
    pub async fn register(&self, booking: Booking) -> BookingId {
        self.accounts
            .put_connected_account(ConnectedAccount {
                user_id: booking.instructor_id,
                account_id: "acct_test".to_string(),
            })
            .await;
        self.accounts
            .put_customer(CustomerRecord {
                user_id: booking.student_id,
                customer_id: "cus_test".to_string(),
            })
            .await;
        let id = booking.id;
        let Ok(inserted) = self.registry.insert(booking).await else {
            panic!("booking insert failed");
        };
        assert_eq!(inserted, id);
        id
    }

    /// Reads a booking snapshot out of the registry.
    pub async fn booking(&self, booking_id: BookingId) -> Booking {
        let Ok(entry) = self.registry.get(booking_id).await else {
            panic!("booking missing");
        };
        let booking = entry.read().await;
        booking.clone()
    }
}

/// Installs a test subscriber once so `RUST_LOG` controls test output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
