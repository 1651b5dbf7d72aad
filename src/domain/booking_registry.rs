//! Concurrent booking storage with per-booking fine-grained locking.
//!
//! [`BookingRegistry`] stores active bookings in a `HashMap` where each
//! entry is individually protected by a [`tokio::sync::RwLock`]. A
//! settlement takes the per-booking write lock before classification and
//! holds it through the final state write, so two concurrent cancellation
//! requests for the same booking serialize and cannot double-call the
//! processor.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::booking::{Booking, BookingStatus, BookingSummary};
use super::{BookingId, UserId};
use crate::error::SettlementError;

/// Central store for active bookings.
///
/// Uses a `RwLock<HashMap<...>>` for the outer map and per-entry
/// `Arc<RwLock<Booking>>` for fine-grained per-booking locking.
///
/// # Concurrency
///
/// - Multiple tasks may read the same booking concurrently.
/// - Mutations of different bookings are concurrent.
/// - Mutations of the same booking are serialized.
#[derive(Debug)]
pub struct BookingRegistry {
    bookings: RwLock<HashMap<BookingId, Arc<RwLock<Booking>>>>,
}

impl BookingRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bookings: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a new booking into the registry.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidRequest`] if a booking with the
    /// same id already exists (should never happen with UUID v4).
    pub async fn insert(&self, booking: Booking) -> Result<BookingId, SettlementError> {
        let booking_id = booking.id;
        let mut map = self.bookings.write().await;
        if map.contains_key(&booking_id) {
            return Err(SettlementError::InvalidRequest(format!(
                "booking {booking_id} already exists"
            )));
        }
        map.insert(booking_id, Arc::new(RwLock::new(booking)));
        Ok(booking_id)
    }

    /// Returns a shared reference to the booking behind its per-entry lock.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::BookingNotFound`] if no booking with the
    /// given id exists.
    pub async fn get(
        &self,
        booking_id: BookingId,
    ) -> Result<Arc<RwLock<Booking>>, SettlementError> {
        let map = self.bookings.read().await;
        map.get(&booking_id)
            .cloned()
            .ok_or(SettlementError::BookingNotFound(*booking_id.as_uuid()))
    }

    /// Counts COMPLETED bookings for a student. Drives the milestone
    /// credit thresholds.
    pub async fn count_completed_for_student(&self, student_id: UserId) -> u64 {
        let map = self.bookings.read().await;
        let mut count = 0;
        for entry_lock in map.values() {
            let booking = entry_lock.read().await;
            if booking.student_id == student_id && booking.status == BookingStatus::Completed {
                count += 1;
            }
        }
        count
    }

    /// Returns summaries of all bookings, optionally filtered by status.
    pub async fn list(&self, status_filter: Option<BookingStatus>) -> Vec<BookingSummary> {
        let map = self.bookings.read().await;
        let mut summaries = Vec::with_capacity(map.len());
        for entry_lock in map.values() {
            let booking = entry_lock.read().await;
            if let Some(filter) = status_filter
                && booking.status != filter
            {
                continue;
            }
            summaries.push(BookingSummary::from(&*booking));
        }
        summaries
    }

    /// Returns the number of bookings in the registry.
    pub async fn len(&self) -> usize {
        self.bookings.read().await.len()
    }

    /// Returns `true` if the registry contains no bookings.
    pub async fn is_empty(&self) -> bool {
        self.bookings.read().await.is_empty()
    }
}

impl Default for BookingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::booking::NewBooking;
    use crate::domain::money::Cents;
    use chrono::{Duration, NaiveTime, Utc};

    fn make_booking() -> Booking {
        let start = Utc::now() + Duration::hours(48);
        let Some(start_time) = NaiveTime::from_hms_opt(9, 0, 0) else {
            panic!("valid time");
        };
        let Some(end_time) = NaiveTime::from_hms_opt(10, 0, 0) else {
            panic!("valid time");
        };
        let Ok(booking) = Booking::create(NewBooking {
            student_id: UserId::new(),
            instructor_id: UserId::new(),
            instructor_service_id: uuid::Uuid::new_v4(),
            booking_date: start.date_naive(),
            start_time,
            end_time,
            timezone: "UTC".to_string(),
            lesson_start_utc: start,
            lesson_end_utc: start + Duration::hours(1),
            hourly_rate: Cents::new(10_000),
            total_price: Cents::new(10_000),
        }) else {
            panic!("booking creation failed");
        };
        booking
    }

    #[tokio::test]
    async fn insert_and_get() {
        let registry = BookingRegistry::new();
        let booking = make_booking();
        let id = booking.id;

        let result = registry.insert(booking).await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap_or_default(), id);

        let fetched = registry.get(id).await;
        assert!(fetched.is_ok());
    }

    #[tokio::test]
    async fn get_nonexistent_returns_error() {
        let registry = BookingRegistry::new();
        let result = registry.get(BookingId::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let registry = BookingRegistry::new();
        let booking = make_booking();
        let copy = booking.clone();

        let _ = registry.insert(booking).await;
        let result = registry.insert(copy).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn count_completed_filters_by_student_and_status() {
        let registry = BookingRegistry::new();
        let mut first = make_booking();
        let student = first.student_id;
        first.status = BookingStatus::Completed;

        let mut second = make_booking();
        second.student_id = student;

        let other = make_booking();

        let _ = registry.insert(first).await;
        let _ = registry.insert(second).await;
        let _ = registry.insert(other).await;

        assert_eq!(registry.count_completed_for_student(student).await, 1);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let registry = BookingRegistry::new();
        let mut completed = make_booking();
        completed.status = BookingStatus::Completed;
        let _ = registry.insert(completed).await;
        let _ = registry.insert(make_booking()).await;

        let matched = registry.list(Some(BookingStatus::Completed)).await;
        assert_eq!(matched.len(), 1);

        let all = registry.list(None).await;
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn len_and_is_empty() {
        let registry = BookingRegistry::new();
        assert!(registry.is_empty().await);
        assert_eq!(registry.len().await, 0);

        let _ = registry.insert(make_booking()).await;
        assert!(!registry.is_empty().await);
        assert_eq!(registry.len().await, 1);
    }
}
