//! Cancellation policy classifier.
//!
//! Pure decision logic: given the current time, the lesson start and who
//! is cancelling, picks one of the fixed policy outcomes. No I/O and no
//! state — everything downstream (processor calls, credit amounts) is
//! driven by the outcome returned here.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lead time at or above which a student cancellation is free of charge.
pub const FREE_CANCEL_HOURS: i64 = 24;

/// Lead time at or above which a student cancellation converts to a full
/// lesson-price credit instead of a 50/50 split.
pub const FULL_CREDIT_HOURS: i64 = 12;

/// Which party initiated the cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationRole {
    /// The student who booked the lesson.
    Student,
    /// The instructor delivering the lesson.
    Instructor,
}

/// The party requesting cancellation, as validated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Initiator {
    /// The cancelling user.
    pub user_id: super::UserId,
    /// Their role on the booking.
    pub role: CancellationRole,
}

/// A cancellation policy branch.
///
/// The string form ([`PolicyOutcome::as_str`]) is the `settlement_outcome`
/// tag written to the booking for reporting and audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyOutcome {
    /// Instructor cancelled: void or fully refund, zero credit, zero payout.
    InstructorFullRefund,
    /// Student cancelled with at least [`FREE_CANCEL_HOURS`] of lead time:
    /// the authorization is voided and nothing is ever charged.
    OutsideWindowNoCharge,
    /// Student cancelled between [`FULL_CREDIT_HOURS`] and
    /// [`FREE_CANCEL_HOURS`]: capture, reverse the instructor transfer,
    /// credit the full lesson price back as platform credit.
    FullLessonCredit,
    /// Student cancelled with under [`FULL_CREDIT_HOURS`] of lead time:
    /// capture, reverse the transfer, split between a student credit and a
    /// manual instructor payout.
    FiftyFiftySplit,
}

impl PolicyOutcome {
    /// Returns the stable `settlement_outcome` tag for this branch.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InstructorFullRefund => "instructor_cancel_full_refund",
            Self::OutsideWindowNoCharge => "student_cancel_gt24_no_charge",
            Self::FullLessonCredit => "student_cancel_12_24_full_credit",
            Self::FiftyFiftySplit => "student_cancel_lt12_split_50_50",
        }
    }
}

/// Classifies a cancellation into a [`PolicyOutcome`].
///
/// Instructor cancellations always resolve to a full refund regardless of
/// lead time. Student cancellations bucket by time to lesson start:
/// a lead of exactly 24h belongs to the no-charge bucket and a lead of
/// exactly 12h belongs to the full-credit bucket. A lesson already started
/// classifies as the under-12h split.
#[must_use]
pub fn classify(
    now: DateTime<Utc>,
    lesson_start: DateTime<Utc>,
    role: CancellationRole,
) -> PolicyOutcome {
    if role == CancellationRole::Instructor {
        return PolicyOutcome::InstructorFullRefund;
    }

    let lead = lesson_start.signed_duration_since(now);
    if lead >= Duration::hours(FREE_CANCEL_HOURS) {
        PolicyOutcome::OutsideWindowNoCharge
    } else if lead >= Duration::hours(FULL_CREDIT_HOURS) {
        PolicyOutcome::FullLessonCredit
    } else {
        PolicyOutcome::FiftyFiftySplit
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn at_hours_before(hours: i64, minutes: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        let start = now + Duration::hours(hours) + Duration::minutes(minutes);
        (now, start)
    }

    #[test]
    fn instructor_cancel_any_time_is_full_refund() {
        for (h, m) in [(100, 0), (18, 0), (3, 0), (0, 5)] {
            let (now, start) = at_hours_before(h, m);
            assert_eq!(
                classify(now, start, CancellationRole::Instructor),
                PolicyOutcome::InstructorFullRefund
            );
        }
    }

    #[test]
    fn boundary_beyond_24h_is_no_charge() {
        let (now, start) = at_hours_before(24, 1);
        assert_eq!(
            classify(now, start, CancellationRole::Student),
            PolicyOutcome::OutsideWindowNoCharge
        );
    }

    #[test]
    fn boundary_exactly_24h_is_no_charge() {
        let (now, start) = at_hours_before(24, 0);
        assert_eq!(
            classify(now, start, CancellationRole::Student),
            PolicyOutcome::OutsideWindowNoCharge
        );
    }

    #[test]
    fn boundary_within_24h_is_full_credit() {
        let (now, start) = at_hours_before(23, 59);
        assert_eq!(
            classify(now, start, CancellationRole::Student),
            PolicyOutcome::FullLessonCredit
        );
    }

    #[test]
    fn eighteen_hours_is_full_credit() {
        let (now, start) = at_hours_before(18, 0);
        assert_eq!(
            classify(now, start, CancellationRole::Student),
            PolicyOutcome::FullLessonCredit
        );
    }

    #[test]
    fn boundary_exactly_12h_is_full_credit() {
        let (now, start) = at_hours_before(12, 0);
        assert_eq!(
            classify(now, start, CancellationRole::Student),
            PolicyOutcome::FullLessonCredit
        );
    }

    #[test]
    fn under_12h_is_split() {
        let (now, start) = at_hours_before(11, 59);
        assert_eq!(
            classify(now, start, CancellationRole::Student),
            PolicyOutcome::FiftyFiftySplit
        );

        let (now, start) = at_hours_before(3, 0);
        assert_eq!(
            classify(now, start, CancellationRole::Student),
            PolicyOutcome::FiftyFiftySplit
        );
    }

    #[test]
    fn lesson_already_started_is_split() {
        let now = Utc::now();
        let start = now - Duration::minutes(10);
        assert_eq!(
            classify(now, start, CancellationRole::Student),
            PolicyOutcome::FiftyFiftySplit
        );
    }

    #[test]
    fn outcome_tags_are_stable() {
        assert_eq!(
            PolicyOutcome::InstructorFullRefund.as_str(),
            "instructor_cancel_full_refund"
        );
        assert_eq!(
            PolicyOutcome::OutsideWindowNoCharge.as_str(),
            "student_cancel_gt24_no_charge"
        );
        assert_eq!(
            PolicyOutcome::FullLessonCredit.as_str(),
            "student_cancel_12_24_full_credit"
        );
        assert_eq!(
            PolicyOutcome::FiftyFiftySplit.as_str(),
            "student_cancel_lt12_split_50_50"
        );
    }
}
