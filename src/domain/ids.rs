//! Type-safe identifiers for the settlement domain.
//!
//! Newtype wrappers around [`uuid::Uuid`] (v4) so that booking, user and
//! credit identifiers cannot be confused with each other or with raw UUIDs.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Creates an identifier from an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a booking.
    ///
    /// Generated once at booking creation time and immutable thereafter.
    /// Used as the key in [`super::BookingRegistry`], as the
    /// `source_booking_id` of platform credits, and as the event
    /// discriminator in the payment-event log.
    BookingId
}

uuid_id! {
    /// Unique identifier for a platform user (student or instructor).
    UserId
}

uuid_id! {
    /// Unique identifier for a platform credit ledger entry.
    CreditId
}
