//! Typed ids so a slot id can never be passed where a booking id is expected.
//!
//! Each wraps a UUID, is stored in a native `UUID` column and serialises as
//! the plain hyphenated string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! typed_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// A fresh random (v4) id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

typed_id!(UserId, "Member id.");
typed_id!(SessionId, "Login session id. Also the first half of the session cookie.");
typed_id!(CategoryId, "Booking category id.");
typed_id!(AreaId, "Storage area id.");
typed_id!(SlotId, "Storage slot id.");
typed_id!(BookingId, "Booking id.");
