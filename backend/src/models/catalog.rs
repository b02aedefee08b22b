//! Booking policy and physical layout: categories, areas and slots.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{AreaId, BookingId, CategoryId, SlotId};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
/// Booking policy shared by every area in the category.
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Concurrent active bookings a user may hold in this category.
    pub max_bookings: i32,
    pub initial_duration_days: i32,
    pub extension_duration_days: i32,
    /// Trailing window (days before expiry) during which extension is allowed.
    pub extension_period_days: i32,
    pub max_extensions: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
/// A named physical zone, e.g. a shelf bank.
pub struct Area {
    pub id: AreaId,
    pub name: String,
    pub category_id: CategoryId,
    pub column_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
/// One physical storage unit.
pub struct Slot {
    pub id: SlotId,
    pub name: String,
    pub area_id: AreaId,
    /// The slot's only live booking, if any.
    pub current_booking_id: Option<BookingId>,
}

/// An area with its policy and slots, as shown on the overview.
#[derive(Debug, Clone, Serialize)]
pub struct AreaOverview {
    pub id: AreaId,
    pub name: String,
    pub column_count: i32,
    pub category: Category,
    pub slots: Vec<SlotOverview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotOverview {
    pub id: SlotId,
    pub name: String,
    /// The slot's current booking while it is active.
    pub booking: Option<SlotBooking>,
    /// Present only when a user is attached to the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_book: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotBooking {
    pub id: BookingId,
    pub expiry: chrono::NaiveDate,
    pub description: String,
    pub mine: bool,
    /// Extension hint for the owner; `None` for everyone else.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_extend: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extend_reason: Option<String>,
}
