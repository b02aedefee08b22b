//! Bookings: a member's time-bounded claim on a slot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{
    models::catalog::Category,
    types::{BookingId, SlotId, UserId},
    validation::rules::validate_description,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    /// Slot the booking was made for. The slot's `current_booking_id` decides
    /// whether the booking is still attached.
    pub slot_id: SlotId,
    pub created: NaiveDate,
    pub expiry: NaiveDate,
    pub extensions: i32,
    pub description: String,
    pub reminder_sent: bool,
    /// Lookup id of the cancellation secret emailed to the owner.
    #[serde(skip_serializing, default)]
    pub secret_hash: Option<String>,
}

impl Booking {
    /// A booking holds its slot while today is strictly before its expiry.
    pub fn is_active(&self, today: NaiveDate) -> bool {
        today < self.expiry
    }

    /// The sweep removes bookings once their expiry date has passed.
    pub fn is_past_expiry(&self, today: NaiveDate) -> bool {
        self.expiry < today
    }

    /// First day of the extension window.
    pub fn reminder_date(&self, category: &Category) -> NaiveDate {
        self.expiry
            .checked_sub_days(chrono::Days::new(
                category.extension_period_days.max(0) as u64,
            ))
            .unwrap_or(NaiveDate::MIN)
    }
}

/// A booking together with the data needed to apply the rules to it.
#[derive(Debug, Clone, FromRow)]
pub struct BookingContext {
    #[sqlx(flatten)]
    pub booking: Booking,
    /// `true` while the booking's slot still points at it.
    pub attached: bool,
    pub slot_name: String,
    pub extension_duration_days: i32,
    pub extension_period_days: i32,
    pub max_extensions: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
/// Payload for claiming a slot.
pub struct CreateBookingRequest {
    #[validate(custom(function = "validate_description"))]
    pub description: String,
    /// Requested expiry; defaults to the category's initial duration.
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingResponse {
    pub id: BookingId,
    pub slot_id: SlotId,
    pub created: NaiveDate,
    pub expiry: NaiveDate,
    pub extensions: i32,
    pub description: String,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        BookingResponse {
            id: booking.id,
            slot_id: booking.slot_id,
            created: booking.created,
            expiry: booking.expiry,
            extensions: booking.extensions,
            description: booking.description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CategoryId;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn booking(expiry: NaiveDate) -> Booking {
        Booking {
            id: BookingId::new(),
            user_id: UserId::new(),
            slot_id: SlotId::new(),
            created: date(2026, 5, 1),
            expiry,
            extensions: 0,
            description: "Robot chassis".into(),
            reminder_sent: false,
            secret_hash: None,
        }
    }

    #[test]
    fn booking_is_inactive_on_its_expiry_day() {
        let b = booking(date(2026, 5, 8));
        assert!(b.is_active(date(2026, 5, 7)));
        assert!(!b.is_active(date(2026, 5, 8)));
        assert!(!b.is_past_expiry(date(2026, 5, 8)));
        assert!(b.is_past_expiry(date(2026, 5, 9)));
    }

    #[test]
    fn reminder_date_opens_the_extension_window() {
        let category = Category {
            id: CategoryId::new(),
            name: "Shelves".into(),
            max_bookings: 1,
            initial_duration_days: 28,
            extension_duration_days: 14,
            extension_period_days: 7,
            max_extensions: 2,
        };
        assert_eq!(booking(date(2026, 5, 29)).reminder_date(&category), date(2026, 5, 22));
    }

    #[test]
    fn create_request_requires_description() {
        let request = CreateBookingRequest {
            description: "  ".into(),
            expiry_date: None,
        };
        assert!(request.validate().is_err());

        let request = CreateBookingRequest {
            description: "Laser cut panels".into(),
            expiry_date: None,
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn response_omits_secret_hash() {
        let mut b = booking(date(2026, 5, 8));
        b.secret_hash = Some("lookup".into());
        let json = serde_json::to_value(&b).unwrap();
        assert!(json.get("secret_hash").is_none());
    }
}
