//! Pure booking rules. Callers load the facts, these functions decide.
//!
//! The store re-checks the same conditions when it applies a write, so a
//! decision taken here is never trusted on its own under concurrency.

use chrono::NaiveDate;

use crate::{
    error::BookingError,
    models::{booking::BookingContext, catalog::Category},
    utils::time::{add_days, days_until},
};

/// Whether a user may claim a slot right now.
pub fn check_can_book(
    slot_has_active_booking: bool,
    active_in_category: i64,
    category: &Category,
) -> Result<(), BookingError> {
    if slot_has_active_booking {
        return Err(BookingError::AlreadyBooked);
    }
    if active_in_category >= i64::from(category.max_bookings) {
        return Err(BookingError::LimitReached);
    }
    Ok(())
}

/// Expiry for a new booking: the requested date when it lies in
/// `[today + 1, today + initial_duration_days]`, else the full initial term.
pub fn resolve_expiry(
    requested: Option<NaiveDate>,
    today: NaiveDate,
    category: &Category,
) -> Result<NaiveDate, BookingError> {
    let latest = add_days(today, category.initial_duration_days);
    match requested {
        None => Ok(latest),
        Some(date) if date > today && date <= latest => Ok(date),
        Some(_) => Err(BookingError::InvalidExpiry),
    }
}

/// Whether the creation notice already counts as the reminder, i.e. the
/// booking starts inside its own extension window.
pub fn starts_in_extension_window(
    expiry: NaiveDate,
    today: NaiveDate,
    extension_period_days: i32,
) -> bool {
    days_until(expiry, today) <= i64::from(extension_period_days)
}

/// Whether the booking may be extended today.
pub fn check_extendable(context: &BookingContext, today: NaiveDate) -> Result<(), BookingError> {
    let booking = &context.booking;
    if !context.attached {
        return Err(BookingError::SlotUnassigned);
    }
    if !booking.is_active(today) {
        return Err(BookingError::Expired);
    }
    // Strictly inside the trailing window; the boundary day itself is too early.
    if days_until(booking.expiry, today) >= i64::from(context.extension_period_days) {
        return Err(BookingError::OutsideExtensionWindow(
            context.extension_period_days,
        ));
    }
    if booking.extensions >= context.max_extensions {
        return Err(BookingError::ExtensionLimitReached);
    }
    Ok(())
}

/// Whether the sweep owes the booking its reminder today.
pub fn reminder_due(context: &BookingContext, today: NaiveDate) -> bool {
    let booking = &context.booking;
    context.attached
        && !booking.reminder_sent
        && !booking.is_past_expiry(today)
        && days_until(booking.expiry, today) <= i64::from(context.extension_period_days)
}
