use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use crate::{
    models::booking::{Booking, BookingContext},
    types::{BookingId, CategoryId, UserId},
};

const BOOKING_COLUMNS: &str =
    "id, user_id, slot_id, created, expiry, extensions, description, reminder_sent, secret_hash";

const CONTEXT_SELECT: &str = "SELECT b.id, b.user_id, b.slot_id, b.created, b.expiry, \
        b.extensions, b.description, b.reminder_sent, b.secret_hash, \
        COALESCE(s.current_booking_id = b.id, FALSE) AS attached, \
        s.name AS slot_name, \
        c.extension_duration_days, c.extension_period_days, c.max_extensions \
    FROM bookings b \
    JOIN slots s ON s.id = b.slot_id \
    JOIN areas a ON a.id = s.area_id \
    JOIN categories c ON c.id = a.category_id";

pub async fn insert_booking(conn: &mut PgConnection, booking: &Booking) -> Result<(), sqlx::Error> {
    let query = format!(
        "INSERT INTO bookings ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        BOOKING_COLUMNS
    );
    sqlx::query(&query)
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.slot_id)
        .bind(booking.created)
        .bind(booking.expiry)
        .bind(booking.extensions)
        .bind(&booking.description)
        .bind(booking.reminder_sent)
        .bind(&booking.secret_hash)
        .execute(conn)
        .await
        .map(|_| ())
}

pub async fn find_booking_by_id(
    conn: &mut PgConnection,
    booking_id: BookingId,
) -> Result<Option<Booking>, sqlx::Error> {
    let query = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
    sqlx::query_as::<_, Booking>(&query)
        .bind(booking_id)
        .fetch_optional(conn)
        .await
}

pub async fn find_booking_context(
    pool: &PgPool,
    booking_id: BookingId,
) -> Result<Option<BookingContext>, sqlx::Error> {
    let query = format!("{} WHERE b.id = $1", CONTEXT_SELECT);
    sqlx::query_as::<_, BookingContext>(&query)
        .bind(booking_id)
        .fetch_optional(pool)
        .await
}

/// Every stored booking with its rule context, soonest expiry first.
pub async fn list_booking_contexts(pool: &PgPool) -> Result<Vec<BookingContext>, sqlx::Error> {
    let query = format!("{} ORDER BY b.expiry, b.id", CONTEXT_SELECT);
    sqlx::query_as::<_, BookingContext>(&query)
        .fetch_all(pool)
        .await
}

pub async fn list_bookings_for_user(
    pool: &PgPool,
    user_id: UserId,
) -> Result<Vec<Booking>, sqlx::Error> {
    let query = format!(
        "SELECT {} FROM bookings WHERE user_id = $1 ORDER BY expiry, id",
        BOOKING_COLUMNS
    );
    sqlx::query_as::<_, Booking>(&query)
        .bind(user_id)
        .fetch_all(pool)
        .await
}

/// Bookings currently holding a slot.
pub async fn list_current_bookings(pool: &PgPool) -> Result<Vec<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>(
        "SELECT b.id, b.user_id, b.slot_id, b.created, b.expiry, b.extensions, \
                b.description, b.reminder_sent, b.secret_hash \
         FROM bookings b JOIN slots s ON s.current_booking_id = b.id",
    )
    .fetch_all(pool)
    .await
}

/// Active bookings a user holds through slots of the given category.
pub async fn count_active_bookings_in_category(
    conn: &mut PgConnection,
    user_id: UserId,
    category_id: CategoryId,
    today: NaiveDate,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM bookings b \
         JOIN slots s ON s.current_booking_id = b.id \
         JOIN areas a ON a.id = s.area_id \
         WHERE b.user_id = $1 AND a.category_id = $2 AND b.expiry > $3",
    )
    .bind(user_id)
    .bind(category_id)
    .bind(today)
    .fetch_one(conn)
    .await
}

/// Applies an extension if, at write time, the booking still has the expiry
/// the caller validated, is active, attached, inside the trailing window and
/// below the extension cap.
#[allow(clippy::too_many_arguments)]
pub async fn extend_booking_if_unchanged(
    pool: &PgPool,
    booking_id: BookingId,
    observed_expiry: NaiveDate,
    today: NaiveDate,
    extension_duration_days: i32,
    extension_period_days: i32,
    max_extensions: i32,
) -> Result<Option<Booking>, sqlx::Error> {
    let query = format!(
        "UPDATE bookings b SET \
             expiry = b.expiry + $2, \
             extensions = b.extensions + 1, \
             reminder_sent = FALSE \
         WHERE b.id = $1 \
           AND b.expiry = $3 \
           AND b.expiry > $4 \
           AND (b.expiry - $4) < $5 \
           AND b.extensions < $6 \
           AND EXISTS (SELECT 1 FROM slots s WHERE s.current_booking_id = b.id) \
         RETURNING {}",
        BOOKING_COLUMNS
    );
    sqlx::query_as::<_, Booking>(&query)
        .bind(booking_id)
        .bind(extension_duration_days)
        .bind(observed_expiry)
        .bind(today)
        .bind(extension_period_days)
        .bind(max_extensions)
        .fetch_optional(pool)
        .await
}

/// Claims the reminder for the booking as it was observed. Only the first
/// caller gets the row back; an extension in between moves `expiry` and
/// `extensions`, so a claim planned on the old row finds nothing.
pub async fn claim_reminder(
    pool: &PgPool,
    observed: &Booking,
) -> Result<Option<Booking>, sqlx::Error> {
    let query = format!(
        "UPDATE bookings SET reminder_sent = TRUE \
         WHERE id = $1 AND reminder_sent = FALSE AND expiry = $2 AND extensions = $3 \
         RETURNING {}",
        BOOKING_COLUMNS
    );
    sqlx::query_as::<_, Booking>(&query)
        .bind(observed.id)
        .bind(observed.expiry)
        .bind(observed.extensions)
        .fetch_optional(pool)
        .await
}

pub async fn delete_booking(
    pool: &PgPool,
    booking_id: BookingId,
) -> Result<Option<Booking>, sqlx::Error> {
    let query = format!(
        "DELETE FROM bookings WHERE id = $1 RETURNING {}",
        BOOKING_COLUMNS
    );
    sqlx::query_as::<_, Booking>(&query)
        .bind(booking_id)
        .fetch_optional(pool)
        .await
}

/// Deletes the booking only while its expiry date is still in the past, so a
/// booking extended in the meantime survives.
pub async fn delete_booking_if_expired(
    pool: &PgPool,
    booking_id: BookingId,
    today: NaiveDate,
) -> Result<Option<Booking>, sqlx::Error> {
    let query = format!(
        "DELETE FROM bookings WHERE id = $1 AND expiry < $2 RETURNING {}",
        BOOKING_COLUMNS
    );
    sqlx::query_as::<_, Booking>(&query)
        .bind(booking_id)
        .bind(today)
        .fetch_optional(pool)
        .await
}
