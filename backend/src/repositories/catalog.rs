use sqlx::{PgConnection, PgPool};

use crate::{
    models::catalog::{Area, Category, Slot},
    types::{AreaId, SlotId},
};

const CATEGORY_COLUMNS: &str = "id, name, max_bookings, initial_duration_days, \
    extension_duration_days, extension_period_days, max_extensions";

pub async fn insert_category(pool: &PgPool, category: &Category) -> Result<Category, sqlx::Error> {
    let query = format!(
        "INSERT INTO categories ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {cols}",
        cols = CATEGORY_COLUMNS
    );
    sqlx::query_as::<_, Category>(&query)
        .bind(category.id)
        .bind(&category.name)
        .bind(category.max_bookings)
        .bind(category.initial_duration_days)
        .bind(category.extension_duration_days)
        .bind(category.extension_period_days)
        .bind(category.max_extensions)
        .fetch_one(pool)
        .await
}

pub async fn insert_area(pool: &PgPool, area: &Area) -> Result<Area, sqlx::Error> {
    sqlx::query_as::<_, Area>(
        "INSERT INTO areas (id, name, category_id, column_count) VALUES ($1, $2, $3, $4) \
         RETURNING id, name, category_id, column_count",
    )
    .bind(area.id)
    .bind(&area.name)
    .bind(area.category_id)
    .bind(area.column_count)
    .fetch_one(pool)
    .await
}

pub async fn insert_slot(
    pool: &PgPool,
    area_id: AreaId,
    name: &str,
) -> Result<Slot, sqlx::Error> {
    sqlx::query_as::<_, Slot>(
        "INSERT INTO slots (id, name, area_id) VALUES ($1, $2, $3) \
         RETURNING id, name, area_id, current_booking_id",
    )
    .bind(SlotId::new())
    .bind(name)
    .bind(area_id)
    .fetch_one(pool)
    .await
}

pub async fn list_categories(pool: &PgPool) -> Result<Vec<Category>, sqlx::Error> {
    let query = format!("SELECT {} FROM categories ORDER BY name", CATEGORY_COLUMNS);
    sqlx::query_as::<_, Category>(&query).fetch_all(pool).await
}

pub async fn list_areas(pool: &PgPool) -> Result<Vec<Area>, sqlx::Error> {
    sqlx::query_as::<_, Area>(
        "SELECT id, name, category_id, column_count FROM areas ORDER BY name, id",
    )
    .fetch_all(pool)
    .await
}

pub async fn list_slots(pool: &PgPool) -> Result<Vec<Slot>, sqlx::Error> {
    sqlx::query_as::<_, Slot>(
        "SELECT id, name, area_id, current_booking_id FROM slots ORDER BY name, id",
    )
    .fetch_all(pool)
    .await
}

pub async fn find_slot_by_id(
    conn: &mut PgConnection,
    slot_id: SlotId,
) -> Result<Option<Slot>, sqlx::Error> {
    sqlx::query_as::<_, Slot>(
        "SELECT id, name, area_id, current_booking_id FROM slots WHERE id = $1",
    )
    .bind(slot_id)
    .fetch_optional(conn)
    .await
}

/// Reads the slot and holds its row lock until the transaction ends.
///
/// Claims for the same slot queue here rather than deadlocking later between
/// the booking insert (which references the slot) and the pointer swap.
pub async fn lock_slot(
    conn: &mut PgConnection,
    slot_id: SlotId,
) -> Result<Option<Slot>, sqlx::Error> {
    sqlx::query_as::<_, Slot>(
        "SELECT id, name, area_id, current_booking_id FROM slots WHERE id = $1 FOR UPDATE",
    )
    .bind(slot_id)
    .fetch_optional(conn)
    .await
}

/// Category governing a slot, through the slot's area.
pub async fn find_category_for_slot(
    conn: &mut PgConnection,
    slot_id: SlotId,
) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "SELECT c.id, c.name, c.max_bookings, c.initial_duration_days, \
                c.extension_duration_days, c.extension_period_days, c.max_extensions \
         FROM slots s \
         JOIN areas a ON a.id = s.area_id \
         JOIN categories c ON c.id = a.category_id \
         WHERE s.id = $1",
    )
    .bind(slot_id)
    .fetch_optional(conn)
    .await
}

/// Swings the slot's live pointer from `observed` to `new_booking`.
///
/// Compare-and-swap: the update only applies while the pointer still holds
/// the value the caller based its decision on. Concurrent claims that
/// observed the same value are serialised on the slot row and all but the
/// first see a changed pointer and affect no rows.
pub async fn swap_current_booking(
    conn: &mut PgConnection,
    slot_id: SlotId,
    observed: Option<crate::types::BookingId>,
    new_booking: crate::types::BookingId,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE slots SET current_booking_id = $1 \
         WHERE id = $2 AND current_booking_id IS NOT DISTINCT FROM $3",
    )
    .bind(new_booking)
    .bind(slot_id)
    .bind(observed)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
