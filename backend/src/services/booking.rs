//! Booking state transitions: claim, extend, cancel.
//!
//! Every transition that races with other requests is applied by a single
//! conditional write; the rules in `booking_rules` decide what to attempt and
//! explain why an attempt was refused.

use std::collections::HashMap;

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use crate::{
    error::BookingError,
    models::{
        booking::{Booking, BookingContext},
        catalog::{AreaOverview, Category, Slot, SlotBooking, SlotOverview},
    },
    repositories::{booking as booking_repo, catalog as catalog_repo, user as user_repo},
    services::booking_rules::{
        check_can_book, check_extendable, resolve_expiry, starts_in_extension_window,
    },
    types::{BookingId, CategoryId, SlotId, UserId},
    utils::token::{generate_secret_with_lookup_id, secret_matches},
};

/// A booking that was just claimed, with what its owner needs to be told.
#[derive(Debug, Clone)]
pub struct CreatedBooking {
    pub booking: Booking,
    /// Raw cancellation secret. Only ever handed to the owner.
    pub secret: String,
    pub slot_name: String,
    /// First day of the extension window, `None` when the booking starts inside it.
    pub reminder_date: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct BookingService {
    pool: PgPool,
}

impl BookingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Whether `user_id` may book `slot_id` today.
    pub async fn eligible(
        &self,
        user_id: UserId,
        slot_id: SlotId,
        today: NaiveDate,
    ) -> Result<(), BookingError> {
        let mut conn = self.pool.acquire().await?;
        let (slot, category) = load_slot(&mut conn, slot_id, false).await?;
        let occupied = slot_has_active_booking(&mut conn, &slot, today).await?;
        let active = booking_repo::count_active_bookings_in_category(
            &mut conn,
            user_id,
            category.id,
            today,
        )
        .await?;
        check_can_book(occupied, active, &category)
    }

    /// Claims a slot for a user.
    ///
    /// The user's row and then the slot's row are locked for the transaction,
    /// so neither the category count nor the slot can change underneath the
    /// checks. The slot pointer is then swung from the value observed here to
    /// the new booking; if the pointer moved anyway the swap affects nothing,
    /// the transaction is rolled back and the caller gets `AlreadyBooked`.
    pub async fn create_booking(
        &self,
        user_id: UserId,
        slot_id: SlotId,
        description: &str,
        requested_expiry: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<CreatedBooking, BookingError> {
        let mut tx = self.pool.begin().await?;

        if !user_repo::lock_user(&mut tx, user_id).await? {
            return Err(BookingError::NotFound("User"));
        }

        let (slot, category) = load_slot(&mut tx, slot_id, true).await?;
        let observed = slot.current_booking_id;
        let occupied = slot_has_active_booking(&mut tx, &slot, today).await?;
        let active =
            booking_repo::count_active_bookings_in_category(&mut tx, user_id, category.id, today)
                .await?;
        check_can_book(occupied, active, &category)?;

        let expiry = resolve_expiry(requested_expiry, today, &category)?;
        let in_window = starts_in_extension_window(expiry, today, category.extension_period_days);
        let (secret, secret_hash) = generate_secret_with_lookup_id();

        let booking = Booking {
            id: BookingId::new(),
            user_id,
            slot_id: slot.id,
            created: today,
            expiry,
            extensions: 0,
            description: description.trim().to_string(),
            reminder_sent: in_window,
            secret_hash: Some(secret_hash),
        };
        booking_repo::insert_booking(&mut tx, &booking).await?;

        if !catalog_repo::swap_current_booking(&mut tx, slot.id, observed, booking.id).await? {
            tx.rollback().await?;
            tracing::info!(%slot_id, %user_id, "Slot claimed concurrently by another booking");
            return Err(BookingError::AlreadyBooked);
        }
        tx.commit().await?;

        tracing::info!(booking_id = %booking.id, %slot_id, %user_id, %expiry, "Booking created");

        let reminder_date = (!in_window).then(|| booking.reminder_date(&category));
        Ok(CreatedBooking {
            booking,
            secret,
            slot_name: slot.name,
            reminder_date,
        })
    }

    /// Whether the booking may be extended today.
    pub async fn extendable(
        &self,
        booking_id: BookingId,
        today: NaiveDate,
    ) -> Result<(), BookingError> {
        let context = self.load_context(booking_id).await?;
        check_extendable(&context, today)
    }

    /// Extends the owner's booking by the category's extension duration.
    pub async fn extend_booking(
        &self,
        user_id: UserId,
        booking_id: BookingId,
        today: NaiveDate,
    ) -> Result<Booking, BookingError> {
        let context = self.load_context(booking_id).await?;
        if context.booking.user_id != user_id {
            return Err(BookingError::NotOwner);
        }
        check_extendable(&context, today)?;

        let extended = booking_repo::extend_booking_if_unchanged(
            &self.pool,
            booking_id,
            context.booking.expiry,
            today,
            context.extension_duration_days,
            context.extension_period_days,
            context.max_extensions,
        )
        .await?;

        match extended {
            Some(booking) => {
                tracing::info!(
                    %booking_id,
                    expiry = %booking.expiry,
                    extensions = booking.extensions,
                    "Booking extended"
                );
                Ok(booking)
            }
            None => {
                // Report the rule that fails now, if any.
                let current = self.load_context(booking_id).await?;
                check_extendable(&current, today)?;
                Err(BookingError::ConcurrentUpdate)
            }
        }
    }

    /// Owner-initiated cancellation.
    pub async fn cancel_booking(
        &self,
        user_id: UserId,
        booking_id: BookingId,
    ) -> Result<Booking, BookingError> {
        let booking = self
            .find_booking(booking_id)
            .await?
            .ok_or(BookingError::NotFound("Booking"))?;
        if booking.user_id != user_id {
            return Err(BookingError::NotOwner);
        }
        let deleted = booking_repo::delete_booking(&self.pool, booking_id)
            .await?
            .ok_or(BookingError::NotFound("Booking"))?;
        tracing::info!(%booking_id, %user_id, "Booking cancelled by owner");
        Ok(deleted)
    }

    /// Looks up the booking an emailed link points at. Unknown bookings and
    /// wrong secrets are indistinguishable to the caller.
    pub async fn booking_for_link(
        &self,
        booking_id: BookingId,
        presented_secret: &str,
    ) -> Result<BookingContext, BookingError> {
        let context = booking_repo::find_booking_context(&self.pool, booking_id).await?;
        let authorised = context
            .as_ref()
            .and_then(|c| c.booking.secret_hash.as_deref())
            .is_some_and(|stored| secret_matches(presented_secret, stored));
        match context {
            Some(context) if authorised => Ok(context),
            _ => {
                tracing::warn!(%booking_id, "Rejected booking cancellation link");
                Err(BookingError::InvalidCancellationLink)
            }
        }
    }

    /// Cancellation through the emailed link.
    pub async fn cancel_booking_with_secret(
        &self,
        booking_id: BookingId,
        presented_secret: &str,
    ) -> Result<Booking, BookingError> {
        self.booking_for_link(booking_id, presented_secret).await?;
        let deleted = booking_repo::delete_booking(&self.pool, booking_id)
            .await?
            .ok_or(BookingError::InvalidCancellationLink)?;
        tracing::info!(%booking_id, "Booking cancelled through emailed link");
        Ok(deleted)
    }

    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Booking>, BookingError> {
        Ok(booking_repo::list_bookings_for_user(&self.pool, user_id).await?)
    }

    /// Areas with their slots and, for an attached user, booking hints.
    pub async fn overview(
        &self,
        viewer: Option<UserId>,
        today: NaiveDate,
    ) -> Result<Vec<AreaOverview>, BookingError> {
        let categories: HashMap<CategoryId, Category> =
            catalog_repo::list_categories(&self.pool)
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect();
        let areas = catalog_repo::list_areas(&self.pool).await?;
        let slots = catalog_repo::list_slots(&self.pool).await?;
        let current: HashMap<BookingId, Booking> =
            booking_repo::list_current_bookings(&self.pool)
                .await?
                .into_iter()
                .filter(|b| b.is_active(today))
                .map(|b| (b.id, b))
                .collect();

        let area_category: HashMap<_, _> = areas.iter().map(|a| (a.id, a.category_id)).collect();
        let mut held_per_category: HashMap<CategoryId, i64> = HashMap::new();
        if let Some(viewer) = viewer {
            for slot in &slots {
                let held_by_viewer = slot
                    .current_booking_id
                    .and_then(|id| current.get(&id))
                    .is_some_and(|b| b.user_id == viewer);
                if held_by_viewer {
                    if let Some(category_id) = area_category.get(&slot.area_id) {
                        *held_per_category.entry(*category_id).or_default() += 1;
                    }
                }
            }
        }

        let mut overview = Vec::with_capacity(areas.len());
        for area in areas {
            let Some(category) = categories.get(&area.category_id) else {
                continue;
            };
            let held = held_per_category.get(&category.id).copied().unwrap_or(0);
            let slots = slots
                .iter()
                .filter(|s| s.area_id == area.id)
                .map(|slot| {
                    let booking = slot.current_booking_id.and_then(|id| current.get(&id));
                    slot_overview(slot, booking, category, viewer, held, today)
                })
                .collect();
            overview.push(AreaOverview {
                id: area.id,
                name: area.name,
                column_count: area.column_count,
                category: category.clone(),
                slots,
            });
        }
        Ok(overview)
    }

    async fn load_context(&self, booking_id: BookingId) -> Result<BookingContext, BookingError> {
        booking_repo::find_booking_context(&self.pool, booking_id)
            .await?
            .ok_or(BookingError::NotFound("Booking"))
    }

    async fn find_booking(&self, booking_id: BookingId) -> Result<Option<Booking>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(booking_repo::find_booking_by_id(&mut conn, booking_id).await?)
    }
}

async fn load_slot(
    conn: &mut PgConnection,
    slot_id: SlotId,
    for_update: bool,
) -> Result<(Slot, Category), BookingError> {
    let slot = if for_update {
        catalog_repo::lock_slot(&mut *conn, slot_id).await?
    } else {
        catalog_repo::find_slot_by_id(&mut *conn, slot_id).await?
    }
    .ok_or(BookingError::NotFound("Slot"))?;
    let category = catalog_repo::find_category_for_slot(conn, slot_id)
        .await?
        .ok_or(BookingError::NotFound("Category"))?;
    Ok((slot, category))
}

async fn slot_has_active_booking(
    conn: &mut PgConnection,
    slot: &Slot,
    today: NaiveDate,
) -> Result<bool, sqlx::Error> {
    let Some(current) = slot.current_booking_id else {
        return Ok(false);
    };
    let booking = booking_repo::find_booking_by_id(conn, current).await?;
    Ok(booking.is_some_and(|b| b.is_active(today)))
}

fn slot_overview(
    slot: &Slot,
    booking: Option<&Booking>,
    category: &Category,
    viewer: Option<UserId>,
    held_in_category: i64,
    today: NaiveDate,
) -> SlotOverview {
    let can_book =
        viewer.map(|_| check_can_book(booking.is_some(), held_in_category, category).is_ok());
    let booking = booking.map(|b| {
        let mine = viewer == Some(b.user_id);
        let extend = mine.then(|| {
            let context = BookingContext {
                booking: b.clone(),
                attached: true,
                slot_name: slot.name.clone(),
                extension_duration_days: category.extension_duration_days,
                extension_period_days: category.extension_period_days,
                max_extensions: category.max_extensions,
            };
            check_extendable(&context, today)
        });
        SlotBooking {
            id: b.id,
            expiry: b.expiry,
            description: b.description.clone(),
            mine,
            can_extend: extend.as_ref().map(Result::is_ok),
            extend_reason: extend.and_then(Result::err).map(|e| e.reason()),
        }
    });
    SlotOverview {
        id: slot.id,
        name: slot.name.clone(),
        booking,
        can_book,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AreaId;
    use crate::utils::time::add_days;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn category() -> Category {
        Category {
            id: CategoryId::new(),
            name: "Small boxes".into(),
            max_bookings: 1,
            initial_duration_days: 28,
            extension_duration_days: 14,
            extension_period_days: 7,
            max_extensions: 1,
        }
    }

    fn slot(current: Option<BookingId>) -> Slot {
        Slot {
            id: SlotId::new(),
            name: "B2".into(),
            area_id: AreaId::new(),
            current_booking_id: current,
        }
    }

    fn booking(user_id: UserId, expiry: NaiveDate) -> Booking {
        Booking {
            id: BookingId::new(),
            user_id,
            slot_id: SlotId::new(),
            created: today(),
            expiry,
            extensions: 0,
            description: "Quadcopter".into(),
            reminder_sent: false,
            secret_hash: None,
        }
    }

    #[test]
    fn anonymous_overview_has_no_hints() {
        let owner = UserId::new();
        let b = booking(owner, add_days(today(), 3));
        let view = slot_overview(&slot(Some(b.id)), Some(&b), &category(), None, 0, today());
        assert!(view.can_book.is_none());
        let shown = view.booking.expect("booking shown");
        assert!(!shown.mine);
        assert!(shown.can_extend.is_none());
    }

    #[test]
    fn free_slot_is_bookable_below_limit() {
        let viewer = UserId::new();
        let view = slot_overview(&slot(None), None, &category(), Some(viewer), 0, today());
        assert_eq!(view.can_book, Some(true));

        let view = slot_overview(&slot(None), None, &category(), Some(viewer), 1, today());
        assert_eq!(view.can_book, Some(false));
    }

    #[test]
    fn owner_sees_extension_hint() {
        let owner = UserId::new();
        let inside = booking(owner, add_days(today(), 3));
        let view = slot_overview(
            &slot(Some(inside.id)),
            Some(&inside),
            &category(),
            Some(owner),
            1,
            today(),
        );
        assert_eq!(view.can_book, Some(false));
        let shown = view.booking.expect("booking shown");
        assert!(shown.mine);
        assert_eq!(shown.can_extend, Some(true));
        assert!(shown.extend_reason.is_none());

        let early = booking(owner, add_days(today(), 20));
        let view = slot_overview(
            &slot(Some(early.id)),
            Some(&early),
            &category(),
            Some(owner),
            1,
            today(),
        );
        let shown = view.booking.expect("booking shown");
        assert_eq!(shown.can_extend, Some(false));
        assert_eq!(
            shown.extend_reason.as_deref(),
            Some("Can only extend within the last 7 days")
        );
    }
}
