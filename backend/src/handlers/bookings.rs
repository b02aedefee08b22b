use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::AppError,
    models::{
        booking::{BookingResponse, CreateBookingRequest},
        user::User,
    },
    services::notifier::{notify_best_effort, Notification},
    state::AppState,
    types::{BookingId, SlotId},
    validation::Validate,
};

#[derive(Debug, Deserialize)]
pub struct CancelLinkQuery {
    #[serde(default)]
    pub token: String,
}

pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let bookings = state.bookings.list_for_user(user.id).await?;
    Ok(Json(bookings.into_iter().map(BookingResponse::from).collect()))
}

pub async fn create_booking(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<SlotId>,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    payload.validate()?;

    let created = state
        .bookings
        .create_booking(
            user.id,
            slot_id,
            &payload.description,
            payload.expiry_date,
            state.today(),
        )
        .await?;

    notify_best_effort(
        state.notifier.as_ref(),
        &user,
        Notification::booking_created(&created, &state.config.site_url),
    )
    .await;

    Ok((StatusCode::CREATED, Json(created.booking.into())))
}

pub async fn extend_booking(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<BookingId>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state
        .bookings
        .extend_booking(user.id, booking_id, state.today())
        .await?;
    Ok(Json(booking.into()))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(booking_id): Path<BookingId>,
) -> Result<Json<Value>, AppError> {
    state.bookings.cancel_booking(user.id, booking_id).await?;
    Ok(Json(json!({ "message": "Booking deleted", "id": booking_id })))
}

/// First step of the emailed link: shows what would be cancelled. Mail
/// clients may prefetch the link, so this never deletes anything.
pub async fn review_cancellation_link(
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
    Query(query): Query<CancelLinkQuery>,
) -> Result<Json<Value>, AppError> {
    let context = state
        .bookings
        .booking_for_link(booking_id, &query.token)
        .await?;
    Ok(Json(json!({
        "slot_name": context.slot_name,
        "booking": BookingResponse::from(context.booking),
    })))
}

/// Cancellation from the emailed link; needs no session.
pub async fn cancel_booking_with_secret(
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
    Query(query): Query<CancelLinkQuery>,
) -> Result<Json<Value>, AppError> {
    state
        .bookings
        .cancel_booking_with_secret(booking_id, &query.token)
        .await?;
    Ok(Json(json!({ "message": "Booking deleted", "id": booking_id })))
}
