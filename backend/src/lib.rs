pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod types;
pub mod utils;
pub mod validation;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the HTTP application. Every route passes through the session
/// middleware; member routes additionally require an attached user.
pub fn app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(handlers::health::health))
        .route("/api/areas", get(handlers::areas::list_areas))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route(
            "/api/auth/backchannel-logout",
            post(handlers::auth::backchannel_logout),
        )
        .route(
            "/api/bookings/{id}/secret",
            delete(handlers::bookings::cancel_booking_with_secret),
        )
        .route(
            "/bookings/{id}/free-email",
            get(handlers::bookings::review_cancellation_link)
                .post(handlers::bookings::cancel_booking_with_secret),
        );

    let member_routes = Router::new()
        .route("/api/me", get(handlers::auth::me))
        .route("/api/bookings/me", get(handlers::bookings::my_bookings))
        .route(
            "/api/slots/{id}/bookings",
            post(handlers::bookings::create_booking),
        )
        .route(
            "/api/bookings/{id}/extend",
            post(handlers::bookings::extend_booking),
        )
        .route(
            "/api/bookings/{id}",
            delete(handlers::bookings::cancel_booking),
        )
        .route_layer(axum_middleware::from_fn(middleware::require_session));

    Router::new()
        .merge(public_routes)
        .merge(member_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(middleware::request_id))
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(middleware::log_error_responses))
                .layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    middleware::attach_session,
                )),
        )
        .with_state(state)
}
