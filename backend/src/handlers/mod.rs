pub mod areas;
pub mod auth;
pub mod bookings;
pub mod health;
