//! Data models shared across database access and API handlers.
//!
//! Entities reference each other by typed id only; navigation goes through
//! explicit repository lookups.

pub mod booking;
pub mod catalog;
pub mod session;
pub mod user;
