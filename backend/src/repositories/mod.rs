pub mod booking;
pub mod catalog;
pub mod session;
pub mod user;
