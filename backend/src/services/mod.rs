pub mod booking;
pub mod booking_rules;
pub mod maintenance;
pub mod notifier;
pub mod session;
