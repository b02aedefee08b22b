//! Request payload checks shared by the handlers.

pub mod rules;

pub use validator::Validate;
