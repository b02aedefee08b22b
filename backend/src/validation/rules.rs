//! Common validation rules shared across request payloads.

use validator::ValidationError;

/// Longest description accepted for a booking.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// Validates a booking description.
///
/// Requirements:
/// - Not blank once surrounding whitespace is removed
/// - At most [`MAX_DESCRIPTION_LENGTH`] characters
pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("description_required"));
    }
    if trimmed.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::new("description_too_long"));
    }
    Ok(())
}
