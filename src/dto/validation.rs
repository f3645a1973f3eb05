//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that an identifier or display name contains something other than whitespace.
///
/// # Examples
///
/// ```ignore
/// validate_not_blank("Alice") // Ok
/// validate_not_blank("   ")   // Err
/// ```
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("value must not be empty".into());
        return Err(err);
    }

    Ok(())
}
