use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::error::DomainError;

pub const MAX_SLUG_LENGTH: usize = 64;

static SLUG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9-]*[a-z0-9]$|^[a-z0-9]$").expect("invalid slug regex")
});

/// Validates a human-readable identifier: lowercase alphanumeric with
/// interior hyphens, at most [`MAX_SLUG_LENGTH`] characters.
pub fn validate_slug(kind: &str, value: &str) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(DomainError::invalid_id(format!("{kind} id cannot be empty")));
    }
    if value.len() > MAX_SLUG_LENGTH {
        return Err(DomainError::invalid_id(format!(
            "{kind} id cannot exceed {MAX_SLUG_LENGTH} characters"
        )));
    }
    if !SLUG_PATTERN.is_match(value) {
        return Err(DomainError::invalid_id(format!(
            "{kind} id must be lowercase alphanumeric with hyphens, got '{value}'"
        )));
    }
    Ok(())
}
