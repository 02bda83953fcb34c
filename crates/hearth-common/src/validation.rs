//! Input validation utilities.
//!
//! Centralized validation helpers used across API routes.

use validator::Validate;

use crate::error::HearthError;

/// Validate a request body, returning a HearthError::Validation on failure.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), HearthError> {
    body.validate()
        .map_err(|e| HearthError::validation(format_validation_errors(e)))
}

/// Format validation errors into a human-readable string.
fn format_validation_errors(errors: validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for '{field}'"))
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

/// Validate a role name: non-blank after trimming.
pub fn validate_role_name(name: &str) -> Result<(), HearthError> {
    if name.trim().is_empty() {
        return Err(HearthError::validation(
            "Role name cannot be empty or whitespace only",
        ));
    }
    if name.chars().any(char::is_control) {
        return Err(HearthError::validation(
            "Role name cannot contain control characters",
        ));
    }
    Ok(())
}
