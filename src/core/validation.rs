//! Input validation for coffer operations.
//!
//! Validates secret names, values, and scope identifiers. Everything here
//! runs before any I/O.

use crate::error::{Result, ValidationError};

/// Validate a secret name.
///
/// Secret names must be valid environment variable names:
/// - Only ASCII letters, digits, and underscore
/// - Cannot start with a digit
/// - Cannot be empty
///
/// # Errors
///
/// Returns `ValidationError` if the name is invalid.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ValidationError::Empty("secret name").into());
    }

    // Check first character - must not be a digit
    if let Some(first_char) = name.chars().next() {
        if first_char.is_ascii_digit() {
            return Err(ValidationError::InvalidName {
                name: name.to_string(),
                reason: "cannot start with a digit".to_string(),
            }
            .into());
        }
    }

    for (i, ch) in name.chars().enumerate() {
        if !ch.is_ascii_alphanumeric() && ch != '_' {
            return Err(ValidationError::InvalidName {
                name: name.to_string(),
                reason: format!(
                    "invalid character '{}' at position {}. Only A-Z, 0-9, and underscore are allowed",
                    ch,
                    i + 1
                ),
            }
            .into());
        }
    }

    Ok(())
}

/// Validate a secret value. Values cannot be empty.
pub fn validate_value(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ValidationError::InvalidName {
            name: name.to_string(),
            reason: "value cannot be empty".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Validate an org/project/environment identifier.
///
/// Identifiers end up inside `/`- and `:`-separated strings (KDF scopes,
/// store key names), so neither separator is allowed.
pub fn validate_identifier(what: &'static str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(ValidationError::Empty(what).into());
    }
    if let Some(ch) = id.chars().find(|c| matches!(c, '/' | ':') || c.is_control()) {
        return Err(ValidationError::InvalidName {
            name: id.to_string(),
            reason: format!("{} cannot contain {:?}", what, ch),
        }
        .into());
    }
    Ok(())
}
