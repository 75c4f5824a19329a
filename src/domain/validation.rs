//! Field-level checks shared by the credential and content services.

use crate::domain::error::DomainError;

/// Ensure `value` holds between `min` and `max` characters (inclusive).
pub fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), DomainError> {
    let count = value.chars().count();
    if count < min {
        return Err(DomainError::validation(
            field,
            format!("must be at least {min} characters"),
        ));
    }
    if count > max {
        return Err(DomainError::validation(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}

pub fn check_optional_length(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), DomainError> {
    match value {
        Some(value) => check_length(field, value, 0, max),
        None => Ok(()),
    }
}

pub fn check_email(field: &'static str, value: &str) -> Result<(), DomainError> {
    check_length(field, value, 3, 255)?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(DomainError::validation(field, "must be a valid email address")),
    }
}
