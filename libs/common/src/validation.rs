//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{ValidationError, ValidationResult};

/// Validate username
pub fn validate_username(username: &str) -> ValidationResult<()> {
    if username.is_empty() {
        return Err(ValidationError::Required("username"));
    }

    let length = username.chars().count();
    if length < 3 {
        return Err(ValidationError::Username(
            "Username must be at least 3 characters long".to_string(),
        ));
    }

    if length > 32 {
        return Err(ValidationError::Username(
            "Username must be at most 32 characters long".to_string(),
        ));
    }

    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("username regex is valid"));

    if !regex.is_match(username) {
        return Err(ValidationError::Username(
            "Username can only contain letters, numbers, and underscores".to_string(),
        ));
    }

    Ok(())
}

/// Validate an e-mail address, returning it trimmed
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = require_non_blank(email, "email")?;

    if email.len() > 254 {
        return Err(ValidationError::Email(
            "Email must be at most 254 characters long".to_string(),
        ));
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("email regex is valid")
    });

    if !regex.is_match(&email) {
        return Err(ValidationError::Email("Invalid email format".to_string()));
    }

    Ok(email)
}

/// Trim a required text field, rejecting blank values
pub fn require_non_blank(value: &str, field: &'static str) -> ValidationResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Required(field))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Parse a decimal degree value sent as text
pub fn parse_degrees(value: &str, field: &'static str) -> ValidationResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ValidationError::Field {
            field,
            reason: format!("'{}' is not a number", value.trim()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert!(validate_username("memory_keeper").is_ok());
        assert_eq!(
            validate_username(""),
            Err(ValidationError::Required("username"))
        );
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(33)).is_err());
        assert!(validate_username("no spaces").is_err());
    }

    #[test]
    fn emails() {
        assert_eq!(
            validate_email(" walker@pindrop.test "),
            Ok("walker@pindrop.test".to_string())
        );
        assert_eq!(validate_email("  "), Err(ValidationError::Required("email")));
        assert!(matches!(
            validate_email("walker@localhost"),
            Err(ValidationError::Email(_))
        ));
        assert!(validate_email("no-at-sign.test").is_err());
        assert!(validate_email(&format!("{}@pindrop.test", "a".repeat(250))).is_err());
    }

    #[test]
    fn blank_fields_are_required() {
        assert_eq!(require_non_blank("  Pier  ", "name"), Ok("Pier".to_string()));
        assert_eq!(
            require_non_blank(" \t", "name"),
            Err(ValidationError::Required("name"))
        );
    }

    #[test]
    fn degrees_must_be_numeric() {
        assert_eq!(parse_degrees(" 12.5 ", "latitude"), Ok(12.5));
        assert!(matches!(
            parse_degrees("north", "latitude"),
            Err(ValidationError::Field { field: "latitude", .. })
        ));
    }
}
