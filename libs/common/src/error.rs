//! Validation error types shared by the gateway and the client
//!
//! Every check on user supplied data (coordinates, visibility, names) reports
//! through [`ValidationError`], so the gateway can map the whole family to a
//! single `400 Bad Request`.

use thiserror::Error;

/// Error raised when request data fails a domain check
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Latitude outside of [-90, 90] or not a finite number
    #[error("Invalid latitude {0}: must be between -90 and 90")]
    Latitude(f64),

    /// Longitude outside of [-180, 180] or not a finite number
    #[error("Invalid longitude {0}: must be between -180 and 180")]
    Longitude(f64),

    /// Visibility value outside of the known tiers
    #[error("Invalid visibility '{0}': must be one of public, social, private")]
    Visibility(String),

    /// A required field was missing or blank
    #[error("{0} is required")]
    Required(&'static str),

    /// Username does not match the allowed shape
    #[error("{0}")]
    Username(String),

    /// E-mail address is malformed or too long
    #[error("{0}")]
    Email(String),

    /// Bounding box query was incomplete or inverted
    #[error("Invalid bounding box: {0}")]
    BoundingBox(String),

    /// Any other malformed field
    #[error("Invalid {field}: {reason}")]
    Field {
        field: &'static str,
        reason: String,
    },
}

/// Type alias for Result with ValidationError
pub type ValidationResult<T> = Result<T, ValidationError>;
