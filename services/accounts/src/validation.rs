//! Field validation utilities

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// A single field constraint violation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {kind}")]
pub struct ValidationError {
    pub field: &'static str,
    pub kind: ValidationErrorKind,
}

/// The constraint that was violated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationErrorKind {
    #[error("this field cannot be blank")]
    Blank,
    #[error("ensure this value has at most {max} characters (it has {actual})")]
    MaxLength { max: usize, actual: usize },
    #[error("enter a valid email address")]
    InvalidEmail,
    #[error("enter a valid URL")]
    InvalidUrl,
    #[error("reference does not point at the given record")]
    ReferenceMismatch,
}

impl ValidationError {
    pub fn new(field: &'static str, kind: ValidationErrorKind) -> Self {
        Self { field, kind }
    }
}

pub type ValidationResult = Result<(), ValidationError>;

/// Reject empty or whitespace-only values
pub fn not_blank(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, ValidationErrorKind::Blank));
    }
    Ok(())
}

/// Length is counted in characters, not bytes
pub fn max_length(field: &'static str, value: &str, max: usize) -> ValidationResult {
    let actual = value.chars().count();
    if actual > max {
        return Err(ValidationError::new(
            field,
            ValidationErrorKind::MaxLength { max, actual },
        ));
    }
    Ok(())
}

pub fn optional_max_length(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> ValidationResult {
    value.map_or(Ok(()), |value| max_length(field, value, max))
}

/// Validate email
pub fn email(field: &'static str, value: &str) -> ValidationResult {
    not_blank(field, value)?;
    max_length(field, value, 254)?;

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(value) {
        return Err(ValidationError::new(field, ValidationErrorKind::InvalidEmail));
    }

    Ok(())
}

/// Validate an optional http(s) URL. Blank strings count as absent.
pub fn optional_url(field: &'static str, value: Option<&str>) -> ValidationResult {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(());
    };

    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = URL_REGEX.get_or_init(|| {
        Regex::new(
            r"^(?i)https?://(?:localhost|[a-z0-9-]+(?:\.[a-z0-9-]+)*\.[a-z]{2,}|\d{1,3}(?:\.\d{1,3}){3})(?::\d{1,5})?(?:[/?#]\S*)?$",
        )
        .expect("Failed to compile URL regex")
    });

    if !regex.is_match(value) {
        return Err(ValidationError::new(field, ValidationErrorKind::InvalidUrl));
    }

    Ok(())
}
