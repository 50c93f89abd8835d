//! Core error types for miniform.
//!
//! [`MiniformError`] covers form errors, database errors, configuration
//! errors, request decoding errors, and I/O. Field-level validation failures
//! are carried by [`ValidationError`].

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// A validation error with optional field-level errors.
///
/// Validation errors can be either simple (a single message) or compound
/// (containing one message per field).
///
/// # Examples
///
/// ```
/// use miniform_core::error::ValidationError;
///
/// let err = ValidationError::new("Field cannot be empty", "required");
/// assert_eq!(err.to_string(), "Field cannot be empty");
///
/// let mut fields = std::collections::BTreeMap::new();
/// fields.insert("email".to_string(), "Value must be unique".to_string());
/// let err = ValidationError::with_field_errors(fields);
/// assert_eq!(err.to_string(), "email: Value must be unique");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValidationError {
    /// The primary error message.
    pub message: String,
    /// A short code identifying the type of validation failure (e.g. "required", "unique").
    pub code: String,
    /// Additional parameters providing context for the error message.
    pub params: BTreeMap<String, String>,
    /// Joined error text per field, keyed by field name.
    pub field_errors: BTreeMap<String, String>,
}

impl ValidationError {
    /// Creates a new `ValidationError` with a message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            ..Self::default()
        }
    }

    /// Creates a `ValidationError` containing per-field errors.
    pub fn with_field_errors(field_errors: BTreeMap<String, String>) -> Self {
        Self {
            code: "invalid".to_string(),
            field_errors,
            ..Self::default()
        }
    }

    /// Adds a parameter to this validation error.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            return write!(f, "{}", self.message);
        }
        let mut first = true;
        for (field, error) in &self.field_errors {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{field}: {error}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The primary error type for miniform.
///
/// Each variant maps to an HTTP status code via [`MiniformError::status_code`]
/// so that web handlers can turn failures into responses directly.
#[derive(Error, Debug)]
pub enum MiniformError {
    // ── Forms ────────────────────────────────────────────────────────

    /// One or more fields failed validation.
    #[error("Validation error: {0}")]
    ValidationError(ValidationError),

    /// A form or model does not have the named field.
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// An uploaded file could not be accepted or stored.
    #[error("Upload error: {0}")]
    Upload(String),

    // ── Database ─────────────────────────────────────────────────────

    /// Raised when a query expected exactly one result but found none.
    #[error("Object does not exist: {0}")]
    DoesNotExist(String),

    /// Raised when a query expected exactly one result but found multiple.
    #[error("Multiple objects returned when one expected: {0}")]
    MultipleObjectsReturned(String),

    /// A generic database error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A database integrity constraint was violated.
    #[error("Integrity error: {0}")]
    IntegrityError(String),

    /// An operational database error (connection failure, etc.).
    #[error("Operational error: {0}")]
    OperationalError(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The library is improperly configured.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    // ── Request ──────────────────────────────────────────────────────

    /// The submitted request could not be decoded.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The request body has a content type forms cannot read.
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    // ── Security ─────────────────────────────────────────────────────

    /// Hashing or verifying a password failed.
    #[error("Password hash error: {0}")]
    PasswordHashError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MiniformError {
    /// Returns the HTTP status code associated with this error.
    ///
    /// - `BadRequest`, `ValidationError`, `Upload` -> 400
    /// - `DoesNotExist` -> 404
    /// - `UnsupportedMediaType` -> 415
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::ValidationError(_) | Self::Upload(_) => 400,
            Self::DoesNotExist(_) => 404,
            Self::UnsupportedMediaType(_) => 415,
            Self::FieldNotFound(_)
            | Self::MultipleObjectsReturned(_)
            | Self::DatabaseError(_)
            | Self::IntegrityError(_)
            | Self::OperationalError(_)
            | Self::ConfigurationError(_)
            | Self::ImproperlyConfigured(_)
            | Self::PasswordHashError(_)
            | Self::SerializationError(_)
            | Self::IoError(_) => 500,
        }
    }
}

impl From<serde_json::Error> for MiniformError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// A convenience type alias for `Result<T, MiniformError>`.
pub type MiniformResult<T> = Result<T, MiniformError>;
