//! Domain models shared by repositories, services and the HTTP layer.
//!
//! # Responsibility
//! - Define the records for accounts, library catalog, blog and social data.
//! - Own field-level validation that does not need storage access.
//!
//! # Invariants
//! - Every persisted record is identified by a SQLite integer primary key.
//! - Timestamps are Unix epoch milliseconds.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod blog;
pub mod library;
pub mod notification;
pub mod page;
pub mod social;
pub mod user;

/// Field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Name of the offending input field as seen by API callers.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Error for ValidationError {}

/// Rejects blank values and values longer than `max_chars`.
pub(crate) fn require_text(
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "this field may not be blank"));
    }
    if value.chars().count() > max_chars {
        return Err(ValidationError::new(
            field,
            format!("ensure this field has no more than {max_chars} characters"),
        ));
    }
    Ok(())
}
