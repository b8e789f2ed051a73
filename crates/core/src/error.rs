//! Error taxonomy shared by every core operation
//!
//! All failures are returned to the immediate caller. Nothing in the core
//! retries or swallows an error; recovery belongs to the editing surface.

use thiserror::Error;

/// Error type for section, block and template operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// A referenced id does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A structural edit would break the two-level hierarchy or create a cycle.
    #[error("Invalid move: {0}")]
    InvalidMove(String),

    /// Two nodes claim the same number after renumbering.
    #[error("Number conflict: \"{number}\" is claimed by {}", .nodes.join(", "))]
    NumberConflict { number: String, nodes: Vec<String> },

    /// Malformed edit, reorder or configuration request.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The template declares no section rules at all.
    #[error("Template {0} declares no section rules")]
    TemplateMismatch(String),
}

impl DocumentError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        DocumentError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        DocumentError::Validation(msg.into())
    }

    pub fn invalid_move(msg: impl Into<String>) -> Self {
        DocumentError::InvalidMove(msg.into())
    }
}

/// Error returned when a custom section number is malformed.
#[derive(Debug, Error)]
#[error("Invalid section number {0:?} (expected dotted alphanumeric segments such as 'A' or '3.1')")]
pub struct InvalidNumber(pub String);

impl From<InvalidNumber> for DocumentError {
    fn from(e: InvalidNumber) -> Self {
        DocumentError::Validation(e.to_string())
    }
}
