//! Helpers shared by unit tests across modules.

use std::{error::Error as StdError, fmt};

use sqlx::error::{DatabaseError, ErrorKind};

/// A database error carrying only a constraint kind, enough to drive the
/// `is_unique_violation` / `is_foreign_key_violation` branches.
#[derive(Debug)]
pub struct ConstraintError(pub ErrorKind);

impl fmt::Display for ConstraintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "constraint violated: {:?}", self.0)
    }
}

impl StdError for ConstraintError {}

impl DatabaseError for ConstraintError {
    fn message(&self) -> &str {
        "constraint violated"
    }

    fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> ErrorKind {
        match self.0 {
            ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
            ErrorKind::ForeignKeyViolation => ErrorKind::ForeignKeyViolation,
            ErrorKind::NotNullViolation => ErrorKind::NotNullViolation,
            ErrorKind::CheckViolation => ErrorKind::CheckViolation,
            _ => ErrorKind::Other,
        }
    }
}

pub fn db_error(kind: ErrorKind) -> sqlx::Error {
    sqlx::Error::Database(Box::new(ConstraintError(kind)))
}
