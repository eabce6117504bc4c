use crate::domain::book::BookId;
use crate::domain::borrowing::{BorrowingId, BorrowingStatus};
use crate::domain::policy::DenialReason;
use crate::domain::user::UserId;
use std::fmt;
use thiserror::Error;

/// Identifies the record a `NotFound` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    User(UserId),
    Book(BookId),
    Borrowing(BorrowingId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::User(id) => write!(f, "user {}", id),
            EntityRef::Book(id) => write!(f, "book {}", id),
            EntityRef::Borrowing(id) => write!(f, "borrowing {}", id),
        }
    }
}

/// Coarse classification of a [`LendingError`].
///
/// Callers use it to tell a user-facing denial apart from a system fault
/// without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PolicyViolation,
    Conflict,
    ConstraintViolation,
    Inconsistency,
    InvalidTransition,
    InvalidInput,
    Infrastructure,
}

#[derive(Error, Debug)]
pub enum LendingError {
    #[error("{0} not found")]
    NotFound(EntityRef),
    #[error("Policy violation: {0}")]
    PolicyViolation(DenialReason),
    #[error("Conflict: no copy of book {0} left to lend")]
    Conflict(BookId),
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("Inconsistency: {0}")]
    Inconsistency(String),
    #[error("Invalid transition: borrowing {id} is {status}")]
    InvalidTransition {
        id: BorrowingId,
        status: BorrowingStatus,
    },
    #[error("Invalid loan period: {0} days")]
    InvalidLoanPeriod(i64),
    #[error("Borrowing {0} has no outstanding fine")]
    NoOutstandingFine(BorrowingId),
    #[error("Malformed command: {0}")]
    MalformedCommand(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    StorageError(Box<dyn std::error::Error + Send + Sync>),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
}

impl LendingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LendingError::NotFound(_) => ErrorKind::NotFound,
            LendingError::PolicyViolation(_) => ErrorKind::PolicyViolation,
            LendingError::Conflict(_) => ErrorKind::Conflict,
            LendingError::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            LendingError::Inconsistency(_) => ErrorKind::Inconsistency,
            LendingError::InvalidTransition { .. } | LendingError::NoOutstandingFine(_) => {
                ErrorKind::InvalidTransition
            }
            LendingError::InvalidLoanPeriod(_)
            | LendingError::MalformedCommand(_)
            | LendingError::InvalidConfig(_) => ErrorKind::InvalidInput,
            LendingError::CsvError(_)
            | LendingError::IoError(_)
            | LendingError::SerializationError(_)
            | LendingError::StorageError(_) => ErrorKind::Infrastructure,
            #[cfg(feature = "storage-rocksdb")]
            LendingError::RocksDbError(_) => ErrorKind::Infrastructure,
        }
    }

    /// Only a lost inventory race is safe to retry straight away; the retry
    /// re-evaluates the policy against fresh state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LendingError::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, LendingError>;
