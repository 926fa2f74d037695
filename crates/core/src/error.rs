//! Core error types

use thiserror::Error;

use crate::types::{AccountId, ParseEnumError};

/// Errors raised by domain transitions on an [`crate::Account`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("Please complete payment before registration")]
    PaymentNotApproved,

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Photo not found: {0}")]
    PhotoNotFound(String),
}

/// Errors that can occur in store, ledger and reporting operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Target of a vote is absent or not approved. The two cases are
    /// deliberately indistinguishable.
    #[error("Contestant not found")]
    ContestantNotFound,

    #[error("You have already voted for this contestant")]
    DuplicateVote,

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Payment id already in use: {0}")]
    DuplicatePaymentId(String),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<ParseEnumError> for StoreError {
    fn from(error: ParseEnumError) -> Self {
        StoreError::CorruptRecord(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// True when the rusqlite error is a UNIQUE/PRIMARY KEY violation
pub(crate) fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

/// Message attached to a constraint failure, used to tell which column collided
pub(crate) fn constraint_message(error: &rusqlite::Error) -> Option<&str> {
    match error {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => Some(msg.as_str()),
        _ => None,
    }
}
