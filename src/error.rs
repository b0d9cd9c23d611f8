use crate::domain::account::{AccountId, Balance};
use rust_decimal::Decimal;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Structural or semantic problems with a transfer request.
///
/// Raised before the store is touched. Never retried.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("source and destination account IDs cannot be the same")]
    SameAccount,
    #[error("amount should be greater than zero")]
    NonPositiveAmount,
    #[error("invalid account IDs")]
    InvalidAccountId,
}

/// Which side of a transfer an account was on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRole {
    Source,
    Destination,
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRole::Source => f.write_str("source"),
            AccountRole::Destination => f.write_str("destination"),
        }
    }
}

/// Failure of a ledger backend.
///
/// The display text stays generic. The backend error is only
/// reachable through [`std::error::Error::source`] so it can be logged
/// without being handed to untrusted callers.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("ledger store failure")]
    Backend(#[source] BoxError),
    #[error("ledger store holds malformed data")]
    Corrupted(#[source] BoxError),
    #[error("row {0} written without holding its lock")]
    LockNotHeld(AccountId),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        StoreError::Backend(err.into())
    }

    pub fn corrupted<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        StoreError::Corrupted(err.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::corrupted(err)
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        StoreError::backend(err)
    }
}

#[cfg(feature = "storage-postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::backend(err)
    }
}

/// Rejections raised while a transfer runs against the store.
///
/// In every case the store is left exactly as it was before the call.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("{role} account {id} not found")]
    AccountNotFound { id: AccountId, role: AccountRole },
    #[error("insufficient balance in account {id}: available {available}, requested {requested}")]
    InsufficientFunds {
        id: AccountId,
        available: Balance,
        requested: Decimal,
    },
    #[error("balance of account {id} cannot hold the result exactly")]
    BalanceOutOfRange { id: AccountId },
    #[error(transparent)]
    StoreFailure(#[from] StoreError),
}

/// Everything [`crate::application::engine::TransferEngine::transfer`] can return.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("invalid account ID: {0}")]
    InvalidAccountId(AccountId),
    #[error("initial balance cannot be negative")]
    NegativeBalance,
    #[error("account {0} already exists")]
    AlreadyExists(AccountId),
    #[error("account {0} not found")]
    NotFound(AccountId),
    #[error(transparent)]
    StoreFailure(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Stable, caller-facing code for each error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    SameAccount,
    InvalidAmount,
    InvalidAccountIds,
    InsufficientBalance,
    BalanceOutOfRange,
    AccountNotFound,
    AccountExists,
    InvalidBalance,
    InvalidRequest,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::SameAccount => "same_account",
            ErrorCode::InvalidAmount => "invalid_amount",
            ErrorCode::InvalidAccountIds => "invalid_account_ids",
            ErrorCode::InsufficientBalance => "insufficient_balance",
            ErrorCode::BalanceOutOfRange => "balance_out_of_range",
            ErrorCode::AccountNotFound => "account_not_found",
            ErrorCode::AccountExists => "account_exists",
            ErrorCode::InvalidBalance => "invalid_balance",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ValidationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ValidationError::SameAccount => ErrorCode::SameAccount,
            ValidationError::NonPositiveAmount => ErrorCode::InvalidAmount,
            ValidationError::InvalidAccountId => ErrorCode::InvalidAccountIds,
        }
    }
}

impl ExecutionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ExecutionError::AccountNotFound { .. } => ErrorCode::AccountNotFound,
            ExecutionError::InsufficientFunds { .. } => ErrorCode::InsufficientBalance,
            ExecutionError::BalanceOutOfRange { .. } => ErrorCode::BalanceOutOfRange,
            ExecutionError::StoreFailure(_) => ErrorCode::Internal,
        }
    }
}

impl TransferError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TransferError::Validation(err) => err.code(),
            TransferError::Execution(err) => err.code(),
        }
    }
}

impl AccountError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AccountError::InvalidAccountId(_) => ErrorCode::InvalidAccountIds,
            AccountError::NegativeBalance => ErrorCode::InvalidBalance,
            AccountError::AlreadyExists(_) => ErrorCode::AccountExists,
            AccountError::NotFound(_) => ErrorCode::AccountNotFound,
            AccountError::StoreFailure(_) => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_hides_backend_detail() {
        let err = StoreError::backend(std::io::Error::other("password=hunter2"));
        assert_eq!(err.to_string(), "ledger store failure");

        let source = err.source().map(|s| s.to_string()).unwrap_or_default();
        assert!(source.contains("hunter2"));
    }

    #[test]
    fn test_execution_error_codes() {
        let not_found = ExecutionError::AccountNotFound {
            id: 7,
            role: AccountRole::Destination,
        };
        assert_eq!(not_found.code(), ErrorCode::AccountNotFound);
        assert_eq!(not_found.to_string(), "destination account 7 not found");

        let store = ExecutionError::from(StoreError::LockNotHeld(3));
        assert_eq!(store.code().as_str(), "internal_error");
    }

    #[test]
    fn test_transfer_error_delegates_code() {
        let err = TransferError::from(ValidationError::NonPositiveAmount);
        assert_eq!(err.code(), ErrorCode::InvalidAmount);
        assert_eq!(err.to_string(), "amount should be greater than zero");
    }
}
