use super::account::{AccountId, Amount};
use crate::error::ValidationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Store-assigned identifier of a committed transfer.
pub type TransferId = i64;

/// A caller's request to move funds. Nothing about it has been checked yet.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub struct TransferRequest {
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    pub amount: Decimal,
}

/// A request that passed [`TransferRequest::validate`].
///
/// This is the only input the engine executes, so an unchecked request can
/// never reach the store.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ValidatedTransfer {
    source: AccountId,
    destination: AccountId,
    amount: Amount,
}

impl ValidatedTransfer {
    pub fn source(&self) -> AccountId {
        self.source
    }

    pub fn destination(&self) -> AccountId {
        self.destination
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

/// Immutable log entry written by a committed transfer.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct TransferRecord {
    pub id: TransferId,
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    pub amount: Decimal,
}

impl TransferRecord {
    pub fn new(id: TransferId, transfer: &ValidatedTransfer) -> Self {
        Self {
            id,
            source_account_id: transfer.source,
            destination_account_id: transfer.destination,
            amount: transfer.amount.value(),
        }
    }
}

impl TransferRequest {
    pub fn new(source: AccountId, destination: AccountId, amount: Decimal) -> Self {
        Self {
            source_account_id: source,
            destination_account_id: destination,
            amount,
        }
    }

    /// Checks the request without touching any store. The first failing rule wins:
    /// identical accounts, then a non-positive amount, then non-positive ids.
    pub fn validate(&self) -> Result<ValidatedTransfer, ValidationError> {
        if self.source_account_id == self.destination_account_id {
            return Err(ValidationError::SameAccount);
        }
        let amount = Amount::new(self.amount)?;
        if self.source_account_id <= 0 || self.destination_account_id <= 0 {
            return Err(ValidationError::InvalidAccountId);
        }

        Ok(ValidatedTransfer {
            source: self.source_account_id,
            destination: self.destination_account_id,
            amount,
        })
    }
}
