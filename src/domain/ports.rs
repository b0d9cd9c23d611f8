use super::account::{Account, AccountId, Balance};
use super::transfer::{TransferRecord, ValidatedTransfer};
use crate::error::{AccountError, StoreError};
use async_trait::async_trait;

pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type UnitOfWorkBox = Box<dyn UnitOfWork>;

/// Durable home of accounts and the transfer log.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts a new account. Fails with [`AccountError::AlreadyExists`] if the id is taken.
    async fn create_account(&self, account: Account) -> Result<Account, AccountError>;
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;
    /// Every account, ordered by id.
    async fn all_accounts(&self) -> Result<Vec<Account>, StoreError>;
    /// The whole transfer log, ordered by id.
    async fn all_transfers(&self) -> Result<Vec<TransferRecord>, StoreError>;
    /// Opens a unit of work. Nothing it does is visible until [`UnitOfWork::commit`].
    async fn begin(&self) -> Result<UnitOfWorkBox, StoreError>;
}

/// One atomic sequence of reads and writes against a [`LedgerStore`].
///
/// Dropping a unit of work without committing must behave like
/// [`UnitOfWork::rollback`]: staged writes vanish and every hold is released.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Takes an exclusive hold on the account row, waiting if another unit of
    /// work has it, then reads the row. Returns `None` when the account does not exist.
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError>;
    /// Overwrites the balance of a row held by this unit of work.
    async fn write_balance(&mut self, id: AccountId, balance: Balance) -> Result<(), StoreError>;
    /// Appends a transfer to the log and returns it with its assigned id.
    async fn append_transfer(
        &mut self,
        transfer: &ValidatedTransfer,
    ) -> Result<TransferRecord, StoreError>;
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
