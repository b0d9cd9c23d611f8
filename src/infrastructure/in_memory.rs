use super::row_locks::{HeldRows, RowLocks};
use crate::domain::account::{Account, AccountId, Balance};
use crate::domain::ports::{LedgerStore, UnitOfWork, UnitOfWorkBox};
use crate::domain::transfer::{TransferId, TransferRecord, ValidatedTransfer};
use crate::error::{AccountError, StoreError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Ledger {
    accounts: HashMap<AccountId, Account>,
    transfers: BTreeMap<TransferId, TransferRecord>,
}

/// A thread-safe in-memory ledger.
///
/// Accounts and the transfer log sit behind one `RwLock`, so a commit publishes
/// both balance changes and the log entry in a single step. Row holds come from
/// a shared [`RowLocks`] table. Ideal for testing or when persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    ledger: Arc<RwLock<Ledger>>,
    locks: Arc<RowLocks>,
    last_transfer_id: Arc<AtomicI64>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_account(&self, account: Account) -> Result<Account, AccountError> {
        let mut ledger = self.ledger.write().await;
        if ledger.accounts.contains_key(&account.id) {
            return Err(AccountError::AlreadyExists(account.id));
        }
        ledger.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let ledger = self.ledger.read().await;
        Ok(ledger.accounts.get(&id).cloned())
    }

    async fn all_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let ledger = self.ledger.read().await;
        let mut accounts: Vec<Account> = ledger.accounts.values().cloned().collect();
        accounts.sort_by_key(|account| account.id);
        Ok(accounts)
    }

    async fn all_transfers(&self) -> Result<Vec<TransferRecord>, StoreError> {
        let ledger = self.ledger.read().await;
        Ok(ledger.transfers.values().cloned().collect())
    }

    async fn begin(&self) -> Result<UnitOfWorkBox, StoreError> {
        Ok(Box::new(InMemoryUnitOfWork {
            store: self.clone(),
            held: HeldRows::default(),
            balances: HashMap::new(),
            transfers: Vec::new(),
        }))
    }
}

/// Unit of work over an [`InMemoryLedgerStore`].
///
/// Writes are staged locally and only reach the shared ledger in `commit`.
pub struct InMemoryUnitOfWork {
    store: InMemoryLedgerStore,
    held: HeldRows,
    balances: HashMap<AccountId, Balance>,
    transfers: Vec<TransferRecord>,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.held.hold(&self.store.locks, id).await;

        if let Some(balance) = self.balances.get(&id) {
            return Ok(Some(Account::new(id, *balance)));
        }
        let ledger = self.store.ledger.read().await;
        Ok(ledger.accounts.get(&id).cloned())
    }

    async fn write_balance(&mut self, id: AccountId, balance: Balance) -> Result<(), StoreError> {
        self.held.ensure_held(id)?;
        self.balances.insert(id, balance);
        Ok(())
    }

    async fn append_transfer(
        &mut self,
        transfer: &ValidatedTransfer,
    ) -> Result<TransferRecord, StoreError> {
        let id = self.store.last_transfer_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = TransferRecord::new(id, transfer);
        self.transfers.push(record.clone());
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        // `_held` keeps the row holds alive until the ledger is updated.
        let InMemoryUnitOfWork {
            store,
            held: _held,
            balances,
            transfers,
        } = *self;
        let mut ledger = store.ledger.write().await;

        if let Some(missing) = balances
            .keys()
            .find(|id| !ledger.accounts.contains_key(*id))
        {
            return Err(StoreError::backend(format!(
                "balance written for unknown account {missing}"
            )));
        }

        for (id, balance) in balances {
            if let Some(account) = ledger.accounts.get_mut(&id) {
                account.balance = balance;
            }
        }
        for record in transfers {
            ledger.transfers.insert(record.id, record);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
