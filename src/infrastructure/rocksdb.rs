use super::row_locks::{HeldRows, RowLocks};
use crate::domain::account::{Account, AccountId, Balance};
use crate::domain::ports::{LedgerStore, UnitOfWork, UnitOfWorkBox};
use crate::domain::transfer::{TransferId, TransferRecord, ValidatedTransfer};
use crate::error::{AccountError, StoreError};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch, WriteOptions,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Column Family for storing account states.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for storing the transfer log.
pub const CF_TRANSFERS: &str = "transfers";

/// A persistent ledger implementation using RocksDB.
///
/// Accounts and transfers live in separate Column Families, keyed by the
/// big-endian id so iteration follows id order. RocksDB has no row locks of its
/// own here, so holds come from a process-wide [`RowLocks`] table and every
/// unit of work lands as one synced `WriteBatch`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    locks: Arc<RowLocks>,
    last_transfer_id: Arc<AtomicI64>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("accounts" and "transfers") exist
    /// and resumes transfer id assignment after the highest stored id.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_accounts = ColumnFamilyDescriptor::new(CF_ACCOUNTS, Options::default());
        let cf_transfers = ColumnFamilyDescriptor::new(CF_TRANSFERS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_accounts, cf_transfers])?;

        let store = Self {
            db: Arc::new(db),
            locks: Arc::new(RowLocks::new()),
            last_transfer_id: Arc::new(AtomicI64::new(0)),
        };
        let last_id = store.last_stored_transfer_id()?;
        store.last_transfer_id.store(last_id, Ordering::SeqCst);
        tracing::debug!(last_transfer_id = last_id, "opened RocksDB ledger");

        Ok(store)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db.cf_handle(name).ok_or_else(|| {
            StoreError::backend(format!("{name} column family not found"))
        })
    }

    fn last_stored_transfer_id(&self) -> Result<TransferId, StoreError> {
        let cf = self.cf(CF_TRANSFERS)?;
        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => {
                let (key, _value) = item?;
                decode_key(&key)
            }
            None => Ok(0),
        }
    }

    fn read_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let cf = self.cf(CF_ACCOUNTS)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>, StoreError> {
        let cf = self.cf(cf_name)?;
        let mut items = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }

    fn synced_write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        self.db.write_opt(batch, &write_opts)?;
        Ok(())
    }
}

fn decode_key(key: &[u8]) -> Result<i64, StoreError> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| StoreError::corrupted(format!("unexpected key length {}", key.len())))?;
    Ok(i64::from_be_bytes(bytes))
}

fn put_json<T: Serialize>(
    batch: &mut WriteBatch,
    cf: &ColumnFamily,
    id: i64,
    value: &T,
) -> Result<(), StoreError> {
    batch.put_cf(cf, id.to_be_bytes(), serde_json::to_vec(value)?);
    Ok(())
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn create_account(&self, account: Account) -> Result<Account, AccountError> {
        // The row hold keeps two concurrent creations of one id from both succeeding.
        let _guard = self.locks.acquire(account.id).await;

        if self.read_account(account.id)?.is_some() {
            return Err(AccountError::AlreadyExists(account.id));
        }

        let mut batch = WriteBatch::default();
        put_json(&mut batch, self.cf(CF_ACCOUNTS)?, account.id, &account)?;
        self.synced_write(batch)?;
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.read_account(id)
    }

    async fn all_accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.scan(CF_ACCOUNTS)
    }

    async fn all_transfers(&self) -> Result<Vec<TransferRecord>, StoreError> {
        self.scan(CF_TRANSFERS)
    }

    async fn begin(&self) -> Result<UnitOfWorkBox, StoreError> {
        Ok(Box::new(RocksDBUnitOfWork {
            store: self.clone(),
            held: HeldRows::default(),
            balances: HashMap::new(),
            transfers: Vec::new(),
        }))
    }
}

/// Unit of work over a [`RocksDBStore`]. Staged writes become one `WriteBatch` on commit.
pub struct RocksDBUnitOfWork {
    store: RocksDBStore,
    held: HeldRows,
    balances: HashMap<AccountId, Balance>,
    transfers: Vec<TransferRecord>,
}

#[async_trait]
impl UnitOfWork for RocksDBUnitOfWork {
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.held.hold(&self.store.locks, id).await;

        if let Some(balance) = self.balances.get(&id) {
            return Ok(Some(Account::new(id, *balance)));
        }
        self.store.read_account(id)
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
        let RocksDBUnitOfWork {
            store,
            held: _held,
            balances,
            transfers,
        } = *self;

        let cf_accounts = store.cf(CF_ACCOUNTS)?;
        let cf_transfers = store.cf(CF_TRANSFERS)?;

        let mut batch = WriteBatch::default();
        for (id, balance) in balances {
            put_json(&mut batch, cf_accounts, id, &Account::new(id, balance))?;
        }
        for record in &transfers {
            put_json(&mut batch, cf_transfers, record.id, record)?;
        }
        store.synced_write(batch)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
