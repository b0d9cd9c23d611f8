//! PostgreSQL ledger backed by `sqlx`.
//!
//! Row holds are PostgreSQL row locks taken with `SELECT ... FOR UPDATE`, and a
//! unit of work is a plain database transaction.

use crate::domain::account::{Account, AccountId, Balance};
use crate::domain::ports::{LedgerStore, UnitOfWork, UnitOfWorkBox};
use crate::domain::transfer::{TransferRecord, ValidatedTransfer};
use crate::error::{AccountError, StoreError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::collections::HashSet;
use std::time::Duration;

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// PostgreSQL connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// How long to wait for a free connection before giving up.
    pub acquire_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/ledger".to_string(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

type AccountRow = (AccountId, Decimal);
type TransferRow = (i64, AccountId, AccountId, Decimal);

fn into_account((id, balance): AccountRow) -> Account {
    Account::new(id, Balance::new(balance))
}

fn into_transfer(
    (id, source_account_id, destination_account_id, amount): TransferRow,
) -> TransferRecord {
    TransferRecord {
        id,
        source_account_id,
        destination_account_id,
        amount,
    }
}

#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Create a new connection pool
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await?;

        tracing::info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    /// Applies the schema under `migrations/`.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        tracing::info!("database migrations applied successfully");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_account(&self, account: Account) -> Result<Account, AccountError> {
        let row: Option<AccountRow> = sqlx::query_as(
            "INSERT INTO accounts (id, balance) VALUES ($1, $2)
             ON CONFLICT (id) DO NOTHING
             RETURNING id, balance",
        )
        .bind(account.id)
        .bind(account.balance.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;

        row.map(into_account)
            .ok_or(AccountError::AlreadyExists(account.id))
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRow> =
            sqlx::query_as("SELECT id, balance FROM accounts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(into_account))
    }

    async fn all_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let rows: Vec<AccountRow> = sqlx::query_as("SELECT id, balance FROM accounts ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(into_account).collect())
    }

    async fn all_transfers(&self) -> Result<Vec<TransferRecord>, StoreError> {
        let rows: Vec<TransferRow> = sqlx::query_as(
            "SELECT id, source_account_id, destination_account_id, amount
             FROM transfers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(into_transfer).collect())
    }

    async fn begin(&self) -> Result<UnitOfWorkBox, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork {
            tx,
            held: HashSet::new(),
        }))
    }
}

/// Unit of work over a database transaction. `sqlx` rolls the transaction back
/// if it is dropped before commit.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    held: HashSet<AccountId>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRow> =
            sqlx::query_as("SELECT id, balance FROM accounts WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;
        self.held.insert(id);
        Ok(row.map(into_account))
    }

    async fn write_balance(&mut self, id: AccountId, balance: Balance) -> Result<(), StoreError> {
        if !self.held.contains(&id) {
            return Err(StoreError::LockNotHeld(id));
        }
        sqlx::query("UPDATE accounts SET balance = $1 WHERE id = $2")
            .bind(balance.value())
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn append_transfer(
        &mut self,
        transfer: &ValidatedTransfer,
    ) -> Result<TransferRecord, StoreError> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO transfers (source_account_id, destination_account_id, amount)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(transfer.source())
        .bind(transfer.destination())
        .bind(transfer.amount().value())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(TransferRecord::new(id, transfer))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgUnitOfWork { tx, .. } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let PgUnitOfWork { tx, .. } = *self;
        tx.rollback().await?;
        Ok(())
    }
}
