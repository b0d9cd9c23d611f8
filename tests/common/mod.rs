#![allow(dead_code)]

use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use transfer_ledger::application::engine::TransferEngine;
use transfer_ledger::domain::account::{AccountId, Balance};
use transfer_ledger::infrastructure::in_memory::InMemoryLedgerStore;

/// A fresh in-memory engine with `accounts` opened at the given balances.
pub async fn engine_with(accounts: &[(AccountId, Decimal)]) -> Arc<TransferEngine> {
    let engine = TransferEngine::new(
        Box::new(InMemoryLedgerStore::new()),
        tracing::Span::none(),
    );
    for (id, balance) in accounts {
        engine.create_account(*id, *balance).await.unwrap();
    }
    Arc::new(engine)
}

pub async fn total_balance(engine: &TransferEngine) -> Balance {
    engine
        .accounts()
        .await
        .unwrap()
        .into_iter()
        .map(|account| account.balance)
        .sum()
}

/// Writes a replay file that opens `accounts` accounts with 100 each and then
/// chains `transfers` one-unit transfers around them.
pub fn generate_csv(path: &Path, accounts: i64, transfers: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["type", "account", "to", "amount"])?;
    for id in 1..=accounts {
        wtr.write_record(["open", &id.to_string(), "", "100"])?;
    }
    for i in 0..transfers {
        let from = (i as i64 % accounts) + 1;
        let to = (from % accounts) + 1;
        wtr.write_record(["transfer", &from.to_string(), &to.to_string(), "1"])?;
    }

    wtr.flush()?;
    Ok(())
}
