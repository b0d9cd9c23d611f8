use crate::application::engine::TransferEngine;
use crate::domain::account::AccountId;
use crate::domain::transfer::TransferRequest;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Open,
    Transfer,
}

/// One row of a replay file: `type, account, to, amount`.
///
/// `open` rows leave `to` empty and use `amount` as the opening balance.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
pub struct CommandRecord {
    #[serde(rename = "type")]
    pub command_type: CommandType,
    pub account: AccountId,
    pub to: Option<AccountId>,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum LedgerCommand {
    Open {
        id: AccountId,
        initial_balance: Decimal,
    },
    Transfer(TransferRequest),
}

impl TryFrom<CommandRecord> for LedgerCommand {
    type Error = LedgerError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        match record.command_type {
            CommandType::Open => Ok(LedgerCommand::Open {
                id: record.account,
                initial_balance: record.amount,
            }),
            CommandType::Transfer => {
                let to = record.to.ok_or_else(|| {
                    LedgerError::InvalidRecord(format!(
                        "transfer from account {} has no destination",
                        record.account
                    ))
                })?;
                Ok(LedgerCommand::Transfer(TransferRequest::new(
                    record.account,
                    to,
                    record.amount,
                )))
            }
        }
    }
}

impl LedgerCommand {
    /// Runs the command against the engine. Rejections are returned, not logged.
    pub async fn execute(self, engine: &TransferEngine) -> Result<()> {
        match self {
            LedgerCommand::Open {
                id,
                initial_balance,
            } => {
                engine.create_account(id, initial_balance).await?;
            }
            LedgerCommand::Transfer(request) => {
                engine.transfer(request).await?;
            }
        }
        Ok(())
    }
}

/// Reads ledger commands from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace and tolerating a missing `to` column
/// on `open` rows.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes rows, so large files are streamed rather than loaded.
    pub fn commands(self) -> impl Iterator<Item = Result<LedgerCommand>> {
        self.reader
            .into_deserialize::<CommandRecord>()
            .map(|result| result.map_err(LedgerError::from).and_then(LedgerCommand::try_from))
    }
}
