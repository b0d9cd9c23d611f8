use crate::domain::account::{Account, AccountId, Balance};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AccountRow {
    account: AccountId,
    balance: Balance,
}

/// Writes the `account,balance` report.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes one row per account, in the order given, and flushes.
    pub fn write_accounts(&mut self, accounts: impl IntoIterator<Item = Account>) -> Result<()> {
        for account in accounts {
            self.writer.serialize(AccountRow {
                account: account.id,
                balance: account.balance,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_write_accounts() {
        let mut out = Vec::new();
        AccountWriter::new(&mut out)
            .write_accounts(vec![
                Account::new(1, Balance::new(dec!(74.50))),
                Account::new(2, Balance::new(dec!(25.50))),
            ])
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "account,balance\n1,74.50\n2,25.50\n");
    }

    #[test]
    fn test_empty_ledger_writes_nothing() {
        let mut out = Vec::new();
        AccountWriter::new(&mut out).write_accounts(Vec::new()).unwrap();
        assert!(out.is_empty());
    }
}
