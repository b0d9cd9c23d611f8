use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use transfer_ledger::application::engine::TransferEngine;
use transfer_ledger::config::{HttpConfig, LogConfig, StorageConfig};
use transfer_ledger::domain::account::AccountId;
use transfer_ledger::domain::transfer::TransferRequest;
use transfer_ledger::interfaces::csv::account_writer::AccountWriter;
use transfer_ledger::interfaces::csv::command_reader::CommandReader;
use transfer_ledger::interfaces::http;
use transfer_ledger::logging::init_logging;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    log: LogConfig,

    #[command(flatten)]
    storage: StorageConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the JSON API
    Serve(HttpConfig),

    /// Run a CSV file of ledger commands and print the final balances
    Replay {
        /// Input commands CSV file
        input: PathBuf,
    },

    /// Open an account
    CreateAccount {
        #[arg(long)]
        id: AccountId,
        #[arg(long, allow_hyphen_values = true)]
        balance: Decimal,
    },

    /// Print one account
    GetAccount {
        #[arg(long)]
        id: AccountId,
    },

    /// Move funds between two accounts
    Transfer {
        #[arg(long)]
        from: AccountId,
        #[arg(long)]
        to: AccountId,
        #[arg(long, allow_hyphen_values = true)]
        amount: Decimal,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    let store = cli.storage.open().await.into_diagnostic()?;
    let span = tracing::info_span!("ledger", env = ?cli.log.environment);
    let engine = Arc::new(TransferEngine::new(store, span));

    match cli.command {
        Command::Serve(config) => {
            http::serve(engine, config.socket_addr())
                .await
                .into_diagnostic()?;
        }
        Command::Replay { input } => replay(&engine, input).await?,
        Command::CreateAccount { id, balance } => {
            let account = engine.create_account(id, balance).await.into_diagnostic()?;
            print_json(&account)?;
        }
        Command::GetAccount { id } => {
            let account = engine.get_account(id).await.into_diagnostic()?;
            print_json(&account)?;
        }
        Command::Transfer { from, to, amount } => {
            let record = engine
                .transfer(TransferRequest::new(from, to, amount))
                .await
                .into_diagnostic()?;
            print_json(&record)?;
        }
    }

    Ok(())
}

async fn replay(engine: &TransferEngine, input: PathBuf) -> Result<()> {
    let file = File::open(input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                if let Err(e) = command.execute(engine).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    let accounts = engine.accounts().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(accounts).into_diagnostic()?;

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    serde_json::to_writer_pretty(stdout.lock(), value).into_diagnostic()?;
    println!();
    Ok(())
}
