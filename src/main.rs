use std::env;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use dealer_credits::csv::{read_commands, write_accounts};
use dealer_credits::{Ledger, MemoryStore};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: dealer-credits <commands.csv>");
        return ExitCode::FAILURE;
    };

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let commands = match read_commands(path) {
        Ok(commands) => commands,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let ledger = Ledger::new(Arc::new(MemoryStore::new()));
    let (tx_sender, tx_receiver) = tokio::sync::mpsc::channel(16);

    let reader = tokio::spawn(async move {
        for result in commands {
            match result {
                Ok(command) => {
                    if tx_sender.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    ledger.run(ReceiverStream::new(tx_receiver)).await;
    if let Err(e) = reader.await {
        error!("command reader failed: {e}");
        return ExitCode::FAILURE;
    }

    let accounts = match ledger.accounts().await {
        Ok(accounts) => accounts,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = write_accounts(io::stdout().lock(), &accounts) {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
