use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::model::{Account, AccountId, LedgerCommand, NewAccount, NewTransfer};
use crate::Credits;

/// Errors that can occur when reading commands or writing balances
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open command file: {0}")]
    Open(csv::Error),

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized command type '{command}'")]
    UnrecognizedType { line: usize, command: String },

    #[error("line {line}: transfer missing counterparty")]
    MissingCounterparty { line: usize },

    #[error("failed to write balances: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush balances: {0}")]
    Flush(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    account: AccountId,
    counterparty: Option<AccountId>,
    sms: Option<u64>,
    email: Option<u64>,
    note: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    account: AccountId,
    parent: Option<AccountId>,
    sms: u64,
    email: u64,
}

/// Read ledger commands from a csv file.
///
/// `open` rows create `account` (under `counterparty` when given) with an
/// initial grant of `sms`/`email`; `transfer` rows move `sms`/`email` from
/// `account` to `counterparty`.
pub fn read_commands(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<LedgerCommand, CsvError>>, CsvError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(CsvError::Open)?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            let amount = Credits::new(row.sms.unwrap_or(0), row.email.unwrap_or(0));
            match row.r#type.as_str() {
                "open" => {
                    let mut account = NewAccount::new(row.account, amount);
                    account.parent = row.counterparty;
                    Ok(LedgerCommand::Open(account))
                }
                "transfer" => {
                    let to = row
                        .counterparty
                        .ok_or(CsvError::MissingCounterparty { line })?;
                    Ok(LedgerCommand::Transfer(NewTransfer {
                        from: row.account,
                        to,
                        amount,
                        note: row.note.filter(|note| !note.is_empty()),
                    }))
                }
                other => Err(CsvError::UnrecognizedType {
                    line,
                    command: other.to_string(),
                }),
            }
        }))
}

/// Write account balances in csv format
pub fn write_accounts<'a, W: io::Write>(
    writer: W,
    accounts: impl IntoIterator<Item = &'a Account>,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(writer);

    for account in accounts {
        writer.serialize(OutputRow {
            account: account.id,
            parent: account.parent,
            sms: account.balance.sms,
            email: account.balance.email,
        })?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn read(content: &str) -> Vec<Result<LedgerCommand, CsvError>> {
        let file = write_csv(content);
        read_commands(file.path()).unwrap().collect()
    }

    #[test]
    fn read_open() {
        let results = read("type,account,counterparty,sms,email,note\nopen,2,1,100,50,\n");
        assert_eq!(results.len(), 1);

        match results.into_iter().next().unwrap().unwrap() {
            LedgerCommand::Open(account) => {
                assert_eq!(account.id, 2);
                assert_eq!(account.parent, Some(1));
                assert_eq!(account.initial_grant, Credits::new(100, 50));
            }
            other => panic!("expected open, got {other:?}"),
        }
    }

    #[test]
    fn read_open_without_parent() {
        let results = read("type,account,counterparty,sms,email,note\nopen,1,,10,,\n");
        match results.into_iter().next().unwrap().unwrap() {
            LedgerCommand::Open(account) => {
                assert_eq!(account.parent, None);
                assert_eq!(account.initial_grant, Credits::new(10, 0));
            }
            other => panic!("expected open, got {other:?}"),
        }
    }

    #[test]
    fn read_transfer_with_note() {
        let results =
            read("type,account,counterparty,sms,email,note\ntransfer,1,2,30,10,top-up\n");
        let command = results.into_iter().next().unwrap().unwrap();
        assert_eq!(
            command,
            LedgerCommand::Transfer(NewTransfer {
                from: 1,
                to: 2,
                amount: Credits::new(30, 10),
                note: Some("top-up".to_string()),
            })
        );
    }

    #[test]
    fn read_with_whitespace() {
        let results = read("type, account, counterparty, sms, email, note\ntransfer, 1, 2, 3, 0, \n");
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[test]
    fn read_returns_error_for_unknown_type() {
        let results = read("type,account,counterparty,sms,email,note\nrefund,1,2,1,0,\n");
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::UnrecognizedType { line: 2, .. }));
    }

    #[test]
    fn read_returns_error_for_missing_counterparty() {
        let results = read("type,account,counterparty,sms,email,note\ntransfer,1,,1,0,\n");
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::MissingCounterparty { line: 2 }));
    }

    #[test]
    fn read_returns_error_for_negative_amount() {
        let results = read("type,account,counterparty,sms,email,note\ntransfer,1,2,-5,0,\n");
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::Parse { line: 2, .. }));
    }

    #[test]
    fn read_missing_file() {
        assert!(matches!(
            read_commands("/nonexistent/commands.csv"),
            Err(CsvError::Open(_))
        ));
    }

    #[test]
    fn write_balances() {
        let accounts = vec![
            Account {
                id: 1,
                name: None,
                email: None,
                parent: None,
                balance: Credits::new(70, 40),
                created_at: Utc::now(),
            },
            Account {
                id: 2,
                name: None,
                email: None,
                parent: Some(1),
                balance: Credits::new(30, 10),
                created_at: Utc::now(),
            },
        ];
        let mut output = Vec::new();
        write_accounts(&mut output, &accounts).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "account,parent,sms,email\n1,,70,40\n2,1,30,10\n"
        );
    }
}
