//! Error types for ledger operations.

use thiserror::Error;

use crate::Credits;
use crate::model::AccountId;
use crate::store::StoreError;

/// Error returned by [`Ledger`](super::Ledger) operations.
///
/// Only `StorageUnavailable` means the store could not be reached. Every
/// error means nothing was written.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("transfer amount must include at least one sms or email credit")]
    EmptyTransfer,

    #[error("account {0} cannot transfer credit to itself")]
    SelfTransfer(AccountId),

    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("account {0} already exists")]
    AccountExists(AccountId),

    #[error("insufficient balance on account {account}: available {available}, requested {requested}")]
    InsufficientBalance {
        account: AccountId,
        available: Credits,
        requested: Credits,
    },

    #[error("crediting account {0} would overflow its balance")]
    BalanceOverflow(AccountId),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The store refused a write for a reason the ledger does not model.
    #[error("store rejected the write: {0}")]
    Rejected(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => LedgerError::StorageUnavailable(reason),
            StoreError::AccountExists(id) => LedgerError::AccountExists(id),
            StoreError::AccountMissing(id) => LedgerError::AccountNotFound(id),
            StoreError::SelfTransfer(id) => LedgerError::SelfTransfer(id),
            other @ StoreError::GroupMissing(_) => LedgerError::Rejected(other),
        }
    }
}
