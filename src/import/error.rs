use thiserror::Error;

use crate::model::{AccountId, GroupId};
use crate::store::StoreError;

/// Error returned by [`Importer`](super::Importer) operations.
///
/// Only `StorageUnavailable` means the store could not be reached.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The group does not exist, or belongs to another account.
    #[error("group {group} not found for account {owner}")]
    GroupNotFound { owner: AccountId, group: GroupId },

    #[error("account {0} not found")]
    OwnerNotFound(AccountId),

    #[error("group name must not be empty")]
    EmptyGroupName,

    #[error("contact needs a phone number or an email address")]
    EmptyContact,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The store refused a write for a reason the importer does not model.
    #[error("store rejected the write: {0}")]
    Rejected(StoreError),
}

impl ImportError {
    /// Map a store error raised while acting for `owner`.
    pub(super) fn from_store(owner: AccountId) -> impl Fn(StoreError) -> ImportError {
        move |err| match err {
            StoreError::Unavailable(reason) => ImportError::StorageUnavailable(reason),
            StoreError::AccountMissing(id) => ImportError::OwnerNotFound(id),
            StoreError::GroupMissing(group) => ImportError::GroupNotFound { owner, group },
            other => ImportError::Rejected(other),
        }
    }
}
