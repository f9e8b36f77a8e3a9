use thiserror::Error;

use crate::model::{AccountId, GroupId};
use crate::store::StoreError;

/// Error returned by [`Campaigns`](super::Campaigns) operations.
#[derive(Debug, Error)]
pub enum CampaignError {
    /// A required text field is blank.
    #[error("campaign {0} must not be empty")]
    MissingField(&'static str),

    #[error("a from-list campaign needs a contact group")]
    MissingGroup,

    #[error("account {0} not found")]
    OwnerNotFound(AccountId),

    #[error("group {group} not found for account {owner}")]
    GroupNotFound { owner: AccountId, group: GroupId },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The store refused a write for a reason campaigns do not model.
    #[error("store rejected the write: {0}")]
    Rejected(StoreError),
}

impl CampaignError {
    /// Map a store error raised while acting for `owner`.
    pub(super) fn from_store(owner: AccountId) -> impl Fn(StoreError) -> CampaignError {
        move |err| match err {
            StoreError::Unavailable(reason) => CampaignError::StorageUnavailable(reason),
            StoreError::AccountMissing(id) => CampaignError::OwnerNotFound(id),
            StoreError::GroupMissing(group) => CampaignError::GroupNotFound { owner, group },
            other => CampaignError::Rejected(other),
        }
    }
}
