//! Storage ports for accounts, transfers, contacts and campaigns.
//!
//! The ledger, the importer and the campaign book only talk to storage
//! through these traits. Implementations must make
//! [`AccountStore::apply_transfer`] and [`ContactStore::commit_import`]
//! atomic: either every write of the call is visible afterwards, or none is.

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::Credits;
use crate::model::{
    Account, AccountId, Contact, ContactGroup, EmailCampaign, GroupId, ImportRecord, NewAccount,
    NewContact, NewEmailCampaign, NewImport, NewSmsCampaign, NewTransfer, SmsCampaign,
    TransferRecord,
};

mod memory;
pub use memory::MemoryStore;

/// Errors raised by the storage layer.
///
/// Only `Unavailable` means the store could not be reached; the other
/// variants are constraint violations on an otherwise healthy store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("account {0} already exists")]
    AccountExists(AccountId),

    #[error("account {0} does not exist")]
    AccountMissing(AccountId),

    /// The group does not exist, or is not owned by the account the write is for.
    #[error("group {0} does not exist")]
    GroupMissing(GroupId),

    #[error("transfer source and destination are both {0}")]
    SelfTransfer(AccountId),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a conditional transfer write.
///
/// Anything other than `Applied` means nothing was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Applied(TransferRecord),
    /// The source balance did not cover the amount at write time.
    InsufficientBalance { available: Credits },
    AccountMissing(AccountId),
    /// Crediting the destination would overflow its balance.
    Overflow(AccountId),
}

/// Accounts, balances and the transfer log.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account. Fails with `AccountExists` if the id is taken and
    /// `AccountMissing` if the parent does not exist.
    async fn insert_account(&self, account: NewAccount) -> StoreResult<Account>;

    async fn account(&self, id: AccountId) -> StoreResult<Option<Account>>;

    /// All accounts, ordered by id.
    async fn accounts(&self) -> StoreResult<Vec<Account>>;

    /// Accounts whose parent is `parent`, ordered by id.
    async fn children(&self, parent: AccountId) -> StoreResult<Vec<Account>>;

    /// Debit the source, credit the destination and append a transfer record,
    /// as a single atomic unit. The source balance is re-checked at write time.
    async fn apply_transfer(&self, transfer: NewTransfer) -> StoreResult<TransferOutcome>;

    /// Transfer records where `account` is source or destination, newest first.
    async fn transfers_involving(&self, account: AccountId) -> StoreResult<Vec<TransferRecord>>;
}

/// Contact groups, contacts and import history.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Fails with `AccountMissing` if `owner` does not exist.
    async fn create_group(
        &self,
        owner: AccountId,
        name: String,
        description: Option<String>,
    ) -> StoreResult<ContactGroup>;

    async fn group(&self, id: GroupId) -> StoreResult<Option<ContactGroup>>;

    /// Groups owned by `owner`, ordered by id.
    async fn groups_of(&self, owner: AccountId) -> StoreResult<Vec<ContactGroup>>;

    /// Delete a group and its contacts. Returns false if the group did not exist.
    async fn delete_group(&self, id: GroupId) -> StoreResult<bool>;

    /// Contacts of a group, in insertion order.
    async fn contacts_in(&self, group: GroupId) -> StoreResult<Vec<Contact>>;

    /// Phone numbers already present in a group.
    async fn phone_numbers_in(&self, group: GroupId) -> StoreResult<HashSet<String>>;

    /// Insert contacts into `group` as given, without deduplication.
    async fn insert_contacts(
        &self,
        group: GroupId,
        contacts: Vec<NewContact>,
    ) -> StoreResult<Vec<Contact>>;

    /// Insert one contact per number into `import.group` and append the import
    /// record, atomically.
    ///
    /// Numbers are re-checked against the group under the same lock: any that
    /// another writer added since the caller read the group are skipped and
    /// counted in `already_existing`, and `successful_imports` is set to what
    /// was actually inserted.
    async fn commit_import(
        &self,
        numbers: Vec<String>,
        import: NewImport,
    ) -> StoreResult<ImportRecord>;

    /// Import records of `owner`, newest first.
    async fn imports_of(&self, owner: AccountId) -> StoreResult<Vec<ImportRecord>>;
}

/// Draft SMS and email campaigns.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Fails with `AccountMissing` for an unknown owner and `GroupMissing` if
    /// the group is not one of the owner's.
    async fn insert_sms_campaign(&self, campaign: NewSmsCampaign) -> StoreResult<SmsCampaign>;

    /// SMS campaigns of `owner`, newest first.
    async fn sms_campaigns_of(&self, owner: AccountId) -> StoreResult<Vec<SmsCampaign>>;

    /// Same constraints as [`CampaignStore::insert_sms_campaign`].
    async fn insert_email_campaign(&self, campaign: NewEmailCampaign)
    -> StoreResult<EmailCampaign>;

    /// Email campaigns of `owner`, newest first.
    async fn email_campaigns_of(&self, owner: AccountId) -> StoreResult<Vec<EmailCampaign>>;
}
