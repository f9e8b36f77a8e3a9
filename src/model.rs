//! Core domain types for the credit console.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Credits;

/// Account (master or dealer) identifier.
pub type AccountId = u32;

/// Transfer record identifier.
pub type TransferId = u64;

/// Contact group identifier.
pub type GroupId = u32;

/// Contact identifier.
pub type ContactId = u64;

/// Import record identifier.
pub type ImportId = u64;

/// SMS or email campaign identifier.
pub type CampaignId = u64;

/// An account holding SMS and email credit.
///
/// `parent` models the dealer-under-master hierarchy: a dealer points at the
/// account that created it, a master account has no parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub parent: Option<AccountId>,
    pub balance: Credits,
    pub created_at: DateTime<Utc>,
}

/// Data needed to open an account.
///
/// `initial_grant` is an administrative credit grant; it is not taken from the
/// parent's balance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewAccount {
    pub id: AccountId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub parent: Option<AccountId>,
    pub initial_grant: Credits,
}

impl NewAccount {
    pub fn new(id: AccountId, initial_grant: Credits) -> Self {
        Self {
            id,
            initial_grant,
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: AccountId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_contact(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self.email = Some(email.into());
        self
    }
}

/// A validated transfer, ready to be written by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransfer {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Credits,
    pub note: Option<String>,
}

/// Immutable record of a completed credit transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    pub id: TransferId,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Credits,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TransferRecord {
    /// Whether `account` is the source or destination of this transfer.
    pub fn involves(&self, account: AccountId) -> bool {
        self.from == account || self.to == account
    }
}

/// A contact list owned by an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactGroup {
    pub id: GroupId,
    pub owner: AccountId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single contact inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub id: ContactId,
    pub group: GroupId,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub blacklisted: bool,
    pub created_at: DateTime<Utc>,
}

/// Data for a contact added by hand.
///
/// A contact needs a phone number or an email address; names are optional.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewContact {
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub blacklisted: bool,
}

impl NewContact {
    pub fn phone(number: impl Into<String>) -> Self {
        Self {
            phone_number: Some(number.into()),
            ..Default::default()
        }
    }

    pub fn email(address: impl Into<String>) -> Self {
        Self {
            email: Some(address.into()),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }

    pub fn blacklisted(mut self) -> Self {
        self.blacklisted = true;
        self
    }

    /// True when neither a phone number nor an email address is set.
    pub fn is_unreachable(&self) -> bool {
        let blank = |field: &Option<String>| field.as_deref().is_none_or(|v| v.trim().is_empty());
        blank(&self.phone_number) && blank(&self.email)
    }
}

/// Counts written to the import history alongside the imported contacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImport {
    pub owner: AccountId,
    pub group: GroupId,
    pub file_name: String,
    pub total_numbers: usize,
    pub duplicates_removed: usize,
    pub already_existing: usize,
    pub successful_imports: usize,
}

/// Append-only record of a bulk number import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRecord {
    pub id: ImportId,
    pub owner: AccountId,
    pub group: GroupId,
    pub file_name: String,
    pub total_numbers: usize,
    pub duplicates_removed: usize,
    pub already_existing: usize,
    pub successful_imports: usize,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle state of a campaign.
///
/// Campaigns are only ever created as `Draft` or `Scheduled` here; the other
/// states belong to the sending side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Completed,
    Failed,
}

/// How an SMS campaign picks its recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SendType {
    #[default]
    Standard,
    /// Send to every reachable contact of a group.
    FromList,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewSmsCampaign {
    pub owner: AccountId,
    pub name: String,
    pub message: String,
    pub send_type: SendType,
    pub group: Option<GroupId>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmsCampaign {
    pub id: CampaignId,
    pub owner: AccountId,
    pub name: String,
    pub message: String,
    pub send_type: SendType,
    pub group: Option<GroupId>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: CampaignStatus,
    /// Non-blacklisted contacts with a phone number in `group` at creation.
    pub total_recipients: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewEmailCampaign {
    pub owner: AccountId,
    pub name: String,
    pub subject: String,
    pub body_html: String,
    pub group: Option<GroupId>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailCampaign {
    pub id: CampaignId,
    pub owner: AccountId,
    pub name: String,
    pub subject: String,
    pub body_html: String,
    pub group: Option<GroupId>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: CampaignStatus,
    /// Non-blacklisted contacts with an email address in `group` at creation.
    pub total_recipients: usize,
    pub created_at: DateTime<Utc>,
}

/// A command accepted by [`Ledger::apply`](crate::Ledger::apply).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCommand {
    /// Open an account with an administrative credit grant.
    Open(NewAccount),
    /// Move credit from one account to another.
    Transfer(NewTransfer),
}
