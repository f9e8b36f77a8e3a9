use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{
    AccountStore, CampaignStore, ContactStore, StoreError, StoreResult, TransferOutcome,
};
use crate::model::{
    Account, AccountId, CampaignId, CampaignStatus, Contact, ContactGroup, ContactId,
    EmailCampaign, GroupId, ImportId, ImportRecord, NewAccount, NewContact, NewEmailCampaign,
    NewImport, NewSmsCampaign, NewTransfer, SmsCampaign, TransferId, TransferRecord,
};

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<AccountId, Account>,
    transfers: Vec<TransferRecord>,
    groups: BTreeMap<GroupId, ContactGroup>,
    contacts: Vec<Contact>,
    imports: Vec<ImportRecord>,
    sms_campaigns: Vec<SmsCampaign>,
    email_campaigns: Vec<EmailCampaign>,
    next_transfer_id: TransferId,
    next_group_id: GroupId,
    next_contact_id: ContactId,
    next_import_id: ImportId,
    next_campaign_id: CampaignId,
}

impl State {
    fn push_contact(&mut self, group: GroupId, contact: NewContact, now: DateTime<Utc>) -> Contact {
        self.next_contact_id += 1;
        let contact = Contact {
            id: self.next_contact_id,
            group,
            phone_number: contact.phone_number,
            email: contact.email,
            first_name: contact.first_name,
            last_name: contact.last_name,
            blacklisted: contact.blacklisted,
            created_at: now,
        };
        self.contacts.push(contact.clone());
        contact
    }

    /// Resolve the recipient count of a campaign for `owner`, checking the
    /// owner exists and the group is theirs.
    fn campaign_recipients(
        &self,
        owner: AccountId,
        group: Option<GroupId>,
        reachable: impl Fn(&Contact) -> bool,
    ) -> StoreResult<usize> {
        if !self.accounts.contains_key(&owner) {
            return Err(StoreError::AccountMissing(owner));
        }
        let Some(group) = group else {
            return Ok(0);
        };
        match self.groups.get(&group) {
            Some(found) if found.owner == owner => Ok(self
                .contacts
                .iter()
                .filter(|c| c.group == group && !c.blacklisted && reachable(c))
                .count()),
            _ => Err(StoreError::GroupMissing(group)),
        }
    }

    fn next_campaign_id(&mut self) -> CampaignId {
        self.next_campaign_id += 1;
        self.next_campaign_id
    }
}

fn initial_status(scheduled_at: Option<DateTime<Utc>>) -> CampaignStatus {
    if scheduled_at.is_some() {
        CampaignStatus::Scheduled
    } else {
        CampaignStatus::Draft
    }
}

/// In-process store.
///
/// All state sits behind one async mutex, so every trait call is a
/// serializable transaction: the balance check and the writes of a transfer
/// happen under the same lock acquisition.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    online: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            online: AtomicBool::new(true),
        }
    }

    /// Simulate losing (or regaining) the connection to the backing store.
    /// While offline every call fails with [`StoreError::Unavailable`].
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of transfer records written so far.
    pub async fn transfer_count(&self) -> StoreResult<usize> {
        Ok(self.lock().await?.transfers.len())
    }

    async fn lock(&self) -> StoreResult<MutexGuard<'_, State>> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(self.state.lock().await)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, u64)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert_account(&self, account: NewAccount) -> StoreResult<Account> {
        let mut state = self.lock().await?;
        if state.accounts.contains_key(&account.id) {
            return Err(StoreError::AccountExists(account.id));
        }
        if let Some(parent) = account.parent {
            if !state.accounts.contains_key(&parent) {
                return Err(StoreError::AccountMissing(parent));
            }
        }

        let created = Account {
            id: account.id,
            name: account.name,
            email: account.email,
            parent: account.parent,
            balance: account.initial_grant,
            created_at: Utc::now(),
        };
        state.accounts.insert(created.id, created.clone());
        debug!(account = created.id, "account inserted");
        Ok(created)
    }

    async fn account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.lock().await?.accounts.get(&id).cloned())
    }

    async fn accounts(&self) -> StoreResult<Vec<Account>> {
        Ok(self.lock().await?.accounts.values().cloned().collect())
    }

    async fn children(&self, parent: AccountId) -> StoreResult<Vec<Account>> {
        Ok(self
            .lock()
            .await?
            .accounts
            .values()
            .filter(|account| account.parent == Some(parent))
            .cloned()
            .collect())
    }

    async fn apply_transfer(&self, transfer: NewTransfer) -> StoreResult<TransferOutcome> {
        if transfer.from == transfer.to {
            return Err(StoreError::SelfTransfer(transfer.from));
        }

        let mut state = self.lock().await?;

        let Some(source) = state.accounts.get(&transfer.from) else {
            return Ok(TransferOutcome::AccountMissing(transfer.from));
        };
        let Some(destination) = state.accounts.get(&transfer.to) else {
            return Ok(TransferOutcome::AccountMissing(transfer.to));
        };

        // Compute both new balances before touching anything
        let Some(debited) = source.balance.checked_sub(transfer.amount) else {
            return Ok(TransferOutcome::InsufficientBalance {
                available: source.balance,
            });
        };
        let Some(credited) = destination.balance.checked_add(transfer.amount) else {
            return Ok(TransferOutcome::Overflow(transfer.to));
        };

        state.next_transfer_id += 1;
        let record = TransferRecord {
            id: state.next_transfer_id,
            from: transfer.from,
            to: transfer.to,
            amount: transfer.amount,
            note: transfer.note,
            created_at: Utc::now(),
        };

        if let Some(source) = state.accounts.get_mut(&record.from) {
            source.balance = debited;
        }
        if let Some(destination) = state.accounts.get_mut(&record.to) {
            destination.balance = credited;
        }
        state.transfers.push(record.clone());

        Ok(TransferOutcome::Applied(record))
    }

    async fn transfers_involving(&self, account: AccountId) -> StoreResult<Vec<TransferRecord>> {
        let state = self.lock().await?;
        let mut records: Vec<_> = state
            .transfers
            .iter()
            .filter(|record| record.involves(account))
            .cloned()
            .collect();
        newest_first(&mut records, |r| (r.created_at, r.id));
        Ok(records)
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn create_group(
        &self,
        owner: AccountId,
        name: String,
        description: Option<String>,
    ) -> StoreResult<ContactGroup> {
        let mut state = self.lock().await?;
        if !state.accounts.contains_key(&owner) {
            return Err(StoreError::AccountMissing(owner));
        }

        state.next_group_id += 1;
        let group = ContactGroup {
            id: state.next_group_id,
            owner,
            name,
            description,
            created_at: Utc::now(),
        };
        state.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn group(&self, id: GroupId) -> StoreResult<Option<ContactGroup>> {
        Ok(self.lock().await?.groups.get(&id).cloned())
    }

    async fn groups_of(&self, owner: AccountId) -> StoreResult<Vec<ContactGroup>> {
        Ok(self
            .lock()
            .await?
            .groups
            .values()
            .filter(|group| group.owner == owner)
            .cloned()
            .collect())
    }

    async fn delete_group(&self, id: GroupId) -> StoreResult<bool> {
        let mut state = self.lock().await?;
        if state.groups.remove(&id).is_none() {
            return Ok(false);
        }
        state.contacts.retain(|contact| contact.group != id);
        Ok(true)
    }

    async fn contacts_in(&self, group: GroupId) -> StoreResult<Vec<Contact>> {
        Ok(self
            .lock()
            .await?
            .contacts
            .iter()
            .filter(|contact| contact.group == group)
            .cloned()
            .collect())
    }

    async fn phone_numbers_in(&self, group: GroupId) -> StoreResult<HashSet<String>> {
        Ok(self
            .lock()
            .await?
            .contacts
            .iter()
            .filter(|contact| contact.group == group)
            .filter_map(|contact| contact.phone_number.clone())
            .collect())
    }

    async fn insert_contacts(
        &self,
        group: GroupId,
        contacts: Vec<NewContact>,
    ) -> StoreResult<Vec<Contact>> {
        let mut state = self.lock().await?;
        if !state.groups.contains_key(&group) {
            return Err(StoreError::GroupMissing(group));
        }

        let now = Utc::now();
        Ok(contacts
            .into_iter()
            .map(|contact| state.push_contact(group, contact, now))
            .collect())
    }

    async fn commit_import(
        &self,
        numbers: Vec<String>,
        import: NewImport,
    ) -> StoreResult<ImportRecord> {
        let mut state = self.lock().await?;
        if !state.groups.contains_key(&import.group) {
            return Err(StoreError::GroupMissing(import.group));
        }

        // Another import may have added some of these since the caller read the group
        let mut present: HashSet<String> = state
            .contacts
            .iter()
            .filter(|contact| contact.group == import.group)
            .filter_map(|contact| contact.phone_number.clone())
            .collect();

        let now = Utc::now();
        let mut inserted = 0;
        let mut raced = 0;
        for number in numbers {
            if !present.insert(number.clone()) {
                raced += 1;
                continue;
            }
            state.push_contact(import.group, NewContact::phone(number), now);
            inserted += 1;
        }

        state.next_import_id += 1;
        let record = ImportRecord {
            id: state.next_import_id,
            owner: import.owner,
            group: import.group,
            file_name: import.file_name,
            total_numbers: import.total_numbers,
            duplicates_removed: import.duplicates_removed,
            already_existing: import.already_existing + raced,
            successful_imports: inserted,
            created_at: now,
        };
        state.imports.push(record.clone());
        Ok(record)
    }

    async fn imports_of(&self, owner: AccountId) -> StoreResult<Vec<ImportRecord>> {
        let state = self.lock().await?;
        let mut records: Vec<_> = state
            .imports
            .iter()
            .filter(|record| record.owner == owner)
            .cloned()
            .collect();
        newest_first(&mut records, |r| (r.created_at, r.id));
        Ok(records)
    }
}

#[async_trait]
impl CampaignStore for MemoryStore {
    async fn insert_sms_campaign(&self, campaign: NewSmsCampaign) -> StoreResult<SmsCampaign> {
        let mut state = self.lock().await?;
        let total_recipients = state.campaign_recipients(campaign.owner, campaign.group, |c| {
            c.phone_number.is_some()
        })?;

        let created = SmsCampaign {
            id: state.next_campaign_id(),
            owner: campaign.owner,
            name: campaign.name,
            message: campaign.message,
            send_type: campaign.send_type,
            group: campaign.group,
            scheduled_at: campaign.scheduled_at,
            status: initial_status(campaign.scheduled_at),
            total_recipients,
            created_at: Utc::now(),
        };
        state.sms_campaigns.push(created.clone());
        Ok(created)
    }

    async fn sms_campaigns_of(&self, owner: AccountId) -> StoreResult<Vec<SmsCampaign>> {
        let state = self.lock().await?;
        let mut campaigns: Vec<_> = state
            .sms_campaigns
            .iter()
            .filter(|campaign| campaign.owner == owner)
            .cloned()
            .collect();
        newest_first(&mut campaigns, |c| (c.created_at, c.id));
        Ok(campaigns)
    }

    async fn insert_email_campaign(
        &self,
        campaign: NewEmailCampaign,
    ) -> StoreResult<EmailCampaign> {
        let mut state = self.lock().await?;
        let total_recipients =
            state.campaign_recipients(campaign.owner, campaign.group, |c| c.email.is_some())?;

        let created = EmailCampaign {
            id: state.next_campaign_id(),
            owner: campaign.owner,
            name: campaign.name,
            subject: campaign.subject,
            body_html: campaign.body_html,
            group: campaign.group,
            scheduled_at: campaign.scheduled_at,
            status: initial_status(campaign.scheduled_at),
            total_recipients,
            created_at: Utc::now(),
        };
        state.email_campaigns.push(created.clone());
        Ok(created)
    }

    async fn email_campaigns_of(&self, owner: AccountId) -> StoreResult<Vec<EmailCampaign>> {
        let state = self.lock().await?;
        let mut campaigns: Vec<_> = state
            .email_campaigns
            .iter()
            .filter(|campaign| campaign.owner == owner)
            .cloned()
            .collect();
        newest_first(&mut campaigns, |c| (c.created_at, c.id));
        Ok(campaigns)
    }
}
