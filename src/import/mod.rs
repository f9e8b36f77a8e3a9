//! Bulk phone-number import into contact groups.
//!
//! Numbers arrive already extracted from the uploaded file. They are
//! deduplicated against themselves and against the target group using exact
//! string equality, then inserted together with an import-history record.
//! Contacts with names and email addresses are added by hand instead.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::model::{
    AccountId, Contact, ContactGroup, GroupId, ImportRecord, NewContact, NewImport,
};
use crate::store::{AccountStore, ContactStore};

mod error;
pub use error::ImportError;

/// Result of splitting a submitted number list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Deduplicated {
    /// Numbers to insert, in first-occurrence order.
    pub fresh: Vec<String>,
    pub total: usize,
    /// Repeats of a number seen earlier in the same submission.
    pub duplicates_removed: usize,
    /// Numbers the group already contains.
    pub already_existing: usize,
}

/// Split `numbers` into the ones to insert and the ones to skip.
pub fn deduplicate<I>(numbers: I, existing: &HashSet<String>) -> Deduplicated
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut result = Deduplicated::default();

    for number in numbers {
        result.total += 1;
        if !seen.insert(number.clone()) {
            result.duplicates_removed += 1;
        } else if existing.contains(&number) {
            result.already_existing += 1;
        } else {
            result.fresh.push(number);
        }
    }

    result
}

/// What an import did, as reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub duplicates_removed: usize,
    pub already_exists: usize,
}

/// Contact-group management and number import, bound to an injected store.
pub struct Importer<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for Importer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ContactStore + ?Sized> Importer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn create_group(
        &self,
        owner: AccountId,
        name: &str,
        description: Option<String>,
    ) -> Result<ContactGroup, ImportError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ImportError::EmptyGroupName);
        }
        self.store
            .create_group(owner, name.to_string(), description)
            .await
            .map_err(ImportError::from_store(owner))
    }

    pub async fn groups(&self, owner: AccountId) -> Result<Vec<ContactGroup>, ImportError> {
        self.store
            .groups_of(owner)
            .await
            .map_err(ImportError::from_store(owner))
    }

    /// Delete one of `owner`'s groups together with its contacts.
    pub async fn delete_group(&self, owner: AccountId, group: GroupId) -> Result<(), ImportError> {
        self.owned_group(owner, group).await?;
        let deleted = self
            .store
            .delete_group(group)
            .await
            .map_err(ImportError::from_store(owner))?;
        if !deleted {
            return Err(ImportError::GroupNotFound { owner, group });
        }
        Ok(())
    }

    pub async fn contacts(
        &self,
        owner: AccountId,
        group: GroupId,
    ) -> Result<Vec<Contact>, ImportError> {
        self.owned_group(owner, group).await?;
        self.store
            .contacts_in(group)
            .await
            .map_err(ImportError::from_store(owner))
    }

    /// Add a single contact to one of `owner`'s groups.
    pub async fn add_contact(
        &self,
        owner: AccountId,
        group: GroupId,
        contact: NewContact,
    ) -> Result<Contact, ImportError> {
        let mut added = self.add_contacts(owner, group, vec![contact]).await?;
        added.pop().ok_or(ImportError::EmptyContact)
    }

    /// Add contacts to one of `owner`'s groups as given.
    ///
    /// Unlike [`Importer::import`], nothing is deduplicated. Every contact
    /// needs a phone number or an email address, otherwise nothing is added.
    pub async fn add_contacts(
        &self,
        owner: AccountId,
        group: GroupId,
        contacts: Vec<NewContact>,
    ) -> Result<Vec<Contact>, ImportError> {
        if contacts.iter().any(NewContact::is_unreachable) {
            return Err(ImportError::EmptyContact);
        }
        self.owned_group(owner, group).await?;

        let added = self
            .store
            .insert_contacts(group, contacts)
            .await
            .map_err(ImportError::from_store(owner))?;

        info!(owner = %owner, group = %group, added = added.len(), "contacts added");
        Ok(added)
    }

    /// Import `numbers` into `group`:
    /// - Ensure the group exists and belongs to `owner`
    /// - Drop repeated numbers and numbers already in the group
    /// - Insert the rest and record the counts, atomically
    ///
    /// The summary reports what the store actually wrote, so numbers another
    /// import added in the meantime show up as already existing.
    pub async fn import(
        &self,
        owner: AccountId,
        group: GroupId,
        file_name: &str,
        numbers: Vec<String>,
    ) -> Result<ImportSummary, ImportError> {
        self.owned_group(owner, group).await?;

        let existing = self
            .store
            .phone_numbers_in(group)
            .await
            .map_err(ImportError::from_store(owner))?;
        let Deduplicated {
            fresh,
            total,
            duplicates_removed,
            already_existing,
        } = deduplicate(numbers, &existing);

        let successful_imports = fresh.len();
        let record = self
            .store
            .commit_import(
                fresh,
                NewImport {
                    owner,
                    group,
                    file_name: file_name.to_string(),
                    total_numbers: total,
                    duplicates_removed,
                    already_existing,
                    successful_imports,
                },
            )
            .await
            .map_err(ImportError::from_store(owner))?;

        info!(
            owner = %owner,
            group = %group,
            import = record.id,
            total,
            imported = record.successful_imports,
            duplicates_removed = record.duplicates_removed,
            already_existing = record.already_existing,
            "numbers imported"
        );

        Ok(ImportSummary {
            imported: record.successful_imports,
            duplicates_removed: record.duplicates_removed,
            already_exists: record.already_existing,
        })
    }

    /// Import history of `owner`, newest first.
    pub async fn history(&self, owner: AccountId) -> Result<Vec<ImportRecord>, ImportError> {
        self.store
            .imports_of(owner)
            .await
            .map_err(ImportError::from_store(owner))
    }

    async fn owned_group(
        &self,
        owner: AccountId,
        group: GroupId,
    ) -> Result<ContactGroup, ImportError> {
        let found = self
            .store
            .group(group)
            .await
            .map_err(ImportError::from_store(owner))?;
        match found {
            Some(found) if found.owner == owner => Ok(found),
            _ => Err(ImportError::GroupNotFound { owner, group }),
        }
    }
}

impl<S: ContactStore + AccountStore + ?Sized> Importer<S> {
    /// Contacts in every group owned by a dealer of `parent`, by dealer id
    /// then group id.
    pub async fn dealer_contacts(&self, parent: AccountId) -> Result<Vec<Contact>, ImportError> {
        let map = ImportError::from_store(parent);
        if self.store.account(parent).await.map_err(&map)?.is_none() {
            return Err(ImportError::OwnerNotFound(parent));
        }

        let mut contacts = Vec::new();
        for dealer in self.store.children(parent).await.map_err(&map)? {
            for group in self.store.groups_of(dealer.id).await.map_err(&map)? {
                contacts.extend(self.store.contacts_in(group.id).await.map_err(&map)?);
            }
        }
        Ok(contacts)
    }

    /// Phone numbers held by the dealers of `parent`, without repeats.
    pub async fn dealer_numbers(&self, parent: AccountId) -> Result<Vec<String>, ImportError> {
        let mut seen = HashSet::new();
        Ok(self
            .dealer_contacts(parent)
            .await?
            .into_iter()
            .filter_map(|contact| contact.phone_number)
            .filter(|number| seen.insert(number.clone()))
            .collect())
    }
}
