//! Credit ledger.
//!
//! The ledger owns the rules for moving SMS and email credit between accounts:
//! validation, the balance-sufficiency check and the atomic
//! debit + credit + record write. It also reads transfer history and manages
//! the dealer hierarchy. Commands can be applied one by one or from an async
//! stream.

use std::sync::Arc;

use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::Credits;
use crate::model::{Account, AccountId, LedgerCommand, NewAccount, NewTransfer, TransferRecord};
use crate::store::{AccountStore, TransferOutcome};

mod error;
pub use error::LedgerError;

/// The credit ledger, bound to an injected account store.
pub struct Ledger<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

/// Public API
impl<S: AccountStore + ?Sized> Ledger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run the ledger over the given command stream.
    ///
    /// A rejected command does not stop the stream; it is logged and skipped.
    /// Storage failures are logged the same way, since nothing is retried.
    pub async fn run(&self, mut stream: impl Stream<Item = LedgerCommand> + Unpin) {
        while let Some(command) = stream.next().await {
            let _ = self.apply(command).await;
        }
    }

    /// Apply a single command.
    pub async fn apply(&self, command: LedgerCommand) -> Result<(), LedgerError> {
        match command {
            LedgerCommand::Open(account) => {
                let id = account.id;
                let grant = account.initial_grant;
                let result = self.open_account(account).await.map(|_| ());
                Self::log_result("open", id, None, grant, &result);
                result
            }
            LedgerCommand::Transfer(transfer) => {
                let (from, to, amount) = (transfer.from, transfer.to, transfer.amount);
                let result = self
                    .transfer(from, to, amount, transfer.note)
                    .await
                    .map(|_| ());
                Self::log_result("transfer", from, Some(to), amount, &result);
                result
            }
        }
    }

    /// Open an account with an administrative credit grant.
    ///
    /// The grant is not taken from anywhere; if a parent is given it must exist.
    pub async fn open_account(&self, account: NewAccount) -> Result<Account, LedgerError> {
        if self.store.account(account.id).await?.is_some() {
            return Err(LedgerError::AccountExists(account.id));
        }
        if let Some(parent) = account.parent {
            if self.store.account(parent).await?.is_none() {
                return Err(LedgerError::AccountNotFound(parent));
            }
        }
        Ok(self.store.insert_account(account).await?)
    }

    /// Open a dealer account under `parent`.
    pub async fn create_dealer(
        &self,
        parent: AccountId,
        dealer: NewAccount,
    ) -> Result<Account, LedgerError> {
        self.open_account(dealer.with_parent(parent)).await
    }

    /// Dealers directly under `parent`, ordered by id.
    pub async fn dealers(&self, parent: AccountId) -> Result<Vec<Account>, LedgerError> {
        Ok(self.store.children(parent).await?)
    }

    pub async fn account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.store
            .account(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    /// Every account, ordered by id.
    pub async fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        Ok(self.store.accounts().await?)
    }

    /// Move `amount` from `from` to `to`:
    /// - Reject empty and self transfers before touching the store
    /// - Ensure both accounts exist
    /// - Ensure the source balance covers the amount on both sides
    /// - Debit, credit and record in one atomic store write
    ///
    /// Not idempotent: calling twice moves the amount twice.
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Credits,
        note: Option<String>,
    ) -> Result<TransferRecord, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::EmptyTransfer);
        }
        if from == to {
            return Err(LedgerError::SelfTransfer(from));
        }

        let source = self.account(from).await?;
        self.account(to).await?;

        if !source.balance.covers(amount) {
            return Err(LedgerError::InsufficientBalance {
                account: from,
                available: source.balance,
                requested: amount,
            });
        }

        // The store re-checks the balance under its own lock, so a concurrent
        // transfer that got there first is still caught here.
        let outcome = self
            .store
            .apply_transfer(NewTransfer {
                from,
                to,
                amount,
                note,
            })
            .await?;

        match outcome {
            TransferOutcome::Applied(record) => Ok(record),
            TransferOutcome::InsufficientBalance { available } => {
                Err(LedgerError::InsufficientBalance {
                    account: from,
                    available,
                    requested: amount,
                })
            }
            TransferOutcome::AccountMissing(id) => Err(LedgerError::AccountNotFound(id)),
            TransferOutcome::Overflow(id) => Err(LedgerError::BalanceOverflow(id)),
        }
    }

    /// Transfers where `account` is source or destination, newest first.
    pub async fn history(&self, account: AccountId) -> Result<Vec<TransferRecord>, LedgerError> {
        Ok(self.store.transfers_involving(account).await?)
    }
}

/// Private API
impl<S: AccountStore + ?Sized> Ledger<S> {
    /// Small helper to log `apply` results
    fn log_result(
        command: &str,
        account: AccountId,
        counterparty: Option<AccountId>,
        amount: Credits,
        result: &Result<(), LedgerError>,
    ) {
        match (result, counterparty) {
            (Ok(()), Some(to)) => {
                info!(
                    account = %account,
                    counterparty = %to,
                    sms = amount.sms,
                    email = amount.email,
                    "{command} applied"
                );
            }
            (Ok(()), None) => {
                info!(
                    account = %account,
                    sms = amount.sms,
                    email = amount.email,
                    "{command} applied"
                );
            }
            (Err(e), Some(to)) => {
                info!(
                    account = %account,
                    counterparty = %to,
                    sms = amount.sms,
                    email = amount.email,
                    reason = %e,
                    "{command} skipped"
                );
            }
            (Err(e), None) => {
                info!(
                    account = %account,
                    sms = amount.sms,
                    email = amount.email,
                    reason = %e,
                    "{command} skipped"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    // test utils

    async fn ledger_with(accounts: &[(AccountId, u64, u64)]) -> Ledger<MemoryStore> {
        let ledger = Ledger::new(Arc::new(MemoryStore::new()));
        for &(id, sms, email) in accounts {
            ledger
                .open_account(NewAccount::new(id, Credits::new(sms, email)))
                .await
                .unwrap();
        }
        ledger
    }

    async fn balance(ledger: &Ledger<MemoryStore>, id: AccountId) -> Credits {
        ledger.account(id).await.unwrap().balance
    }

    fn transfer(from: AccountId, to: AccountId, sms: u64, email: u64) -> LedgerCommand {
        LedgerCommand::Transfer(NewTransfer {
            from,
            to,
            amount: Credits::new(sms, email),
            note: None,
        })
    }

    // Accounts

    #[tokio::test]
    async fn open_account_applies_grant() {
        let ledger = ledger_with(&[(1, 100, 50)]).await;
        assert_eq!(balance(&ledger, 1).await, Credits::new(100, 50));
    }

    #[tokio::test]
    async fn open_account_rejects_existing_id() {
        let ledger = ledger_with(&[(1, 100, 50)]).await;
        let err = ledger
            .open_account(NewAccount::new(1, Credits::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountExists(1)));
        assert_eq!(balance(&ledger, 1).await, Credits::new(100, 50));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_open_of_same_id_reports_account_exists() {
        let ledger = ledger_with(&[]).await;

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger
                        .open_account(NewAccount::new(7, Credits::new(i, 0)))
                        .await
                })
            })
            .collect();

        let mut opened = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => opened += 1,
                Err(LedgerError::AccountExists(7)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(opened, 1);
    }

    #[tokio::test]
    async fn open_account_losing_insert_race_is_account_exists() {
        // the store itself rejects a duplicate id even when the pre-check passed
        let ledger = ledger_with(&[(1, 0, 0)]).await;
        let err: LedgerError = ledger
            .store()
            .insert_account(NewAccount::new(1, Credits::ZERO))
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, LedgerError::AccountExists(1)));
    }

    #[tokio::test]
    async fn create_dealer_requires_parent() {
        let ledger = ledger_with(&[]).await;
        let err = ledger
            .create_dealer(1, NewAccount::new(2, Credits::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(1)));
    }

    #[tokio::test]
    async fn dealers_lists_children_of_parent() {
        let ledger = ledger_with(&[(1, 0, 0), (2, 0, 0)]).await;
        ledger
            .create_dealer(1, NewAccount::new(10, Credits::new(5, 5)).with_contact("A", "a@x.io"))
            .await
            .unwrap();
        ledger
            .create_dealer(1, NewAccount::new(11, Credits::ZERO))
            .await
            .unwrap();
        ledger
            .create_dealer(2, NewAccount::new(12, Credits::ZERO))
            .await
            .unwrap();

        let dealers = ledger.dealers(1).await.unwrap();
        let ids: Vec<_> = dealers.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![10, 11]);
        assert_eq!(dealers[0].parent, Some(1));
        assert_eq!(dealers[0].name.as_deref(), Some("A"));
        assert!(ledger.dealers(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn account_not_found() {
        let ledger = ledger_with(&[]).await;
        assert!(matches!(
            ledger.account(3).await,
            Err(LedgerError::AccountNotFound(3))
        ));
    }

    // Transfer

    #[tokio::test]
    async fn transfer_moves_credit_and_records_once() {
        let ledger = ledger_with(&[(1, 100, 50), (2, 0, 0)]).await;
        let record = ledger
            .transfer(1, 2, Credits::new(30, 10), Some("monthly top-up".into()))
            .await
            .unwrap();

        assert_eq!(balance(&ledger, 1).await, Credits::new(70, 40));
        assert_eq!(balance(&ledger, 2).await, Credits::new(30, 10));

        assert_eq!(record.from, 1);
        assert_eq!(record.to, 2);
        assert_eq!(record.amount, Credits::new(30, 10));
        assert_eq!(record.note.as_deref(), Some("monthly top-up"));

        let history = ledger.history(1).await.unwrap();
        assert_eq!(history, vec![record.clone()]);
        assert_eq!(ledger.history(2).await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn transfer_sms_only() {
        let ledger = ledger_with(&[(1, 10, 0), (2, 0, 0)]).await;
        ledger.transfer(1, 2, Credits::new(10, 0), None).await.unwrap();
        assert_eq!(balance(&ledger, 1).await, Credits::ZERO);
        assert_eq!(balance(&ledger, 2).await, Credits::new(10, 0));
    }

    #[tokio::test]
    async fn transfer_insufficient_balance_has_no_effect() {
        let ledger = ledger_with(&[(1, 5, 0), (2, 0, 0)]).await;
        let err = ledger
            .transfer(1, 2, Credits::new(1000, 0), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::InsufficientBalance { account: 1, available, requested }
                if available == Credits::new(5, 0) && requested == Credits::new(1000, 0)
        ));
        assert_eq!(balance(&ledger, 1).await, Credits::new(5, 0));
        assert_eq!(balance(&ledger, 2).await, Credits::ZERO);
        assert!(ledger.history(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transfer_insufficient_email_side() {
        let ledger = ledger_with(&[(1, 100, 5), (2, 0, 0)]).await;
        let err = ledger
            .transfer(1, 2, Credits::new(10, 6), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(balance(&ledger, 1).await, Credits::new(100, 5));
    }

    #[tokio::test]
    async fn transfer_rejects_empty_amount() {
        let ledger = ledger_with(&[(1, 5, 5), (2, 0, 0)]).await;
        let err = ledger.transfer(1, 2, Credits::ZERO, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::EmptyTransfer));
    }

    #[tokio::test]
    async fn transfer_rejects_self_transfer() {
        let ledger = ledger_with(&[(1, 5, 5)]).await;
        let err = ledger
            .transfer(1, 1, Credits::new(1, 0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::SelfTransfer(1)));
        assert_eq!(balance(&ledger, 1).await, Credits::new(5, 5));
    }

    #[tokio::test]
    async fn transfer_unknown_accounts() {
        let ledger = ledger_with(&[(1, 5, 5)]).await;
        let err = ledger
            .transfer(1, 2, Credits::new(1, 0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(2)));

        let err = ledger
            .transfer(3, 1, Credits::new(1, 0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(3)));
        assert_eq!(balance(&ledger, 1).await, Credits::new(5, 5));
    }

    #[tokio::test]
    async fn transfer_overflow_has_no_effect() {
        let ledger = ledger_with(&[(1, 5, 0), (2, u64::MAX, 0)]).await;
        let err = ledger
            .transfer(1, 2, Credits::new(1, 0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::BalanceOverflow(2)));
        assert_eq!(balance(&ledger, 1).await, Credits::new(5, 0));
        assert!(ledger.history(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transfer_is_not_idempotent() {
        let ledger = ledger_with(&[(1, 100, 50), (2, 0, 0)]).await;
        let first = ledger.transfer(1, 2, Credits::new(30, 10), None).await.unwrap();
        let second = ledger.transfer(1, 2, Credits::new(30, 10), None).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(balance(&ledger, 1).await, Credits::new(40, 30));
        assert_eq!(balance(&ledger, 2).await, Credits::new(60, 20));
        assert_eq!(ledger.history(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn transfer_surfaces_storage_failure() {
        let ledger = ledger_with(&[(1, 100, 50), (2, 0, 0)]).await;
        ledger.store().set_online(false);

        let err = ledger
            .transfer(1, 2, Credits::new(30, 10), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::StorageUnavailable(_)));

        ledger.store().set_online(true);
        assert_eq!(balance(&ledger, 1).await, Credits::new(100, 50));
        assert_eq!(balance(&ledger, 2).await, Credits::ZERO);
        assert_eq!(ledger.store().transfer_count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_transfers_never_overdraw() {
        let ledger = ledger_with(&[(1, 100, 0), (2, 0, 0)]).await;

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.transfer(1, 2, Credits::new(3, 0), None).await })
            })
            .collect();

        let mut applied = 0u64;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => applied += 1,
                Err(LedgerError::InsufficientBalance { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        // 100 / 3 = 33 transfers fit
        assert_eq!(applied, 33);
        assert_eq!(balance(&ledger, 1).await, Credits::new(1, 0));
        assert_eq!(balance(&ledger, 2).await, Credits::new(99, 0));
        assert_eq!(ledger.history(1).await.unwrap().len(), 33);
    }

    // History

    #[tokio::test]
    async fn history_is_newest_first_and_filtered() {
        let ledger = ledger_with(&[(1, 100, 100), (2, 0, 0), (3, 0, 0)]).await;
        let a = ledger.transfer(1, 2, Credits::new(1, 0), None).await.unwrap();
        let b = ledger.transfer(1, 3, Credits::new(0, 1), None).await.unwrap();
        let c = ledger.transfer(2, 3, Credits::new(1, 0), None).await.unwrap();

        let ids = |records: Vec<TransferRecord>| records.iter().map(|r| r.id).collect::<Vec<_>>();
        assert_eq!(ids(ledger.history(1).await.unwrap()), vec![b.id, a.id]);
        assert_eq!(ids(ledger.history(2).await.unwrap()), vec![c.id, a.id]);
        assert_eq!(ids(ledger.history(3).await.unwrap()), vec![c.id, b.id]);
        assert!(ledger.history(4).await.unwrap().is_empty());
    }

    // Commands

    #[tokio::test]
    async fn apply_open_then_transfer() {
        let ledger = ledger_with(&[]).await;
        ledger
            .apply(LedgerCommand::Open(NewAccount::new(1, Credits::new(100, 50))))
            .await
            .unwrap();
        ledger
            .apply(LedgerCommand::Open(NewAccount::new(2, Credits::ZERO).with_parent(1)))
            .await
            .unwrap();
        ledger.apply(transfer(1, 2, 30, 10)).await.unwrap();

        assert_eq!(balance(&ledger, 1).await, Credits::new(70, 40));
        assert_eq!(balance(&ledger, 2).await, Credits::new(30, 10));
    }

    #[tokio::test]
    async fn run_skips_rejected_commands() {
        let ledger = ledger_with(&[(1, 10, 0), (2, 0, 0)]).await;
        let commands = vec![
            transfer(1, 2, 4, 0),
            transfer(1, 2, 100, 0), // insufficient
            transfer(1, 9, 1, 0),   // unknown destination
            transfer(1, 2, 4, 0),
        ];
        ledger.run(tokio_stream::iter(commands)).await;

        assert_eq!(balance(&ledger, 1).await, Credits::new(2, 0));
        assert_eq!(balance(&ledger, 2).await, Credits::new(8, 0));
        assert_eq!(ledger.history(1).await.unwrap().len(), 2);
    }
}
