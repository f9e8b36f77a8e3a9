pub mod campaign;
pub mod credits;
pub mod csv;
pub mod import;
pub mod ledger;
pub mod model;
pub mod store;

pub use campaign::{CampaignError, Campaigns};
pub use credits::Credits;
pub use import::{ImportError, ImportSummary, Importer};
pub use ledger::{Ledger, LedgerError};
pub use model::{
    Account, AccountId, LedgerCommand, NewAccount, NewContact, NewEmailCampaign, NewSmsCampaign,
    NewTransfer, TransferRecord,
};
pub use store::{AccountStore, CampaignStore, ContactStore, MemoryStore, StoreError};
