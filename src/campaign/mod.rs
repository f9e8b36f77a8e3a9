//! Draft SMS and email campaigns.
//!
//! Campaigns are recorded as `Draft`, or `Scheduled` when a send time is
//! given, with their recipient count taken from the target group at creation.
//! Sending them is left to the gateway side.

use std::sync::Arc;

use tracing::info;

use crate::model::{
    AccountId, EmailCampaign, NewEmailCampaign, NewSmsCampaign, SendType, SmsCampaign,
};
use crate::store::{AccountStore, CampaignStore};

mod error;
pub use error::CampaignError;

/// Campaign book, bound to an injected store.
pub struct Campaigns<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for Campaigns<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CampaignStore + ?Sized> Campaigns<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Record an SMS campaign:
    /// - Name and message must not be blank
    /// - A `FromList` campaign needs a group
    /// - The group, if any, must belong to the owner
    pub async fn create_sms(&self, campaign: NewSmsCampaign) -> Result<SmsCampaign, CampaignError> {
        require("name", &campaign.name)?;
        require("message", &campaign.message)?;
        if campaign.send_type == SendType::FromList && campaign.group.is_none() {
            return Err(CampaignError::MissingGroup);
        }

        let owner = campaign.owner;
        let created = self
            .store
            .insert_sms_campaign(campaign)
            .await
            .map_err(CampaignError::from_store(owner))?;

        info!(
            owner = %owner,
            campaign = created.id,
            recipients = created.total_recipients,
            "sms campaign created"
        );
        Ok(created)
    }

    /// Record an email campaign. Name, subject and body must not be blank.
    pub async fn create_email(
        &self,
        campaign: NewEmailCampaign,
    ) -> Result<EmailCampaign, CampaignError> {
        require("name", &campaign.name)?;
        require("subject", &campaign.subject)?;
        require("body", &campaign.body_html)?;

        let owner = campaign.owner;
        let created = self
            .store
            .insert_email_campaign(campaign)
            .await
            .map_err(CampaignError::from_store(owner))?;

        info!(
            owner = %owner,
            campaign = created.id,
            recipients = created.total_recipients,
            "email campaign created"
        );
        Ok(created)
    }

    /// SMS campaigns of `owner`, newest first.
    pub async fn sms_campaigns(&self, owner: AccountId) -> Result<Vec<SmsCampaign>, CampaignError> {
        self.store
            .sms_campaigns_of(owner)
            .await
            .map_err(CampaignError::from_store(owner))
    }

    /// Email campaigns of `owner`, newest first.
    pub async fn email_campaigns(
        &self,
        owner: AccountId,
    ) -> Result<Vec<EmailCampaign>, CampaignError> {
        self.store
            .email_campaigns_of(owner)
            .await
            .map_err(CampaignError::from_store(owner))
    }
}

impl<S: CampaignStore + AccountStore + ?Sized> Campaigns<S> {
    /// SMS campaigns of every dealer under `parent`, by dealer id.
    pub async fn dealer_sms_campaigns(
        &self,
        parent: AccountId,
    ) -> Result<Vec<SmsCampaign>, CampaignError> {
        let map = CampaignError::from_store(parent);
        if self.store.account(parent).await.map_err(&map)?.is_none() {
            return Err(CampaignError::OwnerNotFound(parent));
        }

        let mut campaigns = Vec::new();
        for dealer in self.store.children(parent).await.map_err(&map)? {
            campaigns.extend(self.store.sms_campaigns_of(dealer.id).await.map_err(&map)?);
        }
        Ok(campaigns)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), CampaignError> {
    if value.trim().is_empty() {
        return Err(CampaignError::MissingField(field));
    }
    Ok(())
}
