use async_trait::async_trait;

use crate::core::types::{MessageRecord, StatusUpdate};
use crate::error::Result;

/// Persists campaign messages
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Save the record and return its identifier.
    ///
    /// Fills in a fresh identifier and the timestamps when absent. Saving twice with
    /// the same identifier leaves a single document.
    async fn save(&self, record: MessageRecord) -> Result<String>;
}

/// Updates campaign status in the relational store
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CampaignStatusStore: Send + Sync {
    /// Transition the campaign to SENT. Safe to repeat.
    async fn mark_sent(&self, campaign_id: &str) -> Result<StatusUpdate>;
}
