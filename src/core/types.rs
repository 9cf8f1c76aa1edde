use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Campaign message as published on the queue
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    /// Absent and `null` both mean "not the last message"
    #[serde(default)]
    pub is_last_message: Option<bool>,
}

/// A message bound for the document store.
///
/// `id` and the timestamps stay `None` until the document store fills them in
/// on save. The four content fields are guaranteed non-empty by the decoder.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MessageRecord {
    pub id: Option<String>,
    pub phone_number: String,
    pub message: String,
    pub campaign_id: String,
    pub company_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MessageRecord {
    pub fn new(phone_number: String, message: String, campaign_id: String, company_id: String) -> Self {
        Self {
            id: None,
            phone_number,
            message,
            campaign_id,
            company_id,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A successfully decoded delivery: the record to persist plus the transient last-message flag
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub record: MessageRecord,
    pub is_last_message: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CampaignStatus {
    Pending,
    Sent,
}

impl CampaignStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Pending => "PENDING",
            CampaignStatus::Sent => "SENT",
        }
    }
}

/// Result of marking a campaign as sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    Updated,
    NotFound,
}

/// Pipeline metrics for monitoring and observability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineMetrics {
    pub total_messages_consumed: u64,
    pub total_messages_acked: u64,
    pub total_messages_rejected: u64,
    pub total_messages_requeued: u64,
    pub total_status_update_failures: u64,
}

/// Health status for the entire pipeline
#[derive(Debug, Clone, Serialize)]
pub struct PipelineHealth {
    pub healthy: bool,
    pub rabbitmq_consumer_healthy: bool,
    pub stores_healthy: bool,
    pub last_check: DateTime<Utc>,
    pub metrics: PipelineMetrics,
}
