use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    Surreal,
};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::stores::MessageStore;
use crate::core::types::MessageRecord;
use crate::error::{ConsumerError, Result};

pub const MESSAGES_TABLE: &str = "messages";

/// Stored shape of a message. The identifier is the SurrealDB record id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDocument {
    pub phone_number: String,
    pub message: String,
    pub campaign_id: String,
    pub company_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Assign the identifier and timestamps a record is missing.
pub fn prepare_document(record: MessageRecord, now: DateTime<Utc>) -> (String, MessageDocument) {
    let id = record
        .id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let document = MessageDocument {
        phone_number: record.phone_number,
        message: record.message,
        campaign_id: record.campaign_id,
        company_id: record.company_id,
        created_at: record.created_at.unwrap_or(now),
        updated_at: now,
    };

    (id, document)
}

pub struct SurrealClient {
    db: Surreal<Any>,
}

impl SurrealClient {
    pub async fn new(
        url: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self> {
        let db = connect(url).await.map_err(|e| {
            ConsumerError::Connection(format!("Failed to connect to SurrealDB: {e}"))
        })?;

        db.signin(Root { username, password })
            .await
            .map_err(|e| ConsumerError::Connection(format!("Failed to sign in to SurrealDB: {e}")))?;

        db.use_ns(namespace).use_db(database).await.map_err(|e| {
            ConsumerError::Connection(format!(
                "Failed to select SurrealDB namespace {namespace} / database {database}: {e}"
            ))
        })?;

        info!(url, namespace, database, "Connected to SurrealDB");

        Ok(Self { db })
    }

    pub async fn find(&self, id: &str) -> Result<Option<MessageDocument>> {
        let document: Option<MessageDocument> = self.db.select((MESSAGES_TABLE, id)).await?;
        Ok(document)
    }

    pub async fn is_healthy(&self) -> bool {
        self.db.health().await.is_ok()
    }

    /// Get a reference to the database connection for custom operations
    pub fn db(&self) -> &Surreal<Any> {
        &self.db
    }
}

#[async_trait]
impl MessageStore for SurrealClient {
    async fn save(&self, record: MessageRecord) -> Result<String> {
        let (id, document) = prepare_document(record, Utc::now());

        debug!(
            message_id = %id,
            campaign_id = %document.campaign_id,
            phone_number = %document.phone_number,
            "Saving message to SurrealDB"
        );

        // Upsert keyed on the record id: a redelivered message overwrites its own document
        let saved: Option<MessageDocument> = self
            .db
            .upsert((MESSAGES_TABLE, id.as_str()))
            .content(document)
            .await
            .map_err(|e| {
                error!(message_id = %id, error = %e, "Failed to save message to SurrealDB");
                ConsumerError::from(e)
            })?;

        if saved.is_none() {
            return Err(ConsumerError::Store(format!(
                "SurrealDB returned no record for message {id}"
            )));
        }

        info!(message_id = %id, "Message saved to SurrealDB");
        Ok(id)
    }
}
