use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::stores::CampaignStatusStore;
use crate::core::types::StatusUpdate;
use crate::error::{ConsumerError, Result};

// Literal status keeps the statement valid whether the column is text or a Postgres enum.
const MARK_CAMPAIGN_SENT: &str = r#"
    UPDATE "Campaign"
    SET status = 'SENT', updated_at = NOW()
    WHERE id = $1
"#;

pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    pub async fn new(database_url: &str, pool_size: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| {
                error!("Failed to connect to PostgreSQL: {e}");
                ConsumerError::Connection(format!("Failed to connect to PostgreSQL: {e}"))
            })?;

        info!("Connected to PostgreSQL database");

        Ok(Self { pool })
    }

    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[async_trait]
impl CampaignStatusStore for PostgresClient {
    async fn mark_sent(&self, campaign_id: &str) -> Result<StatusUpdate> {
        debug!(campaign_id, "Updating campaign status to SENT in PostgreSQL");

        let result = sqlx::query(MARK_CAMPAIGN_SENT)
            .bind(campaign_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(campaign_id, error = %e, "Failed to update campaign status in PostgreSQL");
                ConsumerError::from(e)
            })?;

        // An already-SENT row still matches, so repeats report Updated
        if result.rows_affected() == 0 {
            warn!(campaign_id, "No campaign found to update in PostgreSQL");
            Ok(StatusUpdate::NotFound)
        } else {
            info!(campaign_id, "Campaign status updated to SENT in PostgreSQL");
            Ok(StatusUpdate::Updated)
        }
    }
}
