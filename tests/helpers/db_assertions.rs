use anyhow::Result;
use campaign_message_consumer::sync::surreal_client::{MessageDocument, MESSAGES_TABLE};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use surrealdb::{engine::any::Any, Surreal};

#[derive(Debug, sqlx::FromRow, PartialEq)]
pub struct CampaignRow {
    pub id: String,
    pub status: String,
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct DbAssertions;

impl DbAssertions {
    pub async fn get_campaign(pool: &PgPool, campaign_id: &str) -> Result<Option<CampaignRow>> {
        let row = sqlx::query_as::<_, CampaignRow>(
            r#"SELECT id, status, updated_at FROM "Campaign" WHERE id = $1"#,
        )
        .bind(campaign_id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    /// Asserts the campaign exists with the expected status
    pub async fn assert_campaign_status(
        pool: &PgPool,
        campaign_id: &str,
        expected: &str,
    ) -> Result<CampaignRow> {
        let row = Self::get_campaign(pool, campaign_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Campaign {campaign_id} not found"))?;

        assert_eq!(
            row.status, expected,
            "Campaign {campaign_id} status mismatch"
        );
        Ok(row)
    }

    pub async fn documents_for_campaign(
        db: &Surreal<Any>,
        campaign_id: &str,
    ) -> Result<Vec<MessageDocument>> {
        let documents: Vec<MessageDocument> = db.select(MESSAGES_TABLE).await?;
        Ok(documents
            .into_iter()
            .filter(|document| document.campaign_id == campaign_id)
            .collect())
    }

    /// Asserts the exact number of stored documents for a campaign
    pub async fn assert_document_count(
        db: &Surreal<Any>,
        campaign_id: &str,
        expected: usize,
    ) -> Result<Vec<MessageDocument>> {
        let documents = Self::documents_for_campaign(db, campaign_id).await?;
        assert_eq!(
            documents.len(),
            expected,
            "Document count mismatch for campaign {campaign_id}"
        );
        Ok(documents)
    }
}
