use crate::helpers::{DbAssertions, MessageBuilder, TestHarness};
use campaign_message_consumer::core::pipeline::MessageProcessingPipeline;
use campaign_message_consumer::core::types::CampaignStatus;
use std::sync::Arc;
use std::time::Duration;

const SENT: &str = CampaignStatus::Sent.as_str();
const PENDING: &str = CampaignStatus::Pending.as_str();

async fn start_pipeline(
    harness: &TestHarness,
) -> (
    Arc<MessageProcessingPipeline>,
    tokio::task::JoinHandle<campaign_message_consumer::Result<()>>,
) {
    let pipeline = Arc::new(
        MessageProcessingPipeline::new(harness.default_config())
            .await
            .expect("Failed to create pipeline"),
    );
    let handle = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.start().await }
    });
    (pipeline, handle)
}

/// A regular message is stored and leaves the campaign untouched
#[tokio::test]
#[ignore] // Run with --ignored flag since it requires containers
async fn test_plain_message_is_stored() {
    let mut harness = TestHarness::new().await.unwrap();
    harness.seed_campaign("campaign-plain").await.unwrap();

    harness
        .publish(vec![(
            None,
            MessageBuilder::new("campaign-plain")
                .with_phone("+15557654321")
                .with_message("Hello there")
                .build(),
        )])
        .await
        .unwrap();

    let (pipeline, handle) = start_pipeline(&harness).await;

    harness
        .wait_for_documents("campaign-plain", 1, 15)
        .await
        .expect("Message was not stored within 15 seconds");

    let db = harness.get_surreal().await.unwrap().db().clone();
    let documents = DbAssertions::assert_document_count(&db, "campaign-plain", 1)
        .await
        .unwrap();
    assert_eq!(documents[0].phone_number, "+15557654321");
    assert_eq!(documents[0].message, "Hello there");
    assert!(documents[0].updated_at >= documents[0].created_at);

    let pool = harness.get_pool().await.unwrap();
    let campaign = DbAssertions::assert_campaign_status(pool, "campaign-plain", PENDING)
        .await
        .unwrap();
    assert!(campaign.updated_at.is_none());

    pipeline.stop().await.unwrap();
    handle.await.unwrap().unwrap();
}

/// The last message of a campaign marks it SENT after being stored
#[tokio::test]
#[ignore]
async fn test_last_message_marks_campaign_sent() {
    let mut harness = TestHarness::new().await.unwrap();
    harness.seed_campaign("campaign-last").await.unwrap();

    harness
        .publish(vec![
            (None, MessageBuilder::new("campaign-last").build()),
            (None, MessageBuilder::new("campaign-last").with_phone("+15550002222").last().build()),
        ])
        .await
        .unwrap();

    let (pipeline, handle) = start_pipeline(&harness).await;

    harness
        .wait_for_status("campaign-last", SENT, 15)
        .await
        .expect("Campaign was not marked SENT within 15 seconds");

    let db = harness.get_surreal().await.unwrap().db().clone();
    DbAssertions::assert_document_count(&db, "campaign-last", 2)
        .await
        .unwrap();

    let pool = harness.get_pool().await.unwrap();
    let campaign = DbAssertions::assert_campaign_status(pool, "campaign-last", SENT)
        .await
        .unwrap();
    assert!(campaign.updated_at.is_some());

    pipeline.stop().await.unwrap();
    handle.await.unwrap().unwrap();
}

/// Incomplete and malformed payloads are discarded without reaching either store
#[tokio::test]
#[ignore]
async fn test_invalid_messages_are_discarded() {
    let mut harness = TestHarness::new().await.unwrap();
    harness.seed_campaign("campaign-invalid").await.unwrap();

    harness
        .publish(vec![
            (None, MessageBuilder::new("campaign-invalid").with_message("").last().build()),
            (None, MessageBuilder::new("campaign-invalid").without("phone_number").build()),
            (None, b"{not json".to_vec()),
            (None, MessageBuilder::new("campaign-invalid").build()),
        ])
        .await
        .unwrap();

    let (pipeline, handle) = start_pipeline(&harness).await;

    harness
        .wait_for_documents("campaign-invalid", 1, 15)
        .await
        .expect("Valid message was not stored within 15 seconds");

    // Rejected deliveries are gone, not parked back on the queue
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(pipeline.get_queue_depth().await.unwrap(), 0);

    let db = harness.get_surreal().await.unwrap().db().clone();
    DbAssertions::assert_document_count(&db, "campaign-invalid", 1)
        .await
        .unwrap();

    let pool = harness.get_pool().await.unwrap();
    DbAssertions::assert_campaign_status(pool, "campaign-invalid", PENDING)
        .await
        .unwrap();

    let snapshot = pipeline.metrics.get_snapshot().await;
    assert_eq!(snapshot.total_messages_rejected, 3);
    assert_eq!(snapshot.total_messages_acked, 1);

    pipeline.stop().await.unwrap();
    handle.await.unwrap().unwrap();
}

/// A last message for a campaign that does not exist is stored and acknowledged
#[tokio::test]
#[ignore]
async fn test_last_message_for_unknown_campaign_is_acked() {
    let mut harness = TestHarness::new().await.unwrap();

    harness
        .publish(vec![(None, MessageBuilder::new("campaign-ghost").last().build())])
        .await
        .unwrap();

    let (pipeline, handle) = start_pipeline(&harness).await;

    harness
        .wait_for_documents("campaign-ghost", 1, 15)
        .await
        .expect("Message was not stored within 15 seconds");

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(pipeline.get_queue_depth().await.unwrap(), 0);

    let pool = harness.get_pool().await.unwrap();
    assert!(DbAssertions::get_campaign(pool, "campaign-ghost")
        .await
        .unwrap()
        .is_none());

    let snapshot = pipeline.metrics.get_snapshot().await;
    assert_eq!(snapshot.total_messages_acked, 1);
    assert_eq!(snapshot.total_messages_requeued, 0);

    pipeline.stop().await.unwrap();
    handle.await.unwrap().unwrap();
}
