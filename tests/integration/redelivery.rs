use crate::helpers::{DbAssertions, MessageBuilder, TestHarness};
use campaign_message_consumer::core::decoder::message_identity;
use campaign_message_consumer::core::pipeline::MessageProcessingPipeline;
use campaign_message_consumer::core::types::CampaignStatus;
use std::sync::Arc;
use std::time::Duration;

const SENT: &str = CampaignStatus::Sent.as_str();

/// Publishing the same message twice (as a broker redelivery would) leaves one document
#[tokio::test]
#[ignore] // Run with --ignored flag since it requires containers
async fn test_duplicate_delivery_stores_single_document() {
    let mut harness = TestHarness::new().await.unwrap();
    harness.seed_campaign("campaign-dup").await.unwrap();

    let payload = MessageBuilder::new("campaign-dup").last().build();
    let expected_id = message_identity(Some("dispatch-0001"), &payload);
    harness
        .publish(vec![
            (Some("dispatch-0001"), payload.clone()),
            (Some("dispatch-0001"), payload),
        ])
        .await
        .unwrap();

    let pipeline = Arc::new(
        MessageProcessingPipeline::new(harness.default_config())
            .await
            .expect("Failed to create pipeline"),
    );
    let handle = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.start().await }
    });

    harness
        .wait_for_status("campaign-dup", SENT, 15)
        .await
        .expect("Campaign was not marked SENT within 15 seconds");

    // Let the second delivery land before counting
    tokio::time::sleep(Duration::from_secs(1)).await;

    let snapshot = pipeline.metrics.get_snapshot().await;
    assert_eq!(snapshot.total_messages_acked, 2);

    let db = harness.get_surreal().await.unwrap().db().clone();
    DbAssertions::assert_document_count(&db, "campaign-dup", 1)
        .await
        .unwrap();

    let stored = harness
        .get_surreal()
        .await
        .unwrap()
        .find(&expected_id)
        .await
        .unwrap();
    assert!(stored.is_some(), "Document {expected_id} not found");

    let pool = harness.get_pool().await.unwrap();
    DbAssertions::assert_campaign_status(pool, "campaign-dup", SENT)
        .await
        .unwrap();

    pipeline.stop().await.unwrap();
    handle.await.unwrap().unwrap();
}

/// Messages published after shutdown stay on the queue for the next consumer
#[tokio::test]
#[ignore]
async fn test_stop_leaves_unconsumed_messages_queued() {
    let mut harness = TestHarness::new().await.unwrap();

    let pipeline = Arc::new(
        MessageProcessingPipeline::new(harness.default_config())
            .await
            .expect("Failed to create pipeline"),
    );
    let handle = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.start().await }
    });

    harness
        .publish(vec![(None, MessageBuilder::new("campaign-stop").build())])
        .await
        .unwrap();
    harness
        .wait_for_documents("campaign-stop", 1, 15)
        .await
        .expect("Message was not stored within 15 seconds");

    pipeline.stop().await.unwrap();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("Pipeline did not stop within 10 seconds")
        .unwrap()
        .unwrap();
    assert!(!pipeline.is_running());

    // The channel is closed, so the depth query must fail rather than report an empty queue
    assert!(pipeline.get_queue_depth().await.is_err());

    harness
        .publish(vec![(None, MessageBuilder::new("campaign-stop").build())])
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let db = harness.get_surreal().await.unwrap().db().clone();
    DbAssertions::assert_document_count(&db, "campaign-stop", 1)
        .await
        .unwrap();
}
