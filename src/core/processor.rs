use futures::{Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::decoder::{self, message_identity};
use super::types::{DecodedMessage, StatusUpdate};
use crate::consumer::{Acknowledger, DeliveryOutcome, InboundDelivery};
use crate::error::{ConsumerError, Result};
use crate::monitoring::Metrics;
use crate::sync::{CampaignStatusStore, MessageStore};

/// Drives a single delivery through decode, document write, optional status update
/// and acknowledgment.
pub struct MessageProcessor {
    message_store: Arc<dyn MessageStore>,
    status_store: Arc<dyn CampaignStatusStore>,
    metrics: Arc<Metrics>,
    store_timeout: Duration,
}

impl MessageProcessor {
    pub fn new(
        message_store: Arc<dyn MessageStore>,
        status_store: Arc<dyn CampaignStatusStore>,
        metrics: Arc<Metrics>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            message_store,
            status_store,
            metrics,
            store_timeout,
        }
    }

    /// Pull deliveries one at a time until shutdown is requested or the stream ends.
    ///
    /// Cancellation is only observed between deliveries; the delivery in progress
    /// always reaches its acknowledgment (or its store timeout) first.
    pub async fn run<S, A>(&self, mut deliveries: S, shutdown: &CancellationToken) -> Result<()>
    where
        S: Stream<Item = Result<InboundDelivery<A>>> + Unpin,
        A: Acknowledger,
    {
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, no longer pulling deliveries");
                    return Ok(());
                }
                next = deliveries.next() => next,
            };

            match next {
                Some(Ok(delivery)) => {
                    self.handle(delivery).await;
                }
                Some(Err(e)) => {
                    error!(error = %e, "Error receiving delivery from RabbitMQ");
                    return Err(e);
                }
                None => {
                    warn!("RabbitMQ consumer stream closed");
                    return Err(ConsumerError::Broker(
                        "consumer stream closed by broker".to_string(),
                    ));
                }
            }
        }
    }

    /// Process one delivery and resolve it with the broker exactly once.
    #[instrument(skip_all, fields(delivery_tag = delivery.delivery_tag, redelivered = delivery.redelivered))]
    pub async fn handle<A: Acknowledger>(&self, delivery: InboundDelivery<A>) -> DeliveryOutcome {
        let start = Instant::now();
        let delivery_tag = delivery.delivery_tag;
        self.metrics.record_message_consumed();

        debug!(delivery_tag, "Processing message");

        let outcome = self
            .decide(delivery_tag, delivery.message_id.as_deref(), &delivery.payload)
            .await;

        match outcome {
            DeliveryOutcome::Ack => self.metrics.record_message_acked(),
            DeliveryOutcome::Reject => self.metrics.record_message_rejected(),
            DeliveryOutcome::Requeue => self.metrics.record_message_requeued(),
        }

        // A failed ack/nack leaves the delivery unacknowledged; the broker redelivers it
        // once the channel goes away.
        if let Err(e) = delivery.resolve(outcome).await {
            error!(delivery_tag, %outcome, error = %e, "Failed to resolve delivery with RabbitMQ");
        }

        self.metrics.record_processing_time(start.elapsed());
        self.metrics.update_last_message_time().await;

        outcome
    }

    /// Compute the acknowledgment outcome for a payload. Performs the store writes but
    /// never talks to the broker.
    pub async fn decide(
        &self,
        delivery_tag: u64,
        message_id: Option<&str>,
        payload: &[u8],
    ) -> DeliveryOutcome {
        let DecodedMessage {
            record,
            is_last_message,
        } = match decoder::decode(payload) {
            Ok(decoded) => decoded,
            Err(e) => {
                error!(
                    delivery_tag,
                    error = %e,
                    body = %String::from_utf8_lossy(payload),
                    "Invalid message, rejecting without requeue"
                );
                return outcome_for(&e);
            }
        };

        let campaign_id = record.campaign_id.clone();
        let record = record.with_id(message_identity(message_id, payload));

        let saved_id = match self.bounded(self.message_store.save(record)).await {
            Ok(id) => {
                self.metrics.record_document_saved();
                self.metrics.set_stores_health(true);
                id
            }
            Err(e) => {
                error!(
                    delivery_tag,
                    campaign_id = %campaign_id,
                    error = %e,
                    "Failed to save message, requeueing"
                );
                self.metrics.set_stores_health(false);
                return outcome_for(&e);
            }
        };

        if is_last_message {
            // The document is already stored; a failure here must not trigger redelivery
            match self.bounded(self.status_store.mark_sent(&campaign_id)).await {
                Ok(StatusUpdate::Updated) => {
                    self.metrics.record_campaign_marked_sent();
                    info!(delivery_tag, campaign_id = %campaign_id, "Campaign marked as SENT");
                }
                Ok(StatusUpdate::NotFound) => {
                    self.metrics.record_campaign_not_found();
                    warn!(
                        delivery_tag,
                        campaign_id = %campaign_id,
                        "Last message received for unknown campaign"
                    );
                }
                Err(e) => {
                    self.metrics.record_status_update_failure();
                    self.metrics.set_stores_health(false);
                    error!(
                        delivery_tag,
                        campaign_id = %campaign_id,
                        error = %e,
                        "Failed to update campaign status to SENT, acknowledging anyway"
                    );
                }
            }
        }

        info!(
            delivery_tag,
            message_id = %saved_id,
            campaign_id = %campaign_id,
            "Message processed successfully"
        );

        DeliveryOutcome::Ack
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.store_timeout, operation)
            .await
            .map_err(|_| ConsumerError::Timeout(self.store_timeout.as_millis() as u64))?
    }
}

/// Map a processing error onto the broker outcome it calls for.
pub fn outcome_for(error: &ConsumerError) -> DeliveryOutcome {
    if error.is_permanent() {
        DeliveryOutcome::Reject
    } else {
        DeliveryOutcome::Requeue
    }
}
