use futures::{Stream, StreamExt};
use lapin::{options::*, types::FieldTable, Channel, Connection, ConnectionProperties, Consumer};
use tracing::{info, warn};

use super::delivery::InboundDelivery;
use crate::error::{ConsumerError, Result};

pub struct RabbitMQConsumer {
    connection: Connection,
    channel: Channel,
    consumer: Consumer,
    queue: String,
}

impl RabbitMQConsumer {
    /// Connects, declares the durable queue, applies the prefetch limit and registers a
    /// manual-ack consumer.
    pub async fn new(
        rabbitmq_url: &str,
        queue: &str,
        prefetch_count: u16,
        consumer_tag: &str,
    ) -> Result<Self> {
        let connection = Connection::connect(rabbitmq_url, ConnectionProperties::default())
            .await
            .map_err(|e| ConsumerError::Connection(format!("Failed to connect to RabbitMQ: {e}")))?;

        info!(queue, "Connected to RabbitMQ");

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| ConsumerError::Connection(format!("Failed to create channel: {e}")))?;

        // Bound the number of unacknowledged deliveries so a slow store backpressures the broker
        channel
            .basic_qos(prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| {
                ConsumerError::Connection(format!("Failed to set prefetch count: {e}"))
            })?;

        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    nowait: false,
                    passive: false,
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                ConsumerError::Connection(format!("Failed to declare queue {queue}: {e}"))
            })?;

        let consumer = channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions {
                    no_ack: false,
                    exclusive: false,
                    no_local: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                ConsumerError::Connection(format!("Failed to start consumer for queue {queue}: {e}"))
            })?;

        info!(
            queue,
            prefetch_count, consumer_tag, "Setup complete: consumer started"
        );

        Ok(Self {
            connection,
            channel,
            consumer,
            queue: queue.to_string(),
        })
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Stream of deliveries wrapped in single-use acknowledgment handles
    pub fn deliveries(&self) -> impl Stream<Item = Result<InboundDelivery>> + Unpin {
        self.consumer.clone().map(|delivery| {
            delivery
                .map(InboundDelivery::from)
                .map_err(|e| ConsumerError::Broker(format!("Error receiving delivery: {e}")))
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    /// Get the depth (message count) of the consumed queue.
    ///
    /// Fails when the broker cannot be queried, so an empty queue is never confused
    /// with an unreachable one.
    pub async fn get_queue_depth(&self) -> Result<u32> {
        // passive declare only queries; it never creates or alters the queue
        match self
            .channel
            .queue_declare(
                &self.queue,
                QueueDeclareOptions {
                    passive: true,
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Ok(queue) => Ok(queue.message_count()),
            Err(e) => {
                warn!(queue = %self.queue, error = %e, "Failed to get queue depth");
                Err(ConsumerError::Broker(format!(
                    "Failed to get depth of queue {}: {e}",
                    self.queue
                )))
            }
        }
    }

    /// Cancel the consumer and release the channel and connection.
    ///
    /// Deliveries that were received but not yet resolved go back to the queue.
    pub async fn close(&self) -> Result<()> {
        if let Err(e) = self
            .channel
            .basic_cancel(self.consumer.tag().as_str(), BasicCancelOptions::default())
            .await
        {
            warn!(error = %e, "Failed to cancel consumer");
        }

        if let Err(e) = self.channel.close(200, "consumer shutting down").await {
            warn!(error = %e, "Failed to close channel");
        }

        self.connection
            .close(200, "consumer shutting down")
            .await
            .map_err(|e| ConsumerError::Broker(format!("Failed to close connection: {e}")))?;

        info!(queue = %self.queue, "RabbitMQ connection closed");
        Ok(())
    }
}
