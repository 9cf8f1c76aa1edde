use async_trait::async_trait;
use lapin::{
    acker::Acker,
    message::Delivery,
    options::{BasicAckOptions, BasicNackOptions},
};
use std::fmt;

use crate::error::{ConsumerError, Result};

/// Final disposition of a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Processed; remove from the queue
    Ack,
    /// Unprocessable payload; discard without redelivery
    Reject,
    /// Transient failure; ask the broker to redeliver
    Requeue,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Ack => "ack",
            DeliveryOutcome::Reject => "reject",
            DeliveryOutcome::Requeue => "requeue",
        }
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broker-side acknowledgment operations for a single delivery
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<()>;

    async fn nack(&self, requeue: bool) -> Result<()>;
}

#[async_trait]
impl Acknowledger for Acker {
    async fn ack(&self) -> Result<()> {
        Acker::ack(self, BasicAckOptions { multiple: false })
            .await
            .map_err(|e| ConsumerError::Broker(format!("Failed to acknowledge message: {e}")))?;

        Ok(())
    }

    async fn nack(&self, requeue: bool) -> Result<()> {
        Acker::nack(
            self,
            BasicNackOptions {
                requeue,
                multiple: false,
            },
        )
        .await
        .map_err(|e| ConsumerError::Broker(format!("Failed to nack message: {e}")))?;

        Ok(())
    }
}

/// One message pulled from the queue, paired with its acknowledgment handle.
///
/// The handle is private and [`InboundDelivery::resolve`] takes `self`, so a
/// delivery can be acknowledged, rejected or requeued at most once.
pub struct InboundDelivery<A: Acknowledger = Acker> {
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub message_id: Option<String>,
    pub payload: Vec<u8>,
    acker: A,
}

impl<A: Acknowledger> InboundDelivery<A> {
    pub fn new(
        delivery_tag: u64,
        redelivered: bool,
        message_id: Option<String>,
        payload: Vec<u8>,
        acker: A,
    ) -> Self {
        Self {
            delivery_tag,
            redelivered,
            message_id,
            payload,
            acker,
        }
    }

    pub async fn resolve(self, outcome: DeliveryOutcome) -> Result<()> {
        match outcome {
            DeliveryOutcome::Ack => self.acker.ack().await,
            DeliveryOutcome::Reject => self.acker.nack(false).await,
            DeliveryOutcome::Requeue => self.acker.nack(true).await,
        }
    }
}

impl<A: Acknowledger> fmt::Debug for InboundDelivery<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundDelivery")
            .field("delivery_tag", &self.delivery_tag)
            .field("redelivered", &self.redelivered)
            .field("message_id", &self.message_id)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

impl From<Delivery> for InboundDelivery<Acker> {
    fn from(delivery: Delivery) -> Self {
        let message_id = delivery
            .properties
            .message_id()
            .as_ref()
            .map(|id| id.as_str().to_string());

        Self::new(
            delivery.delivery_tag,
            delivery.redelivered,
            message_id,
            delivery.data,
            delivery.acker,
        )
    }
}
