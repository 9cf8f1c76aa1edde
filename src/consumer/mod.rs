pub mod delivery;
pub mod rabbitmq_consumer;

pub use delivery::{Acknowledger, DeliveryOutcome, InboundDelivery};
pub use rabbitmq_consumer::RabbitMQConsumer;

#[cfg(any(test, feature = "testing"))]
pub use delivery::MockAcknowledger;
