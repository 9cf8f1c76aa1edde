//! Turns raw delivery bytes into a validated [`DecodedMessage`].
//!
//! Decoding is pure: no I/O, no clock, no randomness. Any error returned here
//! is permanent for the payload, so the caller discards the delivery.

use tracing::debug;
use uuid::Uuid;

use super::types::{DecodedMessage, InboundMessage, MessageRecord};
use crate::error::{ConsumerError, Result};

/// Namespace for deterministic message identifiers.
const MESSAGE_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b3e_9a44_4c1d_8e52_0d7a_31b9_c4e7);

pub fn decode(payload: &[u8]) -> Result<DecodedMessage> {
    let inbound: InboundMessage = serde_json::from_slice(payload)?;
    debug!(is_last_message = ?inbound.is_last_message, "Decoded inbound message");
    validate(inbound)
}

fn validate(inbound: InboundMessage) -> Result<DecodedMessage> {
    let mut missing = Vec::new();

    let phone_number = required(inbound.phone_number, "phone_number", &mut missing);
    let message = required(inbound.message, "message", &mut missing);
    let campaign_id = required(inbound.campaign_id, "campaign_id", &mut missing);
    let company_id = required(inbound.company_id, "company_id", &mut missing);

    if !missing.is_empty() {
        return Err(ConsumerError::Validation(missing));
    }

    Ok(DecodedMessage {
        record: MessageRecord::new(phone_number, message, campaign_id, company_id),
        is_last_message: inbound.is_last_message.unwrap_or(false),
    })
}

fn required(value: Option<String>, field: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => {
            missing.push(field);
            String::new()
        }
    }
}

/// Stable identifier for a delivery.
///
/// Prefers the publisher-assigned AMQP `message_id`; falls back to the payload
/// bytes. A redelivery of the same message always maps to the same identifier,
/// which lets the document store upsert instead of inserting a duplicate.
pub fn message_identity(message_id: Option<&str>, payload: &[u8]) -> String {
    let uuid = match message_id.filter(|id| !id.is_empty()) {
        Some(id) => Uuid::new_v5(&MESSAGE_ID_NAMESPACE, id.as_bytes()),
        None => Uuid::new_v5(&MESSAGE_ID_NAMESPACE, payload),
    };
    uuid.to_string()
}
