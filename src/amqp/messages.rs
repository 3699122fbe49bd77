//! Envelope format and exchange layout for published events

use crate::error::{PartyFinderError, Result};
use crate::types::QueueEvent;
use crate::utils::current_timestamp;

/// AMQP exchange names
pub const QUEUE_EVENTS_EXCHANGE: &str = "partyfinder.queue_events";
pub const PARTY_EVENTS_EXCHANGE: &str = "partyfinder.party_events";

/// Routing keys for events
pub const QUEUE_CREATED_ROUTING_KEY: &str = "queue.created";
pub const QUEUE_CHANGED_ROUTING_KEY: &str = "queue.changed";
pub const QUEUE_EXPIRED_ROUTING_KEY: &str = "queue.expired";
pub const QUEUE_DELETED_ROUTING_KEY: &str = "queue.deleted";
pub const PARTY_FORMED_ROUTING_KEY: &str = "party.formed";

/// Wrapper carrying an event plus the metadata consumers need to
/// deduplicate and route it
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    /// Unique per envelope; doubles as the AMQP message id
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: current_timestamp(),
            routing_key,
        }
    }

    /// JSON wire form of the envelope
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            PartyFinderError::InternalError {
                message: format!("Failed to serialize envelope: {}", e),
            }
            .into()
        })
    }

    /// Parse an envelope back from its JSON wire form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            PartyFinderError::InternalError {
                message: format!("Failed to deserialize envelope: {}", e),
            }
            .into()
        })
    }
}

/// Exchange an event publishes to
pub fn exchange_for(event: &QueueEvent) -> &'static str {
    match event {
        QueueEvent::PartyFormed(_) => PARTY_EVENTS_EXCHANGE,
        _ => QUEUE_EVENTS_EXCHANGE,
    }
}

/// Routing key for an event
pub fn routing_key_for(event: &QueueEvent) -> &'static str {
    match event {
        QueueEvent::QueueCreated(_) => QUEUE_CREATED_ROUTING_KEY,
        QueueEvent::QueueStateChanged(_) => QUEUE_CHANGED_ROUTING_KEY,
        QueueEvent::PartyFormed(_) => PARTY_FORMED_ROUTING_KEY,
        QueueEvent::QueueExpired(_) => QUEUE_EXPIRED_ROUTING_KEY,
        QueueEvent::QueueDeleted(_) => QUEUE_DELETED_ROUTING_KEY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QueueExpired;
    use crate::utils::current_timestamp;

    #[test]
    fn test_envelope_roundtrip() {
        let event = QueueExpired {
            name: "velkhana".to_string(),
            timestamp: current_timestamp(),
        };
        let envelope = MessageEnvelope::new(event, QUEUE_EXPIRED_ROUTING_KEY.to_string());

        let bytes = envelope.to_bytes().unwrap();
        let decoded: MessageEnvelope<QueueExpired> = MessageEnvelope::from_bytes(&bytes).unwrap();

        assert_eq!(decoded.correlation_id, envelope.correlation_id);
        assert_eq!(decoded.payload.name, "velkhana");
    }

    #[test]
    fn test_routing_table() {
        let event = QueueEvent::QueueExpired(QueueExpired {
            name: "q".to_string(),
            timestamp: current_timestamp(),
        });
        assert_eq!(exchange_for(&event), QUEUE_EVENTS_EXCHANGE);
        assert_eq!(routing_key_for(&event), QUEUE_EXPIRED_ROUTING_KEY);
    }
}
