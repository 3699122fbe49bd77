//! Test fixtures and mock implementations for integration testing

use async_trait::async_trait;
use party_finder::amqp::publisher::NotificationSink;
use party_finder::error::Result;
use party_finder::types::{
    Party, PartyFormed, QueueCreated, QueueDeleted, QueueEvent, QueueExpired, QueueStateChanged,
};
use std::sync::{Arc, Mutex};

/// Notification sink that captures published events for testing
#[derive(Debug, Default)]
pub struct RecordingSink {
    published_events: Arc<Mutex<Vec<QueueEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            published_events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get all published events (for testing)
    pub fn get_published_events(&self) -> Vec<QueueEvent> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count events of a specific type
    pub fn count_events_of_type(&self, event_type: &str) -> usize {
        self.get_published_events()
            .iter()
            .filter(|event| match event {
                QueueEvent::QueueCreated(_) => event_type == "QueueCreated",
                QueueEvent::QueueStateChanged(_) => event_type == "QueueStateChanged",
                QueueEvent::PartyFormed(_) => event_type == "PartyFormed",
                QueueEvent::QueueExpired(_) => event_type == "QueueExpired",
                QueueEvent::QueueDeleted(_) => event_type == "QueueDeleted",
            })
            .count()
    }

    /// Events concerning one queue, in publication order
    pub fn events_for_queue(&self, name: &str) -> Vec<QueueEvent> {
        self.get_published_events()
            .into_iter()
            .filter(|event| event.queue_name() == name)
            .collect()
    }

    /// The roster of the most recently formed party, if any
    pub fn last_party(&self) -> Option<Party> {
        self.get_published_events()
            .iter()
            .rev()
            .find_map(|event| match event {
                QueueEvent::PartyFormed(e) => Some(e.party.clone()),
                _ => None,
            })
    }

    fn record(&self, event: QueueEvent) {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn publish_queue_created(&self, event: QueueCreated) -> Result<()> {
        self.record(QueueEvent::QueueCreated(event));
        Ok(())
    }

    async fn publish_queue_state_changed(&self, event: QueueStateChanged) -> Result<()> {
        self.record(QueueEvent::QueueStateChanged(event));
        Ok(())
    }

    async fn publish_party_formed(&self, event: PartyFormed) -> Result<()> {
        self.record(QueueEvent::PartyFormed(event));
        Ok(())
    }

    async fn publish_queue_expired(&self, event: QueueExpired) -> Result<()> {
        self.record(QueueEvent::QueueExpired(event));
        Ok(())
    }

    async fn publish_queue_deleted(&self, event: QueueDeleted) -> Result<()> {
        self.record(QueueEvent::QueueDeleted(event));
        Ok(())
    }
}
