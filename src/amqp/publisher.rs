//! Outbound notification sinks
//!
//! The engine emits lifecycle events through the `NotificationSink` trait and
//! never learns where they travel. The production implementation publishes
//! them to AMQP topic exchanges; a logging sink covers broker-less runs and a
//! mock sink records events for tests.

use crate::amqp::messages::{exchange_for, routing_key_for, MessageEnvelope};
use crate::error::{PartyFinderError, Result};
use crate::types::{
    PartyFormed, QueueCreated, QueueDeleted, QueueEvent, QueueExpired, QueueStateChanged,
};
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Receiver of queue lifecycle notifications
///
/// The engine only ever talks to this trait; how events are rendered or
/// where they travel is a collaborator concern.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Publish a QueueCreated event
    async fn publish_queue_created(&self, event: QueueCreated) -> Result<()>;

    /// Publish a QueueStateChanged event
    async fn publish_queue_state_changed(&self, event: QueueStateChanged) -> Result<()>;

    /// Publish a PartyFormed event
    async fn publish_party_formed(&self, event: PartyFormed) -> Result<()>;

    /// Publish a QueueExpired event
    async fn publish_queue_expired(&self, event: QueueExpired) -> Result<()>;

    /// Publish a QueueDeleted event
    async fn publish_queue_deleted(&self, event: QueueDeleted) -> Result<()>;
}

/// Deliver one event to the matching sink method
pub async fn publish_event(sink: &dyn NotificationSink, event: QueueEvent) -> Result<()> {
    match event {
        QueueEvent::QueueCreated(e) => sink.publish_queue_created(e).await,
        QueueEvent::QueueStateChanged(e) => sink.publish_queue_state_changed(e).await,
        QueueEvent::PartyFormed(e) => sink.publish_party_formed(e).await,
        QueueEvent::QueueExpired(e) => sink.publish_queue_expired(e).await,
        QueueEvent::QueueDeleted(e) => sink.publish_queue_deleted(e).await,
    }
}

/// Retry and deduplication policy for the AMQP sink
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Attempts beyond the first before an event is given up on
    pub max_retries: u32,
    /// Initial backoff between attempts; doubles per retry, capped at 5s
    pub retry_delay_ms: u64,
    /// Drop envelopes whose correlation id was already published
    pub enable_deduplication: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 500,
            enable_deduplication: true,
        }
    }
}

/// Notification sink that publishes envelope-wrapped JSON events to
/// AMQP topic exchanges
pub struct AmqpNotificationSink {
    channel: Channel,
    config: PublisherConfig,
    seen_correlation_ids: Mutex<HashSet<String>>,
}

impl AmqpNotificationSink {
    /// Create the sink and declare the exchanges it publishes to
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        let sink = Self {
            channel,
            config,
            seen_correlation_ids: Mutex::new(HashSet::new()),
        };
        sink.declare_exchanges().await?;
        Ok(sink)
    }

    async fn declare_exchanges(&self) -> Result<()> {
        for exchange in [
            crate::amqp::messages::QUEUE_EVENTS_EXCHANGE,
            crate::amqp::messages::PARTY_EVENTS_EXCHANGE,
        ] {
            let args = ExchangeDeclareArguments::new(exchange, "topic");
            self.channel.exchange_declare(args).await.map_err(|e| {
                PartyFinderError::AmqpConnectionFailed {
                    message: format!("Failed to declare exchange {}: {}", exchange, e),
                }
            })?;
        }

        info!("Declared AMQP topic exchanges");
        Ok(())
    }

    /// Wrap an event in an envelope and publish it with retry
    async fn publish(&self, event: QueueEvent) -> Result<()> {
        let exchange = exchange_for(&event);
        let routing_key = routing_key_for(&event).to_string();
        let envelope = MessageEnvelope::new(event, routing_key);

        if self.already_published(&envelope.correlation_id)? {
            debug!("Envelope {} already published, skipping", envelope.correlation_id);
            return Ok(());
        }

        let mut delay = Duration::from_millis(self.config.retry_delay_ms);
        for attempt in 0..=self.config.max_retries {
            match self.publish_once(exchange, &envelope).await {
                Ok(()) => {
                    self.mark_published(envelope.correlation_id.clone())?;
                    debug!(
                        "Published {} to {} (attempt {})",
                        envelope.correlation_id,
                        exchange,
                        attempt + 1
                    );
                    return Ok(());
                }
                Err(e) if attempt < self.config.max_retries => {
                    warn!(
                        "Publish attempt {} for {} failed: {}. Retrying in {:?}",
                        attempt + 1,
                        envelope.correlation_id,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
                Err(e) => {
                    warn!(
                        "Giving up on {} after {} attempts: {}",
                        envelope.correlation_id,
                        self.config.max_retries + 1,
                        e
                    );
                    return Err(e);
                }
            }
        }
        unreachable!("retry loop always returns");
    }

    async fn publish_once(
        &self,
        exchange: &str,
        envelope: &MessageEnvelope<QueueEvent>,
    ) -> Result<()> {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(exchange, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| {
                PartyFinderError::AmqpConnectionFailed {
                    message: format!("Failed to publish event: {}", e),
                }
                .into()
            })
    }

    fn already_published(&self, correlation_id: &str) -> Result<bool> {
        if !self.config.enable_deduplication {
            return Ok(false);
        }
        let seen = self.lock_seen()?;
        Ok(seen.contains(correlation_id))
    }

    fn mark_published(&self, correlation_id: String) -> Result<()> {
        if self.config.enable_deduplication {
            self.lock_seen()?.insert(correlation_id);
        }
        Ok(())
    }

    fn lock_seen(&self) -> Result<std::sync::MutexGuard<'_, HashSet<String>>> {
        self.seen_correlation_ids.lock().map_err(|_| {
            PartyFinderError::InternalError {
                message: "Failed to acquire dedup cache lock".to_string(),
            }
            .into()
        })
    }

    /// Number of correlation ids held in the dedup cache
    pub fn dedup_cache_size(&self) -> usize {
        self.seen_correlation_ids
            .lock()
            .map(|seen| seen.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl NotificationSink for AmqpNotificationSink {
    async fn publish_queue_created(&self, event: QueueCreated) -> Result<()> {
        self.publish(QueueEvent::QueueCreated(event)).await
    }

    async fn publish_queue_state_changed(&self, event: QueueStateChanged) -> Result<()> {
        self.publish(QueueEvent::QueueStateChanged(event)).await
    }

    async fn publish_party_formed(&self, event: PartyFormed) -> Result<()> {
        self.publish(QueueEvent::PartyFormed(event)).await
    }

    async fn publish_queue_expired(&self, event: QueueExpired) -> Result<()> {
        self.publish(QueueEvent::QueueExpired(event)).await
    }

    async fn publish_queue_deleted(&self, event: QueueDeleted) -> Result<()> {
        self.publish(QueueEvent::QueueDeleted(event)).await
    }
}

/// Sink that logs events instead of publishing them, for broker-less runs
#[derive(Debug, Default)]
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn publish_queue_created(&self, event: QueueCreated) -> Result<()> {
        info!("Queue created: {}", event.name);
        Ok(())
    }

    async fn publish_queue_state_changed(&self, event: QueueStateChanged) -> Result<()> {
        info!(
            "Queue {} changed: {} waiting",
            event.name,
            event.snapshot.waiting()
        );
        Ok(())
    }

    async fn publish_party_formed(&self, event: PartyFormed) -> Result<()> {
        info!(
            "Party formed for {}: {} members",
            event.name,
            event.party.size()
        );
        Ok(())
    }

    async fn publish_queue_expired(&self, event: QueueExpired) -> Result<()> {
        info!("Queue expired: {}", event.name);
        Ok(())
    }

    async fn publish_queue_deleted(&self, event: QueueDeleted) -> Result<()> {
        info!("Queue deleted: {}", event.name);
        Ok(())
    }
}

/// Mock notification sink for testing
#[derive(Debug, Default)]
pub struct MockNotificationSink {
    published_events: Mutex<Vec<QueueEvent>>,
}

impl MockNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event published so far, in order
    pub fn get_published_events(&self) -> Vec<QueueEvent> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// How many events of one kind were published
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

    /// Forget everything recorded so far
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }

    fn record(&self, event: QueueEvent) {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl NotificationSink for MockNotificationSink {
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
