//! AMQP integration for the party-finder service
//!
//! This module handles the AMQP connection and outbound event publishing.
//! Inbound command transport is a collaborator concern and lives elsewhere.

pub mod connection;
pub mod messages;
pub mod publisher;

// Re-export commonly used types
pub use connection::AmqpConnection;
pub use messages::*;
pub use publisher::{
    AmqpNotificationSink, LoggingNotificationSink, MockNotificationSink, NotificationSink,
};
