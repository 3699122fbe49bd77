//! Error types for the party-finder service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum PartyFinderError {
    #[error("Queue already exists: {name}")]
    QueueAlreadyExists { name: String },

    #[error("Queue not found: {name}")]
    QueueNotFound { name: String },

    #[error("Unknown role: {role}")]
    UnknownRole { role: String },

    #[error("Participant {participant} is already queued in {name}")]
    AlreadyQueued { participant: String, name: String },

    #[error("Role {role} is full in queue {name}")]
    RoleFull { role: String, name: String },

    #[error("Participant {participant} is not in any queue")]
    NotQueued { participant: String },

    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
