//! Party Finder - Matchmaking microservice for fixed-composition parties
//!
//! This crate provides role-based matchmaking queues with party formation,
//! queue expiration, and AMQP event publishing.

pub mod amqp;
pub mod config;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{PartyFinderError, Result};
pub use types::*;

// Re-export key components
pub use amqp::publisher::NotificationSink;
pub use config::RoleSlotSet;
pub use queue::{EngineSettings, MatchmakingEngine};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
