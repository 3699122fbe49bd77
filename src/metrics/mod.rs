//! Metrics and monitoring for the party-finder matchmaking service
//!
//! This module provides metrics collection, health monitoring, and
//! performance tracking for the matchmaking service.

pub mod collector;
pub mod health;

pub use collector::{MetricsCollector, ParticipantMetrics, PerformanceMetrics, QueueMetrics};
pub use health::{HealthServer, HealthServerConfig};
