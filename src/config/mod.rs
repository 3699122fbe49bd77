//! Configuration management for the party-finder service
//!
//! This module handles all configuration loading from TOML files and
//! environment variables, validation, and default values for the
//! matchmaking service.

pub mod app;
pub mod roles;

// Re-export commonly used types
pub use app::{validate_config, AmqpSettings, AppConfig, MatchmakingSettings, ServiceSettings};
pub use roles::{RoleSlot, RoleSlotSet};
