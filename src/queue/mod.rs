//! Matchmaking queue system for the party-finder service
//!
//! This module handles queue creation, role-slot bookkeeping, party
//! formation and the expiration lifecycle.

pub mod engine;
pub mod state;

// Re-export commonly used types
pub use engine::{EngineSettings, EngineStats, MatchmakingEngine};
pub use state::QueueState;
