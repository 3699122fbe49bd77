//! Queue state and role-slot bookkeeping
//!
//! This module contains the mutable state of one named queue: who occupies
//! which role slot, in what order, and when the queue expires. A `QueueState`
//! is owned exclusively by the engine and only ever mutated behind that
//! queue's exclusion.

use crate::config::roles::RoleSlotSet;
use crate::error::{PartyFinderError, Result};
use crate::types::{
    Party, PartyMembers, ParticipantId, QueueSnapshot, RoleName, RoleOccupancy,
};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;

/// The mutable state of one named queue
#[derive(Debug)]
pub struct QueueState {
    name: String,
    roles: Arc<RoleSlotSet>,
    /// Occupants per role, in role-set order; each list preserves join order
    occupants: Vec<(RoleName, VecDeque<ParticipantId>)>,
    created_at: DateTime<Utc>,
    /// Deadline derived at creation only, never refreshed by activity
    expires_at: DateTime<Utc>,
    /// False once the queue has left the registry; an operation that still
    /// holds a handle to a closed queue must observe `QueueNotFound`
    open: bool,
}

impl QueueState {
    /// Create an empty queue for the given composition
    pub fn new(
        name: impl Into<String>,
        roles: Arc<RoleSlotSet>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let occupants = roles
            .roles()
            .map(|slot| (slot.name.clone(), VecDeque::new()))
            .collect();

        Self {
            name: name.into(),
            roles,
            occupants,
            created_at,
            expires_at,
            open: true,
        }
    }

    /// Queue name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the queue is still registered with the engine
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Mark the queue as deregistered; subsequent operations must fail
    pub fn close(&mut self) {
        self.open = false;
    }

    /// The role a participant currently occupies, if any
    pub fn role_of(&self, participant: &str) -> Option<&str> {
        self.occupants
            .iter()
            .find(|(_, queued)| queued.iter().any(|p| p == participant))
            .map(|(role, _)| role.as_str())
    }

    /// Append a participant to a role's join order
    ///
    /// Returns the participant's 1-based position within the role. Enforces
    /// the single-role-per-participant and capacity invariants.
    pub fn join(&mut self, participant: &str, role: &str) -> Result<usize> {
        let capacity = self.roles.capacity(role)?;

        if self.role_of(participant).is_some() {
            return Err(PartyFinderError::AlreadyQueued {
                participant: participant.to_string(),
                name: self.name.clone(),
            }
            .into());
        }

        let queued = self.occupants_mut(role)?;
        if queued.len() >= capacity {
            return Err(PartyFinderError::RoleFull {
                role: role.to_string(),
                name: self.name.clone(),
            }
            .into());
        }

        queued.push_back(participant.to_string());
        Ok(queued.len())
    }

    /// Remove a participant from whichever role holds them
    pub fn remove(&mut self, participant: &str) -> Option<RoleName> {
        for (role, queued) in &mut self.occupants {
            if let Some(idx) = queued.iter().position(|p| p == participant) {
                queued.remove(idx);
                return Some(role.clone());
            }
        }
        None
    }

    /// Whether every role is filled to exactly its capacity
    pub fn is_complete(&self) -> bool {
        self.occupants.iter().all(|(role, queued)| {
            self.roles
                .capacity(role)
                .map(|capacity| queued.len() == capacity)
                .unwrap_or(false)
        })
    }

    /// Drain the earliest joiners of every role into a party roster,
    /// leaving all roles empty
    ///
    /// Callers must check `is_complete` first; draining an incomplete queue
    /// would produce a short roster.
    pub fn form_party(&mut self) -> Party {
        let roster = self
            .occupants
            .iter_mut()
            .map(|(role, queued)| PartyMembers {
                role: role.clone(),
                participants: queued.drain(..).collect(),
            })
            .collect();

        Party { roster }
    }

    /// Point-in-time copy of the queue's occupants for display
    pub fn snapshot(&self) -> QueueSnapshot {
        let roles = self
            .occupants
            .iter()
            .map(|(role, queued)| RoleOccupancy {
                role: role.clone(),
                capacity: self.roles.capacity(role).unwrap_or(0),
                participants: queued.iter().cloned().collect(),
            })
            .collect();

        QueueSnapshot {
            name: self.name.clone(),
            roles,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }

    /// Total number of participants waiting across all roles
    pub fn waiting(&self) -> usize {
        self.occupants.iter().map(|(_, queued)| queued.len()).sum()
    }

    fn occupants_mut(&mut self, role: &str) -> Result<&mut VecDeque<ParticipantId>> {
        self.occupants
            .iter_mut()
            .find(|(name, _)| name == role)
            .map(|(_, queued)| queued)
            .ok_or_else(|| {
                PartyFinderError::UnknownRole {
                    role: role.to_string(),
                }
                .into()
            })
    }
}
