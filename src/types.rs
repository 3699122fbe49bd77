//! Common types used throughout the party-finder service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identity of a queued participant
pub type ParticipantId = String;

/// Identifier of a role slot (e.g. "tank")
pub type RoleName = String;

/// Name identifying one queue in the engine's registry
pub type QueueName = String;

/// Occupancy of a single role within a queue snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleOccupancy {
    pub role: RoleName,
    pub capacity: usize,
    /// Participants in join order
    pub participants: Vec<ParticipantId>,
}

impl RoleOccupancy {
    /// Slots still open for this role
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.participants.len())
    }
}

/// Read-only, point-in-time copy of a queue's occupants for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub name: QueueName,
    pub roles: Vec<RoleOccupancy>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl QueueSnapshot {
    /// Total number of participants currently waiting in the queue
    pub fn waiting(&self) -> usize {
        self.roles.iter().map(|r| r.participants.len()).sum()
    }

    /// Whether every role is filled to capacity
    pub fn is_complete(&self) -> bool {
        self.roles.iter().all(|r| r.participants.len() == r.capacity)
    }
}

/// Participants selected for one role of a formed party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyMembers {
    pub role: RoleName,
    pub participants: Vec<ParticipantId>,
}

/// The finalized roster formed when every role reaches its required count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub roster: Vec<PartyMembers>,
}

impl Party {
    /// Total party size across all roles
    pub fn size(&self) -> usize {
        self.roster.iter().map(|m| m.participants.len()).sum()
    }

    /// Members selected for a given role, if that role exists in the roster
    pub fn members(&self, role: &str) -> Option<&[ParticipantId]> {
        self.roster
            .iter()
            .find(|m| m.role == role)
            .map(|m| m.participants.as_slice())
    }
}

/// Private acknowledgment returned to a joining participant,
/// distinct from the broadcast state-change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinAck {
    pub queue: QueueName,
    pub role: RoleName,
    /// 1-based position within the role's join order
    pub position: usize,
    /// Whether this join completed the party
    pub party_formed: bool,
}

/// Private acknowledgment returned to a leaving participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveAck {
    pub queue: QueueName,
    pub role: RoleName,
}

/// Event emitted when a new queue is registered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueCreated {
    pub name: QueueName,
    pub snapshot: QueueSnapshot,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted after every mutation of a queue's occupants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStateChanged {
    pub name: QueueName,
    pub snapshot: QueueSnapshot,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when every role reaches capacity and a party forms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyFormed {
    pub name: QueueName,
    pub party: Party,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a queue's expiration deadline elapses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueExpired {
    pub name: QueueName,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a queue is removed by deletion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueDeleted {
    pub name: QueueName,
    pub timestamp: DateTime<Utc>,
}

/// Union type for all queue lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueEvent {
    QueueCreated(QueueCreated),
    QueueStateChanged(QueueStateChanged),
    PartyFormed(PartyFormed),
    QueueExpired(QueueExpired),
    QueueDeleted(QueueDeleted),
}

impl QueueEvent {
    /// Name of the queue this event concerns
    pub fn queue_name(&self) -> &str {
        match self {
            QueueEvent::QueueCreated(e) => &e.name,
            QueueEvent::QueueStateChanged(e) => &e.name,
            QueueEvent::PartyFormed(e) => &e.name,
            QueueEvent::QueueExpired(e) => &e.name,
            QueueEvent::QueueDeleted(e) => &e.name,
        }
    }
}
