//! Role slot configuration
//!
//! This module defines the fixed party composition: which roles a party
//! requires and how many participants each role takes. The set is built at
//! startup and treated as read-only shared data afterwards.

use crate::error::{PartyFinderError, Result};
use crate::types::RoleName;
use serde::{Deserialize, Serialize};

/// One role slot in the party composition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSlot {
    pub name: RoleName,
    pub capacity: usize,
}

/// The set of roles required to form a party, with per-role capacity
///
/// Ordering is preserved: snapshots and party rosters list roles in the
/// order they were configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSlotSet {
    slots: Vec<RoleSlot>,
}

impl RoleSlotSet {
    /// Build a role set from (name, capacity) pairs, validating as we go
    pub fn new<I, S>(slots: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let slots: Vec<RoleSlot> = slots
            .into_iter()
            .map(|(name, capacity)| RoleSlot {
                name: name.into(),
                capacity,
            })
            .collect();

        let set = Self { slots };
        set.validate()?;
        Ok(set)
    }

    /// Parse a compact role spec like `tank:1,healer:1,dps:4`
    pub fn parse(spec: &str) -> Result<Self> {
        let mut slots = Vec::new();
        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (name, capacity) =
                part.split_once(':')
                    .ok_or_else(|| PartyFinderError::ConfigurationError {
                        message: format!("Invalid role spec entry: {}", part),
                    })?;
            let capacity: usize =
                capacity
                    .trim()
                    .parse()
                    .map_err(|_| PartyFinderError::ConfigurationError {
                        message: format!("Invalid capacity for role {}: {}", name, capacity),
                    })?;
            slots.push((name.trim().to_string(), capacity));
        }
        Self::new(slots)
    }

    /// Validate the configured slots
    pub fn validate(&self) -> Result<()> {
        if self.slots.is_empty() {
            return Err(PartyFinderError::ConfigurationError {
                message: "Role set cannot be empty".to_string(),
            }
            .into());
        }

        for slot in &self.slots {
            if slot.name.is_empty() {
                return Err(PartyFinderError::ConfigurationError {
                    message: "Role name cannot be empty".to_string(),
                }
                .into());
            }
            if slot.capacity == 0 {
                return Err(PartyFinderError::ConfigurationError {
                    message: format!("Role {} must have capacity of at least 1", slot.name),
                }
                .into());
            }
        }

        for (i, slot) in self.slots.iter().enumerate() {
            if self.slots[..i].iter().any(|s| s.name == slot.name) {
                return Err(PartyFinderError::ConfigurationError {
                    message: format!("Duplicate role: {}", slot.name),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Required roles in configuration order
    pub fn roles(&self) -> impl Iterator<Item = &RoleSlot> {
        self.slots.iter()
    }

    /// Whether a role is part of the composition
    pub fn contains(&self, role: &str) -> bool {
        self.slots.iter().any(|s| s.name == role)
    }

    /// Capacity for a role, failing with `UnknownRole` if not configured
    pub fn capacity(&self, role: &str) -> Result<usize> {
        self.slots
            .iter()
            .find(|s| s.name == role)
            .map(|s| s.capacity)
            .ok_or_else(|| {
                PartyFinderError::UnknownRole {
                    role: role.to_string(),
                }
                .into()
            })
    }

    /// Total party size across all roles
    pub fn party_size(&self) -> usize {
        self.slots.iter().map(|s| s.capacity).sum()
    }
}

impl Default for RoleSlotSet {
    /// The classic dungeon composition: one tank, one healer, four dps
    fn default() -> Self {
        Self::new([("tank", 1), ("healer", 1), ("dps", 4)])
            .expect("default role set is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_composition() {
        let roles = RoleSlotSet::default();
        assert_eq!(roles.capacity("tank").unwrap(), 1);
        assert_eq!(roles.capacity("healer").unwrap(), 1);
        assert_eq!(roles.capacity("dps").unwrap(), 4);
        assert_eq!(roles.party_size(), 6);
    }

    #[test]
    fn test_unknown_role() {
        let roles = RoleSlotSet::default();
        assert!(!roles.contains("bard"));
        assert!(roles.capacity("bard").is_err());
    }

    #[test]
    fn test_role_order_preserved() {
        let roles = RoleSlotSet::new([("healer", 2), ("dps", 3)]).unwrap();
        let names: Vec<_> = roles.roles().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["healer", "dps"]);
    }

    #[test]
    fn test_parse_compact_spec() {
        let roles = RoleSlotSet::parse("tank:1, healer:1, dps:4").unwrap();
        assert_eq!(roles.party_size(), 6);
        assert_eq!(roles.capacity("dps").unwrap(), 4);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(RoleSlotSet::parse("tank").is_err());
        assert!(RoleSlotSet::parse("tank:x").is_err());
        assert!(RoleSlotSet::parse("").is_err());
    }

    #[test]
    fn test_validation_rules() {
        assert!(RoleSlotSet::new([("tank", 0)]).is_err());
        assert!(RoleSlotSet::new([("tank", 1), ("tank", 2)]).is_err());
        assert!(RoleSlotSet::new([("", 1)]).is_err());
        assert!(RoleSlotSet::new(Vec::<(String, usize)>::new()).is_err());
    }
}
