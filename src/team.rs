//! Team roster: the read-only registry of humans who may own conversations
//!
//! Every write boundary that accepts a human id validates it here, so
//! `Ownership::Human` can never reference an unknown agent.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TeamError {
    #[error("Failed to read roster file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid roster file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Unknown team member: {0}")]
    UnknownMember(String),
}

/// Role of a team member, used by the visibility filter and permission checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Agent,
    Manager,
}

/// A human agent as listed in the roster file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub role: Role,
}

/// Registry of team members, loaded once at startup
pub struct TeamRegistry {
    members: HashMap<String, TeamMember>,
}

impl TeamRegistry {
    /// Load the roster from a JSON file (an array of members)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TeamError> {
        let raw = std::fs::read_to_string(path)?;
        let members: Vec<TeamMember> = serde_json::from_str(&raw)?;
        Ok(Self::from_members(members))
    }

    pub fn from_members(members: Vec<TeamMember>) -> Self {
        Self {
            members: members.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&TeamMember> {
        self.members.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains_key(id)
    }

    /// Validate that `id` names a roster member
    pub fn validate(&self, id: &str) -> Result<&TeamMember, TeamError> {
        self.members
            .get(id)
            .ok_or_else(|| TeamError::UnknownMember(id.to_string()))
    }

    pub fn is_elevated(&self, id: &str) -> bool {
        self.members
            .get(id)
            .is_some_and(|m| m.role == Role::Manager)
    }

    /// All members, sorted by id for stable listings
    pub fn members(&self) -> Vec<&TeamMember> {
        let mut all: Vec<_> = self.members.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
pub fn test_roster() -> TeamRegistry {
    TeamRegistry::from_members(vec![
        TeamMember {
            id: "ana".to_string(),
            name: "Ana Souza".to_string(),
            role: Role::Agent,
        },
        TeamMember {
            id: "bruno".to_string(),
            name: "Bruno Lima".to_string(),
            role: Role::Agent,
        },
        TeamMember {
            id: "marcos".to_string(),
            name: "Marcos Dias".to_string(),
            role: Role::Manager,
        },
    ])
}
