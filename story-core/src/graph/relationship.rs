//! Relationships between entities.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One or more entity ids on one side of a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRefs {
    Single(String),
    Multiple(Vec<String>),
}

impl EntityRefs {
    /// The referenced ids, always as a list.
    pub fn ids(&self) -> &[String] {
        match self {
            EntityRefs::Single(id) => std::slice::from_ref(id),
            EntityRefs::Multiple(ids) => ids,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids().iter().any(|i| i == id)
    }
}

impl From<&str> for EntityRefs {
    fn from(id: &str) -> Self {
        EntityRefs::Single(id.to_string())
    }
}

impl From<String> for EntityRefs {
    fn from(id: String) -> Self {
        EntityRefs::Single(id)
    }
}

impl From<Vec<&str>> for EntityRefs {
    fn from(ids: Vec<&str>) -> Self {
        EntityRefs::Multiple(ids.into_iter().map(String::from).collect())
    }
}

/// A relationship between entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Free-text relationship type (finds, visits, owns, ...).
    #[serde(rename = "type")]
    pub relationship_type: String,
    /// Entity id(s) performing the action.
    pub subject: EntityRefs,
    /// Entity id(s) receiving the action.
    pub object: EntityRefs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Which user inputs mentioned this relationship.
    #[serde(default)]
    pub mentioned_at: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Relationship {
    /// Create a new relationship.
    pub fn new(
        relationship_type: impl Into<String>,
        subject: impl Into<EntityRefs>,
        object: impl Into<EntityRefs>,
    ) -> Self {
        Self {
            relationship_type: relationship_type.into(),
            subject: subject.into(),
            object: object.into(),
            location: None,
            mentioned_at: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Set the location context.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Record the user input this relationship came from.
    pub fn mentioned_at(mut self, input_id: impl Into<String>) -> Self {
        self.mentioned_at.push(input_id.into());
        self
    }

    /// Check if this relationship involves a specific entity.
    pub fn involves(&self, entity_id: &str) -> bool {
        self.subject.contains(entity_id) || self.object.contains(entity_id)
    }

    /// Check if any entity appears as both subject and object.
    pub fn is_self_referential(&self) -> bool {
        let subjects: HashSet<&str> = self.subject.ids().iter().map(String::as_str).collect();
        self.object.ids().iter().any(|id| subjects.contains(id.as_str()))
    }
}
