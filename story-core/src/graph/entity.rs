//! Entities in a story context graph.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The closed set of entity types a story graph may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// A person, animal, or other actor.
    Character,
    /// A place where the story happens.
    Location,
    /// An object that can be found, owned, or used.
    Item,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [EntityType::Character, EntityType::Location, EntityType::Item];

    /// The label used in graphs and on the wire.
    pub fn label(&self) -> &'static str {
        match self {
            EntityType::Character => "character",
            EntityType::Location => "location",
            EntityType::Item => "item",
        }
    }

    /// Parse an exact label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.label() == label)
    }
}

/// An entity record in a story graph.
///
/// `entity_type` is kept as free text so that graphs with unknown types can
/// still be loaded and reported on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEntity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub subtype: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Whether a matching record was found in the knowledge service.
    #[serde(default)]
    pub existing: bool,
    /// Knowledge service reference when `existing`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag_id: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl GraphEntity {
    /// Create a new entity.
    pub fn new(
        id: impl Into<String>,
        entity_type: impl Into<String>,
        subtype: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            subtype: subtype.into(),
            name: name.into(),
            description: String::new(),
            existing: false,
            rag_id: None,
            properties: Map::new(),
        }
    }

    pub fn character(id: impl Into<String>, subtype: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, EntityType::Character.label(), subtype, name)
    }

    pub fn location(id: impl Into<String>, subtype: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, EntityType::Location.label(), subtype, name)
    }

    pub fn item(id: impl Into<String>, subtype: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, EntityType::Item.label(), subtype, name)
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The parsed type, if it is one of the closed set.
    pub fn kind(&self) -> Option<EntityType> {
        EntityType::from_label(&self.entity_type)
    }

    pub fn is_type(&self, entity_type: EntityType) -> bool {
        self.entity_type == entity_type.label()
    }

    pub fn is_character_with_subtype(&self, subtype: &str) -> bool {
        self.is_type(EntityType::Character) && self.subtype == subtype
    }
}
