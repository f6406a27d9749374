//! Story context graph.
//!
//! An [`EntityGraph`] is the assembled state a story is generated from: scalar
//! settings, entities keyed by id, the relationships between them, and the plot
//! points. The graph is owned by the caller; validation only ever reads it.

mod entity;
mod relationship;

pub use entity::{EntityType, GraphEntity};
pub use relationship::{EntityRefs, Relationship};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Current version written into new graph metadata.
pub const GRAPH_VERSION: &str = "1.0.0";

/// Complete story context: settings, entities, relationships and plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityGraph {
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub entities: BTreeMap<String, GraphEntity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub user_inputs: BTreeMap<String, String>,
    #[serde(default)]
    pub plot_points: Vec<String>,
}

impl Default for EntityGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityGraph {
    /// Create an empty graph with default settings and fresh metadata.
    pub fn new() -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        let mut metadata = Map::new();
        metadata.insert("version".into(), json!(GRAPH_VERSION));
        metadata.insert("created_at".into(), json!(now));
        metadata.insert("updated_at".into(), json!(now));

        Self {
            metadata,
            settings: default_settings(),
            entities: BTreeMap::new(),
            relationships: Vec::new(),
            user_inputs: BTreeMap::new(),
            plot_points: Vec::new(),
        }
    }

    /// Add an entity, keyed by its id.
    pub fn add_entity(&mut self, entity: GraphEntity) {
        self.entities.insert(entity.id.clone(), entity);
        self.touch();
    }

    pub fn add_relationship(&mut self, relationship: Relationship) {
        self.relationships.push(relationship);
        self.touch();
    }

    pub fn add_user_input(&mut self, input_id: impl Into<String>, text: impl Into<String>) {
        self.user_inputs.insert(input_id.into(), text.into());
        self.touch();
    }

    pub fn add_plot_point(&mut self, plot_point: impl Into<String>) {
        self.plot_points.push(plot_point.into());
        self.touch();
    }

    /// Set a scalar setting (genre, tone, length, ...).
    pub fn set_setting(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.settings.insert(key.into(), value.into());
        self.touch();
    }

    /// Look up an entity by name, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<&GraphEntity> {
        let name = name.to_lowercase();
        self.entities.values().find(|e| e.name.to_lowercase() == name)
    }

    /// All entities of one type, in id order.
    pub fn entities_of_type(&self, entity_type: EntityType) -> impl Iterator<Item = &GraphEntity> {
        self.entities.values().filter(move |e| e.is_type(entity_type))
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self) {
        self.metadata
            .insert("updated_at".into(), json!(chrono::Utc::now().to_rfc3339()));
    }
}

/// Settings a new story starts with.
pub fn default_settings() -> Map<String, Value> {
    let mut settings = Map::new();
    settings.insert("genre".into(), json!("adventure"));
    settings.insert("tone".into(), json!("gentle"));
    settings.insert("length".into(), json!("short"));
    settings.insert("morals".into(), json!([]));
    settings.insert("age_appropriate".into(), json!(true));
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_graph_has_defaults() {
        let graph = EntityGraph::new();
        assert_eq!(graph.metadata["version"], GRAPH_VERSION);
        assert!(graph.metadata.contains_key("created_at"));
        assert_eq!(graph.settings["genre"], "adventure");
        assert_eq!(graph.settings["age_appropriate"], true);
    }

    #[test]
    fn test_deserialized_graph_keeps_missing_sections_empty() {
        let graph: EntityGraph = serde_json::from_str(r#"{"plot_points": ["Lily finds a key"]}"#).unwrap();
        assert!(graph.settings.is_empty());
        assert!(graph.entities.is_empty());
        assert_eq!(graph.plot_points.len(), 1);
    }

    #[test]
    fn test_find_and_filter() {
        let mut graph = EntityGraph::new();
        graph.add_entity(GraphEntity::character("char_001", "protagonist", "Lily"));
        graph.add_entity(GraphEntity::location("loc_001", "magical", "Magic Forest"));

        assert_eq!(graph.find_by_name("magic forest").map(|e| e.id.as_str()), Some("loc_001"));
        assert_eq!(graph.entities_of_type(EntityType::Character).count(), 1);
        assert_eq!(graph.entities_of_type(EntityType::Item).count(), 0);
    }
}
