//! Deterministic offline data.
//!
//! Served in mock mode, and as the fallback for detail, type-list and health
//! lookups when the service cannot be reached.

use crate::resolve::CandidateEntity;
use knowledge::HealthStatus;
use serde_json::json;

/// Entity types reported when the service's own list is unavailable.
pub const FALLBACK_ENTITY_TYPES: [&str; 5] = ["character", "location", "item", "event", "organization"];

fn purple_dragon() -> CandidateEntity {
    CandidateEntity::new("Purple Dragon", "character")
        .with_description("A friendly purple dragon who lives in the magic forest")
        .with_property("color", "purple")
        .with_property("personality", "friendly")
        .with_property("habitat", "magic forest")
}

fn magic_forest(description: &str) -> CandidateEntity {
    CandidateEntity::new("Magic Forest", "location")
        .with_description(description)
        .with_property("type", "magical")
        .with_property("accessibility", "public")
        .with_property("danger_level", "low")
}

fn lily(description: &str) -> CandidateEntity {
    CandidateEntity::new("Lily", "character")
        .with_description(description)
        .with_property("age", 8)
        .with_property("personality", "curious and brave")
        .with_property("role", "protagonist")
}

/// Search fixtures matched by keywords in the query.
pub fn search(query: &str) -> Vec<CandidateEntity> {
    let query = query.to_lowercase();
    let mut entities = Vec::new();

    if query.contains("dragon") {
        entities.push(purple_dragon());
    }
    if query.contains("forest") || query.contains("location") {
        entities.push(magic_forest("A mystical forest filled with magical creatures"));
    }
    if query.contains("lily") || query.contains("character") {
        entities.push(lily("A curious and brave 8-year-old girl"));
    }

    entities
}

/// Detail fixture for an exact (case-insensitive) name.
pub fn details(name: &str) -> Option<CandidateEntity> {
    match name.trim().to_lowercase().as_str() {
        "lily" => Some(lily("A curious and brave 8-year-old girl who loves adventures")),
        "purple dragon" => Some(purple_dragon()),
        "magic forest" => Some(magic_forest(
            "A mystical forest filled with magical creatures and wonders",
        )),
        _ => None,
    }
}

pub fn entity_types() -> Vec<String> {
    FALLBACK_ENTITY_TYPES.iter().map(|t| t.to_string()).collect()
}

pub fn health() -> HealthStatus {
    HealthStatus {
        status: "healthy".to_string(),
        pipeline_busy: Some(false),
        configuration: Some(json!({ "mode": "mock" })),
        ..HealthStatus::default()
    }
}
