//! Structural and referential validation of story context graphs.
//!
//! Hard problems become errors and make the graph invalid. Soft problems
//! become warnings and never block. Every check runs on every call, so a report
//! lists all the problems in a graph at once.
//!
//! The checker only reads the graph. With [`CheckOptions::auto_fix`] it also
//! reports the [`Fix`]es that would resolve fixable errors; applying them is up
//! to the caller.

use crate::graph::{default_settings, EntityGraph, EntityType, GraphEntity};
use crate::resolve::extract::{infer_type, UNKNOWN_TYPE};
use crate::resolve::KnowledgeClient;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Settings every graph must carry.
pub const REQUIRED_SETTINGS: [&str; 4] = ["genre", "tone", "length", "age_appropriate"];

pub const COMMON_GENRES: [&str; 6] = ["adventure", "fantasy", "mystery", "comedy", "drama", "horror"];
pub const COMMON_TONES: [&str; 6] = ["gentle", "exciting", "mysterious", "funny", "serious", "whimsical"];
pub const VALID_LENGTHS: [&str; 3] = ["short", "medium", "long"];
pub const COMMON_SUBTYPES: [&str; 4] = ["protagonist", "antagonist", "supporting", "animal"];
pub const COMMON_RELATIONSHIP_TYPES: [&str; 11] = [
    "finds",
    "visits",
    "creates",
    "owns",
    "friend",
    "enemy",
    "family",
    "colleague",
    "location_of",
    "uses",
    "interacts_with",
];

/// Above this many characters a story is flagged as crowded.
const MAX_CHARACTERS: usize = 10;

/// Issue substrings and the remediation each one suggests.
///
/// Every rule is tried against every issue.
const SUGGESTIONS: [(&str, &str); 12] = [
    ("Settings section is missing or empty", "Add a settings section with genre, tone, length and age_appropriate"),
    ("Missing required setting", "Add the missing setting with an appropriate value"),
    ("age_appropriate", "Set age_appropriate to true or false"),
    ("invalid type", "Use a valid entity type: character, location, or item"),
    ("non-existent", "Add the missing entity or correct the id in the relationship"),
    ("missing ID", "Give every entity a non-empty id, name and type"),
    ("not found in knowledge service", "Consider adding the entity to the knowledge service or using an existing entity"),
    ("No protagonists found", "Add a character with subtype 'protagonist'"),
    ("No antagonists found", "Add a character with subtype 'antagonist' for conflict"),
    ("No locations found", "Add location entities to set the story scene"),
    ("self-referential", "Check that the relationship's subject and object are different entities"),
    ("No plot points found", "Add plot points describing the key story events"),
];

/// Options for a validation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Report fixes for fixable errors.
    pub auto_fix: bool,
}

impl CheckOptions {
    pub fn with_auto_fix(mut self, auto_fix: bool) -> Self {
        self.auto_fix = auto_fix;
        self
    }
}

/// What a [`Fix`] changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixTarget {
    /// A scalar setting, by key.
    Setting(String),
    /// The type of an entity, by id.
    EntityType(String),
}

/// A proposed change that resolves one error.
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    /// The error this fix resolves.
    pub issue: String,
    pub target: FixTarget,
    pub value: Value,
}

impl Fix {
    /// Apply the fix to a graph.
    pub fn apply(&self, graph: &mut EntityGraph) {
        match &self.target {
            FixTarget::Setting(key) => graph.set_setting(key.clone(), self.value.clone()),
            FixTarget::EntityType(id) => {
                let Some(label) = self.value.as_str() else {
                    return;
                };
                if let Some(entity) = graph.entities.get_mut(id) {
                    entity.entity_type = label.to_string();
                }
                graph.touch();
            }
        }
    }
}

impl fmt::Display for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            FixTarget::Setting(key) => write!(f, "settings.{key} = {}", self.value),
            FixTarget::EntityType(id) => write!(f, "entities.{id}.type = {}", self.value),
        }
    }
}

/// The outcome of validating a graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// True exactly when there are no errors.
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    /// Only filled when auto-fix was requested.
    pub fixes: Vec<Fix>,
}

#[derive(Default)]
struct Issues {
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Validates story context graphs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistencyChecker;

impl ConsistencyChecker {
    pub fn new() -> Self {
        Self
    }

    /// Run the structural checks.
    pub fn validate(&self, graph: &EntityGraph) -> ValidationReport {
        self.validate_with_options(graph, CheckOptions::default())
    }

    pub fn validate_with_options(&self, graph: &EntityGraph, options: CheckOptions) -> ValidationReport {
        let issues = structural_issues(graph);
        finish(graph, issues, options)
    }

    /// Run the structural checks, then cross-check every entity against the
    /// knowledge service.
    ///
    /// Missing entities and type disagreements are warnings, since a story may
    /// introduce entities the service has never seen. The cross-check is
    /// skipped in mock mode.
    pub async fn validate_with_service(
        &self,
        graph: &EntityGraph,
        client: &KnowledgeClient,
        options: CheckOptions,
    ) -> ValidationReport {
        let mut issues = structural_issues(graph);
        if client.is_mock() {
            issues
                .warnings
                .push("Knowledge service cross-check skipped (mock mode enabled)".to_string());
        } else {
            issues.warnings.extend(cross_check(graph, client).await);
        }
        finish(graph, issues, options)
    }
}

fn structural_issues(graph: &EntityGraph) -> Issues {
    let mut issues = Issues::default();
    check_metadata(graph, &mut issues);
    check_settings(graph, &mut issues);
    check_entities(graph, &mut issues);
    check_relationships(graph, &mut issues);
    check_patterns(graph, &mut issues);
    issues
}

fn finish(graph: &EntityGraph, issues: Issues, options: CheckOptions) -> ValidationReport {
    let Issues { errors, warnings } = issues;
    let suggestions = suggestions_for(errors.iter().chain(&warnings));
    let fixes = if options.auto_fix && !errors.is_empty() {
        fixes_for(graph)
    } else {
        Vec::new()
    };

    debug!(
        errors = errors.len(),
        warnings = warnings.len(),
        fixes = fixes.len(),
        "Graph validated"
    );

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
        warnings,
        suggestions,
        fixes,
    }
}

fn check_metadata(graph: &EntityGraph, issues: &mut Issues) {
    if !graph.metadata.contains_key("version") {
        issues.warnings.push("Missing version in metadata".to_string());
    }
    if !graph.metadata.contains_key("created_at") {
        issues.warnings.push("Missing created_at timestamp in metadata".to_string());
    }
}

fn check_settings(graph: &EntityGraph, issues: &mut Issues) {
    let settings = &graph.settings;
    if settings.is_empty() {
        issues.errors.push("Settings section is missing or empty".to_string());
        return;
    }

    for key in REQUIRED_SETTINGS {
        if !settings.contains_key(key) {
            issues.errors.push(format!("Missing required setting: {key}"));
        }
    }

    if settings.get("age_appropriate").is_some_and(|v| !v.is_boolean()) {
        issues.errors.push("age_appropriate must be a boolean value".to_string());
    }

    let reference_checks: [(&str, &str, &str, &[&str]); 3] = [
        ("genre", "Genre", "common genres", &COMMON_GENRES),
        ("tone", "Tone", "common tones", &COMMON_TONES),
        ("length", "Length", "valid lengths", &VALID_LENGTHS),
    ];
    for (key, label, list_name, reference) in reference_checks {
        if let Some(value) = settings.get(key) {
            if !value.as_str().is_some_and(|v| reference.contains(&v)) {
                issues.warnings.push(format!(
                    "{label} '{}' is not in {list_name}: {}",
                    display_value(value),
                    reference.join(", ")
                ));
            }
        }
    }
}

fn check_entities(graph: &EntityGraph, issues: &mut Issues) {
    if graph.entities.is_empty() {
        issues.warnings.push("No entities found in context".to_string());
        return;
    }

    let valid_types: Vec<&str> = EntityType::ALL.iter().map(|t| t.label()).collect();

    for (key, entity) in &graph.entities {
        if entity.id.trim().is_empty() {
            issues.errors.push(format!("Entity {key} missing ID"));
        }
        if entity.name.trim().is_empty() {
            issues.errors.push(format!("Entity {key} missing name"));
        }
        if entity.entity_type.trim().is_empty() {
            issues.errors.push(format!("Entity {key} missing type"));
        }

        if entity.kind().is_none() {
            issues.errors.push(format!(
                "Entity {key} has invalid type '{}'. Must be one of: {}",
                entity.entity_type,
                valid_types.join(", ")
            ));
        }

        if entity.is_type(EntityType::Character) && !COMMON_SUBTYPES.contains(&entity.subtype.as_str()) {
            issues.warnings.push(format!(
                "Character {key} has unusual subtype '{}'. Common subtypes: {}",
                entity.subtype,
                COMMON_SUBTYPES.join(", ")
            ));
        }
    }
}

fn check_relationships(graph: &EntityGraph, issues: &mut Issues) {
    for (i, relationship) in graph.relationships.iter().enumerate() {
        for id in relationship.subject.ids() {
            if !graph.entities.contains_key(id) {
                issues
                    .errors
                    .push(format!("Relationship {i} references non-existent subject entity: {id}"));
            }
        }
        for id in relationship.object.ids() {
            if !graph.entities.contains_key(id) {
                issues
                    .errors
                    .push(format!("Relationship {i} references non-existent object entity: {id}"));
            }
        }

        if relationship.is_self_referential() {
            issues
                .warnings
                .push(format!("Relationship {i} is self-referential (entity relates to itself)"));
        }

        if !COMMON_RELATIONSHIP_TYPES.contains(&relationship.relationship_type.as_str()) {
            issues.warnings.push(format!(
                "Relationship {i} has unusual type '{}'. Common types: {}",
                relationship.relationship_type,
                COMMON_RELATIONSHIP_TYPES.join(", ")
            ));
        }
    }
}

/// Story-shape advice. Only meaningful once there are entities.
fn check_patterns(graph: &EntityGraph, issues: &mut Issues) {
    if graph.entities.is_empty() {
        return;
    }

    let characters: Vec<&GraphEntity> = graph.entities_of_type(EntityType::Character).collect();

    if !characters.iter().any(|e| e.subtype == "protagonist") {
        issues
            .warnings
            .push("No protagonists found in story - consider adding a main character".to_string());
    }

    if characters.len() > 1 && !characters.iter().any(|e| e.subtype == "antagonist") {
        issues
            .warnings
            .push("No antagonists found - consider adding a character with conflict".to_string());
    }

    if graph.entities_of_type(EntityType::Location).next().is_none() {
        issues
            .warnings
            .push("No locations found - consider adding story settings".to_string());
    }

    if characters.len() > MAX_CHARACTERS {
        issues.warnings.push(format!(
            "Many characters found ({}) - consider simplifying for clarity",
            characters.len()
        ));
    }

    if graph.plot_points.is_empty() {
        issues
            .warnings
            .push("No plot points found - consider adding key story events".to_string());
    }
}

async fn cross_check(graph: &EntityGraph, client: &KnowledgeClient) -> Vec<String> {
    let lookups = graph.entities.values().map(|entity| async move {
        let found = client.lookup_entity(&entity.name).await;
        (entity, found)
    });

    let mut warnings = Vec::new();
    for (entity, found) in join_all(lookups).await {
        match found {
            Ok(None) => warnings.push(format!("Entity '{}' not found in knowledge service", entity.name)),
            Ok(Some(record)) => {
                // A record built from prose carries no type to compare.
                if record.entity_type != UNKNOWN_TYPE
                    && !record.entity_type.eq_ignore_ascii_case(&entity.entity_type)
                {
                    warnings.push(format!(
                        "Entity '{}' type mismatch: graph has '{}', knowledge service has '{}'",
                        entity.name, entity.entity_type, record.entity_type
                    ));
                }
            }
            Err(e) => warnings.push(format!(
                "Could not check entity '{}' against knowledge service: {}",
                entity.name,
                e.user_message()
            )),
        }
    }
    warnings
}

fn suggestions_for<'a>(issues: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut suggestions = Vec::new();
    for issue in issues {
        for (needle, suggestion) in SUGGESTIONS {
            if issue.contains(needle) && seen.insert(suggestion) {
                suggestions.push(suggestion.to_string());
            }
        }
    }
    suggestions
}

fn fixes_for(graph: &EntityGraph) -> Vec<Fix> {
    let mut fixes = Vec::new();
    let defaults = default_settings();

    for key in REQUIRED_SETTINGS {
        match graph.settings.get(key) {
            None => {
                if let Some(value) = defaults.get(key) {
                    fixes.push(Fix {
                        issue: format!("Missing required setting: {key}"),
                        target: FixTarget::Setting(key.to_string()),
                        value: value.clone(),
                    });
                }
            }
            Some(value) if key == "age_appropriate" && !value.is_boolean() => fixes.push(Fix {
                issue: "age_appropriate must be a boolean value".to_string(),
                target: FixTarget::Setting(key.to_string()),
                value: Value::Bool(coerce_bool(value)),
            }),
            Some(_) => {}
        }
    }

    for (key, entity) in &graph.entities {
        if entity.kind().is_none() {
            if let Some(guess) = guess_type(&entity.entity_type) {
                fixes.push(Fix {
                    issue: format!("Entity {key} has invalid type '{}'", entity.entity_type),
                    target: FixTarget::EntityType(key.clone()),
                    value: Value::String(guess.label().to_string()),
                });
            }
        }
    }

    fixes
}

/// Read a loosely typed flag. Anything unrecognised counts as true.
fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !matches!(s.trim().to_lowercase().as_str(), "false" | "no" | "0" | "off"),
        Value::Null => false,
        _ => true,
    }
}

/// The closest valid type for an invalid label, if any is close enough.
fn guess_type(label: &str) -> Option<EntityType> {
    let lowered = label.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    if let Some(t) = EntityType::from_label(&lowered) {
        return Some(t);
    }

    let hinted = infer_type(&lowered);
    if hinted != UNKNOWN_TYPE {
        return EntityType::from_label(hinted);
    }

    EntityType::ALL
        .into_iter()
        .map(|t| (t, strsim::normalized_levenshtein(&lowered, t.label())))
        .filter(|(_, score)| *score >= 0.5)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(t, _)| t)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Relationship;
    use serde_json::json;

    fn story() -> EntityGraph {
        let mut graph = EntityGraph::new();
        graph.add_entity(GraphEntity::character("char_001", "protagonist", "Lily"));
        graph.add_entity(GraphEntity::character("char_002", "antagonist", "Grumble"));
        graph.add_entity(GraphEntity::location("loc_001", "magical", "Magic Forest"));
        graph.add_relationship(Relationship::new("visits", "char_001", "loc_001"));
        graph.add_plot_point("Lily enters the forest");
        graph
    }

    #[test]
    fn test_complete_story_is_clean() {
        let report = ConsistencyChecker::new().validate(&story());
        assert!(report.is_valid, "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert!(report.suggestions.is_empty());
    }

    #[test]
    fn test_missing_and_malformed_settings() {
        let mut graph = story();
        graph.settings.remove("tone");
        graph.settings.insert("age_appropriate".into(), json!("yes"));
        graph.settings.insert("genre".into(), json!("space opera"));

        let report = ConsistencyChecker::new().validate(&graph);
        assert!(!report.is_valid);
        assert!(report.errors.contains(&"Missing required setting: tone".to_string()));
        assert!(report.errors.contains(&"age_appropriate must be a boolean value".to_string()));
        assert!(report.warnings.iter().any(|w| w.starts_with("Genre 'space opera'")));
        assert!(report.fixes.is_empty());
    }

    #[test]
    fn test_empty_settings_section() {
        let mut graph = story();
        graph.settings.clear();

        let report = ConsistencyChecker::new().validate(&graph);
        assert_eq!(report.errors, vec!["Settings section is missing or empty"]);
    }

    #[test]
    fn test_one_issue_can_yield_several_suggestions() {
        let mut graph = story();
        graph.settings.remove("age_appropriate");

        let report = ConsistencyChecker::new().validate(&graph);
        assert!(report
            .suggestions
            .contains(&"Add the missing setting with an appropriate value".to_string()));
        assert!(report
            .suggestions
            .contains(&"Set age_appropriate to true or false".to_string()));
    }

    #[test]
    fn test_invalid_entity_type_and_unusual_subtype() {
        let mut graph = story();
        graph.add_entity(GraphEntity::new("org_001", "Person", "", "The Baker"));
        graph.add_entity(GraphEntity::character("char_003", "sidekick", "Pip"));

        let report = ConsistencyChecker::new().validate(&graph);
        assert!(report
            .errors
            .iter()
            .any(|e| e.starts_with("Entity org_001 has invalid type 'Person'")));
        assert!(report
            .warnings
            .iter()
            .any(|w| w.starts_with("Character char_003 has unusual subtype 'sidekick'")));
    }

    #[test]
    fn test_self_referential_and_unusual_relationship() {
        let mut graph = story();
        graph.add_relationship(Relationship::new("admires", "char_001", vec!["char_001", "char_002"]));

        let report = ConsistencyChecker::new().validate(&graph);
        assert!(report.is_valid);
        assert!(report
            .warnings
            .contains(&"Relationship 1 is self-referential (entity relates to itself)".to_string()));
        assert!(report
            .warnings
            .iter()
            .any(|w| w.starts_with("Relationship 1 has unusual type 'admires'")));
    }

    #[test]
    fn test_story_shape_warnings() {
        let mut graph = EntityGraph::new();
        for i in 0..11 {
            graph.add_entity(GraphEntity::character(format!("char_{i:03}"), "supporting", format!("Kid {i}")));
        }

        let report = ConsistencyChecker::new().validate(&graph);
        assert!(report.is_valid);
        let expected = [
            "No protagonists found",
            "No antagonists found",
            "No locations found",
            "Many characters found (11)",
            "No plot points found",
        ];
        for prefix in expected {
            assert!(report.warnings.iter().any(|w| w.starts_with(prefix)), "missing {prefix}");
        }
    }

    #[test]
    fn test_empty_graph_only_warns_about_entities() {
        let report = ConsistencyChecker::new().validate(&EntityGraph::new());
        assert!(report.is_valid);
        assert_eq!(report.warnings, vec!["No entities found in context"]);
    }

    #[test]
    fn test_missing_metadata_warns() {
        let mut graph = story();
        graph.metadata.clear();

        let report = ConsistencyChecker::new().validate(&graph);
        assert!(report.warnings.contains(&"Missing version in metadata".to_string()));
        assert!(report
            .warnings
            .contains(&"Missing created_at timestamp in metadata".to_string()));
    }

    #[test]
    fn test_auto_fix_reports_without_mutating() {
        let mut graph = story();
        graph.settings.remove("genre");
        graph.settings.insert("age_appropriate".into(), json!("no"));
        graph.add_entity(GraphEntity::new("loc_002", "Place", "", "Old Mill"));
        let before = graph.clone();

        let report = ConsistencyChecker::new()
            .validate_with_options(&graph, CheckOptions::default().with_auto_fix(true));
        assert_eq!(graph, before);

        let rendered: Vec<String> = report.fixes.iter().map(|f| f.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                r#"settings.genre = "adventure""#,
                "settings.age_appropriate = false",
                r#"entities.loc_002.type = "location""#,
            ]
        );

        for fix in &report.fixes {
            fix.apply(&mut graph);
        }
        assert!(ConsistencyChecker::new().validate(&graph).is_valid);
    }

    #[test]
    fn test_guess_type() {
        assert_eq!(guess_type("Character"), Some(EntityType::Character));
        assert_eq!(guess_type("object"), Some(EntityType::Item));
        assert_eq!(guess_type("locaton"), Some(EntityType::Location));
        assert_eq!(guess_type("zzzz"), None);
        assert_eq!(guess_type(""), None);
    }

    #[test]
    fn test_coerce_bool() {
        assert!(coerce_bool(&json!("Yes")));
        assert!(!coerce_bool(&json!("off")));
        assert!(!coerce_bool(&json!(0)));
        assert!(coerce_bool(&json!(2)));
    }
}
