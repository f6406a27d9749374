//! Testing utilities.
//!
//! This module provides tools for integration testing:
//! - `GraphBuilder` for assembling story graphs in a few lines
//! - `mock_client` for a client that never touches the network
//! - Assertion helpers for validation reports and match lists

use crate::consistency::ValidationReport;
use crate::graph::{EntityGraph, GraphEntity, Relationship};
use crate::resolve::{CandidateEntity, KnowledgeClient};
use knowledge::KnowledgeConfig;
use serde_json::Value;

/// Builds an [`EntityGraph`] step by step.
///
/// Starts from [`EntityGraph::new`], so default settings and metadata are in
/// place unless removed.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    graph: EntityGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small valid story: a protagonist, an antagonist, a location, a
    /// relationship between them, and one plot point.
    pub fn sample_story() -> Self {
        Self::new()
            .protagonist("char_001", "Lily")
            .antagonist("char_002", "Grumble")
            .location("loc_001", "Magic Forest")
            .relationship("visits", "char_001", "loc_001")
            .plot_point("Lily follows a glowing path into the forest")
    }

    pub fn protagonist(self, id: &str, name: &str) -> Self {
        self.entity(GraphEntity::character(id, "protagonist", name))
    }

    pub fn antagonist(self, id: &str, name: &str) -> Self {
        self.entity(GraphEntity::character(id, "antagonist", name))
    }

    pub fn character(self, id: &str, subtype: &str, name: &str) -> Self {
        self.entity(GraphEntity::character(id, subtype, name))
    }

    pub fn location(self, id: &str, name: &str) -> Self {
        self.entity(GraphEntity::location(id, "magical", name))
    }

    pub fn item(self, id: &str, name: &str) -> Self {
        self.entity(GraphEntity::item(id, "magical", name))
    }

    pub fn entity(mut self, entity: GraphEntity) -> Self {
        self.graph.add_entity(entity);
        self
    }

    pub fn relationship(mut self, relationship_type: &str, subject: &str, object: &str) -> Self {
        self.graph
            .add_relationship(Relationship::new(relationship_type, subject, object));
        self
    }

    pub fn plot_point(mut self, plot_point: &str) -> Self {
        self.graph.add_plot_point(plot_point);
        self
    }

    pub fn setting(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.graph.set_setting(key, value);
        self
    }

    pub fn without_setting(mut self, key: &str) -> Self {
        self.graph.settings.remove(key);
        self
    }

    pub fn build(self) -> EntityGraph {
        self.graph
    }
}

/// A client serving offline data.
pub fn mock_client() -> KnowledgeClient {
    KnowledgeClient::new(KnowledgeConfig::mock()).expect("mock config is valid")
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the report has no errors.
#[track_caller]
pub fn assert_valid(report: &ValidationReport) {
    assert!(
        report.is_valid,
        "Expected a valid graph, got errors: {:?}",
        report.errors
    );
}

/// Assert the report has at least one error.
#[track_caller]
pub fn assert_invalid(report: &ValidationReport) {
    assert!(!report.is_valid, "Expected an invalid graph, got no errors");
}

/// Assert some error contains the given text.
#[track_caller]
pub fn assert_has_error_containing(report: &ValidationReport, text: &str) {
    assert!(
        report.errors.iter().any(|e| e.contains(text)),
        "Expected an error containing '{text}', got: {:?}",
        report.errors
    );
}

/// Assert some warning contains the given text.
#[track_caller]
pub fn assert_has_warning_containing(report: &ValidationReport, text: &str) {
    assert!(
        report.warnings.iter().any(|w| w.contains(text)),
        "Expected a warning containing '{text}', got: {:?}",
        report.warnings
    );
}

/// Assert no two candidates share a case-folded name.
#[track_caller]
pub fn assert_unique_names(candidates: &[CandidateEntity]) {
    let mut seen = std::collections::HashSet::new();
    for candidate in candidates {
        assert!(
            seen.insert(candidate.dedup_key()),
            "Duplicate candidate name '{}'",
            candidate.name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consistency::ConsistencyChecker;

    #[test]
    fn test_sample_story_is_valid() {
        let report = ConsistencyChecker::new().validate(&GraphBuilder::sample_story().build());
        assert_valid(&report);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[test]
    fn test_builder_settings() {
        let graph = GraphBuilder::new()
            .setting("genre", "mystery")
            .without_setting("tone")
            .build();

        assert_eq!(graph.settings["genre"], "mystery");
        assert!(!graph.settings.contains_key("tone"));

        let report = ConsistencyChecker::new().validate(&graph);
        assert_invalid(&report);
        assert_has_error_containing(&report, "tone");
    }

    #[test]
    fn test_mock_client_is_offline() {
        assert!(mock_client().is_mock());
    }
}
