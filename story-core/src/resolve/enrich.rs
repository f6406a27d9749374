//! Marking story entities that already exist in the knowledge service.

use super::client::KnowledgeClient;
use super::scorer::MatchResult;
use crate::graph::{EntityGraph, GraphEntity};
use serde_json::json;
use std::fmt;
use tracing::{debug, info, warn};

/// What happened to one entity during enrichment.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentOutcome {
    /// Enriched from a confident match.
    Matched { matched_name: String, confidence: f64, similarity: f64 },
    /// Enriched, but the match should be confirmed by a person.
    NeedsConfirmation { matched_name: String, confidence: f64, similarity: f64 },
    /// A match was found but was too weak to use.
    SkippedLowConfidence { matched_name: String, confidence: f64, similarity: f64 },
    /// No candidates came back, or only ones synthesized from the query.
    NotFound,
}

impl EnrichmentOutcome {
    /// Whether the entity was updated.
    pub fn is_enriched(&self) -> bool {
        matches!(
            self,
            EnrichmentOutcome::Matched { .. } | EnrichmentOutcome::NeedsConfirmation { .. }
        )
    }
}

impl fmt::Display for EnrichmentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichmentOutcome::Matched { matched_name, confidence, similarity } => write!(
                f,
                "matched '{matched_name}' (confidence: {confidence:.2}, similarity: {similarity:.2})"
            ),
            EnrichmentOutcome::NeedsConfirmation { matched_name, confidence, similarity } => write!(
                f,
                "matched '{matched_name}' pending confirmation (confidence: {confidence:.2}, similarity: {similarity:.2})"
            ),
            EnrichmentOutcome::SkippedLowConfidence { matched_name, confidence, similarity } => write!(
                f,
                "skipped '{matched_name}' (confidence: {confidence:.2}, similarity: {similarity:.2})"
            ),
            EnrichmentOutcome::NotFound => write!(f, "not found"),
        }
    }
}

/// Outcome for one graph entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityEnrichment {
    pub entity_id: String,
    pub entity_name: String,
    pub outcome: EnrichmentOutcome,
}

/// Per-entity outcomes of an enrichment pass, in entity id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentReport {
    pub entities: Vec<EntityEnrichment>,
}

impl EnrichmentReport {
    pub fn enriched_count(&self) -> usize {
        self.entities.iter().filter(|e| e.outcome.is_enriched()).count()
    }

    /// Ids of enriched entities whose match should be confirmed.
    pub fn needs_confirmation(&self) -> Vec<&str> {
        self.entities
            .iter()
            .filter(|e| matches!(e.outcome, EnrichmentOutcome::NeedsConfirmation { .. }))
            .map(|e| e.entity_id.as_str())
            .collect()
    }

    pub fn outcome_for(&self, entity_id: &str) -> Option<&EnrichmentOutcome> {
        self.entities
            .iter()
            .find(|e| e.entity_id == entity_id)
            .map(|e| &e.outcome)
    }

    /// One-line summary, e.g. `2 of 3 entities matched, 1 pending confirmation`.
    pub fn summary(&self) -> String {
        format!(
            "{} of {} entities matched, {} pending confirmation",
            self.enriched_count(),
            self.entities.len(),
            self.needs_confirmation().len()
        )
    }
}

/// Look every graph entity up in the knowledge service and fold in what is
/// found.
///
/// The best match that was actually extracted from a response is used when
/// its confidence reaches the scorer's low threshold: the entity is marked
/// existing, gets a `rag_<id>` reference, and takes the match's description,
/// properties and relationships.
pub async fn enrich_entities(client: &KnowledgeClient, graph: &mut EntityGraph) -> EnrichmentReport {
    let thresholds = *client.scorer().thresholds();
    let mut report = EnrichmentReport::default();
    let mut changed = false;

    for entity in graph.entities.values_mut() {
        let expected_type = Some(entity.entity_type.as_str()).filter(|t| !t.is_empty());
        let matches = client.resolve(&entity.name, expected_type).await;

        // Records synthesized from the query say nothing about existence.
        let outcome = match matches.iter().find(|m| !m.entity.synthetic) {
            None => {
                debug!(entity = %entity.name, synthesized = matches.len(), "No extracted match");
                EnrichmentOutcome::NotFound
            }
            Some(best) if best.confidence < thresholds.low_confidence() => {
                warn!(
                    entity = %entity.name,
                    candidate = %best.entity.name,
                    confidence = best.confidence,
                    "Low confidence match skipped"
                );
                EnrichmentOutcome::SkippedLowConfidence {
                    matched_name: best.entity.name.clone(),
                    confidence: best.confidence,
                    similarity: best.similarity,
                }
            }
            Some(best) => {
                apply_match(entity, best);
                changed = true;
                let (matched_name, confidence, similarity) =
                    (best.entity.name.clone(), best.confidence, best.similarity);

                if client.scorer().should_require_confirmation(best) {
                    warn!(entity = %entity.name, candidate = %matched_name, confidence, "{}", best.rationale);
                    EnrichmentOutcome::NeedsConfirmation { matched_name, confidence, similarity }
                } else {
                    info!(entity = %entity.name, candidate = %matched_name, confidence, "{}", best.rationale);
                    EnrichmentOutcome::Matched { matched_name, confidence, similarity }
                }
            }
        };

        report.entities.push(EntityEnrichment {
            entity_id: entity.id.clone(),
            entity_name: entity.name.clone(),
            outcome,
        });
    }

    if changed {
        graph.touch();
    }
    report
}

fn apply_match(entity: &mut GraphEntity, best: &MatchResult) {
    entity.existing = true;
    entity.rag_id = Some(format!("rag_{}", entity.id));

    if let Some(description) = best.entity.description.as_deref().filter(|d| !d.is_empty()) {
        entity.description = description.to_string();
    }

    for (key, value) in &best.entity.properties {
        entity.properties.insert(key.clone(), value.clone());
    }

    if !best.entity.relationships.is_empty() {
        entity
            .properties
            .insert("relationships".into(), json!(best.entity.relationships));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::CandidateEntity;
    use crate::resolve::MatchScorer;

    #[test]
    fn test_apply_match_merges_fields() {
        let mut entity = GraphEntity::character("char_001", "protagonist", "Lily")
            .with_description("a girl")
            .with_property("age", 7)
            .with_property("hair", "brown");
        let candidate = CandidateEntity::new("Lily", "character")
            .with_description("A curious and brave 8-year-old girl")
            .with_property("age", 8)
            .with_relationship("friend of Purple Dragon");
        let best = MatchScorer::default().validate("Lily", &candidate, Some("character"));

        apply_match(&mut entity, &best);

        assert!(entity.existing);
        assert_eq!(entity.rag_id.as_deref(), Some("rag_char_001"));
        assert_eq!(entity.description, "A curious and brave 8-year-old girl");
        assert_eq!(entity.properties["age"], 8);
        assert_eq!(entity.properties["hair"], "brown");
        assert_eq!(entity.properties["relationships"][0], "friend of Purple Dragon");
    }

    #[test]
    fn test_report_summary() {
        let report = EnrichmentReport {
            entities: vec![
                EntityEnrichment {
                    entity_id: "a".into(),
                    entity_name: "A".into(),
                    outcome: EnrichmentOutcome::Matched {
                        matched_name: "A".into(),
                        confidence: 1.0,
                        similarity: 1.0,
                    },
                },
                EntityEnrichment {
                    entity_id: "b".into(),
                    entity_name: "B".into(),
                    outcome: EnrichmentOutcome::NeedsConfirmation {
                        matched_name: "Bee".into(),
                        confidence: 0.6,
                        similarity: 0.6,
                    },
                },
                EntityEnrichment {
                    entity_id: "c".into(),
                    entity_name: "C".into(),
                    outcome: EnrichmentOutcome::NotFound,
                },
            ],
        };

        assert_eq!(report.summary(), "2 of 3 entities matched, 1 pending confirmation");
        assert_eq!(report.needs_confirmation(), vec!["b"]);
        assert_eq!(report.outcome_for("c"), Some(&EnrichmentOutcome::NotFound));
    }
}
