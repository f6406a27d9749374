//! Entity resolution and story context validation against a knowledge graph.
//!
//! This crate provides:
//! - Fuzzy, multi-variant entity search with scored, ranked matches
//! - Candidate extraction from structured or free-text service responses
//! - Enrichment of story entities that already exist in the knowledge service
//! - Structural and referential validation of story context graphs
//!
//! A knowledge service outage degrades result quality but never fails a call:
//! searches come back with an error sentinel and lookups fall back to offline
//! data.
//!
//! # Quick Start
//!
//! ```ignore
//! use story_core::{ConsistencyChecker, KnowledgeClient};
//! use knowledge::KnowledgeConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = KnowledgeClient::new(KnowledgeConfig::from_env()?)?;
//!
//!     for candidate in client.fuzzy_search("Wendy", Some("character"), true).await {
//!         println!("{} ({:?})", candidate.name, candidate.confidence);
//!     }
//!
//!     let graph = story_core::testing::GraphBuilder::sample_story().build();
//!     let report = ConsistencyChecker::new().validate(&graph);
//!     assert!(report.is_valid);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod consistency;
pub mod graph;
pub mod logging;
pub mod offline;
pub mod resolve;
pub mod testing;

// Primary public API
pub use config::{ConfigError, Thresholds};
pub use consistency::{CheckOptions, ConsistencyChecker, Fix, FixTarget, ValidationReport};
pub use graph::{EntityGraph, EntityRefs, EntityType, GraphEntity, Relationship};
pub use resolve::{
    enrich_entities, CandidateEntity, EnrichmentOutcome, EnrichmentReport, KnowledgeClient,
    MatchResult, MatchScorer, SearchQuery, SearchResult,
};
