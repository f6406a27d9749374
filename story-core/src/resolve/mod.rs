//! Entity resolution against the knowledge service.
//!
//! A free-text name goes through a fixed variant sweep ([`variants`]), each
//! response is turned into candidates ([`extract`]), the merged candidates are
//! scored ([`scorer`]), and the ranked list is handed back to the caller to
//! accept, confirm, or reject.

mod candidate;
mod client;
mod enrich;
pub mod extract;
pub mod scorer;
pub mod variants;

pub use candidate::{CandidateEntity, SearchQuery, SearchResult, ERROR_TYPE};
pub use client::KnowledgeClient;
pub use enrich::{enrich_entities, EnrichmentOutcome, EnrichmentReport, EntityEnrichment};
pub use extract::{Extraction, ExtractionPass, ResponseBody};
pub use scorer::{MatchResult, MatchScorer};
