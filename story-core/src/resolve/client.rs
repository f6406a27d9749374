//! Resolution-facing client for the knowledge service.
//!
//! [`KnowledgeClient`] wraps the raw transport with the policy this crate needs:
//! searches never fail (a failed search comes back as an error sentinel),
//! detail, type-list and health lookups fall back to offline data, and mock
//! mode short-circuits every call before any I/O happens.

use super::candidate::{CandidateEntity, SearchQuery, SearchResult};
use super::extract::{self, ExtractionPass, ResponseBody, UNKNOWN_TYPE};
use super::scorer::{MatchResult, MatchScorer};
use super::variants;
use crate::offline;
use futures::future::join_all;
use knowledge::{HealthStatus, KnowledgeApi, KnowledgeConfig, QueryMode, QueryRequest};
use tracing::{debug, warn};

/// Results requested per variant during a fuzzy search.
const FUZZY_TOP_K: usize = 5;

/// Results requested by a detail lookup.
const DETAIL_TOP_K: usize = 5;

/// Knowledge service client with fallback and scoring policy.
#[derive(Clone)]
pub struct KnowledgeClient {
    api: KnowledgeApi,
    scorer: MatchScorer,
}

impl KnowledgeClient {
    /// Build a client with the default scorer.
    ///
    /// Fails only on an unusable configuration.
    pub fn new(config: KnowledgeConfig) -> Result<Self, knowledge::Error> {
        Ok(Self {
            api: KnowledgeApi::new(config)?,
            scorer: MatchScorer::default(),
        })
    }

    /// Build a client from `KNOWLEDGE_*` environment variables.
    pub fn from_env() -> Result<Self, knowledge::Error> {
        Self::new(KnowledgeConfig::from_env()?)
    }

    /// Replace the scorer used by fuzzy search.
    pub fn with_scorer(mut self, scorer: MatchScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn config(&self) -> &KnowledgeConfig {
        self.api.config()
    }

    pub fn scorer(&self) -> &MatchScorer {
        &self.scorer
    }

    /// Whether calls are served from offline data.
    pub fn is_mock(&self) -> bool {
        self.api.config().mock_mode
    }

    /// Run one search.
    ///
    /// Transport failures are reported as a single error sentinel candidate
    /// with `total_count == 1`.
    pub async fn search(&self, query: &SearchQuery) -> SearchResult {
        if self.is_mock() {
            let mut entities = offline::search(&query.text);
            entities.truncate(query.top_k);
            return SearchResult::local(entities, &query.text, query.mode);
        }

        match self.api.query(&query.to_request()).await {
            Ok(body) => {
                let extraction = extract::extract_body(&body, &query.text);
                debug!(
                    query = %query.text,
                    pass = ?extraction.pass,
                    found = extraction.candidates.len(),
                    "Extracted candidates"
                );

                let total_count = extraction.candidates.len();
                let mut entities = extraction.candidates;
                entities.truncate(query.top_k);
                SearchResult {
                    entities,
                    total_count,
                    query: query.text.clone(),
                    mode: query.mode,
                    raw_response: Some(body),
                }
            }
            Err(e) => {
                let kind = e.kind();
                warn!(query = %query.text, kind = %kind, error = %e, "Knowledge search failed");
                let sentinel = CandidateEntity::error_sentinel(kind, &query.text, e.user_message())
                    .with_property("detail", e.to_string());
                SearchResult::local(vec![sentinel], &query.text, query.mode)
            }
        }
    }

    /// Look up one entity by name, falling back to offline data when the
    /// service cannot be reached.
    pub async fn get_entity_details(&self, name: &str) -> Option<CandidateEntity> {
        if self.is_mock() {
            return offline::details(name);
        }

        match self.lookup_entity(name).await {
            Ok(found) => found,
            Err(e) => {
                warn!(entity = name, kind = %e.kind(), error = %e, "Entity lookup failed, using offline data");
                offline::details(name)
            }
        }
    }

    /// Look up one entity by name without any fallback.
    ///
    /// `Ok(None)` means the service reported the entity absent.
    pub async fn lookup_entity(&self, name: &str) -> Result<Option<CandidateEntity>, knowledge::Error> {
        if self.is_mock() {
            return Ok(offline::details(name));
        }

        if !self.api.entity_exists(name).await? {
            return Ok(None);
        }

        let request = QueryRequest::new(format!("Tell me about {name}"))
            .with_mode(QueryMode::Local)
            .with_top_k(DETAIL_TOP_K);
        let body = self.api.query(&request).await?;
        Ok(Some(parse_details(&body, name)))
    }

    /// Entity type labels known to the service.
    pub async fn get_available_entity_types(&self) -> Vec<String> {
        if self.is_mock() {
            return offline::entity_types();
        }

        match self.api.label_list().await {
            Ok(labels) => labels,
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "Label list unavailable, using fallback types");
                offline::entity_types()
            }
        }
    }

    /// Service status, or `None` when it cannot be determined.
    pub async fn check_health(&self) -> Option<HealthStatus> {
        if self.is_mock() {
            return Some(offline::health());
        }

        match self.api.health().await {
            Ok(status) => Some(status),
            Err(e) => {
                debug!(kind = %e.kind(), error = %e, "Health check failed");
                None
            }
        }
    }

    /// Search every variant of `name` and merge the results.
    ///
    /// With `require_validation`, candidates are scored against `name` and
    /// `entity_type` and returned best first, carrying their scores. Otherwise
    /// they come back in discovery order, unscored.
    pub async fn fuzzy_search(
        &self,
        name: &str,
        entity_type: Option<&str>,
        require_validation: bool,
    ) -> Vec<CandidateEntity> {
        let merged = self.sweep(name, entity_type).await;
        if !require_validation {
            return merged;
        }
        self.scorer
            .rank(name, &merged, entity_type)
            .into_iter()
            .map(|m| m.entity)
            .collect()
    }

    /// Fuzzy search returning the full scored matches, best first.
    pub async fn resolve(&self, name: &str, entity_type: Option<&str>) -> Vec<MatchResult> {
        let merged = self.sweep(name, entity_type).await;
        self.scorer.rank(name, &merged, entity_type)
    }

    async fn sweep(&self, name: &str, entity_type: Option<&str>) -> Vec<CandidateEntity> {
        let searches = variants::variants(name).into_iter().map(|variant| {
            let query = SearchQuery::new(variant)
                .with_type_opt(entity_type)
                .with_mode(QueryMode::Local)
                .with_top_k(FUZZY_TOP_K);
            async move { self.search(&query).await }
        });

        // Results come back in variant order, which keeps the merge deterministic.
        let results = join_all(searches).await;

        let failed = results.iter().filter(|r| r.is_error()).count();
        if failed > 0 {
            debug!(entity = name, failed, "Some search variants failed");
        }

        let merged = variants::merge(results);
        debug!(entity = name, candidates = merged.len(), "Fuzzy search merged");
        merged
    }
}

/// Pick the record for `name` out of a detail response.
///
/// When no extracted candidate carries that name, a generic record is built
/// from the response text.
fn parse_details(body: &str, name: &str) -> CandidateEntity {
    let extraction = extract::extract_body(body, name);
    let wanted = name.trim().to_lowercase();

    if extraction.pass != ExtractionPass::Synthetic {
        if let Some(found) = extraction
            .candidates
            .into_iter()
            .find(|c| c.dedup_key() == wanted)
        {
            return found;
        }
    }

    let mut record = CandidateEntity::new(name, UNKNOWN_TYPE);
    record.description = extract::summarize(&ResponseBody::parse(body).text());
    record.synthetic = true;
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_client() -> KnowledgeClient {
        KnowledgeClient::new(KnowledgeConfig::mock()).unwrap()
    }

    #[tokio::test]
    async fn test_mock_search() {
        let client = mock_client();
        let result = client.search(&SearchQuery::new("purple dragon")).await;

        assert_eq!(result.total_count, result.entities.len());
        assert_eq!(result.entities[0].name, "Purple Dragon");
        assert_eq!(result.mode, QueryMode::Mix);
        assert!(result.raw_response.is_none());
    }

    #[tokio::test]
    async fn test_mock_search_respects_top_k() {
        let client = mock_client();
        let result = client
            .search(&SearchQuery::new("dragon forest lily").with_top_k(2))
            .await;
        assert_eq!(result.entities.len(), 2);
        assert_eq!(result.total_count, 2);
    }

    #[tokio::test]
    async fn test_mock_lookups() {
        let client = mock_client();
        assert_eq!(client.get_entity_details("lily").await.unwrap().name, "Lily");
        assert!(client.get_entity_details("nobody").await.is_none());
        assert!(client.get_available_entity_types().await.contains(&"item".to_string()));
        assert!(client.check_health().await.unwrap().is_healthy());
    }

    #[tokio::test]
    async fn test_mock_lookup_entity_stays_offline() {
        let client = mock_client();
        let lily = client.lookup_entity("Lily").await.unwrap();
        assert_eq!(lily.map(|c| c.name), Some("Lily".to_string()));
        assert_eq!(client.lookup_entity("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mock_fuzzy_search_dedups_and_scores() {
        let client = mock_client();
        let found = client.fuzzy_search("Lily", Some("character"), true).await;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Lily");
        assert_eq!(found[0].similarity, Some(1.0));
        assert_eq!(found[0].confidence, Some(1.0));
    }

    #[tokio::test]
    async fn test_fuzzy_search_without_validation_is_unscored() {
        let client = mock_client();
        let found = client.fuzzy_search("dragon", None, false).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].confidence, None);
    }

    #[test]
    fn test_parse_details_picks_named_record() {
        let body = r#"{"response": "{\"name\": \"Lily\", \"type\": \"character\"} {\"name\": \"Old Key\", \"type\": \"item\"}"}"#;
        let record = parse_details(body, "old key");
        assert_eq!(record.name, "Old Key");
        assert_eq!(record.entity_type, "item");
    }

    #[test]
    fn test_parse_details_synthesizes_unknown_record() {
        let text = "x".repeat(250);
        let body = serde_json::json!({ "response": text }).to_string();
        let record = parse_details(&body, "Lily");

        assert_eq!(record.name, "Lily");
        assert_eq!(record.entity_type, UNKNOWN_TYPE);
        assert!(record.synthetic);
        let description = record.description.unwrap();
        assert_eq!(description.chars().count(), 203);
        assert!(description.ends_with("..."));
    }
}
