//! Search inputs and outputs.

use knowledge::{FailureKind, HistoryTurn, QueryMode, QueryRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Type given to the sentinel candidate that reports a failed search.
pub const ERROR_TYPE: &str = "error";

/// An unvalidated entity record returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
    #[serde(default)]
    pub relationships: Vec<String>,
    /// Set by scoring.
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Set by scoring.
    #[serde(default)]
    pub similarity: Option<f64>,
    /// Built from the query because nothing could be extracted from the
    /// response. Such a record is not evidence that the entity exists.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
}

impl CandidateEntity {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            description: None,
            properties: HashMap::new(),
            relationships: Vec::new(),
            confidence: None,
            similarity: None,
            synthetic: false,
        }
    }

    /// The sentinel returned in place of results when a search fails.
    pub fn error_sentinel(kind: FailureKind, query: &str, message: impl Into<String>) -> Self {
        Self::new("Search Error", ERROR_TYPE)
            .with_description(message)
            .with_property("error_kind", kind.to_string())
            .with_property("query", query)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_relationship(mut self, relationship: impl Into<String>) -> Self {
        self.relationships.push(relationship.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.entity_type == ERROR_TYPE
    }

    /// Key used to collapse duplicates across searches.
    pub fn dedup_key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Parameters for a single search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub entity_type: Option<String>,
    pub mode: QueryMode,
    pub top_k: usize,
    pub chunk_top_k: usize,
    pub token_budget: usize,
    pub rerank: bool,
    pub history: Option<Vec<HistoryTurn>>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        let defaults = QueryRequest::new("");
        Self {
            text: text.into(),
            entity_type: None,
            mode: defaults.mode,
            top_k: defaults.top_k,
            chunk_top_k: defaults.chunk_top_k,
            token_budget: defaults.max_total_tokens,
            rerank: defaults.enable_rerank,
            history: None,
        }
    }

    pub fn with_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Set the type filter from an optional value.
    pub fn with_type_opt(mut self, entity_type: Option<&str>) -> Self {
        self.entity_type = entity_type.map(String::from);
        self
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_chunk_top_k(mut self, chunk_top_k: usize) -> Self {
        self.chunk_top_k = chunk_top_k;
        self
    }

    pub fn with_token_budget(mut self, token_budget: usize) -> Self {
        self.token_budget = token_budget;
        self
    }

    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }

    pub fn with_history(mut self, history: Vec<HistoryTurn>) -> Self {
        self.history = Some(history);
        self
    }

    /// Build the wire request. A type filter is folded into the query text.
    pub fn to_request(&self) -> QueryRequest {
        let text = match &self.entity_type {
            Some(t) => format!("Find {t}s: {}", self.text),
            None => self.text.clone(),
        };
        let mut request = QueryRequest::new(text)
            .with_mode(self.mode)
            .with_top_k(self.top_k)
            .with_chunk_top_k(self.chunk_top_k)
            .with_max_total_tokens(self.token_budget)
            .with_rerank(self.rerank);
        if let Some(history) = &self.history {
            request = request.with_history(history.clone());
        }
        request
    }
}

/// Candidates returned by one search.
///
/// `total_count` equals `entities.len()` for results built locally, but may be
/// larger when the service produced more candidates than were kept.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub entities: Vec<CandidateEntity>,
    pub total_count: usize,
    pub query: String,
    pub mode: QueryMode,
    pub raw_response: Option<String>,
}

impl SearchResult {
    /// A result whose count is exactly the candidates it holds.
    pub fn local(entities: Vec<CandidateEntity>, query: impl Into<String>, mode: QueryMode) -> Self {
        Self {
            total_count: entities.len(),
            entities,
            query: query.into(),
            mode,
            raw_response: None,
        }
    }

    /// Whether this result reports a failed search rather than candidates.
    pub fn is_error(&self) -> bool {
        self.entities.len() == 1 && self.entities[0].is_error()
    }

    /// Candidates, excluding any error sentinel.
    pub fn candidates(&self) -> impl Iterator<Item = &CandidateEntity> {
        self.entities.iter().filter(|e| !e.is_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_filter_rewrites_query() {
        let request = SearchQuery::new("Lily").with_type("character").to_request();
        assert_eq!(request.query, "Find characters: Lily");

        let request = SearchQuery::new("Lily").to_request();
        assert_eq!(request.query, "Lily");
    }

    #[test]
    fn test_search_parameters_flow_into_request() {
        let request = SearchQuery::new("forest")
            .with_mode(QueryMode::Local)
            .with_top_k(5)
            .with_chunk_top_k(3)
            .with_token_budget(1200)
            .with_rerank(false)
            .to_request();

        assert_eq!(request.mode, QueryMode::Local);
        assert_eq!(request.top_k, 5);
        assert_eq!(request.chunk_top_k, 3);
        assert_eq!(request.max_total_tokens, 1200);
        assert!(!request.enable_rerank);
    }

    #[test]
    fn test_error_sentinel() {
        let sentinel = CandidateEntity::error_sentinel(FailureKind::Timeout, "Lily", "timed out");
        assert!(sentinel.is_error());
        assert_eq!(sentinel.properties["error_kind"], "timeout");
        assert_eq!(sentinel.properties["query"], "Lily");

        let result = SearchResult::local(vec![sentinel], "Lily", QueryMode::Mix);
        assert!(result.is_error());
        assert_eq!(result.total_count, 1);
        assert_eq!(result.candidates().count(), 0);
    }
}
