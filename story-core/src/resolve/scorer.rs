//! Match scoring.
//!
//! Scores how likely a candidate is to be the entity a query meant. Scoring is
//! deterministic and does no I/O.
//!
//! Exactness is purely lexical: two different entities with near-identical
//! names can both score as exact matches. There is no identity key to tell
//! them apart.

use super::candidate::CandidateEntity;
use crate::config::Thresholds;
use std::cmp::Ordering;

/// Similarity floor when one name contains the other.
const SUBSTRING_SIMILARITY: f64 = 0.7;
const TYPE_MATCH_BONUS: f64 = 0.10;
const TYPE_MISMATCH_PENALTY: f64 = 0.20;
const DESCRIPTION_BONUS: f64 = 0.05;
/// Descriptions must be longer than this to earn the bonus.
const DESCRIPTION_MIN_CHARS: usize = 20;
const PROPERTIES_BONUS: f64 = 0.05;

/// A scored candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub entity: CandidateEntity,
    /// Overall likelihood of a correct match, in [0, 1].
    pub confidence: f64,
    /// Lexical closeness of the names, in [0, 1].
    pub similarity: f64,
    pub is_exact_match: bool,
    pub is_high_confidence: bool,
    /// Human-readable explanation.
    pub rationale: String,
}

impl MatchResult {
    fn rank_key(&self) -> (f64, f64) {
        (self.confidence, self.similarity)
    }

    /// Order by confidence, then similarity.
    pub fn cmp_rank(&self, other: &MatchResult) -> Ordering {
        let (a, b) = (self.rank_key(), other.rank_key());
        a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1))
    }
}

/// Scores candidates against a query.
#[derive(Debug, Clone, Default)]
pub struct MatchScorer {
    thresholds: Thresholds,
}

impl MatchScorer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Score one candidate against the query.
    pub fn validate(
        &self,
        query: &str,
        candidate: &CandidateEntity,
        expected_type: Option<&str>,
    ) -> MatchResult {
        let similarity = similarity(query, &candidate.name);
        let confidence = confidence(candidate, similarity, expected_type);
        let is_exact_match = similarity >= self.thresholds.exact_match();
        let is_high_confidence = confidence >= self.thresholds.high_confidence();
        let rationale = self.rationale(query, candidate, similarity, confidence, is_exact_match);

        MatchResult {
            entity: candidate.clone(),
            confidence,
            similarity,
            is_exact_match,
            is_high_confidence,
            rationale,
        }
    }

    /// Score every candidate and sort best first.
    ///
    /// The scores are also written back onto each returned candidate.
    pub fn rank(
        &self,
        query: &str,
        candidates: &[CandidateEntity],
        expected_type: Option<&str>,
    ) -> Vec<MatchResult> {
        let mut matches: Vec<MatchResult> = candidates
            .iter()
            .map(|c| {
                let mut m = self.validate(query, c, expected_type);
                m.entity.confidence = Some(m.confidence);
                m.entity.similarity = Some(m.similarity);
                m
            })
            .collect();
        // Stable sort keeps discovery order among ties.
        matches.sort_by(|a, b| b.cmp_rank(a));
        matches
    }

    /// Keep only high-confidence matches.
    pub fn filter_high_confidence<'a>(&self, matches: &'a [MatchResult]) -> Vec<&'a MatchResult> {
        matches.iter().filter(|m| m.is_high_confidence).collect()
    }

    /// The match with the highest (confidence, similarity), first one on ties.
    pub fn best_match<'a>(&self, matches: &'a [MatchResult]) -> Option<&'a MatchResult> {
        matches.iter().reduce(|best, m| {
            if m.cmp_rank(best) == Ordering::Greater {
                m
            } else {
                best
            }
        })
    }

    /// Whether a person should confirm this match before it is used.
    pub fn should_require_confirmation(&self, m: &MatchResult) -> bool {
        !m.is_exact_match && m.confidence < self.thresholds.high_confidence()
    }

    fn rationale(
        &self,
        query: &str,
        candidate: &CandidateEntity,
        similarity: f64,
        confidence: f64,
        is_exact_match: bool,
    ) -> String {
        if is_exact_match {
            return format!("Exact match for '{query}'");
        }

        let label = if confidence >= self.thresholds.high_confidence() {
            "High"
        } else if confidence >= self.thresholds.low_confidence() {
            "Moderate"
        } else {
            "Low"
        };
        format!(
            "{label} confidence match: '{}' (similarity: {similarity:.2})",
            candidate.name
        )
    }
}

/// Lexical similarity of two names, in [0, 1].
///
/// Case and surrounding whitespace are ignored. Equal names score 1.0, and a
/// name contained in the other scores at least 0.7.
pub fn similarity(query: &str, name: &str) -> f64 {
    let query = query.trim().to_lowercase();
    let name = name.trim().to_lowercase();

    if query == name {
        return 1.0;
    }

    let mut score = strsim::normalized_levenshtein(&query, &name);
    if !query.is_empty() && !name.is_empty() && (name.contains(&query) || query.contains(&name)) {
        score = score.max(SUBSTRING_SIMILARITY);
    }
    score.clamp(0.0, 1.0)
}

fn confidence(candidate: &CandidateEntity, similarity: f64, expected_type: Option<&str>) -> f64 {
    let mut confidence = similarity;

    if let Some(expected) = expected_type {
        if candidate.entity_type.eq_ignore_ascii_case(expected) {
            confidence += TYPE_MATCH_BONUS;
        } else {
            confidence -= TYPE_MISMATCH_PENALTY;
        }
    }

    if candidate
        .description
        .as_deref()
        .is_some_and(|d| d.chars().count() > DESCRIPTION_MIN_CHARS)
    {
        confidence += DESCRIPTION_BONUS;
    }

    if !candidate.properties.is_empty() {
        confidence += PROPERTIES_BONUS;
    }

    confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wendy(entity_type: &str) -> CandidateEntity {
        CandidateEntity::new("Wendy Whisk", entity_type)
            .with_description("A cheerful baker who runs the village shop")
            .with_property("occupation", "baker")
    }

    #[test]
    fn test_exact_match() {
        let scorer = MatchScorer::default();
        let result = scorer.validate("Wendy Whisk", &wendy("character"), Some("character"));

        assert!(result.is_exact_match);
        assert!(result.confidence >= 0.95);
        assert_eq!(result.similarity, 1.0);
        assert!(result.rationale.contains("Exact match"));
        assert!(!scorer.should_require_confirmation(&result));
    }

    #[test]
    fn test_partial_match_with_context_is_high_confidence() {
        let scorer = MatchScorer::default();
        let result = scorer.validate("Wendy", &wendy("character"), Some("character"));

        assert!(result.similarity >= 0.7);
        assert!(result.confidence >= 0.8);
        assert!(result.is_high_confidence);
        assert!(!result.is_exact_match);
        assert!(result.rationale.starts_with("High confidence match: 'Wendy Whisk'"));
    }

    #[test]
    fn test_unrelated_name_is_not_confident() {
        let scorer = MatchScorer::default();
        let result = scorer.validate("whiskers", &wendy("character"), Some("character"));

        assert!(!result.is_exact_match);
        assert!(result.confidence < 0.8);
        assert!(scorer.should_require_confirmation(&result));
    }

    #[test]
    fn test_type_mismatch_penalty() {
        let scorer = MatchScorer::default();
        let result = scorer.validate("Wendy Whisk", &wendy("location"), Some("character"));

        assert!(result.confidence < result.similarity);
        // Still lexically exact.
        assert!(result.is_exact_match);
    }

    #[test]
    fn test_similarity_ignores_case_and_whitespace() {
        assert_eq!(similarity("  LILY ", "lily"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert!(similarity("dragon", "Purple Dragon") >= 0.7);
        assert!(similarity("", "Purple Dragon") < 0.7);
    }

    #[test]
    fn test_rationale_bands() {
        let scorer = MatchScorer::default();
        let bare = CandidateEntity::new("Bartholomew", "character");

        let low = scorer.validate("Zed", &bare, None);
        assert!(low.rationale.starts_with("Low confidence match: 'Bartholomew'"));
        assert!(low.rationale.contains("similarity: "));

        let moderate = scorer.validate("Bartholomeo", &CandidateEntity::new("Bartholomew", "character"), Some("location"));
        assert!(moderate.confidence >= 0.5 && moderate.confidence < 0.8);
        assert!(moderate.rationale.starts_with("Moderate confidence match"));
    }

    #[test]
    fn test_best_match_prefers_confidence_then_similarity() {
        let scorer = MatchScorer::default();
        let matches = vec![
            scorer.validate("Lily", &CandidateEntity::new("Lilly", "character"), None),
            scorer.validate("Lily", &CandidateEntity::new("Lily", "character"), None),
            scorer.validate("Lily", &CandidateEntity::new("Lila", "character"), None),
        ];

        let best = scorer.best_match(&matches).unwrap();
        assert_eq!(best.entity.name, "Lily");
        assert!(scorer.best_match(&[]).is_none());
    }

    #[test]
    fn test_best_match_keeps_first_on_tie() {
        let scorer = MatchScorer::default();
        let a = scorer.validate("Lily", &CandidateEntity::new("lily", "character"), None);
        let mut b = a.clone();
        b.entity.name = "LILY".into();

        let matches = [a, b];
        assert_eq!(scorer.best_match(&matches).unwrap().entity.name, "lily");
    }

    #[test]
    fn test_filter_high_confidence() {
        let scorer = MatchScorer::default();
        let matches = vec![
            scorer.validate("Wendy", &wendy("character"), Some("character")),
            scorer.validate("whiskers", &wendy("character"), Some("character")),
        ];

        let high = scorer.filter_high_confidence(&matches);
        assert_eq!(high.len(), 1);
        assert!(high[0].is_high_confidence);
    }

    #[test]
    fn test_rank_sorts_and_annotates() {
        let scorer = MatchScorer::default();
        let candidates = vec![
            CandidateEntity::new("Magic Forest", "location"),
            CandidateEntity::new("Lily", "character"),
        ];

        let ranked = scorer.rank("Lily", &candidates, Some("character"));
        assert_eq!(ranked[0].entity.name, "Lily");
        assert_eq!(ranked[0].entity.confidence, Some(ranked[0].confidence));
        assert_eq!(ranked[1].entity.similarity, Some(ranked[1].similarity));
    }

    #[test]
    fn test_custom_thresholds() {
        let scorer = MatchScorer::new(Thresholds::new(0.6, 0.5, 0.2).unwrap());
        let result = scorer.validate("Wendy", &CandidateEntity::new("Wendy Whisk", "character"), None);
        assert!(result.is_exact_match);
        assert!(result.is_high_confidence);
    }
}
