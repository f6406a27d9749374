//! Candidate extraction from service responses.
//!
//! Responses are sometimes JSON, sometimes prose with JSON embedded in it, and
//! sometimes plain text. Extraction runs an ordered chain of passes and stops at
//! the first one that yields anything:
//!
//! 1. [`ExtractionPass::Structured`]: JSON objects carrying a `"name"` key.
//! 2. [`ExtractionPass::Heuristic`]: labelled lines such as `Character: Lily`.
//! 3. [`ExtractionPass::Synthetic`]: one generic candidate built from the query.
//!
//! Extraction never fails and always yields at least one candidate.

use super::candidate::CandidateEntity;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

/// Longest description kept for a synthesized candidate.
const MAX_SYNTHETIC_DESCRIPTION: usize = 200;

/// Type given to candidates whose type could not be inferred.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Line labels and the type each implies, in priority order.
const LABEL_RULES: [(&str, &str); 6] = [
    ("Character", "character"),
    ("Person", "character"),
    ("Location", "location"),
    ("Place", "location"),
    ("Item", "item"),
    ("Object", "item"),
];

/// Query keywords that hint at a type, checked in order.
const TYPE_HINTS: [(&str, &[&str]); 3] = [
    ("character", &["character", "characters", "person", "people", "who", "hero", "villain"]),
    ("location", &["location", "locations", "place", "places", "where", "forest", "castle", "village"]),
    ("item", &["item", "items", "object", "objects", "thing", "artifact"]),
];

lazy_static! {
    /// A `{...}` block with up to two levels of nested objects.
    static ref JSON_OBJECT: Regex =
        Regex::new(r"\{(?:[^{}]|\{(?:[^{}]|\{[^{}]*\})*\})*\}").expect("valid object pattern");

    static ref LABELLED_LINES: Vec<(Regex, &'static str)> = LABEL_RULES
        .iter()
        .map(|(label, entity_type)| {
            let pattern = format!(r"(?im)^[ \t*\-•]*{label}\**[ \t]*:[ \t]*(.+)$");
            (Regex::new(&pattern).expect("valid label pattern"), *entity_type)
        })
        .collect();
}

/// Which pass of the chain produced the candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPass {
    Structured,
    Heuristic,
    Synthetic,
}

/// Candidates together with the pass that found them.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub pass: ExtractionPass,
    pub candidates: Vec<CandidateEntity>,
}

/// The body of a `/query` response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// The usual `{"response": "..."}` envelope.
    Envelope(String),
    /// Any other JSON document.
    Structured(Value),
    /// A body that is not JSON.
    Raw(String),
}

impl ResponseBody {
    /// Classify a raw response body.
    pub fn parse(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => match map.get("response") {
                Some(Value::String(text)) => ResponseBody::Envelope(text.clone()),
                _ => ResponseBody::Structured(Value::Object(map)),
            },
            Ok(Value::String(text)) => ResponseBody::Raw(text),
            Ok(other) => ResponseBody::Structured(other),
            Err(_) => ResponseBody::Raw(body.to_string()),
        }
    }

    /// The body as text, for the text-based passes.
    pub fn text(&self) -> String {
        match self {
            ResponseBody::Envelope(text) | ResponseBody::Raw(text) => text.clone(),
            ResponseBody::Structured(value) => value.to_string(),
        }
    }
}

/// Extract candidates from a full response body.
pub fn extract_body(body: &str, query: &str) -> Extraction {
    let body = ResponseBody::parse(body);
    if let ResponseBody::Structured(value) = &body {
        let mut candidates = Vec::new();
        collect_candidates(value, &mut candidates);
        if !candidates.is_empty() {
            return Extraction {
                pass: ExtractionPass::Structured,
                candidates,
            };
        }
    }
    run(&body.text(), query)
}

/// Extract candidates from response text.
pub fn extract(text: &str, query: &str) -> Vec<CandidateEntity> {
    run(text, query).candidates
}

/// Run the extraction chain over response text.
pub fn run(text: &str, query: &str) -> Extraction {
    let candidates = structured_pass(text);
    if !candidates.is_empty() {
        return Extraction {
            pass: ExtractionPass::Structured,
            candidates,
        };
    }

    let candidates = heuristic_pass(text);
    if !candidates.is_empty() {
        return Extraction {
            pass: ExtractionPass::Heuristic,
            candidates,
        };
    }

    Extraction {
        pass: ExtractionPass::Synthetic,
        candidates: vec![synthesize(text, query)],
    }
}

/// Build the generic candidate used when nothing could be extracted.
pub fn synthesize(text: &str, query: &str) -> CandidateEntity {
    let mut candidate = CandidateEntity::new(query.trim(), infer_type(query));
    candidate.description = summarize(text);
    candidate.synthetic = true;
    candidate
}

/// Response text cut down to a description, or `None` when there is no text.
pub(crate) fn summarize(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(truncate(text, MAX_SYNTHETIC_DESCRIPTION))
    }
}

/// Guess an entity type from keywords in a query.
pub fn infer_type(query: &str) -> &'static str {
    let query = query.to_lowercase();
    let words: Vec<&str> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    TYPE_HINTS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| words.contains(k)))
        .map(|(entity_type, _)| *entity_type)
        .unwrap_or(UNKNOWN_TYPE)
}

fn structured_pass(text: &str) -> Vec<CandidateEntity> {
    let mut candidates = Vec::new();
    for found in JSON_OBJECT.find_iter(text) {
        if !found.as_str().contains("\"name\"") {
            continue;
        }
        // A malformed block is skipped; the rest of the text still counts.
        if let Ok(value) = serde_json::from_str::<Value>(found.as_str()) {
            collect_candidates(&value, &mut candidates);
        }
    }
    candidates
}

fn collect_candidates(value: &Value, out: &mut Vec<CandidateEntity>) {
    match value {
        Value::Object(map) => {
            if let Some(candidate) = candidate_from_object(map) {
                out.push(candidate);
                return;
            }
            for nested in map.values() {
                collect_candidates(nested, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_candidates(item, out);
            }
        }
        _ => {}
    }
}

fn candidate_from_object(map: &Map<String, Value>) -> Option<CandidateEntity> {
    let name = map.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }

    let entity_type = ["type", "entity_type"]
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_TYPE.to_string());

    let mut candidate = CandidateEntity::new(name, entity_type);

    candidate.description = map
        .get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from);

    if let Some(Value::Object(properties)) = map.get("properties") {
        candidate.properties = properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    }

    if let Some(Value::Array(relationships)) = map.get("relationships") {
        candidate.relationships = relationships
            .iter()
            .map(|r| match r {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
    }

    Some(candidate)
}

fn heuristic_pass(text: &str) -> Vec<CandidateEntity> {
    let mut candidates = Vec::new();
    for (pattern, entity_type) in LABELLED_LINES.iter() {
        for captures in pattern.captures_iter(text) {
            let name = captures[1]
                .trim()
                .trim_end_matches(['.', ',', ';'])
                .trim_matches(|c: char| c == '*' || c == '"' || c == '\'')
                .trim();
            if !name.is_empty() {
                candidates.push(CandidateEntity::new(name, *entity_type));
            }
        }
    }
    candidates
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let kept: String = text.chars().take(max_chars).collect();
        format!("{kept}...")
    } else {
        text.to_string()
    }
}
