//! Query variants for fuzzy search, and merging their results.

use super::candidate::{CandidateEntity, SearchResult};
use std::collections::HashSet;

/// Number of variants generated for every name.
pub const VARIANT_COUNT: usize = 6;

/// The fixed variant set for a name, in search order: exact, lowercased,
/// title-cased, then wildcards on both sides, the end, and the start.
pub fn variants(name: &str) -> [String; VARIANT_COUNT] {
    [
        name.to_string(),
        name.to_lowercase(),
        title_case(name),
        format!("*{name}*"),
        format!("{name}*"),
        format!("*{name}"),
    ]
}

/// Merge per-variant results in order, keeping the first candidate seen for
/// each case-folded name. Error sentinels are dropped.
pub fn merge<I>(results: I) -> Vec<CandidateEntity>
where
    I: IntoIterator<Item = SearchResult>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for result in results {
        for candidate in result.entities {
            if candidate.is_error() {
                continue;
            }
            if seen.insert(candidate.dedup_key()) {
                merged.push(candidate);
            }
        }
    }
    merged
}

/// Uppercase the first letter of every word and lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if prev_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}
