// crates/ums-core/src/core/text.rs
// ============================================================================
// Module: UMS Text Utilities
// Description: Sorted-unique string sets and keyword tokenization.
// Purpose: Normalize list attributes and index tokens deterministically.
// Dependencies: none
// ============================================================================

//! ## Overview
//! List attributes that participate in identifiers or payloads are trimmed,
//! filtered for non-empty strings, deduplicated, and ASCII-sorted before
//! use, so insertion order never leaks into fingerprints. Tokenization
//! backs the keyword index and must stay byte-for-byte stable.

// ============================================================================
// SECTION: Sorted Unique Sets
// ============================================================================

/// Normalizes a list attribute into a sorted, deduplicated set of
/// non-empty trimmed strings.
#[must_use]
pub fn sorted_unique(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = values
        .iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Merges two normalized sets into their sorted union.
#[must_use]
pub fn union_sorted(left: &[String], right: &[String]) -> Vec<String> {
    let mut out: Vec<String> = left.iter().chain(right.iter()).cloned().collect();
    out.sort();
    out.dedup();
    out
}

// ============================================================================
// SECTION: Tokenization
// ============================================================================

/// Tokenizes text for the keyword index: lowercase, split on
/// non-alphanumeric/underscore boundaries, drop tokens of length <= 1,
/// dedupe, sort.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut tokens: Vec<String> = lowered
        .split(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
        .filter(|token| token.chars().count() > 1)
        .map(ToString::to_string)
        .collect();
    tokens.sort();
    tokens.dedup();
    tokens
}

/// Counts the intersection size of two sorted token sets.
#[must_use]
pub fn sorted_intersection_len(left: &[String], right: &[String]) -> usize {
    let mut li = 0;
    let mut ri = 0;
    let mut shared = 0;
    while li < left.len() && ri < right.len() {
        match (left.get(li), right.get(ri)) {
            (Some(lv), Some(rv)) => {
                if lv < rv {
                    li += 1;
                } else if lv > rv {
                    ri += 1;
                } else {
                    shared += 1;
                    li += 1;
                    ri += 1;
                }
            }
            _ => break,
        }
    }
    shared
}
