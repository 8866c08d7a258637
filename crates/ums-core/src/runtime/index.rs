// crates/ums-core/src/runtime/index.rs
// ============================================================================
// Module: UMS Keyword Index
// Description: Deterministic keyword ranking over bucket entities.
// Purpose: Rank episodes, rules, and anti-patterns against recall queries.
// Dependencies: crate::core, crate::runtime::state
// ============================================================================

//! ## Overview
//! Index documents are derived from entity content and are always
//! regenerable, so the index never appears in snapshots. Scoring is
//! `|queryTokens ∩ docTokens| + substring bonus + seeded tie-breaker`;
//! ordering is `(score desc, createdAt desc, id asc)`. Search is always
//! scoped to one store's bucket.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;

use crate::core::hashing::hash_to_unit;
use crate::core::rules::RuleStatus;
use crate::core::text::sorted_intersection_len;
use crate::core::text::tokenize;
use crate::core::time::Timestamp;
use crate::runtime::state::ProfileState;

// ============================================================================
// SECTION: Index Documents
// ============================================================================

/// Entity family an index document was derived from.
///
/// # Invariants
/// - Variants are stable for recall pack labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    /// Derived from an episode.
    Episode,
    /// Derived from an active procedural rule.
    Rule,
    /// Derived from an anti-pattern.
    AntiPattern,
}

impl DocKind {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Episode => "episode",
            Self::Rule => "rule",
            Self::AntiPattern => "antiPattern",
        }
    }
}

/// Searchable document derived from one entity.
///
/// # Invariants
/// - `tokens` is the sorted, deduplicated tokenization of `text`.
#[derive(Debug, Clone)]
pub struct IndexDocument {
    /// Source entity family.
    pub kind: DocKind,
    /// Source entity identifier.
    pub id: String,
    /// Indexed text.
    pub text: String,
    /// Sorted token set.
    pub tokens: Vec<String>,
    /// Source entity creation time.
    pub created_at: Timestamp,
    /// Unsafe-instruction flag inherited from the source entity.
    pub unsafe_instruction: bool,
}

/// Derives the index documents for one bucket.
///
/// Tombstoned rules are excluded: they never participate in default
/// recall.
#[must_use]
pub fn documents_for_bucket(bucket: &ProfileState) -> Vec<IndexDocument> {
    let mut docs = Vec::new();
    for episode in bucket.episodes.values() {
        docs.push(IndexDocument {
            kind: DocKind::Episode,
            id: episode.id.as_str().to_string(),
            text: episode.content.clone(),
            tokens: tokenize(&episode.content),
            created_at: episode.created_at,
            unsafe_instruction: episode.unsafe_instruction,
        });
    }
    for rule in bucket.rules.values() {
        if rule.status == RuleStatus::Tombstoned {
            continue;
        }
        docs.push(IndexDocument {
            kind: DocKind::Rule,
            id: rule.id.as_str().to_string(),
            text: rule.statement.clone(),
            tokens: tokenize(&rule.statement),
            created_at: rule.created_at,
            unsafe_instruction: false,
        });
    }
    for anti in bucket.anti_patterns.values() {
        docs.push(IndexDocument {
            kind: DocKind::AntiPattern,
            id: anti.id.as_str().to_string(),
            text: anti.statement.clone(),
            tokens: tokenize(&anti.statement),
            created_at: anti.created_at,
            unsafe_instruction: false,
        });
    }
    docs
}

// ============================================================================
// SECTION: Ranking
// ============================================================================

/// One ranked search hit.
#[derive(Debug, Clone)]
pub struct RankedDocument {
    /// The matched document.
    pub document: IndexDocument,
    /// Base score: token intersection plus substring bonus.
    pub base_score: u64,
    /// Total score including the seeded tie-breaker.
    pub score: f64,
}

/// Ranks documents against a query.
///
/// A document qualifies only when it covers every query token or
/// contains the full query substring; partial token overlap never
/// qualifies. An empty query is the fallback listing: every document
/// qualifies with score 1.
#[must_use]
pub fn search(documents: Vec<IndexDocument>, query: &str, seed: &str) -> Vec<RankedDocument> {
    let trimmed = query.trim();
    let query_tokens = tokenize(trimmed);
    let query_lower = trimmed.to_lowercase();

    let mut ranked = Vec::with_capacity(documents.len());
    for document in documents {
        let base_score = if trimmed.is_empty() {
            1
        } else {
            let shared = sorted_intersection_len(&query_tokens, &document.tokens);
            let substring = u64::from(document.text.to_lowercase().contains(&query_lower));
            let covers_all = !query_tokens.is_empty() && shared == query_tokens.len();
            if substring == 0 && !covers_all {
                continue;
            }
            u64::try_from(shared).unwrap_or(u64::MAX) + substring
        };
        if base_score == 0 {
            continue;
        }
        let created = document.created_at.to_rfc3339();
        let tie = hash_to_unit(&[seed, trimmed, document.id.as_str(), created.as_str()]) * 0.01;
        let score = (base_score as f64) + tie;
        ranked.push(RankedDocument {
            document,
            base_score,
            score,
        });
    }

    ranked.sort_by(|left, right| {
        right
            .score
            .partial_cmp(&left.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| right.document.created_at.cmp(&left.document.created_at))
            .then_with(|| left.document.id.cmp(&right.document.id))
    });
    ranked
}
