// crates/ums-core/src/core/working.rs
// ============================================================================
// Module: UMS Working Entries
// Description: Regenerable diary and digest summaries of episodes.
// Purpose: Construct bounded working-memory entries with evidence pointers.
// Dependencies: crate::core::{errors, identifiers, text, time}, serde
// ============================================================================

//! ## Overview
//! Working entries are regenerable summaries: a diary condenses recent
//! episode content, a digest records counts and distinct types. Both are
//! derived entirely from episodes and can be rebuilt at any time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::errors::EngineError;
use crate::core::identifiers::StoreId;
use crate::core::identifiers::WorkingEntryId;
use crate::core::text::sorted_unique;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Working Kinds
// ============================================================================

/// Working entry kinds.
///
/// # Invariants
/// - Variants are stable for serialization and snapshot compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkingKind {
    /// Bounded textual summary of recent episodes.
    Diary,
    /// Episode count plus sorted distinct types.
    Digest,
}

impl WorkingKind {
    /// Returns the stable wire label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Diary => "diary",
            Self::Digest => "digest",
        }
    }
}

// ============================================================================
// SECTION: Working Entry
// ============================================================================

/// Regenerable summary of episodes.
///
/// # Invariants
/// - `evidence_episode_ids` is sorted and deduplicated.
/// - `content` stays within the working-summary byte bound enforced by
///   the builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingEntry {
    /// Content-addressed working entry identifier.
    pub id: WorkingEntryId,
    /// Owning store.
    pub store_id: StoreId,
    /// Diary or digest.
    pub kind: WorkingKind,
    /// Summary content.
    pub content: String,
    /// Sorted episode identifiers backing the summary.
    pub evidence_episode_ids: Vec<String>,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Fingerprint fields hashed into the working entry identifier.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkingFingerprint<'a> {
    /// Owning store.
    store_id: &'a str,
    /// Diary or digest.
    kind: &'a str,
    /// Summary content.
    content: &'a str,
    /// Sorted evidence identifiers.
    evidence_episode_ids: &'a [String],
}

impl WorkingEntry {
    /// Builds a working entry, normalizing evidence pointers.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when the content is empty.
    pub fn build(
        store_id: &StoreId,
        kind: WorkingKind,
        content: impl Into<String>,
        evidence_episode_ids: &[String],
        now: Timestamp,
    ) -> Result<Self, EngineError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(EngineError::validation("working entry content must not be empty"));
        }
        let evidence = sorted_unique(evidence_episode_ids);
        let fingerprint = WorkingFingerprint {
            store_id: store_id.as_str(),
            kind: kind.as_str(),
            content: &content,
            evidence_episode_ids: &evidence,
        };
        let id = WorkingEntryId::mint(&fingerprint)?;
        Ok(Self {
            id,
            store_id: store_id.clone(),
            kind,
            content,
            evidence_episode_ids: evidence,
            created_at: now,
        })
    }
}
