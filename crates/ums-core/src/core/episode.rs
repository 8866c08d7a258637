// crates/ums-core/src/core/episode.rs
// ============================================================================
// Module: UMS Episodes
// Description: Immutable ground-truth events and their validating factory.
// Purpose: Construct append-only episodes with content-addressed identifiers.
// Dependencies: crate::core::{errors, hashing, identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Episodes are the append-only ground truth of every bucket. Once
//! appended they are never mutated; the factory normalizes drafts,
//! computes the content-addressed identifier, and rejects malformed
//! input before anything reaches the state tree.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::errors::EngineError;
use crate::core::identifiers::EpisodeId;
use crate::core::identifiers::StoreId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Episode Record
// ============================================================================

/// Immutable ground-truth event.
///
/// # Invariants
/// - Immutable once appended; chronological sort is stable by
///   `(createdAt, id)`.
/// - `content` is stored post-redaction; `redactions` counts the
///   replacements applied during ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    /// Content-addressed episode identifier.
    pub id: EpisodeId,
    /// Owning store.
    pub store_id: StoreId,
    /// Event type (caller vocabulary, e.g. `ticket`, `chat_message`).
    #[serde(rename = "type")]
    pub episode_type: String,
    /// Event source system (e.g. `jira`, `codex`).
    pub source: String,
    /// Redacted textual content.
    pub content: String,
    /// Optional structured payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Optional caller metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Set when the content matched an injection pattern.
    pub unsafe_instruction: bool,
    /// Number of secret redactions applied during ingest.
    pub redactions: u64,
    /// Creation time (caller-supplied or injected clock).
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Episode Draft
// ============================================================================

/// Normalized ingest draft for one episode.
///
/// # Invariants
/// - `content` has already passed the redaction and unsafe-instruction
///   guardrails; the factory does not re-screen it.
#[derive(Debug, Clone)]
pub struct EpisodeDraft {
    /// Caller-supplied identifier, when pre-computed.
    pub id: Option<String>,
    /// Event type.
    pub episode_type: String,
    /// Event source; empty falls back to `unknown`.
    pub source: String,
    /// Redacted content.
    pub content: String,
    /// Optional structured payload.
    pub payload: Option<Value>,
    /// Optional caller metadata.
    pub metadata: Option<Value>,
    /// Unsafe-instruction flag from the guardrail screen.
    pub unsafe_instruction: bool,
    /// Redaction count from the guardrail screen.
    pub redactions: u64,
    /// Caller-supplied creation time, when time is part of the
    /// semantic key.
    pub created_at: Option<Timestamp>,
}

/// Fingerprint fields hashed into the episode identifier.
///
/// # Invariants
/// - Includes `createdAt` only when the caller supplied it, so minted
///   IDs never depend on the injected clock.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeFingerprint<'a> {
    /// Owning store.
    store_id: &'a str,
    /// Event type.
    #[serde(rename = "type")]
    episode_type: &'a str,
    /// Event source.
    source: &'a str,
    /// Redacted content.
    content: &'a str,
    /// Structured payload, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a Value>,
    /// Caller-supplied creation time, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

impl Episode {
    /// Builds an episode from a normalized draft.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when the type or content is
    /// empty, or when the payload cannot be canonicalized.
    pub fn build(
        draft: EpisodeDraft,
        store_id: &StoreId,
        now: Timestamp,
    ) -> Result<Self, EngineError> {
        let episode_type = draft.episode_type.trim().to_string();
        if episode_type.is_empty() {
            return Err(EngineError::validation("episode type must not be empty"));
        }
        let content = draft.content.trim().to_string();
        if content.is_empty() {
            return Err(EngineError::validation("episode content must not be empty"));
        }
        let source = {
            let trimmed = draft.source.trim();
            if trimmed.is_empty() {
                "unknown".to_string()
            } else {
                trimmed.to_string()
            }
        };

        let fingerprint = EpisodeFingerprint {
            store_id: store_id.as_str(),
            episode_type: &episode_type,
            source: &source,
            content: &content,
            payload: draft.payload.as_ref(),
            created_at: draft.created_at.map(Timestamp::to_rfc3339),
        };
        let id = match draft.id {
            Some(supplied) => {
                let trimmed = supplied.trim().to_string();
                if trimmed.is_empty() {
                    EpisodeId::mint(&fingerprint)?
                } else {
                    EpisodeId::new(trimmed)
                }
            }
            None => EpisodeId::mint(&fingerprint)?,
        };

        Ok(Self {
            id,
            store_id: store_id.clone(),
            episode_type,
            source,
            content,
            payload: draft.payload,
            metadata: draft.metadata,
            unsafe_instruction: draft.unsafe_instruction,
            redactions: draft.redactions,
            created_at: draft.created_at.unwrap_or(now),
        })
    }
}
