// crates/ums-core/src/core/signals.rs
// ============================================================================
// Module: UMS Misconceptions
// Description: Misconception records driven by harm and correction signals.
// Purpose: Construct evidence-backed misconception state with ordered counts.
// Dependencies: crate::core::{errors, identifiers, policy, rules, text, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Misconceptions accumulate harmful and correction signals per
//! `(profile, misconceptionKey)`. Counts are monotone non-decreasing
//! across merges and timestamps stay ordered
//! (`createdAt <= updatedAt`, `lastSignalAt <= updatedAt`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::errors::EngineError;
use crate::core::identifiers::MisconceptionId;
use crate::core::identifiers::StoreId;
use crate::core::policy::has_policy_exception;
use crate::core::rules::clamp_confidence;
use crate::core::text::sorted_unique;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Misconception Status
// ============================================================================

/// Misconception lifecycle status.
///
/// # Invariants
/// - `Resolved` requires at least one correction signal.
/// - `Suppressed` requires a `metadata.policyException`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisconceptionStatus {
    /// Misconception is live and accumulating signals.
    Active,
    /// Misconception was corrected.
    Resolved,
    /// Misconception is muted by policy.
    Suppressed,
}

// ============================================================================
// SECTION: Signal Kinds
// ============================================================================

/// Signal kinds accepted by `misconception_update`.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Evidence the misconception caused harm.
    Harmful,
    /// Evidence the misconception was corrected.
    Correction,
    /// Neutral observation of the misconception.
    Observed,
}

// ============================================================================
// SECTION: Misconception Record
// ============================================================================

/// Misconception tracked per `(profile, misconceptionKey)`.
///
/// # Invariants
/// - `evidence_episode_ids` is non-empty (or a policy exception was
///   attached) and sorted.
/// - Signal counts are monotone non-decreasing on merge.
/// - `created_at <= updated_at` and `last_signal_at <= updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Misconception {
    /// Content-addressed misconception identifier.
    pub id: MisconceptionId,
    /// Owning store.
    pub store_id: StoreId,
    /// Profile scope for the misconception.
    pub profile_id: String,
    /// Caller vocabulary key identifying the misconception.
    pub misconception_key: String,
    /// Lifecycle status.
    pub status: MisconceptionStatus,
    /// Confidence the misconception is held, in `[0, 1]`.
    pub confidence: f64,
    /// Count of harmful signals observed.
    pub harmful_signal_count: u64,
    /// Count of correction signals observed.
    pub correction_signal_count: u64,
    /// Sorted evidence episode identifiers.
    pub evidence_episode_ids: Vec<String>,
    /// Sorted source signal identifiers.
    pub source_signal_ids: Vec<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
    /// Time of the most recent signal.
    pub last_signal_at: Timestamp,
    /// Optional metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Fingerprint fields hashed into the misconception identifier.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MisconceptionFingerprint<'a> {
    /// Owning store.
    store_id: &'a str,
    /// Profile scope.
    profile_id: &'a str,
    /// Misconception semantic key.
    misconception_key: &'a str,
}

impl Misconception {
    /// Builds a misconception record.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for empty keys,
    /// [`EngineError::EvidenceRequired`] when evidence is missing
    /// without a `metadata.policyException`, and
    /// [`EngineError::IdentityInvariant`] for disordered timestamps.
    pub fn build(
        store_id: &StoreId,
        profile_id: impl Into<String>,
        misconception_key: impl Into<String>,
        status: MisconceptionStatus,
        confidence: f64,
        harmful_signal_count: u64,
        correction_signal_count: u64,
        evidence_episode_ids: &[String],
        source_signal_ids: &[String],
        metadata: Option<Value>,
        created_at: Timestamp,
        updated_at: Timestamp,
        last_signal_at: Timestamp,
    ) -> Result<Self, EngineError> {
        let profile_id = profile_id.into().trim().to_string();
        if profile_id.is_empty() {
            return Err(EngineError::validation("profileId must not be empty"));
        }
        let misconception_key = misconception_key.into().trim().to_string();
        if misconception_key.is_empty() {
            return Err(EngineError::validation("misconceptionKey must not be empty"));
        }
        let evidence = sorted_unique(evidence_episode_ids);
        if evidence.is_empty() && !has_policy_exception(metadata.as_ref()) {
            return Err(EngineError::evidence_required(
                "misconception requires at least one evidenceEventIds entry",
            ));
        }
        if updated_at < created_at || last_signal_at > updated_at {
            return Err(EngineError::identity_invariant(
                "misconception timestamps must satisfy createdAt <= lastSignalAt <= updatedAt",
            ));
        }
        if status == MisconceptionStatus::Suppressed && !has_policy_exception(metadata.as_ref()) {
            return Err(EngineError::validation(
                "suppressed status requires metadata.policyException",
            ));
        }
        let fingerprint = MisconceptionFingerprint {
            store_id: store_id.as_str(),
            profile_id: &profile_id,
            misconception_key: &misconception_key,
        };
        let id = MisconceptionId::mint(&fingerprint)?;
        Ok(Self {
            id,
            store_id: store_id.clone(),
            profile_id,
            misconception_key,
            status,
            confidence: clamp_confidence(confidence),
            harmful_signal_count,
            correction_signal_count,
            evidence_episode_ids: evidence,
            source_signal_ids: sorted_unique(source_signal_ids),
            created_at,
            updated_at,
            last_signal_at,
            metadata,
        })
    }
}
