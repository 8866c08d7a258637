// crates/ums-core/src/core/rules.rs
// ============================================================================
// Module: UMS Procedural Rules
// Description: Procedural rules, anti-patterns, and candidate shapes.
// Purpose: Construct evidence-backed distilled guidance with confidence.
// Dependencies: crate::core::{errors, identifiers, text, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Procedural rules carry distilled actionable guidance with a confidence
//! value and mandatory evidence pointers. Anti-patterns are their
//! inversions (`Avoid: ...`), produced by rule inversion or misconception
//! harm escalation. Candidates are the unsaved precursor shape emitted by
//! `reflect` and consumed by `validate`/`curate`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::errors::EngineError;
use crate::core::identifiers::AntiPatternId;
use crate::core::identifiers::MisconceptionId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::StoreId;
use crate::core::policy::has_policy_exception;
use crate::core::text::sorted_unique;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Confidence Arithmetic
// ============================================================================

/// Clamps a confidence value into `[0, 1]` and rounds to four decimal
/// places so repeated float arithmetic stays canonical across replicas.
#[must_use]
pub fn clamp_confidence(value: f64) -> f64 {
    let clamped = value.clamp(0.0, 1.0);
    (clamped * 10_000.0).round() / 10_000.0
}

// ============================================================================
// SECTION: Rule Status
// ============================================================================

/// Procedural rule lifecycle status.
///
/// # Invariants
/// - `Tombstoned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// Rule participates in recall and reinforcement.
    Active,
    /// Rule is retired and excluded from default recall.
    Tombstoned,
}

// ============================================================================
// SECTION: Procedural Rule
// ============================================================================

/// Distilled actionable guidance with confidence and evidence.
///
/// # Invariants
/// - `evidence_episode_ids` is non-empty (unless a policy exception was
///   attached at construction) and sorted.
/// - `confidence` lies in `[0, 1]`; `updated_at >= created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProceduralRule {
    /// Content-addressed rule identifier.
    pub id: RuleId,
    /// Owning store.
    pub store_id: StoreId,
    /// Actionable guidance statement.
    pub statement: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Sorted evidence episode identifiers.
    pub evidence_episode_ids: Vec<String>,
    /// Lifecycle status.
    pub status: RuleStatus,
    /// Accumulated helpful reinforcement signals.
    pub helpful_count: u64,
    /// Accumulated harmful reinforcement signals.
    pub harmful_count: u64,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
    /// Last validation sweep that confirmed the rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_validated_at: Option<Timestamp>,
    /// Rule superseded by this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<RuleId>,
    /// Rule that replaced this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<RuleId>,
    /// Optional metadata (tombstone reasons, policy exceptions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Fingerprint fields hashed into the rule identifier.
///
/// # Invariants
/// - The statement is the semantic key; evidence and confidence never
///   change the identifier, so reinforcement merges in place.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RuleFingerprint<'a> {
    /// Owning store.
    store_id: &'a str,
    /// Statement semantic key.
    statement: &'a str,
}

impl ProceduralRule {
    /// Builds an active rule from candidate fields.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for an empty statement or a
    /// non-finite confidence, and [`EngineError::EvidenceRequired`] when
    /// the evidence list is empty without a `metadata.policyException`.
    pub fn build(
        store_id: &StoreId,
        statement: impl Into<String>,
        confidence: f64,
        evidence_episode_ids: &[String],
        metadata: Option<Value>,
        now: Timestamp,
    ) -> Result<Self, EngineError> {
        let statement = statement.into().trim().to_string();
        if statement.is_empty() {
            return Err(EngineError::validation("rule statement must not be empty"));
        }
        if !confidence.is_finite() {
            return Err(EngineError::validation("rule confidence must be finite"));
        }
        let evidence = sorted_unique(evidence_episode_ids);
        if evidence.is_empty() && !has_policy_exception(metadata.as_ref()) {
            return Err(EngineError::evidence_required(
                "rule requires at least one evidenceEpisodeIds entry",
            ));
        }
        let fingerprint = RuleFingerprint {
            store_id: store_id.as_str(),
            statement: &statement,
        };
        let id = RuleId::mint(&fingerprint)?;
        Ok(Self {
            id,
            store_id: store_id.clone(),
            statement,
            confidence: clamp_confidence(confidence),
            evidence_episode_ids: evidence,
            status: RuleStatus::Active,
            helpful_count: 0,
            harmful_count: 0,
            created_at: now,
            updated_at: now,
            last_validated_at: None,
            supersedes: None,
            superseded_by: None,
            metadata,
        })
    }
}

// ============================================================================
// SECTION: Anti-Pattern
// ============================================================================

/// Inverse rule derived from harm signals.
///
/// # Invariants
/// - `statement` starts with `Avoid:` when derived from a rule or a
///   misconception escalation.
/// - `evidence_episode_ids` is non-empty and sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AntiPattern {
    /// Content-addressed anti-pattern identifier.
    pub id: AntiPatternId,
    /// Owning store.
    pub store_id: StoreId,
    /// Avoidance statement.
    pub statement: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Sorted evidence episode identifiers.
    pub evidence_episode_ids: Vec<String>,
    /// Rule this anti-pattern was inverted from, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_rule_id: Option<RuleId>,
    /// Misconception that escalated into this artifact, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_misconception_id: Option<MisconceptionId>,
    /// Harm threshold that emitted this artifact, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_threshold: Option<u64>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Optional metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Fingerprint fields hashed into the anti-pattern identifier.
///
/// # Invariants
/// - Escalation artifacts key on `(misconceptionId, threshold)` so each
///   threshold fires exactly once per misconception.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AntiPatternFingerprint<'a> {
    /// Owning store.
    store_id: &'a str,
    /// Avoidance statement.
    statement: &'a str,
    /// Source misconception for escalation artifacts.
    #[serde(skip_serializing_if = "Option::is_none")]
    source_misconception_id: Option<&'a str>,
    /// Escalation threshold for escalation artifacts.
    #[serde(skip_serializing_if = "Option::is_none")]
    escalation_threshold: Option<u64>,
}

impl AntiPattern {
    /// Builds an anti-pattern.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for an empty statement and
    /// [`EngineError::EvidenceRequired`] when the evidence list is empty
    /// without a `metadata.policyException`.
    pub fn build(
        store_id: &StoreId,
        statement: impl Into<String>,
        confidence: f64,
        evidence_episode_ids: &[String],
        source_rule_id: Option<RuleId>,
        source_misconception_id: Option<MisconceptionId>,
        escalation_threshold: Option<u64>,
        metadata: Option<Value>,
        now: Timestamp,
    ) -> Result<Self, EngineError> {
        let statement = statement.into().trim().to_string();
        if statement.is_empty() {
            return Err(EngineError::validation("anti-pattern statement must not be empty"));
        }
        let evidence = sorted_unique(evidence_episode_ids);
        if evidence.is_empty() && !has_policy_exception(metadata.as_ref()) {
            return Err(EngineError::evidence_required(
                "anti-pattern requires at least one evidenceEpisodeIds entry",
            ));
        }
        let fingerprint = AntiPatternFingerprint {
            store_id: store_id.as_str(),
            statement: &statement,
            source_misconception_id: source_misconception_id
                .as_ref()
                .map(MisconceptionId::as_str),
            escalation_threshold,
        };
        let id = AntiPatternId::mint(&fingerprint)?;
        Ok(Self {
            id,
            store_id: store_id.clone(),
            statement,
            confidence: clamp_confidence(confidence),
            evidence_episode_ids: evidence,
            source_rule_id,
            source_misconception_id,
            escalation_threshold,
            created_at: now,
            metadata,
        })
    }
}

// ============================================================================
// SECTION: Rule Candidates
// ============================================================================

/// Unsaved rule candidate emitted by `reflect` and consumed by
/// `validate`/`curate`.
///
/// # Invariants
/// - Candidates never carry identifiers; IDs are minted at curation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCandidate {
    /// Proposed statement.
    pub statement: String,
    /// Provisional confidence.
    pub confidence: f64,
    /// Evidence episode identifiers supporting the candidate.
    #[serde(default)]
    pub evidence_episode_ids: Vec<String>,
    /// Number of supporting episodes observed by `reflect`.
    #[serde(default)]
    pub support: u64,
}
