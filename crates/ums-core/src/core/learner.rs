// crates/ums-core/src/core/learner.rs
// ============================================================================
// Module: UMS Learner Identity
// Description: Learner profiles, identity references, and identity edges.
// Purpose: Construct identity records with primary-ref and endpoint invariants.
// Dependencies: crate::core::{errors, identifiers, policy, text, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! A learner profile anchors a learner inside a store with at least one
//! identity reference, exactly one of which is primary. Identity edges
//! relate references to each other or to evidence; relations that assert
//! facts (`misconception_of`, `evidence_of`) require evidence pointers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::errors::EngineError;
use crate::core::identifiers::IdentityEdgeId;
use crate::core::identifiers::LearnerProfileId;
use crate::core::identifiers::StoreId;
use crate::core::policy::has_policy_exception;
use crate::core::rules::clamp_confidence;
use crate::core::text::sorted_unique;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Identity References
// ============================================================================

/// Namespaced identity reference (e.g. `email:learner@example.com`).
///
/// # Invariants
/// - `namespace` and `value` are non-empty and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRef {
    /// Reference namespace (e.g. `email`, `github`).
    pub namespace: String,
    /// Reference value within the namespace.
    pub value: String,
    /// Marks the single primary reference of a profile.
    #[serde(default)]
    pub is_primary: bool,
}

impl IdentityRef {
    /// Normalizes the reference, trimming both parts.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IdentityInvariant`] when either part is
    /// empty after trimming.
    pub fn normalized(&self) -> Result<Self, EngineError> {
        let namespace = self.namespace.trim().to_string();
        let value = self.value.trim().to_string();
        if namespace.is_empty() || value.is_empty() {
            return Err(EngineError::identity_invariant(
                "identity refs require non-empty namespace and value",
            ));
        }
        Ok(Self {
            namespace,
            value,
            is_primary: self.is_primary,
        })
    }
}

// ============================================================================
// SECTION: Profile Status
// ============================================================================

/// Learner profile lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and snapshot compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnerStatus {
    /// Profile is live.
    Active,
    /// Profile is retained but no longer updated.
    Archived,
}

// ============================================================================
// SECTION: Learner Profile
// ============================================================================

/// Learner profile anchored by identity references.
///
/// # Invariants
/// - `identity_refs` is non-empty with exactly one `is_primary`.
/// - `updated_at >= created_at`; `version` is monotone across merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerProfile {
    /// Content-addressed profile identifier.
    pub id: LearnerProfileId,
    /// Owning store.
    pub store_id: StoreId,
    /// Caller-chosen learner identifier (semantic key).
    pub learner_id: String,
    /// Identity references, sorted by `(namespace, value)`.
    pub identity_refs: Vec<IdentityRef>,
    /// Sorted learning goals.
    pub goals: Vec<String>,
    /// Sorted interest tags.
    pub interest_tags: Vec<String>,
    /// Lifecycle status.
    pub status: LearnerStatus,
    /// Monotone version.
    pub version: u64,
    /// Confidence that the profile reflects the learner, in `[0, 1]`.
    pub profile_confidence: f64,
    /// Evidence event identifiers, sorted.
    pub evidence_event_ids: Vec<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
    /// Optional metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Fingerprint fields hashed into the profile identifier.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LearnerFingerprint<'a> {
    /// Owning store.
    store_id: &'a str,
    /// Learner semantic key.
    learner_id: &'a str,
}

impl LearnerProfile {
    /// Builds a learner profile, normalizing refs and list attributes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for an empty learner ID and
    /// [`EngineError::IdentityInvariant`] when identity refs are missing
    /// or do not contain exactly one primary.
    pub fn build(
        store_id: &StoreId,
        learner_id: impl Into<String>,
        identity_refs: &[IdentityRef],
        goals: &[String],
        interest_tags: &[String],
        status: LearnerStatus,
        version: u64,
        profile_confidence: f64,
        evidence_event_ids: &[String],
        metadata: Option<Value>,
        now: Timestamp,
    ) -> Result<Self, EngineError> {
        let learner_id = learner_id.into().trim().to_string();
        if learner_id.is_empty() {
            return Err(EngineError::validation("learnerId must not be empty"));
        }
        if identity_refs.is_empty() {
            return Err(EngineError::identity_invariant(
                "learner profile requires at least one identityRefs entry",
            ));
        }
        let mut refs = Vec::with_capacity(identity_refs.len());
        for reference in identity_refs {
            refs.push(reference.normalized()?);
        }
        refs.sort();
        refs.dedup();
        let primary_count = refs.iter().filter(|reference| reference.is_primary).count();
        if primary_count != 1 {
            return Err(EngineError::identity_invariant(format!(
                "learner profile requires exactly one primary identity ref, found {primary_count}"
            )));
        }
        let fingerprint = LearnerFingerprint {
            store_id: store_id.as_str(),
            learner_id: &learner_id,
        };
        let id = LearnerProfileId::mint(&fingerprint)?;
        Ok(Self {
            id,
            store_id: store_id.clone(),
            learner_id,
            identity_refs: refs,
            goals: sorted_unique(goals),
            interest_tags: sorted_unique(interest_tags),
            status,
            version,
            profile_confidence: clamp_confidence(profile_confidence),
            evidence_event_ids: sorted_unique(evidence_event_ids),
            created_at: now,
            updated_at: now,
            metadata,
        })
    }
}

// ============================================================================
// SECTION: Identity Edges
// ============================================================================

/// Relations between identity references.
///
/// # Invariants
/// - `MisconceptionOf` and `EvidenceOf` require evidence at
///   construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRelation {
    /// Two references denote the same identity.
    SameAs,
    /// One reference is an alias of another.
    AliasOf,
    /// Reference is a member of a group reference.
    MemberOf,
    /// Reference records a misconception about the target.
    MisconceptionOf,
    /// Reference is evidence supporting the target.
    EvidenceOf,
}

impl EdgeRelation {
    /// Reports whether this relation asserts a fact that needs
    /// evidence.
    #[must_use]
    pub const fn requires_evidence(self) -> bool {
        matches!(self, Self::MisconceptionOf | Self::EvidenceOf)
    }

    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SameAs => "same_as",
            Self::AliasOf => "alias_of",
            Self::MemberOf => "member_of",
            Self::MisconceptionOf => "misconception_of",
            Self::EvidenceOf => "evidence_of",
        }
    }
}

/// Edge in the identity graph.
///
/// # Invariants
/// - `from_ref != to_ref`.
/// - Evidence-bearing relations carry at least one pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityEdge {
    /// Content-addressed edge identifier.
    pub id: IdentityEdgeId,
    /// Owning store.
    pub store_id: StoreId,
    /// Learner profile the edge belongs to.
    pub profile_id: String,
    /// Edge relation.
    pub relation: EdgeRelation,
    /// Source reference (rendered `namespace:value`).
    pub from_ref: String,
    /// Target reference (rendered `namespace:value`).
    pub to_ref: String,
    /// Sorted evidence episode identifiers.
    pub evidence_episode_ids: Vec<String>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Fingerprint fields hashed into the edge identifier.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EdgeFingerprint<'a> {
    /// Owning store.
    store_id: &'a str,
    /// Learner profile scope.
    profile_id: &'a str,
    /// Edge relation label.
    relation: &'a str,
    /// Source reference.
    from_ref: &'a str,
    /// Target reference.
    to_ref: &'a str,
}

impl IdentityEdge {
    /// Builds an identity edge.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IdentityInvariant`] for identical
    /// endpoints or empty refs, and [`EngineError::EvidenceRequired`]
    /// when an evidence-bearing relation has no pointers and no policy
    /// exception.
    pub fn build(
        store_id: &StoreId,
        profile_id: impl Into<String>,
        relation: EdgeRelation,
        from_ref: impl Into<String>,
        to_ref: impl Into<String>,
        evidence_episode_ids: &[String],
        confidence: f64,
        metadata: Option<&Value>,
        now: Timestamp,
    ) -> Result<Self, EngineError> {
        let profile_id = profile_id.into().trim().to_string();
        if profile_id.is_empty() {
            return Err(EngineError::validation("profileId must not be empty"));
        }
        let from_ref = from_ref.into().trim().to_string();
        let to_ref = to_ref.into().trim().to_string();
        if from_ref.is_empty() || to_ref.is_empty() {
            return Err(EngineError::identity_invariant(
                "edge endpoints must not be empty",
            ));
        }
        if from_ref == to_ref {
            return Err(EngineError::identity_invariant(
                "edge endpoints must be distinct",
            ));
        }
        let evidence = sorted_unique(evidence_episode_ids);
        if relation.requires_evidence() && evidence.is_empty() && !has_policy_exception(metadata) {
            return Err(EngineError::evidence_required(format!(
                "{} edges require at least one evidenceEpisodeIds entry",
                relation.as_str()
            )));
        }
        let fingerprint = EdgeFingerprint {
            store_id: store_id.as_str(),
            profile_id: &profile_id,
            relation: relation.as_str(),
            from_ref: &from_ref,
            to_ref: &to_ref,
        };
        let id = IdentityEdgeId::mint(&fingerprint)?;
        Ok(Self {
            id,
            store_id: store_id.clone(),
            profile_id,
            relation,
            from_ref,
            to_ref,
            evidence_episode_ids: evidence,
            confidence: clamp_confidence(confidence),
            created_at: now,
        })
    }
}
