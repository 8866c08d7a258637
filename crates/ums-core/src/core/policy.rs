// crates/ums-core/src/core/policy.rs
// ============================================================================
// Module: UMS Policy Decisions
// Description: Policy decision records and the policy-exception escape hatch.
// Purpose: Construct provenance-backed authorization outcomes.
// Dependencies: crate::core::{errors, identifiers, text, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Policy decisions are single-state records: the outcome is stored at
//! creation and later upserts may only escalate `allow < review < deny`.
//! Every decision carries provenance event identifiers, and a `deny`
//! outcome must explain itself with at least one reason code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::errors::EngineError;
use crate::core::identifiers::AuditId;
use crate::core::identifiers::PolicyDecisionId;
use crate::core::identifiers::StoreId;
use crate::core::text::sorted_unique;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Policy Exceptions
// ============================================================================

/// Reports whether metadata carries a structured `policyException`
/// object, which waives evidence requirements for the carrying entity.
#[must_use]
pub fn has_policy_exception(metadata: Option<&Value>) -> bool {
    metadata
        .and_then(|value| value.get("policyException"))
        .is_some_and(Value::is_object)
}

// ============================================================================
// SECTION: Policy Outcome
// ============================================================================

/// Authorization outcome with a total escalation order.
///
/// # Invariants
/// - Escalation order is `allow < review < deny`; merges never
///   de-escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyOutcome {
    /// Permit the governed action.
    Allow,
    /// Require human or policy review.
    Review,
    /// Deny the governed action.
    Deny,
}

impl PolicyOutcome {
    /// Returns the escalation rank (`allow` lowest, `deny` highest).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Allow => 0,
            Self::Review => 1,
            Self::Deny => 2,
        }
    }

    /// Returns the more severe of two outcomes.
    #[must_use]
    pub const fn escalate(self, other: Self) -> Self {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Review => "review",
            Self::Deny => "deny",
        }
    }
}

// ============================================================================
// SECTION: Policy Decision
// ============================================================================

/// Provenance-backed authorization record.
///
/// # Invariants
/// - `provenance_event_ids` is non-empty and sorted.
/// - `outcome == Deny` implies `reason_codes` is non-empty.
/// - `evaluated_at >= created_at` is not required (decisions may be
///   backdated by callers), but `updated_at >= created_at` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDecision {
    /// Content-addressed decision identifier.
    pub id: PolicyDecisionId,
    /// Audit trail identifier minted alongside the decision.
    pub audit_id: AuditId,
    /// Owning store.
    pub store_id: StoreId,
    /// Profile scope for the decision.
    pub profile_id: String,
    /// Policy key the decision governs (e.g. `recall`).
    pub policy_key: String,
    /// Authorization outcome.
    pub outcome: PolicyOutcome,
    /// Sorted reason codes; required for `deny`.
    pub reason_codes: Vec<String>,
    /// Sorted provenance event identifiers.
    pub provenance_event_ids: Vec<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Evaluation time.
    pub evaluated_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
    /// Optional metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Fingerprint fields hashed into the decision identifier.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PolicyFingerprint<'a> {
    /// Owning store.
    store_id: &'a str,
    /// Profile scope.
    profile_id: &'a str,
    /// Policy key semantic key.
    policy_key: &'a str,
}

impl PolicyDecision {
    /// Builds a policy decision.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for an empty policy key or a
    /// `deny` without reason codes, and [`EngineError::EvidenceRequired`]
    /// when provenance is empty without a `metadata.policyException`.
    pub fn build(
        store_id: &StoreId,
        profile_id: impl Into<String>,
        policy_key: impl Into<String>,
        outcome: PolicyOutcome,
        reason_codes: &[String],
        provenance_event_ids: &[String],
        evaluated_at: Option<Timestamp>,
        metadata: Option<Value>,
        now: Timestamp,
    ) -> Result<Self, EngineError> {
        let policy_key = policy_key.into().trim().to_string();
        if policy_key.is_empty() {
            return Err(EngineError::validation("policyKey must not be empty"));
        }
        let profile_id = profile_id.into().trim().to_string();
        if profile_id.is_empty() {
            return Err(EngineError::validation("profileId must not be empty"));
        }
        let reason_codes = sorted_unique(reason_codes);
        if outcome == PolicyOutcome::Deny && reason_codes.is_empty() {
            return Err(EngineError::validation(
                "deny outcome requires at least one reasonCodes entry",
            ));
        }
        let provenance = sorted_unique(provenance_event_ids);
        if provenance.is_empty() && !has_policy_exception(metadata.as_ref()) {
            return Err(EngineError::evidence_required(
                "policy decision requires at least one provenanceEventIds entry",
            ));
        }
        let fingerprint = PolicyFingerprint {
            store_id: store_id.as_str(),
            profile_id: &profile_id,
            policy_key: &policy_key,
        };
        let id = PolicyDecisionId::mint(&fingerprint)?;
        let audit_id = AuditId::mint(&fingerprint)?;
        Ok(Self {
            id,
            audit_id,
            store_id: store_id.clone(),
            profile_id,
            policy_key,
            outcome,
            reason_codes,
            provenance_event_ids: provenance,
            created_at: now,
            evaluated_at: evaluated_at.unwrap_or(now),
            updated_at: now,
            metadata,
        })
    }
}
