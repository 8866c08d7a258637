// crates/ums-core/src/core/planning.rs
// ============================================================================
// Module: UMS Planning Entities
// Description: Curriculum plan items and spaced-review schedule entries.
// Purpose: Construct planner outputs with evidence and window invariants.
// Dependencies: crate::core::{errors, identifiers, policy, rules, text, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Curriculum plan items rank learning objectives for a profile; review
//! schedule entries drive spaced repetition over arbitrary targets. Both
//! are upserted deterministically and carry provenance.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::errors::EngineError;
use crate::core::identifiers::CurriculumItemId;
use crate::core::identifiers::ReviewEntryId;
use crate::core::identifiers::StoreId;
use crate::core::policy::has_policy_exception;
use crate::core::text::sorted_unique;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Ease Factor Bounds
// ============================================================================

/// Minimum spaced-repetition ease factor.
pub const EASE_FACTOR_MIN: f64 = 1.3;
/// Maximum spaced-repetition ease factor.
pub const EASE_FACTOR_MAX: f64 = 3.0;
/// Default ease factor for new schedule entries.
pub const EASE_FACTOR_DEFAULT: f64 = 2.5;

// ============================================================================
// SECTION: Curriculum Status
// ============================================================================

/// Curriculum plan item lifecycle status.
///
/// # Invariants
/// - Transitions follow `proposed -> committed -> completed | blocked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Planner proposal awaiting commitment.
    Proposed,
    /// Item accepted into the learner's plan.
    Committed,
    /// Item finished.
    Completed,
    /// Item blocked on an external dependency.
    Blocked,
}

impl PlanStatus {
    /// Reports whether `next` is a legal transition from `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Proposed, Self::Proposed | Self::Committed)
                | (Self::Committed, Self::Committed | Self::Completed | Self::Blocked)
                | (Self::Completed, Self::Completed)
                | (Self::Blocked, Self::Blocked)
        )
    }
}

// ============================================================================
// SECTION: Plan Window
// ============================================================================

/// Scheduling window for a plan item.
///
/// # Invariants
/// - `end >= start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanWindow {
    /// Window start.
    pub start: Timestamp,
    /// Window end.
    pub end: Timestamp,
}

// ============================================================================
// SECTION: Curriculum Plan Item
// ============================================================================

/// Ranked learning objective for a profile.
///
/// # Invariants
/// - `recommendation_rank >= 1`.
/// - `evidence_episode_ids` is non-empty (or a policy exception was
///   attached) and sorted.
/// - `window.end >= window.start` when a window is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumPlanItem {
    /// Content-addressed item identifier.
    pub id: CurriculumItemId,
    /// Owning store.
    pub store_id: StoreId,
    /// Profile scope.
    pub profile_id: String,
    /// Learning objective identifier (semantic key).
    pub objective_id: String,
    /// Recommendation rank, 1-based.
    pub recommendation_rank: u64,
    /// Sorted evidence episode identifiers.
    pub evidence_episode_ids: Vec<String>,
    /// Lifecycle status.
    pub status: PlanStatus,
    /// Optional due time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<Timestamp>,
    /// Optional scheduling window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<PlanWindow>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
    /// Optional metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Fingerprint fields hashed into the plan item identifier.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanFingerprint<'a> {
    /// Owning store.
    store_id: &'a str,
    /// Profile scope.
    profile_id: &'a str,
    /// Objective semantic key.
    objective_id: &'a str,
}

impl CurriculumPlanItem {
    /// Builds a curriculum plan item.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for empty keys, a zero rank,
    /// or an inverted window, and [`EngineError::EvidenceRequired`] when
    /// evidence is missing without a `metadata.policyException`.
    pub fn build(
        store_id: &StoreId,
        profile_id: impl Into<String>,
        objective_id: impl Into<String>,
        recommendation_rank: u64,
        evidence_episode_ids: &[String],
        status: PlanStatus,
        due_at: Option<Timestamp>,
        window: Option<PlanWindow>,
        metadata: Option<Value>,
        now: Timestamp,
    ) -> Result<Self, EngineError> {
        let profile_id = profile_id.into().trim().to_string();
        if profile_id.is_empty() {
            return Err(EngineError::validation("profileId must not be empty"));
        }
        let objective_id = objective_id.into().trim().to_string();
        if objective_id.is_empty() {
            return Err(EngineError::validation("objectiveId must not be empty"));
        }
        if recommendation_rank == 0 {
            return Err(EngineError::validation("recommendationRank must be >= 1"));
        }
        if let Some(window) = window
            && window.end < window.start
        {
            return Err(EngineError::validation("window end must be >= window start"));
        }
        let evidence = sorted_unique(evidence_episode_ids);
        if evidence.is_empty() && !has_policy_exception(metadata.as_ref()) {
            return Err(EngineError::evidence_required(
                "curriculum item requires at least one evidenceEventIds entry",
            ));
        }
        let fingerprint = PlanFingerprint {
            store_id: store_id.as_str(),
            profile_id: &profile_id,
            objective_id: &objective_id,
        };
        let id = CurriculumItemId::mint(&fingerprint)?;
        Ok(Self {
            id,
            store_id: store_id.clone(),
            profile_id,
            objective_id,
            recommendation_rank,
            evidence_episode_ids: evidence,
            status,
            due_at,
            window,
            created_at: now,
            updated_at: now,
            metadata,
        })
    }
}

// ============================================================================
// SECTION: Review Status
// ============================================================================

/// Review schedule entry lifecycle status.
///
/// # Invariants
/// - Transitions follow `scheduled -> due -> completed | suspended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Entry waits for its due time.
    Scheduled,
    /// Entry is due for review.
    Due,
    /// Review completed.
    Completed,
    /// Review suspended.
    Suspended,
}

impl ReviewStatus {
    /// Reports whether `next` is a legal transition from `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Scheduled, Self::Scheduled | Self::Due)
                | (Self::Due, Self::Due | Self::Completed | Self::Suspended)
                | (Self::Completed, Self::Completed)
                | (Self::Suspended, Self::Suspended | Self::Scheduled)
        )
    }
}

// ============================================================================
// SECTION: Review Schedule Entry
// ============================================================================

/// Spaced-review schedule entry for a target entity.
///
/// # Invariants
/// - `interval_days >= 1`; `ease_factor` lies in `[1.3, 3]`.
/// - `source_event_ids` is non-empty (or a policy exception was
///   attached) and sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewScheduleEntry {
    /// Content-addressed entry identifier.
    pub id: ReviewEntryId,
    /// Owning store.
    pub store_id: StoreId,
    /// Profile scope.
    pub profile_id: String,
    /// Target entity identifier (semantic key).
    pub target_id: String,
    /// Lifecycle status.
    pub status: ReviewStatus,
    /// Due time.
    pub due_at: Timestamp,
    /// Review interval in days.
    pub interval_days: u64,
    /// Spaced-repetition ease factor.
    pub ease_factor: f64,
    /// Sorted provenance event identifiers.
    pub source_event_ids: Vec<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
    /// Optional metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Fingerprint fields hashed into the entry identifier.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewFingerprint<'a> {
    /// Owning store.
    store_id: &'a str,
    /// Profile scope.
    profile_id: &'a str,
    /// Target semantic key.
    target_id: &'a str,
}

impl ReviewScheduleEntry {
    /// Builds a review schedule entry.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for empty keys, a zero
    /// interval, or an out-of-range ease factor, and
    /// [`EngineError::EvidenceRequired`] when provenance is missing
    /// without a `metadata.policyException`.
    pub fn build(
        store_id: &StoreId,
        profile_id: impl Into<String>,
        target_id: impl Into<String>,
        status: ReviewStatus,
        due_at: Timestamp,
        interval_days: u64,
        ease_factor: f64,
        source_event_ids: &[String],
        metadata: Option<Value>,
        now: Timestamp,
    ) -> Result<Self, EngineError> {
        let profile_id = profile_id.into().trim().to_string();
        if profile_id.is_empty() {
            return Err(EngineError::validation("profileId must not be empty"));
        }
        let target_id = target_id.into().trim().to_string();
        if target_id.is_empty() {
            return Err(EngineError::validation("targetId must not be empty"));
        }
        if interval_days == 0 {
            return Err(EngineError::validation("intervalDays must be >= 1"));
        }
        if !(EASE_FACTOR_MIN ..= EASE_FACTOR_MAX).contains(&ease_factor) {
            return Err(EngineError::validation(format!(
                "easeFactor must lie in [{EASE_FACTOR_MIN}, {EASE_FACTOR_MAX}]"
            )));
        }
        let provenance = sorted_unique(source_event_ids);
        if provenance.is_empty() && !has_policy_exception(metadata.as_ref()) {
            return Err(EngineError::evidence_required(
                "review entry requires at least one sourceEventIds entry",
            ));
        }
        let fingerprint = ReviewFingerprint {
            store_id: store_id.as_str(),
            profile_id: &profile_id,
            target_id: &target_id,
        };
        let id = ReviewEntryId::mint(&fingerprint)?;
        Ok(Self {
            id,
            store_id: store_id.clone(),
            profile_id,
            target_id,
            status,
            due_at,
            interval_days,
            ease_factor,
            source_event_ids: provenance,
            created_at: now,
            updated_at: now,
            metadata,
        })
    }
}
