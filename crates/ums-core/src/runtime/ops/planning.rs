// crates/ums-core/src/runtime/ops/planning.rs
// ============================================================================
// Module: Planning Handlers
// Description: Curriculum plan upserts and review schedule operations.
// Purpose: Maintain ranked objectives and spaced-review schedules.
// Dependencies: crate::core, crate::runtime
// ============================================================================

//! ## Overview
//! Plan items and schedule entries are deterministic upserts with
//! provenance contracts and state machines
//! (`proposed -> committed -> completed | blocked`,
//! `scheduled -> due -> completed | suspended`). The clock sweep moves
//! entries to `due` once their time arrives; rebalancing caps the
//! number of entries per UTC day, pushing overflow forward in walk
//! order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;

use crate::core::errors::EngineError;
use crate::core::planning::CurriculumPlanItem;
use crate::core::planning::EASE_FACTOR_DEFAULT;
use crate::core::planning::PlanStatus;
use crate::core::planning::ReviewScheduleEntry;
use crate::core::planning::ReviewStatus;
use crate::runtime::engine::MemoryEngine;
use crate::runtime::engine::RequestScope;
use crate::runtime::ops::parse;
use crate::runtime::ops::to_value;
use crate::runtime::requests::CurriculumPlanUpdateRequest;
use crate::runtime::requests::ReviewScheduleClockRequest;
use crate::runtime::requests::ReviewScheduleUpdateRequest;
use crate::runtime::requests::ReviewSetRebalanceRequest;
use crate::runtime::responses::CurriculumPlanUpdateResponse;
use crate::runtime::responses::RebalancedEntry;
use crate::runtime::responses::ResponseMeta;
use crate::runtime::responses::ReviewScheduleClockResponse;
use crate::runtime::responses::ReviewScheduleUpdateResponse;
use crate::runtime::responses::ReviewSetRebalanceResponse;
use crate::runtime::state::UpsertAction;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default per-day cap for review rebalancing.
const DEFAULT_MAX_DUE_PER_DAY: usize = 20;

// ============================================================================
// SECTION: Curriculum Handler
// ============================================================================

/// Handles the `curriculum_plan_update` operation.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] for illegal status transitions
/// and [`EngineError::EvidenceRequired`] for items without evidence.
pub(crate) fn curriculum_plan_update(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: CurriculumPlanUpdateRequest = parse(request)?;
    let profile_id = typed
        .profile_id
        .clone()
        .unwrap_or_else(|| scope.profile.as_str().to_string());
    if typed.items.is_empty() {
        return Err(EngineError::validation("items must not be empty"));
    }

    let mut bucket = engine.stage_bucket(scope);
    let mut item_ids = Vec::with_capacity(typed.items.len());
    let mut created = 0_u64;
    let mut updated = 0_u64;
    let mut noops = 0_u64;

    for draft in &typed.items {
        let mut incoming = CurriculumPlanItem::build(
            &scope.store_id,
            profile_id.clone(),
            draft.objective_id.clone(),
            draft.recommendation_rank,
            &draft.evidence_event_ids,
            draft.status.unwrap_or(PlanStatus::Proposed),
            draft.due_at,
            draft.window,
            draft.metadata.clone(),
            scope.now,
        )?;
        if let Some(existing) = bucket.curriculum_items.get(&incoming.id) {
            // A request that omits the status keeps the item where it is.
            if draft.status.is_none() {
                incoming.status = existing.status;
            }
            if !existing.status.can_transition_to(incoming.status) {
                return Err(EngineError::validation(format!(
                    "illegal curriculum transition for objective {:?}",
                    draft.objective_id
                )));
            }
        }
        item_ids.push(incoming.id.as_str().to_string());
        match bucket.upsert_curriculum_item(incoming, scope.now)? {
            UpsertAction::Created => created += 1,
            UpsertAction::Updated => updated += 1,
            UpsertAction::Noop => noops += 1,
        }
    }

    let action = if created > 0 {
        UpsertAction::Created
    } else if updated > 0 {
        UpsertAction::Updated
    } else {
        UpsertAction::Noop
    };
    if action.is_mutation() {
        bucket.counters.record_mutation("curriculum_plan_update");
    }
    let observability = MemoryEngine::observability(&bucket, created + updated, 0, 0);
    if action.is_mutation() {
        engine.commit_bucket(scope, bucket);
    }

    let response = CurriculumPlanUpdateResponse {
        meta: ResponseMeta::new(
            "curriculum_plan_update",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            action,
            &scope.request_digest,
            observability,
        ),
        item_ids,
        created,
        updated,
        noops,
    };
    to_value(&response)
}

// ============================================================================
// SECTION: Review Schedule Handler
// ============================================================================

/// Handles the `review_schedule_update` operation.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] for illegal transitions or
/// out-of-range scheduling parameters, and
/// [`EngineError::EvidenceRequired`] for entries without provenance.
pub(crate) fn review_schedule_update(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: ReviewScheduleUpdateRequest = parse(request)?;
    let profile_id = typed
        .profile_id
        .clone()
        .unwrap_or_else(|| scope.profile.as_str().to_string());
    if typed.entries.is_empty() {
        return Err(EngineError::validation("entries must not be empty"));
    }

    let mut bucket = engine.stage_bucket(scope);
    let mut entry_ids = Vec::with_capacity(typed.entries.len());
    let mut created = 0_u64;
    let mut updated = 0_u64;
    let mut noops = 0_u64;

    for draft in &typed.entries {
        let mut incoming = ReviewScheduleEntry::build(
            &scope.store_id,
            profile_id.clone(),
            draft.target_id.clone(),
            draft.status.unwrap_or(ReviewStatus::Scheduled),
            draft.due_at,
            draft.interval_days,
            draft.ease_factor.unwrap_or(EASE_FACTOR_DEFAULT),
            &draft.source_event_ids,
            draft.metadata.clone(),
            scope.now,
        )?;
        if let Some(existing) = bucket.review_schedules.get(&incoming.id) {
            // Omitted fields keep the entry's current scheduling state.
            if draft.status.is_none() {
                incoming.status = existing.status;
            }
            if draft.ease_factor.is_none() {
                incoming.ease_factor = existing.ease_factor;
            }
            if !existing.status.can_transition_to(incoming.status) {
                return Err(EngineError::validation(format!(
                    "illegal review transition for target {:?}",
                    draft.target_id
                )));
            }
        }
        entry_ids.push(incoming.id.as_str().to_string());
        match bucket.upsert_review_entry(incoming, scope.now)? {
            UpsertAction::Created => created += 1,
            UpsertAction::Updated => updated += 1,
            UpsertAction::Noop => noops += 1,
        }
    }

    let action = if created > 0 {
        UpsertAction::Created
    } else if updated > 0 {
        UpsertAction::Updated
    } else {
        UpsertAction::Noop
    };
    if action.is_mutation() {
        bucket.counters.record_mutation("review_schedule_update");
    }
    let observability = MemoryEngine::observability(&bucket, created + updated, 0, 0);
    if action.is_mutation() {
        engine.commit_bucket(scope, bucket);
    }

    let response = ReviewScheduleUpdateResponse {
        meta: ResponseMeta::new(
            "review_schedule_update",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            action,
            &scope.request_digest,
            observability,
        ),
        entry_ids,
        created,
        updated,
        noops,
    };
    to_value(&response)
}

// ============================================================================
// SECTION: Clock Sweep Handler
// ============================================================================

/// Handles the `review_schedule_clock` operation.
///
/// # Errors
///
/// Returns [`EngineError`] when the staged replacement fails.
pub(crate) fn review_schedule_clock(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: ReviewScheduleClockRequest = parse(request)?;
    let now = typed.now.unwrap_or(scope.now);

    let mut bucket = engine.stage_bucket(scope);
    let due_candidates: Vec<ReviewScheduleEntry> = bucket
        .review_schedules
        .values()
        .filter(|entry| entry.status == ReviewStatus::Scheduled && entry.due_at <= now)
        .cloned()
        .collect();

    let mut transitioned = Vec::new();
    let mut action = UpsertAction::Noop;
    for mut entry in due_candidates {
        entry.status = ReviewStatus::Due;
        entry.updated_at = now;
        transitioned.push(entry.id.as_str().to_string());
        action = action.combine(bucket.replace_review_entry(entry)?);
    }
    transitioned.sort();

    let due_count = u64::try_from(
        bucket
            .review_schedules
            .values()
            .filter(|entry| entry.status == ReviewStatus::Due)
            .count(),
    )
    .unwrap_or(u64::MAX);

    if action.is_mutation() {
        bucket.counters.record_mutation("review_schedule_clock");
    }
    let observability = MemoryEngine::observability(
        &bucket,
        u64::try_from(transitioned.len()).unwrap_or(u64::MAX),
        0,
        0,
    );
    if action.is_mutation() {
        engine.commit_bucket(scope, bucket);
    }

    let response = ReviewScheduleClockResponse {
        meta: ResponseMeta::new(
            "review_schedule_clock",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            action,
            &scope.request_digest,
            observability,
        ),
        now,
        transitioned,
        due_count,
    };
    to_value(&response)
}

// ============================================================================
// SECTION: Rebalance Handler
// ============================================================================

/// Handles the `review_set_rebalance` operation.
///
/// Entries are walked in `(dueAt asc, updatedAt desc, id asc)` order;
/// each UTC day accepts at most `maxDuePerDay` entries and overflow
/// moves to the next day with capacity, preserving interval and ease.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] when the cap is zero.
pub(crate) fn review_set_rebalance(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    let typed: ReviewSetRebalanceRequest = parse(request)?;
    let cap = typed.max_due_per_day.unwrap_or(DEFAULT_MAX_DUE_PER_DAY);
    if cap == 0 {
        return Err(EngineError::validation("maxDuePerDay must be >= 1"));
    }

    let mut bucket = engine.stage_bucket(scope);
    let walk: Vec<ReviewScheduleEntry> = bucket
        .list_review_entries(Some(usize::MAX))
        .into_iter()
        .filter(|entry| {
            matches!(entry.status, ReviewStatus::Scheduled | ReviewStatus::Due)
        })
        .cloned()
        .collect();

    let mut load: BTreeMap<i64, usize> = BTreeMap::new();
    let mut moved = Vec::new();
    let mut unchanged = 0_u64;
    let mut action = UpsertAction::Noop;

    for entry in walk {
        let origin_day = entry.due_at.utc_day();
        let mut day = origin_day;
        while load.get(&day).copied().unwrap_or(0) >= cap {
            day += 1;
        }
        *load.entry(day).or_insert(0) += 1;
        if day == origin_day {
            unchanged += 1;
            continue;
        }
        let mut shifted = entry.clone();
        shifted.due_at = entry.due_at.plus_days(day - origin_day);
        shifted.updated_at = scope.now;
        moved.push(RebalancedEntry {
            id: shifted.id.as_str().to_string(),
            from_due_at: entry.due_at,
            to_due_at: shifted.due_at,
        });
        action = action.combine(bucket.replace_review_entry(shifted)?);
    }

    if action.is_mutation() {
        bucket.counters.record_mutation("review_set_rebalance");
    }
    let observability = MemoryEngine::observability(
        &bucket,
        u64::try_from(moved.len()).unwrap_or(u64::MAX),
        0,
        0,
    );
    if action.is_mutation() {
        engine.commit_bucket(scope, bucket);
    }

    let response = ReviewSetRebalanceResponse {
        meta: ResponseMeta::new(
            "review_set_rebalance",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            action,
            &scope.request_digest,
            observability,
        ),
        moved,
        unchanged,
    };
    to_value(&response)
}
