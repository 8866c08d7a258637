// crates/ums-core/src/runtime/state.rs
// ============================================================================
// Module: UMS State Tree
// Description: Per-(store, profile) buckets, counters, and deterministic listings.
// Purpose: Own all engine state behind a single mutable access path.
// Dependencies: crate::core, crate::runtime::merge, serde
// ============================================================================

//! ## Overview
//! All engine state lives in one [`StateTree`]: a map of stores, each a
//! map of profiles, each a [`ProfileState`] bucket owning every entity
//! kind. Buckets are cloneable so handlers can stage a delta and commit
//! it atomically. Listings are deterministically ordered and every
//! comparator ends with `id asc`, making them total.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::episode::Episode;
use crate::core::errors::EngineError;
use crate::core::identifiers::AntiPatternId;
use crate::core::identifiers::CurriculumItemId;
use crate::core::identifiers::EpisodeId;
use crate::core::identifiers::IdentityEdgeId;
use crate::core::identifiers::LearnerProfileId;
use crate::core::identifiers::MisconceptionId;
use crate::core::identifiers::PolicyDecisionId;
use crate::core::identifiers::ProfileName;
use crate::core::identifiers::ReviewEntryId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::StoreId;
use crate::core::identifiers::WorkingEntryId;
use crate::core::learner::IdentityEdge;
use crate::core::learner::LearnerProfile;
use crate::core::planning::CurriculumPlanItem;
use crate::core::planning::ReviewScheduleEntry;
use crate::core::policy::PolicyDecision;
use crate::core::rules::AntiPattern;
use crate::core::rules::ProceduralRule;
use crate::core::signals::Misconception;
use crate::core::time::Timestamp;
use crate::core::working::WorkingEntry;
use crate::runtime::merge;
use crate::runtime::merge::canonical_eq;

// ============================================================================
// SECTION: Listing Defaults
// ============================================================================

/// Default listing limit for episodes.
pub const DEFAULT_EPISODE_LIMIT: usize = 100;
/// Default listing limit for rules, anti-patterns, and other entities.
pub const DEFAULT_ENTITY_LIMIT: usize = 50;

// ============================================================================
// SECTION: Upsert Actions
// ============================================================================

/// Outcome of one repository upsert.
///
/// # Invariants
/// - `Noop` means the merged record equals the existing record
///   byte-for-byte under canonical JSON; counters are untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    /// A new record was inserted.
    Created,
    /// An existing record was replaced by a differing merge.
    Updated,
    /// The merge produced no change.
    Noop,
}

impl UpsertAction {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Noop => "noop",
        }
    }

    /// Folds another action into an aggregate batch action.
    ///
    /// Any `Created` dominates; otherwise any `Updated`; else `Noop`.
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Created, _) | (_, Self::Created) => Self::Created,
            (Self::Updated, _) | (_, Self::Updated) => Self::Updated,
            (Self::Noop, Self::Noop) => Self::Noop,
        }
    }

    /// Reports whether the action mutated the bucket.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        !matches!(self, Self::Noop)
    }
}

// ============================================================================
// SECTION: Profile Counters
// ============================================================================

/// Delta-driven counters for one bucket.
///
/// # Invariants
/// - Counters change only when an operation commits a mutation, so
///   replaying a request stream leaves them untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileCounters {
    /// Episodes appended to the bucket.
    pub event_count: u64,
    /// Secret redactions applied across accepted episodes.
    pub redactions: u64,
    /// Episodes flagged by the unsafe-instruction filter.
    pub unsafe_flagged: u64,
    /// Committed mutations per operation name.
    pub mutations: BTreeMap<String, u64>,
}

impl ProfileCounters {
    /// Records a committed mutation for an operation.
    pub fn record_mutation(&mut self, operation: &str) {
        *self.mutations.entry(operation.to_string()).or_insert(0) += 1;
    }
}

// ============================================================================
// SECTION: Profile State
// ============================================================================

/// One `(store, profile)` bucket owning every entity kind.
///
/// # Invariants
/// - Entities are keyed by their content-addressed identifiers.
/// - The bucket exclusively owns its entities; reads hand out clones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileState {
    /// Append-only episodes.
    pub episodes: BTreeMap<EpisodeId, Episode>,
    /// Regenerable working entries.
    pub working: BTreeMap<WorkingEntryId, WorkingEntry>,
    /// Procedural rules.
    pub rules: BTreeMap<RuleId, ProceduralRule>,
    /// Anti-patterns.
    pub anti_patterns: BTreeMap<AntiPatternId, AntiPattern>,
    /// Learner profiles.
    pub learner_profiles: BTreeMap<LearnerProfileId, LearnerProfile>,
    /// Identity edges.
    pub identity_edges: BTreeMap<IdentityEdgeId, IdentityEdge>,
    /// Misconceptions.
    pub misconceptions: BTreeMap<MisconceptionId, Misconception>,
    /// Curriculum plan items.
    pub curriculum_items: BTreeMap<CurriculumItemId, CurriculumPlanItem>,
    /// Review schedule entries.
    pub review_schedules: BTreeMap<ReviewEntryId, ReviewScheduleEntry>,
    /// Policy decisions.
    pub policy_decisions: BTreeMap<PolicyDecisionId, PolicyDecision>,
    /// Delta-driven counters.
    pub counters: ProfileCounters,
}

impl ProfileState {
    /// Appends an episode, treating exact duplicates as noops.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Conflict`] when the identifier exists with
    /// different canonical content (append-only violation).
    pub fn append_episode(&mut self, episode: Episode) -> Result<UpsertAction, EngineError> {
        if let Some(existing) = self.episodes.get(&episode.id) {
            if canonical_eq(existing, &episode)? {
                return Ok(UpsertAction::Noop);
            }
            return Err(EngineError::conflict(format!(
                "episode {} already exists with different content",
                episode.id
            )));
        }
        self.counters.event_count += 1;
        self.counters.redactions += episode.redactions;
        if episode.unsafe_instruction {
            self.counters.unsafe_flagged += 1;
        }
        self.episodes.insert(episode.id.clone(), episode);
        Ok(UpsertAction::Created)
    }

    /// Upserts a working entry.
    ///
    /// Replays align onto the existing creation time, so regenerating
    /// an identical summary later is a noop.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when canonical comparison fails.
    pub fn upsert_working(
        &mut self,
        mut incoming: WorkingEntry,
    ) -> Result<UpsertAction, EngineError> {
        if let Some(existing) = self.working.get(&incoming.id) {
            incoming.created_at = existing.created_at;
            if canonical_eq(existing, &incoming)? {
                return Ok(UpsertAction::Noop);
            }
            self.working.insert(incoming.id.clone(), incoming);
            return Ok(UpsertAction::Updated);
        }
        self.working.insert(incoming.id.clone(), incoming);
        Ok(UpsertAction::Created)
    }

    /// Upserts a procedural rule via the deterministic merge.
    ///
    /// Incoming timestamps are aligned onto the existing record before
    /// merging; `updatedAt` advances to `now` only when the merge
    /// changes something, so replaying an identical request under a
    /// later clock stays a noop.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when canonical comparison fails.
    pub fn upsert_rule(
        &mut self,
        mut incoming: ProceduralRule,
        now: Timestamp,
    ) -> Result<UpsertAction, EngineError> {
        if let Some(existing) = self.rules.get(&incoming.id) {
            incoming.created_at = existing.created_at;
            incoming.updated_at = existing.updated_at;
            incoming.last_validated_at = existing.last_validated_at;
            let mut merged = merge::merge_rule(existing, &incoming);
            if canonical_eq(existing, &merged)? {
                return Ok(UpsertAction::Noop);
            }
            merged.updated_at = now;
            self.rules.insert(merged.id.clone(), merged);
            return Ok(UpsertAction::Updated);
        }
        self.rules.insert(incoming.id.clone(), incoming);
        Ok(UpsertAction::Created)
    }

    /// Replaces a rule wholesale (reinforcement path, same identifier).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when canonical comparison fails.
    pub fn replace_rule(&mut self, incoming: ProceduralRule) -> Result<UpsertAction, EngineError> {
        if let Some(existing) = self.rules.get(&incoming.id) {
            if canonical_eq(existing, &incoming)? {
                return Ok(UpsertAction::Noop);
            }
            self.rules.insert(incoming.id.clone(), incoming);
            return Ok(UpsertAction::Updated);
        }
        self.rules.insert(incoming.id.clone(), incoming);
        Ok(UpsertAction::Created)
    }

    /// Upserts an anti-pattern via the deterministic merge.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when canonical comparison fails.
    pub fn upsert_anti_pattern(
        &mut self,
        incoming: AntiPattern,
    ) -> Result<UpsertAction, EngineError> {
        if let Some(existing) = self.anti_patterns.get(&incoming.id) {
            let merged = merge::merge_anti_pattern(existing, &incoming);
            if canonical_eq(existing, &merged)? {
                return Ok(UpsertAction::Noop);
            }
            self.anti_patterns.insert(merged.id.clone(), merged);
            return Ok(UpsertAction::Updated);
        }
        self.anti_patterns.insert(incoming.id.clone(), incoming);
        Ok(UpsertAction::Created)
    }

    /// Upserts a learner profile via the deterministic merge.
    ///
    /// An incoming version of 0 means "unspecified": replays keep the
    /// existing version, and a real change bumps it by one. Explicit
    /// versions are monotone through the merge.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when canonical comparison fails.
    pub fn upsert_learner_profile(
        &mut self,
        mut incoming: LearnerProfile,
        now: Timestamp,
    ) -> Result<UpsertAction, EngineError> {
        if let Some(existing) = self.learner_profiles.get(&incoming.id) {
            incoming.created_at = existing.created_at;
            incoming.updated_at = existing.updated_at;
            if incoming.version == 0 {
                incoming.version = existing.version;
            }
            let mut merged = merge::merge_learner_profile(existing, &incoming);
            if canonical_eq(existing, &merged)? {
                return Ok(UpsertAction::Noop);
            }
            merged.updated_at = now;
            if merged.version == existing.version {
                merged.version = existing.version.saturating_add(1);
            }
            self.learner_profiles.insert(merged.id.clone(), merged);
            return Ok(UpsertAction::Updated);
        }
        if incoming.version == 0 {
            incoming.version = 1;
        }
        self.learner_profiles.insert(incoming.id.clone(), incoming);
        Ok(UpsertAction::Created)
    }

    /// Upserts an identity edge via the deterministic merge.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when canonical comparison fails.
    pub fn upsert_identity_edge(
        &mut self,
        incoming: IdentityEdge,
    ) -> Result<UpsertAction, EngineError> {
        if let Some(existing) = self.identity_edges.get(&incoming.id) {
            let merged = merge::merge_identity_edge(existing, &incoming);
            if canonical_eq(existing, &merged)? {
                return Ok(UpsertAction::Noop);
            }
            self.identity_edges.insert(merged.id.clone(), merged);
            return Ok(UpsertAction::Updated);
        }
        self.identity_edges.insert(incoming.id.clone(), incoming);
        Ok(UpsertAction::Created)
    }

    /// Upserts a misconception via the deterministic merge.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when canonical comparison fails.
    pub fn upsert_misconception(
        &mut self,
        incoming: Misconception,
    ) -> Result<UpsertAction, EngineError> {
        if let Some(existing) = self.misconceptions.get(&incoming.id) {
            let merged = merge::merge_misconception(existing, &incoming);
            if canonical_eq(existing, &merged)? {
                return Ok(UpsertAction::Noop);
            }
            self.misconceptions.insert(merged.id.clone(), merged);
            return Ok(UpsertAction::Updated);
        }
        self.misconceptions.insert(incoming.id.clone(), incoming);
        Ok(UpsertAction::Created)
    }

    /// Upserts a curriculum plan item via the deterministic merge.
    ///
    /// Incoming timestamps align onto the existing record; `updatedAt`
    /// advances only on real change.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when canonical comparison fails.
    pub fn upsert_curriculum_item(
        &mut self,
        mut incoming: CurriculumPlanItem,
        now: Timestamp,
    ) -> Result<UpsertAction, EngineError> {
        if let Some(existing) = self.curriculum_items.get(&incoming.id) {
            incoming.created_at = existing.created_at;
            incoming.updated_at = existing.updated_at;
            let mut merged = merge::merge_curriculum_item(existing, &incoming);
            if canonical_eq(existing, &merged)? {
                return Ok(UpsertAction::Noop);
            }
            merged.updated_at = now;
            self.curriculum_items.insert(merged.id.clone(), merged);
            return Ok(UpsertAction::Updated);
        }
        self.curriculum_items.insert(incoming.id.clone(), incoming);
        Ok(UpsertAction::Created)
    }

    /// Upserts a review schedule entry via the deterministic merge.
    ///
    /// Incoming timestamps align onto the existing record; `updatedAt`
    /// advances only on real change.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when canonical comparison fails.
    pub fn upsert_review_entry(
        &mut self,
        mut incoming: ReviewScheduleEntry,
        now: Timestamp,
    ) -> Result<UpsertAction, EngineError> {
        if let Some(existing) = self.review_schedules.get(&incoming.id) {
            incoming.created_at = existing.created_at;
            incoming.updated_at = existing.updated_at;
            let mut merged = merge::merge_review_entry(existing, &incoming);
            if canonical_eq(existing, &merged)? {
                return Ok(UpsertAction::Noop);
            }
            merged.updated_at = now;
            self.review_schedules.insert(merged.id.clone(), merged);
            return Ok(UpsertAction::Updated);
        }
        self.review_schedules.insert(incoming.id.clone(), incoming);
        Ok(UpsertAction::Created)
    }

    /// Replaces a review entry wholesale (clock and rebalance paths).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when canonical comparison fails.
    pub fn replace_review_entry(
        &mut self,
        incoming: ReviewScheduleEntry,
    ) -> Result<UpsertAction, EngineError> {
        if let Some(existing) = self.review_schedules.get(&incoming.id) {
            if canonical_eq(existing, &incoming)? {
                return Ok(UpsertAction::Noop);
            }
            self.review_schedules.insert(incoming.id.clone(), incoming);
            return Ok(UpsertAction::Updated);
        }
        self.review_schedules.insert(incoming.id.clone(), incoming);
        Ok(UpsertAction::Created)
    }

    /// Upserts a policy decision via the deterministic merge.
    ///
    /// Incoming `createdAt`/`updatedAt` align onto the existing record;
    /// callers resolve `evaluatedAt` explicitly before the upsert.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when canonical comparison fails.
    pub fn upsert_policy_decision(
        &mut self,
        mut incoming: PolicyDecision,
        now: Timestamp,
    ) -> Result<UpsertAction, EngineError> {
        if let Some(existing) = self.policy_decisions.get(&incoming.id) {
            incoming.created_at = existing.created_at;
            incoming.updated_at = existing.updated_at;
            let mut merged = merge::merge_policy_decision(existing, &incoming);
            if canonical_eq(existing, &merged)? {
                return Ok(UpsertAction::Noop);
            }
            merged.updated_at = now;
            self.policy_decisions.insert(merged.id.clone(), merged);
            return Ok(UpsertAction::Updated);
        }
        self.policy_decisions.insert(incoming.id.clone(), incoming);
        Ok(UpsertAction::Created)
    }

    /// Lists episodes by `(createdAt asc, id asc)`.
    #[must_use]
    pub fn list_episodes(&self, limit: Option<usize>) -> Vec<&Episode> {
        let mut out: Vec<&Episode> = self.episodes.values().collect();
        out.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        out.truncate(limit.unwrap_or(DEFAULT_EPISODE_LIMIT));
        out
    }

    /// Lists rules by `(updatedAt desc, id asc)`.
    #[must_use]
    pub fn list_rules(&self, limit: Option<usize>) -> Vec<&ProceduralRule> {
        let mut out: Vec<&ProceduralRule> = self.rules.values().collect();
        out.sort_by(|left, right| {
            right
                .updated_at
                .cmp(&left.updated_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        out.truncate(limit.unwrap_or(DEFAULT_ENTITY_LIMIT));
        out
    }

    /// Lists anti-patterns by `(createdAt desc, id asc)`.
    #[must_use]
    pub fn list_anti_patterns(&self, limit: Option<usize>) -> Vec<&AntiPattern> {
        let mut out: Vec<&AntiPattern> = self.anti_patterns.values().collect();
        out.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        out.truncate(limit.unwrap_or(DEFAULT_ENTITY_LIMIT));
        out
    }

    /// Lists curriculum items by `(rank asc, updatedAt desc, id asc)`.
    #[must_use]
    pub fn list_curriculum_items(&self, limit: Option<usize>) -> Vec<&CurriculumPlanItem> {
        let mut out: Vec<&CurriculumPlanItem> = self.curriculum_items.values().collect();
        out.sort_by(|left, right| {
            left.recommendation_rank
                .cmp(&right.recommendation_rank)
                .then_with(|| right.updated_at.cmp(&left.updated_at))
                .then_with(|| left.id.cmp(&right.id))
        });
        out.truncate(limit.unwrap_or(DEFAULT_ENTITY_LIMIT));
        out
    }

    /// Lists review entries by `(dueAt asc, updatedAt desc, id asc)`.
    #[must_use]
    pub fn list_review_entries(&self, limit: Option<usize>) -> Vec<&ReviewScheduleEntry> {
        let mut out: Vec<&ReviewScheduleEntry> = self.review_schedules.values().collect();
        out.sort_by(|left, right| {
            left.due_at
                .cmp(&right.due_at)
                .then_with(|| right.updated_at.cmp(&left.updated_at))
                .then_with(|| left.id.cmp(&right.id))
        });
        out.truncate(limit.unwrap_or(DEFAULT_ENTITY_LIMIT));
        out
    }

    /// Lists policy decisions by `(updatedAt desc, id asc)`.
    #[must_use]
    pub fn list_policy_decisions(&self, limit: Option<usize>) -> Vec<&PolicyDecision> {
        let mut out: Vec<&PolicyDecision> = self.policy_decisions.values().collect();
        out.sort_by(|left, right| {
            right
                .updated_at
                .cmp(&left.updated_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        out.truncate(limit.unwrap_or(DEFAULT_ENTITY_LIMIT));
        out
    }

    /// Returns the total number of entities in the bucket.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.episodes.len()
            + self.working.len()
            + self.rules.len()
            + self.anti_patterns.len()
            + self.learner_profiles.len()
            + self.identity_edges.len()
            + self.misconceptions.len()
            + self.curriculum_items.len()
            + self.review_schedules.len()
            + self.policy_decisions.len()
    }
}

// ============================================================================
// SECTION: State Tree
// ============================================================================

/// Top-level engine state: stores of profiles of buckets.
///
/// # Invariants
/// - No operation reads or writes across `storeId` boundaries except
///   through the guardrail-checked allowlist path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateTree {
    /// Store partitions.
    stores: BTreeMap<StoreId, BTreeMap<ProfileName, ProfileState>>,
}

impl StateTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all state.
    pub fn reset(&mut self) {
        self.stores.clear();
    }

    /// Returns the bucket for `(store, profile)`, creating it on first
    /// touch.
    pub fn bucket_mut(&mut self, store_id: &StoreId, profile: &ProfileName) -> &mut ProfileState {
        self.stores
            .entry(store_id.clone())
            .or_default()
            .entry(profile.clone())
            .or_default()
    }

    /// Returns the bucket for `(store, profile)` when it exists.
    #[must_use]
    pub fn bucket(&self, store_id: &StoreId, profile: &ProfileName) -> Option<&ProfileState> {
        self.stores.get(store_id).and_then(|profiles| profiles.get(profile))
    }

    /// Replaces a bucket wholesale (handler commit path).
    pub fn commit_bucket(
        &mut self,
        store_id: &StoreId,
        profile: &ProfileName,
        bucket: ProfileState,
    ) {
        self.stores
            .entry(store_id.clone())
            .or_default()
            .insert(profile.clone(), bucket);
    }

    /// Iterates stores in identifier order.
    pub fn stores(&self) -> impl Iterator<Item = (&StoreId, &BTreeMap<ProfileName, ProfileState>)> {
        self.stores.iter()
    }

    /// Returns the number of stores.
    #[must_use]
    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    /// Returns the total episode count across all buckets.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.stores
            .values()
            .flat_map(BTreeMap::values)
            .map(|bucket| bucket.counters.event_count)
            .sum()
    }
}
