// crates/ums-core/src/runtime/snapshot.rs
// ============================================================================
// Module: UMS Snapshots
// Description: Canonical import/export of the full engine state.
// Purpose: Provide the bit-exact persistence contract for shells.
// Dependencies: crate::core, crate::runtime::state, serde, serde_json
// ============================================================================

//! ## Overview
//! A snapshot is one JSON document: `schemaVersion`, a `stores` array
//! of `profiles` arrays of entity buckets, and engine totals. Arrays
//! are identifier-ordered and keys serialize sorted, so
//! `import(export(state)) == state` holds byte-for-byte. Legacy
//! documents with a top-level `spaces` array import under the default
//! store, one profile per space. Indices are never exported; they are
//! derived from entities on demand.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::episode::Episode;
use crate::core::errors::EngineError;
use crate::core::identifiers::ProfileName;
use crate::core::identifiers::StoreId;
use crate::core::learner::IdentityEdge;
use crate::core::learner::LearnerProfile;
use crate::core::planning::CurriculumPlanItem;
use crate::core::planning::ReviewScheduleEntry;
use crate::core::policy::PolicyDecision;
use crate::core::rules::AntiPattern;
use crate::core::rules::ProceduralRule;
use crate::core::signals::Misconception;
use crate::core::working::WorkingEntry;
use crate::runtime::state::ProfileCounters;
use crate::runtime::state::ProfileState;
use crate::runtime::state::StateTree;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current snapshot schema version.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

// ============================================================================
// SECTION: Snapshot Shapes
// ============================================================================

/// Full engine snapshot document.
///
/// # Invariants
/// - `stores` and their `profiles` are ordered by identifier.
/// - `totals` is derived from the buckets at export time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Schema version; always [`SNAPSHOT_SCHEMA_VERSION`].
    pub schema_version: u32,
    /// Store partitions.
    pub stores: Vec<StoreSnapshot>,
    /// Engine-wide totals.
    pub totals: SnapshotTotals,
}

/// One store partition within a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Store identifier.
    pub store_id: String,
    /// Profile buckets, ordered by profile name.
    pub profiles: Vec<ProfileSnapshot>,
}

/// One profile bucket within a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    /// Profile name.
    pub profile: String,
    /// Episodes, identifier-ordered.
    #[serde(default)]
    pub episodes: Vec<Episode>,
    /// Working entries, identifier-ordered.
    #[serde(default)]
    pub working: Vec<WorkingEntry>,
    /// Procedural rules, identifier-ordered.
    #[serde(default)]
    pub rules: Vec<ProceduralRule>,
    /// Anti-patterns, identifier-ordered.
    #[serde(default)]
    pub anti_patterns: Vec<AntiPattern>,
    /// Learner profiles, identifier-ordered.
    #[serde(default)]
    pub learner_profiles: Vec<LearnerProfile>,
    /// Identity edges, identifier-ordered.
    #[serde(default)]
    pub identity_edges: Vec<IdentityEdge>,
    /// Misconceptions, identifier-ordered.
    #[serde(default)]
    pub misconceptions: Vec<Misconception>,
    /// Curriculum items, identifier-ordered.
    #[serde(default)]
    pub curriculum_items: Vec<CurriculumPlanItem>,
    /// Review schedule entries, identifier-ordered.
    #[serde(default)]
    pub review_schedules: Vec<ReviewScheduleEntry>,
    /// Policy decisions, identifier-ordered.
    #[serde(default)]
    pub policy_decisions: Vec<PolicyDecision>,
    /// Bucket counters.
    #[serde(default)]
    pub counters: ProfileCounters,
}

/// Engine-wide totals recorded in a snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotTotals {
    /// Stores present in the tree.
    pub store_count: u64,
    /// Episodes across all buckets.
    pub event_count: u64,
}

/// Legacy bucket shape: a top-level `spaces` array predating the
/// store/profile split.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySpace {
    /// Space name; becomes the profile under the default store.
    space: String,
    /// Episodes.
    #[serde(default)]
    episodes: Vec<Episode>,
    /// Working entries.
    #[serde(default)]
    working: Vec<WorkingEntry>,
    /// Procedural rules.
    #[serde(default)]
    rules: Vec<ProceduralRule>,
    /// Anti-patterns.
    #[serde(default)]
    anti_patterns: Vec<AntiPattern>,
    /// Learner profiles.
    #[serde(default)]
    learner_profiles: Vec<LearnerProfile>,
    /// Identity edges.
    #[serde(default)]
    identity_edges: Vec<IdentityEdge>,
    /// Misconceptions.
    #[serde(default)]
    misconceptions: Vec<Misconception>,
    /// Curriculum items.
    #[serde(default)]
    curriculum_items: Vec<CurriculumPlanItem>,
    /// Review schedule entries.
    #[serde(default)]
    review_schedules: Vec<ReviewScheduleEntry>,
    /// Policy decisions.
    #[serde(default)]
    policy_decisions: Vec<PolicyDecision>,
    /// Bucket counters.
    #[serde(default)]
    counters: ProfileCounters,
}

/// Legacy snapshot document.
#[derive(Debug, Clone, Deserialize)]
struct LegacySnapshot {
    /// Space buckets.
    spaces: Vec<LegacySpace>,
}

// ============================================================================
// SECTION: Export
// ============================================================================

/// Exports the state tree as a snapshot document.
///
/// # Errors
///
/// Returns [`EngineError::ContractViolation`] when serialization fails.
pub fn export_state(state: &StateTree) -> Result<Value, EngineError> {
    let mut stores = Vec::new();
    for (store_id, profiles) in state.stores() {
        let mut profile_snapshots = Vec::new();
        for (profile, bucket) in profiles {
            profile_snapshots.push(ProfileSnapshot {
                profile: profile.as_str().to_string(),
                episodes: bucket.episodes.values().cloned().collect(),
                working: bucket.working.values().cloned().collect(),
                rules: bucket.rules.values().cloned().collect(),
                anti_patterns: bucket.anti_patterns.values().cloned().collect(),
                learner_profiles: bucket.learner_profiles.values().cloned().collect(),
                identity_edges: bucket.identity_edges.values().cloned().collect(),
                misconceptions: bucket.misconceptions.values().cloned().collect(),
                curriculum_items: bucket.curriculum_items.values().cloned().collect(),
                review_schedules: bucket.review_schedules.values().cloned().collect(),
                policy_decisions: bucket.policy_decisions.values().cloned().collect(),
                counters: bucket.counters.clone(),
            });
        }
        stores.push(StoreSnapshot {
            store_id: store_id.as_str().to_string(),
            profiles: profile_snapshots,
        });
    }
    let snapshot = Snapshot {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        stores,
        totals: SnapshotTotals {
            store_count: u64::try_from(state.store_count()).unwrap_or(u64::MAX),
            event_count: state.event_count(),
        },
    };
    serde_json::to_value(&snapshot)
        .map_err(|err| EngineError::contract(format!("snapshot export failed: {err}")))
}

// ============================================================================
// SECTION: Import
// ============================================================================

/// Fills one bucket from its snapshot arrays.
fn fill_bucket(bucket: &mut ProfileState, profile: ProfileSnapshot) {
    for episode in profile.episodes {
        bucket.episodes.insert(episode.id.clone(), episode);
    }
    for entry in profile.working {
        bucket.working.insert(entry.id.clone(), entry);
    }
    for rule in profile.rules {
        bucket.rules.insert(rule.id.clone(), rule);
    }
    for anti in profile.anti_patterns {
        bucket.anti_patterns.insert(anti.id.clone(), anti);
    }
    for learner in profile.learner_profiles {
        bucket.learner_profiles.insert(learner.id.clone(), learner);
    }
    for edge in profile.identity_edges {
        bucket.identity_edges.insert(edge.id.clone(), edge);
    }
    for misconception in profile.misconceptions {
        bucket.misconceptions.insert(misconception.id.clone(), misconception);
    }
    for item in profile.curriculum_items {
        bucket.curriculum_items.insert(item.id.clone(), item);
    }
    for entry in profile.review_schedules {
        bucket.review_schedules.insert(entry.id.clone(), entry);
    }
    for decision in profile.policy_decisions {
        bucket.policy_decisions.insert(decision.id.clone(), decision);
    }
    bucket.counters = profile.counters;
}

/// Imports a snapshot document into a fresh state tree.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] for malformed documents or an
/// unsupported schema version.
pub fn import_state(document: &Value) -> Result<StateTree, EngineError> {
    let mut tree = StateTree::new();

    // Legacy documents predate the store dimension entirely.
    if document.get("spaces").is_some() {
        let legacy: LegacySnapshot = serde_json::from_value(document.clone())
            .map_err(|err| EngineError::validation(format!("malformed legacy snapshot: {err}")))?;
        let store_id = StoreId::default_store();
        for space in legacy.spaces {
            let Some(profile) = ProfileName::new(space.space.clone()) else {
                return Err(EngineError::validation("legacy space name must not be empty"));
            };
            let bucket = tree.bucket_mut(&store_id, &profile);
            fill_bucket(
                bucket,
                ProfileSnapshot {
                    profile: space.space,
                    episodes: space.episodes,
                    working: space.working,
                    rules: space.rules,
                    anti_patterns: space.anti_patterns,
                    learner_profiles: space.learner_profiles,
                    identity_edges: space.identity_edges,
                    misconceptions: space.misconceptions,
                    curriculum_items: space.curriculum_items,
                    review_schedules: space.review_schedules,
                    policy_decisions: space.policy_decisions,
                    counters: space.counters,
                },
            );
        }
        return Ok(tree);
    }

    let snapshot: Snapshot = serde_json::from_value(document.clone())
        .map_err(|err| EngineError::validation(format!("malformed snapshot: {err}")))?;
    if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
        return Err(EngineError::validation(format!(
            "unsupported snapshot schemaVersion {}",
            snapshot.schema_version
        )));
    }
    for store in snapshot.stores {
        let store_id = StoreId::new(store.store_id);
        for profile_snapshot in store.profiles {
            let Some(profile) = ProfileName::new(profile_snapshot.profile.clone()) else {
                return Err(EngineError::validation("snapshot profile must not be empty"));
            };
            let bucket = tree.bucket_mut(&store_id, &profile);
            fill_bucket(bucket, profile_snapshot);
        }
    }
    Ok(tree)
}
