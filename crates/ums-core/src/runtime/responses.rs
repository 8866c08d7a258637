// crates/ums-core/src/runtime/responses.rs
// ============================================================================
// Module: UMS Operation Responses
// Description: Closed response shapes with the shared response meta block.
// Purpose: Echo scope, action, and observability on every operation result.
// Dependencies: crate::core, crate::runtime::state, serde
// ============================================================================

//! ## Overview
//! Every response carries the same meta block: operation, resolved scope,
//! commit action, `deterministic: true`, the request digest, and
//! observability counters. All counts are derived from state, never from
//! wall-clock time, so identical requests produce identical responses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::config::GuardrailConfig;
use crate::core::rules::RuleCandidate;
use crate::core::time::Timestamp;
use crate::runtime::state::ProfileCounters;
use crate::runtime::state::UpsertAction;

// ============================================================================
// SECTION: Response Meta
// ============================================================================

/// Observability counters attached to every response.
///
/// # Invariants
/// - All values derive from bucket state and the executed delta.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observability {
    /// Entities in the bucket after the operation.
    pub bucket_entities: u64,
    /// Index documents derivable from the bucket.
    pub index_documents: u64,
    /// Entities mutated by this operation.
    pub mutations: u64,
    /// Redactions applied by this operation.
    pub redactions: u64,
    /// Unsafe-instruction flags raised by this operation.
    pub unsafe_flagged: u64,
}

/// Shared meta block on every successful response.
///
/// # Invariants
/// - `deterministic` is always `true`.
/// - `request_digest` is SHA-256 over the canonical normalized request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    /// Operation name as dispatched.
    pub operation: String,
    /// Resolved store identifier.
    pub store_id: String,
    /// Resolved profile name.
    pub profile: String,
    /// Commit action: `created`, `updated`, or `noop`.
    pub action: String,
    /// Always true: responses are pure functions of state and request.
    pub deterministic: bool,
    /// SHA-256 hex digest of the canonical normalized request.
    pub request_digest: String,
    /// Observability counters.
    pub observability: Observability,
}

impl ResponseMeta {
    /// Assembles a meta block.
    #[must_use]
    pub fn new(
        operation: &str,
        store_id: &str,
        profile: &str,
        action: UpsertAction,
        request_digest: &str,
        observability: Observability,
    ) -> Self {
        Self {
            operation: operation.to_string(),
            store_id: store_id.to_string(),
            profile: profile.to_string(),
            action: action.as_str().to_string(),
            deterministic: true,
            request_digest: request_digest.to_string(),
            observability,
        }
    }
}

// ============================================================================
// SECTION: Shared Views
// ============================================================================

/// Note describing one rejected batch element.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionNote {
    /// Zero-based index into the submitted batch.
    pub index: usize,
    /// Stable taxonomy code.
    pub code: String,
    /// Human-readable reason.
    pub message: String,
}

/// Recall view of a procedural rule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleView {
    /// Rule identifier.
    pub id: String,
    /// Rule statement.
    pub statement: String,
    /// Rule confidence.
    pub confidence: f64,
    /// Evidence episode identifiers.
    pub evidence_episode_ids: Vec<String>,
    /// Last mutation time.
    pub updated_at: Timestamp,
}

/// Recall view of an anti-pattern.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AntiPatternView {
    /// Anti-pattern identifier.
    pub id: String,
    /// Avoidance statement.
    pub statement: String,
    /// Anti-pattern confidence.
    pub confidence: f64,
    /// Evidence episode identifiers.
    pub evidence_episode_ids: Vec<String>,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Audit check result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// Check name.
    pub name: String,
    /// `pass` or `fail`.
    pub status: String,
    /// Findings; empty on pass.
    pub details: Vec<String>,
}

// ============================================================================
// SECTION: Ingest
// ============================================================================

/// Per-batch ingest statistics.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    /// Redactions applied across accepted events.
    pub redactions: u64,
    /// Events flagged by the unsafe-instruction filter.
    pub unsafe_flagged: u64,
    /// Accepted event counts per type.
    pub by_type: BTreeMap<String, u64>,
}

/// `ingest` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Newly appended events.
    pub accepted: u64,
    /// Events whose identifiers already existed with equal content.
    pub duplicates: u64,
    /// Events rejected by validation.
    pub rejected: u64,
    /// Identifiers of accepted episodes, in submission order.
    pub episode_ids: Vec<String>,
    /// Rejection details, in submission order.
    pub rejections: Vec<RejectionNote>,
    /// Batch statistics.
    pub stats: IngestStats,
}

// ============================================================================
// SECTION: Recall
// ============================================================================

/// One ranked match in a recall pack.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallMatch {
    /// Matched entity identifier.
    pub id: String,
    /// Entity family (`episode`, `rule`, `antiPattern`).
    pub kind: String,
    /// Total ranking score.
    pub score: f64,
    /// Matched text.
    pub snippet: String,
    /// Source entity creation time.
    pub created_at: Timestamp,
}

/// Bounded recall pack content measured against the token budget.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallPack {
    /// Ranked episode matches.
    pub matches: Vec<RecallMatch>,
    /// Combined bounded item list across entity families.
    pub items: Vec<RecallMatch>,
    /// Top active rules.
    pub top_rules: Vec<RuleView>,
    /// Anti-patterns.
    pub anti_patterns: Vec<AntiPatternView>,
    /// Evidence pointers backing the pack.
    pub evidence_pointers: Vec<String>,
    /// Freshness warnings.
    pub freshness: Vec<String>,
    /// Conflict notes.
    pub conflicts: Vec<String>,
}

/// `context` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Query echoed back.
    pub query: String,
    /// Recall pack content.
    #[serde(flatten)]
    pub pack: RecallPack,
    /// True when the pack was truncated to fit its budgets.
    pub truncated: bool,
    /// Approximate token estimate of the pack.
    pub estimated_tokens: usize,
}

/// Export playbook content.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Playbook {
    /// Top active rules.
    pub top_rules: Vec<RuleView>,
    /// Anti-patterns.
    pub anti_patterns: Vec<AntiPatternView>,
    /// Evidence pointers backing the playbook.
    pub evidence_pointers: Vec<String>,
    /// Entity counts per family.
    pub counts: BTreeMap<String, u64>,
}

/// `export` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Bounded playbook.
    pub playbook: Playbook,
    /// True when the playbook was truncated to fit its budget.
    pub truncated: bool,
    /// Approximate token estimate of the playbook.
    pub estimated_tokens: usize,
}

// ============================================================================
// SECTION: Distillation
// ============================================================================

/// `reflect` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Candidate rules with provisional confidence.
    pub candidates: Vec<RuleCandidate>,
    /// Episodes scanned by the generator.
    pub scanned_episodes: u64,
}

/// Validation result for one candidate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateValidation {
    /// Candidate statement.
    pub statement: String,
    /// True when every evidence pointer resolves and nothing
    /// contradicts.
    pub valid: bool,
    /// Evidence pointers that did not resolve in the bucket.
    pub missing_evidence: Vec<String>,
    /// Identifiers of existing rules the candidate contradicts.
    pub contradicts: Vec<String>,
}

/// `validate` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Per-candidate validation results, in submission order.
    pub results: Vec<CandidateValidation>,
    /// Count of valid candidates.
    pub valid_count: u64,
    /// Count of invalid candidates.
    pub invalid_count: u64,
}

/// Rejection reason for one curated candidate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRejection {
    /// Candidate statement.
    pub statement: String,
    /// Stable taxonomy code.
    pub code: String,
    /// Human-readable reason.
    pub message: String,
}

/// `curate` and `curate_guarded` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurateResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Identifiers of newly created rules.
    pub created: Vec<String>,
    /// Identifiers of updated rules.
    pub updated: Vec<String>,
    /// Identifiers whose merge produced no change.
    pub noops: Vec<String>,
    /// Rejected candidates with reasons.
    pub rejected: Vec<CandidateRejection>,
}

// ============================================================================
// SECTION: Feedback
// ============================================================================

/// `feedback` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Target rule identifier.
    pub rule_id: String,
    /// Confidence before reinforcement.
    pub previous_confidence: f64,
    /// Confidence after reinforcement.
    pub confidence: f64,
    /// Rule status after reinforcement.
    pub status: String,
    /// Anti-pattern produced by inversion, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anti_pattern_id: Option<String>,
    /// Signal episode recorded for provenance.
    pub signal_episode_id: String,
}

/// `outcome` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Task identifier echoed back.
    pub task_id: String,
    /// Outcome episode recorded for provenance.
    pub episode_id: String,
    /// Rules reinforced by the outcome.
    pub reinforced_rule_ids: Vec<String>,
    /// Implicit misconception signal, when produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub misconception_id: Option<String>,
    /// Anti-pattern artifacts emitted by harm escalation.
    pub anti_pattern_ids: Vec<String>,
}

// ============================================================================
// SECTION: Learner Identity
// ============================================================================

/// `learner_profile_update` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerProfileUpdateResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Learner profile identifier.
    pub profile_id: String,
    /// Learner identifier echoed back.
    pub learner_id: String,
    /// Profile version after the upsert.
    pub version: u64,
}

/// `identity_graph_update` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityGraphUpdateResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Edge identifiers, in submission order.
    pub edge_ids: Vec<String>,
    /// Edges created.
    pub created: u64,
    /// Edges updated.
    pub updated: u64,
    /// Edges unchanged.
    pub noops: u64,
}

// ============================================================================
// SECTION: Misconceptions
// ============================================================================

/// `misconception_update` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MisconceptionUpdateResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Misconception identifier.
    pub misconception_id: String,
    /// Status after the update.
    pub status: String,
    /// Confidence after the update.
    pub confidence: f64,
    /// Harmful signal count after the update.
    pub harmful_signal_count: u64,
    /// Correction signal count after the update.
    pub correction_signal_count: u64,
    /// Anti-pattern artifacts emitted by crossed thresholds.
    pub escalated_anti_pattern_ids: Vec<String>,
}

// ============================================================================
// SECTION: Planning
// ============================================================================

/// `curriculum_plan_update` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumPlanUpdateResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Item identifiers, in submission order.
    pub item_ids: Vec<String>,
    /// Items created.
    pub created: u64,
    /// Items updated.
    pub updated: u64,
    /// Items unchanged.
    pub noops: u64,
}

/// `review_schedule_update` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewScheduleUpdateResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Entry identifiers, in submission order.
    pub entry_ids: Vec<String>,
    /// Entries created.
    pub created: u64,
    /// Entries updated.
    pub updated: u64,
    /// Entries unchanged.
    pub noops: u64,
}

/// `review_schedule_clock` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewScheduleClockResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Evaluation instant used.
    pub now: Timestamp,
    /// Entries transitioned `scheduled -> due`.
    pub transitioned: Vec<String>,
    /// Entries in `due` status after the sweep.
    pub due_count: u64,
}

/// One rebalanced schedule entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalancedEntry {
    /// Entry identifier.
    pub id: String,
    /// Due time before rebalancing.
    pub from_due_at: Timestamp,
    /// Due time after rebalancing.
    pub to_due_at: Timestamp,
}

/// `review_set_rebalance` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSetRebalanceResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Entries whose due time moved.
    pub moved: Vec<RebalancedEntry>,
    /// Entries left in place.
    pub unchanged: u64,
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// `policy_decision_update` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDecisionUpdateResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Decision identifier.
    pub decision_id: String,
    /// Audit trail identifier.
    pub audit_id: String,
    /// Outcome after the upsert (escalation applied).
    pub outcome: String,
    /// Reason codes after the upsert.
    pub reason_codes: Vec<String>,
}

/// `recall_authorization` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallAuthorizationResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Policy key evaluated.
    pub policy_key: String,
    /// Evaluation outcome.
    pub outcome: String,
    /// Reason codes collected from considered decisions.
    pub reason_codes: Vec<String>,
    /// Decisions considered during evaluation.
    pub considered_decision_ids: Vec<String>,
    /// Decision recorded for this evaluation, when provenance allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_decision_id: Option<String>,
}

/// `tutor_degraded` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorDegradedResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// True when tutoring should run degraded.
    pub degraded: bool,
    /// Misconception keys excluded from tutoring.
    pub excluded_misconception_keys: Vec<String>,
    /// Decision recorded for this evaluation, when provenance allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<String>,
    /// Reason codes explaining the mode.
    pub reason_codes: Vec<String>,
}

/// Bounded view of one policy decision for exports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDecisionView {
    /// Decision identifier.
    pub id: String,
    /// Policy key.
    pub policy_key: String,
    /// Outcome.
    pub outcome: String,
    /// Reason codes.
    pub reason_codes: Vec<String>,
    /// Evaluation time.
    pub evaluated_at: Timestamp,
}

/// `policy_audit_export` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAuditExportResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Bounded policy decisions.
    pub decisions: Vec<PolicyDecisionView>,
    /// Audit check results.
    pub checks: Vec<CheckResult>,
    /// True when the export was truncated to fit its budget.
    pub truncated: bool,
    /// Approximate token estimate of the export.
    pub estimated_tokens: usize,
}

// ============================================================================
// SECTION: Diagnostics
// ============================================================================

/// `audit` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// Check results.
    pub checks: Vec<CheckResult>,
    /// `pass` when every check passed.
    pub status: String,
}

/// Index document counts per family.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSizes {
    /// Episode documents.
    pub episodes: u64,
    /// Rule documents (tombstoned rules excluded).
    pub rules: u64,
    /// Anti-pattern documents.
    pub anti_patterns: u64,
}

/// Engine-wide totals.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineTotals {
    /// Stores present in the tree.
    pub store_count: u64,
    /// Episodes across all buckets.
    pub event_count: u64,
}

/// `doctor` response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorResponse {
    /// Shared meta block.
    #[serde(flatten)]
    pub meta: ResponseMeta,
    /// `ok` when the bucket audit passes, `degraded` otherwise.
    pub status: String,
    /// Bucket counters.
    pub counters: ProfileCounters,
    /// Index document counts.
    pub index_sizes: IndexSizes,
    /// Guardrail configuration echo.
    pub guardrails: GuardrailConfig,
    /// Engine-wide totals.
    pub totals: EngineTotals,
}
