// crates/ums-core/src/runtime/requests.rs
// ============================================================================
// Module: UMS Operation Requests
// Description: Closed request shapes for every recognized operation.
// Purpose: Model each operation's input as a typed structure, not a dictionary.
// Dependencies: crate::core, serde, serde_json
// ============================================================================

//! ## Overview
//! Every operation's request is a closed shape deserialized from the
//! normalized request document. Scope fields (`storeId`, `profile`) are
//! resolved by the dispatcher before typed parsing, so these shapes
//! carry only operation payloads. Unknown top-level keys are ignored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::core::learner::IdentityRef;
use crate::core::learner::LearnerStatus;
use crate::core::planning::PlanStatus;
use crate::core::planning::PlanWindow;
use crate::core::planning::ReviewStatus;
use crate::core::policy::PolicyOutcome;
use crate::core::rules::RuleCandidate;
use crate::core::signals::MisconceptionStatus;
use crate::core::signals::SignalKind;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Ingest
// ============================================================================

/// Raw event draft accepted by `ingest`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraftWire {
    /// Caller-supplied identifier, when pre-computed.
    #[serde(default)]
    pub id: Option<String>,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event source system.
    #[serde(default)]
    pub source: Option<String>,
    /// Raw content (redacted during ingest).
    pub content: String,
    /// Optional structured payload.
    #[serde(default)]
    pub payload: Option<Value>,
    /// Optional caller metadata.
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Caller-supplied creation time.
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

/// Jira issue envelope accepted by `ingest`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraIssueWire {
    /// Issue key (e.g. `MEM-42`).
    pub key: String,
    /// Issue summary line.
    pub summary: String,
    /// Optional issue description.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional workflow status.
    #[serde(default)]
    pub status: Option<String>,
    /// Optional last-update time.
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

/// Chat message envelope accepted by `ingest`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageWire {
    /// Speaker role (e.g. `user`, `assistant`).
    pub role: String,
    /// Message content.
    pub content: String,
    /// Optional conversation identifier.
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Optional message time.
    #[serde(default)]
    pub at: Option<Timestamp>,
}

/// `ingest` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    /// Raw events.
    #[serde(default)]
    pub events: Vec<EventDraftWire>,
    /// Jira issue envelopes.
    #[serde(default)]
    pub jira_issues: Vec<JiraIssueWire>,
    /// Chat conversation envelopes.
    #[serde(default)]
    pub chat_messages: Vec<ChatMessageWire>,
}

// ============================================================================
// SECTION: Recall
// ============================================================================

/// `context` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRequest {
    /// Ranking query; empty lists everything.
    #[serde(default)]
    pub query: String,
    /// Maximum items in the recall pack.
    #[serde(default)]
    pub max_items: Option<usize>,
    /// Token budget for the recall pack.
    #[serde(default)]
    pub token_budget: Option<usize>,
    /// Includes unsafe-flagged content when true.
    #[serde(default)]
    pub include_unsafe: Option<bool>,
    /// Store to read when different from the request store.
    #[serde(default)]
    pub target_store_id: Option<String>,
    /// Cross-store allowlist.
    #[serde(default)]
    pub allow_stores: Vec<String>,
}

/// `export` and `policy_audit_export` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    /// Maximum items per playbook section.
    #[serde(default)]
    pub max_items: Option<usize>,
    /// Token budget for the export.
    #[serde(default)]
    pub token_budget: Option<usize>,
}

// ============================================================================
// SECTION: Distillation
// ============================================================================

/// `reflect` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectRequest {
    /// Episode window override.
    #[serde(default)]
    pub window: Option<usize>,
    /// Minimum support override.
    #[serde(default)]
    pub min_support: Option<usize>,
    /// Candidate cap override.
    #[serde(default)]
    pub max_candidates: Option<usize>,
}

/// `validate`, `curate`, and `curate_guarded` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatesRequest {
    /// Candidates under consideration.
    #[serde(default)]
    pub candidates: Vec<RuleCandidate>,
}

// ============================================================================
// SECTION: Feedback
// ============================================================================

/// `feedback` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    /// Target rule identifier.
    pub rule_id: String,
    /// Shorthand signal (`helpful` or `harmful`), one unit each.
    #[serde(default)]
    pub signal: Option<String>,
    /// Explicit helpful signal count.
    #[serde(default)]
    pub helpful_count: Option<u64>,
    /// Explicit harmful signal count.
    #[serde(default)]
    pub harmful_count: Option<u64>,
    /// Inverts the rule into an anti-pattern when true.
    #[serde(default)]
    pub invert: Option<bool>,
    /// Free-form reason recorded with the signal.
    #[serde(default)]
    pub reason: Option<String>,
}

/// `outcome` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRequest {
    /// Task identifier the outcome belongs to.
    pub task_id: String,
    /// Outcome status: `success` or `failure`.
    pub status: String,
    /// Rules applied during the task.
    #[serde(default)]
    pub used_rule_ids: Vec<String>,
    /// Free-form notes recorded with the outcome.
    #[serde(default)]
    pub notes: Option<String>,
    /// Misconception key implicated by a failure.
    #[serde(default)]
    pub misconception_key: Option<String>,
    /// Failure severity in `[0, 1]`.
    #[serde(default)]
    pub severity: Option<f64>,
}

// ============================================================================
// SECTION: Learner Identity
// ============================================================================

/// `learner_profile_update` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerProfileUpdateRequest {
    /// Learner identifier (semantic key).
    pub learner_id: String,
    /// Identity references.
    #[serde(default)]
    pub identity_refs: Vec<IdentityRef>,
    /// Learning goals.
    #[serde(default)]
    pub goals: Vec<String>,
    /// Interest tags.
    #[serde(default)]
    pub interest_tags: Vec<String>,
    /// Lifecycle status override.
    #[serde(default)]
    pub status: Option<LearnerStatus>,
    /// Version override.
    #[serde(default)]
    pub version: Option<u64>,
    /// Profile confidence override.
    #[serde(default)]
    pub profile_confidence: Option<f64>,
    /// Evidence event identifiers.
    #[serde(default)]
    pub evidence_event_ids: Vec<String>,
    /// Optional metadata.
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// One edge draft inside `identity_graph_update`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDraftWire {
    /// Edge relation.
    pub relation: crate::core::learner::EdgeRelation,
    /// Source reference.
    pub from_ref: String,
    /// Target reference.
    pub to_ref: String,
    /// Evidence event identifiers.
    #[serde(default)]
    pub evidence_event_ids: Vec<String>,
    /// Edge confidence.
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Optional metadata.
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// `identity_graph_update` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityGraphUpdateRequest {
    /// Learner profile scope; defaults to the request profile.
    #[serde(default)]
    pub profile_id: Option<String>,
    /// Edge drafts to upsert.
    #[serde(default)]
    pub edges: Vec<EdgeDraftWire>,
}

// ============================================================================
// SECTION: Misconceptions
// ============================================================================

/// `misconception_update` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MisconceptionUpdateRequest {
    /// Learner profile scope; defaults to the request profile.
    #[serde(default)]
    pub profile_id: Option<String>,
    /// Misconception semantic key.
    pub misconception_key: String,
    /// Signal kind for this update.
    #[serde(default)]
    pub signal: Option<SignalKind>,
    /// Harm severity in `[0, 1]`.
    #[serde(default)]
    pub severity: Option<f64>,
    /// Status override (resolved/suppressed transitions).
    #[serde(default)]
    pub status: Option<MisconceptionStatus>,
    /// Statement used for escalation anti-patterns.
    #[serde(default)]
    pub statement: Option<String>,
    /// Evidence event identifiers.
    #[serde(default)]
    pub evidence_event_ids: Vec<String>,
    /// Source signal identifiers.
    #[serde(default)]
    pub source_signal_ids: Vec<String>,
    /// Optional metadata.
    #[serde(default)]
    pub metadata: Option<Value>,
}

// ============================================================================
// SECTION: Planning
// ============================================================================

/// One item draft inside `curriculum_plan_update`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanItemWire {
    /// Objective identifier (semantic key).
    pub objective_id: String,
    /// Recommendation rank, 1-based.
    pub recommendation_rank: u64,
    /// Evidence event identifiers.
    #[serde(default)]
    pub evidence_event_ids: Vec<String>,
    /// Lifecycle status override.
    #[serde(default)]
    pub status: Option<PlanStatus>,
    /// Optional due time.
    #[serde(default)]
    pub due_at: Option<Timestamp>,
    /// Optional scheduling window.
    #[serde(default)]
    pub window: Option<PlanWindow>,
    /// Optional metadata.
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// `curriculum_plan_update` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumPlanUpdateRequest {
    /// Learner profile scope; defaults to the request profile.
    #[serde(default)]
    pub profile_id: Option<String>,
    /// Item drafts to upsert.
    #[serde(default)]
    pub items: Vec<PlanItemWire>,
}

/// One entry draft inside `review_schedule_update`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntryWire {
    /// Target entity identifier (semantic key).
    pub target_id: String,
    /// Lifecycle status override.
    #[serde(default)]
    pub status: Option<ReviewStatus>,
    /// Due time.
    pub due_at: Timestamp,
    /// Review interval in days.
    pub interval_days: u64,
    /// Spaced-repetition ease factor.
    #[serde(default)]
    pub ease_factor: Option<f64>,
    /// Provenance event identifiers.
    #[serde(default)]
    pub source_event_ids: Vec<String>,
    /// Optional metadata.
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// `review_schedule_update` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewScheduleUpdateRequest {
    /// Learner profile scope; defaults to the request profile.
    #[serde(default)]
    pub profile_id: Option<String>,
    /// Entry drafts to upsert.
    #[serde(default)]
    pub entries: Vec<ReviewEntryWire>,
}

/// `review_schedule_clock` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewScheduleClockRequest {
    /// Evaluation instant; defaults to the injected clock.
    #[serde(default)]
    pub now: Option<Timestamp>,
}

/// `review_set_rebalance` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSetRebalanceRequest {
    /// Maximum entries allowed per UTC day.
    #[serde(default)]
    pub max_due_per_day: Option<usize>,
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// `policy_decision_update` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDecisionUpdateRequest {
    /// Profile scope; defaults to the request profile.
    #[serde(default)]
    pub profile_id: Option<String>,
    /// Policy key the decision governs.
    pub policy_key: String,
    /// Authorization outcome.
    pub outcome: PolicyOutcome,
    /// Reason codes; required for `deny`.
    #[serde(default)]
    pub reason_codes: Vec<String>,
    /// Provenance event identifiers.
    #[serde(default)]
    pub provenance_event_ids: Vec<String>,
    /// Evaluation time override.
    #[serde(default)]
    pub evaluated_at: Option<Timestamp>,
    /// Optional metadata.
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// `recall_authorization` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallAuthorizationRequest {
    /// Policy key to evaluate; defaults to `recall`.
    #[serde(default)]
    pub policy_key: Option<String>,
    /// Requesting principal, recorded in reason codes.
    #[serde(default)]
    pub requester_id: Option<String>,
    /// Provenance for the recorded evaluation.
    #[serde(default)]
    pub provenance_event_ids: Vec<String>,
}

/// `tutor_degraded` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorDegradedRequest {
    /// Explicit degradation reason.
    #[serde(default)]
    pub reason: Option<String>,
    /// Provenance for the recorded decision.
    #[serde(default)]
    pub provenance_event_ids: Vec<String>,
}

// ============================================================================
// SECTION: Diagnostics
// ============================================================================

/// `audit` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRequest {
    /// Check names to run; empty runs all checks.
    #[serde(default)]
    pub checks: Vec<String>,
}

/// `doctor` request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRequest {
    /// Includes per-operation mutation counters when true.
    #[serde(default)]
    pub verbose: Option<bool>,
}
