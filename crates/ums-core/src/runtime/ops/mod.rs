// crates/ums-core/src/runtime/ops/mod.rs
// ============================================================================
// Module: UMS Operation Handlers
// Description: One handler per recognized operation plus the dispatch table.
// Purpose: Route normalized requests to their typed handlers.
// Dependencies: crate::runtime::engine, serde, serde_json
// ============================================================================

//! ## Overview
//! Each handler performs the same four steps: typed parse, validation,
//! staged bucket mutation, and deterministic response assembly. Unknown
//! operation names fail with `VALIDATION_FAILED` and the stable message
//! `Unsupported operation`.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Invariant sweeps and engine diagnostics.
pub mod audit;
/// Candidate distillation: reflect, validate, curate.
pub mod distill;
/// Rule reinforcement and task outcomes.
pub mod feedback;
/// Event ingestion.
pub mod ingest;
/// Learner profile and identity graph upserts.
pub mod learner;
/// Misconception signal processing.
pub mod misconception;
/// Curriculum and review schedule operations.
pub mod planning;
/// Policy decisions and authorization evaluations.
pub mod policy;
/// Recall packs and playbook export.
pub mod recall;

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;

use crate::core::errors::EngineError;
use crate::runtime::engine::MemoryEngine;
use crate::runtime::engine::RequestScope;

// ============================================================================
// SECTION: Handler Support
// ============================================================================

/// Parses the normalized request into an operation shape.
pub(crate) fn parse<T: DeserializeOwned>(request: &Value) -> Result<T, EngineError> {
    serde_json::from_value(request.clone())
        .map_err(|err| EngineError::validation(format!("malformed request: {err}")))
}

/// Serializes a typed response back into JSON.
pub(crate) fn to_value<T: Serialize>(response: &T) -> Result<Value, EngineError> {
    serde_json::to_value(response)
        .map_err(|err| EngineError::contract(format!("response serialization failed: {err}")))
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Routes one normalized request to its handler.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] with message
/// `Unsupported operation` for unknown names, or whatever taxonomy
/// error the handler raises.
pub(crate) fn dispatch(
    engine: &mut MemoryEngine,
    operation: &str,
    scope: &RequestScope,
    request: Value,
) -> Result<Value, EngineError> {
    match operation {
        "ingest" => ingest::ingest(engine, scope, &request),
        "context" => recall::context(engine, scope, &request),
        "reflect" => distill::reflect(engine, scope, &request),
        "validate" => distill::validate(engine, scope, &request),
        "curate" => distill::curate(engine, scope, &request, false),
        "curate_guarded" => distill::curate(engine, scope, &request, true),
        "feedback" => feedback::feedback(engine, scope, &request),
        "outcome" => feedback::outcome(engine, scope, &request),
        "audit" => audit::audit(engine, scope, &request),
        "export" => recall::export(engine, scope, &request),
        "doctor" => audit::doctor(engine, scope, &request),
        "learner_profile_update" => learner::learner_profile_update(engine, scope, &request),
        "identity_graph_update" => learner::identity_graph_update(engine, scope, &request),
        "misconception_update" => misconception::misconception_update(engine, scope, &request),
        "curriculum_plan_update" => planning::curriculum_plan_update(engine, scope, &request),
        "review_schedule_update" => planning::review_schedule_update(engine, scope, &request),
        "review_schedule_clock" => planning::review_schedule_clock(engine, scope, &request),
        "review_set_rebalance" => planning::review_set_rebalance(engine, scope, &request),
        "policy_decision_update" => policy::policy_decision_update(engine, scope, &request),
        "recall_authorization" => policy::recall_authorization(engine, scope, &request),
        "tutor_degraded" => policy::tutor_degraded(engine, scope, &request),
        "policy_audit_export" => policy::policy_audit_export(engine, scope, &request),
        unknown => Err(EngineError::validation_with(
            "Unsupported operation",
            json!({ "operation": unknown }),
        )),
    }
}
