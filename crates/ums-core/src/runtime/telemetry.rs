// crates/ums-core/src/runtime/telemetry.rs
// ============================================================================
// Module: UMS Operation Telemetry
// Description: Observability hooks for operation dispatch.
// Purpose: Provide metric events without hard dependencies.
// Dependencies: none
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics surface for operation counters. It
//! is intentionally dependency-light so downstream deployments can plug
//! in Prometheus or OpenTelemetry without redesign. Events carry only
//! stable labels and byte sizes; payload content never reaches a sink.
//! Durations are a shell concern: the core reads no wall clock.

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Operation outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Operation committed or completed a read.
    Ok,
    /// Operation failed with a taxonomy error.
    Error,
}

impl OperationOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

// ============================================================================
// SECTION: Metric Events
// ============================================================================

/// Operation metric event payload.
///
/// # Invariants
/// - Optional fields are `None` when the metadata is unavailable.
#[derive(Debug, Clone)]
pub struct OperationMetricEvent {
    /// Operation name as dispatched.
    pub operation: String,
    /// Outcome classification.
    pub outcome: OperationOutcome,
    /// Commit action (`created`, `updated`, `noop`) for successes.
    pub action: Option<&'static str>,
    /// Stable taxonomy code for failures.
    pub error_code: Option<&'static str>,
    /// Request body size in canonical bytes.
    pub request_bytes: usize,
    /// Response body size in canonical bytes.
    pub response_bytes: usize,
}
