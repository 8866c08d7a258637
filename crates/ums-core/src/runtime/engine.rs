// crates/ums-core/src/runtime/engine.rs
// ============================================================================
// Module: UMS Memory Engine
// Description: Single-threaded deterministic operation dispatcher.
// Purpose: Normalize requests, dispatch handlers, and own the state tree.
// Dependencies: crate::core, crate::interfaces, crate::runtime, serde_json
// ============================================================================

//! ## Overview
//! The engine is the single public entry point: `execute` runs one
//! operation to completion on the calling context with no suspension
//! points and no I/O. Requests are normalized (store default, trimmed
//! profile, canonical digest) before dispatch; handlers stage their
//! delta on a cloned bucket and commit it atomically, so a failure
//! leaves no partial mutation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;

use crate::core::config::EngineConfig;
use crate::core::errors::EngineError;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::canonical_byte_len;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::ProfileName;
use crate::core::identifiers::StoreId;
use crate::core::time::Clock;
use crate::core::time::SystemClock;
use crate::core::time::Timestamp;
use crate::interfaces::MetricsSink;
use crate::interfaces::NullMetricsSink;
use crate::runtime::index::documents_for_bucket;
use crate::runtime::ops;
use crate::runtime::responses::Observability;
use crate::runtime::snapshot;
use crate::runtime::state::ProfileState;
use crate::runtime::state::StateTree;
use crate::runtime::telemetry::OperationMetricEvent;
use crate::runtime::telemetry::OperationOutcome;

// ============================================================================
// SECTION: Request Scope
// ============================================================================

/// Resolved scope for one operation call.
///
/// # Invariants
/// - `request_digest` is SHA-256 over the canonical normalized request.
/// - `now` comes from the injected clock and never enters identifier
///   fingerprints unless the caller supplied it.
#[derive(Debug, Clone)]
pub struct RequestScope {
    /// Resolved store.
    pub store_id: StoreId,
    /// Resolved profile.
    pub profile: ProfileName,
    /// Canonical request digest.
    pub request_digest: String,
    /// Injected current time.
    pub now: Timestamp,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// The deterministic operation engine.
///
/// # Invariants
/// - Single-threaded and cooperative: operations are atomic from the
///   caller's perspective.
/// - Replay of the same ordered request stream from an empty state
///   produces byte-identical snapshots.
pub struct MemoryEngine {
    /// Engine configuration.
    pub(crate) config: EngineConfig,
    /// Injected clock service.
    pub(crate) clock: Arc<dyn Clock>,
    /// Metrics observer.
    metrics: Arc<dyn MetricsSink>,
    /// Owned state tree.
    pub(crate) state: StateTree,
}

impl MemoryEngine {
    /// Creates an engine with the system clock and no metrics sink.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_services(config, Arc::new(SystemClock), Arc::new(NullMetricsSink))
    }

    /// Creates an engine with injected clock and metrics services.
    #[must_use]
    pub fn with_services(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            config,
            clock,
            metrics,
            state: StateTree::new(),
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Clears all engine state.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Executes one operation, returning the typed response as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] for any taxonomy failure; the state tree
    /// is unchanged on error.
    pub fn execute(&mut self, operation: &str, request: &Value) -> Result<Value, EngineError> {
        let (normalized, scope) = self.normalize(request)?;
        ops::dispatch(self, operation, &scope, normalized)
    }

    /// Executes one operation and formats the boundary envelope.
    ///
    /// Success returns the response object as-is; failure returns
    /// `{ok:false, error:{code, message, details}}`.
    pub fn execute_envelope(&mut self, operation: &str, request: &Value) -> Value {
        let request_bytes = canonical_byte_len(request).unwrap_or(0);
        match self.execute(operation, request) {
            Ok(response) => {
                let action = response
                    .get("action")
                    .and_then(Value::as_str)
                    .map(action_label);
                self.metrics.record(&OperationMetricEvent {
                    operation: operation.to_string(),
                    outcome: OperationOutcome::Ok,
                    action,
                    error_code: None,
                    request_bytes,
                    response_bytes: canonical_byte_len(&response).unwrap_or(0),
                });
                response
            }
            Err(err) => {
                let envelope = err.to_envelope();
                self.metrics.record(&OperationMetricEvent {
                    operation: operation.to_string(),
                    outcome: OperationOutcome::Error,
                    action: None,
                    error_code: Some(err.code()),
                    request_bytes,
                    response_bytes: canonical_byte_len(&envelope).unwrap_or(0),
                });
                envelope
            }
        }
    }

    /// Exports the full engine state as a canonical snapshot document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when serialization fails.
    pub fn snapshot_export(&self) -> Result<Value, EngineError> {
        snapshot::export_state(&self.state)
    }

    /// Imports a snapshot document, replacing all engine state.
    ///
    /// Legacy documents with a top-level `spaces` array import under
    /// the default store.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the document is malformed.
    pub fn snapshot_import(&mut self, document: &Value) -> Result<(), EngineError> {
        self.state = snapshot::import_state(document)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Normalization
    // ------------------------------------------------------------------

    /// Normalizes a request document and resolves its scope.
    fn normalize(&self, request: &Value) -> Result<(Value, RequestScope), EngineError> {
        let Some(fields) = request.as_object() else {
            return Err(EngineError::validation("request must be a JSON object"));
        };
        let mut normalized: Map<String, Value> = fields.clone();

        let store_id = match normalized.get("storeId") {
            None | Some(Value::Null) => StoreId::new(self.config.default_store_id.clone()),
            Some(Value::String(raw)) => StoreId::new(raw.clone()),
            Some(_) => {
                return Err(EngineError::validation("storeId must be a string"));
            }
        };
        normalized.insert("storeId".to_string(), Value::String(store_id.as_str().to_string()));

        let profile = match normalized.get("profile") {
            Some(Value::String(raw)) => ProfileName::new(raw.clone())
                .ok_or_else(|| EngineError::validation("profile must not be empty"))?,
            _ => {
                return Err(EngineError::validation("profile is required"));
            }
        };
        normalized.insert("profile".to_string(), Value::String(profile.as_str().to_string()));

        let normalized = Value::Object(normalized);
        let digest = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &normalized)?;
        let scope = RequestScope {
            store_id,
            profile,
            request_digest: digest.value,
            now: self.clock.now(),
        };
        Ok((normalized, scope))
    }

    // ------------------------------------------------------------------
    // Handler support
    // ------------------------------------------------------------------

    /// Returns a cloned bucket for staging, empty when absent.
    #[must_use]
    pub(crate) fn stage_bucket(&self, scope: &RequestScope) -> ProfileState {
        self.state
            .bucket(&scope.store_id, &scope.profile)
            .cloned()
            .unwrap_or_default()
    }

    /// Commits a staged bucket.
    pub(crate) fn commit_bucket(&mut self, scope: &RequestScope, bucket: ProfileState) {
        self.state.commit_bucket(&scope.store_id, &scope.profile, bucket);
    }

    /// Assembles observability counters for a bucket and delta.
    #[must_use]
    pub(crate) fn observability(
        bucket: &ProfileState,
        mutations: u64,
        redactions: u64,
        unsafe_flagged: u64,
    ) -> Observability {
        Observability {
            bucket_entities: u64::try_from(bucket.entity_count()).unwrap_or(u64::MAX),
            index_documents: u64::try_from(documents_for_bucket(bucket).len()).unwrap_or(u64::MAX),
            mutations,
            redactions,
            unsafe_flagged,
        }
    }
}

/// Maps a response action string onto a stable telemetry label.
fn action_label(action: &str) -> &'static str {
    match action {
        "created" => "created",
        "updated" => "updated",
        _ => "noop",
    }
}
