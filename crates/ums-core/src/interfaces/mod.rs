// crates/ums-core/src/interfaces/mod.rs
// ============================================================================
// Module: UMS Interfaces
// Description: Backend-agnostic interfaces for snapshot persistence and metrics.
// Purpose: Define the contract surfaces used by shells around the core engine.
// Dependencies: crate::runtime::telemetry, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The core engine performs no I/O. Shells persist engine state through
//! [`SnapshotStore`] and observe operations through [`MetricsSink`].
//! Implementations must be deterministic from the engine's perspective:
//! a load must return exactly what the previous save wrote.
//!
//! Locking is a shell responsibility. Callers must hold an exclusive
//! advisory lock on the snapshot location for the full read-modify-write
//! of one operation; the core assumes single-writer access.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::runtime::telemetry::OperationMetricEvent;

// ============================================================================
// SECTION: Snapshot Store
// ============================================================================

/// Snapshot store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SnapshotStoreError {
    /// Store I/O error.
    #[error("snapshot store io error: {0}")]
    Io(String),
    /// Stored snapshot is corrupted or fails integrity checks.
    #[error("snapshot store corruption: {0}")]
    Corrupt(String),
    /// The exclusive advisory lock could not be acquired or released.
    #[error("snapshot store lock error: {0}")]
    Lock(String),
}

/// Snapshot persistence used by shells between engine invocations.
pub trait SnapshotStore {
    /// Loads the last saved snapshot document, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotStoreError`] when loading fails.
    fn load(&self) -> Result<Option<Value>, SnapshotStoreError>;

    /// Saves a snapshot document, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotStoreError`] when saving fails.
    fn save(&self, snapshot: &Value) -> Result<(), SnapshotStoreError>;

    /// Reports store readiness for liveness probes.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotStoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), SnapshotStoreError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Metrics Sink
// ============================================================================

/// Observer for per-operation metric events.
///
/// Implementations must not fail; telemetry never affects operation
/// outcomes.
pub trait MetricsSink: Send + Sync {
    /// Records one operation metric event.
    fn record(&self, event: &OperationMetricEvent);
}

/// Sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMetricsSink;

impl MetricsSink for NullMetricsSink {
    fn record(&self, _event: &OperationMetricEvent) {}
}
