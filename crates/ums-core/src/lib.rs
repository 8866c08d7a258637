// crates/ums-core/src/lib.rs
// ============================================================================
// Module: UMS Core
// Description: Deterministic, replay-safe memory operation engine.
// Purpose: Execute every UMS domain operation over in-memory buckets.
// Dependencies: regex, serde, serde_jcs, serde_json, sha2, thiserror, time
// ============================================================================

//! ## Overview
//! `ums-core` is the core of the Universal Memory System: a
//! single-threaded deterministic state machine executing every domain
//! operation (`ingest`, `context`, `reflect`, `curate`, feedback and
//! planning upserts, policy evaluation, audit, export, doctor) over
//! per-(store, profile) buckets with content-addressed identifiers,
//! bounded payloads, isolation guardrails, and a serializable snapshot
//! contract. The crate performs no I/O; persistence, locking, and
//! transport live in the shells around it.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Deterministic primitives, identifiers, and entity factories.
pub mod core;
/// Contract surfaces for shells (snapshot stores, metrics sinks).
pub mod interfaces;
/// The operation engine and its runtime services.
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::config::EngineConfig;
pub use crate::core::config::GuardrailConfig;
pub use crate::core::config::ReflectConfig;
pub use crate::core::errors::EngineError;
pub use crate::core::hashing::HashAlgorithm;
pub use crate::core::hashing::HashDigest;
pub use crate::core::identifiers::ProfileName;
pub use crate::core::identifiers::StoreId;
pub use crate::core::time::Clock;
pub use crate::core::time::FixedClock;
pub use crate::core::time::SystemClock;
pub use crate::core::time::Timestamp;
pub use crate::interfaces::MetricsSink;
pub use crate::interfaces::NullMetricsSink;
pub use crate::interfaces::SnapshotStore;
pub use crate::interfaces::SnapshotStoreError;
pub use crate::runtime::engine::MemoryEngine;
pub use crate::runtime::snapshot::SNAPSHOT_SCHEMA_VERSION;
pub use crate::runtime::snapshot::Snapshot;
