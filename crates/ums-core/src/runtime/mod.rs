// crates/ums-core/src/runtime/mod.rs
// ============================================================================
// Module: UMS Runtime
// Description: The operation engine: state, merges, ranking, guardrails.
// Purpose: Execute every domain operation deterministically over buckets.
// Dependencies: crate submodules
// ============================================================================

//! ## Overview
//! The runtime owns the state tree and everything that mutates it: the
//! dispatcher, per-operation handlers, merge rules, the keyword index,
//! guardrails, memory models, snapshots, and telemetry.

/// The deterministic operation dispatcher.
pub mod engine;
/// Byte budgets, redaction, unsafe filtering, isolation.
pub mod guardrails;
/// Keyword index and deterministic ranking.
pub mod index;
/// Per-entity deterministic merge functions.
pub mod merge;
/// Diary/digest builders and confidence formulas.
pub mod models;
/// Operation handlers.
pub mod ops;
/// Typed request shapes.
pub mod requests;
/// Typed response shapes.
pub mod responses;
/// Canonical snapshot import/export.
pub mod snapshot;
/// Per-(store, profile) buckets and counters.
pub mod state;
/// Dependency-light operation metrics.
pub mod telemetry;
