// crates/ums-core/src/core/config.rs
// ============================================================================
// Module: UMS Engine Configuration
// Description: Deterministic configuration for guardrails, reflection, and ranking.
// Purpose: Give shells one serializable knob surface with stable defaults.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Engine configuration is plain data: every default is a deterministic
//! constant, so two engines constructed from the same configuration behave
//! identically. Shells load this from TOML or JSON and pass it in whole.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Guardrail Configuration
// ============================================================================

/// Byte, item, and safety budgets applied by the guardrail layer.
///
/// # Invariants
/// - All limits are enforced before any state write or recall response
///   leaves the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuardrailConfig {
    /// Maximum canonical byte size of one ingest payload.
    pub max_payload_bytes: usize,
    /// Maximum item count in a recall pack.
    pub max_recall_items: usize,
    /// Default token budget for recall packs when requests omit one.
    pub default_token_budget: usize,
    /// Maximum byte length of a curated statement.
    pub statement_max_bytes: usize,
    /// Maximum number of episodes summarized into one diary.
    pub max_working_episode_window: usize,
    /// Permits reads across stores named in a request allowlist.
    pub allow_cross_space_read: bool,
    /// Includes unsafe-flagged content in recall by default.
    pub include_unsafe: bool,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 262_144,
            max_recall_items: 20,
            default_token_budget: 2_048,
            statement_max_bytes: 2_048,
            max_working_episode_window: 50,
            allow_cross_space_read: false,
            include_unsafe: false,
        }
    }
}

// ============================================================================
// SECTION: Reflection Configuration
// ============================================================================

/// Candidate-generation knobs for the `reflect` operation.
///
/// # Invariants
/// - The canonical candidate generator depends only on these values and
///   the episode window, never on wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReflectConfig {
    /// Number of most-recent episodes scanned.
    pub window: usize,
    /// Minimum supporting episodes for a candidate token cluster.
    pub min_support: usize,
    /// Maximum candidates emitted per call.
    pub max_candidates: usize,
}

impl Default for ReflectConfig {
    fn default() -> Self {
        Self {
            window: 100,
            min_support: 3,
            max_candidates: 10,
        }
    }
}

// ============================================================================
// SECTION: Engine Configuration
// ============================================================================

/// Top-level engine configuration.
///
/// # Invariants
/// - `index_seed` participates in ranking tie-breakers; engines that must
///   rank identically must share it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Store used when requests omit `storeId`.
    pub default_store_id: String,
    /// Seed mixed into keyword-ranking tie-breakers.
    pub index_seed: String,
    /// Days before an unvalidated rule draws a freshness warning.
    pub freshness_days: i64,
    /// Guardrail budgets.
    pub guardrails: GuardrailConfig,
    /// Reflection knobs.
    pub reflect: ReflectConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_store_id: "default".to_string(),
            index_seed: "ums".to_string(),
            freshness_days: 30,
            guardrails: GuardrailConfig::default(),
            reflect: ReflectConfig::default(),
        }
    }
}
