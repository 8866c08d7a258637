// crates/ums-core/src/runtime/guardrails.rs
// ============================================================================
// Module: UMS Guardrails
// Description: Byte budgets, secret redaction, unsafe filtering, isolation.
// Purpose: Keep every write and recall response within policy bounds.
// Dependencies: crate::core, regex, serde, serde_json
// ============================================================================

//! ## Overview
//! Guardrails run before state writes and before recall responses leave
//! the engine. Failures are reported, never retried. Redaction patterns
//! are heuristic by design: common API-key shapes, bearer/JWT tokens,
//! and long hex strings. Widening them is a shell policy decision.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::json;

use crate::core::config::GuardrailConfig;
use crate::core::errors::EngineError;
use crate::core::hashing::canonical_byte_len;
use crate::core::identifiers::StoreId;

// ============================================================================
// SECTION: Redaction Patterns
// ============================================================================

/// Replacement marker for API-key shapes.
const MARKER_API_KEY: &str = "[REDACTED_API_KEY]";
/// Replacement marker for JWT tokens.
const MARKER_JWT: &str = "[REDACTED_JWT]";
/// Replacement marker for bearer tokens.
const MARKER_BEARER: &str = "[REDACTED_BEARER]";
/// Replacement marker for long hex strings.
const MARKER_HEX: &str = "[REDACTED_HEX]";

/// Compiles a pattern once; a failed compile disables that family.
fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Pattern for `sk-`-style and AWS access-key shapes.
fn api_key_pattern() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&CELL, r"\bsk-[A-Za-z0-9_-]{16,}\b|\bAKIA[0-9A-Z]{16}\b")
}

/// Pattern for three-part JWT tokens.
fn jwt_pattern() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&CELL, r"\beyJ[A-Za-z0-9_-]{4,}\.[A-Za-z0-9_-]{4,}\.[A-Za-z0-9_-]{4,}\b")
}

/// Pattern for bearer authorization values.
fn bearer_pattern() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&CELL, r"(?i)\bbearer\s+[A-Za-z0-9._~+/=-]{8,}")
}

/// Pattern for long hex strings (32 or more digits).
fn hex_pattern() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&CELL, r"\b[0-9a-fA-F]{32,}\b")
}

/// Pattern for unsafe prompt-injection instructions.
fn unsafe_pattern() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(
        &CELL,
        r"(?i)ignore\s+(?:all\s+)?previous\s+instructions|reveal\s+(?:the\s+)?system\s+prompt|exfiltrat",
    )
}

// ============================================================================
// SECTION: Redaction
// ============================================================================

/// Result of one redaction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionOutcome {
    /// Content with secrets replaced by markers.
    pub content: String,
    /// Number of replacements applied.
    pub redactions: u64,
}

/// Replaces matches of one pattern, counting replacements.
fn apply_pattern(text: String, pattern: Option<&Regex>, marker: &str, count: &mut u64) -> String {
    let Some(pattern) = pattern else {
        return text;
    };
    let hits = u64::try_from(pattern.find_iter(&text).count()).unwrap_or(u64::MAX);
    if hits == 0 {
        return text;
    }
    *count += hits;
    pattern.replace_all(&text, marker).into_owned()
}

/// Redacts secret-shaped substrings from episode content.
///
/// Pattern order matters: JWTs are replaced before the broader bearer
/// pattern so a `Bearer eyJ...` value reports one JWT redaction.
#[must_use]
pub fn redact_secrets(content: &str) -> RedactionOutcome {
    let mut redactions = 0_u64;
    let mut text = content.to_string();
    text = apply_pattern(text, api_key_pattern(), MARKER_API_KEY, &mut redactions);
    text = apply_pattern(text, jwt_pattern(), MARKER_JWT, &mut redactions);
    text = apply_pattern(text, bearer_pattern(), MARKER_BEARER, &mut redactions);
    text = apply_pattern(text, hex_pattern(), MARKER_HEX, &mut redactions);
    RedactionOutcome {
        content: text,
        redactions,
    }
}

/// Reports whether content matches an unsafe-instruction pattern.
#[must_use]
pub fn is_unsafe_instruction(content: &str) -> bool {
    unsafe_pattern().is_some_and(|pattern| pattern.is_match(content))
}

// ============================================================================
// SECTION: Byte Budgets
// ============================================================================

/// Approximate token estimate for a canonical byte length (4 bytes per
/// token).
#[must_use]
pub fn estimated_tokens(bytes: usize) -> usize {
    bytes.div_ceil(4)
}

/// Enforces the ingest payload budget against a serializable request.
///
/// # Errors
///
/// Returns [`EngineError::PayloadLimit`] when the canonical form exceeds
/// `config.max_payload_bytes`.
pub fn ensure_ingest_budget<T: Serialize>(
    payload: &T,
    config: &GuardrailConfig,
) -> Result<(), EngineError> {
    let actual = canonical_byte_len(payload)?;
    if actual > config.max_payload_bytes {
        return Err(EngineError::PayloadLimit {
            message: format!(
                "ingest payload exceeds maxPayloadBytes: {actual} > {}",
                config.max_payload_bytes
            ),
            details: Some(json!({
                "limit": config.max_payload_bytes,
                "actual": actual,
            })),
        });
    }
    Ok(())
}

/// Enforces the statement byte budget for curated statements.
///
/// # Errors
///
/// Returns [`EngineError::PayloadLimit`] when the statement exceeds
/// `config.statement_max_bytes`.
pub fn ensure_statement_budget(
    statement: &str,
    config: &GuardrailConfig,
) -> Result<(), EngineError> {
    let actual = statement.len();
    if actual > config.statement_max_bytes {
        return Err(EngineError::PayloadLimit {
            message: format!(
                "statement exceeds statementMaxBytes: {actual} > {}",
                config.statement_max_bytes
            ),
            details: Some(json!({
                "limit": config.statement_max_bytes,
                "actual": actual,
            })),
        });
    }
    Ok(())
}

// ============================================================================
// SECTION: Isolation
// ============================================================================

/// Checks a cross-store read against the allowlist guardrail.
///
/// Reading the request's own store always passes. Any other store
/// requires both `allowCrossSpaceRead = true` and an allowlist entry.
///
/// # Errors
///
/// Returns [`EngineError::IsolationViolation`] otherwise.
pub fn check_isolation(
    request_store: &StoreId,
    target_store: &StoreId,
    allowlist: &[String],
    config: &GuardrailConfig,
) -> Result<(), EngineError> {
    if request_store == target_store {
        return Ok(());
    }
    let allowed = config.allow_cross_space_read
        && allowlist.iter().any(|entry| entry == target_store.as_str());
    if allowed {
        return Ok(());
    }
    Err(EngineError::IsolationViolation {
        message: format!(
            "cross-store read from {request_store} to {target_store} requires an allowlist",
        ),
        details: Some(json!({
            "requestStore": request_store.as_str(),
            "targetStore": target_store.as_str(),
            "allowCrossSpaceRead": config.allow_cross_space_read,
        })),
    })
}
