// crates/ums-core/src/core/errors.rs
// ============================================================================
// Module: UMS Error Taxonomy
// Description: Tagged engine errors and the boundary error envelope.
// Purpose: Give every failure a stable code for shells and tests.
// Dependencies: crate::core::hashing, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Handlers fail with a tagged [`EngineError`]; the dispatcher catches only
//! at the engine boundary to format the `{ok:false, error:{...}}` envelope.
//! No operation retries internally, and a replay-safe noop is not an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::core::hashing::HashError;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// Stable code for malformed or missing required input.
pub const CODE_VALIDATION_FAILED: &str = "VALIDATION_FAILED";
/// Stable code for entities submitted without required evidence.
pub const CODE_EVIDENCE_REQUIRED: &str = "EVIDENCE_REQUIRED";
/// Stable code for identity invariant violations.
pub const CODE_IDENTITY_INVARIANT: &str = "IDENTITY_INVARIANT";
/// Stable code for cross-store access without an allowlist.
pub const CODE_ISOLATION_VIOLATION: &str = "ISOLATION_VIOLATION";
/// Stable code for recall packs that cannot fit their budget.
pub const CODE_PAYLOAD_LIMIT: &str = "PAYLOAD_LIMIT";
/// Stable code for append-only violations.
pub const CODE_CONFLICT: &str = "CONFLICT";
/// Stable code for missing referenced identifiers.
pub const CODE_NOT_FOUND: &str = "NOT_FOUND";
/// Stable code for repository or index wiring defects.
pub const CODE_CONTRACT_VIOLATION: &str = "CONTRACT_VIOLATION";

// ============================================================================
// SECTION: Engine Error
// ============================================================================

/// Tagged engine error covering the full taxonomy.
///
/// # Invariants
/// - Variants are stable for programmatic handling; `details` carries
///   structured context (field name, offending value, evidence status).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or missing required input.
    #[error("validation failed: {message}")]
    Validation {
        /// Human-readable description.
        message: String,
        /// Structured context for the failure.
        details: Option<Value>,
    },
    /// An entity requiring evidence was submitted without any evidence
    /// pointer and no `metadata.policyException`.
    #[error("evidence required: {message}")]
    EvidenceRequired {
        /// Human-readable description.
        message: String,
        /// Structured context for the failure.
        details: Option<Value>,
    },
    /// Identity refs missing, non-distinct edge endpoints, or timestamp
    /// ordering violations.
    #[error("identity invariant violated: {message}")]
    IdentityInvariant {
        /// Human-readable description.
        message: String,
        /// Structured context for the failure.
        details: Option<Value>,
    },
    /// Cross-store access without an allowlist.
    #[error("isolation violation: {message}")]
    IsolationViolation {
        /// Human-readable description.
        message: String,
        /// Structured context for the failure.
        details: Option<Value>,
    },
    /// A recall pack cannot fit its byte or item budget.
    #[error("payload limit exceeded: {message}")]
    PayloadLimit {
        /// Human-readable description.
        message: String,
        /// Structured context for the failure.
        details: Option<Value>,
    },
    /// Append-only violation: duplicate immutable ID with different
    /// content.
    #[error("conflict: {message}")]
    Conflict {
        /// Human-readable description.
        message: String,
        /// Structured context for the failure.
        details: Option<Value>,
    },
    /// A referenced identifier does not resolve.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable description.
        message: String,
        /// Structured context for the failure.
        details: Option<Value>,
    },
    /// Repository or index wiring is missing a required capability.
    #[error("contract violation: {message}")]
    ContractViolation {
        /// Human-readable description.
        message: String,
        /// Structured context for the failure.
        details: Option<Value>,
    },
}

impl EngineError {
    /// Creates a validation error without structured details.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// Creates a validation error with structured details.
    #[must_use]
    pub fn validation_with(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    /// Creates an evidence-required error.
    #[must_use]
    pub fn evidence_required(message: impl Into<String>) -> Self {
        Self::EvidenceRequired {
            message: message.into(),
            details: None,
        }
    }

    /// Creates an identity invariant error.
    #[must_use]
    pub fn identity_invariant(message: impl Into<String>) -> Self {
        Self::IdentityInvariant {
            message: message.into(),
            details: None,
        }
    }

    /// Creates an isolation violation error.
    #[must_use]
    pub fn isolation(message: impl Into<String>) -> Self {
        Self::IsolationViolation {
            message: message.into(),
            details: None,
        }
    }

    /// Creates a payload limit error.
    #[must_use]
    pub fn payload_limit(message: impl Into<String>) -> Self {
        Self::PayloadLimit {
            message: message.into(),
            details: None,
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            details: None,
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            details: None,
        }
    }

    /// Creates a contract violation error.
    #[must_use]
    pub fn contract(message: impl Into<String>) -> Self {
        Self::ContractViolation {
            message: message.into(),
            details: None,
        }
    }

    /// Returns the stable taxonomy code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => CODE_VALIDATION_FAILED,
            Self::EvidenceRequired { .. } => CODE_EVIDENCE_REQUIRED,
            Self::IdentityInvariant { .. } => CODE_IDENTITY_INVARIANT,
            Self::IsolationViolation { .. } => CODE_ISOLATION_VIOLATION,
            Self::PayloadLimit { .. } => CODE_PAYLOAD_LIMIT,
            Self::Conflict { .. } => CODE_CONFLICT,
            Self::NotFound { .. } => CODE_NOT_FOUND,
            Self::ContractViolation { .. } => CODE_CONTRACT_VIOLATION,
        }
    }

    /// Returns the human-readable message for this error.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message, .. }
            | Self::EvidenceRequired { message, .. }
            | Self::IdentityInvariant { message, .. }
            | Self::IsolationViolation { message, .. }
            | Self::PayloadLimit { message, .. }
            | Self::Conflict { message, .. }
            | Self::NotFound { message, .. }
            | Self::ContractViolation { message, .. } => message,
        }
    }

    /// Returns the structured details for this error, when present.
    #[must_use]
    pub const fn details(&self) -> Option<&Value> {
        match self {
            Self::Validation { details, .. }
            | Self::EvidenceRequired { details, .. }
            | Self::IdentityInvariant { details, .. }
            | Self::IsolationViolation { details, .. }
            | Self::PayloadLimit { details, .. }
            | Self::Conflict { details, .. }
            | Self::NotFound { details, .. }
            | Self::ContractViolation { details, .. } => details.as_ref(),
        }
    }

    /// Formats the boundary error envelope `{ok:false, error:{...}}`.
    #[must_use]
    pub fn to_envelope(&self) -> Value {
        json!({
            "ok": false,
            "error": {
                "code": self.code(),
                "message": self.message(),
                "details": self.details().cloned().unwrap_or(Value::Null),
            },
        })
    }
}

impl From<HashError> for EngineError {
    fn from(err: HashError) -> Self {
        match err {
            HashError::Canonicalization(message) => Self::Validation {
                message: format!("payload is not canonicalizable: {message}"),
                details: None,
            },
            HashError::SizeLimitExceeded { limit, actual } => Self::PayloadLimit {
                message: format!("canonical payload too large: {actual} > {limit}"),
                details: Some(json!({ "limit": limit, "actual": actual })),
            },
        }
    }
}
