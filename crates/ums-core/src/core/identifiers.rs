// crates/ums-core/src/core/identifiers.rs
// ============================================================================
// Module: UMS Identifiers
// Description: Canonical identifiers for stores, profiles, and entities.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: crate::core::hashing, serde
// ============================================================================

//! ## Overview
//! This module defines the identifiers used throughout UMS. Store and
//! profile names are caller-chosen partition keys; entity identifiers are
//! content-addressed (`<prefix>_<hex16>`) and minted from canonical JSON
//! fingerprints, so identical semantic inputs always yield identical IDs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashError;
use crate::core::hashing::mint_id;

// ============================================================================
// SECTION: Partition Keys
// ============================================================================

/// Store identifier: the top-level isolation boundary.
///
/// # Invariants
/// - Non-empty after trimming; `"default"` is the fallback store.
/// - Opaque beyond trimming; never joined across stores without an
///   explicit allowlist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(String);

impl StoreId {
    /// The fallback store used when requests omit `storeId`.
    pub const DEFAULT: &'static str = "default";

    /// Creates a store identifier, trimming surrounding whitespace.
    ///
    /// Empty input falls back to the default store.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let trimmed = id.into().trim().to_string();
        if trimmed.is_empty() {
            Self(Self::DEFAULT.to_string())
        } else {
            Self(trimmed)
        }
    }

    /// Returns the default store identifier.
    #[must_use]
    pub fn default_store() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for StoreId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StoreId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Profile name: the secondary partition inside a store.
///
/// # Invariants
/// - Non-empty after trimming; requests without a profile are rejected at
///   the dispatcher boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileName(String);

impl ProfileName {
    /// Creates a profile name, trimming surrounding whitespace.
    ///
    /// Returns `None` when the trimmed value is empty.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let trimmed = name.into().trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed))
        }
    }

    /// Returns the profile name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Entity Identifiers
// ============================================================================

/// Episode identifier (`ep_<hex16>`).
///
/// # Invariants
/// - Opaque UTF-8 string; content-addressed when minted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeId(String);

impl EpisodeId {
    /// Identifier prefix for episodes.
    pub const PREFIX: &'static str = "ep";

    /// Creates an episode identifier from an existing wire value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a content-addressed episode identifier from a fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the fingerprint cannot be canonicalized.
    pub fn mint<T: Serialize>(fingerprint: &T) -> Result<Self, HashError> {
        Ok(Self(mint_id(Self::PREFIX, fingerprint)?))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for EpisodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EpisodeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Working entry identifier (`wm_<hex16>`).
///
/// # Invariants
/// - Opaque UTF-8 string; content-addressed when minted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkingEntryId(String);

impl WorkingEntryId {
    /// Identifier prefix for working entries.
    pub const PREFIX: &'static str = "wm";

    /// Creates a working entry identifier from an existing wire value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a content-addressed working entry identifier.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the fingerprint cannot be canonicalized.
    pub fn mint<T: Serialize>(fingerprint: &T) -> Result<Self, HashError> {
        Ok(Self(mint_id(Self::PREFIX, fingerprint)?))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkingEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Procedural rule identifier (`rule_<hex16>`).
///
/// # Invariants
/// - Opaque UTF-8 string; content-addressed when minted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    /// Identifier prefix for procedural rules.
    pub const PREFIX: &'static str = "rule";

    /// Creates a rule identifier from an existing wire value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a content-addressed rule identifier.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the fingerprint cannot be canonicalized.
    pub fn mint<T: Serialize>(fingerprint: &T) -> Result<Self, HashError> {
        Ok(Self(mint_id(Self::PREFIX, fingerprint)?))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RuleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RuleId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Anti-pattern identifier (`anti_<hex16>`).
///
/// # Invariants
/// - Opaque UTF-8 string; content-addressed when minted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AntiPatternId(String);

impl AntiPatternId {
    /// Identifier prefix for anti-patterns.
    pub const PREFIX: &'static str = "anti";

    /// Creates an anti-pattern identifier from an existing wire value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a content-addressed anti-pattern identifier.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the fingerprint cannot be canonicalized.
    pub fn mint<T: Serialize>(fingerprint: &T) -> Result<Self, HashError> {
        Ok(Self(mint_id(Self::PREFIX, fingerprint)?))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AntiPatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Learner profile identifier (`lp_<hex16>`).
///
/// # Invariants
/// - Opaque UTF-8 string; content-addressed when minted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LearnerProfileId(String);

impl LearnerProfileId {
    /// Identifier prefix for learner profiles.
    pub const PREFIX: &'static str = "lp";

    /// Creates a learner profile identifier from an existing wire value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a content-addressed learner profile identifier.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the fingerprint cannot be canonicalized.
    pub fn mint<T: Serialize>(fingerprint: &T) -> Result<Self, HashError> {
        Ok(Self(mint_id(Self::PREFIX, fingerprint)?))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LearnerProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity edge identifier (`edge_<hex16>`).
///
/// # Invariants
/// - Opaque UTF-8 string; content-addressed when minted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityEdgeId(String);

impl IdentityEdgeId {
    /// Identifier prefix for identity edges.
    pub const PREFIX: &'static str = "edge";

    /// Creates an identity edge identifier from an existing wire value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a content-addressed identity edge identifier.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the fingerprint cannot be canonicalized.
    pub fn mint<T: Serialize>(fingerprint: &T) -> Result<Self, HashError> {
        Ok(Self(mint_id(Self::PREFIX, fingerprint)?))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityEdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Misconception identifier (`mis_<hex16>`).
///
/// # Invariants
/// - Opaque UTF-8 string; content-addressed when minted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MisconceptionId(String);

impl MisconceptionId {
    /// Identifier prefix for misconceptions.
    pub const PREFIX: &'static str = "mis";

    /// Creates a misconception identifier from an existing wire value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a content-addressed misconception identifier.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the fingerprint cannot be canonicalized.
    pub fn mint<T: Serialize>(fingerprint: &T) -> Result<Self, HashError> {
        Ok(Self(mint_id(Self::PREFIX, fingerprint)?))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MisconceptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Curriculum plan item identifier (`cp_<hex16>`).
///
/// # Invariants
/// - Opaque UTF-8 string; content-addressed when minted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurriculumItemId(String);

impl CurriculumItemId {
    /// Identifier prefix for curriculum plan items.
    pub const PREFIX: &'static str = "cp";

    /// Creates a curriculum item identifier from an existing wire value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a content-addressed curriculum item identifier.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the fingerprint cannot be canonicalized.
    pub fn mint<T: Serialize>(fingerprint: &T) -> Result<Self, HashError> {
        Ok(Self(mint_id(Self::PREFIX, fingerprint)?))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurriculumItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Review schedule entry identifier (`srs_<hex16>`).
///
/// # Invariants
/// - Opaque UTF-8 string; content-addressed when minted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewEntryId(String);

impl ReviewEntryId {
    /// Identifier prefix for review schedule entries.
    pub const PREFIX: &'static str = "srs";

    /// Creates a review entry identifier from an existing wire value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a content-addressed review entry identifier.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the fingerprint cannot be canonicalized.
    pub fn mint<T: Serialize>(fingerprint: &T) -> Result<Self, HashError> {
        Ok(Self(mint_id(Self::PREFIX, fingerprint)?))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReviewEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Policy decision identifier (`pol_<hex16>`).
///
/// # Invariants
/// - Opaque UTF-8 string; content-addressed when minted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyDecisionId(String);

impl PolicyDecisionId {
    /// Identifier prefix for policy decisions.
    pub const PREFIX: &'static str = "pol";

    /// Creates a policy decision identifier from an existing wire value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a content-addressed policy decision identifier.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the fingerprint cannot be canonicalized.
    pub fn mint<T: Serialize>(fingerprint: &T) -> Result<Self, HashError> {
        Ok(Self(mint_id(Self::PREFIX, fingerprint)?))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PolicyDecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Audit record identifier (`audit_<hex16>`).
///
/// # Invariants
/// - Opaque UTF-8 string; content-addressed when minted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditId(String);

impl AuditId {
    /// Identifier prefix for audit records.
    pub const PREFIX: &'static str = "audit";

    /// Creates an audit identifier from an existing wire value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a content-addressed audit identifier.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the fingerprint cannot be canonicalized.
    pub fn mint<T: Serialize>(fingerprint: &T) -> Result<Self, HashError> {
        Ok(Self(mint_id(Self::PREFIX, fingerprint)?))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuditId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
