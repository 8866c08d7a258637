// crates/ums-core/src/core/hashing.rs
// ============================================================================
// Module: UMS Canonical Hashing
// Description: RFC 8785 canonical JSON serialization and SHA-256 digests.
// Purpose: Provide the single hashing surface used for IDs, digests, and budgets.
// Dependencies: serde, serde_jcs, serde_json, sha2, thiserror
// ============================================================================

//! ## Overview
//! Every deterministic identifier and request digest in UMS is derived from
//! one canonical JSON form (RFC 8785: object keys sorted by UTF-16 code
//! units, ECMAScript number rendering). This module is the only place that
//! serializes for hashing, so IDs stay stable across shells and replicas.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default hash algorithm for all UMS digests.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// Number of hex characters kept when minting entity identifiers.
pub const ID_HEX_LEN: usize = 16;

// ============================================================================
// SECTION: Hash Types
// ============================================================================

/// Supported hash algorithms.
///
/// # Invariants
/// - Variants are stable for serialization and snapshot compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
}

/// Hash digest with algorithm and lowercase hex value.
///
/// # Invariants
/// - `value` is lowercase hex of the raw digest bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDigest {
    /// Algorithm that produced the digest.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest value.
    pub value: String,
}

impl HashDigest {
    /// Creates a digest from raw bytes, rendering lowercase hex.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        let mut value = String::with_capacity(bytes.len() * 2);
        for byte in bytes {
            value.push_str(&format!("{byte:02x}"));
        }
        Self {
            algorithm,
            value,
        }
    }
}

// ============================================================================
// SECTION: Hash Errors
// ============================================================================

/// Errors raised while canonicalizing or hashing payloads.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum HashError {
    /// Canonical JSON serialization failed (non-finite floats, map keys).
    #[error("canonical json serialization failed: {0}")]
    Canonicalization(String),
    /// Canonical payload exceeds the configured byte limit.
    #[error("canonical payload too large: {actual} > {limit}")]
    SizeLimitExceeded {
        /// Configured byte limit.
        limit: usize,
        /// Actual canonical byte length.
        actual: usize,
    },
}

// ============================================================================
// SECTION: Canonical Serialization
// ============================================================================

/// Serializes a value into RFC 8785 canonical JSON bytes.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when the value cannot be
/// canonicalized (for example non-finite floats).
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Serializes a value into an RFC 8785 canonical JSON string.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when the value cannot be
/// canonicalized.
pub fn canonical_json_string<T: Serialize>(value: &T) -> Result<String, HashError> {
    serde_jcs::to_string(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Serializes a value into canonical JSON bytes, enforcing a byte limit.
///
/// # Errors
///
/// Returns [`HashError::SizeLimitExceeded`] when the canonical form exceeds
/// `limit`, or [`HashError::Canonicalization`] on serialization failure.
pub fn canonical_json_bytes_with_limit<T: Serialize>(
    value: &T,
    limit: usize,
) -> Result<Vec<u8>, HashError> {
    let bytes = canonical_json_bytes(value)?;
    if bytes.len() > limit {
        return Err(HashError::SizeLimitExceeded {
            limit,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

/// Measures the canonical UTF-8 byte length of a value.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] on serialization failure.
pub fn canonical_byte_len<T: Serialize>(value: &T) -> Result<usize, HashError> {
    Ok(canonical_json_bytes(value)?.len())
}

// ============================================================================
// SECTION: Hashing
// ============================================================================

/// Hashes raw bytes with the requested algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let digest = Sha256::digest(bytes);
            HashDigest::new(algorithm, &digest)
        }
    }
}

/// Hashes the canonical JSON form of a value.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn hash_canonical_json<T: Serialize>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Hashes the canonical JSON form of a value, enforcing a byte limit.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails or the canonical form
/// exceeds `limit`.
pub fn hash_canonical_json_with_limit<T: Serialize>(
    algorithm: HashAlgorithm,
    value: &T,
    limit: usize,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes_with_limit(value, limit)?;
    Ok(hash_bytes(algorithm, &bytes))
}

// ============================================================================
// SECTION: Identifier Minting
// ============================================================================

/// Mints a content-addressed identifier `<prefix>_<hex16>` from a
/// fingerprint value.
///
/// The fingerprint is canonicalized, hashed with SHA-256, and the first
/// [`ID_HEX_LEN`] hex characters are kept.
///
/// # Errors
///
/// Returns [`HashError`] when the fingerprint cannot be canonicalized.
pub fn mint_id<T: Serialize>(prefix: &str, fingerprint: &T) -> Result<String, HashError> {
    let digest = hash_canonical_json(DEFAULT_HASH_ALGORITHM, fingerprint)?;
    let short: String = digest.value.chars().take(ID_HEX_LEN).collect();
    Ok(format!("{prefix}_{short}"))
}

/// Maps a seeded string tuple onto the unit interval `[0, 1)`.
///
/// Used as the deterministic tie-breaker in keyword ranking: the result
/// depends only on its inputs, never on insertion order or wall-clock time.
#[must_use]
pub fn hash_to_unit(parts: &[&str]) -> f64 {
    let joined = parts.join("|");
    let digest = Sha256::digest(joined.as_bytes());
    let mut head = [0_u8; 8];
    head.copy_from_slice(&digest[.. 8]);
    let numerator = u64::from_be_bytes(head);
    // Divide by 2^64 so the result stays strictly below 1.
    (numerator as f64) / (u64::MAX as f64 + 1.0)
}
