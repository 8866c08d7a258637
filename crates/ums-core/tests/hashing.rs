// crates/ums-core/tests/hashing.rs
// ============================================================================
// Module: Canonical Hashing Tests
// Description: Verifies canonical JSON hashing and identifier minting.
// ============================================================================
//! ## Overview
//! Ensures canonical JSON hashing is deterministic across key ordering,
//! enforces size limits, and mints stable `<prefix>_<hex16>` identifiers.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use ums_core::HashAlgorithm;
use ums_core::core::hashing::HashError;
use ums_core::core::hashing::canonical_json_bytes;
use ums_core::core::hashing::canonical_json_bytes_with_limit;
use ums_core::core::hashing::hash_bytes;
use ums_core::core::hashing::hash_canonical_json;
use ums_core::core::hashing::hash_to_unit;
use ums_core::core::hashing::mint_id;

#[test]
fn canonical_hash_is_order_independent_for_maps() {
    let mut map_a = Map::new();
    map_a.insert("b".to_string(), json!(2));
    map_a.insert("a".to_string(), json!(1));

    let mut map_b = Map::new();
    map_b.insert("a".to_string(), json!(1));
    map_b.insert("b".to_string(), json!(2));

    let hash_a =
        hash_canonical_json(HashAlgorithm::Sha256, &Value::Object(map_a)).expect("hash a");
    let hash_b =
        hash_canonical_json(HashAlgorithm::Sha256, &Value::Object(map_b)).expect("hash b");

    assert_eq!(hash_a, hash_b);
}

#[test]
fn golden_hash_empty_object() {
    // SHA-256 of "{}".
    let digest = hash_canonical_json(HashAlgorithm::Sha256, &json!({})).expect("hash");
    assert_eq!(
        digest.value,
        "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
    );
}

#[test]
fn golden_hash_bytes_direct() {
    // SHA-256 of "test".
    let digest = hash_bytes(HashAlgorithm::Sha256, b"test");
    assert_eq!(
        digest.value,
        "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
    );
}

#[test]
fn hash_digest_produces_lowercase_hex() {
    let digest = hash_bytes(HashAlgorithm::Sha256, b"casing");
    assert!(!digest.value.chars().any(char::is_uppercase));
    assert_eq!(digest.value.len(), 64);
}

#[test]
fn size_limit_exact_boundary_passes() {
    let payload = BTreeMap::from([("d", "x".to_string())]);
    let bytes = canonical_json_bytes(&payload).expect("canonical bytes");
    let result = canonical_json_bytes_with_limit(&payload, bytes.len());
    assert!(result.is_ok());
}

#[test]
fn size_limit_one_byte_under_fails() {
    let payload = BTreeMap::from([("d", "x".to_string())]);
    let bytes = canonical_json_bytes(&payload).expect("canonical bytes");
    let result = canonical_json_bytes_with_limit(&payload, bytes.len() - 1);
    assert!(matches!(result, Err(HashError::SizeLimitExceeded { .. })));
}

#[test]
fn mint_id_has_prefix_and_hex16() {
    let id = mint_id("ep", &json!({"storeId": "default", "content": "hello"})).expect("mint");
    let (prefix, hex) = id.split_once('_').expect("separator");
    assert_eq!(prefix, "ep");
    assert_eq!(hex.len(), 16);
    assert!(hex.chars().all(|ch| ch.is_ascii_hexdigit()));
}

#[test]
fn mint_id_is_stable_across_key_order() {
    let left = mint_id("rule", &json!({"a": 1, "b": 2})).expect("left");
    let right = mint_id("rule", &json!({"b": 2, "a": 1})).expect("right");
    assert_eq!(left, right);
}

#[test]
fn mint_id_differs_on_content() {
    let left = mint_id("ep", &json!({"content": "one"})).expect("left");
    let right = mint_id("ep", &json!({"content": "two"})).expect("right");
    assert_ne!(left, right);
}

#[test]
fn hash_to_unit_stays_in_unit_interval() {
    for salt in ["a", "b", "c", "query", "longer input with spaces"] {
        let value = hash_to_unit(&["seed", salt, "id", "2026-01-01T00:00:00Z"]);
        assert!((0.0 .. 1.0).contains(&value), "out of range: {value}");
    }
}

#[test]
fn hash_to_unit_is_deterministic() {
    let first = hash_to_unit(&["seed", "query", "ep_0011223344556677", "t"]);
    let second = hash_to_unit(&["seed", "query", "ep_0011223344556677", "t"]);
    assert!((first - second).abs() < f64::EPSILON);
}
