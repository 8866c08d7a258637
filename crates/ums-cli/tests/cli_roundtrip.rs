// crates/ums-cli/tests/cli_roundtrip.rs
// ============================================================================
// Module: CLI Round-Trip Tests
// Description: End-to-end operation invocations through the binary.
// ============================================================================
//! ## Overview
//! Drives the `ums` binary against a temporary state file: ingest then
//! recall across invocations, replay-safe upserts, error envelopes with
//! non-zero exit codes, and persisted snapshot state.

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

use std::path::Path;
use std::process::Command;
use std::process::Output;

use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

/// Runs the `ums` binary with a subcommand, inline input, and state
/// file.
fn run_ums(state_file: &Path, subcommand: &str, input: &Value) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ums"))
        .arg(subcommand)
        .arg("--state-file")
        .arg(state_file)
        .arg("--input")
        .arg(input.to_string())
        .output()
        .expect("spawn ums binary")
}

/// Parses the JSON document printed on stdout.
fn stdout_json(output: &Output) -> Value {
    let raw = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(raw.trim()).expect("stdout json")
}

#[test]
fn ingest_then_context_across_invocations() {
    let dir = TempDir::new().expect("tempdir");
    let state = dir.path().join("state.json");

    let ingest = run_ums(
        &state,
        "ingest",
        &json!({
            "profile": "agent-cli",
            "events": [{ "type": "note", "content": "persisted across processes" }],
        }),
    );
    assert!(ingest.status.success(), "ingest failed: {ingest:?}");
    let ingest_json = stdout_json(&ingest);
    assert_eq!(ingest_json["accepted"], json!(1));
    assert!(state.exists(), "snapshot must persist");

    let context = run_ums(
        &state,
        "context",
        &json!({ "profile": "agent-cli", "query": "persisted across processes" }),
    );
    assert!(context.status.success(), "context failed: {context:?}");
    let context_json = stdout_json(&context);
    let matches = context_json["matches"].as_array().expect("matches");
    assert_eq!(matches.len(), 1);
}

#[test]
fn replayed_upsert_reports_noop_across_invocations() {
    let dir = TempDir::new().expect("tempdir");
    let state = dir.path().join("state.json");
    let request = json!({
        "storeId": "tenant-cli",
        "profile": "learner-cli",
        "learnerId": "learner-88",
        "identityRefs": [
            { "namespace": "email", "value": "learner88@example.com", "isPrimary": true },
        ],
        "goals": ["dp", "graph"],
        "evidenceEventIds": ["ep-profile-cli-1"],
    });

    let first = run_ums(&state, "learner_profile_update", &request);
    assert!(first.status.success());
    let first_json = stdout_json(&first);
    assert_eq!(first_json["action"], json!("created"));

    let reordered = json!({
        "storeId": "tenant-cli",
        "profile": "learner-cli",
        "learnerId": "learner-88",
        "identityRefs": [
            { "namespace": "email", "value": "learner88@example.com", "isPrimary": true },
        ],
        "goals": ["graph", "dp"],
        "evidenceEventIds": ["ep-profile-cli-1"],
    });
    let second = run_ums(&state, "learner_profile_update", &reordered);
    assert!(second.status.success());
    let second_json = stdout_json(&second);
    assert_eq!(second_json["action"], json!("noop"));
    assert_eq!(second_json["profileId"], first_json["profileId"]);
}

#[test]
fn evidence_failure_prints_envelope_and_exits_nonzero() {
    let dir = TempDir::new().expect("tempdir");
    let state = dir.path().join("state.json");

    let output = run_ums(
        &state,
        "misconception_update",
        &json!({
            "profile": "learner-cli-guardrail",
            "misconceptionKey": "missing-evidence-pointer",
            "signal": "harmful",
        }),
    );
    assert!(!output.status.success(), "must exit non-zero");
    let envelope = stdout_json(&output);
    assert_eq!(envelope["ok"], json!(false));
    assert_eq!(envelope["error"]["code"], json!("EVIDENCE_REQUIRED"));
}

#[test]
fn store_id_flag_injects_the_store() {
    let dir = TempDir::new().expect("tempdir");
    let state = dir.path().join("state.json");

    let output = Command::new(env!("CARGO_BIN_EXE_ums"))
        .arg("ingest")
        .arg("--state-file")
        .arg(&state)
        .arg("--store-id")
        .arg("jira-history")
        .arg("--input")
        .arg(
            json!({
                "profile": "shared-profile",
                "events": [{ "type": "ticket", "content": "flagged store" }],
            })
            .to_string(),
        )
        .output()
        .expect("spawn");
    assert!(output.status.success());
    let response = stdout_json(&output);
    assert_eq!(response["storeId"], json!("jira-history"));
}

#[test]
fn request_file_is_accepted() {
    let dir = TempDir::new().expect("tempdir");
    let state = dir.path().join("state.json");
    let request_path = dir.path().join("request.json");
    std::fs::write(
        &request_path,
        json!({
            "profile": "agent-cli",
            "events": [{ "type": "note", "content": "from a file" }],
        })
        .to_string(),
    )
    .expect("write request");

    let output = Command::new(env!("CARGO_BIN_EXE_ums"))
        .arg("ingest")
        .arg("--state-file")
        .arg(&state)
        .arg("--file")
        .arg(&request_path)
        .output()
        .expect("spawn");
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["accepted"], json!(1));
}

#[test]
fn pretty_output_is_multiline() {
    let dir = TempDir::new().expect("tempdir");
    let state = dir.path().join("state.json");

    let output = Command::new(env!("CARGO_BIN_EXE_ums"))
        .arg("doctor")
        .arg("--state-file")
        .arg(&state)
        .arg("--input")
        .arg(json!({ "profile": "agent-cli" }).to_string())
        .arg("--pretty")
        .output()
        .expect("spawn");
    assert!(output.status.success());
    let raw = String::from_utf8_lossy(&output.stdout);
    assert!(raw.trim().contains('\n'), "pretty output should be multiline");
}
