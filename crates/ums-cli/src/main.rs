// crates/ums-cli/src/main.rs
// ============================================================================
// Module: UMS CLI Entry Point
// Description: Command dispatcher for UMS operations and the local server.
// Purpose: Run one operation per invocation through the snapshot lock dance.
// Dependencies: clap, serde_json, thiserror, tokio, toml, ums-core, ums-server, ums-store-file
// ============================================================================

//! ## Overview
//! The CLI exposes one subcommand per engine operation plus `serve`.
//! Every operation invocation performs the full snapshot protocol:
//! acquire the exclusive lock, load and import the snapshot, execute,
//! export and save, release. Responses print to stdout as JSON; any
//! failure prints the error envelope and exits non-zero.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde_json::Value;
use thiserror::Error;
use ums_core::EngineConfig;
use ums_core::MemoryEngine;
use ums_core::SnapshotStore;
use ums_core::SnapshotStoreError;
use ums_server::ServerState;
use ums_store_file::FileSnapshotStore;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of an inline or file request payload.
const MAX_REQUEST_BYTES: usize = 4 * 1024 * 1024;
/// Maximum size of a TOML config file.
const MAX_CONFIG_BYTES: usize = 256 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "ums", version, about = "Universal Memory System operation shell")]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Shared flags for operation subcommands.
#[derive(Args, Debug, Clone)]
struct OpArgs {
    /// Inline JSON request payload.
    #[arg(long, value_name = "JSON")]
    input: Option<String>,
    /// Path to a JSON request file.
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,
    /// Snapshot state file path.
    #[arg(long, value_name = "PATH", default_value = "ums-state.json")]
    state_file: PathBuf,
    /// Store injected when the request omits `storeId`.
    #[arg(long, value_name = "STORE")]
    store_id: Option<String>,
    /// TOML engine configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Pretty-print the response.
    #[arg(long)]
    pretty: bool,
}

/// Flags for the local HTTP server.
#[derive(Args, Debug, Clone)]
struct ServeArgs {
    /// Listen address.
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:8787")]
    addr: SocketAddr,
    /// Snapshot state file path.
    #[arg(long, value_name = "PATH", default_value = "ums-state.json")]
    state_file: PathBuf,
    /// TOML engine configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Supported CLI subcommands: one per operation, plus `serve`.
#[derive(Subcommand, Debug)]
#[command(rename_all = "snake_case")]
enum Commands {
    /// Ingest raw events or source envelopes.
    Ingest(OpArgs),
    /// Build a bounded recall pack for a query.
    Context(OpArgs),
    /// Generate candidate rules from recent episodes.
    Reflect(OpArgs),
    /// Validate candidate evidence and contradictions.
    Validate(OpArgs),
    /// Upsert validated candidates as rules.
    Curate(OpArgs),
    /// Curate with guardrail screening.
    CurateGuarded(OpArgs),
    /// Apply a reinforcement signal to a rule.
    Feedback(OpArgs),
    /// Record a task outcome and reinforce used rules.
    Outcome(OpArgs),
    /// Run invariant sweeps over one bucket.
    Audit(OpArgs),
    /// Export a bounded playbook.
    Export(OpArgs),
    /// Report counters, index sizes, and guardrail configuration.
    Doctor(OpArgs),
    /// Upsert a learner profile.
    LearnerProfileUpdate(OpArgs),
    /// Upsert identity graph edges.
    IdentityGraphUpdate(OpArgs),
    /// Apply a misconception signal.
    MisconceptionUpdate(OpArgs),
    /// Upsert curriculum plan items.
    CurriculumPlanUpdate(OpArgs),
    /// Upsert review schedule entries.
    ReviewScheduleUpdate(OpArgs),
    /// Transition due review entries.
    ReviewScheduleClock(OpArgs),
    /// Rebalance the review schedule per UTC day.
    ReviewSetRebalance(OpArgs),
    /// Upsert a policy decision.
    PolicyDecisionUpdate(OpArgs),
    /// Evaluate recall authorization for a policy key.
    RecallAuthorization(OpArgs),
    /// Evaluate degraded tutoring mode.
    TutorDegraded(OpArgs),
    /// Export policy decisions with the audit check list.
    PolicyAuditExport(OpArgs),
    /// Start the local HTTP server.
    Serve(ServeArgs),
}

impl Commands {
    /// Splits an operation subcommand into its engine name and flags.
    fn into_operation(self) -> Result<(&'static str, OpArgs), ServeArgs> {
        match self {
            Self::Ingest(args) => Ok(("ingest", args)),
            Self::Context(args) => Ok(("context", args)),
            Self::Reflect(args) => Ok(("reflect", args)),
            Self::Validate(args) => Ok(("validate", args)),
            Self::Curate(args) => Ok(("curate", args)),
            Self::CurateGuarded(args) => Ok(("curate_guarded", args)),
            Self::Feedback(args) => Ok(("feedback", args)),
            Self::Outcome(args) => Ok(("outcome", args)),
            Self::Audit(args) => Ok(("audit", args)),
            Self::Export(args) => Ok(("export", args)),
            Self::Doctor(args) => Ok(("doctor", args)),
            Self::LearnerProfileUpdate(args) => Ok(("learner_profile_update", args)),
            Self::IdentityGraphUpdate(args) => Ok(("identity_graph_update", args)),
            Self::MisconceptionUpdate(args) => Ok(("misconception_update", args)),
            Self::CurriculumPlanUpdate(args) => Ok(("curriculum_plan_update", args)),
            Self::ReviewScheduleUpdate(args) => Ok(("review_schedule_update", args)),
            Self::ReviewScheduleClock(args) => Ok(("review_schedule_clock", args)),
            Self::ReviewSetRebalance(args) => Ok(("review_set_rebalance", args)),
            Self::PolicyDecisionUpdate(args) => Ok(("policy_decision_update", args)),
            Self::RecallAuthorization(args) => Ok(("recall_authorization", args)),
            Self::TutorDegraded(args) => Ok(("tutor_degraded", args)),
            Self::PolicyAuditExport(args) => Ok(("policy_audit_export", args)),
            Self::Serve(args) => Err(args),
        }
    }
}

// ============================================================================
// SECTION: CLI Errors
// ============================================================================

/// CLI-level failures outside the engine envelope.
#[derive(Debug, Error)]
enum CliError {
    /// Request input could not be read or parsed.
    #[error("request input error: {0}")]
    Input(String),
    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
    /// Snapshot store failure.
    #[error("snapshot error: {0}")]
    Store(#[from] SnapshotStoreError),
    /// Engine snapshot import/export failure.
    #[error("engine error: {0}")]
    Engine(String),
    /// Server bootstrap failure.
    #[error("server error: {0}")]
    Serve(String),
    /// Output stream failure.
    #[error("output error: {0}")]
    Output(String),
}

// ============================================================================
// SECTION: Request Loading
// ============================================================================

/// Loads the request document from `--input`, `--file`, or `{}`.
fn load_request(args: &OpArgs) -> Result<Value, CliError> {
    let raw = match (&args.input, &args.file) {
        (Some(_), Some(_)) => {
            return Err(CliError::Input("choose one of --input or --file".to_string()));
        }
        (Some(inline), None) => inline.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .map_err(|err| CliError::Input(format!("read {}: {err}", path.display())))?,
        (None, None) => "{}".to_string(),
    };
    if raw.len() > MAX_REQUEST_BYTES {
        return Err(CliError::Input(format!(
            "request exceeds {MAX_REQUEST_BYTES} bytes"
        )));
    }
    serde_json::from_str(&raw).map_err(|err| CliError::Input(format!("parse request: {err}")))
}

/// Injects `--store-id` when the request body omits `storeId`.
fn inject_store_id(mut request: Value, store_id: Option<&str>) -> Value {
    if let Some(store) = store_id
        && let Some(fields) = request.as_object_mut()
        && !fields.contains_key("storeId")
    {
        fields.insert("storeId".to_string(), Value::String(store.to_string()));
    }
    request
}

/// Loads the engine configuration from TOML, defaulting when absent.
fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig, CliError> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = fs::read_to_string(path)
        .map_err(|err| CliError::Config(format!("read {}: {err}", path.display())))?;
    if raw.len() > MAX_CONFIG_BYTES {
        return Err(CliError::Config(format!("config exceeds {MAX_CONFIG_BYTES} bytes")));
    }
    toml::from_str(&raw).map_err(|err| CliError::Config(format!("parse {}: {err}", path.display())))
}

/// Renders a response document for the terminal.
fn render(envelope: &Value, pretty: bool) -> Result<String, CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(envelope)
    } else {
        serde_json::to_string(envelope)
    };
    rendered.map_err(|err| CliError::Output(format!("render response: {err}")))
}

// ============================================================================
// SECTION: Operation Execution
// ============================================================================

/// Runs one operation through the full snapshot lock dance.
fn run_operation(operation: &str, args: &OpArgs) -> Result<ExitCode, CliError> {
    let config = load_config(args.config.as_ref())?;
    let request = inject_store_id(load_request(args)?, args.store_id.as_deref());

    let store = FileSnapshotStore::new(&args.state_file);
    let _lock = store.lock_exclusive()?;

    let mut engine = MemoryEngine::new(config);
    if let Some(snapshot) = store.load()? {
        engine
            .snapshot_import(&snapshot)
            .map_err(|err| CliError::Engine(err.to_string()))?;
    }

    let envelope = engine.execute_envelope(operation, &request);
    let succeeded = envelope.get("ok") != Some(&Value::Bool(false));
    if succeeded {
        let snapshot = engine
            .snapshot_export()
            .map_err(|err| CliError::Engine(err.to_string()))?;
        store.save(&snapshot)?;
    }

    let rendered = render(&envelope, args.pretty)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}").map_err(|err| CliError::Output(err.to_string()))?;

    Ok(if succeeded { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Starts the local HTTP server over the snapshot state.
fn run_serve(args: &ServeArgs) -> Result<ExitCode, CliError> {
    let config = load_config(args.config.as_ref())?;
    let store = FileSnapshotStore::new(&args.state_file);

    let mut engine = MemoryEngine::new(config);
    if let Some(snapshot) = store.load()? {
        engine
            .snapshot_import(&snapshot)
            .map_err(|err| CliError::Engine(err.to_string()))?;
    }

    let state = ServerState::with_store(engine, Arc::new(store));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::Serve(format!("runtime: {err}")))?;
    runtime
        .block_on(ums_server::serve(state, args.addr))
        .map_err(|err| CliError::Serve(err.to_string()))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    let outcome = match cli.command.into_operation() {
        Ok((operation, args)) => run_operation(operation, &args),
        Err(serve_args) => run_serve(&serve_args),
    };
    match outcome {
        Ok(code) => code,
        Err(err) => {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{err}");
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use serde_json::json;

    use super::inject_store_id;
    use super::load_request;
    use super::render;
    use super::OpArgs;

    fn bare_args() -> OpArgs {
        OpArgs {
            input: None,
            file: None,
            state_file: "ums-state.json".into(),
            store_id: None,
            config: None,
            pretty: false,
        }
    }

    #[test]
    fn missing_input_defaults_to_empty_object() {
        let request = load_request(&bare_args()).expect("request");
        assert_eq!(request, json!({}));
    }

    #[test]
    fn inline_and_file_are_mutually_exclusive() {
        let mut args = bare_args();
        args.input = Some("{}".to_string());
        args.file = Some("request.json".into());
        assert!(load_request(&args).is_err());
    }

    #[test]
    fn store_id_injects_only_when_absent() {
        let injected = inject_store_id(json!({ "profile": "p" }), Some("tenant-a"));
        assert_eq!(injected["storeId"], json!("tenant-a"));

        let kept = inject_store_id(
            json!({ "profile": "p", "storeId": "tenant-b" }),
            Some("tenant-a"),
        );
        assert_eq!(kept["storeId"], json!("tenant-b"));
    }

    #[test]
    fn render_pretty_is_multiline() {
        let value = json!({ "a": 1, "b": 2 });
        let compact = render(&value, false).expect("compact");
        let pretty = render(&value, true).expect("pretty");
        assert!(!compact.contains('\n'));
        assert!(pretty.contains('\n'));
    }
}
