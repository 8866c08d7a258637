// crates/ums-core/src/runtime/ops/ingest.rs
// ============================================================================
// Module: Ingest Handler
// Description: Event ingestion with redaction, flagging, and dedup.
// Purpose: Append heterogeneous events to a bucket as immutable episodes.
// Dependencies: crate::core, crate::runtime
// ============================================================================

//! ## Overview
//! Ingest accepts raw events or source envelopes (Jira issues, chat
//! messages). Each event is redacted, screened for unsafe instructions,
//! fingerprinted, and appended. Duplicates by identifier are counted and
//! skipped; per-event validation failures are reported without failing
//! the batch; an oversized payload fails the whole call before any
//! mutation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::episode::Episode;
use crate::core::episode::EpisodeDraft;
use crate::core::errors::EngineError;
use crate::runtime::engine::MemoryEngine;
use crate::runtime::engine::RequestScope;
use crate::runtime::guardrails::ensure_ingest_budget;
use crate::runtime::guardrails::is_unsafe_instruction;
use crate::runtime::guardrails::redact_secrets;
use crate::runtime::models::build_diary;
use crate::runtime::models::build_digest;
use crate::runtime::ops::parse;
use crate::runtime::ops::to_value;
use crate::runtime::requests::EventDraftWire;
use crate::runtime::requests::IngestRequest;
use crate::runtime::responses::IngestResponse;
use crate::runtime::responses::IngestStats;
use crate::runtime::responses::RejectionNote;
use crate::runtime::responses::ResponseMeta;
use crate::runtime::state::UpsertAction;

// ============================================================================
// SECTION: Envelope Normalization
// ============================================================================

/// Flattens raw events and source envelopes into one draft list.
fn collect_event_drafts(request: &IngestRequest) -> Vec<EventDraftWire> {
    let mut drafts: Vec<EventDraftWire> = request.events.clone();
    for issue in &request.jira_issues {
        let mut content = format!("{}: {}", issue.key, issue.summary);
        if let Some(description) = &issue.description {
            content.push('\n');
            content.push_str(description);
        }
        let payload = issue
            .status
            .as_ref()
            .map(|status| serde_json::json!({ "key": issue.key, "status": status }));
        drafts.push(EventDraftWire {
            id: None,
            event_type: "jira_issue".to_string(),
            source: Some("jira".to_string()),
            content,
            payload,
            metadata: None,
            created_at: issue.updated_at,
        });
    }
    for message in &request.chat_messages {
        let payload = message
            .conversation_id
            .as_ref()
            .map(|conversation| serde_json::json!({ "conversationId": conversation }));
        drafts.push(EventDraftWire {
            id: None,
            event_type: "chat_message".to_string(),
            source: Some(format!("chat:{}", message.role)),
            content: message.content.clone(),
            payload,
            metadata: None,
            created_at: message.at,
        });
    }
    drafts
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handles the `ingest` operation.
///
/// # Errors
///
/// Returns [`EngineError::PayloadLimit`] for oversized payloads and
/// [`EngineError::Conflict`] for append-only violations; per-event
/// validation failures are reported in the response instead.
pub(crate) fn ingest(
    engine: &mut MemoryEngine,
    scope: &RequestScope,
    request: &Value,
) -> Result<Value, EngineError> {
    ensure_ingest_budget(request, &engine.config.guardrails)?;
    let typed: IngestRequest = parse(request)?;
    let drafts = collect_event_drafts(&typed);

    let mut bucket = engine.stage_bucket(scope);
    let mut accepted = 0_u64;
    let mut duplicates = 0_u64;
    let mut episode_ids = Vec::new();
    let mut rejections = Vec::new();
    let mut stats = IngestStats::default();

    for (index, draft) in drafts.into_iter().enumerate() {
        let screen = redact_secrets(&draft.content);
        let unsafe_instruction = is_unsafe_instruction(&screen.content);
        let episode = Episode::build(
            EpisodeDraft {
                id: draft.id,
                episode_type: draft.event_type,
                source: draft.source.unwrap_or_default(),
                content: screen.content,
                payload: draft.payload,
                metadata: draft.metadata,
                unsafe_instruction,
                redactions: screen.redactions,
                created_at: draft.created_at,
            },
            &scope.store_id,
            scope.now,
        );
        let episode = match episode {
            Ok(episode) => episode,
            Err(err) => {
                rejections.push(RejectionNote {
                    index,
                    code: err.code().to_string(),
                    message: err.message().to_string(),
                });
                continue;
            }
        };

        match bucket.append_episode(episode.clone())? {
            UpsertAction::Created => {
                accepted += 1;
                stats.redactions += episode.redactions;
                if episode.unsafe_instruction {
                    stats.unsafe_flagged += 1;
                }
                *stats.by_type.entry(episode.episode_type.clone()).or_insert(0) += 1;
                episode_ids.push(episode.id.as_str().to_string());
            }
            UpsertAction::Updated | UpsertAction::Noop => {
                duplicates += 1;
            }
        }
    }

    let action = if accepted > 0 {
        // Accepting events invalidates the working summaries; rebuild
        // the diary and digest from the updated episode log.
        let episodes = bucket.list_episodes(Some(usize::MAX));
        let diary = build_diary(
            &scope.store_id,
            &episodes,
            engine.config.guardrails.max_working_episode_window,
            scope.now,
        )?;
        let digest = build_digest(&scope.store_id, &episodes, scope.now)?;
        drop(episodes);
        // Working entries are regenerable; only the current pair is kept.
        bucket.working.clear();
        bucket.upsert_working(diary)?;
        bucket.upsert_working(digest)?;
        bucket.counters.record_mutation("ingest");
        UpsertAction::Created
    } else {
        UpsertAction::Noop
    };
    let observability = MemoryEngine::observability(
        &bucket,
        accepted,
        stats.redactions,
        stats.unsafe_flagged,
    );
    if action.is_mutation() {
        engine.commit_bucket(scope, bucket);
    }

    let rejected = u64::try_from(rejections.len()).unwrap_or(u64::MAX);
    let response = IngestResponse {
        meta: ResponseMeta::new(
            "ingest",
            scope.store_id.as_str(),
            scope.profile.as_str(),
            action,
            &scope.request_digest,
            observability,
        ),
        accepted,
        duplicates,
        rejected,
        episode_ids,
        rejections,
        stats,
    };
    to_value(&response)
}
