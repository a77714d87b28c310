//! Matchmaking queue handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use botbrawl_matchmaking::EnqueueOutcome;
use botbrawl_types::AgentId;

use super::parse_path;
use crate::dto::{CancelQuery, CancelResponse, EnqueueRequest, QueueStatusResponse};
use crate::error::ApiResult;
use crate::extractors::{ApiJson, AuthenticatedOwner};
use crate::state::AppState;

/// Queue an agent; `201` when matched on the spot, `202` when waiting
pub async fn enqueue(
    State(state): State<Arc<AppState>>,
    AuthenticatedOwner(principal): AuthenticatedOwner,
    ApiJson(request): ApiJson<EnqueueRequest>,
) -> ApiResult<(StatusCode, Json<EnqueueOutcome>)> {
    let outcome = state
        .engine
        .enqueue(
            &principal.owner_id,
            request.agent_id,
            request.kind,
            request.challenge_target,
        )
        .await?;

    let status = match outcome {
        EnqueueOutcome::Matched { .. } => StatusCode::CREATED,
        EnqueueOutcome::Waiting { .. } => StatusCode::ACCEPTED,
    };
    Ok((status, Json(outcome)))
}

pub async fn queue_status(
    State(state): State<Arc<AppState>>,
    AuthenticatedOwner(principal): AuthenticatedOwner,
    Path(agent): Path<String>,
) -> ApiResult<Json<QueueStatusResponse>> {
    let agent_id = parse_path("agent_id", &agent, AgentId::parse)?;
    let entries = state.engine.queue_status(&principal.owner_id, &agent_id).await?;
    Ok(Json(QueueStatusResponse { agent_id, entries }))
}

/// Cancel waiting entries; optional `?kind=` narrows to one arena
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    AuthenticatedOwner(principal): AuthenticatedOwner,
    Path(agent): Path<String>,
    Query(query): Query<CancelQuery>,
) -> ApiResult<Json<CancelResponse>> {
    let agent_id = parse_path("agent_id", &agent, AgentId::parse)?;
    let cancelled = state
        .engine
        .cancel(&principal.owner_id, &agent_id, query.kind)
        .await?;
    Ok(Json(CancelResponse { cancelled }))
}
