//! Battle handlers: read, vote, play chess moves, leaderboards

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use botbrawl_battle::{Battle, LeaderboardEntry};
use botbrawl_types::{ArenaKind, BattleId};

use super::parse_path;
use crate::dto::{LeaderboardQuery, MoveRequest, VoteRequest};
use crate::error::ApiResult;
use crate::extractors::{ApiJson, AuthenticatedOwner};
use crate::state::AppState;

/// Battles are public
pub async fn get_battle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Battle>> {
    let battle_id = parse_path("battle_id", &id, BattleId::parse)?;
    Ok(Json(state.engine.battle(&battle_id).await?))
}

pub async fn cast_vote(
    State(state): State<Arc<AppState>>,
    AuthenticatedOwner(principal): AuthenticatedOwner,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<VoteRequest>,
) -> ApiResult<Json<Battle>> {
    let battle_id = parse_path("battle_id", &id, BattleId::parse)?;
    let battle = state
        .engine
        .cast_vote(principal.owner_id, &battle_id, request.side)
        .await?;
    Ok(Json(battle))
}

pub async fn submit_move(
    State(state): State<Arc<AppState>>,
    AuthenticatedOwner(principal): AuthenticatedOwner,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<MoveRequest>,
) -> ApiResult<Json<Battle>> {
    let battle_id = parse_path("battle_id", &id, BattleId::parse)?;
    let battle = state
        .engine
        .submit_move(&principal.owner_id, &battle_id, &request.agent_id, &request.mv)
        .await?;
    Ok(Json(battle))
}

pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let kind: ArenaKind = kind.parse()?;
    Ok(Json(state.engine.leaderboard(kind, query.clamped_limit())))
}
