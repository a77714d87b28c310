//! Betting pool handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use botbrawl_betting::{BetPool, PoolOdds, StakeReceipt};
use botbrawl_types::{BattleId, PoolId};

use super::parse_path;
use crate::dto::StakeRequest;
use crate::error::ApiResult;
use crate::extractors::{ApiJson, AuthenticatedOwner};
use crate::state::AppState;

pub async fn pool_for_battle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<BetPool>> {
    let battle_id = parse_path("battle_id", &id, BattleId::parse)?;
    Ok(Json(state.engine.pool_for_battle(&battle_id).await?))
}

pub async fn pool_odds(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<PoolOdds>> {
    let pool_id = parse_path("pool_id", &id, PoolId::parse)?;
    Ok(Json(state.engine.pool_odds(&pool_id).await?))
}

/// Lock funds on a side; the receipt carries the new balance
pub async fn place_stake(
    State(state): State<Arc<AppState>>,
    AuthenticatedOwner(principal): AuthenticatedOwner,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<StakeRequest>,
) -> ApiResult<(StatusCode, Json<StakeReceipt>)> {
    let pool_id = parse_path("pool_id", &id, PoolId::parse)?;
    let receipt = state
        .engine
        .place_stake(&principal.owner_id, &pool_id, request.side, request.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
