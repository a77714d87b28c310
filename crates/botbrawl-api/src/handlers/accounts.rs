//! Account handlers

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::dto::{BalanceResponse, DepositRequest};
use crate::error::ApiResult;
use crate::extractors::{ApiJson, AuthenticatedOwner, RequireAdmin};
use crate::state::AppState;

pub async fn my_balance(
    State(state): State<Arc<AppState>>,
    AuthenticatedOwner(principal): AuthenticatedOwner,
) -> Json<BalanceResponse> {
    let balance = state.engine.balance(&principal.owner_id).await;
    Json(BalanceResponse::new(principal.owner_id, balance))
}

/// Faucet credit; admin tokens only
pub async fn deposit(
    State(state): State<Arc<AppState>>,
    RequireAdmin(principal): RequireAdmin,
    ApiJson(request): ApiJson<DepositRequest>,
) -> ApiResult<Json<BalanceResponse>> {
    let owner_id = request.owner_id.unwrap_or(principal.owner_id);
    let balance = state.engine.deposit(&owner_id, request.amount).await?;
    tracing::info!(owner_id = %owner_id, amount = request.amount, admin = %principal.owner_id, "Faucet deposit");
    Ok(Json(BalanceResponse::new(owner_id, balance)))
}
