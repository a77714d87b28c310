//! Manual scheduler trigger

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};

use crate::dto::{TickQuery, TickResponse};
use crate::extractors::RequireAdmin;
use crate::state::AppState;

/// Run one tick now; `?drain=true` drains the generation outbox first
pub async fn run_tick(
    State(state): State<Arc<AppState>>,
    RequireAdmin(principal): RequireAdmin,
    Query(query): Query<TickQuery>,
) -> Json<TickResponse> {
    tracing::info!(admin = %principal.owner_id, drain = query.drain, "Manual tick");
    let worker = if query.drain {
        Some(state.engine.run_worker().await)
    } else {
        None
    };
    let tick = state.engine.run_tick().await;
    Json(TickResponse { tick, worker })
}
