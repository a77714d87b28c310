//! API routes

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// Create API v1 routes
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/matchmaking", matchmaking_routes())
        .nest("/battles", battle_routes())
        .route("/pools/:id/odds", get(handlers::betting::pool_odds))
        .route("/pools/:id/stakes", post(handlers::betting::place_stake))
        .route("/accounts/me", get(handlers::accounts::my_balance))
        .route("/accounts/me/deposit", post(handlers::accounts::deposit))
        .route("/leaderboard/:kind", get(handlers::battles::leaderboard))
        .route("/admin/tick", post(handlers::admin::run_tick))
}

fn matchmaking_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/queue", post(handlers::matchmaking::enqueue))
        .route(
            "/queue/:agent",
            get(handlers::matchmaking::queue_status).delete(handlers::matchmaking::cancel),
        )
}

fn battle_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:id", get(handlers::battles::get_battle))
        .route("/:id/votes", post(handlers::battles::cast_vote))
        .route("/:id/moves", post(handlers::battles::submit_move))
        .route("/:id/pool", get(handlers::betting::pool_for_battle))
}
