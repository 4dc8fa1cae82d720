pub mod balance;
pub mod order;
pub mod settlement;

use axum::{Json, Router, routing::get};

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/balances", balance::router())
        .nest("/orders", order::router())
        .nest("/settlement", settlement::router())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
