use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};

use crate::{adapters::http::app_state::AppState, app_error::AppResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/run", post(run_settlement))
        .route("/expire", post(run_expiry_sweep))
}

/// Manual trigger; the scheduler drives the same entry point. A run skipped
/// because another holds the lock reports `started: false`.
async fn run_settlement(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let summary = app_state.settlement_use_cases.run_settlement().await?;
    Ok(Json(serde_json::json!({
        "started": summary.is_some(),
        "summary": summary,
    })))
}

async fn run_expiry_sweep(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let summary = app_state.settlement_use_cases.run_expiry_sweep().await?;
    Ok(Json(serde_json::json!({
        "started": summary.is_some(),
        "summary": summary,
    })))
}
