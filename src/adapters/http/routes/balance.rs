use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{user_id}", get(get_balance))
        .route("/{user_id}/withdraw", post(create_withdraw))
        .route("/{user_id}/withdraw-quota", get(get_withdraw_quota))
        .route("/{user_id}/withdraws", get(list_withdraws))
        .route("/{user_id}/payments", get(list_payments))
}

async fn get_balance(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let balance = app_state.balance_use_cases.get_or_create(user_id).await?;
    Ok(Json(balance))
}

#[derive(Deserialize)]
struct WithdrawRequest {
    amount_in_cents: i64,
}

#[derive(Serialize)]
struct WithdrawResponse {
    balance_in_cents: i64,
    balance_eligible_in_cents: i64,
}

async fn create_withdraw(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<WithdrawRequest>,
) -> AppResult<impl IntoResponse> {
    let balance = app_state
        .payment_use_cases
        .create_withdraw(user_id, body.amount_in_cents)
        .await?;

    Ok(Json(WithdrawResponse {
        balance_in_cents: balance.balance_in_cents,
        balance_eligible_in_cents: balance.balance_eligible_in_cents,
    }))
}

async fn get_withdraw_quota(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let quota = app_state.payment_use_cases.withdraw_quota(user_id).await?;
    Ok(Json(quota))
}

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default = "default_page")]
    page: i32,
    #[serde(default = "default_per_page")]
    per_page: i32,
}

fn default_page() -> i32 {
    1
}

fn default_per_page() -> i32 {
    20
}

async fn list_payments(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    let page = app_state
        .payment_use_cases
        .payments_by_user(user_id, query.page, query.per_page)
        .await?;
    Ok(Json(page))
}

async fn list_withdraws(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    let page = app_state
        .payment_use_cases
        .withdraws_by_user(user_id, query.page, query.per_page)
        .await?;
    Ok(Json(page))
}
