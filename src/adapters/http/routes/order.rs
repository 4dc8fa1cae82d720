use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::use_cases::order::{GatewayNotification, NewOrder},
    application::use_cases::payment::PurchaseSpec,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(place_order))
        .route("/{order_id}", get(get_order))
        .route("/{order_id}/payments", post(record_payments))
        .route("/{order_id}/refund", post(request_refund))
        .route("/callback", post(gateway_callback))
}

async fn place_order(
    State(app_state): State<AppState>,
    Json(body): Json<NewOrder>,
) -> AppResult<impl IntoResponse> {
    let order = app_state.order_use_cases.place_order(&body).await?;
    Ok(Json(order))
}

async fn get_order(
    State(app_state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let order = app_state.order_use_cases.get_order(order_id).await?;
    Ok(Json(order))
}

/// Entry point for the gateway adapters: they parse the wire callback into a
/// `GatewayNotification` and hand it over here.
async fn gateway_callback(
    State(app_state): State<AppState>,
    Json(body): Json<GatewayNotification>,
) -> AppResult<impl IntoResponse> {
    let order = app_state
        .order_use_cases
        .apply_gateway_notification(&body)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(order))
}

/// The platform resolves what the order bought (sku, payee) and calls this
/// to derive the ledger entries. Idempotent.
async fn record_payments(
    State(app_state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(spec): Json<PurchaseSpec>,
) -> AppResult<impl IntoResponse> {
    let order = app_state.order_use_cases.get_order(order_id).await?;
    let payments = app_state
        .payment_use_cases
        .record_payment_from_order(&order, &spec)
        .await?;
    Ok(Json(payments))
}

async fn request_refund(
    State(app_state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let order = app_state.order_use_cases.request_refund(order_id).await?;
    Ok(Json(order))
}
