use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before it gets converted into a status response.
        tracing::error!(error = ?self, "Request failed");

        match self {
            AppError::Database(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseError, None)
            }
            AppError::WithdrawLimit => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::WithdrawLimit, None)
            }
            AppError::WithdrawDayLimit => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::WithdrawDayLimit, None)
            }
            AppError::InsufficientShells => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InsufficientShells, None)
            }
            AppError::BalanceFrozen => {
                error_resp(StatusCode::FORBIDDEN, ErrorCode::BalanceFrozen, None)
            }
            AppError::VersionConflict => {
                error_resp(StatusCode::CONFLICT, ErrorCode::VersionConflict, None)
            }
            AppError::InvalidInput(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidInput, Some(msg))
            }
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound, None),
            AppError::Internal(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError, None)
            }
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
