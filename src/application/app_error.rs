use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Withdraw amount exceeds eligible balance")]
    WithdrawLimit,

    #[error("Withdraw amount exceeds the daily limit")]
    WithdrawDayLimit,

    #[error("Insufficient shell balance")]
    InsufficientShells,

    #[error("Balance is frozen")]
    BalanceFrozen,

    #[error("Concurrent update conflict, retries exhausted")]
    VersionConflict,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    WithdrawLimit,
    WithdrawDayLimit,
    InsufficientShells,
    BalanceFrozen,
    VersionConflict,
    InvalidInput,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::WithdrawLimit => "WITHDRAW_LIMIT",
            ErrorCode::WithdrawDayLimit => "WITHDRAW_DAY_LIMIT",
            ErrorCode::InsufficientShells => "INSUFFICIENT_SHELLS",
            ErrorCode::BalanceFrozen => "BALANCE_FROZEN",
            ErrorCode::VersionConflict => "VERSION_CONFLICT",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
