use serde::{Deserialize, Serialize};

/// Kind of batch run recorded in the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "run_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Settle,
    Expire,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Settle => "settle",
            RunKind::Expire => "expire",
        }
    }
}

/// Outcome state of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "run_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    InProgress,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::InProgress => "in_progress",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
        }
    }
}
