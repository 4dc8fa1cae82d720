use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::settlement::{RunProfile, SettlementRunRepoTrait},
    domain::entities::run_state::RunKind,
};

fn row_to_run(row: sqlx::postgres::PgRow) -> AppResult<RunProfile> {
    let payment_ids: serde_json::Value = row.get("payment_ids");
    let payment_ids: Vec<Uuid> = serde_json::from_value(payment_ids)
        .map_err(|e| AppError::Internal(format!("corrupt run payment_ids: {e}")))?;

    Ok(RunProfile {
        id: row.get("id"),
        kind: row.get("kind"),
        state: row.get("state"),
        payment_ids,
        description: row.get("description"),
        started_at: row.get("started_at"),
        finished_at: row.get("finished_at"),
    })
}

const RUN_COLS: &str = r#"
    id, kind, state, payment_ids, description, started_at, finished_at
"#;

#[async_trait]
impl SettlementRunRepoTrait for PostgresPersistence {
    async fn initialize(&self, kind: RunKind) -> AppResult<RunProfile> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO settlement_runs (id, kind, state, payment_ids, started_at)
            VALUES ($1, $2, 'in_progress', '[]'::jsonb, CURRENT_TIMESTAMP)
            RETURNING {}
            "#,
            RUN_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(kind)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        row_to_run(row)
    }

    async fn append_payment_ids(&self, run_id: Uuid, ids: &[Uuid]) -> AppResult<()> {
        let appended = serde_json::to_value(ids)
            .map_err(|e| AppError::Internal(format!("serialize payment ids: {e}")))?;

        sqlx::query(
            "UPDATE settlement_runs SET payment_ids = payment_ids || $2 WHERE id = $1",
        )
        .bind(run_id)
        .bind(appended)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn succeed(&self, run_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE settlement_runs SET state = 'succeeded', \
             finished_at = CURRENT_TIMESTAMP WHERE id = $1",
        )
        .bind(run_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn fail(&self, run_id: Uuid, description: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE settlement_runs SET state = 'failed', description = $2, \
             finished_at = CURRENT_TIMESTAMP WHERE id = $1",
        )
        .bind(run_id)
        .bind(description)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(())
    }
}
