use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::balance::{
        BalanceProfile, BalanceRepoTrait, DEFAULT_WITHDRAW_DAY_LIMIT_IN_CENTS,
        DEFAULT_WITHDRAW_PERCENT,
    },
};

pub(crate) fn row_to_balance(row: sqlx::postgres::PgRow) -> BalanceProfile {
    BalanceProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        balance_in_cents: row.get("balance_in_cents"),
        balance_eligible_in_cents: row.get("balance_eligible_in_cents"),
        balance_in_shells: row.get("balance_in_shells"),
        withdraw_day_limit_in_cents: row.get("withdraw_day_limit_in_cents"),
        withdraw_percent: row.get("withdraw_percent"),
        frozen: row.get("frozen"),
        version: row.get("version"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(crate) const BALANCE_COLS: &str = r#"
    id, user_id, balance_in_cents, balance_eligible_in_cents, balance_in_shells,
    withdraw_day_limit_in_cents, withdraw_percent, frozen, version,
    created_at, updated_at
"#;

#[async_trait]
impl BalanceRepoTrait for PostgresPersistence {
    async fn get_by_user(&self, user_id: Uuid) -> AppResult<Option<BalanceProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM balances WHERE user_id = $1 AND is_deleted = FALSE",
            BALANCE_COLS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_balance))
    }

    async fn get_or_create(&self, user_id: Uuid) -> AppResult<BalanceProfile> {
        // Race-safe lazy creation: losing the insert race is fine, the
        // follow-up select returns whichever row won.
        sqlx::query(
            r#"
            INSERT INTO balances (
                id, user_id, balance_in_cents, balance_eligible_in_cents,
                balance_in_shells, withdraw_day_limit_in_cents, withdraw_percent,
                frozen, version
            )
            VALUES ($1, $2, 0, 0, 0, $3, $4, FALSE, 0)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(DEFAULT_WITHDRAW_DAY_LIMIT_IN_CENTS)
        .bind(DEFAULT_WITHDRAW_PERCENT)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM balances WHERE user_id = $1 AND is_deleted = FALSE",
            BALANCE_COLS
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row_to_balance(row))
    }

    async fn update_guarded(
        &self,
        updated: &BalanceProfile,
    ) -> AppResult<Option<BalanceProfile>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE balances SET
                balance_in_cents = $3,
                balance_eligible_in_cents = $4,
                balance_in_shells = $5,
                withdraw_day_limit_in_cents = $6,
                withdraw_percent = $7,
                frozen = $8,
                version = version + 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND version = $2 AND is_deleted = FALSE
            RETURNING {}
            "#,
            BALANCE_COLS
        ))
        .bind(updated.id)
        .bind(updated.version)
        .bind(updated.balance_in_cents)
        .bind(updated.balance_eligible_in_cents)
        .bind(updated.balance_in_shells)
        .bind(updated.withdraw_day_limit_in_cents)
        .bind(updated.withdraw_percent)
        .bind(updated.frozen)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_balance))
    }
}
