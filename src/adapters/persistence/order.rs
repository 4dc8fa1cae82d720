use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::order::{NewOrder, OrderProfile, OrderRepoTrait},
    domain::entities::{order_rail::OrderRail, order_state::OrderState},
};

fn row_to_order(row: sqlx::postgres::PgRow) -> OrderProfile {
    OrderProfile {
        id: row.get("id"),
        rail: row.get("rail"),
        user_id: row.get("user_id"),
        trade_number: row.get("trade_number"),
        fee_in_cents: row.get("fee_in_cents"),
        property_id: row.get("property_id"),
        order_type: row.get("order_type"),
        state: row.get("state"),
        transaction_id: row.get("transaction_id"),
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const ORDER_COLS: &str = r#"
    id, rail, user_id, trade_number, fee_in_cents, property_id, order_type,
    state, transaction_id, error_message, created_at, updated_at
"#;

#[async_trait]
impl OrderRepoTrait for PostgresPersistence {
    async fn insert(&self, order: &NewOrder, trade_number: &str) -> AppResult<OrderProfile> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (
                id, rail, user_id, trade_number, fee_in_cents, property_id,
                order_type, state
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'not_pay')
            RETURNING {}
            "#,
            ORDER_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(order.rail)
        .bind(order.user_id)
        .bind(trade_number)
        .bind(order.fee_in_cents)
        .bind(&order.property_id)
        .bind(order.order_type)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row_to_order(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<OrderProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM orders WHERE id = $1 AND is_deleted = FALSE",
            ORDER_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_order))
    }

    async fn find_by_trade_number(
        &self,
        rail: OrderRail,
        trade_number: &str,
    ) -> AppResult<Option<OrderProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM orders \
             WHERE rail = $1 AND trade_number = $2 AND is_deleted = FALSE LIMIT 1",
            ORDER_COLS
        ))
        .bind(rail)
        .bind(trade_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_order))
    }

    async fn transition(
        &self,
        id: Uuid,
        from: OrderState,
        to: OrderState,
        transaction_id: Option<&str>,
        error_message: Option<&str>,
    ) -> AppResult<Option<OrderProfile>> {
        // The state guard makes racing callbacks first-writer-wins; the
        // loser reloads and re-evaluates against the new state.
        let row = sqlx::query(&format!(
            r#"
            UPDATE orders SET
                state = $3,
                transaction_id = COALESCE($4, transaction_id),
                error_message = COALESCE($5, error_message),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND state = $2 AND is_deleted = FALSE
            RETURNING {}
            "#,
            ORDER_COLS
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(transaction_id)
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_order))
    }
}
