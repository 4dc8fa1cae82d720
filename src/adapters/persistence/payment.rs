use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::Postgres;
use sqlx::{QueryBuilder, Row};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    adapters::persistence::balance::{BALANCE_COLS, row_to_balance},
    app_error::{AppError, AppResult},
    application::use_cases::balance::{BalanceDelta, BalanceProfile},
    application::use_cases::payment::{
        LedgerRepoTrait, NewPayment, PaginatedPayments, PaymentMaturity, PaymentProfile,
        PaymentRepoTrait, WithdrawCommit,
    },
    domain::entities::{payment_state::PaymentState, payment_type::PaymentType},
};

fn row_to_payment(row: sqlx::postgres::PgRow) -> PaymentProfile {
    PaymentProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        payee_id: row.get("payee_id"),
        trade_number: row.get("trade_number"),
        amount_in_cents: row.get("amount_in_cents"),
        amount_in_shells: row.get("amount_in_shells"),
        withdraw_percent: row.get("withdraw_percent"),
        sku_id: row.get("sku_id"),
        order_id: row.get("order_id"),
        installment: row.get("installment"),
        payment_type: row.get("payment_type"),
        state: row.get("state"),
        valid_after: row.get("valid_after"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const PAYMENT_COLS: &str = r#"
    id, user_id, payee_id, trade_number, amount_in_cents, amount_in_shells,
    withdraw_percent, sku_id, order_id, installment, payment_type, state,
    valid_after, created_at, updated_at
"#;

fn push_insert_values(builder: &mut QueryBuilder<'_, Postgres>, inputs: &[NewPayment]) {
    builder.push_values(inputs, |mut b, input| {
        b.push_bind(Uuid::new_v4())
            .push_bind(input.user_id)
            .push_bind(input.payee_id)
            .push_bind(input.trade_number.clone())
            .push_bind(input.amount_in_cents)
            .push_bind(input.amount_in_shells)
            .push_bind(input.withdraw_percent)
            .push_bind(input.sku_id.clone())
            .push_bind(input.order_id)
            .push_bind(input.installment)
            .push_bind(input.payment_type)
            .push_bind(input.state)
            .push_bind(input.valid_after);
    });
}

#[async_trait]
impl PaymentRepoTrait for PostgresPersistence {
    async fn insert_batch(&self, inputs: &[NewPayment]) -> AppResult<Vec<PaymentProfile>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO payments (
                id, user_id, payee_id, trade_number, amount_in_cents,
                amount_in_shells, withdraw_percent, sku_id, order_id,
                installment, payment_type, state, valid_after
            ) ",
        );
        push_insert_values(&mut builder, inputs);
        // The (order_id, installment) unique index is the idempotency guard:
        // a re-delivered callback inserts nothing and reads back the
        // existing rows instead.
        builder.push(" ON CONFLICT (order_id, installment) DO NOTHING ");
        builder.push(format!("RETURNING {}", PAYMENT_COLS));

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_payment).collect())
    }

    async fn list_by_order(&self, order_id: Uuid) -> AppResult<Vec<PaymentProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payments \
             WHERE order_id = $1 AND is_deleted = FALSE ORDER BY installment",
            PAYMENT_COLS
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_payment).collect())
    }

    async fn find_by_trade_number_and_type(
        &self,
        trade_number: &str,
        payment_type: PaymentType,
    ) -> AppResult<Option<PaymentProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments \
             WHERE trade_number = $1 AND payment_type = $2 AND is_deleted = FALSE \
             LIMIT 1",
            PAYMENT_COLS
        ))
        .bind(trade_number)
        .bind(payment_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_payment))
    }

    async fn open_payments(&self, schedule: &[PaymentMaturity]) -> AppResult<u64> {
        if schedule.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        let mut opened = 0u64;
        for maturity in schedule {
            let result = sqlx::query(
                "UPDATE payments SET state = 'open', valid_after = $2, \
                 updated_at = CURRENT_TIMESTAMP \
                 WHERE id = $1 AND state IN ('drafted', 'pending') AND is_deleted = FALSE",
            )
            .bind(maturity.payment_id)
            .bind(maturity.valid_after)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
            opened += result.rows_affected();
        }
        tx.commit().await.map_err(AppError::from)?;

        Ok(opened)
    }

    async fn hold_for_order(&self, order_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE payments SET state = 'pending', updated_at = CURRENT_TIMESTAMP \
             WHERE order_id = $1 AND state IN ('drafted', 'open') AND is_deleted = FALSE",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected())
    }

    async fn release_for_order(&self, order_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE payments SET state = 'open', updated_at = CURRENT_TIMESTAMP \
             WHERE order_id = $1 AND state = 'pending' AND is_deleted = FALSE",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected())
    }

    async fn list_settleable(
        &self,
        types: &[PaymentType],
        before: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<PaymentProfile>> {
        self.list_batch(types, PaymentState::Open, before, limit).await
    }

    async fn list_expired_pending(
        &self,
        types: &[PaymentType],
        before: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<PaymentProfile>> {
        self.list_batch(types, PaymentState::Pending, before, limit).await
    }

    async fn sum_withdraws_since(&self, user_id: Uuid, since: NaiveDateTime) -> AppResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_in_cents), 0)::BIGINT FROM payments \
             WHERE user_id = $1 AND payment_type = 'withdraw' \
               AND created_at >= $2 AND is_deleted = FALSE",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(total)
    }

    async fn count_open_withdraws(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM payments \
             WHERE payment_type = 'withdraw' AND state = 'open' AND is_deleted = FALSE",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(count)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        page: i32,
        per_page: i32,
    ) -> AppResult<PaginatedPayments> {
        self.page_for_user(user_id, None, page, per_page).await
    }

    async fn list_withdraws_by_user(
        &self,
        user_id: Uuid,
        page: i32,
        per_page: i32,
    ) -> AppResult<PaginatedPayments> {
        self.page_for_user(user_id, Some(PaymentType::Withdraw), page, per_page)
            .await
    }
}

impl PostgresPersistence {
    async fn list_batch(
        &self,
        types: &[PaymentType],
        state: PaymentState,
        before: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<PaymentProfile>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM payments WHERE state = ",
            PAYMENT_COLS
        ));
        builder.push_bind(state);
        builder.push(" AND payment_type = ANY(");
        builder.push_bind(types.to_vec());
        builder.push(") AND valid_after <= ").push_bind(before);
        builder.push(" AND payee_id IS NOT NULL AND is_deleted = FALSE");
        // Oldest first bounds staleness: nothing waits forever behind newer
        // entries.
        builder.push(" ORDER BY created_at LIMIT ").push_bind(limit);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_payment).collect())
    }

    async fn page_for_user(
        &self,
        user_id: Uuid,
        payment_type: Option<PaymentType>,
        page: i32,
        per_page: i32,
    ) -> AppResult<PaginatedPayments> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);
        let offset = (page - 1) * per_page;

        let mut count_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM payments WHERE user_id = ");
        count_builder.push_bind(user_id);
        if let Some(t) = payment_type {
            count_builder.push(" AND payment_type = ").push_bind(t);
        }
        count_builder.push(" AND is_deleted = FALSE");

        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;

        let mut data_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM payments WHERE user_id = ",
            PAYMENT_COLS
        ));
        data_builder.push_bind(user_id);
        if let Some(t) = payment_type {
            data_builder.push(" AND payment_type = ").push_bind(t);
        }
        data_builder.push(" AND is_deleted = FALSE ORDER BY created_at DESC");
        data_builder.push(" LIMIT ").push_bind(per_page);
        data_builder.push(" OFFSET ").push_bind(offset);

        let rows = data_builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;

        let payments: Vec<PaymentProfile> = rows.into_iter().map(row_to_payment).collect();
        let total_pages = ((total as f64) / (per_page as f64)).ceil() as i32;

        Ok(PaginatedPayments {
            payments,
            total,
            page,
            per_page,
            total_pages,
        })
    }
}

#[async_trait]
impl LedgerRepoTrait for PostgresPersistence {
    async fn settle_bucket(
        &self,
        balance: &BalanceProfile,
        delta: BalanceDelta,
        payment_ids: &[Uuid],
    ) -> AppResult<bool> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let result = sqlx::query(
            "UPDATE balances SET \
                balance_in_cents = balance_in_cents + $3, \
                balance_eligible_in_cents = balance_eligible_in_cents + $4, \
                balance_in_shells = balance_in_shells + $5, \
                version = version + 1, \
                updated_at = CURRENT_TIMESTAMP \
             WHERE id = $1 AND version = $2 AND frozen = FALSE AND is_deleted = FALSE",
        )
        .bind(balance.id)
        .bind(balance.version)
        .bind(delta.cents)
        .bind(delta.eligible_cents)
        .bind(delta.shells)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(AppError::from)?;
            return Ok(false);
        }

        // Closing in the same transaction is the point: a reader never sees
        // the credit without the closes, or the closes without the credit.
        let closed = sqlx::query(
            "UPDATE payments SET state = 'closed', updated_at = CURRENT_TIMESTAMP \
             WHERE id = ANY($1) AND state = 'open' AND is_deleted = FALSE",
        )
        .bind(payment_ids)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if closed.rows_affected() != payment_ids.len() as u64 {
            // Someone closed part of the bucket under us; crediting for rows
            // we did not close would double money.
            tx.rollback().await.map_err(AppError::from)?;
            tracing::warn!(
                expected = payment_ids.len(),
                closed = closed.rows_affected(),
                "settle bucket raced on payment states, rolled back"
            );
            return Ok(false);
        }

        tx.commit().await.map_err(AppError::from)?;
        Ok(true)
    }

    async fn close_expired(&self, payment_ids: &[Uuid]) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE payments SET state = 'closed', updated_at = CURRENT_TIMESTAMP \
             WHERE id = ANY($1) AND state = 'pending' AND is_deleted = FALSE",
        )
        .bind(payment_ids)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected())
    }

    async fn commit_withdraw(
        &self,
        balance: &BalanceProfile,
        amount_in_cents: i64,
        since: NaiveDateTime,
        payment: &NewPayment,
    ) -> AppResult<WithdrawCommit> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        // The day-window sum runs inside the transaction so a racing
        // withdraw cannot slip past the cap on a stale sum: the loser of the
        // version guard below reloads and re-checks.
        let withdrawn_today: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_in_cents), 0)::BIGINT FROM payments \
             WHERE user_id = $1 AND payment_type = 'withdraw' \
               AND created_at >= $2 AND is_deleted = FALSE",
        )
        .bind(balance.user_id)
        .bind(since)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if withdrawn_today + amount_in_cents > balance.withdraw_day_limit_in_cents {
            tx.rollback().await.map_err(AppError::from)?;
            return Ok(WithdrawCommit::DayLimitExceeded);
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE balances SET
                balance_in_cents = balance_in_cents - $3,
                balance_eligible_in_cents = balance_eligible_in_cents - $3,
                version = version + 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND version = $2 AND frozen = FALSE
              AND balance_eligible_in_cents >= $3 AND is_deleted = FALSE
            RETURNING {}
            "#,
            BALANCE_COLS
        ))
        .bind(balance.id)
        .bind(balance.version)
        .bind(amount_in_cents)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let Some(row) = row else {
            tx.rollback().await.map_err(AppError::from)?;
            return Ok(WithdrawCommit::Conflict);
        };
        let updated_balance = row_to_balance(row);

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO payments (
                id, user_id, payee_id, trade_number, amount_in_cents,
                amount_in_shells, withdraw_percent, sku_id, order_id,
                installment, payment_type, state, valid_after
            ) ",
        );
        push_insert_values(&mut builder, std::slice::from_ref(payment));
        builder.push(format!("RETURNING {}", PAYMENT_COLS));

        let payment_row = builder
            .build()
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::from)?;
        let inserted = row_to_payment(payment_row);

        tx.commit().await.map_err(AppError::from)?;

        Ok(WithdrawCommit::Committed {
            balance: updated_balance,
            payment: inserted,
        })
    }
}
