use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::payment::{PaymentRepoTrait, generate_trade_number},
    domain::entities::{
        order_rail::OrderRail, order_state::OrderState, order_type::OrderType,
    },
};

// ============================================================================
// Profile Types
// ============================================================================

/// One gateway transaction, the provenance record a Payment derives from.
/// Gateway transients (signature, prepay id, order string) are never
/// persisted here.
#[derive(Debug, Clone, Serialize)]
pub struct OrderProfile {
    pub id: Uuid,
    pub rail: OrderRail,
    pub user_id: Uuid,
    pub trade_number: String,
    pub fee_in_cents: i64,
    pub property_id: String,
    pub order_type: OrderType,
    pub state: OrderState,
    pub transaction_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub rail: OrderRail,
    pub user_id: Uuid,
    pub fee_in_cents: i64,
    pub property_id: String,
    pub order_type: OrderType,
}

/// A gateway callback or poll response, already parsed by the gateway
/// adapter. Wire formats are the adapter's concern.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayNotification {
    pub rail: OrderRail,
    pub trade_number: String,
    pub result: GatewayResult,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GatewayResult {
    Paid { transaction_id: String },
    UserPaying,
    Failed { error: String },
    Closed,
    Revoked,
    RefundSucceeded { transaction_id: String },
    RefundFailed { error: String },
    Unparseable,
}

impl GatewayResult {
    fn target_state(&self) -> OrderState {
        match self {
            GatewayResult::Paid { .. } => OrderState::Success,
            GatewayResult::UserPaying => OrderState::UserPaying,
            GatewayResult::Failed { .. } => OrderState::PayError,
            GatewayResult::Closed => OrderState::Closed,
            GatewayResult::Revoked => OrderState::Revoked,
            GatewayResult::RefundSucceeded { .. } => OrderState::Refunded,
            GatewayResult::RefundFailed { .. } => OrderState::PayError,
            GatewayResult::Unparseable => OrderState::Unknown,
        }
    }

    fn transaction_id(&self) -> Option<&str> {
        match self {
            GatewayResult::Paid { transaction_id }
            | GatewayResult::RefundSucceeded { transaction_id } => Some(transaction_id),
            _ => None,
        }
    }

    fn error_message(&self) -> Option<&str> {
        match self {
            GatewayResult::Failed { error } | GatewayResult::RefundFailed { error } => Some(error),
            _ => None,
        }
    }
}

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait OrderRepoTrait: Send + Sync {
    async fn insert(&self, order: &NewOrder, trade_number: &str) -> AppResult<OrderProfile>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<OrderProfile>>;

    async fn find_by_trade_number(
        &self,
        rail: OrderRail,
        trade_number: &str,
    ) -> AppResult<Option<OrderProfile>>;

    /// State-guarded update: applies only while the stored state still equals
    /// `from`, so two racing callbacks cannot both transition the row.
    /// Returns the updated row, or None if the guard failed.
    async fn transition(
        &self,
        id: Uuid,
        from: OrderState,
        to: OrderState,
        transaction_id: Option<&str>,
        error_message: Option<&str>,
    ) -> AppResult<Option<OrderProfile>>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct OrderUseCases {
    order_repo: Arc<dyn OrderRepoTrait>,
    payment_repo: Arc<dyn PaymentRepoTrait>,
}

impl OrderUseCases {
    pub fn new(order_repo: Arc<dyn OrderRepoTrait>, payment_repo: Arc<dyn PaymentRepoTrait>) -> Self {
        Self {
            order_repo,
            payment_repo,
        }
    }

    /// Creates a NOTPAY order with a fresh trade number. The gateway adapter
    /// attaches its transients (prepay id, signature) to the response without
    /// persisting them.
    pub async fn place_order(&self, input: &NewOrder) -> AppResult<OrderProfile> {
        if input.fee_in_cents <= 0 {
            return Err(AppError::InvalidInput("order fee must be positive".into()));
        }
        self.order_repo
            .insert(input, &generate_trade_number())
            .await
    }

    pub async fn get_order(&self, id: Uuid) -> AppResult<OrderProfile> {
        self.order_repo
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Applies one parsed gateway callback / poll response. Tolerates
    /// duplicates and out-of-order delivery: absorbed transitions return the
    /// stored row unchanged. Returns None for an unknown trade number.
    pub async fn apply_gateway_notification(
        &self,
        notification: &GatewayNotification,
    ) -> AppResult<Option<OrderProfile>> {
        let Some(order) = self
            .order_repo
            .find_by_trade_number(notification.rail, &notification.trade_number)
            .await?
        else {
            tracing::warn!(
                rail = %notification.rail,
                trade_number = %notification.trade_number,
                "gateway notification for unknown order"
            );
            return Ok(None);
        };

        let target = notification.result.target_state();
        if !order.state.accepts(target) {
            tracing::debug!(
                order_id = %order.id,
                from = %order.state,
                to = %target,
                "gateway notification absorbed"
            );
            return Ok(Some(order));
        }

        let updated = self
            .order_repo
            .transition(
                order.id,
                order.state,
                target,
                notification.result.transaction_id(),
                notification.result.error_message(),
            )
            .await?;

        let Some(updated) = updated else {
            // A concurrent callback won the guard; the stored state already
            // moved on. Reload and report what is there now.
            return self.order_repo.get_by_id(order.id).await;
        };

        self.sync_held_payments(&order.state, &updated).await?;

        Ok(Some(updated))
    }

    /// Starts a refund: SUCCESS -> REFUNDING, holding the order's not-yet
    /// settled ledger entries so the settler cannot credit money that is
    /// about to leave.
    pub async fn request_refund(&self, order_id: Uuid) -> AppResult<OrderProfile> {
        let order = self.get_order(order_id).await?;
        if !order.state.accepts(OrderState::Refunding) {
            return Err(AppError::InvalidInput(format!(
                "order in state {} cannot be refunded",
                order.state
            )));
        }

        let updated = self
            .order_repo
            .transition(order.id, order.state, OrderState::Refunding, None, None)
            .await?
            .ok_or(AppError::VersionConflict)?;

        let held = self.payment_repo.hold_for_order(order.id).await?;
        tracing::info!(order_id = %order.id, held, "refund requested, ledger entries held");
        Ok(updated)
    }

    /// Keeps the ledger's held/open status in step with refund-track
    /// transitions.
    async fn sync_held_payments(&self, from: &OrderState, updated: &OrderProfile) -> AppResult<()> {
        match updated.state {
            // A refund confirmation that overtook the REFUNDING poll: hold
            // now; the expiry sweep closes the held rows once their window
            // lapses.
            OrderState::Refunded => {
                let held = self.payment_repo.hold_for_order(updated.id).await?;
                if held > 0 {
                    tracing::info!(order_id = %updated.id, held, "refunded order ledger entries held");
                }
            }
            // Refund failed: the money stays, the entries settle normally.
            OrderState::PayError if *from == OrderState::Refunding => {
                let released = self.payment_repo.release_for_order(updated.id).await?;
                if released > 0 {
                    tracing::info!(order_id = %updated.id, released, "refund failed, ledger entries released");
                }
            }
            _ => {}
        }
        Ok(())
    }
}
