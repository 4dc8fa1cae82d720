use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::event_bus::EventBusPort,
    domain::entities::domain_event::DomainEvent,
};

/// Default per-user daily withdraw cap, in cents.
pub const DEFAULT_WITHDRAW_DAY_LIMIT_IN_CENTS: i64 = 2_000_000;
/// Default creator take-rate, snapshotted onto payments at draft time.
pub const DEFAULT_WITHDRAW_PERCENT: i32 = 88;
/// How many times a version-guarded write is retried before giving up.
pub const MAX_VERSION_RETRIES: u32 = 3;

// ============================================================================
// Profile Types
// ============================================================================

/// Per-user balance aggregate. All mutations are read-modify-write gated on
/// `version`; a stale write fails and is retried, never silently overwritten.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance_in_cents: i64,
    pub balance_eligible_in_cents: i64,
    pub balance_in_shells: i64,
    pub withdraw_day_limit_in_cents: i64,
    pub withdraw_percent: i32,
    pub frozen: bool,
    pub version: i64,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Signed adjustment applied to a balance in one guarded write.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceDelta {
    pub cents: i64,
    pub eligible_cents: i64,
    pub shells: i64,
}

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait BalanceRepoTrait: Send + Sync {
    async fn get_by_user(&self, user_id: Uuid) -> AppResult<Option<BalanceProfile>>;

    /// Returns the existing row or creates a zeroed one. Creation must be
    /// race-safe (insert-on-conflict then reread).
    async fn get_or_create(&self, user_id: Uuid) -> AppResult<BalanceProfile>;

    /// Compare-and-swap write: persists `updated`'s fields only while the
    /// stored version still equals `updated.version`, bumping the version.
    /// Returns the stored row on success, None on a version conflict.
    async fn update_guarded(&self, updated: &BalanceProfile)
    -> AppResult<Option<BalanceProfile>>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct BalanceUseCases {
    balance_repo: Arc<dyn BalanceRepoTrait>,
    event_bus: Arc<dyn EventBusPort>,
}

impl BalanceUseCases {
    pub fn new(balance_repo: Arc<dyn BalanceRepoTrait>, event_bus: Arc<dyn EventBusPort>) -> Self {
        Self {
            balance_repo,
            event_bus,
        }
    }

    pub async fn get_or_create(&self, user_id: Uuid) -> AppResult<BalanceProfile> {
        self.balance_repo.get_or_create(user_id).await
    }

    /// Applies a delta under optimistic versioning: reload, recompute, CAS,
    /// retry a bounded number of times, then fail loudly. Cross-user deltas
    /// are never combined; one call touches exactly one row.
    pub async fn apply_delta(&self, user_id: Uuid, delta: BalanceDelta) -> AppResult<BalanceProfile> {
        for attempt in 0..MAX_VERSION_RETRIES {
            let balance = self
                .balance_repo
                .get_by_user(user_id)
                .await?
                .ok_or(AppError::NotFound)?;

            if balance.frozen {
                return Err(AppError::BalanceFrozen);
            }

            let next = applied(&balance, delta)?;

            if let Some(stored) = self.balance_repo.update_guarded(&next).await? {
                if delta.cents > 0 {
                    self.event_bus.publish(DomainEvent::NewBalance {
                        user_id,
                        amount_in_cents: delta.cents,
                    });
                }
                return Ok(stored);
            }

            tracing::debug!(%user_id, attempt, "balance version conflict, reloading");
        }

        Err(AppError::VersionConflict)
    }

    pub async fn add_shells(&self, user_id: Uuid, amount_in_shells: i64) -> AppResult<BalanceProfile> {
        if amount_in_shells <= 0 {
            return Err(AppError::InvalidInput("shell amount must be positive".into()));
        }
        self.apply_delta(
            user_id,
            BalanceDelta {
                shells: amount_in_shells,
                ..Default::default()
            },
        )
        .await
    }

    pub async fn consume_shells(
        &self,
        user_id: Uuid,
        amount_in_shells: i64,
    ) -> AppResult<BalanceProfile> {
        if amount_in_shells <= 0 {
            return Err(AppError::InvalidInput("shell amount must be positive".into()));
        }

        let balance = self
            .balance_repo
            .get_by_user(user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if balance.balance_in_shells < amount_in_shells {
            return Err(AppError::InsufficientShells);
        }

        match self
            .apply_delta(
                user_id,
                BalanceDelta {
                    shells: -amount_in_shells,
                    ..Default::default()
                },
            )
            .await
        {
            // A concurrent spender may have drained the balance between the
            // check and the guarded write.
            Err(AppError::InvalidInput(_)) => Err(AppError::InsufficientShells),
            other => other,
        }
    }
}

/// Computes the post-delta row, rejecting results that would violate the
/// balance invariants (negative totals, eligible exceeding total).
pub fn applied(balance: &BalanceProfile, delta: BalanceDelta) -> AppResult<BalanceProfile> {
    let overflow = || AppError::InvalidInput("balance delta overflow".into());

    let cents = balance
        .balance_in_cents
        .checked_add(delta.cents)
        .ok_or_else(overflow)?;
    let eligible = balance
        .balance_eligible_in_cents
        .checked_add(delta.eligible_cents)
        .ok_or_else(overflow)?;
    let shells = balance
        .balance_in_shells
        .checked_add(delta.shells)
        .ok_or_else(overflow)?;

    if cents < 0 || eligible < 0 || shells < 0 {
        return Err(AppError::InvalidInput(
            "balance delta would drive a field negative".into(),
        ));
    }
    if eligible > cents {
        return Err(AppError::InvalidInput(
            "eligible balance cannot exceed total balance".into(),
        ));
    }

    Ok(BalanceProfile {
        balance_in_cents: cents,
        balance_eligible_in_cents: eligible,
        balance_in_shells: shells,
        ..balance.clone()
    })
}
