use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::{dist_lock::DistributedLockPort, event_bus::EventBusPort},
    application::use_cases::balance::{
        BalanceDelta, BalanceProfile, BalanceRepoTrait, MAX_VERSION_RETRIES,
    },
    application::use_cases::payment::{LedgerRepoTrait, PaymentProfile, PaymentRepoTrait},
    domain::entities::{
        domain_event::DomainEvent,
        payment_type::PaymentType,
        run_state::{RunKind, RunState},
    },
};

/// Lock key shared by the settle and expire runs; the two must never overlap.
pub const SETTLER_LOCK_KEY: &str = "settler";
/// Lock TTL: long enough for any realistic run, short enough that a crashed
/// process cannot wedge the next day's schedule.
pub const SETTLER_LOCK_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_BATCH_SIZE: i64 = 5000;
pub const DEFAULT_WORKER_COUNT: usize = 4;

// ============================================================================
// Run log
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RunProfile {
    pub id: Uuid,
    pub kind: RunKind,
    pub state: RunState,
    pub payment_ids: Vec<Uuid>,
    pub description: Option<String>,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
}

#[async_trait]
pub trait SettlementRunRepoTrait: Send + Sync {
    async fn initialize(&self, kind: RunKind) -> AppResult<RunProfile>;

    /// Appends successfully closed payment ids to the run row.
    async fn append_payment_ids(&self, run_id: Uuid, ids: &[Uuid]) -> AppResult<()>;

    async fn succeed(&self, run_id: Uuid) -> AppResult<()>;

    async fn fail(&self, run_id: Uuid, description: &str) -> AppResult<()>;
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SettlementSummary {
    pub run_id: Uuid,
    pub closed: usize,
}

// ============================================================================
// Use Cases
// ============================================================================

/// The batch job that matures open ledger entries into creator balance.
///
/// Safety model: one distributed lock per run window; within a run, payments
/// are partitioned by payee and a payee's bucket is processed by exactly one
/// worker, so the balance row's version guard never sees contention from
/// inside the run (only from concurrent withdraws). Each bucket commits its
/// balance credit and payment closes in one transaction, which makes the
/// whole job idempotent and resumable at bucket granularity.
#[derive(Clone)]
pub struct SettlementUseCases {
    payment_repo: Arc<dyn PaymentRepoTrait>,
    balance_repo: Arc<dyn BalanceRepoTrait>,
    ledger_repo: Arc<dyn LedgerRepoTrait>,
    run_repo: Arc<dyn SettlementRunRepoTrait>,
    lock: Arc<dyn DistributedLockPort>,
    event_bus: Arc<dyn EventBusPort>,
    worker_count: usize,
    batch_size: i64,
}

impl SettlementUseCases {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        payment_repo: Arc<dyn PaymentRepoTrait>,
        balance_repo: Arc<dyn BalanceRepoTrait>,
        ledger_repo: Arc<dyn LedgerRepoTrait>,
        run_repo: Arc<dyn SettlementRunRepoTrait>,
        lock: Arc<dyn DistributedLockPort>,
        event_bus: Arc<dyn EventBusPort>,
        worker_count: usize,
        batch_size: i64,
    ) -> Self {
        Self {
            payment_repo,
            balance_repo,
            ledger_repo,
            run_repo,
            lock,
            event_bus,
            worker_count: worker_count.max(1),
            batch_size,
        }
    }

    /// Promotes matured open payments into creator balances. Returns None
    /// when another run owns the window.
    pub async fn run_settlement(&self) -> AppResult<Option<SettlementSummary>> {
        self.run(RunKind::Settle).await
    }

    /// Closes lapsed pending payments without crediting balance.
    pub async fn run_expiry_sweep(&self) -> AppResult<Option<SettlementSummary>> {
        self.run(RunKind::Expire).await
    }

    async fn run(&self, kind: RunKind) -> AppResult<Option<SettlementSummary>> {
        if !self.lock.try_acquire(SETTLER_LOCK_KEY, SETTLER_LOCK_TTL).await? {
            tracing::info!(kind = kind.as_str(), "settler lock busy, skipping run");
            return Ok(None);
        }

        let result = self.run_locked(kind).await;

        if let Err(e) = self.lock.release(SETTLER_LOCK_KEY).await {
            tracing::warn!(error = %e, "failed to release settler lock, TTL will reclaim it");
        }

        result.map(Some)
    }

    async fn run_locked(&self, kind: RunKind) -> AppResult<SettlementSummary> {
        tracing::info!(kind = kind.as_str(), "starting settler run");
        let run = self.run_repo.initialize(kind).await?;

        match self.drain(kind, run.id).await {
            Ok(closed) => {
                if kind == RunKind::Settle {
                    self.report_withdraw_backlog().await;
                }
                self.run_repo.succeed(run.id).await?;
                tracing::info!(kind = kind.as_str(), closed, "settler run finished");
                Ok(SettlementSummary {
                    run_id: run.id,
                    closed,
                })
            }
            Err(e) => {
                // Buckets already committed stay committed; the run row keeps
                // their ids and the next schedule retries the remainder.
                if let Err(log_err) = self.run_repo.fail(run.id, &e.to_string()).await {
                    tracing::error!(error = %log_err, "failed to record settler run failure");
                }
                Err(e)
            }
        }
    }

    /// Pages through the backlog until a fetch comes back empty or a page
    /// makes no progress (every bucket skipped or failed).
    async fn drain(&self, kind: RunKind, run_id: Uuid) -> AppResult<usize> {
        let mut total_closed = 0usize;

        loop {
            let now = chrono::Utc::now().naive_utc();
            let page = match kind {
                RunKind::Settle => {
                    self.payment_repo
                        .list_settleable(&PaymentType::SETTLEABLE, now, self.batch_size)
                        .await?
                }
                RunKind::Expire => {
                    self.payment_repo
                        .list_expired_pending(&PaymentType::SETTLEABLE, now, self.batch_size)
                        .await?
                }
            };

            // Entries without a payee have nothing to credit; the repo query
            // excludes them, this is a defensive re-check.
            let page: Vec<PaymentProfile> =
                page.into_iter().filter(|p| p.payee_id.is_some()).collect();
            if page.is_empty() {
                break;
            }

            let mut groups: Vec<HashMap<Uuid, Vec<PaymentProfile>>> =
                (0..self.worker_count).map(|_| HashMap::new()).collect();
            for payment in page {
                let Some(payee_id) = payment.payee_id else {
                    continue;
                };
                groups[worker_index(&payee_id, self.worker_count)]
                    .entry(payee_id)
                    .or_default()
                    .push(payment);
            }

            let mut handles = Vec::new();
            for group in groups.into_iter().filter(|g| !g.is_empty()) {
                let uc = self.clone();
                handles.push(tokio::spawn(async move { uc.process_group(kind, group).await }));
            }

            let mut closed_ids: Vec<Uuid> = Vec::new();
            for handle in handles {
                match handle.await {
                    Ok(ids) => closed_ids.extend(ids),
                    Err(e) => tracing::error!(error = %e, "settler worker panicked"),
                }
            }

            if closed_ids.is_empty() {
                // The remaining backlog is all skips (missing/frozen
                // balances) or failing buckets; fetching again would spin on
                // the same rows.
                tracing::warn!(kind = kind.as_str(), "settler page made no progress, stopping");
                break;
            }

            self.run_repo.append_payment_ids(run_id, &closed_ids).await?;
            total_closed += closed_ids.len();
        }

        Ok(total_closed)
    }

    /// Runs one worker's buckets sequentially. A failing bucket is logged
    /// and skipped; it must never take the rest of the run down with it.
    async fn process_group(
        &self,
        kind: RunKind,
        group: HashMap<Uuid, Vec<PaymentProfile>>,
    ) -> Vec<Uuid> {
        let mut closed = Vec::new();

        for (payee_id, payments) in group {
            let outcome = match kind {
                RunKind::Settle => self.settle_payee(payee_id, &payments).await,
                RunKind::Expire => self.expire_payee(payee_id, &payments).await,
            };
            match outcome {
                Ok(ids) => closed.extend(ids),
                Err(e) => {
                    tracing::error!(
                        %payee_id,
                        kind = kind.as_str(),
                        error = %e,
                        "bucket failed, leaving its payments for the next run"
                    );
                }
            }
        }

        closed
    }

    /// Settles one payee's bucket: one balance credit covering the whole
    /// bucket, committed atomically with the payment closes.
    async fn settle_payee(
        &self,
        payee_id: Uuid,
        payments: &[PaymentProfile],
    ) -> AppResult<Vec<Uuid>> {
        let Some(mut balance) = self.balance_repo.get_by_user(payee_id).await? else {
            // Settlement is not the balance's creation path.
            tracing::warn!(%payee_id, "payee has no balance row, skipping bucket");
            return Ok(Vec::new());
        };
        if balance.frozen {
            tracing::info!(%payee_id, "payee balance frozen, skipping bucket");
            return Ok(Vec::new());
        }

        let credit = bucket_credit(payments)?;
        let ids: Vec<Uuid> = payments.iter().map(|p| p.id).collect();
        let delta = BalanceDelta {
            cents: credit,
            eligible_cents: credit,
            shells: 0,
        };

        // The only contender on this row is a concurrent withdraw; the
        // partition scheme keeps other workers away.
        for _attempt in 0..MAX_VERSION_RETRIES {
            if self.ledger_repo.settle_bucket(&balance, delta, &ids).await? {
                self.event_bus.publish(DomainEvent::NewBalance {
                    user_id: payee_id,
                    amount_in_cents: credit,
                });
                return Ok(ids);
            }
            balance = self
                .balance_repo
                .get_by_user(payee_id)
                .await?
                .ok_or(AppError::NotFound)?;
            if balance.frozen {
                tracing::info!(%payee_id, "payee balance froze mid-run, skipping bucket");
                return Ok(Vec::new());
            }
        }

        Err(AppError::VersionConflict)
    }

    /// Closes one payee's lapsed pending bucket. No credit: an expired entry
    /// was abandoned, not settled.
    async fn expire_payee(
        &self,
        payee_id: Uuid,
        payments: &[PaymentProfile],
    ) -> AppResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = payments.iter().map(|p| p.id).collect();
        let closed = self.ledger_repo.close_expired(&ids).await?;
        tracing::debug!(%payee_id, closed, "expired pending bucket closed");
        Ok(ids)
    }

    async fn report_withdraw_backlog(&self) {
        match self.payment_repo.count_open_withdraws().await {
            Ok(open_count) => {
                self.event_bus
                    .publish(DomainEvent::WithdrawBacklog { open_count });
            }
            Err(e) => tracing::warn!(error = %e, "failed to count open withdraws"),
        }
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

/// Take-rated credit for a whole bucket. Multiply-then-integer-divide,
/// truncating, matching historical settlement amounts. Shell amounts pass
/// through the same rate and land in the same cents pool as cash.
pub fn bucket_credit(payments: &[PaymentProfile]) -> AppResult<i64> {
    let mut total = 0i64;
    for payment in payments {
        if payment.amount_in_cents < 0
            || payment.amount_in_shells < 0
            || (payment.amount_in_cents == 0 && payment.amount_in_shells == 0)
        {
            // Guarded at creation; reaching here means corrupt data, and it
            // fails this bucket only.
            return Err(AppError::Internal(format!(
                "payment {} carries a non-positive amount",
                payment.id
            )));
        }
        if !(0..=100).contains(&payment.withdraw_percent) {
            return Err(AppError::Internal(format!(
                "payment {} carries an out-of-range take-rate",
                payment.id
            )));
        }
        total += take_rate(payment.amount_in_cents, payment.withdraw_percent)
            + take_rate(payment.amount_in_shells, payment.withdraw_percent);
    }
    Ok(total)
}

fn take_rate(amount: i64, percent: i32) -> i64 {
    amount * i64::from(percent) / 100
}

/// The partitioning invariant: the same payee always maps to the same
/// worker, so one balance row is never contended by two workers.
pub fn worker_index(payee_id: &Uuid, worker_count: usize) -> usize {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    payee_id.hash(&mut hasher);
    (hasher.finish() % worker_count as u64) as usize
}
