use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Months, NaiveDateTime, NaiveTime, TimeZone};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::event_bus::EventBusPort,
    application::use_cases::balance::{
        BalanceDelta, BalanceProfile, BalanceRepoTrait, BalanceUseCases, MAX_VERSION_RETRIES,
    },
    application::use_cases::order::OrderProfile,
    domain::entities::{
        domain_event::DomainEvent, order_rail::OrderRail, order_state::OrderState,
        payment_state::PaymentState, payment_type::PaymentType,
    },
};

/// Withdraw rows carry the full amount; the take-rate was already applied
/// when the income settled.
pub const WITHDRAW_PERCENT_FULL: i32 = 100;
/// Days a confirmed one-off purchase stays open before it matures
/// (refund/chargeback window).
pub const DEFAULT_REFUND_WINDOW_DAYS: i64 = 7;

// ============================================================================
// Profile Types
// ============================================================================

/// One ledger entry. Financial fields are immutable after creation; only
/// `state` and `valid_after` ever change.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payee_id: Option<Uuid>,
    pub trade_number: String,
    pub amount_in_cents: i64,
    pub amount_in_shells: i64,
    pub withdraw_percent: i32,
    pub sku_id: Option<String>,
    pub order_id: Option<Uuid>,
    pub installment: i32,
    pub payment_type: PaymentType,
    pub state: PaymentState,
    pub valid_after: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub payee_id: Option<Uuid>,
    pub trade_number: String,
    pub amount_in_cents: i64,
    pub amount_in_shells: i64,
    pub withdraw_percent: i32,
    pub sku_id: Option<String>,
    pub order_id: Option<Uuid>,
    pub installment: i32,
    pub payment_type: PaymentType,
    pub state: PaymentState,
    pub valid_after: Option<NaiveDateTime>,
}

/// Maturity assignment for one drafted payment when its order is confirmed.
#[derive(Debug, Clone, Copy)]
pub struct PaymentMaturity {
    pub payment_id: Uuid,
    pub valid_after: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginatedPayments {
    pub payments: Vec<PaymentProfile>,
    pub total: i64,
    pub page: i32,
    pub per_page: i32,
    pub total_pages: i32,
}

/// Membership sku details resolved by the platform from the order's
/// property id.
#[derive(Debug, Clone, Deserialize)]
pub struct MembershipSkuInfo {
    pub sku_id: String,
    pub payee_id: Uuid,
    pub price_in_cents: i64,
    pub months: u32,
}

/// Shell top-up sku details.
#[derive(Debug, Clone, Deserialize)]
pub struct ShellSkuInfo {
    pub sku_id: String,
    pub shells: i64,
    pub price_in_cents: i64,
}

/// What a successful order purchased, resolved by the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PurchaseSpec {
    Membership(MembershipSkuInfo),
    Support { payee_id: Uuid },
    FeedCharge { payee_id: Uuid },
    Shell(ShellSkuInfo),
}

/// How much of the daily withdraw cap a user has left.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WithdrawQuota {
    pub day_limit_in_cents: i64,
    pub withdrawn_today_in_cents: i64,
    pub remaining_in_cents: i64,
}

/// Outcome of the coupled balance-debit + withdraw-row transaction.
#[derive(Debug)]
pub enum WithdrawCommit {
    Committed {
        balance: BalanceProfile,
        payment: PaymentProfile,
    },
    DayLimitExceeded,
    Conflict,
}

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait PaymentRepoTrait: Send + Sync {
    /// Inserts a batch, silently skipping rows whose `(order_id, installment)`
    /// already exists — the idempotency guard against re-delivered gateway
    /// callbacks. Returns the rows actually inserted.
    async fn insert_batch(&self, inputs: &[NewPayment]) -> AppResult<Vec<PaymentProfile>>;

    async fn list_by_order(&self, order_id: Uuid) -> AppResult<Vec<PaymentProfile>>;

    async fn find_by_trade_number_and_type(
        &self,
        trade_number: &str,
        payment_type: PaymentType,
    ) -> AppResult<Option<PaymentProfile>>;

    /// Flips drafted/pending rows to open with the given maturities.
    async fn open_payments(&self, schedule: &[PaymentMaturity]) -> AppResult<u64>;

    /// Demotes an order's drafted/open rows to pending (refund in flight).
    async fn hold_for_order(&self, order_id: Uuid) -> AppResult<u64>;

    /// Promotes an order's pending rows back to open (refund failed).
    async fn release_for_order(&self, order_id: Uuid) -> AppResult<u64>;

    /// Open entries of the given types matured before `before`, oldest first.
    async fn list_settleable(
        &self,
        types: &[PaymentType],
        before: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<PaymentProfile>>;

    /// Pending entries of the given types whose window lapsed before `before`.
    async fn list_expired_pending(
        &self,
        types: &[PaymentType],
        before: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<PaymentProfile>>;

    async fn sum_withdraws_since(&self, user_id: Uuid, since: NaiveDateTime) -> AppResult<i64>;

    async fn count_open_withdraws(&self) -> AppResult<i64>;

    async fn list_by_user(
        &self,
        user_id: Uuid,
        page: i32,
        per_page: i32,
    ) -> AppResult<PaginatedPayments>;

    async fn list_withdraws_by_user(
        &self,
        user_id: Uuid,
        page: i32,
        per_page: i32,
    ) -> AppResult<PaginatedPayments>;
}

/// The coupled balance + ledger transactions. These are the only places a
/// balance write and payment writes must commit or roll back together.
#[async_trait]
pub trait LedgerRepoTrait: Send + Sync {
    /// One transaction: version-guarded balance credit plus closing every
    /// payment in the bucket. Returns false on a version conflict (nothing
    /// written).
    async fn settle_bucket(
        &self,
        balance: &BalanceProfile,
        delta: BalanceDelta,
        payment_ids: &[Uuid],
    ) -> AppResult<bool>;

    /// Closes lapsed pending payments without crediting anything.
    async fn close_expired(&self, payment_ids: &[Uuid]) -> AppResult<u64>;

    /// One transaction: re-checks the day cap, debits both cent fields under
    /// the version guard, and inserts the withdraw row.
    async fn commit_withdraw(
        &self,
        balance: &BalanceProfile,
        amount_in_cents: i64,
        since: NaiveDateTime,
        payment: &NewPayment,
    ) -> AppResult<WithdrawCommit>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct PaymentUseCases {
    payment_repo: Arc<dyn PaymentRepoTrait>,
    balance_repo: Arc<dyn BalanceRepoTrait>,
    ledger_repo: Arc<dyn LedgerRepoTrait>,
    balance_uc: BalanceUseCases,
    event_bus: Arc<dyn EventBusPort>,
    refund_window_days: i64,
}

impl PaymentUseCases {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepoTrait>,
        balance_repo: Arc<dyn BalanceRepoTrait>,
        ledger_repo: Arc<dyn LedgerRepoTrait>,
        event_bus: Arc<dyn EventBusPort>,
        refund_window_days: i64,
    ) -> Self {
        let balance_uc = BalanceUseCases::new(balance_repo.clone(), event_bus.clone());
        Self {
            payment_repo,
            balance_repo,
            ledger_repo,
            balance_uc,
            event_bus,
            refund_window_days,
        }
    }

    // ========================================================================
    // Withdrawal authorizer
    // ========================================================================

    /// Validates a withdraw request against eligible balance and the rolling
    /// since-midnight day cap, then debits the balance and writes the
    /// WITHDRAW ledger row in one transaction.
    pub async fn create_withdraw(
        &self,
        user_id: Uuid,
        amount_in_cents: i64,
    ) -> AppResult<BalanceProfile> {
        if amount_in_cents <= 0 {
            return Err(AppError::InvalidInput(
                "withdraw amount must be positive".into(),
            ));
        }

        for attempt in 0..MAX_VERSION_RETRIES {
            let balance = self.balance_repo.get_or_create(user_id).await?;

            if balance.frozen {
                return Err(AppError::BalanceFrozen);
            }
            if amount_in_cents > balance.balance_eligible_in_cents {
                return Err(AppError::WithdrawLimit);
            }

            let since = start_of_local_day();
            let payment = NewPayment {
                user_id,
                payee_id: None,
                trade_number: generate_trade_number(),
                amount_in_cents,
                amount_in_shells: 0,
                withdraw_percent: WITHDRAW_PERCENT_FULL,
                sku_id: None,
                order_id: None,
                installment: 0,
                payment_type: PaymentType::Withdraw,
                state: PaymentState::Open,
                valid_after: None,
            };

            match self
                .ledger_repo
                .commit_withdraw(&balance, amount_in_cents, since, &payment)
                .await?
            {
                WithdrawCommit::Committed { balance, payment } => {
                    self.event_bus.publish(DomainEvent::NewPayment {
                        payment_id: payment.id,
                        user_id,
                        payee_id: None,
                        amount_in_cents,
                    });
                    return Ok(balance);
                }
                WithdrawCommit::DayLimitExceeded => return Err(AppError::WithdrawDayLimit),
                WithdrawCommit::Conflict => {
                    tracing::debug!(%user_id, attempt, "withdraw hit balance version conflict");
                }
            }
        }

        Err(AppError::VersionConflict)
    }

    pub async fn withdraw_quota(&self, user_id: Uuid) -> AppResult<WithdrawQuota> {
        let balance = self.balance_repo.get_or_create(user_id).await?;
        let withdrawn_today = self
            .payment_repo
            .sum_withdraws_since(user_id, start_of_local_day())
            .await?;

        Ok(WithdrawQuota {
            day_limit_in_cents: balance.withdraw_day_limit_in_cents,
            withdrawn_today_in_cents: withdrawn_today,
            remaining_in_cents: (balance.withdraw_day_limit_in_cents - withdrawn_today).max(0),
        })
    }

    // ========================================================================
    // Ledger factories
    // ========================================================================

    /// Derives the ledger entries for a successful order. Idempotent on
    /// `(order_id, installment)`: re-delivered callbacks return the existing
    /// rows and write nothing.
    pub async fn record_payment_from_order(
        &self,
        order: &OrderProfile,
        spec: &PurchaseSpec,
    ) -> AppResult<Vec<PaymentProfile>> {
        if order.state != OrderState::Success {
            return Err(AppError::InvalidInput(
                "payments derive only from successful orders".into(),
            ));
        }

        let inputs = match spec {
            PurchaseSpec::Membership(sku) => self.membership_drafts(order, sku).await?,
            PurchaseSpec::Support { payee_id } => {
                vec![self.single_draft(order, *payee_id, PaymentType::Support).await?]
            }
            PurchaseSpec::FeedCharge { payee_id } => {
                vec![self.single_draft(order, *payee_id, PaymentType::FeedCharge).await?]
            }
            PurchaseSpec::Shell(sku) => {
                return self.record_shell_purchase(order, sku).await;
            }
        };

        let inserted = self.payment_repo.insert_batch(&inputs).await?;
        if inserted.is_empty() {
            // Duplicate delivery; the rows already exist.
            return self.payment_repo.list_by_order(order.id).await;
        }

        for payment in &inserted {
            self.event_bus.publish(DomainEvent::NewPayment {
                payment_id: payment.id,
                user_id: payment.user_id,
                payee_id: payment.payee_id,
                amount_in_cents: payment.amount_in_cents,
            });
        }
        Ok(inserted)
    }

    async fn membership_drafts(
        &self,
        order: &OrderProfile,
        sku: &MembershipSkuInfo,
    ) -> AppResult<Vec<NewPayment>> {
        if sku.months == 0 {
            return Err(AppError::InvalidInput("sku months must be positive".into()));
        }

        // Snapshot the payee's current take-rate; later rate changes must not
        // retroactively alter already-drafted payments.
        let payee_balance = self.balance_repo.get_or_create(sku.payee_id).await?;
        let per_month = sku.price_in_cents / i64::from(sku.months);
        if per_month <= 0 {
            return Err(AppError::InvalidInput(
                "sku price too small for installment split".into(),
            ));
        }

        Ok((0..sku.months)
            .map(|i| NewPayment {
                user_id: order.user_id,
                payee_id: Some(sku.payee_id),
                trade_number: order.trade_number.clone(),
                amount_in_cents: per_month,
                amount_in_shells: 0,
                withdraw_percent: payee_balance.withdraw_percent,
                sku_id: Some(sku.sku_id.clone()),
                order_id: Some(order.id),
                installment: i as i32,
                payment_type: cash_payment_type(order.rail),
                state: PaymentState::Drafted,
                valid_after: None,
            })
            .collect())
    }

    async fn single_draft(
        &self,
        order: &OrderProfile,
        payee_id: Uuid,
        payment_type: PaymentType,
    ) -> AppResult<NewPayment> {
        if order.fee_in_cents <= 0 {
            return Err(AppError::InvalidInput("order fee must be positive".into()));
        }
        let payee_balance = self.balance_repo.get_or_create(payee_id).await?;

        Ok(NewPayment {
            user_id: order.user_id,
            payee_id: Some(payee_id),
            trade_number: order.trade_number.clone(),
            amount_in_cents: order.fee_in_cents,
            amount_in_shells: 0,
            withdraw_percent: payee_balance.withdraw_percent,
            sku_id: Some(order.property_id.clone()),
            order_id: Some(order.id),
            installment: 0,
            payment_type,
            state: PaymentState::Drafted,
            valid_after: None,
        })
    }

    /// Shell top-ups have no payee and no settlement phase: the row is born
    /// closed and the buyer's shell balance is credited immediately.
    async fn record_shell_purchase(
        &self,
        order: &OrderProfile,
        sku: &ShellSkuInfo,
    ) -> AppResult<Vec<PaymentProfile>> {
        if sku.shells <= 0 || sku.price_in_cents <= 0 {
            return Err(AppError::InvalidInput("shell sku amounts must be positive".into()));
        }

        let inserted = self
            .payment_repo
            .insert_batch(&[NewPayment {
                user_id: order.user_id,
                payee_id: None,
                trade_number: order.trade_number.clone(),
                amount_in_cents: sku.price_in_cents,
                amount_in_shells: sku.shells,
                withdraw_percent: WITHDRAW_PERCENT_FULL,
                sku_id: Some(sku.sku_id.clone()),
                order_id: Some(order.id),
                installment: 0,
                payment_type: PaymentType::ShellBuy,
                state: PaymentState::Closed,
                valid_after: None,
            }])
            .await?;

        if inserted.is_empty() {
            return self.payment_repo.list_by_order(order.id).await;
        }

        self.balance_uc.add_shells(order.user_id, sku.shells).await?;

        for payment in &inserted {
            self.event_bus.publish(DomainEvent::NewPayment {
                payment_id: payment.id,
                user_id: payment.user_id,
                payee_id: None,
                amount_in_cents: payment.amount_in_cents,
            });
        }
        Ok(inserted)
    }

    /// Shell top-up through an iOS receipt. The gateway transaction id is the
    /// idempotency key; a replayed receipt is rejected.
    pub async fn record_ios_shell_purchase(
        &self,
        user_id: Uuid,
        transaction_id: &str,
        sku: &ShellSkuInfo,
    ) -> AppResult<PaymentProfile> {
        if sku.shells <= 0 || sku.price_in_cents <= 0 {
            return Err(AppError::InvalidInput("shell sku amounts must be positive".into()));
        }

        if self
            .payment_repo
            .find_by_trade_number_and_type(transaction_id, PaymentType::ShellBuy)
            .await?
            .is_some()
        {
            return Err(AppError::InvalidInput("duplicate ios receipt".into()));
        }

        let mut inserted = self
            .payment_repo
            .insert_batch(&[NewPayment {
                user_id,
                payee_id: None,
                trade_number: transaction_id.to_string(),
                amount_in_cents: sku.price_in_cents,
                amount_in_shells: sku.shells,
                withdraw_percent: WITHDRAW_PERCENT_FULL,
                sku_id: Some(sku.sku_id.clone()),
                order_id: None,
                installment: 0,
                payment_type: PaymentType::ShellBuy,
                state: PaymentState::Closed,
                valid_after: None,
            }])
            .await?;
        let payment = inserted
            .pop()
            .ok_or_else(|| AppError::Internal("shell purchase insert returned nothing".into()))?;

        self.balance_uc.add_shells(user_id, sku.shells).await?;
        Ok(payment)
    }

    /// Membership paid from the buyer's shell balance: consumes shells and
    /// creates already-open monthly entries with staggered maturities.
    pub async fn create_shell_membership_payments(
        &self,
        user_id: Uuid,
        sku: &MembershipSkuInfo,
        price_in_shells: i64,
        membership_expiry: NaiveDateTime,
    ) -> AppResult<Vec<PaymentProfile>> {
        if sku.months == 0 || price_in_shells <= 0 {
            return Err(AppError::InvalidInput("invalid shell membership sku".into()));
        }
        let per_month = price_in_shells / i64::from(sku.months);
        if per_month <= 0 {
            return Err(AppError::InvalidInput(
                "sku price too small for installment split".into(),
            ));
        }

        let payee_balance = self.balance_repo.get_or_create(sku.payee_id).await?;
        self.balance_uc.consume_shells(user_id, price_in_shells).await?;

        let trade_number = generate_trade_number();
        let inputs: Vec<NewPayment> = (0..sku.months)
            .map(|i| NewPayment {
                user_id,
                payee_id: Some(sku.payee_id),
                trade_number: trade_number.clone(),
                amount_in_cents: 0,
                amount_in_shells: per_month,
                withdraw_percent: payee_balance.withdraw_percent,
                sku_id: Some(sku.sku_id.clone()),
                order_id: None,
                installment: i as i32,
                payment_type: PaymentType::ShellPay,
                state: PaymentState::Open,
                valid_after: Some(add_months(membership_expiry, i + 1)),
            })
            .collect();

        let inserted = self.payment_repo.insert_batch(&inputs).await?;
        self.event_bus.publish(DomainEvent::NewMember {
            user_id,
            payee_id: sku.payee_id,
            sku_id: sku.sku_id.clone(),
        });
        Ok(inserted)
    }

    // ========================================================================
    // Fulfillment confirmation: drafted -> open
    // ========================================================================

    /// Confirms a membership order as settleable: every installment flips to
    /// open with maturities staggered one month apart from the membership's
    /// current expiry.
    pub async fn confirm_membership_payments(
        &self,
        order: &OrderProfile,
        sku: &MembershipSkuInfo,
        membership_expiry: NaiveDateTime,
    ) -> AppResult<u64> {
        let payments = self.payment_repo.list_by_order(order.id).await?;
        let schedule: Vec<PaymentMaturity> = payments
            .iter()
            .filter(|p| p.state == PaymentState::Drafted || p.state == PaymentState::Pending)
            .map(|p| PaymentMaturity {
                payment_id: p.id,
                valid_after: add_months(membership_expiry, p.installment as u32 + 1),
            })
            .collect();

        if schedule.is_empty() {
            return Ok(0);
        }

        let opened = self.payment_repo.open_payments(&schedule).await?;
        self.event_bus.publish(DomainEvent::NewMember {
            user_id: order.user_id,
            payee_id: sku.payee_id,
            sku_id: sku.sku_id.clone(),
        });
        Ok(opened)
    }

    /// Confirms a one-off purchase (support, feed unlock): the entry opens
    /// and matures once the refund window has passed.
    pub async fn confirm_single_payment(&self, order: &OrderProfile) -> AppResult<u64> {
        let payments = self.payment_repo.list_by_order(order.id).await?;
        let matures_at = chrono::Utc::now().naive_utc()
            + chrono::Duration::days(self.refund_window_days);

        let schedule: Vec<PaymentMaturity> = payments
            .iter()
            .filter(|p| p.state == PaymentState::Drafted || p.state == PaymentState::Pending)
            .map(|p| PaymentMaturity {
                payment_id: p.id,
                valid_after: matures_at,
            })
            .collect();

        if schedule.is_empty() {
            return Ok(0);
        }
        self.payment_repo.open_payments(&schedule).await
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn payments_by_user(
        &self,
        user_id: Uuid,
        page: i32,
        per_page: i32,
    ) -> AppResult<PaginatedPayments> {
        self.payment_repo.list_by_user(user_id, page, per_page).await
    }

    pub async fn withdraws_by_user(
        &self,
        user_id: Uuid,
        page: i32,
        per_page: i32,
    ) -> AppResult<PaginatedPayments> {
        self.payment_repo
            .list_withdraws_by_user(user_id, page, per_page)
            .await
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Both cash rails record as wechat_pay; iOS purchases keep their own type
/// for receipt reconciliation.
fn cash_payment_type(rail: OrderRail) -> PaymentType {
    match rail {
        OrderRail::Wechat | OrderRail::Alipay => PaymentType::WechatPay,
        OrderRail::Ios => PaymentType::IosBuy,
    }
}

/// Opaque idempotency key toward the gateway.
pub fn generate_trade_number() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Start of the current local day, expressed in the UTC timeline the rows
/// are stored on. The withdraw day cap is a local-midnight rolling window.
pub fn start_of_local_day() -> NaiveDateTime {
    let now = chrono::Local::now();
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    chrono::Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.naive_utc())
        .unwrap_or_else(|| {
            // Midnight fell in a DST gap; fall back to the raw local date.
            midnight
        })
}

fn add_months(base: NaiveDateTime, months: u32) -> NaiveDateTime {
    base.checked_add_months(Months::new(months)).unwrap_or(base)
}
