//! In-memory mock implementations of the ledger-side repository traits.
//!
//! `InMemoryLedger` backs balances and payments with one shared state so the
//! coupled transactions (`settle_bucket`, `commit_withdraw`) can mirror the
//! all-or-nothing semantics of the Postgres implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::dist_lock::DistributedLockPort,
    application::use_cases::balance::{
        BalanceDelta, BalanceProfile, BalanceRepoTrait, DEFAULT_WITHDRAW_DAY_LIMIT_IN_CENTS,
        DEFAULT_WITHDRAW_PERCENT,
    },
    application::use_cases::order::{NewOrder, OrderProfile, OrderRepoTrait},
    application::use_cases::payment::{
        LedgerRepoTrait, NewPayment, PaginatedPayments, PaymentMaturity, PaymentProfile,
        PaymentRepoTrait, WithdrawCommit,
    },
    application::use_cases::settlement::{RunProfile, SettlementRunRepoTrait},
    domain::entities::{
        order_rail::OrderRail, order_state::OrderState, payment_state::PaymentState,
        payment_type::PaymentType,
        run_state::{RunKind, RunState},
    },
};

fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

// ============================================================================
// InMemoryLedger
// ============================================================================

#[derive(Default)]
struct LedgerState {
    balances: HashMap<Uuid, BalanceProfile>,
    payments: Vec<PaymentProfile>,
    /// Forced CAS failures per user, to simulate concurrent writers.
    forced_conflicts: HashMap<Uuid, usize>,
}

#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn zeroed_balance(user_id: Uuid) -> BalanceProfile {
        BalanceProfile {
            id: Uuid::new_v4(),
            user_id,
            balance_in_cents: 0,
            balance_eligible_in_cents: 0,
            balance_in_shells: 0,
            withdraw_day_limit_in_cents: DEFAULT_WITHDRAW_DAY_LIMIT_IN_CENTS,
            withdraw_percent: DEFAULT_WITHDRAW_PERCENT,
            frozen: false,
            version: 0,
            created_at: Some(now()),
            updated_at: Some(now()),
        }
    }

    pub fn seed_balance(&self, user_id: Uuid, cents: i64, eligible: i64, shells: i64) {
        let mut state = self.state.lock().unwrap();
        let mut balance = Self::zeroed_balance(user_id);
        balance.balance_in_cents = cents;
        balance.balance_eligible_in_cents = eligible;
        balance.balance_in_shells = shells;
        state.balances.insert(user_id, balance);
    }

    pub fn set_withdraw_percent(&self, user_id: Uuid, percent: i32) {
        let mut state = self.state.lock().unwrap();
        if let Some(balance) = state.balances.get_mut(&user_id) {
            balance.withdraw_percent = percent;
        }
    }

    pub fn freeze(&self, user_id: Uuid) {
        let mut state = self.state.lock().unwrap();
        if let Some(balance) = state.balances.get_mut(&user_id) {
            balance.frozen = true;
        }
    }

    /// The next `count` guarded writes for this user fail as if a concurrent
    /// writer bumped the version first.
    pub fn fail_next_balance_updates(&self, user_id: Uuid, count: usize) {
        self.state
            .lock()
            .unwrap()
            .forced_conflicts
            .insert(user_id, count);
    }

    fn seed_payment(
        &self,
        payee_id: Option<Uuid>,
        cents: i64,
        percent: i32,
        payment_type: PaymentType,
        state: PaymentState,
        valid_after: Option<NaiveDateTime>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().payments.push(PaymentProfile {
            id,
            user_id: Uuid::new_v4(),
            payee_id,
            trade_number: Uuid::new_v4().simple().to_string(),
            amount_in_cents: cents,
            amount_in_shells: 0,
            withdraw_percent: percent,
            sku_id: None,
            order_id: None,
            installment: 0,
            payment_type,
            state,
            valid_after,
            created_at: Some(now()),
            updated_at: Some(now()),
        });
        id
    }

    pub fn seed_settleable_payment(
        &self,
        payee_id: Uuid,
        cents: i64,
        percent: i32,
        valid_after: NaiveDateTime,
    ) -> Uuid {
        self.seed_payment(
            Some(payee_id),
            cents,
            percent,
            PaymentType::WechatPay,
            PaymentState::Open,
            Some(valid_after),
        )
    }

    pub fn seed_pending_payment(
        &self,
        payee_id: Uuid,
        cents: i64,
        percent: i32,
        valid_after: NaiveDateTime,
    ) -> Uuid {
        self.seed_payment(
            Some(payee_id),
            cents,
            percent,
            PaymentType::WechatPay,
            PaymentState::Pending,
            Some(valid_after),
        )
    }

    pub fn seed_closed_payment(&self, payee_id: Uuid, cents: i64, percent: i32) -> Uuid {
        self.seed_payment(
            Some(payee_id),
            cents,
            percent,
            PaymentType::WechatPay,
            PaymentState::Closed,
            Some(now()),
        )
    }

    pub fn seed_withdraw_payment(&self, user_id: Uuid, cents: i64) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().payments.push(PaymentProfile {
            id,
            user_id,
            payee_id: None,
            trade_number: Uuid::new_v4().simple().to_string(),
            amount_in_cents: cents,
            amount_in_shells: 0,
            withdraw_percent: 100,
            sku_id: None,
            order_id: None,
            installment: 0,
            payment_type: PaymentType::Withdraw,
            state: PaymentState::Open,
            valid_after: None,
            created_at: Some(now()),
            updated_at: Some(now()),
        });
        id
    }

    pub fn seed_open_payment_for_order(&self, order_id: Uuid, user_id: Uuid, cents: i64) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().payments.push(PaymentProfile {
            id,
            user_id,
            payee_id: Some(Uuid::new_v4()),
            trade_number: Uuid::new_v4().simple().to_string(),
            amount_in_cents: cents,
            amount_in_shells: 0,
            withdraw_percent: DEFAULT_WITHDRAW_PERCENT,
            sku_id: None,
            order_id: Some(order_id),
            installment: 0,
            payment_type: PaymentType::WechatPay,
            state: PaymentState::Open,
            valid_after: Some(now()),
            created_at: Some(now()),
            updated_at: Some(now()),
        });
        id
    }

    pub fn set_valid_after(&self, payment_id: Uuid, valid_after: NaiveDateTime) {
        let mut state = self.state.lock().unwrap();
        if let Some(payment) = state.payments.iter_mut().find(|p| p.id == payment_id) {
            payment.valid_after = Some(valid_after);
        }
    }

    pub fn open_settleable_count(&self) -> usize {
        self.count_in_state(PaymentState::Open)
    }

    pub fn count_in_state(&self, payment_state: PaymentState) -> usize {
        self.state
            .lock()
            .unwrap()
            .payments
            .iter()
            .filter(|p| p.state == payment_state && p.payment_type.is_settleable())
            .count()
    }
}

#[async_trait]
impl BalanceRepoTrait for InMemoryLedger {
    async fn get_by_user(&self, user_id: Uuid) -> AppResult<Option<BalanceProfile>> {
        Ok(self.state.lock().unwrap().balances.get(&user_id).cloned())
    }

    async fn get_or_create(&self, user_id: Uuid) -> AppResult<BalanceProfile> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .balances
            .entry(user_id)
            .or_insert_with(|| Self::zeroed_balance(user_id))
            .clone())
    }

    async fn update_guarded(
        &self,
        updated: &BalanceProfile,
    ) -> AppResult<Option<BalanceProfile>> {
        let mut state = self.state.lock().unwrap();

        let force_conflict = match state.forced_conflicts.get_mut(&updated.user_id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        if force_conflict {
            // Simulate the concurrent writer that won the race.
            if let Some(stored) = state.balances.get_mut(&updated.user_id) {
                stored.version += 1;
            }
            return Ok(None);
        }

        let Some(stored) = state.balances.get_mut(&updated.user_id) else {
            return Ok(None);
        };
        if stored.version != updated.version {
            return Ok(None);
        }

        stored.balance_in_cents = updated.balance_in_cents;
        stored.balance_eligible_in_cents = updated.balance_eligible_in_cents;
        stored.balance_in_shells = updated.balance_in_shells;
        stored.withdraw_day_limit_in_cents = updated.withdraw_day_limit_in_cents;
        stored.withdraw_percent = updated.withdraw_percent;
        stored.frozen = updated.frozen;
        stored.version += 1;
        stored.updated_at = Some(now());

        Ok(Some(stored.clone()))
    }
}

#[async_trait]
impl PaymentRepoTrait for InMemoryLedger {
    async fn insert_batch(&self, inputs: &[NewPayment]) -> AppResult<Vec<PaymentProfile>> {
        let mut state = self.state.lock().unwrap();
        let mut inserted = Vec::new();

        for input in inputs {
            if let Some(order_id) = input.order_id {
                let duplicate = state
                    .payments
                    .iter()
                    .any(|p| p.order_id == Some(order_id) && p.installment == input.installment);
                if duplicate {
                    continue;
                }
            }

            let profile = PaymentProfile {
                id: Uuid::new_v4(),
                user_id: input.user_id,
                payee_id: input.payee_id,
                trade_number: input.trade_number.clone(),
                amount_in_cents: input.amount_in_cents,
                amount_in_shells: input.amount_in_shells,
                withdraw_percent: input.withdraw_percent,
                sku_id: input.sku_id.clone(),
                order_id: input.order_id,
                installment: input.installment,
                payment_type: input.payment_type,
                state: input.state,
                valid_after: input.valid_after,
                created_at: Some(now()),
                updated_at: Some(now()),
            };
            state.payments.push(profile.clone());
            inserted.push(profile);
        }

        Ok(inserted)
    }

    async fn list_by_order(&self, order_id: Uuid) -> AppResult<Vec<PaymentProfile>> {
        let state = self.state.lock().unwrap();
        let mut payments: Vec<PaymentProfile> = state
            .payments
            .iter()
            .filter(|p| p.order_id == Some(order_id))
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.installment);
        Ok(payments)
    }

    async fn find_by_trade_number_and_type(
        &self,
        trade_number: &str,
        payment_type: PaymentType,
    ) -> AppResult<Option<PaymentProfile>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .payments
            .iter()
            .find(|p| p.trade_number == trade_number && p.payment_type == payment_type)
            .cloned())
    }

    async fn open_payments(&self, schedule: &[PaymentMaturity]) -> AppResult<u64> {
        let mut state = self.state.lock().unwrap();
        let mut opened = 0;
        for maturity in schedule {
            if let Some(payment) = state.payments.iter_mut().find(|p| {
                p.id == maturity.payment_id
                    && matches!(p.state, PaymentState::Drafted | PaymentState::Pending)
            }) {
                payment.state = PaymentState::Open;
                payment.valid_after = Some(maturity.valid_after);
                payment.updated_at = Some(now());
                opened += 1;
            }
        }
        Ok(opened)
    }

    async fn hold_for_order(&self, order_id: Uuid) -> AppResult<u64> {
        let mut state = self.state.lock().unwrap();
        let mut held = 0;
        for payment in state.payments.iter_mut().filter(|p| {
            p.order_id == Some(order_id)
                && matches!(p.state, PaymentState::Drafted | PaymentState::Open)
        }) {
            payment.state = PaymentState::Pending;
            held += 1;
        }
        Ok(held)
    }

    async fn release_for_order(&self, order_id: Uuid) -> AppResult<u64> {
        let mut state = self.state.lock().unwrap();
        let mut released = 0;
        for payment in state
            .payments
            .iter_mut()
            .filter(|p| p.order_id == Some(order_id) && p.state == PaymentState::Pending)
        {
            payment.state = PaymentState::Open;
            released += 1;
        }
        Ok(released)
    }

    async fn list_settleable(
        &self,
        types: &[PaymentType],
        before: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<PaymentProfile>> {
        self.list_batch(types, PaymentState::Open, before, limit)
    }

    async fn list_expired_pending(
        &self,
        types: &[PaymentType],
        before: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<PaymentProfile>> {
        self.list_batch(types, PaymentState::Pending, before, limit)
    }

    async fn sum_withdraws_since(&self, user_id: Uuid, since: NaiveDateTime) -> AppResult<i64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .payments
            .iter()
            .filter(|p| {
                p.user_id == user_id
                    && p.payment_type == PaymentType::Withdraw
                    && p.created_at.is_some_and(|t| t >= since)
            })
            .map(|p| p.amount_in_cents)
            .sum())
    }

    async fn count_open_withdraws(&self) -> AppResult<i64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .payments
            .iter()
            .filter(|p| p.payment_type == PaymentType::Withdraw && p.state == PaymentState::Open)
            .count() as i64)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        page: i32,
        per_page: i32,
    ) -> AppResult<PaginatedPayments> {
        self.page_for_user(user_id, None, page, per_page)
    }

    async fn list_withdraws_by_user(
        &self,
        user_id: Uuid,
        page: i32,
        per_page: i32,
    ) -> AppResult<PaginatedPayments> {
        self.page_for_user(user_id, Some(PaymentType::Withdraw), page, per_page)
    }
}

impl InMemoryLedger {
    fn list_batch(
        &self,
        types: &[PaymentType],
        payment_state: PaymentState,
        before: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<PaymentProfile>> {
        let state = self.state.lock().unwrap();
        let mut matches: Vec<PaymentProfile> = state
            .payments
            .iter()
            .filter(|p| {
                p.state == payment_state
                    && types.contains(&p.payment_type)
                    && p.payee_id.is_some()
                    && p.valid_after.is_some_and(|t| t <= before)
            })
            .cloned()
            .collect();
        matches.sort_by_key(|p| p.created_at);
        matches.truncate(limit as usize);
        Ok(matches)
    }

    fn page_for_user(
        &self,
        user_id: Uuid,
        payment_type: Option<PaymentType>,
        page: i32,
        per_page: i32,
    ) -> AppResult<PaginatedPayments> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);
        let state = self.state.lock().unwrap();

        let mut matches: Vec<PaymentProfile> = state
            .payments
            .iter()
            .filter(|p| p.user_id == user_id)
            .filter(|p| payment_type.is_none_or(|t| p.payment_type == t))
            .cloned()
            .collect();
        matches.sort_by_key(|p| std::cmp::Reverse(p.created_at));

        let total = matches.len() as i64;
        let start = ((page - 1) * per_page) as usize;
        let payments: Vec<PaymentProfile> = matches
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();
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
impl LedgerRepoTrait for InMemoryLedger {
    async fn settle_bucket(
        &self,
        balance: &BalanceProfile,
        delta: BalanceDelta,
        payment_ids: &[Uuid],
    ) -> AppResult<bool> {
        let mut state = self.state.lock().unwrap();

        // All-or-nothing: every payment must still be open.
        let open_count = state
            .payments
            .iter()
            .filter(|p| payment_ids.contains(&p.id) && p.state == PaymentState::Open)
            .count();
        if open_count != payment_ids.len() {
            return Ok(false);
        }

        let Some(stored) = state.balances.get_mut(&balance.user_id) else {
            return Ok(false);
        };
        if stored.version != balance.version || stored.frozen {
            return Ok(false);
        }

        stored.balance_in_cents += delta.cents;
        stored.balance_eligible_in_cents += delta.eligible_cents;
        stored.balance_in_shells += delta.shells;
        stored.version += 1;
        stored.updated_at = Some(now());

        for payment in state
            .payments
            .iter_mut()
            .filter(|p| payment_ids.contains(&p.id))
        {
            payment.state = PaymentState::Closed;
            payment.updated_at = Some(now());
        }

        Ok(true)
    }

    async fn close_expired(&self, payment_ids: &[Uuid]) -> AppResult<u64> {
        let mut state = self.state.lock().unwrap();
        let mut closed = 0;
        for payment in state
            .payments
            .iter_mut()
            .filter(|p| payment_ids.contains(&p.id) && p.state == PaymentState::Pending)
        {
            payment.state = PaymentState::Closed;
            payment.updated_at = Some(now());
            closed += 1;
        }
        Ok(closed)
    }

    async fn commit_withdraw(
        &self,
        balance: &BalanceProfile,
        amount_in_cents: i64,
        since: NaiveDateTime,
        payment: &NewPayment,
    ) -> AppResult<WithdrawCommit> {
        let mut state = self.state.lock().unwrap();

        let withdrawn_today: i64 = state
            .payments
            .iter()
            .filter(|p| {
                p.user_id == balance.user_id
                    && p.payment_type == PaymentType::Withdraw
                    && p.created_at.is_some_and(|t| t >= since)
            })
            .map(|p| p.amount_in_cents)
            .sum();
        if withdrawn_today + amount_in_cents > balance.withdraw_day_limit_in_cents {
            return Ok(WithdrawCommit::DayLimitExceeded);
        }

        let Some(stored) = state.balances.get_mut(&balance.user_id) else {
            return Err(AppError::NotFound);
        };
        if stored.version != balance.version
            || stored.frozen
            || stored.balance_eligible_in_cents < amount_in_cents
        {
            return Ok(WithdrawCommit::Conflict);
        }

        stored.balance_in_cents -= amount_in_cents;
        stored.balance_eligible_in_cents -= amount_in_cents;
        stored.version += 1;
        stored.updated_at = Some(now());
        let updated_balance = stored.clone();

        let inserted = PaymentProfile {
            id: Uuid::new_v4(),
            user_id: payment.user_id,
            payee_id: payment.payee_id,
            trade_number: payment.trade_number.clone(),
            amount_in_cents: payment.amount_in_cents,
            amount_in_shells: payment.amount_in_shells,
            withdraw_percent: payment.withdraw_percent,
            sku_id: payment.sku_id.clone(),
            order_id: payment.order_id,
            installment: payment.installment,
            payment_type: payment.payment_type,
            state: payment.state,
            valid_after: payment.valid_after,
            created_at: Some(now()),
            updated_at: Some(now()),
        };
        state.payments.push(inserted.clone());

        Ok(WithdrawCommit::Committed {
            balance: updated_balance,
            payment: inserted,
        })
    }
}

// ============================================================================
// InMemoryOrderRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryOrderRepo {
    orders: Mutex<Vec<OrderProfile>>,
    transitions: Mutex<HashMap<Uuid, usize>>,
}

impl InMemoryOrderRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, order: OrderProfile) -> OrderProfile {
        self.orders.lock().unwrap().push(order.clone());
        order
    }

    /// How many guarded transitions actually landed for this order.
    pub fn transition_count(&self, order_id: Uuid) -> usize {
        self.transitions
            .lock()
            .unwrap()
            .get(&order_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl OrderRepoTrait for InMemoryOrderRepo {
    async fn insert(&self, order: &NewOrder, trade_number: &str) -> AppResult<OrderProfile> {
        let profile = OrderProfile {
            id: Uuid::new_v4(),
            rail: order.rail,
            user_id: order.user_id,
            trade_number: trade_number.to_string(),
            fee_in_cents: order.fee_in_cents,
            property_id: order.property_id.clone(),
            order_type: order.order_type,
            state: OrderState::NotPay,
            transaction_id: None,
            error_message: None,
            created_at: Some(now()),
            updated_at: Some(now()),
        };
        self.orders.lock().unwrap().push(profile.clone());
        Ok(profile)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<OrderProfile>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.id == id)
            .cloned())
    }

    async fn find_by_trade_number(
        &self,
        rail: OrderRail,
        trade_number: &str,
    ) -> AppResult<Option<OrderProfile>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.rail == rail && o.trade_number == trade_number)
            .cloned())
    }

    async fn transition(
        &self,
        id: Uuid,
        from: OrderState,
        to: OrderState,
        transaction_id: Option<&str>,
        error_message: Option<&str>,
    ) -> AppResult<Option<OrderProfile>> {
        let mut orders = self.orders.lock().unwrap();
        let Some(order) = orders.iter_mut().find(|o| o.id == id && o.state == from) else {
            return Ok(None);
        };

        order.state = to;
        if let Some(transaction_id) = transaction_id {
            order.transaction_id = Some(transaction_id.to_string());
        }
        if let Some(error_message) = error_message {
            order.error_message = Some(error_message.to_string());
        }
        order.updated_at = Some(now());

        *self.transitions.lock().unwrap().entry(id).or_insert(0) += 1;
        Ok(Some(order.clone()))
    }
}

// ============================================================================
// InMemoryRunRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryRunRepo {
    runs: Mutex<HashMap<Uuid, RunProfile>>,
}

impl InMemoryRunRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, run_id: Uuid) -> Option<RunProfile> {
        self.runs.lock().unwrap().get(&run_id).cloned()
    }
}

#[async_trait]
impl SettlementRunRepoTrait for InMemoryRunRepo {
    async fn initialize(&self, kind: RunKind) -> AppResult<RunProfile> {
        let run = RunProfile {
            id: Uuid::new_v4(),
            kind,
            state: RunState::InProgress,
            payment_ids: Vec::new(),
            description: None,
            started_at: now(),
            finished_at: None,
        };
        self.runs.lock().unwrap().insert(run.id, run.clone());
        Ok(run)
    }

    async fn append_payment_ids(&self, run_id: Uuid, ids: &[Uuid]) -> AppResult<()> {
        if let Some(run) = self.runs.lock().unwrap().get_mut(&run_id) {
            run.payment_ids.extend_from_slice(ids);
        }
        Ok(())
    }

    async fn succeed(&self, run_id: Uuid) -> AppResult<()> {
        if let Some(run) = self.runs.lock().unwrap().get_mut(&run_id) {
            run.state = RunState::Succeeded;
            run.finished_at = Some(now());
        }
        Ok(())
    }

    async fn fail(&self, run_id: Uuid, description: &str) -> AppResult<()> {
        if let Some(run) = self.runs.lock().unwrap().get_mut(&run_id) {
            run.state = RunState::Failed;
            run.description = Some(description.to_string());
            run.finished_at = Some(now());
        }
        Ok(())
    }
}

// ============================================================================
// InMemoryLock
// ============================================================================

#[derive(Default)]
pub struct InMemoryLock {
    held: Mutex<HashSet<String>>,
    foreign: Mutex<HashSet<String>>,
}

impl InMemoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend another process holds this key.
    pub fn hold_elsewhere(&self, key: &str) {
        self.foreign.lock().unwrap().insert(key.to_string());
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held.lock().unwrap().contains(key) || self.foreign.lock().unwrap().contains(key)
    }
}

#[async_trait]
impl DistributedLockPort for InMemoryLock {
    async fn try_acquire(&self, key: &str, _ttl: Duration) -> AppResult<bool> {
        if self.foreign.lock().unwrap().contains(key) {
            return Ok(false);
        }
        Ok(self.held.lock().unwrap().insert(key.to_string()))
    }

    async fn release(&self, key: &str) -> AppResult<()> {
        self.held.lock().unwrap().remove(key);
        Ok(())
    }
}
