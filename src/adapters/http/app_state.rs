use std::sync::Arc;

use crate::{
    application::use_cases::{
        balance::BalanceUseCases, order::OrderUseCases, payment::PaymentUseCases,
        settlement::SettlementUseCases,
    },
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub balance_use_cases: Arc<BalanceUseCases>,
    pub payment_use_cases: Arc<PaymentUseCases>,
    pub order_use_cases: Arc<OrderUseCases>,
    pub settlement_use_cases: Arc<SettlementUseCases>,
}
