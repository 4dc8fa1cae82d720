use std::fs::File;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{http::app_state::AppState, persistence::PostgresPersistence},
    application::ports::{dist_lock::DistributedLockPort, event_bus::EventBusPort},
    application::use_cases::{
        balance::{BalanceRepoTrait, BalanceUseCases},
        order::{OrderRepoTrait, OrderUseCases},
        payment::{LedgerRepoTrait, PaymentRepoTrait, PaymentUseCases},
        settlement::{SettlementRunRepoTrait, SettlementUseCases},
    },
    domain::entities::domain_event::DomainEvent,
    infra::{
        config::AppConfig, db::init_db, event_notifier::event_channel,
        redis_lock::RedisDistributedLock,
    },
};

pub async fn init_app_state() -> anyhow::Result<(AppState, mpsc::Receiver<DomainEvent>)> {
    let config = AppConfig::from_env();

    let pool = init_db(&config.database_url).await?;
    let postgres_arc = Arc::new(PostgresPersistence::new(pool));

    let (bus, event_rx) = event_channel(config.event_queue_capacity);
    let event_bus = Arc::new(bus) as Arc<dyn EventBusPort>;

    let lock = Arc::new(RedisDistributedLock::new(&config.redis_url).await?)
        as Arc<dyn DistributedLockPort>;

    let balance_repo = postgres_arc.clone() as Arc<dyn BalanceRepoTrait>;
    let payment_repo = postgres_arc.clone() as Arc<dyn PaymentRepoTrait>;
    let ledger_repo = postgres_arc.clone() as Arc<dyn LedgerRepoTrait>;
    let order_repo = postgres_arc.clone() as Arc<dyn OrderRepoTrait>;
    let run_repo = postgres_arc.clone() as Arc<dyn SettlementRunRepoTrait>;

    let balance_use_cases = BalanceUseCases::new(balance_repo.clone(), event_bus.clone());

    let payment_use_cases = PaymentUseCases::new(
        payment_repo.clone(),
        balance_repo.clone(),
        ledger_repo.clone(),
        event_bus.clone(),
        config.refund_window_days,
    );

    let order_use_cases = OrderUseCases::new(order_repo, payment_repo.clone());

    let settlement_use_cases = SettlementUseCases::new(
        payment_repo,
        balance_repo,
        ledger_repo,
        run_repo,
        lock,
        event_bus,
        config.settle_worker_count,
        config.settle_batch_size,
    );

    let app_state = AppState {
        config: Arc::new(config),
        balance_use_cases: Arc::new(balance_use_cases),
        payment_use_cases: Arc::new(payment_use_cases),
        order_use_cases: Arc::new(order_use_cases),
        settlement_use_cases: Arc::new(settlement_use_cases),
    };

    Ok((app_state, event_rx))
}

pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "reefpay=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false) // don’t show target (module path)
        .with_level(true) // show log level
        .pretty(); // human-friendly, with colors

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
