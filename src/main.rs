use dotenvy::dotenv;
use tracing::info;

use reefpay::infra::{
    app::create_app,
    event_notifier::run_event_sender_loop,
    settler_worker::run_settler_loop,
    setup::{init_app_state, init_tracing},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    init_tracing();

    let (app_state, event_rx) = init_app_state().await?;

    let bind_addr = app_state.config.bind_addr;
    let bus_url = app_state.config.bus_url.clone();
    let settle_interval_secs = app_state.config.settle_interval_secs;

    let app = create_app(app_state.clone());

    tokio::spawn(async move {
        run_event_sender_loop(event_rx, bus_url).await;
    });

    let settlement_uc = app_state.settlement_use_cases.clone();
    tokio::spawn(async move {
        run_settler_loop(settlement_uc, settle_interval_secs).await;
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
