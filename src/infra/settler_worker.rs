use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info};

use crate::application::use_cases::settlement::SettlementUseCases;

/// Drives the settlement engine on a fixed schedule. The distributed lock
/// inside the engine keeps multiple instances from overlapping, so this loop
/// can run on every node.
pub async fn run_settler_loop(settlement_uc: Arc<SettlementUseCases>, interval_secs: u64) {
    let mut ticker = interval(Duration::from_secs(interval_secs));

    info!(interval_secs, "settler worker started");

    loop {
        ticker.tick().await;

        match settlement_uc.run_settlement().await {
            Ok(Some(summary)) => {
                info!(run_id = %summary.run_id, closed = summary.closed, "settlement run done");
            }
            Ok(None) => {}
            Err(e) => error!(error = %e, "settlement run failed"),
        }

        match settlement_uc.run_expiry_sweep().await {
            Ok(Some(summary)) => {
                info!(run_id = %summary.run_id, closed = summary.closed, "expiry sweep done");
            }
            Ok(None) => {}
            Err(e) => error!(error = %e, "expiry sweep failed"),
        }
    }
}
