use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    application::ports::event_bus::EventBusPort, domain::entities::domain_event::DomainEvent,
};

const HTTP_TIMEOUT_SECS: u64 = 10;

/// Producer half of the notifier: a bounded channel with drop-on-overflow.
/// Publishing never blocks and never fails back into the caller; when the
/// downstream bus is slow the oldest unsent events simply stop growing the
/// queue and new ones are dropped with a warning. Intentionally lossy.
#[derive(Clone)]
pub struct ChannelEventBus {
    tx: mpsc::Sender<DomainEvent>,
}

pub fn event_channel(capacity: usize) -> (ChannelEventBus, mpsc::Receiver<DomainEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ChannelEventBus { tx }, rx)
}

impl EventBusPort for ChannelEventBus {
    fn publish(&self, event: DomainEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(topic = event.topic(), "event queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                warn!(topic = event.topic(), "event sender gone, dropping event");
            }
        }
    }
}

/// Drains the channel and posts each event to the bus endpoint. Send
/// failures are logged and dropped.
pub async fn run_event_sender_loop(mut rx: mpsc::Receiver<DomainEvent>, bus_url: Option<String>) {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .expect("failed to build reqwest client");

    info!(
        bus_configured = bus_url.is_some(),
        "event sender started"
    );

    while let Some(event) = rx.recv().await {
        let Some(url) = &bus_url else {
            debug!(topic = event.topic(), "no bus configured, discarding event");
            continue;
        };

        let body = serde_json::json!({
            "topic": event.topic(),
            "event": event,
        });

        match client.post(url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(
                    topic = event.topic(),
                    status = %response.status(),
                    "event bus rejected event, dropping"
                );
            }
            Err(e) => {
                warn!(topic = event.topic(), error = %e, "event bus send failed, dropping");
            }
        }
    }
}
