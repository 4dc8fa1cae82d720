use std::net::SocketAddr;
use std::str::FromStr;

use crate::application::use_cases::{
    payment::DEFAULT_REFUND_WINDOW_DAYS,
    settlement::{DEFAULT_BATCH_SIZE, DEFAULT_WORKER_COUNT},
};

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub redis_url: String,
    /// Event bus endpoint; events are drained and dropped when unset.
    pub bus_url: Option<String>,
    pub settle_interval_secs: u64,
    pub settle_batch_size: i64,
    pub settle_worker_count: usize,
    /// Days a confirmed one-off purchase stays open before it matures.
    pub refund_window_days: i64,
    pub event_queue_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap()),
            database_url: env_required("DATABASE_URL"),
            redis_url: env_default("REDIS_URL", "redis://127.0.0.1:6379".to_string()),
            bus_url: std::env::var("EVENT_BUS_URL").ok().filter(|s| !s.is_empty()),
            settle_interval_secs: env_default("SETTLE_INTERVAL_SECS", 86_400),
            settle_batch_size: env_default("SETTLE_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            settle_worker_count: env_default("SETTLE_WORKER_COUNT", DEFAULT_WORKER_COUNT),
            refund_window_days: env_default("REFUND_WINDOW_DAYS", DEFAULT_REFUND_WINDOW_DAYS),
            event_queue_capacity: env_default("EVENT_QUEUE_CAPACITY", 1_024),
        }
    }
}

fn env_required(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| panic!("{key} must be set"))
}

fn env_default<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} has an invalid value")),
        Err(_) => default,
    }
}
