//! Prometheus metrics for run reporting
//!
//! Exposes counters for:
//! - Transaction submissions and reverts
//! - Rate-limit retries
//! - Quote probes
//! - Polling iterations

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec, Encoder, TextEncoder};

lazy_static! {
    // Transaction metrics
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "flock_harvester_transactions_total",
        "Transactions executed by mode",
        &["mode"]
    ).unwrap();

    pub static ref TX_REVERTED: CounterVec = register_counter_vec!(
        "flock_harvester_transactions_reverted_total",
        "Transactions mined with a failed status",
        &[]
    ).unwrap();

    pub static ref RATE_LIMIT_RETRIES: CounterVec = register_counter_vec!(
        "flock_harvester_rate_limit_retries_total",
        "Rate-limited requests retried after a cooldown",
        &["operation"]
    ).unwrap();

    // Quote metrics
    pub static ref QUOTE_PROBES: CounterVec = register_counter_vec!(
        "flock_harvester_quote_probes_total",
        "Quoter probes by fee tier and outcome",
        &["fee_tier", "outcome"]
    ).unwrap();

    // Polling metrics
    pub static ref POLL_ITERATIONS: CounterVec = register_counter_vec!(
        "flock_harvester_poll_iterations_total",
        "Sleeps spent waiting for on-chain state",
        &["target"]
    ).unwrap();
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

// Helper functions to record metrics

pub fn record_tx_dry_run() {
    TX_SUBMITTED.with_label_values(&["dry_run"]).inc();
}

pub fn record_tx_confirmed() {
    TX_SUBMITTED.with_label_values(&["live"]).inc();
}

pub fn record_tx_reverted() {
    TX_REVERTED.with_label_values(&[]).inc();
}

pub fn record_rate_limit_retry(operation: &str) {
    RATE_LIMIT_RETRIES.with_label_values(&[operation]).inc();
}

pub fn record_quote_probe(fee_tier: u32, quoted: bool) {
    QUOTE_PROBES
        .with_label_values(&[&fee_tier.to_string(), if quoted { "quoted" } else { "skipped" }])
        .inc();
}

pub fn record_poll(target: &str) {
    POLL_ITERATIONS.with_label_values(&[target]).inc();
}
