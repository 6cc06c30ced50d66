//! Prometheus metrics for the bridge process (§2.1, ambient).
//!
//! Exposed through the axum router's `/metrics` route (`api::prometheus_metrics`)
//! rather than a standalone socket server.

#![allow(dead_code)]

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec, CounterVec,
    Gauge, GaugeVec, HistogramVec,
};

lazy_static! {
    pub static ref DEPOSITS_PROCESSED: CounterVec = register_counter_vec!(
        "bridge_deposits_processed_total",
        "Total deposit jobs processed",
        &["outcome"]
    )
    .unwrap();

    pub static ref WITHDRAWALS_PROCESSED: CounterVec = register_counter_vec!(
        "bridge_withdrawals_processed_total",
        "Total withdrawal requests processed",
        &["outcome"]
    )
    .unwrap();

    pub static ref SWAPS_TO_WRAPPED: CounterVec = register_counter_vec!(
        "bridge_swaps_to_wrapped_total",
        "Total native-to-wrapped swaps signed",
        &["outcome"]
    )
    .unwrap();

    pub static ref SWAPS_TO_NATIVE: CounterVec = register_counter_vec!(
        "bridge_swaps_to_native_total",
        "Total wrapped-to-native swaps credited",
        &["outcome"]
    )
    .unwrap();

    pub static ref CLAIMS_PROCESSED: CounterVec = register_counter_vec!(
        "bridge_claims_processed_total",
        "Total claim requests processed",
        &["outcome"]
    )
    .unwrap();

    pub static ref OPERATION_LATENCY: HistogramVec = register_histogram_vec!(
        "bridge_operation_latency_seconds",
        "Time to complete a Bridge Service operation",
        &["operation"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]
    )
    .unwrap();

    pub static ref HOT_BALANCE: Gauge = register_gauge!(
        "bridge_hot_wallet_balance_units",
        "Native hot wallet balance, in atomic units"
    )
    .unwrap();

    pub static ref COLD_BALANCE: Gauge = register_gauge!(
        "bridge_cold_wallet_balance_units",
        "Native cold wallet balance, in atomic units"
    )
    .unwrap();

    pub static ref WATCHER_LAG_BLOCKS: GaugeVec = register_gauge_vec!(
        "bridge_watcher_lag_blocks",
        "Blocks between the watcher's scan cursor and chain head",
        &["watcher"]
    )
    .unwrap();

    pub static ref QUEUE_DEPTH: GaugeVec = register_gauge_vec!(
        "bridge_queue_depth",
        "Number of queued jobs awaiting processing",
        &["topic"]
    )
    .unwrap();

    pub static ref BLACKLIST_CACHE_HITS: CounterVec = register_counter_vec!(
        "bridge_blacklist_cache_hits_total",
        "Blacklist oracle lookups served without a network call",
        &["hit"]
    )
    .unwrap();

    pub static ref ERRORS: CounterVec = register_counter_vec!(
        "bridge_errors_total",
        "Total Bridge Service errors by kind",
        &["code"]
    )
    .unwrap();

    pub static ref UP: Gauge = register_gauge!(
        "bridge_up",
        "Whether the bridge process is up and serving"
    )
    .unwrap();
}

/// Record the outcome of a deposit job.
pub fn record_deposit(outcome: &str) {
    DEPOSITS_PROCESSED.with_label_values(&[outcome]).inc();
}

/// Record the outcome of a withdrawal request.
pub fn record_withdrawal(outcome: &str) {
    WITHDRAWALS_PROCESSED.with_label_values(&[outcome]).inc();
}

/// Record the outcome of a native-to-wrapped swap.
pub fn record_swap_to_wrapped(outcome: &str) {
    SWAPS_TO_WRAPPED.with_label_values(&[outcome]).inc();
}

/// Record the outcome of a wrapped-to-native swap.
pub fn record_swap_to_native(outcome: &str) {
    SWAPS_TO_NATIVE.with_label_values(&[outcome]).inc();
}

/// Record the outcome of a claim request.
pub fn record_claim(outcome: &str) {
    CLAIMS_PROCESSED.with_label_values(&[outcome]).inc();
}

/// Record how long a named operation took.
pub fn record_latency(operation: &str, seconds: f64) {
    OPERATION_LATENCY.with_label_values(&[operation]).observe(seconds);
}

/// Record a Bridge Service error by its machine-readable code (§7).
pub fn record_error(code: &str) {
    ERRORS.with_label_values(&[code]).inc();
}

/// Set the current queue depth for a topic.
pub fn set_queue_depth(topic: &str, depth: i64) {
    QUEUE_DEPTH.with_label_values(&[topic]).set(depth as f64);
}

/// Set a watcher's lag behind chain head, in blocks.
pub fn set_watcher_lag(watcher: &str, blocks: i64) {
    WATCHER_LAG_BLOCKS.with_label_values(&[watcher]).set(blocks as f64);
}

/// Record a blacklist oracle lookup as cache-served or not.
pub fn record_blacklist_lookup(cache_hit: bool) {
    let hit = if cache_hit { "true" } else { "false" };
    BLACKLIST_CACHE_HITS.with_label_values(&[hit]).inc();
}
