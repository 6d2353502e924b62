use crate::ledger::{Adjustment, ContentKind};
use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // Ledger metrics
    pub static ref LEDGER_ADJUSTMENTS: IntCounterVec = register_int_counter_vec!(
        "advisory_ledger_adjustments_total",
        "Statistic counter adjustments committed",
        &["counter", "direction"]
    ).expect("metric can be created");

    pub static ref EDGE_CHANGES: IntCounterVec = register_int_counter_vec!(
        "advisory_edge_changes_total",
        "Follow, subscription and contract edges created or removed",
        &["kind", "action"]
    ).expect("metric can be created");

    pub static ref CONTENT_CHANGES: IntCounterVec = register_int_counter_vec!(
        "advisory_content_changes_total",
        "Portfolios, viewpoints and recommendations created or deleted",
        &["kind", "action"]
    ).expect("metric can be created");

    pub static ref USERS_CREATED: IntCounter = register_int_counter!(
        "advisory_users_created_total",
        "Users created together with their statistic record"
    ).expect("metric can be created");

    // Outbound
    pub static ref SECURITY_CODES_SENT: IntCounter = register_int_counter!(
        "advisory_security_codes_sent_total",
        "Verification codes issued"
    ).expect("metric can be created");

    pub static ref SHORTENER_FAILURES: IntCounter = register_int_counter!(
        "advisory_shortener_failures_total",
        "Failed calls to the URL shortening service"
    ).expect("metric can be created");
}

/// Forces registration so every series shows up on the first scrape.
pub fn init() {
    lazy_static::initialize(&LEDGER_ADJUSTMENTS);
    lazy_static::initialize(&EDGE_CHANGES);
    lazy_static::initialize(&CONTENT_CHANGES);
    lazy_static::initialize(&USERS_CREATED);
    lazy_static::initialize(&SECURITY_CODES_SENT);
    lazy_static::initialize(&SHORTENER_FAILURES);
}

pub fn record_adjustments(adjustments: &[Adjustment]) {
    for adjustment in adjustments {
        let direction = if adjustment.delta >= 0 { "up" } else { "down" };
        LEDGER_ADJUSTMENTS
            .with_label_values(&[adjustment.counter.column(), direction])
            .inc_by(adjustment.delta.unsigned_abs());
    }
}

pub fn record_edge_change(kind: &str, action: &str) {
    EDGE_CHANGES.with_label_values(&[kind, action]).inc();
}

pub fn record_content_change(kind: ContentKind, action: &str) {
    CONTENT_CHANGES.with_label_values(&[kind.as_str(), action]).inc();
}

/// Generate metrics output in Prometheus text format
pub fn metrics_handler() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
