// Metrics for the coordination core
// Counter helpers built on the `metrics` facade

use metrics::{counter, describe_counter};

/// Register metric descriptions
/// Should be called once at application startup
pub fn init_metrics() {
    describe_counter!(
        "notidex_notifications_processed_total",
        "Notifications that were locked, processed, and unlocked"
    );
    describe_counter!(
        "notidex_notifications_stale_total",
        "Notifications skipped because their sequencer was not newer"
    );
    describe_counter!(
        "notidex_lock_contention_total",
        "Reads that found the key locked by another worker"
    );
    describe_counter!(
        "notidex_cas_conflicts_total",
        "Lock acquisitions lost to a concurrent compare-and-swap"
    );
    describe_counter!(
        "notidex_rollbacks_total",
        "Processing failures that rolled the sequencer back"
    );

    tracing::info!("Metrics initialized");
}

pub(crate) fn record_processed() {
    counter!("notidex_notifications_processed_total").increment(1);
}

pub(crate) fn record_stale() {
    counter!("notidex_notifications_stale_total").increment(1);
}

pub(crate) fn record_contention() {
    counter!("notidex_lock_contention_total").increment(1);
}

pub(crate) fn record_cas_conflict() {
    counter!("notidex_cas_conflicts_total").increment(1);
}

pub(crate) fn record_rollback() {
    counter!("notidex_rollbacks_total").increment(1);
}
