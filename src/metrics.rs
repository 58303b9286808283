use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
///
/// Only the first call in a process installs the global recorder; later
/// calls get a detached handle.
pub fn init_metrics() -> PrometheusHandle {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::debug!("Metrics recorder already installed");
        return handle;
    }

    // Pre-register counters so they appear even before the first increment.
    counter!("purchase_orders_created").absolute(0);
    counter!("purchase_orders_failed").absolute(0);
    counter!("investments_recorded").absolute(0);
    counter!("aggregator_sync_inserted").absolute(0);
    counter!("aggregator_sync_skipped").absolute(0);
    counter!("webhook_events_total").absolute(0);

    // Histogram is lazily created on first record; force creation.
    histogram!("payment_confirmation_seconds").record(0.0);

    handle
}
