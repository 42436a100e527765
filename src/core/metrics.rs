use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    // Tests build several routers per process; only the first install wins.
    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_reorder(outcome: &'static str) {
    metrics::counter!("question_reorders_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_snapshot(records: usize) {
    metrics::counter!("question_snapshots_total").increment(1);
    metrics::gauge!("question_board_size").set(records as f64);
}
