//! Metric names, collected at the call sites via the `metrics` facade's
//! `counter!`/`histogram!` macros. Kept as `const` names in one place so
//! call sites and the exporter agree.

/// Install the Prometheus recorder. Call once at startup.
pub fn install_recorder() -> anyhow::Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus metrics recorder: {e}"))
}

pub mod names {
    pub const CONTROLLER_CONNECT: &str = "events.controller.connect.emitted_total";
    pub const CONTROLLER_DISCONNECT: &str = "events.controller.disconnect.emitted_total";
    pub const CONTROLLER_SWEEP_DURATION_MS: &str = "controller.sweep.duration_ms";
    pub const CONTROLLER_SWEEP_FAILURES: &str = "controller.sweep.publish_failures_total";

    pub const FLIGHT_PLAN_FILE: &str = "events.flight_plan.file.emitted_total";
    pub const FLIGHT_PLAN_UPDATE: &str = "events.flight_plan.update.emitted_total";
    pub const FLIGHT_PLAN_EXPIRE: &str = "events.flight_plan.expire.emitted_total";
    pub const FLIGHT_PLAN_STATE_CHANGE: &str = "events.flight_plan.state_change.emitted_total";

    pub const VFR_FILTERED: &str = "flight_plan.vfr_filtered_total";
    pub const MALFORMED_DROPPED: &str = "ingest.malformed_snapshot_dropped_total";
    pub const IMPOSSIBLE_TRANSITION_DROPPED: &str = "flight_plan.impossible_transition_dropped_total";
    pub const ORPHAN_EXPIRY_DROPPED: &str = "flight_plan.orphan_expiry_dropped_total";

    pub const TTL_STORE_OP_DURATION_MS: &str = "ttl_store.op_duration_ms";
    pub const BUS_PUBLISH_DURATION_MS: &str = "bus.publish_duration_ms";
}
