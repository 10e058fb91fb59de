use std::sync::Arc;

use anyhow::{Context, Result};
use atc_eventstream::bus::nats_bus::NatsBus;
use atc_eventstream::config::{
    CONTROLLER_INACTIVE_TIMEOUT, CONTROLLER_SWEEP_INTERVAL, Settings,
};
use atc_eventstream::model::{PilotRecord, PrefileRecord};
use atc_eventstream::ttl_store::redis_store::RedisTtlStore;
use atc_eventstream::{ControllerTracker, FlightPlanTracker, SystemClock};
use tracing::{Instrument, error, info, info_span};

const CONTROLLER_STREAM: &str = "RAW_CONTROLLERS";
const CONTROLLER_SUBJECT: &str = "raw.controllers";
const CONTROLLER_CONSUMER: &str = "atc-eventstream-controllers";

const FLIGHT_PLAN_STREAM: &str = "RAW_FLIGHT_PLANS";
const FLIGHT_PLAN_SUBJECT: &str = "raw.flight_plans";
const FLIGHT_PLAN_CONSUMER: &str = "atc-eventstream-flight-plans";

const PREFILE_STREAM: &str = "RAW_PREFILES";
const PREFILE_SUBJECT: &str = "raw.prefiles";
const PREFILE_CONSUMER: &str = "atc-eventstream-prefiles";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env().context("failed to load configuration")?;
    atc_eventstream::telemetry::init(&settings.log_level).context("failed to initialize logging")?;
    atc_eventstream::metrics::install_recorder().context("failed to install metrics recorder")?;

    info!("starting event-stream processor");

    let bus = Arc::new(
        NatsBus::connect(&settings.bus_url)
            .await
            .context("startup connectivity probe failed: event bus unreachable")?,
    );
    let store: Arc<RedisTtlStore> = Arc::new(
        RedisTtlStore::connect(&settings.ttl_store_url)
            .await
            .context("startup connectivity probe failed: TTL store unreachable")?,
    );

    let clock = Arc::new(SystemClock);
    let controller_tracker = ControllerTracker::new(Arc::clone(&clock));
    let flight_plan_tracker =
        FlightPlanTracker::new(store.clone(), bus.clone(), Arc::clone(&clock));

    let controller_consumer = bus
        .durable_consumer(CONTROLLER_STREAM, CONTROLLER_SUBJECT, CONTROLLER_CONSUMER)
        .await
        .context("failed to set up controller consumer")?;
    let flight_plan_consumer = bus
        .durable_consumer(FLIGHT_PLAN_STREAM, FLIGHT_PLAN_SUBJECT, FLIGHT_PLAN_CONSUMER)
        .await
        .context("failed to set up flight-plan consumer")?;
    let prefile_consumer = bus
        .durable_consumer(PREFILE_STREAM, PREFILE_SUBJECT, PREFILE_CONSUMER)
        .await
        .context("failed to set up prefile consumer")?;

    let mut tasks = tokio::task::JoinSet::new();

    tasks.spawn(
        atc_eventstream::pipeline::run_controller_ingest(
            controller_consumer,
            controller_tracker.clone(),
            bus.clone() as Arc<dyn atc_eventstream::bus::EventPublisher>,
        )
        .instrument(info_span!("pipeline", name = "controllers")),
    );
    tasks.spawn(
        atc_eventstream::pipeline::run_controller_sweep(
            controller_tracker,
            bus.clone() as Arc<dyn atc_eventstream::bus::EventPublisher>,
            CONTROLLER_SWEEP_INTERVAL,
            CONTROLLER_INACTIVE_TIMEOUT,
        )
        .instrument(info_span!("pipeline", name = "controller_sweep")),
    );
    tasks.spawn(
        atc_eventstream::pipeline::run_flight_plan_ingest::<_, _, PilotRecord>(
            flight_plan_consumer,
            flight_plan_tracker.clone(),
        )
        .instrument(info_span!("pipeline", name = "flight_plans")),
    );
    tasks.spawn(
        atc_eventstream::pipeline::run_flight_plan_ingest::<_, _, PrefileRecord>(
            prefile_consumer,
            flight_plan_tracker.clone(),
        )
        .instrument(info_span!("pipeline", name = "prefiles")),
    );
    tasks.spawn(
        atc_eventstream::pipeline::run_expiry_listener(
            store.clone() as Arc<dyn atc_eventstream::ttl_store::TtlStore>,
            flight_plan_tracker,
        )
        .instrument(info_span!("pipeline", name = "flight_plan_expiry")),
    );

    tokio::select! {
        _ = shutdown_signal() => {
            info!("received shutdown signal, draining in-flight work");
        }
        Some(result) = tasks.join_next() => {
            match result {
                Ok(Ok(())) => error!("a pipeline task exited unexpectedly"),
                Ok(Err(e)) => error!(error = %e, "a pipeline task failed"),
                Err(e) => error!(error = %e, "a pipeline task panicked"),
            }
        }
    }

    tasks.shutdown().await;
    Ok(())
}

/// Waits for Ctrl+C or, on unix, SIGTERM - whichever arrives first.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
