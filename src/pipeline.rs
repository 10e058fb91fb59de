//! Wires the trackers to their inbound streams and timers. Each `run_*`
//! function is a single long-running loop, meant to be `tokio::spawn`ed
//! from `main` and raced against a shutdown signal there.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::bus::{EventPublisher, InboundConsumer};
use crate::clock::Clock;
use crate::controller_tracker::ControllerTracker;
use crate::flight_plan_tracker::FlightPlanTracker;
use crate::model::{Controller, Inbound, PilotOrPrefile};
use crate::ttl_store::TtlStore;

/// Consume the controller snapshot stream, observing each controller and
/// publishing any resulting connect event.
pub async fn run_controller_ingest<C, Consumer>(
    consumer: Consumer,
    tracker: ControllerTracker<C>,
    bus: Arc<dyn EventPublisher>,
) -> Result<()>
where
    C: Clock + 'static,
    Consumer: InboundConsumer<Controller>,
{
    consumer
        .consume(move |envelope: Inbound<Controller>| {
            let tracker = tracker.clone();
            let bus = Arc::clone(&bus);
            async move {
                for event in tracker.observe(envelope.data, envelope.batch_id).await {
                    bus.publish_controller_event(&event)
                        .await
                        .context("failed to publish controller connect event")?;
                }
                Ok(())
            }
        })
        .await
}

/// Consume one of the `raw.flight_plans` / `raw.prefiles` snapshot routes,
/// ingesting each record into the flight-plan tracker. `T` is
/// the route's wire record (`PilotRecord` or `PrefileRecord`); both convert
/// into the tracker's unified `PilotOrPrefile`.
pub async fn run_flight_plan_ingest<C, Consumer, T>(
    consumer: Consumer,
    tracker: FlightPlanTracker<C>,
) -> Result<()>
where
    C: Clock + 'static,
    Consumer: InboundConsumer<T>,
    T: Into<PilotOrPrefile> + serde::de::DeserializeOwned + Send + 'static,
{
    consumer
        .consume(move |envelope: Inbound<T>| {
            let tracker = tracker.clone();
            async move { tracker.ingest(&envelope.data.into()).await }
        })
        .await
}

/// Periodically sweep for inactive controllers and publish disconnects.
/// Runs until the process exits; callers race this against a shutdown
/// signal.
pub async fn run_controller_sweep<C: Clock>(
    tracker: ControllerTracker<C>,
    bus: Arc<dyn EventPublisher>,
    sweep_interval: Duration,
    inactive_timeout: Duration,
) -> Result<()> {
    let mut ticker = tokio::time::interval(sweep_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let start = std::time::Instant::now();
        let events = tracker.sweep(inactive_timeout.as_millis() as i64);
        for event in events {
            if let Err(e) = bus.publish_controller_event(&event).await {
                metrics::counter!(crate::metrics::names::CONTROLLER_SWEEP_FAILURES).increment(1);
                error!(error = %e, "failed to publish controller disconnect event");
            }
        }
        metrics::histogram!(crate::metrics::names::CONTROLLER_SWEEP_DURATION_MS)
            .record(start.elapsed().as_secs_f64() * 1000.0);
    }
}

/// Bridge the TTL store's synchronous expiry callback to the flight-plan
/// tracker's async `on_expire`. `subscribe_expiries` hands keys off a
/// bounded channel so the store's notification loop is never blocked on
/// tracker work.
pub async fn run_expiry_listener<C: Clock + 'static>(
    store: Arc<dyn TtlStore>,
    tracker: FlightPlanTracker<C>,
) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    // `subscribe_expiries` blocks its caller for the lifetime of the
    // subscription (it drives the store's notification stream), so it runs
    // on its own task; this task only drains the channel.
    let subscription = tokio::spawn(async move {
        store
            .subscribe_expiries(Box::new(move |key| {
                if tx.send(key).is_err() {
                    warn!("expiry listener channel closed, dropping notification");
                }
            }))
            .await
    });

    info!("listening for flight-plan TTL expiries");
    while let Some(sentinel) = rx.recv().await {
        if let Err(e) = tracker.on_expire(&sentinel).await {
            error!(error = %e, sentinel, "failed to process flight-plan expiry");
        }
    }

    subscription
        .await
        .context("expiry subscription task panicked")?
        .context("TTL store expiry subscription ended with an error")?;
    Ok(())
}
