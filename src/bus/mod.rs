//! The outbound event bus and inbound snapshot stream, kept behind narrow
//! traits with opaque subscription and publication handles. `nats_bus` is
//! the concrete adapter; `memory_bus` is the in-process fake used by
//! tracker tests.

pub mod memory_bus;
pub mod nats_bus;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::future::Future;

use crate::events::{ControllerEvent, FlightPlanEvent};
use crate::model::Inbound;

/// Publishes typed event envelopes to the outbound bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_controller_event(&self, event: &ControllerEvent) -> Result<()>;
    async fn publish_flight_plan_event(&self, event: &FlightPlanEvent) -> Result<()>;
}

/// Consumes one raw snapshot route, delivering messages to `handler` in
/// order and acknowledging only after `handler` finishes.
///
/// `handler` returning `Ok(())` means the message was fully processed
/// (including all derived publishes) - the adapter acks. Returning `Err`
/// means a transient failure; the adapter does not ack, relying on the
/// bus's redelivery.
#[async_trait]
pub trait InboundConsumer<T>: Send + Sync
where
    T: DeserializeOwned + Send + 'static,
{
    async fn consume<F, Fut>(&self, handler: F) -> Result<()>
    where
        F: FnMut(Inbound<T>) -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send;
}
