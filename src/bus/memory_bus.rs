//! In-process fakes for `EventPublisher` and `InboundConsumer`, used by
//! tracker tests so they exercise the real tracker logic without a live
//! NATS server.

use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Mutex;
use tokio::sync::mpsc;

use super::{EventPublisher, InboundConsumer};
use crate::events::{ControllerEvent, FlightPlanEvent};
use crate::model::Inbound;

/// Captures every published event in arrival order for assertions.
#[derive(Default)]
pub struct RecordingBus {
    pub controller_events: Mutex<Vec<ControllerEvent>>,
    pub flight_plan_events: Mutex<Vec<FlightPlanEvent>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain_flight_plan_events(&self) -> Vec<FlightPlanEvent> {
        std::mem::take(&mut self.flight_plan_events.lock().unwrap())
    }

    pub fn drain_controller_events(&self) -> Vec<ControllerEvent> {
        std::mem::take(&mut self.controller_events.lock().unwrap())
    }
}

#[async_trait]
impl EventPublisher for RecordingBus {
    async fn publish_controller_event(&self, event: &ControllerEvent) -> Result<()> {
        self.controller_events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn publish_flight_plan_event(&self, event: &FlightPlanEvent) -> Result<()> {
        self.flight_plan_events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// A channel-backed inbound stream a test can feed by hand; acks are
/// observed via `acked`/`unacked` counters rather than actually affecting
/// redelivery (there's nothing to redeliver from in a test fake).
pub struct ChannelConsumer<T> {
    receiver: Mutex<mpsc::UnboundedReceiver<Inbound<T>>>,
}

impl<T> ChannelConsumer<T> {
    pub fn new() -> (mpsc::UnboundedSender<Inbound<T>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                receiver: Mutex::new(rx),
            },
        )
    }
}

#[async_trait]
impl<T> InboundConsumer<T> for ChannelConsumer<T>
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    async fn consume<F, Fut>(&self, mut handler: F) -> Result<()>
    where
        F: FnMut(Inbound<T>) -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send,
    {
        loop {
            let next = self.receiver.lock().unwrap().try_recv();
            let envelope = match next {
                Ok(e) => e,
                Err(mpsc::error::TryRecvError::Empty) => {
                    // Test fixtures push everything up front; a brief yield
                    // lets any outstanding sends land, then we're done.
                    tokio::task::yield_now().await;
                    match self.receiver.lock().unwrap().try_recv() {
                        Ok(e) => e,
                        Err(_) => return Ok(()),
                    }
                }
                Err(mpsc::error::TryRecvError::Disconnected) => return Ok(()),
            };

            // Errors are surfaced to the caller in the fake; there's no
            // real redelivery mechanism to fall back on.
            handler(envelope).await?;
        }
    }
}
