//! NATS JetStream bus adapter: durable pull consumer with explicit ack
//! after processing, and publish with broker-level acknowledgement.

use anyhow::{Context, Result};
use async_nats::jetstream::{self, consumer::pull::Config as PullConfig};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::{EventPublisher, InboundConsumer};
use crate::events::{ControllerEvent, FlightPlanEvent};
use crate::metrics::names;
use crate::model::Inbound;

/// Durable publish + durable, explicitly-acked consume over NATS JetStream.
#[derive(Clone)]
pub struct NatsBus {
    jetstream: jetstream::Context,
}

impl NatsBus {
    /// Connect and confirm the JetStream context is reachable.
    pub async fn connect(url: &str) -> Result<Self> {
        info!(url, "connecting to event bus");
        let client = async_nats::connect(url)
            .await
            .context("failed to connect to event bus")?;
        let jetstream = jetstream::new(client);
        Ok(Self { jetstream })
    }

    async fn publish_envelope<T: Serialize>(&self, route: &str, envelope: &T) -> Result<()> {
        let start = Instant::now();
        let payload = serde_json::to_vec(envelope).context("failed to serialize event envelope")?;

        self.jetstream
            .publish(route.to_string(), payload.into())
            .await
            .with_context(|| format!("failed to publish to route {route}"))?
            .await
            .with_context(|| format!("bus did not acknowledge publish to route {route}"))?;

        metrics::histogram!(names::BUS_PUBLISH_DURATION_MS, "route" => route.to_string())
            .record(start.elapsed().as_secs_f64() * 1000.0);
        Ok(())
    }

    /// Create (or reuse) a durable pull consumer bound to `stream_name`,
    /// filtered to `subject`.
    pub async fn durable_consumer(
        &self,
        stream_name: &str,
        subject: &str,
        consumer_name: &str,
    ) -> Result<NatsConsumer> {
        let stream = self
            .jetstream
            .get_stream(stream_name)
            .await
            .with_context(|| format!("failed to get stream {stream_name}"))?;

        let config = PullConfig {
            durable_name: Some(consumer_name.to_string()),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            deliver_policy: jetstream::consumer::DeliverPolicy::All,
            filter_subject: subject.to_string(),
            ..Default::default()
        };

        let consumer = stream
            .get_or_create_consumer(consumer_name, config)
            .await
            .with_context(|| format!("failed to create consumer {consumer_name}"))?;

        Ok(NatsConsumer {
            consumer,
            subject: subject.to_string(),
        })
    }
}

#[async_trait]
impl EventPublisher for NatsBus {
    async fn publish_controller_event(&self, event: &ControllerEvent) -> Result<()> {
        self.publish_envelope(event.route(), event).await
    }

    async fn publish_flight_plan_event(&self, event: &FlightPlanEvent) -> Result<()> {
        self.publish_envelope(event.route(), event).await
    }
}

/// A single durable pull consumer bound to one raw snapshot subject.
pub struct NatsConsumer {
    consumer: jetstream::consumer::Consumer<jetstream::consumer::pull::Config>,
    subject: String,
}

#[async_trait]
impl<T> InboundConsumer<T> for NatsConsumer
where
    T: DeserializeOwned + Send + 'static,
{
    async fn consume<F, Fut>(&self, mut handler: F) -> Result<()>
    where
        F: FnMut(Inbound<T>) -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send,
    {
        let mut messages = self
            .consumer
            .messages()
            .await
            .with_context(|| format!("failed to get message stream for {}", self.subject))?;

        while let Some(message) = messages.next().await {
            let message = match message {
                Ok(m) => m,
                Err(e) => {
                    warn!(error = %e, subject = %self.subject, "error pulling from bus, will retry");
                    continue;
                }
            };

            let envelope: Inbound<T> = match serde_json::from_slice(&message.payload) {
                Ok(e) => e,
                Err(e) => {
                    // Malformed snapshot: silently drop, but ack so it
                    // isn't redelivered forever.
                    debug!(error = %e, "dropping malformed snapshot");
                    metrics::counter!(names::MALFORMED_DROPPED).increment(1);
                    if let Err(ack_err) = message.ack().await {
                        error!(error = %ack_err, "failed to ack malformed message");
                    }
                    continue;
                }
            };

            match handler(envelope).await {
                Ok(()) => {
                    if let Err(e) = message.ack().await {
                        error!(error = %e, "failed to ack processed message");
                    }
                }
                Err(e) => {
                    // Transient error: do not ack, bus will redeliver.
                    warn!(error = %e, subject = %self.subject, "failed to process message, leaving unacked for redelivery");
                }
            }
        }

        Ok(())
    }
}
