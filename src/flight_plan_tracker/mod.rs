//! Flight-plan tracker: maintains at most one active flight
//! plan per `(cid, callsign)`, diffing incoming pilot/prefile snapshots
//! against the TTL store and emitting file/update/expire/state_change
//! events.

pub mod airborne;
pub mod diff;
pub mod identity;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::clock::Clock;
use crate::config::FLIGHT_PLAN_TTL;
use crate::events::{FlightPlanEvent, FlightPlanEventKind, Pilot, StateTransition};
use crate::metrics::names;
use crate::model::{FlightPlan, PilotOrPrefile, Position};
use crate::ttl_store::{self, TtlStore};
use airborne::FlightState;

/// The stored flight-plan record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightPlanRecord {
    pub pilot: Pilot,
    pub flight_plan: FlightPlan,
    pub state: FlightState,
    pub last_state_change_ms: i64,
    pub previous_altitude: Option<i64>,
    pub timestamp_ms: i64,
}

/// Tracks filed flight plans and advances them through the airborne state
/// machine. Cheap to clone - the store and publisher are already
/// trait-object `Arc`s.
#[derive(Clone)]
pub struct FlightPlanTracker<C: Clock> {
    store: Arc<dyn TtlStore>,
    publisher: Arc<dyn crate::bus::EventPublisher>,
    clock: Arc<C>,
}

impl<C: Clock> FlightPlanTracker<C> {
    pub fn new(
        store: Arc<dyn TtlStore>,
        publisher: Arc<dyn crate::bus::EventPublisher>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            store,
            publisher,
            clock,
        }
    }

    /// Ingest one pilot or prefile snapshot.
    #[instrument(skip(self, incoming), fields(cid = incoming.cid(), callsign = %incoming.callsign()))]
    pub async fn ingest(&self, incoming: &PilotOrPrefile) -> Result<()> {
        let plan = incoming.flight_plan();
        if plan.flight_rules != "I" {
            debug!("dropping VFR plan, only IFR is admitted");
            metrics::counter!(names::VFR_FILTERED).increment(1);
            return Ok(());
        }

        let base_key = identity::base_key(incoming.cid(), incoming.callsign());
        let candidate_keys = self
            .store
            .scan(&format!("{base_key}-"))
            .await
            .context("failed to scan flight-plan store for base key")?;

        let mut matching: Option<(String, FlightPlanRecord)> = None;
        let mut others = Vec::new();
        for key in candidate_keys {
            let Some(raw) = self.store.get(&key).await.context("failed to read candidate record")? else {
                continue;
            };
            let record: FlightPlanRecord = match serde_json::from_slice(&raw) {
                Ok(r) => r,
                Err(e) => {
                    warn!(key, error = %e, "dropping unreadable flight-plan record");
                    continue;
                }
            };
            if record.flight_plan.departure == plan.departure {
                matching = Some((key, record));
            } else {
                others.push(key);
            }
        }

        match matching {
            Some((key, mut record)) => {
                self.apply_update_and_state(&key, &mut record, incoming).await?;
                Ok(())
            }
            None => self.supersede_and_file(&base_key, others, incoming).await,
        }
    }

    async fn apply_update_and_state(
        &self,
        key: &str,
        record: &mut FlightPlanRecord,
        incoming: &PilotOrPrefile,
    ) -> Result<()> {
        let now_ms = self.clock.now_ms();
        let plan = incoming.flight_plan();

        if diff::plans_differ(Some(&record.flight_plan), plan) {
            record.flight_plan = plan.clone();
            record.timestamp_ms = now_ms;
            metrics::counter!(names::FLIGHT_PLAN_UPDATE).increment(1);
            self.publisher
                .publish_flight_plan_event(&FlightPlanEvent {
                    event: FlightPlanEventKind::Update,
                    pilot: record.pilot.clone(),
                    flight_plan: record.flight_plan.clone(),
                    timestamp: now_ms,
                    state: None,
                    position: None,
                })
                .await
                .context("failed to publish update event")?;
        }

        if let Some(position) = incoming.position() {
            match airborne::propose_transition(record.state, position.groundspeed) {
                Some(proposal) if airborne::is_allowed(record.state, proposal.to) => {
                    let previous = record.state;
                    record.state = proposal.to;
                    record.last_state_change_ms = now_ms;
                    record.previous_altitude = Some(position.altitude);
                    record.timestamp_ms = now_ms;
                    metrics::counter!(names::FLIGHT_PLAN_STATE_CHANGE).increment(1);
                    self.publisher
                        .publish_flight_plan_event(&FlightPlanEvent {
                            event: FlightPlanEventKind::StateChange,
                            pilot: record.pilot.clone(),
                            flight_plan: record.flight_plan.clone(),
                            timestamp: now_ms,
                            state: Some(StateTransition {
                                previous: previous.as_str().to_string(),
                                current: proposal.to.as_str().to_string(),
                                reason: proposal.reason.to_string(),
                            }),
                            position: Some(position),
                        })
                        .await
                        .context("failed to publish state_change event")?;
                }
                Some(proposal) => {
                    debug!(
                        from = record.state.as_str(),
                        to = proposal.to.as_str(),
                        "dropping transition not in the allowed-transition set"
                    );
                    metrics::counter!(names::IMPOSSIBLE_TRANSITION_DROPPED).increment(1);
                    record.previous_altitude = Some(position.altitude);
                }
                None => {
                    record.previous_altitude = Some(position.altitude);
                }
            }
        }

        let serialized = serde_json::to_vec(record).context("failed to serialize flight-plan record")?;
        ttl_store::refresh_ttl(self.store.as_ref(), key, &serialized, FLIGHT_PLAN_TTL)
            .await
            .context("failed to refresh flight-plan TTL")?;
        self.store
            .put(key, &serialized)
            .await
            .context("failed to persist flight-plan record")?;
        Ok(())
    }

    async fn supersede_and_file(
        &self,
        base_key: &str,
        others: Vec<String>,
        incoming: &PilotOrPrefile,
    ) -> Result<()> {
        let now_ms = self.clock.now_ms();

        for key in others {
            let Some(raw) = self.store.get(&key).await.context("failed to read record to expire")? else {
                continue;
            };
            let record: FlightPlanRecord = match serde_json::from_slice(&raw) {
                Ok(r) => r,
                Err(_) => continue,
            };
            metrics::counter!(names::FLIGHT_PLAN_EXPIRE).increment(1);
            self.publisher
                .publish_flight_plan_event(&FlightPlanEvent {
                    event: FlightPlanEventKind::Expire,
                    pilot: record.pilot.clone(),
                    flight_plan: record.flight_plan.clone(),
                    timestamp: now_ms,
                    state: None,
                    position: None,
                })
                .await
                .context("failed to publish expire event during supersession")?;
            self.store
                .delete(&key)
                .await
                .context("failed to delete superseded record")?;
        }

        let plan = incoming.flight_plan();
        let pilot = Pilot {
            cid: incoming.cid(),
            callsign: incoming.callsign().to_string(),
        };
        let record = FlightPlanRecord {
            pilot: pilot.clone(),
            flight_plan: plan.clone(),
            state: FlightState::Filed,
            last_state_change_ms: now_ms,
            previous_altitude: incoming.position().map(|p: Position| p.altitude),
            timestamp_ms: now_ms,
        };

        let key = identity::full_key(incoming.cid(), incoming.callsign(), &plan.departure);
        let serialized = serde_json::to_vec(&record).context("failed to serialize new flight-plan record")?;
        self.store
            .put(&key, &serialized)
            .await
            .context("failed to store new flight-plan record")?;
        self.store
            .arm(&ttl_store::sentinel_key(&key), FLIGHT_PLAN_TTL)
            .await
            .context("failed to arm TTL sentinel for new flight-plan record")?;

        metrics::counter!(names::FLIGHT_PLAN_FILE).increment(1);
        self.publisher
            .publish_flight_plan_event(&FlightPlanEvent {
                event: FlightPlanEventKind::File,
                pilot,
                flight_plan: plan.clone(),
                timestamp: now_ms,
                state: None,
                position: None,
            })
            .await
            .context("failed to publish file event")?;

        let _ = base_key; // kept for symmetry with the scan call above
        Ok(())
    }

    /// Handle a fired TTL sentinel.
    #[instrument(skip(self))]
    pub async fn on_expire(&self, sentinel: &str) -> Result<()> {
        let Some(data_key) = ttl_store::data_key_from_sentinel(sentinel) else {
            warn!(sentinel, "expiry fired for a key outside the ttl: namespace, ignoring");
            return Ok(());
        };

        let Some(raw) = self
            .store
            .get(data_key)
            .await
            .context("failed to read expired flight-plan record")?
        else {
            // Orphan expiry: sentinel fired for a key whose data is
            // already gone. Log, no event.
            debug!(data_key, "orphan expiry: data key already absent");
            metrics::counter!(names::ORPHAN_EXPIRY_DROPPED).increment(1);
            return Ok(());
        };

        let record: FlightPlanRecord = serde_json::from_slice(&raw)
            .context("failed to deserialize expired flight-plan record")?;
        let now_ms = self.clock.now_ms();

        metrics::counter!(names::FLIGHT_PLAN_STATE_CHANGE).increment(1);
        self.publisher
            .publish_flight_plan_event(&FlightPlanEvent {
                event: FlightPlanEventKind::StateChange,
                pilot: record.pilot.clone(),
                flight_plan: record.flight_plan.clone(),
                timestamp: now_ms,
                state: Some(StateTransition {
                    previous: record.state.as_str().to_string(),
                    current: FlightState::Cancelled.as_str().to_string(),
                    reason: "flight_plan_expired".to_string(),
                }),
                position: None,
            })
            .await
            .context("failed to publish cancellation state_change")?;

        metrics::counter!(names::FLIGHT_PLAN_EXPIRE).increment(1);
        self.publisher
            .publish_flight_plan_event(&FlightPlanEvent {
                event: FlightPlanEventKind::Expire,
                pilot: record.pilot,
                flight_plan: record.flight_plan,
                timestamp: now_ms,
                state: None,
                position: None,
            })
            .await
            .context("failed to publish expire event")?;

        self.store
            .delete(data_key)
            .await
            .context("failed to delete expired flight-plan record")?;
        Ok(())
    }
}
