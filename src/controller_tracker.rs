//! Controller tracker: maintains the set of online controllers,
//! emitting connect on first sight and disconnect on inactivity, gated by a
//! batch warm-up counter so the cold-start snapshot doesn't look like mass
//! connects.

use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::config::WARMUP_BATCH_THRESHOLD;
use crate::events::{ControllerEvent, ControllerEventKind};
use crate::metrics::names;
use crate::model::Controller;

/// One entry per `(cid, callsign)` identity.
#[derive(Debug, Clone)]
struct ControllerRecord {
    first_seen_snapshot: Controller,
    last_seen_ms: i64,
    /// Whether `connect` has been published for this identity. A
    /// controller cached while still warming up gets this flipped (and
    /// its backlog connect published) the first time any later `observe`
    /// call finds the warm-up threshold cleared - not only if it happens
    /// to be re-observed itself.
    connect_announced: bool,
}

/// Identity key for controller records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControllerKey {
    pub cid: i64,
    pub callsign: String,
}

impl ControllerKey {
    fn of(controller: &Controller) -> Self {
        Self {
            cid: controller.cid,
            callsign: controller.callsign.clone(),
        }
    }
}

/// Tracks online controllers and emits connect/disconnect events.
///
/// Cheap to clone: internal state is `Arc`-shared, so every clone observes
/// and mutates the same underlying records.
pub struct ControllerTracker<C: Clock> {
    records: Arc<DashMap<ControllerKey, ControllerRecord>>,
    batches_observed: Arc<AtomicU64>,
    last_batch_id: Arc<Mutex<Option<String>>>,
    clock: Arc<C>,
}

impl<C: Clock> Clone for ControllerTracker<C> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            batches_observed: Arc::clone(&self.batches_observed),
            last_batch_id: Arc::clone(&self.last_batch_id),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C: Clock> ControllerTracker<C> {
    pub fn new(clock: Arc<C>) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            batches_observed: Arc::new(AtomicU64::new(0)),
            last_batch_id: Arc::new(Mutex::new(None)),
            clock,
        }
    }

    /// Number of distinct batch ids seen so far (for tests/diagnostics).
    pub fn batches_observed(&self) -> u64 {
        self.batches_observed.load(Ordering::SeqCst)
    }

    /// Observe a single controller from a snapshot batch.
    ///
    /// Caches or refreshes the identity unconditionally. If the warm-up
    /// threshold is cleared, returns a connect event for every cached
    /// identity not yet announced - not just the one just observed, so a
    /// controller first cached during warm-up still gets announced once
    /// the engine trusts its view of the cache, even if it's never
    /// resent after warm-up clears.
    #[instrument(skip(self, controller), fields(cid = controller.cid, callsign = %controller.callsign))]
    pub async fn observe(
        &self,
        controller: Controller,
        batch_id: Option<String>,
    ) -> Vec<ControllerEvent> {
        if let Some(batch_id) = &batch_id {
            let mut last = self.last_batch_id.lock().await;
            if last.as_deref() != Some(batch_id.as_str()) {
                self.batches_observed.fetch_add(1, Ordering::SeqCst);
                *last = Some(batch_id.clone());
            }
        }

        let key = ControllerKey::of(&controller);
        let now_ms = self.clock.now_ms();

        self.records
            .entry(key)
            .and_modify(|record| record.last_seen_ms = now_ms)
            .or_insert_with(|| ControllerRecord {
                first_seen_snapshot: controller,
                last_seen_ms: now_ms,
                connect_announced: false,
            });

        let warmed_up = self.batches_observed.load(Ordering::SeqCst) > WARMUP_BATCH_THRESHOLD;
        if !warmed_up {
            debug!("still inside warm-up, suppressing connect events");
            return Vec::new();
        }

        let mut events = Vec::new();
        for mut entry in self.records.iter_mut() {
            if entry.connect_announced {
                continue;
            }
            entry.connect_announced = true;
            metrics::counter!(names::CONTROLLER_CONNECT).increment(1);
            info!(cid = entry.key().cid, callsign = %entry.key().callsign, "controller connected");
            events.push(ControllerEvent {
                event: ControllerEventKind::Connect,
                data: entry.first_seen_snapshot.clone(),
                timestamp: now_ms,
            });
        }
        events
    }

    /// Sweep for inactive controllers. Returns disconnect
    /// events for every controller whose `lastSeen` is older than
    /// `inactive_timeout_ms`. Skipped entirely below the warm-up threshold.
    #[instrument(skip(self))]
    pub fn sweep(&self, inactive_timeout_ms: i64) -> Vec<ControllerEvent> {
        if self.batches_observed.load(Ordering::SeqCst) < WARMUP_BATCH_THRESHOLD {
            debug!("skipping sweep before warm-up threshold is reached");
            return Vec::new();
        }

        let now_ms = self.clock.now_ms();
        let warmed_up = self.batches_observed.load(Ordering::SeqCst) > WARMUP_BATCH_THRESHOLD;

        let mut expired_keys = Vec::new();
        for entry in self.records.iter() {
            if now_ms - entry.value().last_seen_ms > inactive_timeout_ms {
                expired_keys.push(entry.key().clone());
            }
        }

        let mut events = Vec::with_capacity(expired_keys.len());
        for key in expired_keys {
            if let Some((_, record)) = self.records.remove(&key) {
                if warmed_up {
                    metrics::counter!(names::CONTROLLER_DISCONNECT).increment(1);
                    info!(cid = key.cid, callsign = %key.callsign, "controller disconnected");
                    events.push(ControllerEvent {
                        event: ControllerEventKind::Disconnect,
                        data: record.first_seen_snapshot,
                        timestamp: now_ms,
                    });
                } else {
                    warn!("controller expired during warm-up, suppressing disconnect event");
                }
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;

    fn test_controller(cid: i64, callsign: &str) -> Controller {
        Controller {
            cid,
            name: "Test".to_string(),
            callsign: callsign.to_string(),
            frequency: "199.998".to_string(),
            facility: 0,
            rating: 1,
            server: "TEST".to_string(),
            visual_range: 100,
            text_atis: vec![],
            last_updated: "2026-01-01T00:00:00Z".to_string(),
            logon_time: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn warmup_suppresses_first_two_batches() {
        let clock = FakeClock::new(0);
        let tracker = ControllerTracker::new(clock);

        // Batch A
        let e = tracker
            .observe(test_controller(1, "TEST_CTR"), Some("A".to_string()))
            .await;
        assert!(e.is_empty());

        // Batch B: a distinct controller under a new batch id (the engine
        // only ever learns of a batch's existence via a tuple carrying it,
        // so a batch with zero controllers is unobservable - see DESIGN.md).
        let e = tracker
            .observe(test_controller(2, "OTHER"), Some("B".to_string()))
            .await;
        assert!(e.is_empty());

        // Batch C: controller 1 seen again -> batches_observed now > 2. Every
        // cached identity not yet announced gets its connect in this one call.
        let e = tracker
            .observe(test_controller(1, "TEST_CTR"), Some("C".to_string()))
            .await;
        assert_eq!(e.len(), 2, "both controllers 1 and 2 are still unannounced");
        assert!(e.iter().all(|ev| ev.event == ControllerEventKind::Connect));

        // A brand new controller in batch C connects immediately, since
        // warm-up is already cleared.
        let e = tracker
            .observe(test_controller(3, "NEWGUY"), Some("C".to_string()))
            .await;
        assert_eq!(e.len(), 1);
        assert_eq!(e[0].event, ControllerEventKind::Connect);
        assert_eq!(e[0].data.callsign, "NEWGUY");
    }

    #[tokio::test]
    async fn a_controller_cached_during_warmup_is_announced_on_a_later_unrelated_observe() {
        let clock = FakeClock::new(0);
        let tracker = ControllerTracker::new(clock);

        // X is seen once, during batch A, and never again.
        let e = tracker
            .observe(test_controller(1, "FIRST_ONLY"), Some("A".to_string()))
            .await;
        assert!(e.is_empty());

        // Batch B carries no controller at all that re-touches X; a distinct
        // controller arrives instead. Warm-up is still not cleared.
        let e = tracker
            .observe(test_controller(2, "OTHER"), Some("B".to_string()))
            .await;
        assert!(e.is_empty());

        // Batch C: an unrelated controller crosses the warm-up threshold.
        // X, cached since batch A and never re-observed, must still be
        // announced here rather than being silently dropped.
        let e = tracker
            .observe(test_controller(3, "NEWGUY"), Some("C".to_string()))
            .await;
        let callsigns: Vec<&str> = e.iter().map(|ev| ev.data.callsign.as_str()).collect();
        assert!(callsigns.contains(&"FIRST_ONLY"));
        assert!(callsigns.contains(&"OTHER"));
        assert!(callsigns.contains(&"NEWGUY"));
        assert_eq!(e.len(), 3);
    }

    #[tokio::test]
    async fn sweep_emits_disconnect_after_inactivity() {
        let clock = FakeClock::new(0);
        let tracker = ControllerTracker::new(Arc::clone(&clock));

        for (i, batch) in ["A", "B", "C"].iter().enumerate() {
            tracker
                .observe(test_controller(1, "TEST_CTR"), Some(batch.to_string()))
                .await;
            let _ = i;
        }
        assert!(tracker.batches_observed() > 2);

        clock.advance_ms(61_000);
        let events = tracker.sweep(60_000);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, ControllerEventKind::Disconnect);
    }

    #[tokio::test]
    async fn sweep_is_skipped_below_warmup_threshold() {
        let clock = FakeClock::new(0);
        let tracker = ControllerTracker::new(Arc::clone(&clock));
        tracker
            .observe(test_controller(1, "TEST_CTR"), Some("A".to_string()))
            .await;
        clock.advance_ms(120_000);
        assert!(tracker.sweep(60_000).is_empty());
    }
}
