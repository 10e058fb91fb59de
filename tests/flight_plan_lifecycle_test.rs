//! End-to-end exercise of the flight-plan tracker against the in-memory
//! fakes: file -> update -> airborne state_change -> TTL-driven cancel,
//! plus the departure-change supersession path.

use std::sync::Arc;

use atc_eventstream::bus::memory_bus::RecordingBus;
use atc_eventstream::clock::FakeClock;
use atc_eventstream::events::FlightPlanEventKind;
use atc_eventstream::flight_plan_tracker::identity;
use atc_eventstream::model::{FlightPlan, PilotOrPrefile, Position};
use atc_eventstream::ttl_store::memory_store::MemoryTtlStore;
use atc_eventstream::ttl_store::{self, TtlStore};
use atc_eventstream::FlightPlanTracker;

fn ifr_plan(departure: &str) -> FlightPlan {
    FlightPlan {
        flight_rules: "I".to_string(),
        aircraft: "B738".to_string(),
        aircraft_faa: "B738/L".to_string(),
        aircraft_short: "B738".to_string(),
        departure: departure.to_string(),
        arrival: "KJFK".to_string(),
        alternate: String::new(),
        cruise_tas: serde_json::json!(420),
        altitude: serde_json::json!("FL350"),
        deptime: serde_json::json!("1200"),
        enroute_time: serde_json::json!("0800"),
        fuel_time: serde_json::json!("1000"),
        remarks: String::new(),
        route: "DCT".to_string(),
        revision_id: serde_json::json!(1),
        assigned_transponder: "2000".to_string(),
    }
}

fn pilot_at(cid: i64, callsign: &str, departure: &str, groundspeed: f64) -> PilotOrPrefile {
    PilotOrPrefile::Pilot {
        cid,
        callsign: callsign.to_string(),
        flight_plan: ifr_plan(departure),
        position: Position {
            latitude: 51.47,
            longitude: -0.4543,
            altitude: 0,
            groundspeed,
            heading: 270.0,
        },
    }
}

fn prefile(cid: i64, callsign: &str, departure: &str) -> PilotOrPrefile {
    PilotOrPrefile::Prefile {
        cid,
        callsign: callsign.to_string(),
        flight_plan: ifr_plan(departure),
    }
}

#[tokio::test]
async fn files_then_transitions_airborne_on_groundspeed_increase() {
    let store = MemoryTtlStore::new();
    let bus = Arc::new(RecordingBus::new());
    let clock = FakeClock::new(0);
    let tracker = FlightPlanTracker::new(
        store.clone() as Arc<dyn TtlStore>,
        bus.clone() as Arc<dyn atc_eventstream::bus::EventPublisher>,
        clock.clone(),
    );

    // Prefile arrives first: no position, state stays filed.
    tracker.ingest(&prefile(1, "BAW1", "EGLL")).await.unwrap();
    let events = bus.drain_flight_plan_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, FlightPlanEventKind::File);

    // Pilot connects, slow on the ground: no transition out of filed yet
    // other than the one already implied by filing.
    clock.advance_ms(1_000);
    tracker.ingest(&pilot_at(1, "BAW1", "EGLL", 5.0)).await.unwrap();
    let events = bus.drain_flight_plan_events();
    // same plan fields, no update; filed -> departing is the proposed
    // transition for a slow groundspeed from filed.
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, FlightPlanEventKind::StateChange);
    assert_eq!(events[0].state.as_ref().unwrap().current, "departing");

    // Groundspeed climbs past the takeoff threshold: departing -> enroute.
    clock.advance_ms(60_000);
    tracker.ingest(&pilot_at(1, "BAW1", "EGLL", 180.0)).await.unwrap();
    let events = bus.drain_flight_plan_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, FlightPlanEventKind::StateChange);
    assert_eq!(events[0].state.as_ref().unwrap().previous, "departing");
    assert_eq!(events[0].state.as_ref().unwrap().current, "enroute");
}

#[tokio::test]
async fn plan_field_change_emits_update_independent_of_state() {
    let store = MemoryTtlStore::new();
    let bus = Arc::new(RecordingBus::new());
    let clock = FakeClock::new(0);
    let tracker = FlightPlanTracker::new(
        store.clone() as Arc<dyn TtlStore>,
        bus.clone() as Arc<dyn atc_eventstream::bus::EventPublisher>,
        clock.clone(),
    );

    tracker.ingest(&prefile(1, "BAW1", "EGLL")).await.unwrap();
    bus.drain_flight_plan_events();

    let mut changed = prefile(1, "BAW1", "EGLL");
    if let PilotOrPrefile::Prefile { flight_plan, .. } = &mut changed {
        flight_plan.route = "DCT BIG DCT".to_string();
    }
    tracker.ingest(&changed).await.unwrap();

    let events = bus.drain_flight_plan_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, FlightPlanEventKind::Update);
    assert_eq!(events[0].flight_plan.route, "DCT BIG DCT");
}

#[tokio::test]
async fn vfr_plans_are_dropped_before_ever_touching_the_store() {
    let store = MemoryTtlStore::new();
    let bus = Arc::new(RecordingBus::new());
    let clock = FakeClock::new(0);
    let tracker = FlightPlanTracker::new(
        store.clone() as Arc<dyn TtlStore>,
        bus.clone() as Arc<dyn atc_eventstream::bus::EventPublisher>,
        clock,
    );

    let mut vfr = prefile(1, "CESSNA1", "EGLL");
    if let PilotOrPrefile::Prefile { flight_plan, .. } = &mut vfr {
        flight_plan.flight_rules = "V".to_string();
    }
    tracker.ingest(&vfr).await.unwrap();

    assert!(bus.drain_flight_plan_events().is_empty());
    let base = identity::base_key(1, "CESSNA1");
    assert!(store.scan(&format!("{base}-")).await.unwrap().is_empty());
}

#[tokio::test]
async fn changing_departure_supersedes_the_previous_record() {
    let store = MemoryTtlStore::new();
    let bus = Arc::new(RecordingBus::new());
    let clock = FakeClock::new(0);
    let tracker = FlightPlanTracker::new(
        store.clone() as Arc<dyn TtlStore>,
        bus.clone() as Arc<dyn atc_eventstream::bus::EventPublisher>,
        clock,
    );

    tracker.ingest(&prefile(1, "BAW1", "EGLL")).await.unwrap();
    bus.drain_flight_plan_events();

    // Same identity, new departure airport: the EGLL record must be
    // expired and a fresh EGKK record filed in its place.
    tracker.ingest(&prefile(1, "BAW1", "EGKK")).await.unwrap();
    let events = bus.drain_flight_plan_events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event, FlightPlanEventKind::Expire);
    assert_eq!(events[0].flight_plan.departure, "EGLL");
    assert_eq!(events[1].event, FlightPlanEventKind::File);
    assert_eq!(events[1].flight_plan.departure, "EGKK");

    let base = identity::base_key(1, "BAW1");
    let remaining = store.scan(&format!("{base}-")).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].ends_with("EGKK"));
}

#[tokio::test]
async fn ttl_expiry_cancels_then_removes_the_record() {
    let store = MemoryTtlStore::new();
    let bus = Arc::new(RecordingBus::new());
    let clock = FakeClock::new(0);
    let tracker = FlightPlanTracker::new(
        store.clone() as Arc<dyn TtlStore>,
        bus.clone() as Arc<dyn atc_eventstream::bus::EventPublisher>,
        clock,
    );

    tracker.ingest(&prefile(1, "BAW1", "EGLL")).await.unwrap();
    bus.drain_flight_plan_events();

    let key = identity::full_key(1, "BAW1", "EGLL");
    tracker.on_expire(&ttl_store::sentinel_key(&key)).await.unwrap();

    let events = bus.drain_flight_plan_events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event, FlightPlanEventKind::StateChange);
    assert_eq!(events[0].state.as_ref().unwrap().current, "cancelled");
    assert_eq!(events[1].event, FlightPlanEventKind::Expire);
    assert!(store.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn orphan_expiry_after_manual_deletion_is_a_silent_no_op() {
    let store = MemoryTtlStore::new();
    let bus = Arc::new(RecordingBus::new());
    let clock = FakeClock::new(0);
    let tracker = FlightPlanTracker::new(
        store.clone() as Arc<dyn TtlStore>,
        bus.clone() as Arc<dyn atc_eventstream::bus::EventPublisher>,
        clock,
    );

    tracker.ingest(&prefile(1, "BAW1", "EGLL")).await.unwrap();
    bus.drain_flight_plan_events();

    let key = identity::full_key(1, "BAW1", "EGLL");
    store.delete(&key).await.unwrap();

    tracker.on_expire(&ttl_store::sentinel_key(&key)).await.unwrap();
    assert!(bus.drain_flight_plan_events().is_empty());
}
