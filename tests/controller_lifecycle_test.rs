//! Exercises the controller tracker through the inbound pipeline wiring
//! (`ChannelConsumer` + `run_controller_ingest`), not just the tracker
//! directly, so the warm-up gating is verified end to end.

use std::sync::Arc;

use atc_eventstream::bus::memory_bus::{ChannelConsumer, RecordingBus};
use atc_eventstream::clock::FakeClock;
use atc_eventstream::events::ControllerEventKind;
use atc_eventstream::model::{Controller, Inbound};
use atc_eventstream::pipeline;
use atc_eventstream::ControllerTracker;

fn controller(cid: i64, callsign: &str) -> Controller {
    Controller {
        cid,
        name: "Test Controller".to_string(),
        callsign: callsign.to_string(),
        frequency: "199.998".to_string(),
        facility: 5,
        rating: 3,
        server: "EUROPE".to_string(),
        visual_range: 100,
        text_atis: vec!["no text atis".to_string()],
        last_updated: "2026-01-01T00:00:00Z".to_string(),
        logon_time: "2026-01-01T00:00:00Z".to_string(),
    }
}

#[tokio::test]
async fn ingest_suppresses_connects_until_warmup_then_emits_them() {
    let clock = FakeClock::new(0);
    let tracker = ControllerTracker::new(clock);
    let bus = Arc::new(RecordingBus::new());
    let (tx, consumer) = ChannelConsumer::<Controller>::new();

    for batch in ["A", "B"] {
        tx.send(Inbound {
            data: controller(1, "EGLL_TWR"),
            batch_id: Some(batch.to_string()),
        })
        .unwrap();
    }

    pipeline::run_controller_ingest(
        consumer,
        tracker.clone(),
        bus.clone() as Arc<dyn atc_eventstream::bus::EventPublisher>,
    )
    .await
    .unwrap();

    assert!(
        bus.drain_controller_events().is_empty(),
        "still inside warm-up, no connect should have been published"
    );

    let (tx, consumer) = ChannelConsumer::<Controller>::new();
    tx.send(Inbound {
        data: controller(2, "EGKK_APP"),
        batch_id: Some("C".to_string()),
    })
    .unwrap();

    pipeline::run_controller_ingest(
        consumer,
        tracker.clone(),
        bus.clone() as Arc<dyn atc_eventstream::bus::EventPublisher>,
    )
    .await
    .unwrap();

    // Crossing the warm-up threshold announces every identity still cached
    // and unannounced, not just the one that happened to arrive in this
    // batch: EGLL_TWR was cached back in batch A and never re-sent, so it
    // connects here alongside the newly-arrived EGKK_APP.
    let events = bus.drain_controller_events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.event == ControllerEventKind::Connect));
    let callsigns: Vec<&str> = events.iter().map(|e| e.data.callsign.as_str()).collect();
    assert!(callsigns.contains(&"EGLL_TWR"));
    assert!(callsigns.contains(&"EGKK_APP"));
}

#[tokio::test]
async fn sweep_publishes_disconnect_once_warmed_up_and_inactive() {
    let clock = FakeClock::new(0);
    let tracker = ControllerTracker::new(clock.clone());

    for batch in ["A", "B", "C"] {
        tracker
            .observe(controller(1, "EGLL_TWR"), Some(batch.to_string()))
            .await;
    }
    assert!(tracker.batches_observed() > 2);

    clock.advance_ms(120_000);
    let events = tracker.sweep(60_000);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, ControllerEventKind::Disconnect);
    assert_eq!(events[0].data.callsign, "EGLL_TWR");
}

#[tokio::test]
async fn a_controller_still_being_seen_is_never_swept() {
    let clock = FakeClock::new(0);
    let tracker = ControllerTracker::new(clock.clone());

    for batch in ["A", "B", "C"] {
        tracker
            .observe(controller(1, "EGLL_TWR"), Some(batch.to_string()))
            .await;
    }

    clock.advance_ms(30_000);
    tracker
        .observe(controller(1, "EGLL_TWR"), Some("D".to_string()))
        .await;

    clock.advance_ms(40_000);
    assert!(
        tracker.sweep(60_000).is_empty(),
        "last_seen was refreshed 40s ago, well under the 60s timeout"
    );
}
