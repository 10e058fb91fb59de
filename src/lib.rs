//! atc-eventstream - diffs periodic air-traffic snapshots against cached
//! state and emits lifecycle events (controller connect/disconnect, flight
//! plan file/update/expire/state_change) onto an outbound event bus.

pub mod bus;
pub mod clock;
pub mod config;
pub mod controller_tracker;
pub mod events;
pub mod flight_plan_tracker;
pub mod log_format;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod telemetry;
pub mod ttl_store;

pub use clock::{Clock, SystemClock};
pub use controller_tracker::ControllerTracker;
pub use flight_plan_tracker::FlightPlanTracker;
