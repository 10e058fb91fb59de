//! Airborne state machine: advances a flight plan through
//! filed -> departing -> enroute -> approaching -> arrived using
//! ground-speed telemetry, plus the terminal `cancelled` state reached only
//! via TTL expiry.

use serde::{Deserialize, Serialize};

/// Ground-speed / altitude thresholds for the state machine. Altitude
/// thresholds are declared but deliberately not consulted by
/// `propose_transition` - only ground speed drives transitions. Kept as
/// constants rather than dropped, since no new altitude-driven transitions
/// should be invented here.
pub const TAXI_GROUND_SPEED_KT: f64 = 30.0;
pub const TAKEOFF_GROUND_SPEED_KT: f64 = 60.0;
pub const LANDING_GROUND_SPEED_KT: f64 = 60.0;
#[allow(dead_code)]
pub const GROUND_ALTITUDE_FT: i64 = 100;
#[allow(dead_code)]
pub const CLIMB_DESCEND_ALTITUDE_DELTA_FT: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightState {
    Filed,
    Departing,
    Enroute,
    Approaching,
    Arrived,
    Cancelled,
}

impl FlightState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightState::Filed => "filed",
            FlightState::Departing => "departing",
            FlightState::Enroute => "enroute",
            FlightState::Approaching => "approaching",
            FlightState::Arrived => "arrived",
            FlightState::Cancelled => "cancelled",
        }
    }

    /// Whether no further transitions are ever permitted from this state
    ///.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlightState::Arrived | FlightState::Cancelled)
    }
}

/// A transition proposed by the state machine, before allowed-set
/// validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposedTransition {
    pub to: FlightState,
    pub reason: &'static str,
}

/// Evaluate the transition table in order, returning the first match.
pub fn propose_transition(current: FlightState, groundspeed_kt: f64) -> Option<ProposedTransition> {
    match current {
        FlightState::Filed => {
            if groundspeed_kt > TAKEOFF_GROUND_SPEED_KT {
                Some(ProposedTransition {
                    to: FlightState::Enroute,
                    reason: "already_airborne",
                })
            } else if groundspeed_kt < TAXI_GROUND_SPEED_KT {
                Some(ProposedTransition {
                    to: FlightState::Departing,
                    reason: "pilot_connected_at_gate",
                })
            } else {
                None
            }
        }
        FlightState::Departing => {
            if groundspeed_kt > TAKEOFF_GROUND_SPEED_KT {
                Some(ProposedTransition {
                    to: FlightState::Enroute,
                    reason: "ground_speed_above_takeoff_threshold",
                })
            } else {
                None
            }
        }
        FlightState::Enroute => {
            if groundspeed_kt < TAXI_GROUND_SPEED_KT {
                Some(ProposedTransition {
                    to: FlightState::Arrived,
                    reason: "already_landed",
                })
            } else if groundspeed_kt < LANDING_GROUND_SPEED_KT {
                Some(ProposedTransition {
                    to: FlightState::Approaching,
                    reason: "slowing_for_approach",
                })
            } else {
                None
            }
        }
        FlightState::Approaching => {
            if groundspeed_kt < TAXI_GROUND_SPEED_KT {
                Some(ProposedTransition {
                    to: FlightState::Arrived,
                    reason: "landed_and_taxiing",
                })
            } else {
                None
            }
        }
        FlightState::Arrived | FlightState::Cancelled => None,
    }
}

/// Is `to` a permitted destination from `from`?
/// A transition the state machine proposes but that isn't in this set is
/// dropped silently.
pub fn is_allowed(from: FlightState, to: FlightState) -> bool {
    matches!(
        (from, to),
        (FlightState::Filed, FlightState::Departing)
            | (FlightState::Filed, FlightState::Enroute)
            | (FlightState::Filed, FlightState::Cancelled)
            | (FlightState::Departing, FlightState::Enroute)
            | (FlightState::Departing, FlightState::Cancelled)
            | (FlightState::Enroute, FlightState::Approaching)
            | (FlightState::Enroute, FlightState::Arrived)
            | (FlightState::Enroute, FlightState::Cancelled)
            | (FlightState::Approaching, FlightState::Arrived)
            | (FlightState::Approaching, FlightState::Cancelled)
    )
}
