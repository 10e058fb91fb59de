//! Wire-level snapshot types. Fields beyond the ones the engine actually
//! diffs or admits on are kept as opaque pass-through, since dynamic
//! message payloads arrive untyped.

use serde::{Deserialize, Serialize};

/// A controller snapshot, as carried in `raw.controllers` messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    pub cid: i64,
    pub name: String,
    pub callsign: String,
    pub frequency: String,
    pub facility: i32,
    pub rating: i32,
    pub server: String,
    pub visual_range: i32,
    #[serde(default)]
    pub text_atis: Vec<String>,
    pub last_updated: String,
    pub logon_time: String,
}

/// The 16-field flight plan body. All fields are opaque for
/// diffing purposes - compared by stringified equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPlan {
    pub flight_rules: String,
    pub aircraft: String,
    pub aircraft_faa: String,
    pub aircraft_short: String,
    pub departure: String,
    pub arrival: String,
    pub alternate: String,
    pub cruise_tas: serde_json::Value,
    pub altitude: serde_json::Value,
    pub deptime: serde_json::Value,
    pub enroute_time: serde_json::Value,
    pub fuel_time: serde_json::Value,
    pub remarks: String,
    pub route: String,
    pub revision_id: serde_json::Value,
    pub assigned_transponder: String,
}

/// Position/velocity carried by `Pilot` records; absent for `Prefile`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: i64,
    pub groundspeed: f64,
    pub heading: f64,
}

/// Wire shape of one `raw.flight_plans` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PilotRecord {
    pub cid: i64,
    pub callsign: String,
    pub flight_plan: FlightPlan,
    #[serde(flatten)]
    pub position: Position,
}

/// Wire shape of one `raw.prefiles` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefileRecord {
    pub cid: i64,
    pub callsign: String,
    pub flight_plan: FlightPlan,
}

/// Either a `Pilot` (connected, carries position) or a `Prefile` (filed
/// only, no position). `raw.flight_plans` and `raw.prefiles`
/// are two distinct routes on the wire, not a tagged union;
/// `PilotRecord`/`PrefileRecord` carry the actual wire shape and convert
/// into this type once the route they arrived on is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PilotOrPrefile {
    Pilot {
        cid: i64,
        callsign: String,
        flight_plan: FlightPlan,
        #[serde(flatten)]
        position: Position,
    },
    Prefile {
        cid: i64,
        callsign: String,
        flight_plan: FlightPlan,
    },
}

impl From<PilotRecord> for PilotOrPrefile {
    fn from(record: PilotRecord) -> Self {
        PilotOrPrefile::Pilot {
            cid: record.cid,
            callsign: record.callsign,
            flight_plan: record.flight_plan,
            position: record.position,
        }
    }
}

impl From<PrefileRecord> for PilotOrPrefile {
    fn from(record: PrefileRecord) -> Self {
        PilotOrPrefile::Prefile {
            cid: record.cid,
            callsign: record.callsign,
            flight_plan: record.flight_plan,
        }
    }
}

impl PilotOrPrefile {
    pub fn cid(&self) -> i64 {
        match self {
            PilotOrPrefile::Pilot { cid, .. } | PilotOrPrefile::Prefile { cid, .. } => *cid,
        }
    }

    pub fn callsign(&self) -> &str {
        match self {
            PilotOrPrefile::Pilot { callsign, .. } | PilotOrPrefile::Prefile { callsign, .. } => {
                callsign
            }
        }
    }

    pub fn flight_plan(&self) -> &FlightPlan {
        match self {
            PilotOrPrefile::Pilot { flight_plan, .. }
            | PilotOrPrefile::Prefile { flight_plan, .. } => flight_plan,
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            PilotOrPrefile::Pilot { position, .. } => Some(*position),
            PilotOrPrefile::Prefile { .. } => None,
        }
    }
}

/// Envelope wrapping every inbound snapshot message. The wire field is
/// `batchId` (camelCase) - deliberately distinct from the snake_case
/// fields on outbound event envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inbound<T> {
    pub data: T,
    #[serde(default, rename = "batchId")]
    pub batch_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_envelope_deserializes_camel_case_batch_id() {
        let parsed: Inbound<Controller> = serde_json::from_str(
            r#"{"data":{"cid":1,"name":"Test","callsign":"EGLL_TWR","frequency":"199.998","facility":5,"rating":3,"server":"EUROPE","visual_range":100,"last_updated":"2026-01-01T00:00:00Z","logon_time":"2026-01-01T00:00:00Z"},"batchId":"A"}"#,
        )
        .unwrap();
        assert_eq!(parsed.batch_id, Some("A".to_string()));
    }

    #[test]
    fn inbound_envelope_tolerates_missing_batch_id() {
        let parsed: Inbound<Controller> = serde_json::from_str(
            r#"{"data":{"cid":1,"name":"Test","callsign":"EGLL_TWR","frequency":"199.998","facility":5,"rating":3,"server":"EUROPE","visual_range":100,"last_updated":"2026-01-01T00:00:00Z","logon_time":"2026-01-01T00:00:00Z"}}"#,
        )
        .unwrap();
        assert_eq!(parsed.batch_id, None);
    }
}
