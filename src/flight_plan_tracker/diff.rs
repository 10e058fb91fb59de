//! Plan-field diffing: fields are compared by stringified
//! equality so upstream's inconsistent number-vs-string encoding of fields
//! like `cruise_tas` never produces a spurious update.

use crate::model::FlightPlan;

fn stringify_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// True if any of the 16 plan fields differ between `previous` and
/// `incoming`, string-equality after stringifying both sides.
/// A `previous` of `None` always compares as different.
pub fn plans_differ(previous: Option<&FlightPlan>, incoming: &FlightPlan) -> bool {
    let Some(previous) = previous else {
        return true;
    };

    previous.flight_rules != incoming.flight_rules
        || previous.aircraft != incoming.aircraft
        || previous.aircraft_faa != incoming.aircraft_faa
        || previous.aircraft_short != incoming.aircraft_short
        || previous.departure != incoming.departure
        || previous.arrival != incoming.arrival
        || previous.alternate != incoming.alternate
        || stringify_value(&previous.cruise_tas) != stringify_value(&incoming.cruise_tas)
        || stringify_value(&previous.altitude) != stringify_value(&incoming.altitude)
        || stringify_value(&previous.deptime) != stringify_value(&incoming.deptime)
        || stringify_value(&previous.enroute_time) != stringify_value(&incoming.enroute_time)
        || stringify_value(&previous.fuel_time) != stringify_value(&incoming.fuel_time)
        || previous.remarks != incoming.remarks
        || previous.route != incoming.route
        || stringify_value(&previous.revision_id) != stringify_value(&incoming.revision_id)
        || previous.assigned_transponder != incoming.assigned_transponder
}
