//! Flight-plan identity keys: `baseKey = cid + "-" + callsign`,
//! full key `baseKey + "-" + departure`.

/// `cid-callsign`, shared by every flight-plan record for one pilot
/// regardless of departure airport.
pub fn base_key(cid: i64, callsign: &str) -> String {
    format!("{cid}-{callsign}")
}

/// `cid-callsign-departure`, the TTL store data key for one flight-plan
/// record.
pub fn full_key(cid: i64, callsign: &str, departure: &str) -> String {
    format!("{}-{}", base_key(cid, callsign), departure)
}

/// Recover the departure airport embedded in a full key, given its base
/// key. The engine parses `departure` back out of an expired key but
/// doesn't use it for anything; kept here for symmetry with `full_key`,
/// not because any caller needs the value.
#[allow(dead_code)]
pub fn departure_from_full_key<'a>(full_key: &'a str, base_key: &str) -> Option<&'a str> {
    full_key
        .strip_prefix(base_key)
        .and_then(|rest| rest.strip_prefix('-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_compose_as_specified() {
        assert_eq!(base_key(1, "BAW1"), "1-BAW1");
        assert_eq!(full_key(1, "BAW1", "EGLL"), "1-BAW1-EGLL");
    }

    #[test]
    fn departure_recoverable_from_full_key() {
        let base = base_key(1, "BAW1");
        let full = full_key(1, "BAW1", "EGLL");
        assert_eq!(departure_from_full_key(&full, &base), Some("EGLL"));
    }
}
