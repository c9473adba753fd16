//! Broker payload decoding.
//!
//! The appliance publishes plain-text payloads: the telemetry topic carries a
//! decimal reading, the status topic a boolean flag encoded as the literal
//! `"1"`.  Both decoders are total — garbage input yields `None`/`false`,
//! never a panic — because receiving *any* payload on these topics is itself
//! evidence of liveness and must not be lost to a parse failure.

/// Parses a temperature payload, e.g. `"5"` or `"-3.5"`.
///
/// Returns `None` for non-numeric text; the caller keeps its previous
/// reading in that case.
pub fn parse_temperature(payload: &str) -> Option<f64> {
    let value: f64 = payload.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Parses a boolean flag payload: the literal `"1"` is true, anything else
/// (including whitespace-padded `"1 "`) is false.
pub fn parse_flag(payload: &str) -> bool {
    payload == "1"
}

/// Encodes a boolean command for the control topic.
pub fn encode_flag(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        "0"
    }
}
