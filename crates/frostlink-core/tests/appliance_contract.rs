//! Cross-module checks of the appliance's observable contract: the frame
//! stream a real provisioning run produces, and the liveness arithmetic
//! over a realistic message cadence.

use frostlink_core::{
    parse_flag, parse_notification, parse_temperature, Fragment, LivenessWindow, Tick,
};

#[test]
fn test_documented_provisioning_stream_parses_in_order() {
    // The exact sequence a healthy appliance emits after credentials land.
    let stream: &[&[u8]] = &[
        b"IP:192.168.0.47",
        b"PORT:1883",
        b"USER:Mariano_Sanchez",
        b"PASSWORD:0001",
        b"CLIENT_ID:TK-2025-MA00-0001",
    ];

    let fragments: Vec<Fragment> = stream
        .iter()
        .map(|frame| parse_notification(frame).unwrap())
        .collect();

    assert_eq!(fragments[0], Fragment::Ip("192.168.0.47".to_string()));
    assert_eq!(fragments[4], Fragment::ClientId("TK-2025-MA00-0001".to_string()));
}

#[test]
fn test_liveness_survives_a_publishing_cadence_slower_than_the_window() {
    // The firmware publishes every ~15 s; the window is 20 ticks of 1 s, so
    // an alive appliance never expires.
    let mut window = LivenessWindow::new(20);
    window.reset();

    for _cycle in 0..4 {
        for _ in 0..15 {
            assert_ne!(window.tick(), Tick::Expired);
        }
        window.reset();
    }
    assert!(window.is_active());
}

#[test]
fn test_broker_payloads_decode_like_the_firmware_emits_them() {
    // Temperature arrives as plain decimal text, status as "1"/"0".
    assert_eq!(parse_temperature(" 4.5 "), Some(4.5));
    assert_eq!(parse_temperature("-18"), Some(-18.0));
    assert!(parse_flag("1"));
    assert!(!parse_flag("0"));
    assert!(!parse_flag("true"));
}
