use amphora::controls::{ChargingControls, ChargingMode, MODE_MAX_AMPS};
use chrono::NaiveTime;

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

// 230 V three-phase
const PPA: f64 = 690.0;

#[test]
fn off_mode_requests_no_session() {
    let controls = ChargingControls::new();
    let target = controls.resolve_target(ChargingMode::Off, false, 0.0, 0.0, PPA, false);
    assert_eq!(target.amps, 0);
    assert!(!target.session_active);
}

#[test]
fn soc_stop_overrides_every_mode() {
    let controls = ChargingControls::new();
    for mode in [
        ChargingMode::PvOnly,
        ChargingMode::MinPv,
        ChargingMode::Dynamic,
        ChargingMode::MaxPower,
        ChargingMode::Schedule,
    ] {
        let target = controls.resolve_target(mode, true, 4000.0, 0.0, PPA, true);
        assert_eq!(target.amps, 0, "mode {} should stop", mode);
        assert!(!target.session_active);
    }
}

#[test]
fn max_power_and_dynamic_request_full_rate() {
    let controls = ChargingControls::new();
    for mode in [ChargingMode::MaxPower, ChargingMode::Dynamic] {
        let target = controls.resolve_target(mode, false, 0.0, 5000.0, PPA, false);
        assert_eq!(target.amps, MODE_MAX_AMPS);
        assert!(target.session_active);
    }
}

#[test]
fn schedule_requests_full_rate_only_inside_window() {
    let controls = ChargingControls::new();

    let inside = controls.resolve_target(ChargingMode::Schedule, false, 0.0, 0.0, PPA, true);
    assert_eq!(inside.amps, MODE_MAX_AMPS);
    assert!(inside.session_active);

    // Outside the window the session stays armed at 0 A
    let outside = controls.resolve_target(ChargingMode::Schedule, false, 0.0, 0.0, PPA, false);
    assert_eq!(outside.amps, 0);
    assert!(outside.session_active);
}

#[test]
fn pv_only_converts_surplus_to_amps() {
    let controls = ChargingControls::new();
    // Charger draws 2760 W while 1380 W still flows to the grid: 4140 W of
    // surplus, exactly 6 A at 230 V three-phase.
    let target = controls.resolve_target(ChargingMode::PvOnly, false, 2760.0, -1380.0, PPA, false);
    assert_eq!(target.amps, 6);
    assert!(target.session_active);
}

#[test]
fn pv_only_goes_negative_when_importing() {
    let controls = ChargingControls::new();
    let target = controls.resolve_target(ChargingMode::PvOnly, false, 0.0, 2000.0, PPA, false);
    assert!(target.amps < 0);
    assert!(target.session_active);
}

#[test]
fn min_pv_floors_at_minimum_current() {
    let controls = ChargingControls::new();
    let target = controls.resolve_target(ChargingMode::MinPv, false, 0.0, 2000.0, PPA, false);
    assert_eq!(target.amps, 6);

    // With real surplus it tracks PV Only
    let target = controls.resolve_target(ChargingMode::MinPv, false, 2760.0, -4140.0, PPA, false);
    assert_eq!(target.amps, 10);
}

#[test]
fn schedule_window_same_day() {
    assert!(ChargingControls::is_schedule_active(t(8, 0), t(16, 0), t(8, 0)));
    assert!(ChargingControls::is_schedule_active(t(8, 0), t(16, 0), t(12, 0)));
    // End is exclusive
    assert!(!ChargingControls::is_schedule_active(t(8, 0), t(16, 0), t(16, 0)));
    assert!(!ChargingControls::is_schedule_active(t(8, 0), t(16, 0), t(7, 59)));
}

#[test]
fn schedule_window_wraps_past_midnight() {
    let start = t(22, 0);
    let end = t(6, 0);
    assert!(ChargingControls::is_schedule_active(start, end, t(23, 0)));
    assert!(ChargingControls::is_schedule_active(start, end, t(3, 0)));
    assert!(ChargingControls::is_schedule_active(start, end, t(22, 0)));
    assert!(!ChargingControls::is_schedule_active(start, end, t(6, 0)));
    assert!(!ChargingControls::is_schedule_active(start, end, t(12, 0)));
}

#[test]
fn mode_labels_match_display_names() {
    assert_eq!(ChargingMode::PvOnly.to_string(), "PV Only");
    assert_eq!(ChargingMode::MinPv.to_string(), "Min + PV");
    assert_eq!(ChargingMode::MaxPower.to_string(), "Max Power");
}
