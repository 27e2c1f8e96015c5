use amphora::persistence::{EnergyCounters, PersistenceManager, PersistentState};

#[test]
fn missing_file_keeps_zeroed_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let mut manager = PersistenceManager::new(&path.to_string_lossy());
    manager.load().unwrap();
    assert_eq!(manager.state().lifetime_total_kwh, 0.0);
}

#[test]
fn save_then_load_round_trips_the_counters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let path_str = path.to_string_lossy().into_owned();

    let mut manager = PersistenceManager::new(&path_str);
    manager.set_state(PersistentState {
        lifetime_grid_kwh: 12.5,
        lifetime_solar_kwh: 7.25,
        lifetime_total_kwh: 19.75,
    });
    manager.save().unwrap();

    let mut reloaded = PersistenceManager::new(&path_str);
    reloaded.load().unwrap();
    assert_eq!(reloaded.state().lifetime_grid_kwh, 12.5);
    assert_eq!(reloaded.state().lifetime_solar_kwh, 7.25);
    assert_eq!(reloaded.state().lifetime_total_kwh, 19.75);
}

#[test]
fn restore_seeds_lifetime_but_not_session() {
    let counters = EnergyCounters::restore(&PersistentState {
        lifetime_grid_kwh: 3.0,
        lifetime_solar_kwh: 1.0,
        lifetime_total_kwh: 4.0,
    });
    assert_eq!(counters.lifetime_total_kwh, 4.0);
    assert_eq!(counters.session_total_kwh, 0.0);
}

#[test]
fn session_reset_leaves_lifetime_untouched() {
    let mut counters = EnergyCounters::default();
    counters.apply(false, 0.4, 0.1);
    counters.apply(false, 0.4, 0.1);
    assert!((counters.session_total_kwh - 1.0).abs() < 1e-9);

    // New plug-in: session restarts with this tick's increment
    counters.apply(true, 0.2, 0.0);
    assert!((counters.session_grid_kwh - 0.2).abs() < 1e-9);
    assert!((counters.session_solar_kwh - 0.0).abs() < 1e-9);
    assert!((counters.lifetime_grid_kwh - 1.0).abs() < 1e-9);
    assert!((counters.lifetime_total_kwh - 1.2).abs() < 1e-9);
}
