//! Shared test fixtures for cross-module scenario tests, grounded on the
//! teacher's `tests/common/mod.rs` fixture-builder pattern, reworked from
//! device construction to V2G scenario construction.

use chrono::{DateTime, TimeZone, Utc};

use v2g_sim::config::{GridConfig, PathsConfig, ScenarioConfig, SimulationConfig, StationConfig, UserConfig};
use v2g_sim::grid_load::GridLoadTable;
use v2g_sim::prefs::PreferenceTable;
use v2g_sim::types::UserPreference;

/// Fixed simulation start used by every scenario test (2026-03-01 00:00 UTC).
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
}

/// A default, generous preference: 80% minimum SoC, willing to pay up to 0.5
/// per kWh, discharge threshold 0.5.
pub fn default_preference() -> UserPreference {
    UserPreference {
        minimum_soc: 0.8,
        max_cost_for_charging: 0.5,
        discharge_price_threshold: 0.5,
        maximum_soc: None,
    }
}

pub fn preferences(entries: &[(u64, UserPreference)]) -> PreferenceTable {
    let mut table = PreferenceTable::new();
    for (id, pref) in entries {
        table.insert(*id, *pref);
    }
    table
}

pub fn station(id: &str, max_power: f64, charging_cost: f64, compensation_amount: f64) -> StationConfig {
    StationConfig {
        station_id: id.to_string(),
        max_power,
        charging_cost,
        compensation_amount,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn user(
    user_id: u64,
    name: &str,
    station_id: &str,
    initial_state_of_charge: f64,
    car_battery_capacity: f64,
    car_max_power: f64,
    arrival_hour: u32,
    target_hour: u32,
) -> UserConfig {
    UserConfig {
        user_id,
        user_name: name.to_string(),
        station_id: station_id.to_string(),
        initial_state_of_charge,
        car_battery_capacity,
        car_model: "Generic EV".to_string(),
        car_max_power,
        arrival_hour,
        target_hour,
    }
}

/// Assembles a one-off scenario from explicit stations/users, epochs starting
/// at 09:00, grid capacity `total_max_power`.
pub fn scenario(
    num_epochs: u32,
    total_max_power: f64,
    stations: Vec<StationConfig>,
    users: Vec<UserConfig>,
) -> ScenarioConfig {
    ScenarioConfig {
        simulation: SimulationConfig {
            simulation_id: "v2g-sim-test".to_string(),
            controller_process_id: "controller-test".to_string(),
            num_epochs,
            epoch_length_seconds: 3600,
            start_hour: 9,
        },
        grid: GridConfig {
            grid_id: "G1".to_string(),
            total_max_power,
        },
        stations,
        users,
        paths: PathsConfig::default(),
    }
}

pub fn empty_grid_load() -> GridLoadTable {
    GridLoadTable::empty()
}

/// A grid-load table with a single hour marked under load, built by writing
/// and loading a real temp CSV so the fixture exercises the same
/// `load_grid_load_table` path the demo binary uses.
pub fn grid_load_with_hour_on_load(hour: u32) -> GridLoadTable {
    let path = std::env::temp_dir().join(format!(
        "v2g-sim-test-gridload-common-{hour}-{}.csv",
        std::process::id()
    ));
    std::fs::write(&path, format!("time,grid_on_load\n{hour:02}:00,1\n")).unwrap();
    let table = v2g_sim::grid_load::load_grid_load_table(&path).unwrap();
    std::fs::remove_file(&path).ok();
    table
}
