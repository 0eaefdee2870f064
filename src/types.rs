//! Core data model (`SPEC_FULL.md` §3), grounded on the field sets of
//! `examples/original_source/v2g_controller_component/{user_data,
//! station_data, power_info}.py`, translated into owned Rust structs instead
//! of Python dataclasses.

use chrono::{DateTime, Utc};

pub const MAX_STATE_OF_CHARGE: f64 = 100.0;
pub const DEFAULT_TARGET_STATE_OF_CHARGE: f64 = 50.0;

/// A discrete simulation interval `[start, end]`, the unit the Controller and
/// every collaborator reason about (glossary: Epoch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochWindow {
    pub number: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EpochWindow {
    pub fn new(number: u32, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "epoch start must not be after epoch end");
        Self { number, start, end }
    }

    /// Epoch length in seconds; allocation treats a non-positive value as a
    /// degenerate epoch where every allocation is zero (`SPEC_FULL.md` §4.2).
    pub fn duration_seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    /// The UTC hour-of-day the epoch starts in, used as the `grid_load_daily`
    /// lookup key (`SPEC_FULL.md` §4.3).
    pub fn start_hour(&self) -> u32 {
        use chrono::Timelike;
        self.start.hour()
    }

    /// Whether this epoch's window is fully contained in `[arrival, target]`
    /// — the "connected user" containment test, non-strict on both bounds
    /// per the frozen Open Question in `SPEC_FULL.md` §9.
    pub fn contained_in(&self, arrival: DateTime<Utc>, target: DateTime<Utc>) -> bool {
        self.start >= arrival && self.end <= target
    }
}

/// One EV's persistent state (`SPEC_FULL.md` §3: "UserData"). Created on
/// first `CarMetaData`, mutated by `UserState`/`CarState` and by the
/// Controller's per-epoch target/SoC recomputation, and lives for the whole
/// simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub user_id: u64,
    pub user_name: String,
    pub station_id: String,
    pub state_of_charge: f64,
    pub car_battery_capacity: f64,
    pub car_model: String,
    pub car_max_power: f64,
    pub target_state_of_charge: f64,
    pub required_energy: f64,
    pub arrival_time: DateTime<Utc>,
    pub target_time: DateTime<Utc>,
    /// Epoch-scoped: reset to `false` at the start of every epoch, then
    /// re-evaluated (`SPEC_FULL.md` §4.3, DESIGN.md Open Question 5).
    pub discharge: bool,
}

impl UserRecord {
    pub fn clamp_state_of_charge(&mut self) {
        self.state_of_charge = self.state_of_charge.clamp(0.0, MAX_STATE_OF_CHARGE);
    }

    pub fn recompute_required_energy(&mut self) {
        self.required_energy = self.car_battery_capacity
            * (self.target_state_of_charge - self.state_of_charge).max(0.0)
            / 100.0;
    }
}

/// Rebuilt every epoch from `StationState` messages (`SPEC_FULL.md` §3).
#[derive(Debug, Clone, PartialEq)]
pub struct StationData {
    pub station_id: String,
    pub max_power: f64,
    pub charging_cost: f64,
    pub compensation_amount: f64,
}

/// Static per-user configuration loaded from `v2g_user_preferences.csv`
/// (`SPEC_FULL.md` §6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserPreference {
    pub minimum_soc: f64,
    pub max_cost_for_charging: f64,
    pub discharge_price_threshold: f64,
    pub maximum_soc: Option<f64>,
}

/// Replaced each epoch; `max_power` is latched from the first `GridState`
/// ever received (`SPEC_FULL.md` §3).
#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    pub grid_id: String,
    pub max_power: f64,
    pub current_power: f64,
}

/// A transient per-allocation-slot record, discarded after the
/// `PowerRequirement` burst is published (`SPEC_FULL.md` §3).
#[derive(Debug, Clone, PartialEq)]
pub struct PowerInfo {
    /// `0` means "vacant slot": no connected user at this station.
    pub user_id: u64,
    pub station_id: String,
    pub station_max_power: f64,
    pub car_max_power: f64,
    pub state_of_charge: f64,
    pub target_state_of_charge: f64,
    pub required_energy: f64,
    pub target_time: Option<DateTime<Utc>>,
}

impl PowerInfo {
    pub fn vacant(station_id: impl Into<String>, station_max_power: f64) -> Self {
        Self {
            user_id: 0,
            station_id: station_id.into(),
            station_max_power,
            car_max_power: 0.0,
            state_of_charge: 0.0,
            target_state_of_charge: 0.0,
            required_energy: 0.0,
            target_time: None,
        }
    }

    pub fn is_vacant(&self) -> bool {
        self.user_id == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, min, 0).unwrap()
    }

    #[test]
    fn contained_in_is_non_strict_on_both_bounds() {
        let epoch = EpochWindow::new(1, t(9, 0), t(10, 0));
        assert!(epoch.contained_in(t(9, 0), t(10, 0)));
        assert!(epoch.contained_in(t(8, 0), t(11, 0)));
        assert!(!epoch.contained_in(t(9, 30), t(11, 0)));
        assert!(!epoch.contained_in(t(8, 0), t(9, 30)));
    }

    #[test]
    fn duration_seconds_matches_window_length() {
        let epoch = EpochWindow::new(1, t(9, 0), t(10, 0));
        assert_eq!(epoch.duration_seconds(), 3600);
    }

    #[test]
    fn recompute_required_energy_matches_formula() {
        let mut user = UserRecord {
            user_id: 1,
            user_name: "A".into(),
            station_id: "S1".into(),
            state_of_charge: 20.0,
            car_battery_capacity: 40.0,
            car_model: "Model".into(),
            car_max_power: 22.0,
            target_state_of_charge: 80.0,
            required_energy: 0.0,
            arrival_time: t(8, 0),
            target_time: t(18, 0),
            discharge: false,
        };
        user.recompute_required_energy();
        assert!((user.required_energy - 24.0).abs() < 1e-9);
    }

    #[test]
    fn clamp_state_of_charge_bounds_both_sides() {
        let mut user = UserRecord {
            user_id: 1,
            user_name: "A".into(),
            station_id: "S1".into(),
            state_of_charge: 140.0,
            car_battery_capacity: 40.0,
            car_model: "Model".into(),
            car_max_power: 22.0,
            target_state_of_charge: 80.0,
            required_energy: 0.0,
            arrival_time: t(8, 0),
            target_time: t(18, 0),
            discharge: false,
        };
        user.clamp_state_of_charge();
        assert_eq!(user.state_of_charge, 100.0);

        user.state_of_charge = -10.0;
        user.clamp_state_of_charge();
        assert_eq!(user.state_of_charge, 0.0);
    }
}
