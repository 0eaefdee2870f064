//! The V2G Controller: the hard core of this crate (`SPEC_FULL.md` §4.1–4.3).
//!
//! Grounded on
//! `examples/original_source/v2g_controller_component/v2g_controller_component.py`,
//! restructured per §9's redesign note from an ad-hoc boolean forest into an
//! explicit `Phase` state machine, and on the teacher's `sim/controller.rs`
//! for the shape of a `dispatch`-style core type with a dense
//! `#[cfg(test)] mod tests`.

pub mod allocation;
pub mod discharge;

use std::collections::{HashMap, HashSet};

use chrono::Utc;

use crate::grid_load::GridLoadTable;
use crate::message::{
    CarMetaDataPayload, CarStatePayload, Envelope, GridStatePayload, Message,
    PowerDirectivePayload, StationStatePayload, UserStatePayload,
};
use crate::prefs::PreferenceTable;
use crate::types::{
    EpochWindow, MAX_STATE_OF_CHARGE, StationData, UserRecord, DEFAULT_TARGET_STATE_OF_CHARGE,
};

/// The explicit epoch state machine `SPEC_FULL.md` §9 asks for, replacing the
/// source's per-burst boolean flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Gathering,
    Allocated,
    Finalizing,
    Done,
}

/// What a call into the controller produced: zero or more outbound bursts,
/// each emitted at most once per epoch, and whether the epoch is now
/// complete (`SPEC_FULL.md` §4.1).
#[derive(Debug, Clone, Default)]
pub struct EpochOutbound {
    pub power_requirements: Vec<Message>,
    pub discharge_requirements: Vec<Message>,
    pub epoch_complete: bool,
}

impl EpochOutbound {
    fn is_empty(&self) -> bool {
        self.power_requirements.is_empty() && self.discharge_requirements.is_empty()
    }
}

pub struct Controller {
    simulation_id: String,
    source_process_id: String,
    total_users: usize,
    total_stations: usize,
    preferences: PreferenceTable,
    grid_load_table: GridLoadTable,

    users: Vec<UserRecord>,
    metadata_received: HashSet<u64>,

    stations: Vec<StationData>,
    station_ids_this_epoch: HashSet<String>,

    grid_max_power_latched: Option<f64>,
    grid_current_power: Option<f64>,
    grid_id: Option<String>,
    grid_received_this_epoch: bool,

    user_state_received: HashSet<u64>,
    car_state_received: HashSet<u64>,

    epoch: EpochWindow,
    phase: Phase,
}

impl Controller {
    pub fn new(
        simulation_id: impl Into<String>,
        source_process_id: impl Into<String>,
        total_users: usize,
        total_stations: usize,
        preferences: PreferenceTable,
        grid_load_table: GridLoadTable,
    ) -> Self {
        Self {
            simulation_id: simulation_id.into(),
            source_process_id: source_process_id.into(),
            total_users,
            total_stations,
            preferences,
            grid_load_table,
            users: Vec::new(),
            metadata_received: HashSet::new(),
            stations: Vec::new(),
            station_ids_this_epoch: HashSet::new(),
            grid_max_power_latched: None,
            grid_current_power: None,
            grid_id: None,
            grid_received_this_epoch: false,
            user_state_received: HashSet::new(),
            car_state_received: HashSet::new(),
            epoch: EpochWindow::new(0, Utc::now(), Utc::now()),
            phase: Phase::Gathering,
        }
    }

    /// Called by the driver when the Simulation Manager broadcasts
    /// `Epoch(E, start, end)` (`SPEC_FULL.md` §2). Resets everything that is
    /// per-epoch: station snapshot, grid-received flag, user/car-state
    /// counters, and — per DESIGN.md Open Question 5 — every user's
    /// `discharge` flag (metadata is the one thing that stays latched across
    /// epochs).
    pub fn start_epoch(&mut self, epoch: EpochWindow) {
        self.epoch = epoch;
        self.phase = Phase::Gathering;
        self.stations.clear();
        self.station_ids_this_epoch.clear();
        self.grid_received_this_epoch = false;
        self.user_state_received.clear();
        self.car_state_received.clear();
        for user in &mut self.users {
            user.discharge = false;
        }
    }

    fn find_user_mut(&mut self, user_id: u64) -> Option<&mut UserRecord> {
        self.users.iter_mut().find(|u| u.user_id == user_id)
    }

    fn find_station(&self, station_id: &str) -> Option<&StationData> {
        self.stations.iter().find(|s| s.station_id == station_id)
    }

    fn metadata_complete(&self) -> bool {
        self.metadata_received.len() >= self.total_users
    }

    fn snapshot_complete(&self) -> bool {
        self.metadata_complete()
            && self.stations.len() >= self.total_stations
            && self.user_state_received.len() >= self.total_users
            && self.grid_received_this_epoch
    }

    fn envelope<T>(&self, payload: T) -> Envelope<T> {
        Envelope::new(
            self.simulation_id.clone(),
            self.source_process_id.clone(),
            self.epoch.number,
            Utc::now(),
            payload,
        )
    }

    /// The re-entrant try-advance routine of `SPEC_FULL.md` §4.1: idempotent,
    /// safe to call after every inbound message. Fires the PowerRequirement
    /// burst once the snapshot is complete; only once every `CarState` has
    /// landed (so every user's `discharge` flag has been evaluated by
    /// `on_car_state`) does it fire the discharge burst and report epoch
    /// completion. The two phase transitions are mutually exclusive so a
    /// single inbound message can advance at most one phase — a `CarState`
    /// that happens to complete the snapshot too (single-message-per-epoch
    /// scenarios) must not also build a discharge burst before that same
    /// message's `on_car_state` has run.
    fn try_advance(&mut self) -> EpochOutbound {
        let mut out = EpochOutbound::default();

        if self.phase == Phase::Gathering && self.snapshot_complete() {
            out.power_requirements = self.build_power_requirement_burst();
            self.phase = Phase::Allocated;
        } else if self.phase == Phase::Allocated && self.car_state_received.len() >= self.total_users
        {
            out.discharge_requirements = self.build_discharge_burst();
            self.phase = Phase::Finalizing;
        }

        if self.phase == Phase::Finalizing {
            self.phase = Phase::Done;
        }

        out.epoch_complete = self.phase == Phase::Done;
        out
    }

    fn build_power_requirement_burst(&self) -> Vec<Message> {
        let connected = allocation::connected_users(&self.users, &self.epoch);
        let slots = allocation::power_info_list(&self.stations, &connected);
        let capacity = self.grid_current_power.unwrap_or(0.0);
        let powers = allocation::allocate(&slots, capacity, self.epoch.duration_seconds());

        slots
            .iter()
            .zip(powers)
            .map(|(slot, power)| {
                Message::PowerRequirement(self.envelope(PowerDirectivePayload {
                    station_id: slot.station_id.clone(),
                    user_id: slot.user_id,
                    power,
                }))
            })
            .collect()
    }

    fn build_discharge_burst(&self) -> Vec<Message> {
        let epoch_hours = self.epoch.duration_seconds() as f64 / 3600.0;

        self.users
            .iter()
            .filter(|u| u.discharge && u.state_of_charge > u.target_state_of_charge)
            .map(|user| {
                let energy_kwh =
                    user.car_battery_capacity * (user.state_of_charge - user.target_state_of_charge)
                        / 100.0;
                let power_kw = if epoch_hours > 0.0 {
                    energy_kwh / epoch_hours
                } else {
                    0.0
                };
                Message::CarDischargePowerRequirement(self.envelope(PowerDirectivePayload {
                    station_id: user.station_id.clone(),
                    user_id: user.user_id,
                    power: power_kw,
                }))
            })
            .collect()
    }

    fn on_car_metadata(&mut self, payload: &CarMetaDataPayload) {
        if self.metadata_received.contains(&payload.user_id) {
            tracing::warn!(user_id = payload.user_id, "duplicate CarMetaData, dropping");
            return;
        }
        self.metadata_received.insert(payload.user_id);

        let preference = self.preferences.get(&payload.user_id);
        if preference.is_none() {
            tracing::warn!(
                user_id = payload.user_id,
                "no preference record for user, defaulting target SoC"
            );
        }
        let target_state_of_charge = preference
            .map(|p| p.minimum_soc * 100.0)
            .unwrap_or(DEFAULT_TARGET_STATE_OF_CHARGE);

        let mut user = UserRecord {
            user_id: payload.user_id,
            user_name: payload.user_name.clone(),
            station_id: payload.station_id.clone(),
            state_of_charge: payload.state_of_charge,
            car_battery_capacity: payload.car_battery_capacity,
            car_model: payload.car_model.clone(),
            car_max_power: payload.car_max_power,
            target_state_of_charge,
            required_energy: 0.0,
            arrival_time: self.epoch.start,
            target_time: self.epoch.start,
            discharge: false,
        };
        user.clamp_state_of_charge();
        user.recompute_required_energy();
        self.users.push(user);
    }

    fn on_user_state(&mut self, payload: &UserStatePayload) {
        if self.user_state_received.contains(&payload.user_id) {
            tracing::warn!(user_id = payload.user_id, "duplicate UserState, dropping");
            return;
        }
        let Some(user) = self.find_user_mut(payload.user_id) else {
            tracing::warn!(
                user_id = payload.user_id,
                "UserState for unknown user, ignoring"
            );
            return;
        };
        user.arrival_time = payload.arrival_time;
        user.target_time = payload.target_time;
        self.user_state_received.insert(payload.user_id);
    }

    fn on_station_state(&mut self, payload: &StationStatePayload) {
        if self.station_ids_this_epoch.contains(&payload.station_id) {
            tracing::warn!(
                station_id = %payload.station_id,
                "duplicate StationState this epoch, dropping"
            );
            return;
        }
        self.station_ids_this_epoch
            .insert(payload.station_id.clone());
        self.stations.push(StationData {
            station_id: payload.station_id.clone(),
            max_power: payload.max_power,
            charging_cost: payload.charging_cost,
            compensation_amount: payload.compensation_amount,
        });
    }

    fn on_grid_state(&mut self, payload: &GridStatePayload) {
        if self.grid_received_this_epoch {
            tracing::warn!("duplicate GridState this epoch, dropping");
            return;
        }
        self.grid_received_this_epoch = true;
        self.grid_id = Some(payload.grid_id.clone());
        self.grid_current_power = Some(payload.current_power);
        if self.grid_max_power_latched.is_none() {
            self.grid_max_power_latched = Some(payload.max_power);
        }
    }

    fn on_car_state(&mut self, payload: &CarStatePayload) {
        if self.car_state_received.contains(&payload.user_id) {
            tracing::warn!(user_id = payload.user_id, "duplicate CarState, dropping");
            return;
        }
        let grid_is_under_load =
            discharge::grid_under_load(&self.grid_load_table, self.epoch.start_hour());
        let preference = self.preferences.get(&payload.user_id).copied();
        let station = self.find_station(&payload.station_id).cloned();

        let Some(user) = self.find_user_mut(payload.user_id) else {
            tracing::warn!(
                user_id = payload.user_id,
                "CarState for unknown user, ignoring"
            );
            return;
        };

        user.state_of_charge = payload.state_of_charge;
        user.clamp_state_of_charge();
        user.discharge =
            discharge::should_discharge(preference.as_ref(), grid_is_under_load, station.as_ref());

        if user.discharge && user.state_of_charge > user.target_state_of_charge {
            user.required_energy = 0.0;
            let floor = preference.map(|p| p.minimum_soc * 100.0).unwrap_or(0.0);
            user.target_state_of_charge = (user.state_of_charge - 10.0).max(floor);
        } else if (user.state_of_charge - user.target_state_of_charge).abs() < 1e-9 {
            if let (Some(preference), Some(station)) = (preference, station) {
                if preference.max_cost_for_charging >= station.charging_cost
                    && user.target_state_of_charge < MAX_STATE_OF_CHARGE
                {
                    user.target_state_of_charge = MAX_STATE_OF_CHARGE;
                    user.recompute_required_energy();
                }
            }
        }

        self.car_state_received.insert(payload.user_id);
    }

    /// Dispatches one inbound message and runs try-advance. Messages not
    /// addressed to the controller (`PowerOutput`, `TotalChargingCost`, …)
    /// are acknowledged but produce no state change.
    pub fn on_message(&mut self, message: &Message) -> EpochOutbound {
        match message {
            Message::CarMetaData(env) => self.on_car_metadata(&env.payload),
            Message::UserState(env) => self.on_user_state(&env.payload),
            Message::StationState(env) => self.on_station_state(&env.payload),
            Message::GridState(env) => self.on_grid_state(&env.payload),
            Message::CarState(env) => self.on_car_state(&env.payload),
            _ => return EpochOutbound::default(),
        }
        self.try_advance()
    }

    pub fn users(&self) -> &[UserRecord] {
        &self.users
    }

    pub fn current_phase_is_done(&self) -> bool {
        self.phase == Phase::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CarMetaDataPayload, GridLoadStatusPayload};
    use crate::types::UserPreference;
    use chrono::TimeZone;

    fn window(hour: u32) -> EpochWindow {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap();
        let end = start + chrono::Duration::hours(1);
        EpochWindow::new(1, start, end)
    }

    fn prefs_with(user_id: u64, pref: UserPreference) -> PreferenceTable {
        let mut table = PreferenceTable::new();
        table.insert(user_id, pref);
        table
    }

    fn default_preference() -> UserPreference {
        UserPreference {
            minimum_soc: 0.8,
            max_cost_for_charging: 0.5,
            discharge_price_threshold: 0.5,
            maximum_soc: None,
        }
    }

    fn feed_single_user_epoch(controller: &mut Controller, epoch: EpochWindow) -> EpochOutbound {
        controller.start_epoch(epoch);

        let mut out = EpochOutbound::default();
        out.merge_in(controller.on_message(&Message::CarMetaData(Envelope::new(
            "sim",
            "proc",
            epoch.number,
            Utc::now(),
            CarMetaDataPayload {
                user_id: 1,
                user_name: "Alice".into(),
                station_id: "S1".into(),
                state_of_charge: 20.0,
                car_battery_capacity: 40.0,
                car_model: "Model".into(),
                car_max_power: 22.0,
            },
        ))));
        out.merge_in(controller.on_message(&Message::UserState(Envelope::new(
            "sim",
            "proc",
            epoch.number,
            Utc::now(),
            UserStatePayload {
                user_id: 1,
                arrival_time: epoch.start,
                target_time: epoch.end,
            },
        ))));
        out.merge_in(controller.on_message(&Message::StationState(Envelope::new(
            "sim",
            "proc",
            epoch.number,
            Utc::now(),
            StationStatePayload {
                station_id: "S1".into(),
                max_power: 22.0,
                charging_cost: 0.2,
                compensation_amount: 0.1,
            },
        ))));
        out.merge_in(controller.on_message(&Message::GridState(Envelope::new(
            "sim",
            "proc",
            epoch.number,
            Utc::now(),
            GridStatePayload {
                grid_id: "G1".into(),
                max_power: 50.0,
                current_power: 50.0,
            },
        ))));
        out
    }

    impl EpochOutbound {
        fn merge_in(&mut self, other: EpochOutbound) {
            self.power_requirements.extend(other.power_requirements);
            self.discharge_requirements.extend(other.discharge_requirements);
            self.epoch_complete = other.epoch_complete;
        }
    }

    /// Scenario 1 of `SPEC_FULL.md` §8, end to end through the Controller.
    #[test]
    fn complete_snapshot_emits_one_power_requirement_per_station() {
        let mut controller = Controller::new(
            "sim",
            "proc",
            1,
            1,
            prefs_with(1, default_preference()),
            GridLoadTable::empty(),
        );
        let out = feed_single_user_epoch(&mut controller, window(9));
        assert_eq!(out.power_requirements.len(), 1);
        let Message::PowerRequirement(env) = &out.power_requirements[0] else {
            panic!("expected PowerRequirement");
        };
        assert!((env.payload.power - 22.0).abs() < 1e-9);
        assert!(out.discharge_requirements.is_empty());
        assert!(!out.epoch_complete);
    }

    #[test]
    fn epoch_completes_after_all_car_states_received() {
        let mut controller = Controller::new(
            "sim",
            "proc",
            1,
            1,
            prefs_with(1, default_preference()),
            GridLoadTable::empty(),
        );
        feed_single_user_epoch(&mut controller, window(9));
        let out = controller.on_message(&Message::CarState(Envelope::new(
            "sim",
            "proc",
            1,
            Utc::now(),
            CarStatePayload {
                user_id: 1,
                station_id: "S1".into(),
                state_of_charge: 75.0,
            },
        )));
        assert!(out.epoch_complete);
        assert!(controller.current_phase_is_done());
    }

    #[test]
    fn replaying_the_same_message_in_epoch_is_a_no_op() {
        let mut controller = Controller::new(
            "sim",
            "proc",
            1,
            1,
            prefs_with(1, default_preference()),
            GridLoadTable::empty(),
        );
        let out = feed_single_user_epoch(&mut controller, window(9));
        assert_eq!(out.power_requirements.len(), 1);

        // Replay the GridState message: no new burst, no state change.
        let replay = controller.on_message(&Message::GridState(Envelope::new(
            "sim",
            "proc",
            1,
            Utc::now(),
            GridStatePayload {
                grid_id: "G1".into(),
                max_power: 50.0,
                current_power: 50.0,
            },
        )));
        assert!(replay.is_empty());
    }

    /// Scenario 5 of `SPEC_FULL.md` §8: discharge triggered.
    #[test]
    fn discharge_burst_emitted_when_eligible_and_over_target() {
        let preference = UserPreference {
            minimum_soc: 0.5,
            max_cost_for_charging: 0.5,
            discharge_price_threshold: 0.1,
            maximum_soc: None,
        };
        let mut controller = Controller::new(
            "sim",
            "proc",
            1,
            1,
            prefs_with(1, preference),
            {
                let mut table_src = std::env::temp_dir().join(format!(
                    "v2g-sim-test-gridload-ctrl-{}.csv",
                    std::process::id()
                ));
                std::fs::write(&table_src, "time,grid_on_load\n09:00,1\n").unwrap();
                let table = crate::grid_load::load_grid_load_table(&table_src).unwrap();
                std::fs::remove_file(&table_src).ok();
                table
            },
        );
        controller.start_epoch(window(9));
        controller.on_message(&Message::CarMetaData(Envelope::new(
            "sim",
            "proc",
            1,
            Utc::now(),
            CarMetaDataPayload {
                user_id: 1,
                user_name: "Alice".into(),
                station_id: "S1".into(),
                state_of_charge: 80.0,
                car_battery_capacity: 40.0,
                car_model: "Model".into(),
                car_max_power: 22.0,
            },
        )));
        controller.on_message(&Message::UserState(Envelope::new(
            "sim",
            "proc",
            1,
            Utc::now(),
            UserStatePayload {
                user_id: 1,
                arrival_time: window(9).start,
                target_time: window(9).end,
            },
        )));
        controller.on_message(&Message::StationState(Envelope::new(
            "sim",
            "proc",
            1,
            Utc::now(),
            StationStatePayload {
                station_id: "S1".into(),
                max_power: 22.0,
                charging_cost: 0.2,
                compensation_amount: 0.2,
            },
        )));
        controller.on_message(&Message::GridState(Envelope::new(
            "sim",
            "proc",
            1,
            Utc::now(),
            GridStatePayload {
                grid_id: "G1".into(),
                max_power: 50.0,
                current_power: 50.0,
            },
        )));
        let out = controller.on_message(&Message::CarState(Envelope::new(
            "sim",
            "proc",
            1,
            Utc::now(),
            CarStatePayload {
                user_id: 1,
                station_id: "S1".into(),
                state_of_charge: 80.0,
            },
        )));
        assert_eq!(out.discharge_requirements.len(), 1);
        let Message::CarDischargePowerRequirement(env) = &out.discharge_requirements[0] else {
            panic!("expected CarDischargePowerRequirement");
        };
        // target dropped to max(80-10, 50) = 70; energy = 40*(80-70)/100 = 4 kWh
        // over a 1-hour epoch that is 4 kW.
        assert!((env.payload.power - 4.0).abs() < 1e-9);
    }

    #[test]
    fn unused_grid_load_status_message_does_not_panic() {
        let mut controller = Controller::new(
            "sim",
            "proc",
            1,
            1,
            prefs_with(1, default_preference()),
            GridLoadTable::empty(),
        );
        controller.start_epoch(window(9));
        let out = controller.on_message(&Message::GridLoadStatus(Envelope::new(
            "sim",
            "proc",
            1,
            Utc::now(),
            GridLoadStatusPayload { load_status: true },
        )));
        assert!(out.is_empty());
    }
}
