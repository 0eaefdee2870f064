//! The in-process demo runner: wires the Controller and collaborator agents
//! over a single `InMemoryBus` for `num_epochs` epochs. Grounded on the
//! teacher's `sim/engine.rs`-driven `run_scenario` shape — a driver loop
//! external to the domain objects, advancing one epoch at a time and
//! reporting a summary per tick — generalized from a fixed-timestep physical
//! sim to this crate's message-passing epoch protocol.

use chrono::{DateTime, TimeZone, Utc};

use crate::agents::{GridAgent, StationAgent, UserAgent};
use crate::bus::{Bus, InMemoryBus};
use crate::config::ScenarioConfig;
use crate::controller::Controller;
use crate::error::LoadError;
use crate::grid_load::{GridLoadTable, load_grid_load_table};
use crate::message::Message;
use crate::prefs::{PreferenceTable, load_preferences};
use crate::types::EpochWindow;

/// Per-epoch outcome, enough for the demo binary to print progress and for
/// integration tests to assert on.
#[derive(Debug, Clone)]
pub struct EpochSummary {
    pub epoch_number: u32,
    pub messages_published: usize,
    pub epoch_complete: bool,
    pub final_state_of_charge: Vec<(u64, f64)>,
}

pub struct Runner {
    controller: Controller,
    grid: GridAgent,
    stations: Vec<StationAgent>,
    users: Vec<UserAgent>,
    bus: InMemoryBus,
    epoch_length_seconds: i64,
    num_epochs: u32,
    start: DateTime<Utc>,
}

fn at_hour(base: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&base.date_naive().and_hms_opt(hour, 0, 0).unwrap())
}

impl Runner {
    pub fn new(
        config: &ScenarioConfig,
        preferences: PreferenceTable,
        grid_load_table: GridLoadTable,
        start: DateTime<Utc>,
    ) -> Self {
        let start = at_hour(start, config.simulation.start_hour);
        let simulation_id = config.simulation.simulation_id.clone();
        let controller = Controller::new(
            simulation_id.clone(),
            config.simulation.controller_process_id.clone(),
            config.users.len(),
            config.stations.len(),
            preferences,
            grid_load_table,
        );

        let grid = GridAgent::new(
            simulation_id.clone(),
            "grid-1",
            config.grid.grid_id.clone(),
            config.grid.total_max_power,
        );

        let stations = config
            .stations
            .iter()
            .map(|s| {
                StationAgent::new(
                    simulation_id.clone(),
                    format!("station-{}", s.station_id),
                    s.station_id.clone(),
                    s.max_power,
                    s.charging_cost,
                    s.compensation_amount,
                    config.grid.grid_id.clone(),
                )
            })
            .collect();

        let users = config
            .users
            .iter()
            .map(|u| {
                UserAgent::new(
                    simulation_id.clone(),
                    format!("user-{}", u.user_id),
                    u.user_id,
                    u.user_name.clone(),
                    u.station_id.clone(),
                    u.initial_state_of_charge,
                    u.car_battery_capacity,
                    u.car_model.clone(),
                    u.car_max_power,
                    at_hour(start, u.arrival_hour),
                    at_hour(start, u.target_hour),
                )
            })
            .collect();

        Self {
            controller,
            grid,
            stations,
            users,
            bus: InMemoryBus::new(),
            epoch_length_seconds: config.simulation.epoch_length_seconds,
            num_epochs: config.simulation.num_epochs,
            start,
        }
    }

    /// Loads the two static CSVs named in `config.paths` and constructs a
    /// `Runner` from them (`SPEC_FULL.md` §6).
    pub fn from_config(config: &ScenarioConfig, start: DateTime<Utc>) -> Result<Self, LoadError> {
        let preferences = load_preferences(&config.paths.preferences_csv)?;
        let grid_load_table = load_grid_load_table(&config.paths.grid_load_csv)?;
        Ok(Self::new(config, preferences, grid_load_table, start))
    }

    pub fn run(&mut self) -> Vec<EpochSummary> {
        tracing::debug!(num_epochs = self.num_epochs, "starting run");
        (0..self.num_epochs)
            .map(|n| {
                let epoch_start =
                    self.start + chrono::Duration::seconds(n as i64 * self.epoch_length_seconds);
                let epoch_end = epoch_start + chrono::Duration::seconds(self.epoch_length_seconds);
                self.run_epoch(EpochWindow::new(n, epoch_start, epoch_end))
            })
            .collect()
    }

    fn run_epoch(&mut self, epoch: EpochWindow) -> EpochSummary {
        self.controller.start_epoch(epoch);
        for message in self.grid.start_epoch(epoch) {
            self.bus.publish(message);
        }
        for station in &mut self.stations {
            for message in station.start_epoch(epoch) {
                self.bus.publish(message);
            }
        }
        for user in &mut self.users {
            for message in user.start_epoch(epoch) {
                self.bus.publish(message);
            }
        }

        let mut messages_published = 0;

        loop {
            let drained = self.bus.drain();
            if drained.is_empty() {
                for station in &self.stations {
                    if !station.is_epoch_ready() {
                        tracing::debug!(
                            station_id = %station.station_id,
                            "station not epoch-ready at drain exhaustion, awaiting finalize"
                        );
                    }
                }
                let mut produced_more = false;
                for station in &mut self.stations {
                    if let Some(message) = station.finalize_epoch() {
                        self.bus.publish(message);
                        produced_more = true;
                    }
                }
                for user in &mut self.users {
                    if let Some(message) = user.finalize_epoch() {
                        self.bus.publish(message);
                        produced_more = true;
                    }
                }
                if !produced_more {
                    break;
                }
                continue;
            }

            messages_published += drained.len();
            for message in &drained {
                self.deliver(message);
            }
        }

        EpochSummary {
            epoch_number: epoch.number,
            messages_published,
            epoch_complete: self.controller.current_phase_is_done(),
            final_state_of_charge: self
                .controller
                .users()
                .iter()
                .map(|u| (u.user_id, u.state_of_charge))
                .collect(),
        }
    }

    /// Broadcasts one drained message to every agent, publishing whatever
    /// each produces back onto the bus for the next drain round
    /// (`SPEC_FULL.md` §5: the bus delivers each message to each subscribed
    /// agent, with per-epoch sent/received flags keeping delivery
    /// idempotent).
    fn deliver(&mut self, message: &Message) {
        let outbound = self.controller.on_message(message);
        for m in outbound.power_requirements {
            self.bus.publish(m);
        }
        for m in outbound.discharge_requirements {
            self.bus.publish(m);
        }
        for station in &mut self.stations {
            for m in station.on_message(message) {
                self.bus.publish(m);
            }
        }
        for user in &mut self.users {
            for m in user.on_message(message) {
                self.bus.publish(m);
            }
        }
        for m in self.grid.on_message(message) {
            self.bus.publish(m);
        }
    }
}
