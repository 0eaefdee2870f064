//! The Grid agent (`SPEC_FULL.md` §4.6), grounded on
//! `examples/original_source/grid_component/grid_component.py`.

use chrono::Utc;

use crate::message::{Envelope, GridStatePayload, Message};
use crate::types::EpochWindow;

pub struct GridAgent {
    pub grid_id: String,
    pub total_max_power: f64,
    current_power: f64,

    simulation_id: String,
    source_process_id: String,
    epoch: EpochWindow,
}

impl GridAgent {
    pub fn new(
        simulation_id: impl Into<String>,
        source_process_id: impl Into<String>,
        grid_id: impl Into<String>,
        total_max_power: f64,
    ) -> Self {
        Self {
            grid_id: grid_id.into(),
            total_max_power,
            current_power: total_max_power,
            simulation_id: simulation_id.into(),
            source_process_id: source_process_id.into(),
            epoch: EpochWindow::new(0, Utc::now(), Utc::now()),
        }
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

    /// Publishes `GridState` with the capacity as of epoch start
    /// (`SPEC_FULL.md` §4.6). Ready immediately: readiness does not wait on
    /// discharge reports.
    pub fn start_epoch(&mut self, epoch: EpochWindow) -> Vec<Message> {
        self.epoch = epoch;
        vec![Message::GridState(self.envelope(GridStatePayload {
            grid_id: self.grid_id.clone(),
            max_power: self.total_max_power,
            current_power: self.current_power,
        }))]
    }

    /// Re-accumulates capacity from station discharge reports, summed and
    /// clamped at `total_max_power` (`SPEC_FULL.md` §4.6, DESIGN.md Open
    /// Question 6).
    pub fn on_message(&mut self, message: &Message) -> Vec<Message> {
        if let Message::PowerDischargeStationToGrid(env) = message {
            if env.payload.grid_id == self.grid_id {
                self.current_power = (self.current_power + env.payload.power).min(self.total_max_power);
            }
        }
        Vec::new()
    }

    pub fn current_power(&self) -> f64 {
        self.current_power
    }
}
