//! The Station agent (`SPEC_FULL.md` §4.5), grounded on
//! `examples/original_source/station_component/station_component.py`.

use chrono::Utc;

use crate::message::{
    Envelope, Message, PowerDirectivePayload, PowerDischargeStationToGridPayload,
    StationStatePayload, TotalChargingCostPayload,
};
use crate::types::EpochWindow;

pub struct StationAgent {
    pub station_id: String,
    pub max_power: f64,
    pub charging_cost: f64,
    pub compensation_amount: f64,
    pub grid_id: String,

    simulation_id: String,
    source_process_id: String,
    total_charging_cost: f64,

    epoch: EpochWindow,
    station_state_sent: bool,
    power_requirement_received: bool,
    discharge_requirement_received: bool,
    discharge_to_grid_sent: bool,
    discharge_accumulator: f64,
    grid_under_load: bool,
    total_cost_sent: bool,
}

impl StationAgent {
    pub fn new(
        simulation_id: impl Into<String>,
        source_process_id: impl Into<String>,
        station_id: impl Into<String>,
        max_power: f64,
        charging_cost: f64,
        compensation_amount: f64,
        grid_id: impl Into<String>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            max_power,
            charging_cost,
            compensation_amount,
            grid_id: grid_id.into(),
            simulation_id: simulation_id.into(),
            source_process_id: source_process_id.into(),
            total_charging_cost: 0.0,
            epoch: EpochWindow::new(0, Utc::now(), Utc::now()),
            station_state_sent: false,
            power_requirement_received: false,
            discharge_requirement_received: false,
            discharge_to_grid_sent: false,
            discharge_accumulator: 0.0,
            grid_under_load: false,
            total_cost_sent: false,
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

    /// Resets per-epoch flags/accumulators and emits `StationState`
    /// (`SPEC_FULL.md` §4.5).
    pub fn start_epoch(&mut self, epoch: EpochWindow) -> Vec<Message> {
        self.epoch = epoch;
        self.power_requirement_received = false;
        self.discharge_requirement_received = false;
        self.discharge_to_grid_sent = false;
        self.discharge_accumulator = 0.0;
        self.grid_under_load = false;
        self.total_cost_sent = false;

        self.station_state_sent = true;
        vec![Message::StationState(self.envelope(StationStatePayload {
            station_id: self.station_id.clone(),
            max_power: self.max_power,
            charging_cost: self.charging_cost,
            compensation_amount: self.compensation_amount,
        }))]
    }

    pub fn on_message(&mut self, message: &Message) -> Vec<Message> {
        match message {
            Message::PowerRequirement(env) => self.on_power_requirement(&env.payload),
            Message::CarDischargePowerRequirement(env) => {
                self.on_discharge_requirement(&env.payload)
            }
            Message::PowerDischargeCarToStation(env) => {
                if env.payload.station_id == self.station_id {
                    self.discharge_accumulator += env.payload.power;
                }
                Vec::new()
            }
            Message::GridLoadStatus(env) => {
                self.grid_under_load = env.payload.load_status;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn on_power_requirement(&mut self, payload: &PowerDirectivePayload) -> Vec<Message> {
        if payload.station_id != self.station_id {
            return Vec::new();
        }
        if self.power_requirement_received {
            tracing::warn!(
                station_id = %self.station_id,
                "duplicate PowerRequirement this epoch, dropping"
            );
            return Vec::new();
        }
        self.power_requirement_received = true;
        self.total_charging_cost += payload.power * self.charging_cost;

        let mut out = vec![Message::PowerOutput(self.envelope(PowerDirectivePayload {
            station_id: self.station_id.clone(),
            user_id: payload.user_id,
            power: payload.power,
        }))];

        if !self.total_cost_sent {
            self.total_cost_sent = true;
            out.push(Message::TotalChargingCost(self.envelope(
                TotalChargingCostPayload {
                    total_charging_cost: self.total_charging_cost,
                    user_id: payload.user_id,
                },
            )));
        }
        out
    }

    fn on_discharge_requirement(&mut self, payload: &PowerDirectivePayload) -> Vec<Message> {
        if payload.station_id != self.station_id {
            return Vec::new();
        }
        if self.discharge_requirement_received {
            tracing::warn!(
                station_id = %self.station_id,
                "duplicate CarDischargePowerRequirement this epoch, dropping"
            );
            return Vec::new();
        }
        self.discharge_requirement_received = true;
        vec![Message::CarDischargePowerRequirement(self.envelope(
            PowerDirectivePayload {
                station_id: self.station_id.clone(),
                user_id: payload.user_id,
                power: payload.power,
            },
        ))]
    }

    /// Forwards the epoch's accumulated discharge flow to the Grid, once,
    /// after all `PowerDischargeCarToStation` reports for the epoch have
    /// arrived (`SPEC_FULL.md` §4.5).
    pub fn finalize_epoch(&mut self) -> Option<Message> {
        if self.discharge_to_grid_sent || self.discharge_accumulator <= 0.0 {
            return None;
        }
        self.discharge_to_grid_sent = true;
        Some(Message::PowerDischargeStationToGrid(self.envelope(
            PowerDischargeStationToGridPayload {
                station_id: self.station_id.clone(),
                grid_id: self.grid_id.clone(),
                power: self.discharge_accumulator,
            },
        )))
    }

    /// `SPEC_FULL.md` §4.5: ready either when not under load and the charge
    /// leg is handled, or under load and the discharge leg is handled.
    pub fn is_epoch_ready(&self) -> bool {
        if self.grid_under_load {
            self.discharge_requirement_received
        } else {
            self.power_requirement_received
        }
    }
}
