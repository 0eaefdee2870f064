//! The User agent (`SPEC_FULL.md` §4.4), grounded on
//! `examples/original_source/user_component/user_component.py`'s
//! `general_message_handler`/`process_epoch`.

use chrono::{DateTime, Utc};

use crate::message::{
    CarMetaDataPayload, CarStatePayload, Envelope, Message, PowerDischargeCarToStationPayload,
    UserStatePayload,
};
use crate::types::EpochWindow;

pub struct UserAgent {
    pub user_id: u64,
    pub user_name: String,
    pub station_id: String,
    pub state_of_charge: f64,
    pub car_battery_capacity: f64,
    pub car_model: String,
    pub car_max_power: f64,
    pub arrival_time: DateTime<Utc>,
    pub target_time: DateTime<Utc>,

    simulation_id: String,
    source_process_id: String,
    metadata_sent: bool,

    epoch: EpochWindow,
    user_state_sent: bool,
    car_state_sent: bool,
    power_output_received: bool,
    discharge_requirement_received: bool,
}

impl UserAgent {
    pub fn new(
        simulation_id: impl Into<String>,
        source_process_id: impl Into<String>,
        user_id: u64,
        user_name: impl Into<String>,
        station_id: impl Into<String>,
        state_of_charge: f64,
        car_battery_capacity: f64,
        car_model: impl Into<String>,
        car_max_power: f64,
        arrival_time: DateTime<Utc>,
        target_time: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            station_id: station_id.into(),
            state_of_charge,
            car_battery_capacity,
            car_model: car_model.into(),
            car_max_power,
            arrival_time,
            target_time,
            simulation_id: simulation_id.into(),
            source_process_id: source_process_id.into(),
            metadata_sent: false,
            epoch: EpochWindow::new(0, Utc::now(), Utc::now()),
            user_state_sent: false,
            car_state_sent: false,
            power_output_received: false,
            discharge_requirement_received: false,
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

    fn is_connected(&self) -> bool {
        self.epoch.contained_in(self.arrival_time, self.target_time)
    }

    /// Resets per-epoch flags and emits `CarMetaData` (epoch 1 only) and
    /// `UserState` (every epoch). A user not connected this epoch treats
    /// `power_output_received` as vacuously true (`SPEC_FULL.md` §4.4).
    pub fn start_epoch(&mut self, epoch: EpochWindow) -> Vec<Message> {
        self.epoch = epoch;
        self.user_state_sent = false;
        self.car_state_sent = false;
        self.discharge_requirement_received = false;
        self.power_output_received = !self.is_connected();

        let mut out = Vec::new();
        if !self.metadata_sent {
            out.push(Message::CarMetaData(self.envelope(CarMetaDataPayload {
                user_id: self.user_id,
                user_name: self.user_name.clone(),
                station_id: self.station_id.clone(),
                state_of_charge: self.state_of_charge,
                car_battery_capacity: self.car_battery_capacity,
                car_model: self.car_model.clone(),
                car_max_power: self.car_max_power,
            })));
            self.metadata_sent = true;
        }

        out.push(Message::UserState(self.envelope(UserStatePayload {
            user_id: self.user_id,
            arrival_time: self.arrival_time,
            target_time: self.target_time,
        })));
        self.user_state_sent = true;
        out
    }

    /// Handles inbound `PowerOutput`/`CarDischargePowerRequirement` addressed
    /// to this user. Ignores anything addressed to a different
    /// `(station_id, user_id)` (`SPEC_FULL.md` §4.4).
    pub fn on_message(&mut self, message: &Message) -> Vec<Message> {
        match message {
            Message::PowerOutput(env) => self.on_power_output(&env.payload),
            Message::CarDischargePowerRequirement(env) => self.on_discharge_requirement(&env.payload),
            _ => Vec::new(),
        }
    }

    fn on_power_output(&mut self, payload: &crate::message::PowerDirectivePayload) -> Vec<Message> {
        if payload.station_id != self.station_id || payload.user_id != self.user_id {
            return Vec::new();
        }
        if self.power_output_received {
            tracing::warn!(user_id = self.user_id, "duplicate PowerOutput, dropping");
            return Vec::new();
        }
        let epoch_hours = self.epoch.duration_seconds() as f64 / 3600.0;
        if epoch_hours > 0.0 {
            let delta_pct = (payload.power * epoch_hours / self.car_battery_capacity) * 100.0;
            self.state_of_charge = (self.state_of_charge + delta_pct).clamp(0.0, 100.0);
        }
        self.power_output_received = true;
        Vec::new()
    }

    fn on_discharge_requirement(
        &mut self,
        payload: &crate::message::PowerDirectivePayload,
    ) -> Vec<Message> {
        if payload.station_id != self.station_id || payload.user_id != self.user_id {
            return Vec::new();
        }
        if self.discharge_requirement_received {
            tracing::warn!(
                user_id = self.user_id,
                "duplicate CarDischargePowerRequirement, dropping"
            );
            return Vec::new();
        }
        let epoch_hours = self.epoch.duration_seconds() as f64 / 3600.0;
        if epoch_hours > 0.0 {
            let delta_pct = (payload.power * epoch_hours / self.car_battery_capacity) * 100.0;
            self.state_of_charge = (self.state_of_charge - delta_pct).clamp(0.0, 100.0);
        }
        self.discharge_requirement_received = true;
        vec![Message::PowerDischargeCarToStation(self.envelope(
            PowerDischargeCarToStationPayload {
                station_id: self.station_id.clone(),
                user_id: self.user_id,
                power: payload.power,
            },
        ))]
    }

    /// Emits `CarState` once this epoch, after whichever of
    /// `PowerOutput`/`CarDischargePowerRequirement` apply have been handled.
    /// Called by the driver once it has finished delivering this epoch's
    /// messages to this agent.
    pub fn finalize_epoch(&mut self) -> Option<Message> {
        if self.car_state_sent || !self.power_output_received {
            return None;
        }
        self.car_state_sent = true;
        Some(Message::CarState(self.envelope(CarStatePayload {
            user_id: self.user_id,
            station_id: self.station_id.clone(),
            state_of_charge: self.state_of_charge,
        })))
    }
}
