//! The message envelope, payload schema, and `MessageType` → decoder registry.
//!
//! Every message on the bus is one `Message` variant: a tag (`MessageType`),
//! the common envelope fields, and a type-specific payload, flattened into a
//! single JSON object. This replaces the original component-by-component
//! `MESSAGE_ATTRIBUTES` dict + factory registration (see
//! `examples/original_source/messages/grid_state_message.py`) with a single
//! `serde`-internally-tagged enum: the tag *is* the registry key, and
//! `Message::decode` is the single decode entry point `SPEC_FULL.md` §9 asks
//! for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fields common to every message on the bus (`SPEC_FULL.md` §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope<T> {
    pub simulation_id: String,
    pub source_process_id: String,
    pub epoch_number: u32,
    #[serde(default)]
    pub triggering_message_ids: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(
        simulation_id: impl Into<String>,
        source_process_id: impl Into<String>,
        epoch_number: u32,
        timestamp: DateTime<Utc>,
        payload: T,
    ) -> Self {
        Self {
            simulation_id: simulation_id.into(),
            source_process_id: source_process_id.into(),
            epoch_number,
            triggering_message_ids: Vec::new(),
            timestamp,
            payload,
        }
    }

    pub fn triggered_by(mut self, ids: Vec<String>) -> Self {
        self.triggering_message_ids = ids;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CarMetaDataPayload {
    pub user_id: u64,
    pub user_name: String,
    pub station_id: String,
    pub state_of_charge: f64,
    pub car_battery_capacity: f64,
    pub car_model: String,
    pub car_max_power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserStatePayload {
    pub user_id: u64,
    pub arrival_time: DateTime<Utc>,
    pub target_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CarStatePayload {
    pub user_id: u64,
    pub station_id: String,
    pub state_of_charge: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StationStatePayload {
    pub station_id: String,
    pub max_power: f64,
    pub charging_cost: f64,
    pub compensation_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GridStatePayload {
    pub grid_id: String,
    pub max_power: f64,
    pub current_power: f64,
}

/// Shared shape for `PowerRequirement`, `PowerOutput`, and
/// `CarDischargePowerRequirement`: a directive addressed to `(station_id,
/// user_id)` carrying a signed-or-zero power in kW. `user_id = 0` marks a
/// vacant slot (`SPEC_FULL.md` §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PowerDirectivePayload {
    pub station_id: String,
    pub user_id: u64,
    pub power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PowerDischargeCarToStationPayload {
    pub station_id: String,
    pub user_id: u64,
    pub power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PowerDischargeStationToGridPayload {
    pub station_id: String,
    pub grid_id: String,
    pub power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TotalChargingCostPayload {
    pub total_charging_cost: f64,
    pub user_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GridLoadStatusPayload {
    pub load_status: bool,
}

/// Reserved for out-of-band preference updates; no agent in this crate
/// publishes it (preferences are loaded from `v2g_user_preferences.csv` at
/// boot), but it is part of the wire schema per `SPEC_FULL.md` §6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserPreferencePayload {
    pub user_id: u64,
    pub minimum_soc: f64,
    pub max_cost_for_charging: f64,
    pub discharge_price_threshold: f64,
    #[serde(default)]
    pub maximum_soc: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorPayload {
    pub reason: String,
    pub offending_message_type: String,
}

/// Every message type this simulation exchanges, tagged by `MessageType` on
/// the wire. The tag doubles as the decoder registry key: there is no
/// separate `register_to_factory` step, `serde` dispatches on the tag
/// directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "MessageType")]
pub enum Message {
    CarMetaData(Envelope<CarMetaDataPayload>),
    UserState(Envelope<UserStatePayload>),
    CarState(Envelope<CarStatePayload>),
    StationState(Envelope<StationStatePayload>),
    GridState(Envelope<GridStatePayload>),
    PowerRequirement(Envelope<PowerDirectivePayload>),
    PowerOutput(Envelope<PowerDirectivePayload>),
    CarDischargePowerRequirement(Envelope<PowerDirectivePayload>),
    PowerDischargeCarToStation(Envelope<PowerDischargeCarToStationPayload>),
    PowerDischargeStationToGrid(Envelope<PowerDischargeStationToGridPayload>),
    TotalChargingCost(Envelope<TotalChargingCostPayload>),
    GridLoadStatus(Envelope<GridLoadStatusPayload>),
    UserPreference(Envelope<UserPreferencePayload>),
    Error(Envelope<ErrorPayload>),
}

#[derive(Debug, Deserialize)]
struct TypeProbe {
    #[serde(rename = "MessageType")]
    message_type: String,
}

impl Message {
    /// The bus topic this message is published on (`SPEC_FULL.md` §6). The
    /// controller-to-station and station-to-user discharge legs both reuse
    /// `PowerRequirementTopic` (the frozen resolution of the topic Open
    /// Question; see `DESIGN.md`).
    pub fn topic(&self) -> &'static str {
        match self {
            Message::CarMetaData(_) => crate::topics::CAR_METADATA,
            Message::UserState(_) => crate::topics::USER_STATE,
            Message::CarState(_) => crate::topics::CAR_STATE,
            Message::StationState(_) => crate::topics::STATION_STATE,
            Message::GridState(_) => crate::topics::GRID_STATE,
            Message::PowerRequirement(_) => crate::topics::POWER_REQUIREMENT,
            Message::CarDischargePowerRequirement(_) => crate::topics::POWER_REQUIREMENT,
            Message::PowerOutput(_) => crate::topics::POWER_OUTPUT,
            Message::PowerDischargeCarToStation(_) => crate::topics::POWER_DISCHARGE_CAR_TO_STATION,
            Message::PowerDischargeStationToGrid(_) => {
                crate::topics::POWER_DISCHARGE_STATION_TO_GRID
            }
            Message::TotalChargingCost(_) => crate::topics::TOTAL_CHARGING_COST,
            Message::GridLoadStatus(_) => crate::topics::GRID_LOAD_STATUS,
            Message::UserPreference(_) => crate::topics::USER_PREFERENCE,
            Message::Error(_) => crate::topics::ERROR,
        }
    }

    /// Serializes to the wire format (JSON).
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("Message payloads are always JSON-representable")
    }

    /// Decodes a wire payload, logging and returning `None` on any failure —
    /// an unknown `MessageType` tag or a malformed payload for a known tag
    /// are both decode failures per `SPEC_FULL.md` §7, dropped silently after
    /// the log line.
    pub fn decode(bytes: &[u8]) -> Option<Message> {
        match serde_json::from_slice::<Message>(bytes) {
            Ok(message) => Some(message),
            Err(err) => {
                if let Ok(probe) = serde_json::from_slice::<TypeProbe>(bytes) {
                    tracing::warn!(
                        message_type = %probe.message_type,
                        error = %err,
                        "dropping message that failed to decode"
                    );
                } else {
                    tracing::warn!(error = %err, "dropping malformed message: no MessageType tag");
                }
                None
            }
        }
    }
}
