//! Bus topic names (`SPEC_FULL.md` §6). Defaults are the literal topic
//! strings the original components used; each is overridable by an
//! environment variable so a deployment can rename topics without a rebuild,
//! the same override-over-default layering the rest of the configuration
//! surface (`config.rs`) uses for scenario parameters.

pub const CAR_METADATA: &str = "Init.User.CarMetadata";
pub const USER_STATE: &str = "User.UserState";
pub const CAR_STATE: &str = "User.CarState";
pub const POWER_DISCHARGE_CAR_TO_STATION: &str = "PowerDischargeCarToStation";
pub const STATION_STATE: &str = "StationStateTopic";
pub const POWER_OUTPUT: &str = "PowerOutputTopic";
pub const POWER_DISCHARGE_STATION_TO_GRID: &str = "PowerDischargeStationToGrid";
pub const TOTAL_CHARGING_COST: &str = "TotalChargingCost";
pub const GRID_STATE: &str = "GridState";
pub const POWER_REQUIREMENT: &str = "PowerRequirementTopic";
pub const GRID_LOAD_STATUS: &str = "GridLoadStatus";
pub const USER_PREFERENCE: &str = "UserPreference";
pub const ERROR: &str = "Error";

const ENV_PREFIX: &str = "V2G_TOPIC_";

/// Resolves a topic name, preferring `V2G_TOPIC_<NAME>` from the environment
/// over the compiled-in default. `name` is the upper-snake-case constant name
/// (e.g. `"GRID_STATE"`), not the topic string itself.
pub fn resolve(name: &str, default: &'static str) -> String {
    std::env::var(format!("{ENV_PREFIX}{name}")).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_falls_back_to_default_when_unset() {
        assert_eq!(resolve("DOES_NOT_EXIST_XYZ", GRID_STATE), GRID_STATE);
    }

    #[test]
    fn resolve_prefers_environment_override() {
        unsafe {
            std::env::set_var("V2G_TOPIC_TEST_TOPIC", "Overridden");
        }
        assert_eq!(resolve("TEST_TOPIC", GRID_STATE), "Overridden");
        unsafe {
            std::env::remove_var("V2G_TOPIC_TEST_TOPIC");
        }
    }
}
