//! Loads `v2g_user_preferences.csv` (`SPEC_FULL.md` §6) into a lookup table
//! the Controller consults on `CarState`/discharge evaluation. Mirrors the
//! teacher's `csv`-crate usage in `io/export.rs`, applied to reading rather
//! than writing.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::LoadError;
use crate::types::UserPreference;

#[derive(Debug, Deserialize)]
struct PreferenceRecord {
    #[serde(rename = "UserID")]
    user_id: u64,
    #[serde(rename = "MinimumSOC")]
    minimum_soc: f64,
    #[serde(rename = "MaxCostForCharging")]
    max_cost_for_charging: f64,
    #[serde(rename = "DischargePriceThreshold")]
    discharge_price_threshold: f64,
    #[serde(rename = "MaximumSOC", default)]
    maximum_soc: Option<f64>,
}

pub type PreferenceTable = HashMap<u64, UserPreference>;

/// Reads the preference CSV. A missing file or a row that doesn't parse is an
/// error for the caller to decide how to handle at startup; per-user absence
/// from an otherwise valid table is not an error (`SPEC_FULL.md` §7: the
/// Controller falls back to a default target SoC for users missing a row).
pub fn load_preferences(path: impl AsRef<Path>) -> Result<PreferenceTable, LoadError> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;

    let mut table = PreferenceTable::new();
    for result in reader.deserialize::<PreferenceRecord>() {
        let record = result?;
        table.insert(
            record.user_id,
            UserPreference {
                minimum_soc: record.minimum_soc,
                max_cost_for_charging: record.max_cost_for_charging,
                discharge_price_threshold: record.discharge_price_threshold,
                maximum_soc: record.maximum_soc,
            },
        );
    }
    Ok(table)
}
