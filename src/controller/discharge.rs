//! The discharge-trigger policy (`SPEC_FULL.md` §4.3), grounded on
//! `_is_grid_under_load` / `_check_user_discharge_need` in
//! `examples/original_source/v2g_controller_component/v2g_controller_component.py`.

use crate::grid_load::GridLoadTable;
use crate::types::{StationData, UserPreference};

/// Whether the grid is under load at `hour` (UTC), per the static table. A
/// missing hour defaults to `false` (`SPEC_FULL.md` §7).
pub fn grid_under_load(table: &GridLoadTable, hour: u32) -> bool {
    table.is_under_load(hour)
}

/// The four conditions of `SPEC_FULL.md` §4.3, evaluated fresh every epoch
/// (the flag itself is reset to `false` at epoch start — see
/// `controller/mod.rs::start_epoch` and DESIGN.md Open Question 5).
pub fn should_discharge(
    preference: Option<&UserPreference>,
    grid_is_under_load: bool,
    station: Option<&StationData>,
) -> bool {
    let (Some(preference), Some(station)) = (preference, station) else {
        return false;
    };
    grid_is_under_load && preference.discharge_price_threshold <= station.compensation_amount
}
