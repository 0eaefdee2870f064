//! The greedy priority-heuristic power allocator (`SPEC_FULL.md` §4.2),
//! grounded on `_calculate_power_requirements` in
//! `examples/original_source/v2g_controller_component/v2g_controller_component.py`.

use std::cmp::Ordering;

use crate::types::{EpochWindow, PowerInfo, StationData, UserRecord};

/// Users whose occupancy window fully contains the current epoch
/// (`SPEC_FULL.md` §4.2 step 2, glossary: "Connected user").
pub fn connected_users<'a>(users: &'a [UserRecord], epoch: &EpochWindow) -> Vec<&'a UserRecord> {
    users
        .iter()
        .filter(|user| epoch.contained_in(user.arrival_time, user.target_time))
        .collect()
}

/// `(target_time asc, required_energy desc, user_id asc)` — the scheduling
/// priority of §4.2 step 3. The `user_id` tie-break is this implementation's
/// choice of the "stable rule" the spec leaves unspecified.
fn priority_cmp(a: &&UserRecord, b: &&UserRecord) -> Ordering {
    a.target_time
        .cmp(&b.target_time)
        .then_with(|| {
            b.required_energy
                .partial_cmp(&a.required_energy)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.user_id.cmp(&b.user_id))
}

/// Builds one `PowerInfo` per station: a filled slot for stations with a
/// connected user (in priority order), then a vacant slot (`user_id = 0`)
/// for every station with none (`SPEC_FULL.md` §4.2 step 5). A user whose
/// station did not report `StationState` this epoch has no matching station
/// and is silently skipped, per the stated edge case.
pub fn power_info_list(stations: &[StationData], connected: &[&UserRecord]) -> Vec<PowerInfo> {
    let mut filled = Vec::new();
    let mut vacant = Vec::new();

    for station in stations {
        match connected
            .iter()
            .find(|user| user.station_id == station.station_id)
        {
            Some(user) => filled.push((*user, station)),
            None => vacant.push(PowerInfo::vacant(
                station.station_id.clone(),
                station.max_power,
            )),
        }
    }

    filled.sort_by(|(a, _), (b, _)| priority_cmp(a, b));

    let mut slots: Vec<PowerInfo> = filled
        .into_iter()
        .map(|(user, station)| PowerInfo {
            user_id: user.user_id,
            station_id: station.station_id.clone(),
            station_max_power: station.max_power,
            car_max_power: user.car_max_power,
            state_of_charge: user.state_of_charge,
            target_state_of_charge: user.target_state_of_charge,
            required_energy: user.required_energy,
            target_time: Some(user.target_time),
        })
        .collect();
    slots.extend(vacant);
    slots
}

/// Greedy allocation (`SPEC_FULL.md` §4.2 step 4): walks `slots` in order,
/// handing each connected user the largest power it can take without
/// exceeding its station cap, its car cap, the remaining grid capacity, or
/// what it still needs this epoch. Returns one power value per slot, same
/// order as the input. `capacity <= 0` or `epoch_seconds <= 0` yields all
/// zeros (explicit edge cases, §4.2).
pub fn allocate(slots: &[PowerInfo], capacity: f64, epoch_seconds: i64) -> Vec<f64> {
    if capacity <= 0.0 || epoch_seconds <= 0 {
        return vec![0.0; slots.len()];
    }

    let epoch_hours = epoch_seconds as f64 / 3600.0;
    let mut used = 0.0;
    let mut powers = Vec::with_capacity(slots.len());

    for slot in slots {
        let wants_power = !slot.is_vacant() && slot.target_state_of_charge > slot.state_of_charge;
        let power = if wants_power && used < capacity {
            let p = slot
                .station_max_power
                .min(slot.car_max_power)
                .min(capacity - used)
                .min(slot.required_energy / epoch_hours)
                .max(0.0);
            used += p;
            p
        } else {
            0.0
        };
        powers.push(power);
    }

    powers
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn t(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, min, 0).unwrap()
    }

    fn user(id: u64, target_time: DateTime<Utc>, required_energy: f64) -> UserRecord {
        UserRecord {
            user_id: id,
            user_name: format!("user-{id}"),
            station_id: format!("station-{id}"),
            state_of_charge: 20.0,
            car_battery_capacity: 40.0,
            car_model: "Model".into(),
            car_max_power: 50.0,
            target_state_of_charge: 80.0,
            required_energy,
            arrival_time: t(0, 0),
            target_time,
            discharge: false,
        }
    }

    fn station(id: &str, max_power: f64) -> StationData {
        StationData {
            station_id: id.into(),
            max_power,
            charging_cost: 0.2,
            compensation_amount: 0.1,
        }
    }

    /// Scenario 1 of `SPEC_FULL.md` §8: single user, ample power.
    #[test]
    fn single_user_ample_power_gets_full_station_cap() {
        let mut u = user(1, t(18, 0), 0.0);
        u.car_max_power = 22.0;
        u.recompute_required_energy();
        let stations = vec![station("station-1", 22.0)];
        let connected = vec![&u];
        let slots = power_info_list(&stations, &connected);
        let powers = allocate(&slots, 50.0, 3600);
        assert_eq!(powers.len(), 1);
        assert!((powers[0] - 22.0).abs() < 1e-9);
    }

    /// Scenario 2: contended power, earliest deadline wins.
    #[test]
    fn earliest_deadline_wins_contended_capacity() {
        let a = user(1, t(9, 0), 10.0);
        let b = user(2, t(10, 0), 20.0);
        let stations = vec![station("station-1", 50.0), station("station-2", 50.0)];
        let connected = vec![&a, &b];
        let slots = power_info_list(&stations, &connected);
        let powers = allocate(&slots, 10.0, 3600);
        assert_eq!(slots[0].user_id, 1);
        assert!((powers[0] - 10.0).abs() < 1e-9);
        assert_eq!(slots[1].user_id, 2);
        assert_eq!(powers[1], 0.0);
    }

    /// Scenario 3: tie on deadline, higher demand wins priority order.
    #[test]
    fn tie_on_deadline_orders_by_required_energy_desc() {
        let a = user(1, t(12, 0), 10.0);
        let b = user(2, t(12, 0), 15.0);
        let stations = vec![station("station-1", 50.0), station("station-2", 50.0)];
        let connected = vec![&a, &b];
        let slots = power_info_list(&stations, &connected);
        assert_eq!(slots[0].user_id, 2, "higher required_energy orders first");
        assert_eq!(slots[1].user_id, 1);
    }

    /// Scenario 4: not connected, slot is vacant with power 0.
    #[test]
    fn unconnected_user_yields_vacant_slot() {
        let mut u = user(1, t(18, 0), 10.0);
        u.arrival_time = t(19, 0);
        let stations = vec![station("station-1", 50.0)];
        let epoch = EpochWindow::new(1, t(9, 0), t(10, 0));
        let connected = connected_users(std::slice::from_ref(&u), &epoch);
        assert!(connected.is_empty());
        let slots = power_info_list(&stations, &connected);
        assert!(slots[0].is_vacant());
        let powers = allocate(&slots, 50.0, 3600);
        assert_eq!(powers[0], 0.0);
    }

    #[test]
    fn zero_or_negative_capacity_allocates_nothing() {
        let u = user(1, t(18, 0), 10.0);
        let stations = vec![station("station-1", 50.0)];
        let connected = vec![&u];
        let slots = power_info_list(&stations, &connected);
        assert_eq!(allocate(&slots, 0.0, 3600), vec![0.0]);
        assert_eq!(allocate(&slots, -5.0, 3600), vec![0.0]);
    }

    #[test]
    fn non_positive_epoch_seconds_allocates_nothing() {
        let u = user(1, t(18, 0), 10.0);
        let stations = vec![station("station-1", 50.0)];
        let connected = vec![&u];
        let slots = power_info_list(&stations, &connected);
        assert_eq!(allocate(&slots, 50.0, 0), vec![0.0]);
    }

    #[test]
    fn user_whose_station_is_absent_is_skipped() {
        let u = user(1, t(18, 0), 10.0);
        let stations = vec![station("some-other-station", 50.0)];
        let connected = vec![&u];
        let slots = power_info_list(&stations, &connected);
        assert_eq!(slots.len(), 1);
        assert!(slots[0].is_vacant());
    }

    #[test]
    fn used_capacity_is_never_exceeded_across_slots() {
        let a = user(1, t(9, 0), 100.0);
        let b = user(2, t(9, 0), 100.0);
        let stations = vec![station("station-1", 50.0), station("station-2", 50.0)];
        let connected = vec![&a, &b];
        let slots = power_info_list(&stations, &connected);
        let powers = allocate(&slots, 10.0, 3600);
        assert!(powers.iter().sum::<f64>() <= 10.0 + 1e-9);
    }
}
