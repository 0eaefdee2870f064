//! Loads `grid_load_daily.csv` (`SPEC_FULL.md` §6) into the static hourly
//! `grid_under_load` table the discharge policy (`controller/discharge.rs`)
//! consults.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::LoadError;

#[derive(Debug, Deserialize)]
struct GridLoadRecord {
    time: String,
    grid_on_load: u8,
}

/// Keyed by the literal `HH:00` string from the CSV, per `SPEC_FULL.md` §4.3
/// ("a static hourly table keyed by `HH:00` in UTC").
#[derive(Debug, Clone, Default)]
pub struct GridLoadTable {
    by_hour: HashMap<String, bool>,
}

impl GridLoadTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Per `SPEC_FULL.md` §7 ("Config/data-file read errors... logged;
    /// `grid_under_load` defaults to false"), a missing hour in an otherwise
    /// loaded table is not an error, just a `false`.
    pub fn is_under_load(&self, hour: u32) -> bool {
        let key = format!("{hour:02}:00");
        self.by_hour.get(&key).copied().unwrap_or(false)
    }
}

pub fn load_grid_load_table(path: impl AsRef<Path>) -> Result<GridLoadTable, LoadError> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut by_hour = HashMap::new();
    for result in reader.deserialize::<GridLoadRecord>() {
        let record = result?;
        by_hour.insert(record.time, record.grid_on_load != 0);
    }
    Ok(GridLoadTable { by_hour })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp_csv(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "v2g-sim-test-gridload-{}-{}.csv",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reads_boolean_load_flags_per_hour() {
        let path = write_temp_csv("time,grid_on_load\n09:00,1\n10:00,0\n");
        let table = load_grid_load_table(&path).unwrap();
        assert!(table.is_under_load(9));
        assert!(!table.is_under_load(10));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_hour_defaults_to_not_under_load() {
        let table = GridLoadTable::empty();
        assert!(!table.is_under_load(14));
    }
}
