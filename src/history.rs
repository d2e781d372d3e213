use crate::error::TResult;
use crate::ride_log::{ride_index_from_name, strip_nul};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Durable ride numbering record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RideHistory {
    #[serde(rename = "lastRide")]
    pub last_ride: Option<u32>,
    #[serde(rename = "lastResearchRide")]
    pub last_research_ride: Option<u32>,
}

impl RideHistory {
    pub fn next_ride(&self) -> u32 {
        self.last_ride.map(|i| i + 1).unwrap_or(0)
    }

    pub fn next_research_ride(&self) -> u32 {
        self.last_research_ride.map(|i| i + 1).unwrap_or(0)
    }
}

/// File-backed ride history, rewritten in full on every change
#[derive(Debug, Clone)]
pub struct HistoryFile {
    path: PathBuf,
    history: RideHistory,
}

impl HistoryFile {
    /// Load the record. A missing file starts empty; an unreadable one is
    /// rebuilt from the highest ride index found in `ride_dirs`.
    pub fn open(path: &Path, ride_dirs: &[PathBuf]) -> TResult<Self> {
        let history = match fs::read(path) {
            Ok(raw) => match serde_json::from_slice::<RideHistory>(&strip_nul(&raw)) {
                Ok(history) => history,
                Err(e) => {
                    warn!("ride history {} unreadable ({}), rebuilding from ride files", path.display(), e);
                    recover_from_dirs(ride_dirs)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no ride history at {}, starting fresh", path.display());
                RideHistory::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(HistoryFile {
            path: path.to_path_buf(),
            history,
        })
    }

    pub fn get(&self) -> RideHistory {
        self.history
    }

    pub fn set_last_ride(&mut self, index: u32) -> TResult<()> {
        if self.history.last_ride == Some(index) {
            return Ok(());
        }
        self.history.last_ride = Some(index);
        self.save()
    }

    pub fn set_last_research_ride(&mut self, index: u32) -> TResult<()> {
        if self.history.last_research_ride == Some(index) {
            return Ok(());
        }
        self.history.last_research_ride = Some(index);
        self.save()
    }

    /// Write to a sibling temp file then rename over the record
    fn save(&self) -> TResult<()> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&self.history)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn recover_from_dirs(ride_dirs: &[PathBuf]) -> RideHistory {
    let mut history = RideHistory::default();
    for dir in ride_dirs {
        let Ok(entries) = fs::read_dir(dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(index) = ride_index_from_name(&name) else {
                continue;
            };
            let slot = if name.contains("_imuComplete") {
                &mut history.last_research_ride
            } else {
                &mut history.last_ride
            };
            *slot = Some(slot.map_or(index, |current| current.max(index)));
        }
    }
    warn!("recovered ride history: {:?}", history);
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scratch_dir;

    #[test]
    fn test_next_indices() {
        let empty = RideHistory::default();
        assert_eq!(empty.next_ride(), 0);
        assert_eq!(empty.next_research_ride(), 0);

        let history = RideHistory {
            last_ride: Some(4),
            last_research_ride: Some(9),
        };
        assert_eq!(history.next_ride(), 5);
        assert_eq!(history.next_research_ride(), 10);
    }

    #[test]
    fn test_json_field_names() {
        let history: RideHistory = serde_json::from_str(r#"{"lastRide": 3, "lastResearchRide": null}"#).unwrap();
        assert_eq!(history.last_ride, Some(3));
        assert_eq!(history.last_research_ride, None);
    }

    #[test]
    fn test_missing_file_starts_empty_and_persists_updates() {
        let dir = scratch_dir("history_missing");
        let path = dir.join("rideHistory.json");

        let mut file = HistoryFile::open(&path, &[]).unwrap();
        assert_eq!(file.get(), RideHistory::default());

        file.set_last_ride(2).unwrap();
        file.set_last_research_ride(0).unwrap();

        let reopened = HistoryFile::open(&path, &[]).unwrap();
        assert_eq!(reopened.get().last_ride, Some(2));
        assert_eq!(reopened.get().last_research_ride, Some(0));
    }

    #[test]
    fn test_nul_padded_record_still_loads() {
        let dir = scratch_dir("history_nul");
        let path = dir.join("rideHistory.json");
        fs::write(&path, b"{\"lastRide\": 7, \"lastResearchRide\": 1}\x00\x00\x00").unwrap();

        let file = HistoryFile::open(&path, &[]).unwrap();
        assert_eq!(file.get().last_ride, Some(7));
    }

    #[test]
    fn test_corrupt_record_recovers_from_ride_files() {
        let dir = scratch_dir("history_corrupt");
        let rides = dir.join("unsent");
        let research = dir.join("imuComplete");
        fs::create_dir_all(&rides).unwrap();
        fs::create_dir_all(&research).unwrap();
        for name in ["ride3.csv", "ride11_imu.csv", "ride5.csv"] {
            fs::write(rides.join(name), "x").unwrap();
        }
        fs::write(research.join("ride2_imuComplete.csv"), "x").unwrap();

        let path = dir.join("rideHistory.json");
        fs::write(&path, b"{\"lastRi").unwrap();

        let file = HistoryFile::open(&path, &[rides, research]).unwrap();
        assert_eq!(file.get().last_ride, Some(11));
        assert_eq!(file.get().last_research_ride, Some(2));
    }
}
