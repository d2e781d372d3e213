use crate::config::Mode;
use crate::error::TResult;
use crate::history::RideHistory;
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory layout under the data directory
#[derive(Debug, Clone)]
pub struct RidePaths {
    /// Files of the ride being recorded
    pub current: PathBuf,
    /// Finalized rides waiting for upload
    pub unsent: PathBuf,
    pub sent: PathBuf,
    /// Research-mode full IMU recordings
    pub research: PathBuf,
    pub history: PathBuf,
    pub status: PathBuf,
}

impl RidePaths {
    pub fn new(data_dir: &Path) -> Self {
        let rides = data_dir.join("rides");
        RidePaths {
            current: rides.join("current"),
            unsent: rides.join("unsent"),
            sent: rides.join("sent"),
            research: rides.join("imuComplete"),
            history: data_dir.join("rideHistory.json"),
            status: data_dir.join("status.json"),
        }
    }

    /// Every directory that may hold ride files, for history recovery
    pub fn ride_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.current.clone(),
            self.unsent.clone(),
            self.sent.clone(),
            self.research.clone(),
        ]
    }
}

/// Create the ride directories and move the previous ride's files from
/// `current` into the upload queue. Returns how many files were moved.
pub fn prepare_ride_dirs(paths: &RidePaths) -> TResult<usize> {
    for dir in [&paths.current, &paths.unsent, &paths.sent, &paths.research] {
        fs::create_dir_all(dir)?;
    }

    let mut moved = 0;
    for entry in fs::read_dir(&paths.current)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        let target = paths.unsent.join(&name);
        match fs::rename(entry.path(), &target) {
            Ok(()) => moved += 1,
            Err(e) => error!("failed to queue {} for upload: {}", entry.path().display(), e),
        }
    }
    info!("queued {} file(s) from previous rides for upload", moved);
    Ok(moved)
}

/// One ride: its index, mode and the files it writes
#[derive(Debug, Clone)]
pub struct RideSession {
    pub index: u32,
    /// Index of the research recording, present in research mode only
    pub research_index: Option<u32>,
    pub mode: Mode,
    pub gps_log: PathBuf,
    pub crash_log: PathBuf,
    pub research_log: Option<PathBuf>,
}

impl RideSession {
    pub fn start(history: RideHistory, mode: Mode, paths: &RidePaths) -> Self {
        let index = history.next_ride();
        let name = format!("ride{}", index);
        let research_index = match mode {
            Mode::Research => Some(history.next_research_ride()),
            Mode::Normal => None,
        };
        let research_log =
            research_index.map(|r| paths.research.join(format!("ride{}_imuComplete.csv", r)));

        RideSession {
            index,
            research_index,
            mode,
            gps_log: paths.current.join(format!("{}.csv", name)),
            crash_log: paths.current.join(format!("{}_imu.csv", name)),
            research_log,
        }
    }

    pub fn name(&self) -> String {
        format!("ride{}", self.index)
    }
}
