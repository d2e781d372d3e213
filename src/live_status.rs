use crate::config::Mode;
use crate::samples::GpsFix;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Snapshot of the sampling loop for companion tooling
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub ride_index: u32,
    pub mode: Mode,
    pub roll_count: u32,
    pub roll_threshold: u32,
    pub buffered_samples: usize,
    pub imu_ticks: u64,
    pub gps_ticks: u64,
    pub gps_rows: u64,
    pub placeholder_rows: u64,
    pub crash_responses: u64,
    pub latest_fix: Option<GpsFix>,
    pub health: String,
}

impl LiveStatus {
    pub fn new(ride_index: u32, mode: Mode, roll_threshold: u32) -> Self {
        Self {
            timestamp: current_timestamp(),
            ride_index,
            mode,
            roll_count: 0,
            roll_threshold,
            buffered_samples: 0,
            imu_ticks: 0,
            gps_ticks: 0,
            gps_rows: 0,
            placeholder_rows: 0,
            crash_responses: 0,
            latest_fix: None,
            health: String::new(),
        }
    }

    /// Written beside the final path and renamed so readers never see half a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
