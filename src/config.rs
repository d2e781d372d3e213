use crate::error::{TResult, TrackerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sampling mode for a ride
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Rollover detection and alerts; IMU samples only kept in the ring
    Normal,
    /// Every IMU sample logged, no alerts
    Research,
}

/// Device configuration, built once at startup and shared by reference.
///
/// Every field has a default so a partial JSON file (or none at all) works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// z acceleration at the cone apex (m/s^2)
    pub min_accel: f64,
    /// z acceleration at the cone base (m/s^2)
    pub max_accel: f64,
    /// Widens the cone
    pub sensitivity: f64,
    /// Seconds the vehicle must stay rolled before the alert fires
    pub crash_threshold: u32,
    pub panic_gpio: u32,
    /// "0" routes the alert to the monitoring service, otherwise a phone number
    pub alert_destination: String,
    pub device_id: String,
    pub gps_period_secs: f64,
    pub imu_period_secs: f64,
    pub mode: Mode,
    pub buffer_capacity: usize,
    pub upload_backoff_secs: f64,
    pub alert_max_attempts: u32,
    pub gps_collection: String,
    pub imu_collection: String,
    pub status_period_secs: f64,
    pub data_dir: PathBuf,
    /// Appended to instead of stderr when set
    pub error_log: Option<PathBuf>,
    pub firestore_project: Option<String>,
    pub firestore_token: Option<String>,
    pub gps_device: PathBuf,
    pub gps_baud: u32,
    /// Longest a GPS read may block the sampling loop
    pub gps_timeout_secs: f64,
    pub imu_command: Option<String>,
    pub modem_device: PathBuf,
    pub modem_baud: u32,
    /// Per-response limit while talking to the modem
    pub modem_timeout_secs: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            min_accel: -11.0,
            max_accel: -1.0,
            sensitivity: 2.0,
            crash_threshold: 10,
            panic_gpio: 23,
            alert_destination: "0".to_string(),
            device_id: "default_device".to_string(),
            gps_period_secs: 15.0,
            imu_period_secs: 1.0,
            mode: Mode::Normal,
            buffer_capacity: 60,
            upload_backoff_secs: 10.0,
            alert_max_attempts: 5,
            gps_collection: "ridehistory".to_string(),
            imu_collection: "imuhistory".to_string(),
            status_period_secs: 2.0,
            data_dir: PathBuf::from("data"),
            error_log: None,
            firestore_project: None,
            firestore_token: None,
            gps_device: PathBuf::from("/dev/ttyS0"),
            gps_baud: 9600,
            gps_timeout_secs: 1.0,
            imu_command: None,
            modem_device: PathBuf::from("/dev/ttyUSB0"),
            modem_baud: 19200,
            modem_timeout_secs: 10.0,
        }
    }
}

impl TrackerConfig {
    /// Load from a JSON file and validate
    pub fn load(path: &Path) -> TResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: TrackerConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TResult<()> {
        if !(self.min_accel < self.max_accel) {
            return Err(TrackerError::Config(format!(
                "min_accel ({}) must be below max_accel ({})",
                self.min_accel, self.max_accel
            )));
        }
        if self.crash_threshold == 0 {
            return Err(TrackerError::Config("crash_threshold must be at least 1".into()));
        }
        if self.gps_period_secs <= 0.0 || self.imu_period_secs <= 0.0 {
            return Err(TrackerError::Config("sampling periods must be positive".into()));
        }
        if self.buffer_capacity == 0 {
            return Err(TrackerError::Config("buffer_capacity must be at least 1".into()));
        }
        if self.upload_backoff_secs < 0.0 || self.status_period_secs <= 0.0 {
            return Err(TrackerError::Config("backoff and status periods must be positive".into()));
        }
        if self.gps_timeout_secs <= 0.0 || self.modem_timeout_secs <= 0.0 {
            return Err(TrackerError::Config("serial timeouts must be positive".into()));
        }
        if self.gps_baud == 0 || self.modem_baud == 0 {
            return Err(TrackerError::Config("baud rates must be non-zero".into()));
        }
        Ok(())
    }

    pub fn gps_period(&self) -> Duration {
        Duration::from_secs_f64(self.gps_period_secs)
    }

    pub fn imu_period(&self) -> Duration {
        Duration::from_secs_f64(self.imu_period_secs)
    }

    pub fn upload_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.upload_backoff_secs)
    }

    pub fn status_period(&self) -> Duration {
        Duration::from_secs_f64(self.status_period_secs)
    }

    pub fn gps_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.gps_timeout_secs)
    }

    pub fn modem_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.modem_timeout_secs)
    }
}
