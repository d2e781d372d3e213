use log::{info, warn};
use std::time::{Duration, Instant};

/// Tracks read health for one sensor
#[derive(Clone, Debug)]
pub struct SensorHealth {
    pub name: String,
    last_success: Instant,
    silence_threshold: Duration,
    consecutive_failures: u32,
    reported_silent: bool,
}

impl SensorHealth {
    pub fn new(name: &str, silence_threshold: Duration, now: Instant) -> Self {
        SensorHealth {
            name: name.to_string(),
            last_success: now,
            silence_threshold,
            consecutive_failures: 0,
            reported_silent: false,
        }
    }

    pub fn record_success(&mut self, now: Instant) {
        if self.reported_silent {
            info!(
                "[HEALTH] {} recovered after {} failed read(s)",
                self.name, self.consecutive_failures
            );
        }
        self.last_success = now;
        self.consecutive_failures = 0;
        self.reported_silent = false;
    }

    /// Warns once per silent stretch
    pub fn record_failure(&mut self, now: Instant) {
        self.consecutive_failures += 1;
        if self.is_silent(now) && !self.reported_silent {
            warn!(
                "[HEALTH] {} SILENT for {:.1}s ({} consecutive failed reads)",
                self.name,
                now.duration_since(self.last_success).as_secs_f64(),
                self.consecutive_failures
            );
            self.reported_silent = true;
        }
    }

    pub fn is_silent(&self, now: Instant) -> bool {
        now.duration_since(self.last_success) > self.silence_threshold
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

/// Health of both sensors owned by the scheduler
#[derive(Clone, Debug)]
pub struct HealthMonitor {
    pub imu: SensorHealth,
    pub gps: SensorHealth,
}

impl HealthMonitor {
    /// Silence thresholds scale with each sensor's sampling period
    pub fn new(imu_period: Duration, gps_period: Duration, now: Instant) -> Self {
        HealthMonitor {
            imu: SensorHealth::new("IMU", (imu_period * 5).max(Duration::from_secs(5)), now),
            gps: SensorHealth::new("GPS", (gps_period * 4).max(Duration::from_secs(30)), now),
        }
    }

    pub fn format_status(&self, now: Instant) -> String {
        let describe = |h: &SensorHealth| {
            if h.is_silent(now) {
                format!("silent ({} failures)", h.consecutive_failures)
            } else {
                "ok".to_string()
            }
        };
        format!("Health: IMU {} | GPS {}", describe(&self.imu), describe(&self.gps))
    }
}
