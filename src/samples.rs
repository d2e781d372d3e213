use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Timestamp layout used in every ride log
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
/// Accepts timestamps with or without the fractional part
pub const TIME_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Raw accelerometer/gyroscope reading as delivered by a sample source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuReading {
    pub accel: [f64; 3],
    pub gyro: [f64; 3],
}

impl ImuReading {
    pub fn new(accel: [f64; 3], gyro: [f64; 3]) -> Self {
        Self { accel, gyro }
    }
}

/// One classified inertial sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InertialSample {
    pub timestamp: NaiveDateTime,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub gyro_x: f64,
    pub gyro_y: f64,
    pub gyro_z: f64,
    /// Instantaneous cone classification
    pub in_cone: bool,
    /// Set only on the sample that triggered a crash response
    pub rollover: bool,
}

impl InertialSample {
    pub fn new(reading: ImuReading, timestamp: NaiveDateTime, in_cone: bool) -> Self {
        Self {
            timestamp,
            accel_x: round5(reading.accel[0]),
            accel_y: round5(reading.accel[1]),
            accel_z: round5(reading.accel[2]),
            gyro_x: round5(reading.gyro[0]),
            gyro_y: round5(reading.gyro[1]),
            gyro_z: round5(reading.gyro[2]),
            in_cone,
            rollover: false,
        }
    }
}

/// GPS position fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kph: f64,
    pub altitude_m: f64,
    pub satellites: u32,
}

impl GpsFix {
    pub fn new(
        timestamp: NaiveDateTime,
        latitude: f64,
        longitude: f64,
        speed_kph: f64,
        altitude_m: f64,
        satellites: u32,
    ) -> Self {
        Self {
            timestamp,
            latitude: round5(latitude),
            longitude: round5(longitude),
            speed_kph: round5(speed_kph),
            altitude_m: round5(altitude_m),
            satellites,
        }
    }
}

/// Result of polling the GPS receiver
#[derive(Debug, Clone, PartialEq)]
pub enum GpsReading {
    Fix(GpsFix),
    /// Receiver is alive but has no position yet
    NoFix,
}

impl GpsReading {
    pub fn into_fix(self) -> Option<GpsFix> {
        match self {
            GpsReading::Fix(fix) => Some(fix),
            GpsReading::NoFix => None,
        }
    }
}

pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}
