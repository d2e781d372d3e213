#![allow(dead_code)]

use rollover_tracker_rs::nmea::NmeaGps;
use rollover_tracker_rs::samples::now_local;
use rollover_tracker_rs::{
    AlertTransmitter, GpsFix, GpsReading, ImuReading, PanicInput, SampleSource, SensorError, TrackerConfig,
    TransportError,
};
use std::collections::VecDeque;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn scratch_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let dir = std::env::temp_dir().join(format!("rollover_it_{}_{}_{}", name, std::process::id(), nanos));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn test_config(data_dir: PathBuf) -> TrackerConfig {
    TrackerConfig {
        crash_threshold: 3,
        data_dir,
        ..TrackerConfig::default()
    }
}

pub const UPRIGHT: [f64; 3] = [0.1, 0.2, 9.81];
pub const ROLLED: [f64; 3] = [0.0, 0.0, -6.0];

pub fn fix() -> GpsFix {
    GpsFix::new(now_local(), 45.12345, -93.54321, 41.4848, 250.5, 7)
}

/// Plays back scripted readings, then repeats the last IMU reading
pub struct ScriptedSource {
    pub imu: VecDeque<Result<[f64; 3], SensorError>>,
    pub gps: VecDeque<Result<GpsReading, SensorError>>,
    last_accel: [f64; 3],
}

impl ScriptedSource {
    pub fn new(default_accel: [f64; 3]) -> Self {
        Self {
            imu: VecDeque::new(),
            gps: VecDeque::new(),
            last_accel: default_accel,
        }
    }

    pub fn with_gps(mut self, reading: Result<GpsReading, SensorError>) -> Self {
        self.gps.push_back(reading);
        self
    }
}

impl SampleSource for ScriptedSource {
    fn read_inertial(&mut self) -> Result<ImuReading, SensorError> {
        match self.imu.pop_front() {
            Some(Ok(accel)) => {
                self.last_accel = accel;
                Ok(ImuReading::new(accel, [0.0, 0.0, 0.0]))
            }
            Some(Err(e)) => Err(e),
            None => Ok(ImuReading::new(self.last_accel, [0.0, 0.0, 0.0])),
        }
    }

    fn read_gps_fix(&mut self) -> Result<GpsReading, SensorError> {
        self.gps.pop_front().unwrap_or(Ok(GpsReading::NoFix))
    }
}

/// Sensor that is gone for good
pub struct DeadSource;

impl SampleSource for DeadSource {
    fn read_inertial(&mut self) -> Result<ImuReading, SensorError> {
        Err(SensorError::Unavailable("IMU".into(), "bus error".into()))
    }

    fn read_gps_fix(&mut self) -> Result<GpsReading, SensorError> {
        Err(SensorError::Unavailable("GPS".into(), "no device".into()))
    }
}

/// IMU bus that drops out on every `every`th read, with no GPS fix
pub struct FaultingSource {
    every: u32,
    reads: u32,
}

impl FaultingSource {
    pub fn new(every: u32) -> Self {
        Self { every, reads: 0 }
    }
}

impl SampleSource for FaultingSource {
    fn read_inertial(&mut self) -> Result<ImuReading, SensorError> {
        self.reads += 1;
        if self.reads % self.every == 0 {
            return Err(SensorError::Unavailable("IMU".into(), "i2c bus reset".into()));
        }
        Ok(ImuReading::new(UPRIGHT, [0.0, 0.0, 0.0]))
    }

    fn read_gps_fix(&mut self) -> Result<GpsReading, SensorError> {
        Ok(GpsReading::NoFix)
    }
}

/// Serial line that never delivers a byte before its read timeout
pub struct SilentPort;

impl Read for SilentPort {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(ErrorKind::TimedOut, "Operation timed out"))
    }
}

/// Working IMU next to a GPS receiver that has gone quiet
pub struct SilentGpsSource {
    gps: NmeaGps<BufReader<SilentPort>>,
}

impl SilentGpsSource {
    pub fn new() -> Self {
        Self {
            gps: NmeaGps::new(BufReader::new(SilentPort)),
        }
    }
}

impl SampleSource for SilentGpsSource {
    fn read_inertial(&mut self) -> Result<ImuReading, SensorError> {
        Ok(ImuReading::new(UPRIGHT, [0.0, 0.0, 0.0]))
    }

    fn read_gps_fix(&mut self) -> Result<GpsReading, SensorError> {
        self.gps.read_fix()
    }
}

#[derive(Default)]
pub struct ScriptedPanic {
    pub presses: VecDeque<bool>,
}

impl PanicInput for ScriptedPanic {
    fn is_active(&mut self) -> bool {
        self.presses.pop_front().unwrap_or(false)
    }
}

#[derive(Default)]
pub struct RecordingTransmitter {
    pub sent: Vec<String>,
    pub failures_left: u32,
}

impl AlertTransmitter for RecordingTransmitter {
    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(TransportError::Send("no satellite".into()));
        }
        self.sent.push(text.to_string());
        Ok(())
    }
}
