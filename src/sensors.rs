use crate::error::SensorError;
use crate::nmea::NmeaGps;
use crate::samples::{now_local, GpsFix, GpsReading, ImuReading};
use log::debug;
use serialport::SerialPort;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// GPS and inertial acquisition
pub trait SampleSource {
    fn read_inertial(&mut self) -> Result<ImuReading, SensorError>;
    fn read_gps_fix(&mut self) -> Result<GpsReading, SensorError>;
}

/// Manual panic button
pub trait PanicInput {
    fn is_active(&mut self) -> bool;
}

/// Panic input for devices without a key fob
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPanicInput;

impl PanicInput for NoPanicInput {
    fn is_active(&mut self) -> bool {
        false
    }
}

/// Key fob wired to a GPIO exported through sysfs
#[derive(Debug, Clone)]
pub struct SysfsPanicInput {
    value_path: PathBuf,
}

impl SysfsPanicInput {
    pub fn new(channel: u32) -> Self {
        Self::with_path(format!("/sys/class/gpio/gpio{}/value", channel))
    }

    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            value_path: path.as_ref().to_path_buf(),
        }
    }
}

impl PanicInput for SysfsPanicInput {
    fn is_active(&mut self) -> bool {
        match fs::read_to_string(&self.value_path) {
            Ok(value) => value.trim() == "1",
            Err(e) => {
                debug!("panic input {} unreadable: {}", self.value_path.display(), e);
                false
            }
        }
    }
}

/// GPS receiver on a serial device plus an IMU read through an external command
pub struct DeviceSource {
    gps: NmeaGps<BufReader<Box<dyn SerialPort>>>,
    imu_command: String,
}

impl DeviceSource {
    /// Reads from the receiver block for at most `timeout`, after which the
    /// GPS tick reports a timeout and the loop moves on.
    pub fn open(gps_device: &Path, baud: u32, timeout: Duration, imu_command: &str) -> Result<Self, SensorError> {
        let port = serialport::new(gps_device.to_string_lossy(), baud)
            .timeout(timeout)
            .open()
            .map_err(|e| SensorError::Unavailable("GPS".into(), format!("{}: {}", gps_device.display(), e)))?;
        Ok(Self {
            gps: NmeaGps::new(BufReader::new(port)),
            imu_command: imu_command.to_string(),
        })
    }
}

impl SampleSource for DeviceSource {
    fn read_inertial(&mut self) -> Result<ImuReading, SensorError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.imu_command)
            .output()
            .map_err(|e| SensorError::Unavailable("IMU".into(), e.to_string()))?;
        if !output.status.success() {
            return Err(SensorError::Unavailable(
                "IMU".into(),
                format!("command exited with {}", output.status),
            ));
        }
        parse_imu_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn read_gps_fix(&mut self) -> Result<GpsReading, SensorError> {
        self.gps.read_fix()
    }
}

/// `ax,ay,az,gx,gy,gz` on the first line; an empty line means no sample yet
fn parse_imu_output(output: &str) -> Result<ImuReading, SensorError> {
    let line = output.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return Err(SensorError::Timeout("IMU".into()));
    }

    let values: Vec<f64> = line
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| SensorError::Unavailable("IMU".into(), format!("bad output {:?}: {}", line, e)))?;
    if values.len() != 6 {
        return Err(SensorError::Unavailable(
            "IMU".into(),
            format!("expected 6 values, got {}", values.len()),
        ));
    }
    Ok(ImuReading::new(
        [values[0], values[1], values[2]],
        [values[3], values[4], values[5]],
    ))
}

/// Synthetic sensors for bench runs: a vehicle driving upright that can be
/// scripted to lie on its roof for a window of IMU reads.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    imu_reads: u64,
    gps_reads: u64,
    /// GPS reads before the first fix
    fix_after: u64,
    roll_window: Option<(u64, u64)>,
}

impl SimulatedSource {
    pub fn new() -> Self {
        Self {
            imu_reads: 0,
            gps_reads: 0,
            fix_after: 2,
            roll_window: None,
        }
    }

    /// IMU reads in `start..end` report an upside-down vehicle
    pub fn with_roll(mut self, start: u64, end: u64) -> Self {
        self.roll_window = Some((start, end));
        self
    }

    pub fn with_fix_after(mut self, reads: u64) -> Self {
        self.fix_after = reads;
        self
    }

    fn rolled(&self, read: u64) -> bool {
        self.roll_window
            .map(|(start, end)| read >= start && read < end)
            .unwrap_or(false)
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for SimulatedSource {
    fn read_inertial(&mut self) -> Result<ImuReading, SensorError> {
        use std::f64::consts::PI;
        let read = self.imu_reads;
        self.imu_reads += 1;
        let t = read as f64 * 0.1;

        let reading = if self.rolled(read) {
            ImuReading::new(
                [0.2 + (t * PI).sin() * 0.05, -0.1, -9.6],
                [0.0, 0.0, 0.0],
            )
        } else {
            ImuReading::new(
                [(t * 2.0 * PI).sin() * 0.5, (t * 2.0 * PI).cos() * 0.3, 9.81 + (t * PI).sin() * 0.1],
                [(t * 0.5).sin() * 0.05, (t * 0.3).cos() * 0.03, (t * 1.0).sin() * 0.1],
            )
        };
        Ok(reading)
    }

    fn read_gps_fix(&mut self) -> Result<GpsReading, SensorError> {
        let read = self.gps_reads;
        self.gps_reads += 1;
        if read < self.fix_after {
            return Ok(GpsReading::NoFix);
        }

        let seq = (read - self.fix_after) as f64;
        Ok(GpsReading::Fix(GpsFix::new(
            now_local(),
            44.9778 + seq * 0.00001,
            -93.2650 + seq * 0.00001,
            40.0 + (seq * 0.5).sin() * 5.0,
            260.0,
            9,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollover::RolloverDetector;
    use crate::test_support::scratch_dir;

    #[test]
    fn test_parse_imu_output() {
        let reading = parse_imu_output("0.1, -0.2, 9.8,0.01,0.02,0.03\n").unwrap();
        assert_eq!(reading.accel, [0.1, -0.2, 9.8]);
        assert_eq!(reading.gyro, [0.01, 0.02, 0.03]);
    }

    #[test]
    fn test_parse_imu_output_errors() {
        assert!(matches!(parse_imu_output(""), Err(SensorError::Timeout(_))));
        assert!(matches!(parse_imu_output("1,2,3"), Err(SensorError::Unavailable(..))));
        assert!(matches!(parse_imu_output("1,2,x,4,5,6"), Err(SensorError::Unavailable(..))));
    }

    #[test]
    fn test_simulated_roll_window_classifies() {
        let detector = RolloverDetector::new(-11.0, -1.0, 2.0);
        let mut source = SimulatedSource::new().with_roll(2, 4);

        let rolled: Vec<bool> = (0..6)
            .map(|_| detector.classify(source.read_inertial().unwrap().accel))
            .collect();
        assert_eq!(rolled, vec![false, false, true, true, false, false]);
    }

    #[test]
    fn test_simulated_gps_acquires_fix() {
        let mut source = SimulatedSource::new().with_fix_after(1);
        assert_eq!(source.read_gps_fix().unwrap(), GpsReading::NoFix);
        assert!(source.read_gps_fix().unwrap().into_fix().is_some());
    }

    #[test]
    fn test_sysfs_panic_input() {
        let dir = scratch_dir("panic_gpio");
        let path = dir.join("value");
        let mut input = SysfsPanicInput::with_path(&path);

        assert!(!input.is_active());
        fs::write(&path, "1\n").unwrap();
        assert!(input.is_active());
        fs::write(&path, "0\n").unwrap();
        assert!(!input.is_active());
    }
}
