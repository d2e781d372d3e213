//! Plain-text ride logs: one header row plus one row per sampling tick.

use crate::error::TResult;
use crate::samples::{GpsFix, InertialSample, TIME_FORMAT};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

pub const GPS_HEADER: &str = "time,lat,long,vel,alt,sats,accelX,accelY,accelZ,possibleRoll,rollover";
pub const IMU_HEADER: &str = "time,accelX,accelY,accelZ,gyroX,gyroY,gyroZ,possibleRoll,rollover";
const GPS_COLUMNS: usize = 11;

pub fn gps_row(fix: &GpsFix, imu: &InertialSample) -> String {
    format!(
        "{},{},{},{},{},{},{},{},{},{},{}",
        fix.timestamp.format(TIME_FORMAT),
        fix.latitude,
        fix.longitude,
        fix.speed_kph,
        fix.altitude_m,
        fix.satellites,
        imu.accel_x,
        imu.accel_y,
        imu.accel_z,
        imu.in_cone,
        imu.rollover
    )
}

/// Row written when a GPS tick produced no usable data
pub fn gps_placeholder_row() -> String {
    vec!["null"; GPS_COLUMNS].join(",")
}

pub fn imu_row(sample: &InertialSample) -> String {
    format!(
        "{},{},{},{},{},{},{},{},{}",
        sample.timestamp.format(TIME_FORMAT),
        sample.accel_x,
        sample.accel_y,
        sample.accel_z,
        sample.gyro_x,
        sample.gyro_y,
        sample.gyro_z,
        sample.in_cone,
        sample.rollover
    )
}

/// Append one row, writing the header first if the file is new
pub fn append_row(path: &Path, header: &str, row: &str) -> TResult<()> {
    let is_new = !path.exists();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if is_new {
        writeln!(file, "{}", header)?;
    }
    writeln!(file, "{}", row)?;
    Ok(())
}

/// Replace the file with a header and the given samples
pub fn write_imu_window<'a, I>(path: &Path, samples: I) -> TResult<usize>
where
    I: IntoIterator<Item = &'a InertialSample>,
{
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{}", IMU_HEADER)?;
    let mut count = 0;
    for sample in samples {
        writeln!(out, "{}", imu_row(sample))?;
        count += 1;
    }
    out.flush()?;
    Ok(count)
}

/// Drop NUL bytes left behind by a write torn by power loss
pub fn strip_nul(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().copied().filter(|b| *b != 0).collect()
}

/// Strip NUL bytes from a file in place. Returns the cleaned text.
pub fn sanitize_file(path: &Path) -> TResult<String> {
    let raw = fs::read(path)?;
    let cleaned = strip_nul(&raw);
    if cleaned.len() != raw.len() {
        fs::write(path, &cleaned)?;
    }
    Ok(String::from_utf8_lossy(&cleaned).into_owned())
}

/// Ride index embedded in a file name (`ride12_imu.csv` -> 12)
pub fn ride_index_from_name(name: &str) -> Option<u32> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let digits: String = name[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
