//! Minimal NMEA 0183 decoding for GGA and RMC sentences.

use crate::error::{ParseError, SensorError};
use crate::samples::{now_local, GpsFix, GpsReading};
use log::{debug, warn};
use std::io::{BufRead, ErrorKind};

/// Knots to km/h
const KNOTS_TO_KPH: f64 = 1.852;
/// Lines read per poll before giving up on a complete RMC sentence
const MAX_LINES_PER_POLL: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum Sentence {
    Gga {
        /// 0 = invalid
        quality: u8,
        satellites: u32,
        altitude_m: Option<f64>,
    },
    Rmc {
        active: bool,
        latitude: Option<f64>,
        longitude: Option<f64>,
        speed_knots: Option<f64>,
    },
    Other,
}

/// Decode one sentence, verifying the `*hh` checksum when present
pub fn parse_sentence(line: &str) -> Result<Sentence, ParseError> {
    let line = line.trim();
    let body = line
        .strip_prefix('$')
        .ok_or_else(|| ParseError::Nmea(format!("missing '$': {}", line)))?;

    let body = match body.split_once('*') {
        Some((data, checksum)) => {
            let expected = u8::from_str_radix(checksum, 16)
                .map_err(|_| ParseError::Nmea(format!("bad checksum field: {}", checksum)))?;
            let actual = data.bytes().fold(0u8, |acc, b| acc ^ b);
            if actual != expected {
                return Err(ParseError::Nmea(format!(
                    "checksum mismatch (expected {:02X}, got {:02X})",
                    expected, actual
                )));
            }
            data
        }
        None => body,
    };

    let fields: Vec<&str> = body.split(',').collect();
    let kind = fields[0].get(2..).unwrap_or("");
    match kind {
        "GGA" => Ok(Sentence::Gga {
            quality: field(&fields, 6).and_then(|f| f.parse().ok()).unwrap_or(0),
            satellites: field(&fields, 7).and_then(|f| f.parse().ok()).unwrap_or(0),
            altitude_m: field(&fields, 9).and_then(|f| f.parse().ok()),
        }),
        "RMC" => Ok(Sentence::Rmc {
            active: field(&fields, 2) == Some("A"),
            latitude: coordinate(field(&fields, 3), field(&fields, 4)),
            longitude: coordinate(field(&fields, 5), field(&fields, 6)),
            speed_knots: field(&fields, 7).and_then(|f| f.parse().ok()),
        }),
        _ => Ok(Sentence::Other),
    }
}

fn field<'a>(fields: &[&'a str], idx: usize) -> Option<&'a str> {
    fields.get(idx).copied().filter(|f| !f.is_empty())
}

/// `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere to signed decimal degrees
fn coordinate(value: Option<&str>, hemisphere: Option<&str>) -> Option<f64> {
    let raw: f64 = value?.parse().ok()?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;
    match hemisphere? {
        "N" | "E" => Some(decimal),
        "S" | "W" => Some(-decimal),
        _ => None,
    }
}

/// GPS receiver speaking NMEA over a line-oriented stream
pub struct NmeaGps<R: BufRead> {
    reader: R,
    satellites: u32,
    altitude_m: f64,
}

impl<R: BufRead> NmeaGps<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            satellites: 0,
            altitude_m: 0.0,
        }
    }

    /// Read sentences until an RMC arrives; GGA data seen on the way is kept
    pub fn read_fix(&mut self) -> Result<GpsReading, SensorError> {
        let mut line = String::new();
        for _ in 0..MAX_LINES_PER_POLL {
            line.clear();
            let n = self.reader.read_line(&mut line).map_err(|e| match e.kind() {
                ErrorKind::TimedOut | ErrorKind::WouldBlock => SensorError::Timeout("GPS".into()),
                _ => SensorError::Unavailable("GPS".into(), e.to_string()),
            })?;
            if n == 0 {
                break;
            }

            match parse_sentence(&line) {
                Ok(Sentence::Gga {
                    quality,
                    satellites,
                    altitude_m,
                }) => {
                    if quality > 0 {
                        self.satellites = satellites;
                        if let Some(alt) = altitude_m {
                            self.altitude_m = alt;
                        }
                    }
                }
                Ok(Sentence::Rmc {
                    active,
                    latitude,
                    longitude,
                    speed_knots,
                }) => {
                    return match (active, latitude, longitude) {
                        (true, Some(lat), Some(lon)) => Ok(GpsReading::Fix(GpsFix::new(
                            now_local(),
                            lat,
                            lon,
                            speed_knots.unwrap_or(0.0) * KNOTS_TO_KPH,
                            self.altitude_m,
                            self.satellites,
                        ))),
                        _ => {
                            debug!("waiting for fix...");
                            Ok(GpsReading::NoFix)
                        }
                    };
                }
                Ok(Sentence::Other) => {}
                Err(e) => warn!("dropping GPS sentence: {}", e),
            }
        }
        Err(SensorError::Timeout("GPS".into()))
    }
}
