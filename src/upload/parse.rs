//! Ride log parsers producing upload documents.
//!
//! Columns are located by header name, so files written with extra or
//! reordered columns still parse.

use super::document::{Document, Field};
use crate::error::ParseError;
use crate::samples::TIME_PARSE_FORMAT;
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::warn;
use std::collections::BTreeMap;

struct Table {
    header: StringRecord,
    /// (1-based line number, cells)
    rows: Vec<(usize, StringRecord)>,
    /// Text stops mid-row, as a write cut off by power loss leaves it
    open_tail: bool,
}

fn csv_error(e: csv::Error) -> ParseError {
    ParseError::Row {
        line: e.position().map_or(0, |p| p.line() as usize),
        reason: e.to_string(),
    }
}

impl Table {
    fn read(text: &str) -> Result<Self, ParseError> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        let header = reader.headers().map_err(csv_error)?.clone();
        if header.iter().all(str::is_empty) {
            return Err(ParseError::MissingHeader);
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            let line = record.position().map_or(0, |p| p.line() as usize);
            rows.push((line, record));
        }

        // Only the last row can be torn; a short one anywhere else is corrupt
        if let Some((line, last)) = rows.last() {
            if last.len() < header.len() {
                warn!("dropping truncated final row at line {} ({} of {} fields)", line, last.len(), header.len());
                rows.pop();
            }
        }
        for (line, cells) in &rows {
            if cells.len() != header.len() {
                return Err(ParseError::Row {
                    line: *line,
                    reason: format!("expected {} fields, found {}", header.len(), cells.len()),
                });
            }
        }

        Ok(Table {
            header,
            rows,
            open_tail: !text.is_empty() && !text.ends_with('\n'),
        })
    }

    fn column(&self, name: &str) -> Result<usize, ParseError> {
        self.header.iter().position(|h| h == name).ok_or_else(|| ParseError::Row {
            line: 1,
            reason: format!("missing column {}", name),
        })
    }

    /// Parse every row with `parse`. A final row the write never finished is
    /// dropped instead of failing the file.
    fn parse_rows<T>(
        &self,
        mut parse: impl FnMut(usize, &StringRecord) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        let last = self.rows.len().saturating_sub(1);
        let mut parsed = Vec::with_capacity(self.rows.len());
        for (i, (line, cells)) in self.rows.iter().enumerate() {
            match parse(*line, cells) {
                Ok(row) => parsed.push(row),
                Err(e) if i == last && self.open_tail => warn!("dropping unterminated final row: {}", e),
                Err(e) => return Err(e),
            }
        }
        Ok(parsed)
    }
}

fn parse_time(cell: &str, line: usize) -> Result<NaiveDateTime, ParseError> {
    NaiveDateTime::parse_from_str(cell, TIME_PARSE_FORMAT).map_err(|e| ParseError::Row {
        line,
        reason: format!("bad timestamp {:?}: {}", cell, e),
    })
}

fn parse_float(cell: &str, line: usize) -> Result<f64, ParseError> {
    cell.parse::<f64>().map_err(|_| ParseError::Row {
        line,
        reason: format!("bad number {:?}", cell),
    })
}

/// Accepts `true`/`false` in any case
fn parse_bool(cell: &str, line: usize) -> Result<bool, ParseError> {
    if cell.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ParseError::Row {
            line,
            reason: format!("bad boolean {:?}", cell),
        })
    }
}

fn is_placeholder(cells: &StringRecord) -> bool {
    cells.iter().all(|c| c == "null")
}

struct GpsRow {
    time: NaiveDateTime,
    latitude: f64,
    longitude: f64,
    velocity: f64,
    altitude: f64,
    satellites: f64,
    accel: [f64; 3],
    rollover: bool,
}

struct ImuRow {
    time: NaiveDateTime,
    values: Vec<f64>,
    possible_roll: bool,
    rollover: bool,
}

/// Parse a ride GPS log. Placeholder rows from ticks without a fix are skipped.
pub fn parse_gps(text: &str) -> Result<Document, ParseError> {
    let table = Table::read(text)?;
    let time = table.column("time")?;
    let lat = table.column("lat")?;
    let long = table.column("long")?;
    let vel = table.column("vel")?;
    let alt = table.column("alt")?;
    let sats = table.column("sats")?;
    let accel = [table.column("accelX")?, table.column("accelY")?, table.column("accelZ")?];
    let rollover = table.column("rollover")?;

    let rows = table.parse_rows(|line, cells| {
        if is_placeholder(cells) {
            return Ok(None);
        }
        Ok(Some(GpsRow {
            time: parse_time(&cells[time], line)?,
            latitude: parse_float(&cells[lat], line)?,
            longitude: parse_float(&cells[long], line)?,
            velocity: parse_float(&cells[vel], line)?,
            altitude: parse_float(&cells[alt], line)?,
            satellites: parse_float(&cells[sats], line)?,
            accel: [
                parse_float(&cells[accel[0]], line)?,
                parse_float(&cells[accel[1]], line)?,
                parse_float(&cells[accel[2]], line)?,
            ],
            rollover: parse_bool(&cells[rollover], line)?,
        }))
    })?;

    let mut times = Vec::new();
    let mut coordinates = Vec::new();
    let mut velocities = Vec::new();
    let mut altitudes = Vec::new();
    let mut satellites = Vec::new();
    let mut terrain = Vec::new();
    let mut did_rollover = false;

    for row in rows.into_iter().flatten() {
        times.push(row.time);
        coordinates.push(Field::GeoPoint {
            latitude: row.latitude,
            longitude: row.longitude,
        });
        velocities.push(row.velocity);
        altitudes.push(row.altitude);
        satellites.push(row.satellites);

        did_rollover |= row.rollover;
        let mut point = BTreeMap::new();
        for (key, value) in ["x", "y", "z"].into_iter().zip(row.accel) {
            point.insert(key.to_string(), Field::Float(value));
        }
        point.insert("didRollover".to_string(), Field::Bool(row.rollover));
        terrain.push(Field::Map(point));
    }

    let mut doc = Document::new();
    doc.insert("coordinates".into(), Field::Array(coordinates));
    doc.insert("gps_timestamps".into(), Field::timestamps(times.clone()));
    doc.insert("velocities".into(), Field::floats(velocities));
    doc.insert("altitudes".into(), Field::floats(altitudes));
    doc.insert("satellites".into(), Field::floats(satellites));
    doc.insert("terrain_timestamps".into(), Field::timestamps(times));
    doc.insert("did_rollover".into(), Field::Bool(did_rollover));
    doc.insert("terrain_point".into(), Field::Array(terrain));
    Ok(doc)
}

/// Parse a crash-window or research IMU log
pub fn parse_imu(text: &str) -> Result<Document, ParseError> {
    let table = Table::read(text)?;
    let time = table.column("time")?;
    let floats = ["accelX", "accelY", "accelZ", "gyroX", "gyroY", "gyroZ"];
    let float_cols = floats
        .iter()
        .map(|name| table.column(name))
        .collect::<Result<Vec<_>, _>>()?;
    let poss_roll = table.column("possibleRoll")?;
    let rollover = table.column("rollover")?;

    let rows = table.parse_rows(|line, cells| {
        Ok(ImuRow {
            time: parse_time(&cells[time], line)?,
            values: float_cols
                .iter()
                .map(|col| parse_float(&cells[*col], line))
                .collect::<Result<_, _>>()?,
            possible_roll: parse_bool(&cells[poss_roll], line)?,
            rollover: parse_bool(&cells[rollover], line)?,
        })
    })?;

    let mut times = Vec::new();
    let mut series: Vec<Vec<f64>> = vec![Vec::new(); floats.len()];
    let mut poss_rolls = Vec::new();
    let mut rollovers = Vec::new();

    for row in rows {
        times.push(row.time);
        for (values, value) in series.iter_mut().zip(row.values) {
            values.push(value);
        }
        poss_rolls.push(row.possible_roll);
        rollovers.push(row.rollover);
    }

    let mut doc = Document::new();
    doc.insert("times".into(), Field::timestamps(times));
    for (name, values) in floats.iter().zip(series) {
        doc.insert(name.to_string(), Field::floats(values));
    }
    doc.insert("possRoll".into(), Field::bools(poss_rolls));
    doc.insert("rollover".into(), Field::bools(rollovers));
    Ok(doc)
}
