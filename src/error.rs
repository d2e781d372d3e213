use thiserror::Error;

/// Sensor read failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    /// Transient: the loop proceeds and retries on the next tick
    #[error("{0} read timed out")]
    Timeout(String),

    #[error("{0} unavailable: {1}")]
    Unavailable(String, String),
}

/// Remote alert or upload failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Transmission failed: {0}")]
    Send(String),

    #[error("Remote rejected request: HTTP {0}")]
    Rejected(u16),
}

/// Malformed local artifacts
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Missing header row")]
    MissingHeader,

    #[error("Line {line}: {reason}")]
    Row { line: usize, reason: String },

    #[error("No ride index in file name {0}")]
    NoRideIndex(String),

    #[error("Invalid NMEA sentence: {0}")]
    Nmea(String),
}

/// Rollover tracker error types
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Sensor failed: {0}")]
    Sensor(#[from] SensorError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Ride history error: {0}")]
    History(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Sample buffer is empty")]
    EmptyBuffer,
}

impl TrackerError {
    /// Sensor timeouts are absorbed by the scheduler; everything else restarts it.
    pub fn is_transient(&self) -> bool {
        matches!(self, TrackerError::Sensor(SensorError::Timeout(_)))
    }
}

/// Result type for tracker operations
pub type TResult<T> = Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_sensor_timeouts_are_transient() {
        let timeout: TrackerError = SensorError::Timeout("IMU".into()).into();
        assert!(timeout.is_transient());

        let io: TrackerError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert!(!io.is_transient());
        assert!(!TrackerError::EmptyBuffer.is_transient());
    }
}
