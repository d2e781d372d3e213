//! Vehicle rollover detection and ride telemetry.
//!
//! A blocking sampling loop polls GPS and IMU on independent timers, keeps a
//! ring of recent IMU samples, and on a sustained rollover (or a panic button
//! press) writes the pre-crash window and sends an emergency alert. Finished
//! ride files are pushed to a remote document store by a separate upload
//! pass.

pub mod alert;
pub mod buffer;
pub mod config;
pub mod error;
pub mod health_monitor;
pub mod history;
pub mod live_status;
pub mod logging;
pub mod modem;
pub mod nmea;
pub mod restart_manager;
pub mod ride_log;
pub mod rollover;
pub mod samples;
pub mod scheduler;
pub mod sensors;
pub mod session;
pub mod upload;

pub use alert::{AlertTransmitter, CrashResponder, LogTransmitter};
pub use buffer::CircularSampleBuffer;
pub use config::{Mode, TrackerConfig};
pub use error::{ParseError, SensorError, TResult, TrackerError, TransportError};
pub use history::{HistoryFile, RideHistory};
pub use restart_manager::RestartState;
pub use rollover::{RollState, RolloverDetector};
pub use samples::{GpsFix, GpsReading, ImuReading, InertialSample};
pub use scheduler::{run_supervised, CrashCause, Peripherals, TelemetryScheduler};
pub use sensors::{PanicInput, SampleSource};
pub use session::{prepare_ride_dirs, RidePaths, RideSession};
pub use upload::{Document, Field, RemoteSink, UploadCoordinator, UploadReport};
