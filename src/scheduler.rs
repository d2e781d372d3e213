use crate::alert::{AlertTransmitter, CrashResponder};
use crate::buffer::CircularSampleBuffer;
use crate::config::{Mode, TrackerConfig};
use crate::error::{TResult, TrackerError};
use crate::health_monitor::HealthMonitor;
use crate::history::HistoryFile;
use crate::live_status::{current_timestamp, LiveStatus};
use crate::restart_manager::RestartState;
use crate::ride_log::{self, GPS_HEADER, IMU_HEADER};
use crate::rollover::{RollState, RolloverDetector};
use crate::samples::{now_local, GpsFix, ImuReading, InertialSample};
use crate::sensors::{PanicInput, SampleSource};
use crate::session::{RidePaths, RideSession};
use log::{debug, error, info, warn};
use std::time::{Duration, Instant};

/// Longest sleep between loop iterations, bounds panic-button latency
const PANIC_POLL: Duration = Duration::from_millis(50);

/// Why a crash response fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashCause {
    Rollover,
    PanicButton,
}

/// Everything the sampling loop talks to outside the process
pub struct Peripherals<'a> {
    pub source: &'a mut dyn SampleSource,
    pub panic: &'a mut dyn PanicInput,
    pub transmitter: &'a mut dyn AlertTransmitter,
}

/// Main sampling loop for one ride session.
///
/// IMU and GPS are polled on independent timers. In normal mode IMU samples
/// go to the ring, and the ring is flushed to the crash log when the roll
/// counter reaches its threshold or the panic button is pressed.
pub struct TelemetryScheduler<'a> {
    config: &'a TrackerConfig,
    paths: &'a RidePaths,
    io: Peripherals<'a>,
    session: RideSession,
    detector: RolloverDetector,
    roll_state: RollState,
    ring: CircularSampleBuffer,
    responder: CrashResponder,
    health: HealthMonitor,
    status: LiveStatus,
    next_imu: Instant,
    next_gps: Instant,
    next_status: Instant,
    latest_fix: Option<GpsFix>,
    /// Combined row from the most recent GPS tick, if it had data
    latest_row: Option<(GpsFix, InertialSample)>,
    panic_was_active: bool,
}

impl<'a> TelemetryScheduler<'a> {
    /// Allocate a fresh ride from the durable history and arm both timers
    pub fn start(config: &'a TrackerConfig, paths: &'a RidePaths, io: Peripherals<'a>, now: Instant) -> TResult<Self> {
        let mut history = HistoryFile::open(&paths.history, &paths.ride_dirs())?;
        let session = RideSession::start(history.get(), config.mode, paths);
        // Claimed up front so a restarted scheduler never reuses this ride's files
        history.set_last_ride(session.index)?;
        if let Some(research) = session.research_index {
            history.set_last_research_ride(research)?;
        }
        info!(
            "Starting {} ({:?} mode{})",
            session.name(),
            session.mode,
            session
                .research_index
                .map(|r| format!(", research recording {}", r))
                .unwrap_or_default()
        );

        Ok(TelemetryScheduler {
            config,
            paths,
            io,
            status: LiveStatus::new(session.index, session.mode, config.crash_threshold),
            session,
            detector: RolloverDetector::from_config(config),
            roll_state: RollState::new(config.crash_threshold),
            ring: CircularSampleBuffer::new(config.buffer_capacity),
            responder: CrashResponder::from_config(config),
            health: HealthMonitor::new(config.imu_period(), config.gps_period(), now),
            next_imu: now,
            next_gps: now,
            next_status: now,
            latest_fix: None,
            latest_row: None,
            panic_was_active: false,
        })
    }

    pub fn session(&self) -> &RideSession {
        &self.session
    }

    pub fn ring(&self) -> &CircularSampleBuffer {
        &self.ring
    }

    pub fn roll_state(&self) -> RollState {
        self.roll_state
    }

    pub fn status(&self) -> &LiveStatus {
        &self.status
    }

    /// Earliest instant at which a timer is due
    pub fn next_due(&self) -> Instant {
        self.next_imu.min(self.next_gps)
    }

    /// Run whatever is due at `now`. Returns the crash cause if a crash
    /// response was dispatched during this tick.
    pub fn tick(&mut self, now: Instant) -> TResult<Option<CrashCause>> {
        let mut crossed = false;

        if now >= self.next_imu {
            self.next_imu = now + self.config.imu_period();
            if let Some(sample) = self.read_sample(now)? {
                crossed = self.roll_state.update(sample.in_cone);
                debug!("roll count {}/{}", self.roll_state.count(), self.roll_state.threshold());
                self.log_imu(sample)?;
                self.status.imu_ticks += 1;
            }
        }

        if now >= self.next_gps {
            self.next_gps = now + self.config.gps_period();
            self.gps_tick(now)?;
            self.status.gps_ticks += 1;
        }

        let mut fired = None;
        if self.session.mode == Mode::Normal {
            let panic_active = self.io.panic.is_active();
            let pressed = panic_active && !self.panic_was_active;
            self.panic_was_active = panic_active;

            let cause = if crossed {
                Some(CrashCause::Rollover)
            } else if pressed {
                Some(CrashCause::PanicButton)
            } else {
                None
            };
            if let Some(cause) = cause {
                self.crash_response(cause)?;
                fired = Some(cause);
            }
        }

        if now >= self.next_status {
            self.next_status = now + self.config.status_period();
            self.publish_status(now);
        }

        Ok(fired)
    }

    /// Loop until `deadline` (forever when `None`). Errors other than sensor
    /// timeouts end the loop so the supervisor can restart the ride.
    pub fn run(&mut self, deadline: Option<Instant>) -> TResult<()> {
        loop {
            let now = Instant::now();
            if deadline.map_or(false, |d| now >= d) {
                info!("sampling deadline reached for {}", self.session.name());
                return Ok(());
            }

            self.tick(now)?;

            let wait = self.next_due().saturating_duration_since(Instant::now()).min(PANIC_POLL);
            if !wait.is_zero() {
                std::thread::sleep(wait);
            }
        }
    }

    /// Read and classify one IMU sample; timeouts yield `None`
    fn read_sample(&mut self, now: Instant) -> TResult<Option<InertialSample>> {
        match self.io.source.read_inertial() {
            Ok(reading) => {
                self.health.imu.record_success(now);
                Ok(Some(self.classify(reading)))
            }
            Err(e) => {
                self.health.imu.record_failure(now);
                let err = TrackerError::from(e);
                if err.is_transient() {
                    debug!("{}, retrying next tick", err);
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn classify(&self, reading: ImuReading) -> InertialSample {
        let in_cone = self.detector.classify(reading.accel);
        InertialSample::new(reading, now_local(), in_cone)
    }

    fn log_imu(&mut self, sample: InertialSample) -> TResult<()> {
        match (self.session.mode, &self.session.research_log) {
            (Mode::Research, Some(path)) => {
                ride_log::append_row(path, IMU_HEADER, &ride_log::imu_row(&sample))?;
            }
            _ => self.ring.append(sample),
        }
        Ok(())
    }

    fn gps_tick(&mut self, now: Instant) -> TResult<()> {
        let fix = match self.io.source.read_gps_fix() {
            Ok(reading) => {
                self.health.gps.record_success(now);
                reading.into_fix()
            }
            Err(e) => {
                self.health.gps.record_failure(now);
                let err = TrackerError::from(e);
                if !err.is_transient() {
                    return Err(err);
                }
                debug!("{}, writing placeholder row", err);
                None
            }
        };
        if let Some(fix) = &fix {
            self.latest_fix = Some(fix.clone());
        }
        let sample = self.read_sample(now)?;

        match (fix, sample) {
            (Some(fix), Some(sample)) => {
                ride_log::append_row(&self.session.gps_log, GPS_HEADER, &ride_log::gps_row(&fix, &sample))?;
                self.status.gps_rows += 1;
                self.latest_row = Some((fix, sample));
            }
            _ => {
                ride_log::append_row(&self.session.gps_log, GPS_HEADER, &ride_log::gps_placeholder_row())?;
                self.status.placeholder_rows += 1;
                self.latest_row = None;
            }
        }
        Ok(())
    }

    fn crash_response(&mut self, cause: CrashCause) -> TResult<()> {
        warn!(
            "*************** {:?} on {} (roll count {}/{}) ***************",
            cause,
            self.session.name(),
            self.roll_state.count(),
            self.roll_state.threshold()
        );

        match self.ring.mark_newest_rollover() {
            Ok(()) => {}
            Err(TrackerError::EmptyBuffer) => warn!("no buffered IMU samples to mark at crash time"),
            Err(e) => return Err(e),
        }
        let written = ride_log::write_imu_window(&self.session.crash_log, self.ring.iter())?;
        info!("wrote {} pre-crash samples to {}", written, self.session.crash_log.display());

        if let Some((fix, sample)) = &self.latest_row {
            ride_log::append_row(&self.session.gps_log, GPS_HEADER, &ride_log::gps_row(fix, sample))?;
        }
        self.status.crash_responses += 1;

        // Alert delivery failures are logged by the responder and never stop sampling
        if let Err(e) = self.responder.respond(&mut *self.io.transmitter, self.latest_fix.as_ref()) {
            error!("emergency alert for {} not delivered: {}", self.session.name(), e);
        }
        Ok(())
    }

    fn publish_status(&mut self, now: Instant) {
        self.status.timestamp = current_timestamp();
        self.status.roll_count = self.roll_state.count();
        self.status.buffered_samples = self.ring.len();
        self.status.latest_fix = self.latest_fix.clone();
        self.status.health = self.health.format_status(now);
        if let Err(e) = self.status.save(&self.paths.status) {
            warn!("failed to write {}: {}", self.paths.status.display(), e);
        }
    }
}

/// Run rides back to back: every fault is logged and the scheduler is
/// rebuilt from a fresh session after a backoff pause. Returns the number of
/// restarts once `deadline` passes; without a deadline it never returns.
pub fn run_supervised(
    config: &TrackerConfig,
    paths: &RidePaths,
    source: &mut dyn SampleSource,
    panic: &mut dyn PanicInput,
    transmitter: &mut dyn AlertTransmitter,
    mut restarts: RestartState,
    deadline: Option<Instant>,
) -> u32 {
    let mut restart_count = 0;
    loop {
        let started = Instant::now();
        let io = Peripherals {
            source: &mut *source,
            panic: &mut *panic,
            transmitter: &mut *transmitter,
        };
        let result = TelemetryScheduler::start(config, paths, io, started).and_then(|mut s| s.run(deadline));

        match result {
            Ok(()) => return restart_count,
            Err(e) => {
                error!(
                    "sampling loop fault at {}: {} ({:?})",
                    now_local().format(crate::samples::TIME_FORMAT),
                    e,
                    e
                );
                let delay = restarts.record_failed_attempt(started.elapsed());
                restart_count += 1;
                info!("{}", restarts.status());

                let delay = match deadline {
                    Some(d) => delay.min(d.saturating_duration_since(Instant::now())),
                    None => delay,
                };
                std::thread::sleep(delay);
                if deadline.map_or(false, |d| Instant::now() >= d) {
                    return restart_count;
                }
            }
        }
    }
}
