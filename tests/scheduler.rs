mod common;

use common::*;
use rollover_tracker_rs::sensors::{NoPanicInput, SimulatedSource};
use rollover_tracker_rs::{
    prepare_ride_dirs, run_supervised, CrashCause, GpsReading, Mode, Peripherals, RestartState, RideHistory,
    RidePaths, SensorError, TelemetryScheduler,
};
use std::fs;
use std::time::{Duration, Instant};

fn secs(k: u64) -> Duration {
    Duration::from_secs(k)
}

fn read_history(paths: &RidePaths) -> RideHistory {
    serde_json::from_str(&fs::read_to_string(&paths.history).unwrap()).unwrap()
}

fn lines(path: &std::path::Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn setup(name: &str, history: &str) -> (std::path::PathBuf, RidePaths) {
    let dir = scratch_dir(name);
    let paths = RidePaths::new(&dir);
    prepare_ride_dirs(&paths).unwrap();
    fs::write(&paths.history, history).unwrap();
    (dir, paths)
}

#[test]
fn test_sustained_rollover_writes_window_and_alerts() {
    let (dir, paths) = setup("rollover", r#"{"lastRide": 4}"#);
    let config = test_config(dir);
    let gps_fix = fix();
    let mut source = ScriptedSource::new(ROLLED).with_gps(Ok(GpsReading::Fix(gps_fix.clone())));
    let mut panic = ScriptedPanic::default();
    let mut tx = RecordingTransmitter::default();

    let t0 = Instant::now();
    let (causes, session) = {
        let io = Peripherals {
            source: &mut source,
            panic: &mut panic,
            transmitter: &mut tx,
        };
        let mut scheduler = TelemetryScheduler::start(&config, &paths, io, t0).unwrap();
        assert_eq!(scheduler.session().index, 5);

        let causes: Vec<_> = (0..5).map(|k| scheduler.tick(t0 + secs(k)).unwrap()).collect();
        assert_eq!(scheduler.roll_state().count(), 3);
        assert_eq!(scheduler.status().crash_responses, 1);
        (causes, scheduler.session().clone())
    };

    // Fires once, on the tick the counter reaches the threshold
    assert_eq!(causes, vec![None, None, Some(CrashCause::Rollover), None, None]);

    let window = lines(&session.crash_log);
    assert_eq!(window.len(), 4);
    assert!(window[0].starts_with("time,"));
    assert!(window[1].ends_with("true,false"));
    assert!(window[2].ends_with("true,false"));
    assert!(window[3].ends_with("true,true"));

    // Fix row from the first GPS tick, repeated by the crash response
    let gps = lines(&session.gps_log);
    assert_eq!(gps.len(), 3);
    assert!(gps[1].contains("45.12345,-93.54321"));
    assert_eq!(gps[1], gps[2]);

    assert_eq!(read_history(&paths).last_ride, Some(5));
    assert_eq!(tx.sent, vec!["0,-93.54321,45.12345,default_device".to_string()]);
    assert!(paths.status.exists());
}

#[test]
fn test_alert_retried_until_delivered() {
    let (dir, paths) = setup("alert_retry", "{}");
    let config = test_config(dir);
    let mut source = ScriptedSource::new(ROLLED);
    let mut panic = ScriptedPanic::default();
    let mut tx = RecordingTransmitter {
        failures_left: 2,
        ..Default::default()
    };

    let t0 = Instant::now();
    {
        let io = Peripherals {
            source: &mut source,
            panic: &mut panic,
            transmitter: &mut tx,
        };
        let mut scheduler = TelemetryScheduler::start(&config, &paths, io, t0).unwrap();
        assert_eq!(scheduler.session().index, 0);
        for k in 0..3 {
            scheduler.tick(t0 + secs(k)).unwrap();
        }
    }

    // No fix yet, so the coordinates are empty
    assert_eq!(tx.sent, vec!["0,,,default_device".to_string()]);
    assert_eq!(read_history(&paths).last_ride, Some(0));
}

#[test]
fn test_research_mode_logs_everything_without_alerts() {
    let (dir, paths) = setup("research", r#"{"lastRide": 4, "lastResearchRide": 1}"#);
    let mut config = test_config(dir);
    config.mode = Mode::Research;
    let mut source = ScriptedSource::new(ROLLED).with_gps(Ok(GpsReading::Fix(fix())));
    let mut panic = ScriptedPanic::default();
    let mut tx = RecordingTransmitter::default();

    let t0 = Instant::now();
    let session = {
        let io = Peripherals {
            source: &mut source,
            panic: &mut panic,
            transmitter: &mut tx,
        };
        let mut scheduler = TelemetryScheduler::start(&config, &paths, io, t0).unwrap();
        for k in 0..5 {
            assert_eq!(scheduler.tick(t0 + secs(k)).unwrap(), None);
        }
        assert!(scheduler.ring().is_empty());
        scheduler.session().clone()
    };

    assert_eq!(session.research_index, Some(2));
    let research_log = paths.research.join("ride2_imuComplete.csv");
    assert_eq!(session.research_log.as_deref(), Some(research_log.as_path()));
    assert_eq!(lines(&research_log).len(), 6);
    assert!(!session.crash_log.exists());
    assert!(tx.sent.is_empty());

    let history = read_history(&paths);
    assert_eq!(history.last_research_ride, Some(2));
    assert_eq!(history.last_ride, Some(5));
}

#[test]
fn test_missing_fix_writes_placeholder_rows() {
    let (dir, paths) = setup("placeholder", r#"{"lastRide": 4}"#);
    let config = test_config(dir);
    let mut source = ScriptedSource::new(UPRIGHT)
        .with_gps(Ok(GpsReading::NoFix))
        .with_gps(Err(SensorError::Timeout("GPS".into())));
    let mut panic = ScriptedPanic::default();
    let mut tx = RecordingTransmitter::default();

    let t0 = Instant::now();
    let session = {
        let io = Peripherals {
            source: &mut source,
            panic: &mut panic,
            transmitter: &mut tx,
        };
        let mut scheduler = TelemetryScheduler::start(&config, &paths, io, t0).unwrap();
        scheduler.tick(t0).unwrap();
        scheduler.tick(t0 + config.gps_period()).unwrap();
        assert_eq!(scheduler.status().placeholder_rows, 2);
        assert_eq!(scheduler.status().gps_rows, 0);
        scheduler.session().clone()
    };

    let gps = lines(&session.gps_log);
    assert_eq!(gps.len(), 3);
    assert_eq!(gps[1], vec!["null"; 11].join(","));
    assert_eq!(gps[2], gps[1]);
    // The index is claimed when the session starts, fix or not
    assert_eq!(read_history(&paths).last_ride, Some(5));
}

#[test]
fn test_panic_button_fires_on_press_not_hold() {
    let (dir, paths) = setup("panic", "{}");
    let config = test_config(dir);
    let mut source = ScriptedSource::new(UPRIGHT).with_gps(Ok(GpsReading::Fix(fix())));
    let mut panic = ScriptedPanic {
        presses: vec![false, true, true, false, true].into(),
    };
    let mut tx = RecordingTransmitter::default();

    let t0 = Instant::now();
    let session = {
        let io = Peripherals {
            source: &mut source,
            panic: &mut panic,
            transmitter: &mut tx,
        };
        let mut scheduler = TelemetryScheduler::start(&config, &paths, io, t0).unwrap();
        let causes: Vec<_> = (0..5).map(|k| scheduler.tick(t0 + secs(k)).unwrap()).collect();
        assert_eq!(
            causes,
            vec![
                None,
                Some(CrashCause::PanicButton),
                None,
                None,
                Some(CrashCause::PanicButton)
            ]
        );
        scheduler.session().clone()
    };

    assert_eq!(tx.sent.len(), 2);
    // Overwritten by the second press: five upright samples, newest marked
    let window = lines(&session.crash_log);
    assert_eq!(window.len(), 6);
    assert!(window[5].ends_with("false,true"));
}

#[test]
fn test_supervisor_restarts_after_sensor_loss() {
    let (dir, paths) = setup("supervisor", "{}");
    let config = test_config(dir);
    let mut panic = NoPanicInput;
    let mut tx = RecordingTransmitter::default();
    let restarts = RestartState::new(
        "test",
        Duration::from_millis(1),
        Duration::from_millis(5),
        Duration::from_secs(60),
    );

    let deadline = Instant::now() + Duration::from_millis(200);
    let count = run_supervised(&config, &paths, &mut DeadSource, &mut panic, &mut tx, restarts, Some(deadline));
    assert!(count >= 2, "expected repeated restarts, got {}", count);
    assert!(Instant::now() >= deadline);
}

#[test]
fn test_each_restart_starts_a_new_ride() {
    let (dir, paths) = setup("restart_index", "{}");
    let mut config = test_config(dir);
    config.imu_period_secs = 0.005;
    config.gps_period_secs = 0.005;
    let mut source = FaultingSource::new(3);
    let mut panic = NoPanicInput;
    let mut tx = RecordingTransmitter::default();
    let restarts = RestartState::new(
        "test",
        Duration::from_millis(1),
        Duration::from_millis(5),
        Duration::from_secs(60),
    );

    let deadline = Instant::now() + Duration::from_millis(100);
    let count = run_supervised(&config, &paths, &mut source, &mut panic, &mut tx, restarts, Some(deadline));
    assert!(count >= 2, "expected repeated restarts, got {}", count);

    // Every faulted session wrote a placeholder row into its own file
    for k in 0..count {
        let log = paths.current.join(format!("ride{}.csv", k));
        assert!(log.exists(), "missing {}", log.display());
        assert_eq!(lines(&log).len(), 2, "{} was appended to by a later session", log.display());
    }

    let last = read_history(&paths).last_ride.unwrap();
    assert!(last + 1 >= count, "history at ride{} after {} restarts", last, count);
}

#[test]
fn test_silent_gps_does_not_stall_sampling() {
    let (dir, paths) = setup("silent_gps", "{}");
    let mut config = test_config(dir);
    config.imu_period_secs = 0.005;
    config.gps_period_secs = 0.01;
    let mut source = SilentGpsSource::new();
    let mut panic = ScriptedPanic::default();
    let mut tx = RecordingTransmitter::default();

    let t0 = Instant::now();
    let io = Peripherals {
        source: &mut source,
        panic: &mut panic,
        transmitter: &mut tx,
    };
    let mut scheduler = TelemetryScheduler::start(&config, &paths, io, t0).unwrap();
    for k in 0..4 {
        scheduler.tick(t0 + config.gps_period() * k).unwrap();
    }
    assert_eq!(scheduler.status().imu_ticks, 4);
    assert_eq!(scheduler.status().gps_ticks, 4);
    assert_eq!(scheduler.status().placeholder_rows, 4);

    // The free-running loop keeps sampling too
    scheduler.run(Some(Instant::now() + Duration::from_millis(50))).unwrap();
    assert!(scheduler.status().imu_ticks > 4);
    assert_eq!(lines(&scheduler.session().gps_log)[1], vec!["null"; 11].join(","));
}

#[test]
fn test_supervised_simulated_ride() {
    let (dir, paths) = setup("simulated", "{}");
    let mut config = test_config(dir);
    config.imu_period_secs = 0.01;
    config.gps_period_secs = 0.05;
    let mut source = SimulatedSource::new().with_roll(0, 10_000).with_fix_after(0);
    let mut panic = NoPanicInput;
    let mut tx = RecordingTransmitter::default();

    let deadline = Instant::now() + Duration::from_millis(300);
    let count = run_supervised(
        &config,
        &paths,
        &mut source,
        &mut panic,
        &mut tx,
        RestartState::default(),
        Some(deadline),
    );

    assert_eq!(count, 0);
    assert_eq!(tx.sent.len(), 1);
    assert!(paths.current.join("ride0_imu.csv").exists());
    assert_eq!(read_history(&paths).last_ride, Some(0));
}
