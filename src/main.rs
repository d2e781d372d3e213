use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rollover_tracker_rs::alert::LogTransmitter;
use rollover_tracker_rs::modem::SbdModem;
use rollover_tracker_rs::sensors::{DeviceSource, NoPanicInput, SimulatedSource, SysfsPanicInput};
use rollover_tracker_rs::upload::{FirestoreSink, UploadCoordinator, UploadReport};
use rollover_tracker_rs::{logging, prepare_ride_dirs, run_supervised, Mode, RestartState, RidePaths, TrackerConfig};

#[derive(Parser, Debug)]
#[command(name = "rollover_tracker")]
#[command(about = "Vehicle rollover detection, crash alerting and ride upload", long_about = None)]
struct Args {
    /// Sampling duration in seconds (0 = continuous)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Sampling mode (overrides the config file)
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Use synthetic sensors and log alerts instead of transmitting them
    #[arg(long)]
    simulate: bool,

    /// Do not upload pending rides this run
    #[arg(long)]
    skip_upload: bool,
}

fn load_config(args: &Args) -> Result<TrackerConfig> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => TrackerConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    config.validate()?;
    Ok(config)
}

/// Blocking half: the supervised sampling loop with real or synthetic peripherals
fn run_sampling(config: &TrackerConfig, paths: &RidePaths, simulate: bool, deadline: Option<Instant>) -> Result<u32> {
    let restarts = RestartState::default();

    if simulate {
        // Roll over about 20 s in, long enough to cross the default threshold
        let mut source = SimulatedSource::new().with_roll(20, 40);
        let mut panic = NoPanicInput;
        let mut transmitter = LogTransmitter::default();
        return Ok(run_supervised(
            config,
            paths,
            &mut source,
            &mut panic,
            &mut transmitter,
            restarts,
            deadline,
        ));
    }

    let imu_command = config
        .imu_command
        .as_deref()
        .context("imu_command must be configured unless --simulate is given")?;
    let mut source = DeviceSource::open(&config.gps_device, config.gps_baud, config.gps_timeout(), imu_command)?;
    let mut panic = SysfsPanicInput::new(config.panic_gpio);
    let mut modem = SbdModem::open(&config.modem_device, config.modem_baud, config.modem_timeout());
    Ok(run_supervised(
        config,
        paths,
        &mut source,
        &mut panic,
        &mut modem,
        restarts,
        deadline,
    ))
}

fn start_upload(config: &TrackerConfig, paths: &RidePaths) -> Option<tokio::task::JoinHandle<rollover_tracker_rs::TResult<UploadReport>>> {
    let project = match &config.firestore_project {
        Some(project) => project,
        None => {
            warn!("No firestore_project configured, rides stay in {}", paths.unsent.display());
            return None;
        }
    };
    let token = config
        .firestore_token
        .clone()
        .or_else(|| std::env::var("FIRESTORE_TOKEN").ok());
    let sink = FirestoreSink::new(project, token);
    let coordinator = UploadCoordinator::new(sink, &paths.unsent, &paths.sent, config);
    Some(tokio::spawn(async move { coordinator.run().await }))
}

fn describe(path: &Path) -> String {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf()).display().to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    logging::init(config.error_log.as_deref()).context("opening error log")?;

    info!("Rollover tracker starting");
    info!("  Device: {}", config.device_id);
    info!("  Mode: {:?}{}", config.mode, if args.simulate { " (simulated sensors)" } else { "" });
    info!("  Duration: {} seconds (0=continuous)", args.duration);

    let paths = RidePaths::new(&config.data_dir);
    prepare_ride_dirs(&paths).with_context(|| format!("preparing {}", config.data_dir.display()))?;
    info!("  Data dir: {}", describe(&config.data_dir));

    // The pending listing is taken inside the upload task, after the previous
    // ride has been queued above
    let upload = if args.skip_upload { None } else { start_upload(&config, &paths) };

    let deadline = (args.duration > 0).then(|| Instant::now() + Duration::from_secs(args.duration));
    let config = Arc::new(config);
    let sampling = {
        let config = Arc::clone(&config);
        let paths = paths.clone();
        let simulate = args.simulate;
        tokio::task::spawn_blocking(move || run_sampling(&config, &paths, simulate, deadline))
    };

    let restarts = sampling.await.context("sampling thread panicked")??;
    info!("Sampling stopped after {} restart(s)", restarts);

    if let Some(handle) = upload {
        match handle.await.context("upload task panicked")? {
            Ok(report) => info!(
                "Upload finished: {} sent, {} left pending",
                report.uploaded.len(),
                report.skipped.len()
            ),
            Err(e) => error!("Upload pass failed: {:#}", anyhow::Error::from(e)),
        }
    }
    Ok(())
}
