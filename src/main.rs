use anyhow::{anyhow, Result};
use chrono::Local;
use clap::Parser;
use log::{error, info, trace, warn};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Instant;

use dmxclock::config::ClockConfig;
use dmxclock::controller::ClockController;
use dmxclock::feed::{forward_frames, ChannelSource};
use dmxclock::net::ArtNetReceiver;
use dmxclock::status::ClockStatus;

/// Display a show clock controllable via DMX (Art-Net).
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// DMX universe number
    #[arg(short, long)]
    universe: Option<u16>,

    /// DMX start address of the 28-channel cue payload
    #[arg(short, long)]
    address: Option<usize>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Local address to listen for Art-Net on
    #[arg(long)]
    bind: Option<Ipv4Addr>,

    /// Write a JSON status snapshot here every status interval
    #[arg(long)]
    status_file: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<ClockConfig> {
    let mut config = match &args.config {
        Some(path) => ClockConfig::load(path)?,
        None => ClockConfig::default(),
    };

    if let Some(universe) = args.universe {
        config.dmx.universe = universe;
    }
    if let Some(address) = args.address {
        config.dmx.address = address;
    }
    if let Some(bind) = args.bind {
        config.dmx.bind = bind;
    }
    if let Some(path) = &args.status_file {
        config.display.status_file = Some(path.clone());
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::builder()
        .format_timestamp(None)
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Stopping clock...");
        r.store(false, Ordering::SeqCst);
    })?;

    let receiver = ArtNetReceiver::bind(&config.dmx)?;
    let (tx, rx) = mpsc::channel();
    let rx_running = running.clone();
    let rx_thread = thread::Builder::new()
        .name("artnet-rx".to_string())
        .spawn(move || forward_frames(receiver, tx, rx_running))?;

    let status = Arc::new(RwLock::new(ClockStatus::default()));
    let mut controller = ClockController::new(ChannelSource::new(rx), status, config.clone(), Instant::now());

    let tick_period = config.display.tick_period();
    let status_interval = config.display.status_interval();

    info!("Starting clock...");
    let mut last_log = Instant::now();

    while running.load(Ordering::SeqCst) {
        let tick_start = Instant::now();
        let output = controller.process_loop_iteration(tick_start, Local::now().time());
        trace!(
            "{} hands h:{:.1} m:{:.1} s:{:.1}",
            output.simulated.format("%H:%M:%S"),
            output.hands.hour,
            output.hands.minute,
            output.hands.second
        );

        if last_log.elapsed() >= status_interval {
            controller.log_status();
            if let Some(path) = &config.display.status_file {
                let shared = controller.get_status_shared();
                let snapshot = shared
                    .read()
                    .map(|s| s.clone())
                    .map_err(|_| anyhow!("status lock poisoned"));
                if let Err(e) = snapshot.and_then(|s| s.write_json(path)) {
                    warn!("Status file update failed: {}", e);
                }
            }
            last_log = Instant::now();
        }

        thread::sleep(tick_period.saturating_sub(tick_start.elapsed()));
    }

    rx_thread
        .join()
        .map_err(|_| anyhow!("DMX receiver thread panicked"))?;

    info!("Exiting.");
    Ok(())
}
