//! Transit Nap route simulator.
//!
//! Drives the geofence engine with a replayed straight-line trip towards a
//! destination and logs every transition.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                 │
//! │  PolledPositionSource<ReplayProvider>   LogEventSink     │
//! │  (watch thread, scripted fixes)         AutoAckAlertSink │
//! │  ─────────────── Port Trait Boundary ──────────────────  │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │        GeofenceEngine (FSM · Watch · History)      │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use transitnap::adapters::log_sink::{LogAlertSink, LogEventSink};
use transitnap::adapters::polled::PolledPositionSource;
use transitnap::adapters::replay::ReplayProvider;
use transitnap::adapters::time::SystemClock;
use transitnap::app::ports::AlertSink;
use transitnap::config::{AlertPreferences, EngineConfig};
use transitnap::fsm::{AlarmEpisode, StateId};
use transitnap::{Coordinate, EnginePorts, GeofenceEngine};

#[derive(Debug, Parser)]
#[command(name = "transitnap", version, about = "Replay a trip through the wake-up alarm engine")]
struct Args {
    /// Destination latitude (degrees)
    #[arg(long, default_value_t = 40.7128, allow_negative_numbers = true)]
    dest_lat: f64,

    /// Destination longitude (degrees)
    #[arg(long, default_value_t = -74.0060, allow_negative_numbers = true)]
    dest_lon: f64,

    /// Destination label (defaults to the formatted coordinate)
    #[arg(long)]
    address: Option<String>,

    /// Trip start latitude (degrees)
    #[arg(long, default_value_t = 40.7500, allow_negative_numbers = true)]
    start_lat: f64,

    /// Trip start longitude (degrees)
    #[arg(long, default_value_t = -74.0060, allow_negative_numbers = true)]
    start_lon: f64,

    /// Number of fixes along the route
    #[arg(long, default_value_t = 20)]
    steps: usize,

    /// Milliseconds between fixes (overrides the config file)
    #[arg(long, default_value_t = 200)]
    interval_ms: u32,

    /// Engine configuration JSON
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Stands in for the user tapping "Stop Alarm" on the wake-up dialog.
struct AutoAckAlertSink {
    inner: LogAlertSink,
    fired: mpsc::Sender<()>,
}

impl AlertSink for AutoAckAlertSink {
    fn notify_triggered(&mut self, episode: &AlarmEpisode, preferences: &AlertPreferences) {
        self.inner.notify_triggered(episode, preferences);
        let _ = self.fired.send(());
    }

    fn notify_stopped(&mut self, episode: &AlarmEpisode) {
        self.inner.notify_stopped(episode);
    }
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            EngineConfig::from_json(&json).with_context(|| format!("parsing {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    config.sample_interval_ms = args.interval_ms;
    config.fastest_interval_ms = config.fastest_interval_ms.min(args.interval_ms);
    config.validate().context("effective configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args)?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Transit Nap v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let start = Coordinate::new(args.start_lat, args.start_lon).context("start position")?;
    let destination = Coordinate::new(args.dest_lat, args.dest_lon).context("destination")?;
    let route = ReplayProvider::straight_route(start, destination, args.steps);

    let (fired_tx, fired_rx) = mpsc::channel();
    let engine = GeofenceEngine::new(
        config.clone(),
        EnginePorts {
            source: Box::new(PolledPositionSource::new(route)),
            alerts: Box::new(AutoAckAlertSink {
                inner: LogAlertSink::new(),
                fired: fired_tx,
            }),
            events: Box::new(LogEventSink::new()),
            clock: Box::new(SystemClock::new()),
        },
    )?;

    engine.select_point(args.dest_lat, args.dest_lon, args.address.as_deref())?;
    engine.arm()?;

    // Every fix plus slack for the worker to spin up.
    let budget = Duration::from_millis(u64::from(config.sample_interval_ms))
        * u32::try_from(args.steps + 2).unwrap_or(u32::MAX);
    match fired_rx.recv_timeout(budget) {
        Ok(()) => engine.acknowledge_trigger()?,
        Err(_) => {
            info!("Route ended outside the geofence, cancelling");
            engine.cancel()?;
        }
    }
    debug_assert_eq!(engine.state_id(), StateId::Idle);

    for item in engine.history_items() {
        info!("HISTORY | #{} {} | {} {}", item.id, item.location, item.date, item.time);
    }
    Ok(())
}
