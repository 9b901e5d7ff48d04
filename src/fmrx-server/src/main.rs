// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use fmrx_app::{backend_key, init_logging, ConfigFile};
use fmrx_backend::{register_builtin_backends_on, RegistrationContext};
use fmrx_core::controller::{ListenerCategory, Notification};
use fmrx_core::request::ScanDirection;
use fmrx_core::{
    Band, DynResult, Freq, OperatingState, RadioEventEmitter, RadioListener, RadioSnapshot,
};

use fmrx_server::{run_tuner_task, RadioHandle, ServerConfig, TunerTaskConfig};

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - FM tuner control daemon");
const TUNER_TASK_CHANNEL_BUFFER: usize = 32;

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Band preset (europe-us, us, japan)
    #[arg(short = 'b', long = "band")]
    band: Option<String>,
    /// Tuner backend to use (e.g. sim)
    #[arg(long = "backend")]
    backend: Option<String>,
    /// Tune to this frequency after start (kHz)
    #[arg(short = 't', long = "tune", value_name = "KHZ")]
    tune: Option<u32>,
    /// Run a scan after start (and after tuning)
    #[arg(short = 's', long = "scan", value_enum)]
    scan: Option<ScanArg>,
    /// Search threshold applied before scanning
    #[arg(long = "threshold")]
    threshold: Option<u32>,
    /// Force mono audio
    #[arg(long = "mono")]
    mono: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScanArg {
    Up,
    Down,
    Full,
}

/// Resolved configuration after merging config file and CLI arguments.
#[derive(Debug)]
struct ResolvedConfig {
    backend: String,
    band: Band,
}

fn resolve_config(
    cli: &Cli,
    cfg: &ServerConfig,
    registry: &RegistrationContext,
) -> DynResult<ResolvedConfig> {
    let backend = backend_key(cli.backend.as_deref().unwrap_or(&cfg.tuner.backend));
    if !registry.is_backend_registered(&backend) {
        return Err(format!(
            "Unknown tuner backend: {} (available: {})",
            backend,
            registry.registered_backends().join(", ")
        )
        .into());
    }

    let band = match cli.band.as_deref() {
        Some(name) => name.parse::<Band>()?,
        None => cfg.band()?,
    };
    if let Some(khz) = cli.tune {
        if !band.is_valid(Freq::new(khz)) {
            return Err(format!(
                "--tune {} is not a channel of the {}..{} kHz band",
                khz, band.min.khz, band.max.khz
            )
            .into());
        }
    }
    Ok(ResolvedConfig { backend, band })
}

/// Writes every radio notification to the log.
struct LoggingListener;

impl LoggingListener {
    fn log(notification: &Notification) {
        match serde_json::to_string(notification) {
            Ok(json) => info!("event: {}", json),
            Err(e) => warn!("event {:?} not serializable: {}", notification, e),
        }
    }
}

impl RadioListener for LoggingListener {
    fn on_state_changed(&self, old: OperatingState, new: OperatingState) {
        Self::log(&Notification::StateChanged { old, new });
    }

    fn on_started(&self) {
        Self::log(&Notification::Started);
    }

    fn on_error(&self) {
        error!("tuner entered the error state; restart required");
    }

    fn on_scan_result(
        &self,
        frequency: Option<Freq>,
        signal: Option<u8>,
        direction: ScanDirection,
        aborted: bool,
    ) {
        Self::log(&Notification::ScanResult {
            frequency,
            signal,
            direction,
            aborted,
        });
    }

    fn on_full_scan_result(&self, frequencies: &[Freq], signals: &[u8], aborted: bool) {
        for (freq, signal) in frequencies.iter().zip(signals) {
            info!("station {} (signal {})", freq, signal);
        }
        Self::log(&Notification::FullScanResult {
            frequencies: frequencies.to_vec(),
            signals: signals.to_vec(),
            aborted,
        });
    }

    fn on_forced_reset(&self, reason: u32) {
        Self::log(&Notification::ForcedReset { reason });
    }

    fn on_signal_strength_changed(&self, value: u8) {
        Self::log(&Notification::SignalStrengthChanged(value));
    }

    fn on_stereo_changed(&self, stereo: bool) {
        Self::log(&Notification::StereoChanged(stereo));
    }
}

/// Apply the CLI actions in order: start, settings, tune, scan.
async fn run_session(cli: &Cli, handle: &RadioHandle, band: Band) -> DynResult<()> {
    handle.start(band).await?;
    if let Some(threshold) = cli.threshold {
        handle.set_threshold(threshold).await?;
    }
    if cli.mono {
        handle.set_force_mono(true).await?;
    }
    if let Some(khz) = cli.tune {
        handle.set_frequency(Freq::new(khz)).await?;
    }
    if let Some(scan) = cli.scan {
        match scan {
            ScanArg::Up => handle.scan_up().await?,
            ScanArg::Down => handle.scan_down().await?,
            ScanArg::Full => handle.full_scan().await?,
        }
        let mut rx = handle.watch();
        rx.wait_for(|snapshot| snapshot.state != OperatingState::Scanning)
            .await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let mut registry = RegistrationContext::new();
    register_builtin_backends_on(&mut registry);

    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_combined_toml());
        return Ok(());
    }

    let (cfg, config_path) = if let Some(ref path) = cli.config {
        let cfg = ServerConfig::load_from_file(path)?;
        (cfg, Some(path.clone()))
    } else {
        ServerConfig::load_from_default_paths()?
    };
    cfg.validate()
        .map_err(|e| format!("Invalid server configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let resolved = resolve_config(&cli, &cfg, &registry)?;
    info!(
        "Starting fmrx-server (backend: {}, band: {}..{} kHz, spacing {} kHz)",
        resolved.backend, resolved.band.min.khz, resolved.band.max.khz, resolved.band.spacing_khz
    );

    let timing = cfg.timing.to_policy();
    let emitter = Arc::new(RadioEventEmitter::new());
    emitter.register(Arc::new(LoggingListener), &ListenerCategory::ALL);

    let (tx, rx) = mpsc::channel(TUNER_TASK_CHANNEL_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(RadioSnapshot::default());

    let task_config = TunerTaskConfig {
        registry: Arc::new(registry),
        backend: resolved.backend,
        timing: timing.clone(),
        sim: cfg.sim.clone(),
        emitter: emitter.clone(),
    };
    let task = tokio::spawn(async move {
        if let Err(e) = run_tuner_task(task_config, rx, snapshot_tx).await {
            error!("Tuner task error: {:?}", e);
        }
    });

    let handle = RadioHandle::new(tx, snapshot_rx, emitter, timing);
    if let Err(e) = run_session(&cli, &handle, resolved.band).await {
        error!("Session failed: {}", e);
    } else if (cli.tune.is_some() || cli.scan.is_some()) && !handle.is_tuned_to_valid_channel() {
        warn!("Session finished without tuning to a channel");
    }
    match serde_json::to_string(&handle.snapshot()) {
        Ok(json) => info!("snapshot: {}", json),
        Err(e) => warn!("snapshot not serializable: {}", e),
    }

    signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    if handle.snapshot().state != OperatingState::Error {
        if let Err(e) = handle.reset().await {
            warn!("Reset on shutdown failed: {}", e);
        }
    }
    drop(handle);

    if tokio::time::timeout(Duration::from_millis(400), task)
        .await
        .is_err()
    {
        warn!("Tuner task did not stop in time");
    }
    Ok(())
}
