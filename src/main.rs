//! boxscan - QR box scanning and transfer reconciliation
//!
//! `scan` runs a live camera session against a transfer manifest.
//! `replay` drives the same session from a scripted code list, which is
//! how the tool is exercised on machines without a camera.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "camera")]
use boxscan::capture::camera::{self, CameraSource};
use boxscan::capture::synthetic::SyntheticSource;
use boxscan::config::{DecodeBackend, Settings};
use boxscan::decode::{self, replay::ReplayDecoder, DecodeStrategy};
use boxscan::reconcile::{AckOutcome, BoxLabel, Reconciliation, TransferManifest};
use boxscan::scan::{new_seen, ScanConfig, ScanController, ScanMode, ScanUpdate};
use boxscan::{LumaFrame, ScanError, SharedSeen};

#[derive(Parser)]
#[command(
    name = "boxscan",
    version,
    about = "Scan box labels and reconcile warehouse transfers"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan live camera frames against a transfer manifest.
    Scan {
        /// Transfer manifest listing the expected boxes.
        manifest: PathBuf,
        /// Keep scanning after each accepted code.
        #[arg(long)]
        continuous: bool,
        /// Camera index override.
        #[arg(long)]
        camera: Option<u32>,
        /// Decode backend override.
        #[arg(long, value_enum, default_value = "auto")]
        backend: BackendArg,
        /// Write the receipt confirmation here once complete.
        #[arg(long)]
        receipt: Option<PathBuf>,
    },
    /// Replay a scripted code list against a manifest, no camera needed.
    Replay {
        manifest: PathBuf,
        /// File with one code payload per line.
        codes: PathBuf,
        /// Seconds between replayed codes.
        #[arg(long, default_value_t = 0.5)]
        gap: f64,
        #[arg(long)]
        receipt: Option<PathBuf>,
    },
    /// Decode a single image file and print what it contains.
    Decode {
        image: PathBuf,
        #[arg(long, value_enum, default_value = "auto")]
        backend: BackendArg,
    },
    /// List available cameras.
    Devices,
    /// Show the active settings.
    Config {
        /// Write a settings file with the current values.
        #[arg(long)]
        init: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Auto,
    Multiformat,
    Qronly,
}

impl BackendArg {
    fn to_backend(self) -> DecodeBackend {
        match self {
            BackendArg::Auto => DecodeBackend::Auto,
            BackendArg::Multiformat => DecodeBackend::MultiFormat,
            BackendArg::Qronly => DecodeBackend::QrOnly,
        }
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    info!("boxscan v{}", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("failed to start runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(args)) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = Settings::load().unwrap_or_else(|e| {
        warn!("settings unreadable, using defaults: {e:#}");
        Settings::default()
    });

    match args.command {
        Command::Scan {
            manifest,
            continuous,
            camera,
            backend,
            receipt,
        } => run_scan(settings, manifest, continuous, camera, backend.to_backend(), receipt).await,
        Command::Replay {
            manifest,
            codes,
            gap,
            receipt,
        } => run_replay(settings, manifest, codes, gap, receipt).await,
        Command::Decode { image, backend } => run_decode(image, backend.to_backend()),
        Command::Devices => run_devices(),
        Command::Config { init } => run_config(settings, init),
    }
}

#[cfg(feature = "camera")]
async fn run_scan(
    mut settings: Settings,
    manifest_path: PathBuf,
    continuous: bool,
    camera: Option<u32>,
    backend: DecodeBackend,
    receipt: Option<PathBuf>,
) -> Result<()> {
    if continuous {
        settings.continuous = true;
    }
    if let Some(index) = camera {
        settings.camera_index = index;
    }
    if backend != DecodeBackend::Auto {
        settings.decode_backend = backend;
    }

    let manifest = TransferManifest::from_file(&manifest_path)?;
    let mut reconciliation = Reconciliation::new();
    reconciliation.load_expected(manifest);

    let cfg = ScanConfig::from_settings(&settings);
    let source = Box::new(CameraSource::new(&settings));
    let strategy = decode::select_strategy(settings.decode_backend);
    let seen = new_seen();
    let (controller, events) = ScanController::start(cfg, source, Some(strategy), seen.clone());

    drive_session(controller, events, reconciliation, seen, receipt).await
}

#[cfg(not(feature = "camera"))]
async fn run_scan(
    _settings: Settings,
    _manifest_path: PathBuf,
    _continuous: bool,
    _camera: Option<u32>,
    _backend: DecodeBackend,
    _receipt: Option<PathBuf>,
) -> Result<()> {
    anyhow::bail!("built without camera support; use the replay subcommand")
}

async fn run_replay(
    settings: Settings,
    manifest_path: PathBuf,
    codes_path: PathBuf,
    gap: f64,
    receipt: Option<PathBuf>,
) -> Result<()> {
    let manifest = TransferManifest::from_file(&manifest_path)?;
    let mut reconciliation = Reconciliation::new();
    reconciliation.load_expected(manifest);

    let raw = std::fs::read_to_string(&codes_path)
        .with_context(|| format!("reading codes from {}", codes_path.display()))?;
    let codes: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect();
    if codes.is_empty() {
        anyhow::bail!("no codes in {}", codes_path.display());
    }
    info!("replaying {} codes with a {:.1}s gap", codes.len(), gap);

    let mut cfg = ScanConfig::from_settings(&settings);
    cfg.mode = ScanMode::Continuous;
    let source = Box::new(SyntheticSource::new(320, 240, 30));
    let strategy: Box<dyn DecodeStrategy> =
        Box::new(ReplayDecoder::with_gap(codes, Duration::from_secs_f64(gap)));
    let seen = new_seen();
    let (controller, events) = ScanController::start(cfg, source, Some(strategy), seen.clone());

    drive_session(controller, events, reconciliation, seen, receipt).await
}

/// Pumps session updates and stdin until the transfer is complete or
/// the operator stops. Typed lines are manual entries; `all` matches
/// everything, `still` forces a single capture report, `done` stops.
async fn drive_session(
    mut controller: ScanController,
    mut events: tokio::sync::mpsc::Receiver<ScanUpdate>,
    mut reconciliation: Reconciliation,
    seen: SharedSeen,
    receipt: Option<PathBuf>,
) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdin_open = true;
    let mut manual_hint_shown = false;

    loop {
        tokio::select! {
            update = events.recv() => {
                match update {
                    Some(ScanUpdate::Activated { decoder }) => {
                        info!(
                            "scanning with the {} engine; type a code for manual entry",
                            decoder.as_str()
                        );
                    }
                    Some(ScanUpdate::Code(event)) => {
                        handle_code(&mut reconciliation, &seen, &event.value);
                        if reconciliation.is_complete() {
                            info!("all boxes matched");
                            break;
                        }
                    }
                    Some(ScanUpdate::NothingDetected) => {
                        warn!("{}", ScanError::DecodeNotFound);
                    }
                    Some(ScanUpdate::Failed { error }) => {
                        warn!("{error}");
                        if error.manual_entry_applies() && !manual_hint_shown {
                            manual_hint_shown = true;
                            info!("type codes manually, one per line; 'all' matches everything, 'done' stops");
                        }
                    }
                    Some(ScanUpdate::Closed { stats }) => {
                        info!(
                            "session closed: {} frames, {} manual entries, {} suppressed",
                            stats.frames_seen, stats.manual_entries, stats.suppressed
                        );
                        break;
                    }
                    None => break,
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(text)) => {
                        match text.trim() {
                            "" => {}
                            "done" | "quit" => break,
                            "all" => {
                                reconciliation.acknowledge_all();
                                if reconciliation.is_complete() {
                                    break;
                                }
                            }
                            "still" => controller.capture_still().await,
                            code => controller.enter_manual(code).await,
                        }
                    }
                    Ok(None) => {
                        stdin_open = false;
                    }
                    Err(e) => {
                        debug!("stdin error: {e}");
                        stdin_open = false;
                    }
                }
            }
        }
    }

    controller.stop().await;

    match reconciliation.confirm() {
        Ok(confirmation) => {
            info!(
                "receipt {} confirmed for transfer {} ({} boxes)",
                confirmation.confirmation_id, confirmation.transaction_ref, confirmation.box_count
            );
            if let Some(path) = receipt {
                let raw = serde_json::to_string_pretty(&confirmation)?;
                std::fs::write(&path, raw)
                    .with_context(|| format!("writing receipt to {}", path.display()))?;
                info!("receipt written to {}", path.display());
            }
            Ok(())
        }
        Err(ScanError::ReconcileIncomplete { matched, total }) => {
            warn!("transfer not confirmed: {matched} of {total} boxes matched");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn handle_code(reconciliation: &mut Reconciliation, seen: &SharedSeen, value: &str) {
    match reconciliation.acknowledge(value) {
        AckOutcome::Matched { box_id } => {
            seen.write().insert(value.to_string());
            info!("matched {box_id}, progress {}", reconciliation.progress());
        }
        AckOutcome::AlreadyMatched { box_id } => {
            seen.write().insert(value.to_string());
            debug!("{box_id} was already matched");
        }
        AckOutcome::NoMatch => {
            warn!("{value:?} does not match any expected box");
        }
    }
}

fn run_decode(path: PathBuf, backend: DecodeBackend) -> Result<()> {
    let img = image::open(&path)
        .with_context(|| format!("opening {}", path.display()))?
        .to_luma8();
    let (width, height) = img.dimensions();
    let frame = LumaFrame::new(width, height, img.into_raw());
    let mut strategy = decode::select_strategy(backend);
    match strategy.decode(&frame) {
        Some(event) => {
            println!("{}", event.value);
            if let Some(label) = BoxLabel::parse(&event.value) {
                info!("label: {}", label.summary());
            }
            Ok(())
        }
        None => Err(ScanError::DecodeNotFound.into()),
    }
}

#[cfg(feature = "camera")]
fn run_devices() -> Result<()> {
    let devices = camera::list_devices()?;
    if devices.is_empty() {
        warn!("no cameras found");
        return Ok(());
    }
    for device in devices {
        println!("{}: {} ({})", device.index, device.name, device.description);
    }
    Ok(())
}

#[cfg(not(feature = "camera"))]
fn run_devices() -> Result<()> {
    anyhow::bail!("built without camera support")
}

fn run_config(settings: Settings, init: bool) -> Result<()> {
    if init {
        settings.save()?;
        if let Some(path) = boxscan::config::file_path() {
            info!("settings written to {}", path.display());
        }
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);
    println!();
    println!("decode backends:");
    for backend in DecodeBackend::all() {
        println!("  {:<12} {}", backend.as_str(), backend.description());
    }
    Ok(())
}
