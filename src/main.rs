//! speaker-core - control core of a networked speaker
//!
//! Arbitrates between the streaming daemon and Bluetooth, admits a single
//! Bluetooth peer, turns button presses into volume/transport commands and
//! serves the companion-app API.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use speaker_core::api;
use speaker_core::config::{AppConfig, IndicatorBackend, InputBackend};
use speaker_core::controller::Controller;
use speaker_core::drivers::{
    BluezSource, Collaborators, GpioIndicators, Indicators, LogIndicators, OscMixer,
    PlayerctlSource, ShellTools,
};
use speaker_core::input::{console, gpio::GpioButtons, ButtonEvent, Debouncer};
use speaker_core::paths::AppPaths;
use speaker_core::settings::{LoadOutcome, SettingsStore};

/// Speaker control core
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to the detected app directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Write the log file as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Override the button input backend
    #[arg(long, value_enum)]
    input: Option<InputBackend>,

    /// Override the API port
    #[arg(long)]
    api_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut paths = AppPaths::detect();
    if let Some(config) = &args.config {
        paths.config = config.clone();
    }
    paths.ensure_directories()?;

    let _log_guard = init_logging(&args.log_level, args.log_json, &paths.logs_dir)?;

    info!("Starting speaker-core v{}", env!("CARGO_PKG_VERSION"));
    info!("App directory: {}", paths.base_dir().display());

    let mut config = AppConfig::load_or_default(&paths.config).await?;
    if let Some(backend) = args.input {
        config.buttons.backend = backend;
    }
    if let Some(port) = args.api_port {
        config.api.port = port;
    }
    config.validate()?;

    let (settings, outcome) = SettingsStore::open(&paths.settings);
    match outcome {
        LoadOutcome::Loaded => info!("Settings loaded from {}", paths.settings.display()),
        LoadOutcome::CreatedDefaults => info!("📝 First start, default settings created"),
        LoadOutcome::RecoveredDefaults => warn!("⚠️  Settings unreadable, running on defaults"),
    }

    let collaborators = build_collaborators(&config).await?;
    let controller = Controller::new(settings.clone(), collaborators, &config);
    controller
        .boot(config.audio.hardware_volume, &config.audio.hotspot_ssid)
        .await;

    run_app(controller, &config).await?;

    if let Err(e) = settings.flush().await {
        warn!("Failed to flush settings: {}", e);
    }
    settings.shutdown();
    info!("speaker-core shutdown complete");
    Ok(())
}

async fn run_app(controller: Arc<Controller>, config: &AppConfig) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (command_tx, command_rx) = mpsc::channel(64);
    let (event_tx, event_rx) = mpsc::channel::<ButtonEvent>(64);

    let debouncer = Debouncer::new(controller.clone(), command_tx, &config.timing);
    tokio::spawn(debouncer.run(event_rx));

    let mut console_task = None;
    match config.buttons.backend {
        InputBackend::Gpio => match GpioButtons::open(&config.buttons).await {
            Ok(buttons) => {
                tokio::spawn(buttons.run(event_tx, shutdown_rx.clone()));
            }
            Err(e) => warn!("⚠️  Buttons unavailable, continuing without them: {:#}", e),
        },
        InputBackend::Console => {
            console_task = Some(tokio::spawn(console::run(event_tx)));
        }
        InputBackend::None => info!("Button input disabled"),
    }

    let supervisor = tokio::spawn(controller.clone().run(command_rx, shutdown_rx.clone()));

    let addr = config.api_addr()?;
    let server = tokio::spawn(api::start_server(controller, addr, shutdown_rx));

    info!("✅ Ready");

    tokio::select! {
        _ = shutdown_signal() => {}
        Some(result) = async {
            match console_task.as_mut() {
                Some(task) => Some(task.await),
                None => std::future::pending().await,
            }
        } => {
            match result {
                Ok(Ok(())) => info!("Console closed"),
                Ok(Err(e)) => warn!("Console failed: {:#}", e),
                Err(e) => warn!("Console task panicked: {}", e),
            }
        }
    }

    info!("Shutting down...");
    let _ = shutdown_tx.send(true);

    if let Err(e) = supervisor.await {
        warn!("Supervisory loop ended abnormally: {}", e);
    }
    match server.await {
        Ok(result) => result?,
        Err(e) => warn!("API server task ended abnormally: {}", e),
    }
    Ok(())
}

async fn build_collaborators(config: &AppConfig) -> Result<Collaborators> {
    let secondary = BluezSource::connect(&config.bluetooth)
        .await
        .context("Failed to connect to the Bluetooth stack")?;
    let mixer = OscMixer::bind(&config.mixer)
        .await
        .context("Failed to open the mixer control socket")?;

    let indicators: Arc<dyn Indicators> = match config.indicators.backend {
        IndicatorBackend::Gpio => {
            match GpioIndicators::open(&config.indicators, config.timing.led_timeout()).await {
                Ok(leds) => Arc::new(leds),
                Err(e) => {
                    warn!("⚠️  LEDs unavailable, logging indicator changes instead: {:#}", e);
                    Arc::new(LogIndicators::new())
                }
            }
        }
        IndicatorBackend::Log => Arc::new(LogIndicators::new()),
    };

    Ok(Collaborators {
        primary: Arc::new(PlayerctlSource::new(&config.primary)),
        secondary: Arc::new(secondary),
        mixer: Arc::new(mixer),
        indicators,
        system: Arc::new(ShellTools::new(&config.primary, &config.audio)),
    })
}

fn init_logging(level: &str, json: bool, logs_dir: &Path) -> Result<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let appender = tracing_appender::rolling::daily(logs_dir, "speaker-core.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}
