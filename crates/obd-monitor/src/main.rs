//! OBD-II Monitor - Main Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use obd_link::TransportManager;
use obd_monitor::config::DEFAULT_CONFIG_PATH;
use obd_monitor::{init_logging, run_monitor, MonitorConfig, SerialRadio};
use obd_telemetry::Metric;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "obd-monitor")]
#[command(about = "Stream live OBD-II metrics from a paired scanner")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Device name to connect to (exact or partial)
    #[arg(short, long)]
    device: Option<String>,

    /// Log filter, e.g. "debug" or "obd_link=trace"
    #[arg(long)]
    log_level: Option<String>,

    /// Log as JSON lines
    #[arg(long)]
    json: bool,

    /// Handshake timeout in milliseconds
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Snapshot print interval in milliseconds (0 disables)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Command to send after connecting (repeatable)
    #[arg(long = "init")]
    init_commands: Vec<String>,

    /// List paired devices and exit
    #[arg(long)]
    list_devices: bool,

    /// List supported metrics and exit
    #[arg(long)]
    list_metrics: bool,
}

impl Args {
    fn apply(&self, config: &mut MonitorConfig) {
        if let Some(device) = &self.device {
            config.device_name = device.clone();
        }
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        if self.json {
            config.log.json = true;
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.link.connect_timeout_ms = ms;
        }
        if let Some(ms) = self.interval_ms {
            config.snapshot_interval_ms = ms;
        }
        if !self.init_commands.is_empty() {
            config.init_commands = self.init_commands.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = MonitorConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    args.apply(&mut config);

    if args.list_metrics {
        for metric in Metric::ALL {
            println!("{:<20} {:<28} {}", metric.name(), metric.label(), metric.unit());
        }
        return Ok(());
    }

    init_logging(&config.log);
    info!("=== OBD Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    // Port enumeration blocks
    let radio = tokio::task::spawn_blocking({
        let config = config.clone();
        move || SerialRadio::from_config(&config)
    })
    .await
    .context("Serial port enumeration panicked")?;
    let radio = Arc::new(radio);
    let manager = TransportManager::new(radio, config.link.clone());

    if args.list_devices {
        for name in manager.paired_device_names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let mut stdout = std::io::stdout();
    run_monitor(&manager, &config, shutdown, &mut stdout).await
}
