//! OBD-II Monitor
//!
//! Connects to a paired scanner, sends the configured wake commands and
//! prints the live metrics snapshot as JSON lines until the link ends or the
//! process is interrupted.

use anyhow::{Context, Result};
use obd_link::{ConnectionState, TransportManager};
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod serial;

pub use config::{DeviceConfig, LogConfig, MonitorConfig};
pub use serial::{SerialDevice, SerialRadio};

/// Initialize logging
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Connect and stream snapshots to `out` until the link ends or `shutdown`
///
/// Returns an error if the connection attempt fails; a link that comes up and
/// later drops ends the run normally.
pub async fn run_monitor<F, W>(
    manager: &TransportManager,
    config: &MonitorConfig,
    shutdown: F,
    out: &mut W,
) -> Result<()>
where
    F: Future<Output = ()>,
    W: Write,
{
    let mut state_rx = manager.subscribe_state();
    let mut errors = manager.subscribe_errors();
    tokio::pin!(shutdown);

    let print_snapshots = config.snapshot_interval_ms > 0;
    let mut ticker = tokio::time::interval(Duration::from_millis(config.snapshot_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let _attempt = manager.connect(&config.device_name);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                manager.close();
                return Ok(());
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = state_rx.borrow_and_update().clone();
                info!("Scanner: {}", state.status_text());
                match state {
                    ConnectionState::Connected => send_init_commands(manager, &config.init_commands).await,
                    ConnectionState::Disconnected => return Ok(()),
                    ConnectionState::Error(err) => {
                        return Err(err).context(format!("Connection to '{}' failed", config.device_name));
                    }
                    _ => {}
                }
            }
            received = errors.recv() => match received {
                Ok(err) => warn!("Link error: {}", err),
                Err(RecvError::Lagged(n)) => debug!("Missed {} link errors", n),
                Err(RecvError::Closed) => return Ok(()),
            },
            _ = ticker.tick(), if print_snapshots => {
                if manager.is_connected() {
                    serde_json::to_writer(&mut *out, &manager.metrics().snapshot())?;
                    writeln!(out)?;
                    out.flush()?;
                }
            }
        }
    }
}

async fn send_init_commands(manager: &TransportManager, commands: &[String]) {
    for command in commands {
        if let Err(e) = manager.send(command).await {
            error!("Failed to send init command '{}': {}", command, e);
            return;
        }
    }
    if !commands.is_empty() {
        info!("Sent {} init commands", commands.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_link::testing::{FakeRadio, Handshake};
    use obd_link::LinkConfig;
    use obd_telemetry::Metric;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn manager(radio: &std::sync::Arc<FakeRadio>) -> TransportManager {
        TransportManager::new(radio.clone(), LinkConfig::default())
    }

    #[tokio::test]
    async fn test_run_streams_snapshots_until_link_drops() {
        let radio = FakeRadio::with_scanner();
        let manager = manager(&radio);
        let config = MonitorConfig {
            init_commands: vec!["ATZ".to_string(), "ATE0".to_string()],
            snapshot_interval_ms: 10,
            ..MonitorConfig::default()
        };
        let mut out = Vec::new();

        let scanner = async {
            let mut peer = radio.next_peer().await.unwrap();
            let mut buf = [0u8; 9];
            peer.stream.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"ATZ\rATE0\r");

            peer.stream.write_all(b"rpm=850\n").await.unwrap();
            let mut rpm = manager.metrics().watch(Metric::Rpm);
            rpm.wait_for(|v| *v == 850.0).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        };

        let (result, ()) = tokio::join!(
            run_monitor(&manager, &config, std::future::pending::<()>(), &mut out),
            scanner
        );
        result.unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        let text = String::from_utf8(out).unwrap();
        let last: serde_json::Value =
            serde_json::from_str(text.lines().last().unwrap()).unwrap();
        assert_eq!(last["rpm"], 850.0);
        assert_eq!(last["speed"], 0.0);
    }

    #[tokio::test]
    async fn test_run_reports_connect_failure() {
        let radio = FakeRadio::with_scanner();
        let manager = manager(&radio);
        let config = MonitorConfig {
            device_name: "Nonexistent".to_string(),
            ..MonitorConfig::default()
        };
        let mut out = Vec::new();

        let err = run_monitor(&manager, &config, std::future::pending::<()>(), &mut out)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Nonexistent"));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_closes_pending_attempt() {
        let radio = FakeRadio::with_scanner();
        radio.set_handshake(Handshake::Hang);
        let manager = manager(&radio);
        let config = MonitorConfig::default();
        let mut out = Vec::new();

        let shutdown = tokio::time::sleep(Duration::from_millis(20));
        run_monitor(&manager, &config, shutdown, &mut out).await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}
