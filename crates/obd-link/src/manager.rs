//! Transport Manager
//!
//! Owns the scanner connection: resolves the device, runs the connect
//! handshake on a background task, drives the read loop and tears everything
//! down through a single idempotent `close()`.

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::line_reader::LineReader;
use crate::protocol::{frame_command, SocketSecurity};
use crate::radio::{resolve_device, BoxedChannel, DeviceDescriptor, RadioCapability, SppSocket};
use crate::state::{ConnectionState, ConnectionStateMachine};
use obd_telemetry::{decode_line, MetricsStore};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{broadcast, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

type SharedWriter = Arc<AsyncMutex<WriteHalf<BoxedChannel>>>;

const CANCELLED: &str = "connection attempt cancelled";

/// Cancellation signal shared by one attempt's workers
#[derive(Clone)]
struct CancelToken(Arc<watch::Sender<bool>>);

impl CancelToken {
    fn new() -> Self {
        Self(Arc::new(watch::channel(false).0))
    }

    fn cancel(&self) {
        self.0.send_replace(true);
    }

    fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    async fn cancelled(&self) {
        let mut rx = self.0.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Resources of one connection attempt
struct Session {
    attempt: u64,
    cancel: CancelToken,
    writer: Option<SharedWriter>,
    reader: Option<JoinHandle<()>>,
}

impl Session {
    fn new(attempt: u64, cancel: CancelToken) -> Self {
        Self {
            attempt,
            cancel,
            writer: None,
            reader: None,
        }
    }

    /// Best-effort release; never fails
    fn release(self) {
        self.cancel.cancel();
        if let Some(reader) = self.reader {
            reader.abort();
        }
        if let Some(writer) = self.writer {
            // Shutdown needs a runtime; without one dropping the half is enough.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = writer.lock().await.shutdown().await {
                        debug!("Ignoring writer shutdown error: {}", e);
                    }
                });
            }
        }
    }
}

struct Shared {
    radio: Arc<dyn RadioCapability>,
    config: LinkConfig,
    state: ConnectionStateMachine,
    metrics: MetricsStore,
    last_line: watch::Sender<String>,
    errors: broadcast::Sender<LinkError>,
    session: Mutex<Option<Session>>,
    attempts: AtomicU64,
}

/// Connection lifecycle manager for one scanner at a time
///
/// Cheap to clone; clones share the same connection and observables.
#[derive(Clone)]
pub struct TransportManager {
    inner: Arc<Shared>,
}

impl TransportManager {
    /// Create a manager over the given radio
    pub fn new(radio: Arc<dyn RadioCapability>, config: LinkConfig) -> Self {
        let (errors, _) = broadcast::channel(config.event_capacity.max(1));
        let (last_line, _) = watch::channel(String::new());
        Self {
            inner: Arc::new(Shared {
                radio,
                config,
                state: ConnectionStateMachine::new(),
                metrics: MetricsStore::new(),
                last_line,
                errors,
                session: Mutex::new(None),
                attempts: AtomicU64::new(0),
            }),
        }
    }

    /// Start connecting to the bonded device whose name matches `device_name`
    ///
    /// Returns immediately; the handshake runs on a background task. Any
    /// previous attempt or link is closed first. The returned handle resolves
    /// once the link is up or the attempt has failed; failures are also
    /// published on [`subscribe_errors`](Self::subscribe_errors) and as
    /// [`ConnectionState::Error`]. Must be called within a Tokio runtime.
    pub fn connect(&self, device_name: &str) -> JoinHandle<Result<(), LinkError>> {
        let cancel = CancelToken::new();
        let attempt = {
            let mut guard = self.inner.session.lock();
            let previous = guard.take();
            self.inner.finish(previous);
            let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            *guard = Some(Session::new(attempt, cancel.clone()));
            attempt
        };

        let inner = self.inner.clone();
        let device_name = device_name.to_string();
        info!("Connecting to scanner '{}' (attempt {})", device_name, attempt);

        tokio::spawn(async move {
            match inner.establish(attempt, &device_name, &cancel).await {
                Ok(()) => Ok(()),
                Err(err) if cancel.is_cancelled() => {
                    debug!("Attempt {} abandoned: {}", attempt, err);
                    Err(err)
                }
                Err(err) => {
                    inner.fail_attempt(attempt, err.clone());
                    Err(err)
                }
            }
        })
    }

    /// Write `command` followed by the configured terminator
    ///
    /// Fire-and-forget: no response is awaited. Fails with
    /// [`LinkError::NotConnected`] unless the link is connected, or if
    /// [`close`](Self::close) interrupts a pending write. A write failure
    /// closes the link.
    pub async fn send(&self, command: &str) -> Result<(), LinkError> {
        if self.state() != ConnectionState::Connected {
            return Err(LinkError::NotConnected);
        }
        let (attempt, cancel, writer) = {
            let guard = self.inner.session.lock();
            let session = guard.as_ref().ok_or(LinkError::NotConnected)?;
            let writer = session.writer.clone().ok_or(LinkError::NotConnected)?;
            (session.attempt, session.cancel.clone(), writer)
        };

        let frame = frame_command(command, &self.inner.config.command_terminator);
        // Dropping the write on close releases the writer lock and the half.
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Send of '{}' interrupted by close", command);
                return Err(LinkError::NotConnected);
            }
            result = async {
                let mut writer = writer.lock().await;
                writer.write_all(&frame).await?;
                writer.flush().await
            } => result,
        };

        match result {
            Ok(()) => {
                debug!("Sent command: {}", command);
                Ok(())
            }
            Err(e) => {
                let err = LinkError::from(e);
                warn!("Write failed, closing link: {}", err);
                self.inner.report(&err);
                self.inner.close_attempt(attempt);
                Err(err)
            }
        }
    }

    /// Tear down the current attempt or link
    ///
    /// Idempotent and safe to call concurrently. Publishes `Disconnected`
    /// once if an attempt or link was live.
    pub fn close(&self) {
        let mut guard = self.inner.session.lock();
        let session = guard.take();
        self.inner.finish(session);
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.inner.state.current()
    }

    /// Check if the link is up
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Subscribe to connection state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Latest decoded metrics
    pub fn metrics(&self) -> &MetricsStore {
        &self.inner.metrics
    }

    /// Most recent non-empty line received
    pub fn last_line(&self) -> String {
        self.inner.last_line.borrow().clone()
    }

    /// Subscribe to received lines
    pub fn subscribe_last_line(&self) -> watch::Receiver<String> {
        self.inner.last_line.subscribe()
    }

    /// Subscribe to link errors
    pub fn subscribe_errors(&self) -> broadcast::Receiver<LinkError> {
        self.inner.errors.subscribe()
    }

    /// Names of bonded devices, or their address when unnamed
    pub fn paired_device_names(&self) -> Vec<String> {
        self.inner
            .radio
            .bonded_devices()
            .iter()
            .map(|d| d.display_name().to_string())
            .collect()
    }

    /// Link configuration
    pub fn config(&self) -> &LinkConfig {
        &self.inner.config
    }
}

impl Shared {
    async fn establish(
        self: &Arc<Self>,
        attempt: u64,
        device_name: &str,
        cancel: &CancelToken,
    ) -> Result<(), LinkError> {
        if !self.radio.adapter_available() {
            return Err(LinkError::AdapterUnavailable);
        }
        if !self.radio.is_authorized() {
            return Err(LinkError::PermissionDenied);
        }
        self.transition_attempt(attempt, ConnectionState::Discovering)?;
        let devices = self.radio.bonded_devices();
        let device = resolve_device(&devices, device_name)
            .cloned()
            .ok_or_else(|| LinkError::DeviceNotFound(device_name.to_string()))?;
        info!("Resolved '{}' to {} ({})", device_name, device.name, device.address);

        let socket = self.create_socket(&device)?;

        if let Err(e) = self.radio.cancel_discovery() {
            debug!("Ignoring discovery cancel failure: {}", e);
        }

        if !self.transition_attempt(attempt, ConnectionState::Connecting)? {
            return Err(LinkError::ConnectFailed(CANCELLED.to_string()));
        }
        info!("Connecting to {}", device.address);

        let timeout = self.config.connect_timeout();
        let channel = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(LinkError::ConnectFailed(CANCELLED.to_string()));
            }
            result = tokio::time::timeout(timeout, socket.connect()) => match result {
                Ok(Ok(channel)) => channel,
                Ok(Err(e)) => return Err(LinkError::ConnectFailed(e.to_string())),
                Err(_) => {
                    return Err(LinkError::ConnectFailed(format!(
                        "handshake timed out after {}ms",
                        self.config.connect_timeout_ms
                    )))
                }
            },
        };

        let (reader, writer) = tokio::io::split(channel);
        let mut guard = self.session.lock();
        match guard.as_mut() {
            Some(session) if session.attempt == attempt && !cancel.is_cancelled() => {
                session.writer = Some(Arc::new(AsyncMutex::new(writer)));
                self.state.transition(ConnectionState::Connected);
                info!("Connected to {}", device.address);
                session.reader = Some(tokio::spawn(read_loop(
                    self.clone(),
                    attempt,
                    reader,
                    cancel.clone(),
                )));
                Ok(())
            }
            _ => Err(LinkError::ConnectFailed(CANCELLED.to_string())),
        }
    }

    /// Apply a state transition only while `attempt` owns the session
    ///
    /// Fails if the attempt was closed or superseded; otherwise returns
    /// whether the state changed.
    fn transition_attempt(&self, attempt: u64, next: ConnectionState) -> Result<bool, LinkError> {
        let guard = self.session.lock();
        match guard.as_ref() {
            Some(session) if session.attempt == attempt && !session.cancel.is_cancelled() => {
                Ok(self.state.transition(next))
            }
            _ => Err(LinkError::ConnectFailed(CANCELLED.to_string())),
        }
    }

    /// Secured socket first, unsecured on failure
    fn create_socket(&self, device: &DeviceDescriptor) -> Result<Box<dyn SppSocket>, LinkError> {
        let mut last_error = None;
        for security in SocketSecurity::FALLBACK_ORDER {
            match self
                .radio
                .create_socket(device, self.config.service_uuid, security)
            {
                Ok(socket) => {
                    debug!("Created {:?} socket for {}", security, device.address);
                    return Ok(socket);
                }
                Err(e) => {
                    debug!("{:?} socket creation failed: {}", security, e);
                    last_error = Some(e);
                }
            }
        }
        Err(LinkError::SocketCreationFailed(
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    fn fail_attempt(&self, attempt: u64, err: LinkError) {
        // Held until the Error state is published so a newer attempt cannot
        // start in between.
        let mut guard = self.session.lock();
        let session = match guard.as_ref() {
            Some(session) if session.attempt == attempt => guard.take(),
            _ => None,
        };
        let Some(session) = session else {
            debug!("Attempt {} superseded, dropping error: {}", attempt, err);
            return;
        };
        session.release();

        error!("Connection attempt failed: {}", err);
        self.report(&err);
        self.state.transition(ConnectionState::Error(err));
    }

    fn close_attempt(&self, attempt: u64) {
        let mut guard = self.session.lock();
        let session = match guard.as_ref() {
            Some(session) if session.attempt == attempt => guard.take(),
            _ => None,
        };
        if session.is_some() {
            self.finish(session);
        }
    }

    fn finish(&self, session: Option<Session>) {
        if self.state.transition(ConnectionState::Disconnected) {
            info!("Scanner link disconnected");
        }
        if let Some(session) = session {
            session.release();
        }
    }

    fn report(&self, err: &LinkError) {
        let _ = self.errors.send(err.clone());
    }

    fn handle_line(&self, line: String) {
        let decoded = decode_line(&line);
        trace!("RX ({:?}): {}", decoded.format, line);
        self.last_line.send_replace(line);
        if !decoded.is_empty() {
            self.metrics.apply(&decoded.updates);
        }
    }
}

/// Read until cancelled, end of stream or error, then close the attempt
async fn read_loop(
    shared: Arc<Shared>,
    attempt: u64,
    mut reader: ReadHalf<BoxedChannel>,
    cancel: CancelToken,
) {
    let mut lines = LineReader::new(shared.config.max_line_len);
    let mut buf = vec![0u8; shared.config.read_chunk_size.max(1)];

    let outcome: Result<(), LinkError> = loop {
        if cancel.is_cancelled() {
            break Ok(());
        }
        let read = tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            read = reader.read(&mut buf) => read,
        };
        match read {
            Ok(0) => {
                info!("Scanner closed the stream");
                break Ok(());
            }
            Ok(n) => {
                if let Err(e) = lines.push(&buf[..n], |line| shared.handle_line(line)) {
                    break Err(e.into());
                }
            }
            Err(e) => break Err(e.into()),
        }
    };

    if let Err(err) = outcome {
        warn!("Read loop stopped: {}", err);
        shared.report(&err);
    }
    shared.close_attempt(attempt);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRadio, Handshake, SCANNER_NAME};
    use std::time::Duration;

    fn manager(radio: &Arc<FakeRadio>) -> TransportManager {
        TransportManager::new(radio.clone(), LinkConfig::default())
    }

    #[test]
    fn test_new_manager_is_idle() {
        let radio = FakeRadio::with_scanner();
        let manager = manager(&radio);
        assert_eq!(manager.state(), ConnectionState::Idle);
        assert_eq!(manager.last_line(), "");
        assert!(!manager.is_connected());
    }

    #[test]
    fn test_close_when_idle_is_noop() {
        let radio = FakeRadio::with_scanner();
        let manager = manager(&radio);
        manager.close();
        manager.close();
        assert_eq!(manager.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_send_before_connect_is_rejected() {
        let radio = FakeRadio::with_scanner();
        let manager = manager(&radio);
        assert_eq!(manager.send("ATZ").await, Err(LinkError::NotConnected));
    }

    #[test]
    fn test_paired_device_names() {
        let radio = FakeRadio::new(vec![
            DeviceDescriptor::new("ESP32_OBD2_Scanner", "AA:BB"),
            DeviceDescriptor::new("", "CC:DD"),
        ]);
        let manager = manager(&radio);
        assert_eq!(manager.paired_device_names(), vec!["ESP32_OBD2_Scanner", "CC:DD"]);
    }

    #[tokio::test]
    async fn test_superseded_attempt_cannot_move_state() {
        let radio = FakeRadio::with_scanner();
        radio.set_handshake(Handshake::Hang);
        let manager = manager(&radio);
        let mut state = manager.subscribe_state();

        let _first = manager.connect(SCANNER_NAME);
        let _second = manager.connect(SCANNER_NAME);
        tokio::time::timeout(
            Duration::from_secs(2),
            state.wait_for(|s| *s == ConnectionState::Connecting),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(manager
            .inner
            .transition_attempt(1, ConnectionState::Discovering)
            .is_err());
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(
            manager.inner.transition_attempt(2, ConnectionState::Connecting),
            Ok(false)
        );
    }
}
