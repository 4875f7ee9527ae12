//! In-memory radio for tests
//!
//! `FakeRadio` serves a scripted bonded-device list and hands out sockets
//! backed by `tokio::io::duplex`. The scanner side of every established link
//! is delivered through [`FakeRadio::next_peer`].
//!
//! ```ignore
//! let radio = FakeRadio::with_scanner();
//! let manager = TransportManager::new(radio.clone(), LinkConfig::default());
//! manager.connect("ESP32").await??;
//! let mut peer = radio.next_peer().await.unwrap();
//! peer.stream.write_all(b"rpm=850\n").await?;
//! ```

use crate::protocol::SocketSecurity;
use crate::radio::{BoxedChannel, DeviceDescriptor, RadioCapability, SppSocket};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Name of the device registered by [`FakeRadio::with_scanner`]
pub const SCANNER_NAME: &str = "ESP32_OBD2_Scanner";
/// Address of the device registered by [`FakeRadio::with_scanner`]
pub const SCANNER_ADDRESS: &str = "00:11:22:33:44:55";

/// How the fake socket handshake behaves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// Connect and hand the far end to the test
    Succeed,
    /// Fail with the given message
    Fail(String),
    /// Never complete
    Hang,
}

/// Scanner side of an established fake link
pub struct FakePeer {
    /// Address the socket was created for
    pub address: String,
    /// Socket variant that was used
    pub security: SocketSecurity,
    /// Far end of the duplex pipe
    pub stream: DuplexStream,
}

struct FakeState {
    adapter_available: bool,
    authorized: bool,
    devices: Vec<DeviceDescriptor>,
    fail_secure: bool,
    fail_insecure: bool,
    discovery_error: bool,
    handshake: Handshake,
    pipe_capacity: usize,
    sockets_created: Vec<SocketSecurity>,
}

/// Scriptable [`RadioCapability`]
pub struct FakeRadio {
    state: Mutex<FakeState>,
    peers_tx: mpsc::UnboundedSender<FakePeer>,
    peers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<FakePeer>>,
}

impl FakeRadio {
    /// Radio with the given bonded devices, adapter on and access granted
    pub fn new(devices: Vec<DeviceDescriptor>) -> Arc<Self> {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            state: Mutex::new(FakeState {
                adapter_available: true,
                authorized: true,
                devices,
                fail_secure: false,
                fail_insecure: false,
                discovery_error: false,
                handshake: Handshake::Succeed,
                pipe_capacity: 4096,
                sockets_created: Vec::new(),
            }),
            peers_tx,
            peers_rx: tokio::sync::Mutex::new(peers_rx),
        })
    }

    /// Radio with a single bonded scanner
    pub fn with_scanner() -> Arc<Self> {
        Self::new(vec![DeviceDescriptor::new(SCANNER_NAME, SCANNER_ADDRESS)])
    }

    pub fn set_adapter_available(&self, available: bool) {
        self.state.lock().adapter_available = available;
    }

    pub fn set_authorized(&self, authorized: bool) {
        self.state.lock().authorized = authorized;
    }

    /// Make secured and/or unsecured socket creation fail
    pub fn fail_socket_creation(&self, secure: bool, insecure: bool) {
        let mut state = self.state.lock();
        state.fail_secure = secure;
        state.fail_insecure = insecure;
    }

    /// Make discovery cancellation report a permission error
    pub fn fail_discovery_cancel(&self, fail: bool) {
        self.state.lock().discovery_error = fail;
    }

    pub fn set_handshake(&self, handshake: Handshake) {
        self.state.lock().handshake = handshake;
    }

    /// Socket variants created so far, in order
    pub fn sockets_created(&self) -> Vec<SocketSecurity> {
        self.state.lock().sockets_created.clone()
    }

    /// Wait for the scanner side of the next established link
    pub async fn next_peer(&self) -> Option<FakePeer> {
        self.peers_rx.lock().await.recv().await
    }
}

impl RadioCapability for FakeRadio {
    fn adapter_available(&self) -> bool {
        self.state.lock().adapter_available
    }

    fn is_authorized(&self) -> bool {
        self.state.lock().authorized
    }

    fn bonded_devices(&self) -> Vec<DeviceDescriptor> {
        self.state.lock().devices.clone()
    }

    fn cancel_discovery(&self) -> io::Result<()> {
        if self.state.lock().discovery_error {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "discovery cancel not permitted",
            ));
        }
        Ok(())
    }

    fn create_socket(
        &self,
        device: &DeviceDescriptor,
        _service: Uuid,
        security: SocketSecurity,
    ) -> io::Result<Box<dyn SppSocket>> {
        let mut state = self.state.lock();
        let fail = match security {
            SocketSecurity::Secure => state.fail_secure,
            SocketSecurity::Insecure => state.fail_insecure,
        };
        if fail {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{security:?} socket unavailable"),
            ));
        }
        state.sockets_created.push(security);
        Ok(Box::new(FakeSocket {
            address: device.address.clone(),
            security,
            handshake: state.handshake.clone(),
            pipe_capacity: state.pipe_capacity,
            peers_tx: self.peers_tx.clone(),
        }))
    }
}

struct FakeSocket {
    address: String,
    security: SocketSecurity,
    handshake: Handshake,
    pipe_capacity: usize,
    peers_tx: mpsc::UnboundedSender<FakePeer>,
}

#[async_trait]
impl SppSocket for FakeSocket {
    async fn connect(self: Box<Self>) -> io::Result<BoxedChannel> {
        let FakeSocket {
            address,
            security,
            handshake,
            pipe_capacity,
            peers_tx,
        } = *self;
        match handshake {
            Handshake::Succeed => {
                let (local, remote) = tokio::io::duplex(pipe_capacity);
                let _ = peers_tx.send(FakePeer {
                    address,
                    security,
                    stream: remote,
                });
                Ok(Box::new(local))
            }
            Handshake::Fail(message) => {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, message))
            }
            Handshake::Hang => std::future::pending().await,
        }
    }
}
