//! Radio Capability
//!
//! The platform pieces the link needs (adapter state, authorization, the
//! bonded-device registry and socket creation) sit behind one trait so the
//! transport can run against real hardware or an in-memory fake.

use crate::protocol::SocketSecurity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use uuid::Uuid;

/// A duplex byte stream to the scanner
pub trait ByteChannel: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ByteChannel for T {}

/// Boxed duplex byte stream
pub type BoxedChannel = Box<dyn ByteChannel>;

/// A previously bonded device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Advertised name, may be empty
    pub name: String,
    /// Hardware address
    pub address: String,
}

impl DeviceDescriptor {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Name for display, falling back to the address for unnamed devices
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.address
        } else {
            &self.name
        }
    }
}

/// A created but not yet connected socket
#[async_trait]
pub trait SppSocket: Send {
    /// Perform the connect handshake
    async fn connect(self: Box<Self>) -> io::Result<BoxedChannel>;
}

/// Platform radio access
pub trait RadioCapability: Send + Sync {
    /// Whether an adapter is present and enabled
    fn adapter_available(&self) -> bool;

    /// Whether radio access is currently permitted
    fn is_authorized(&self) -> bool;

    /// Devices bonded with this host
    fn bonded_devices(&self) -> Vec<DeviceDescriptor>;

    /// Stop any in-progress device discovery
    fn cancel_discovery(&self) -> io::Result<()> {
        Ok(())
    }

    /// Create a socket addressed to `service` on `device`
    fn create_socket(
        &self,
        device: &DeviceDescriptor,
        service: Uuid,
        security: SocketSecurity,
    ) -> io::Result<Box<dyn SppSocket>>;
}

/// Find the device to connect to by name
///
/// A case-insensitive exact match is preferred; otherwise the first device
/// whose name contains `wanted` is returned.
pub fn resolve_device<'a>(
    devices: &'a [DeviceDescriptor],
    wanted: &str,
) -> Option<&'a DeviceDescriptor> {
    let wanted = wanted.to_lowercase();
    devices
        .iter()
        .find(|d| d.name.to_lowercase() == wanted)
        .or_else(|| {
            devices
                .iter()
                .find(|d| d.name.to_lowercase().contains(&wanted))
        })
}
