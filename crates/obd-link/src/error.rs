//! Link Error Types

use thiserror::Error;

/// Errors that can occur while establishing or running a scanner link
///
/// Causes are carried as strings so a single error can be broadcast to every
/// observer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// No radio adapter present, or it is disabled
    #[error("Radio adapter not available")]
    AdapterUnavailable,

    /// The platform has not granted radio access
    #[error("Radio permissions not granted")]
    PermissionDenied,

    /// No bonded device matched the requested name
    #[error("Device not paired: {0}")]
    DeviceNotFound(String),

    /// Neither a secured nor an unsecured socket could be created
    #[error("Failed to create SPP socket: {0}")]
    SocketCreationFailed(String),

    /// The connect handshake failed, timed out or was cancelled
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// Read or write failure on an established link
    #[error("I/O error: {0}")]
    IoError(String),

    /// A command was sent while no link was connected
    #[error("Scanner link is not connected")]
    NotConnected,
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::IoError(err.to_string())
    }
}
