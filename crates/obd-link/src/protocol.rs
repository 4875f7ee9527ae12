//! Serial Port Profile Definitions

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Well-known Serial Port Profile service class identifier
pub const SPP_SERVICE_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Default outbound command terminator
pub const COMMAND_TERMINATOR: &str = "\r";

/// Socket variant requested from the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketSecurity {
    /// Authenticated and encrypted channel
    Secure,
    /// Plain channel, used when the secured variant cannot be created
    Insecure,
}

impl SocketSecurity {
    /// Order in which socket variants are attempted
    pub const FALLBACK_ORDER: [SocketSecurity; 2] = [SocketSecurity::Secure, SocketSecurity::Insecure];

    pub fn is_secure(&self) -> bool {
        matches!(self, SocketSecurity::Secure)
    }
}

/// Raw bytes for an outbound command: the text followed by the terminator
pub fn frame_command(command: &str, terminator: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(command.len() + terminator.len());
    frame.extend_from_slice(command.as_bytes());
    frame.extend_from_slice(terminator.as_bytes());
    frame
}
