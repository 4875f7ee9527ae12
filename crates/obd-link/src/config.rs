//! Link configuration

use crate::protocol::{COMMAND_TERMINATOR, SPP_SERVICE_UUID};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Scanner link configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Service identifier the socket is addressed to
    pub service_uuid: Uuid,

    /// Upper bound on the connect handshake (milliseconds)
    pub connect_timeout_ms: u64,

    /// Bytes requested per read from the channel
    pub read_chunk_size: usize,

    /// Longest unterminated line tolerated before the link is dropped
    pub max_line_len: usize,

    /// Appended to every outbound command
    pub command_terminator: String,

    /// Buffered error events per subscriber
    pub event_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            service_uuid: SPP_SERVICE_UUID,
            connect_timeout_ms: 10_000,
            read_chunk_size: 1024,
            max_line_len: 4096,
            command_terminator: COMMAND_TERMINATOR.to_string(),
            event_capacity: 64,
        }
    }
}

impl LinkConfig {
    /// Handshake timeout as a duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
