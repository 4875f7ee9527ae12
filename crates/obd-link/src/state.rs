//! Connection State Machine
//!
//! ```text
//!   Idle ──► Discovering ──► Connecting ──► Connected
//!                │               │              │
//!                └───────────────┴──────────────┴──► Disconnected | Error
//! ```
//!
//! Every connect attempt re-enters at `Discovering`, whatever the previous
//! state. `Error` is reachable from any state. The state is published through
//! a watch channel; only accepted transitions are visible to observers.

use crate::error::LinkError;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Lifecycle state of the current connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing attempted yet
    Idle,
    /// Resolving the device in the bonded registry
    Discovering,
    /// Connect handshake in progress
    Connecting,
    /// Link up, read loop running
    Connected,
    /// Link torn down
    Disconnected,
    /// The attempt failed
    Error(LinkError),
}

impl ConnectionState {
    /// Whether an attempt or link is live
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Discovering | Self::Connecting | Self::Connected
        )
    }

    /// Whether `next` may follow this state
    pub fn can_transition_to(&self, next: &ConnectionState) -> bool {
        match next {
            Self::Idle => false,
            Self::Discovering | Self::Error(_) => true,
            Self::Connecting => matches!(self, Self::Discovering),
            Self::Connected => matches!(self, Self::Connecting),
            Self::Disconnected => self.is_active(),
        }
    }

    /// Short status text
    pub fn status_text(&self) -> String {
        match self {
            Self::Idle => "Idle".to_string(),
            Self::Discovering => "Discovering paired devices".to_string(),
            Self::Connecting => "Connecting".to_string(),
            Self::Connected => "Connected".to_string(),
            Self::Disconnected => "Disconnected".to_string(),
            Self::Error(err) => format!("Error: {err}"),
        }
    }
}

/// Single-writer, multi-reader holder of the connection state
pub struct ConnectionStateMachine {
    tx: watch::Sender<ConnectionState>,
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionState::Idle);
        Self { tx }
    }

    /// Current state
    pub fn current(&self) -> ConnectionState {
        self.tx.borrow().clone()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Move to `next` if the transition is allowed
    ///
    /// Returns true only if the state changed. The check and the write happen
    /// under the channel lock, so racing callers cannot both succeed.
    pub fn transition(&self, next: ConnectionState) -> bool {
        let mut rejected = None;
        let changed = self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if !current.can_transition_to(&next) {
                rejected = Some(current.clone());
                return false;
            }
            *current = next.clone();
            true
        });

        if let Some(from) = rejected {
            if next == ConnectionState::Disconnected {
                debug!("Ignoring disconnect while {:?}", from);
            } else {
                warn!("Rejected state transition {:?} -> {:?}", from, next);
            }
        } else if changed {
            debug!("Connection state -> {:?}", next);
        }
        changed
    }
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
