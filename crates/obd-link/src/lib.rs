//! OBD-II Scanner Link
//!
//! This crate manages a Serial Port Profile connection to an OBD-II scanner:
//! device resolution against the bonded-device registry, a bounded connect
//! handshake, line framing of the incoming byte stream and idempotent
//! teardown. Received lines are decoded with `obd_telemetry` and published,
//! together with the connection state, to any number of observers.
//!
//! Platform access goes through [`RadioCapability`]; [`testing::FakeRadio`]
//! provides an in-memory implementation.

mod config;
mod error;
mod line_reader;
mod manager;
mod protocol;
mod radio;
mod state;
pub mod testing;

pub use config::LinkConfig;
pub use error::LinkError;
pub use line_reader::{LineError, LineReader};
pub use manager::TransportManager;
pub use protocol::{frame_command, SocketSecurity, COMMAND_TERMINATOR, SPP_SERVICE_UUID};
pub use radio::{
    resolve_device, BoxedChannel, ByteChannel, DeviceDescriptor, RadioCapability, SppSocket,
};
pub use state::{ConnectionState, ConnectionStateMachine};
