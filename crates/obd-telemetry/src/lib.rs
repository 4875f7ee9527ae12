//! OBD-II Telemetry Decoding
//!
//! This crate turns the free-form text lines an OBD-II scanner emits into
//! metric updates, and keeps the latest value of every metric available to
//! any number of observers.
//!
//! Four line encodings are recognized: keyed text (`rpm=850`), flat
//! brace-delimited objects (`{"engineRPM":850}`), comma-separated values
//! (`850,10,87`) and bare whitespace-separated numbers. Lines that match no
//! encoding are dropped.

pub mod decoder;
mod error;
mod metric;
mod store;

pub use decoder::{decode, decode_line, Decoded, LineFormat};
pub use error::ParseMetricError;
pub use metric::{Metric, MetricUpdate, MetricsSnapshot};
pub use store::MetricsStore;

/// Conversion factor from miles per hour to kilometres per hour
pub const MPH_TO_KMH: f32 = 1.60934;
