//! Telemetry Error Types

use thiserror::Error;

/// A metric name that does not match any known metric
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown metric: {0}")]
pub struct ParseMetricError(pub String);
