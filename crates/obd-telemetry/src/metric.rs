//! Vehicle Metric Definitions
//!
//! Defines the fixed set of metrics a scanner can report and the snapshot
//! that holds the latest value of each.

use crate::error::ParseMetricError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Vehicle metrics decoded from scanner output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Metric {
    /// Engine speed (RPM)
    Rpm = 0,
    /// Vehicle speed (km/h)
    Speed,
    /// Engine coolant temperature (°C)
    Coolant,
    /// Fuel tank level (%)
    FuelLevel,
    /// Calculated engine load (%)
    EngineLoad,
    /// Throttle position (%)
    ThrottlePosition,
    /// Mass air flow rate (g/s)
    MafFlow,
    /// Intake air temperature (°C)
    IntakeTemp,
    /// Fuel pressure (bar)
    FuelPressure,
    /// Fuel rail pressure (bar)
    FuelRailPressure,
    /// Oxygen sensor 1 voltage (V)
    #[serde(rename = "o2_sensor1")]
    O2Sensor1,
    /// Oxygen sensor 2 voltage (V)
    #[serde(rename = "o2_sensor2")]
    O2Sensor2,
    /// Oxygen sensor 3 voltage (V)
    #[serde(rename = "o2_sensor3")]
    O2Sensor3,
    /// Oxygen sensor 4 voltage (V)
    #[serde(rename = "o2_sensor4")]
    O2Sensor4,
    /// Ambient air temperature (°C)
    AmbientTemp,
    /// Barometric pressure (kPa)
    BarometricPressure,
    /// Intake manifold absolute pressure (kPa)
    ManifoldPressure,
    /// Control module voltage (V)
    ControlVoltage,
    /// Short-term fuel trim bank 1 (%)
    #[serde(rename = "short_fuel_trim1")]
    ShortFuelTrim1,
    /// Short-term fuel trim bank 2 (%)
    #[serde(rename = "short_fuel_trim2")]
    ShortFuelTrim2,
    /// Long-term fuel trim bank 1 (%)
    #[serde(rename = "long_fuel_trim1")]
    LongFuelTrim1,
    /// Long-term fuel trim bank 2 (%)
    #[serde(rename = "long_fuel_trim2")]
    LongFuelTrim2,
}

impl Metric {
    /// Number of metrics
    pub const COUNT: usize = 22;

    /// Every metric, in snapshot order
    pub const ALL: [Metric; Metric::COUNT] = [
        Metric::Rpm,
        Metric::Speed,
        Metric::Coolant,
        Metric::FuelLevel,
        Metric::EngineLoad,
        Metric::ThrottlePosition,
        Metric::MafFlow,
        Metric::IntakeTemp,
        Metric::FuelPressure,
        Metric::FuelRailPressure,
        Metric::O2Sensor1,
        Metric::O2Sensor2,
        Metric::O2Sensor3,
        Metric::O2Sensor4,
        Metric::AmbientTemp,
        Metric::BarometricPressure,
        Metric::ManifoldPressure,
        Metric::ControlVoltage,
        Metric::ShortFuelTrim1,
        Metric::ShortFuelTrim2,
        Metric::LongFuelTrim1,
        Metric::LongFuelTrim2,
    ];

    /// Position of this metric in a snapshot
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Stable snake-case identifier
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Rpm => "rpm",
            Metric::Speed => "speed",
            Metric::Coolant => "coolant",
            Metric::FuelLevel => "fuel_level",
            Metric::EngineLoad => "engine_load",
            Metric::ThrottlePosition => "throttle_position",
            Metric::MafFlow => "maf_flow",
            Metric::IntakeTemp => "intake_temp",
            Metric::FuelPressure => "fuel_pressure",
            Metric::FuelRailPressure => "fuel_rail_pressure",
            Metric::O2Sensor1 => "o2_sensor1",
            Metric::O2Sensor2 => "o2_sensor2",
            Metric::O2Sensor3 => "o2_sensor3",
            Metric::O2Sensor4 => "o2_sensor4",
            Metric::AmbientTemp => "ambient_temp",
            Metric::BarometricPressure => "barometric_pressure",
            Metric::ManifoldPressure => "manifold_pressure",
            Metric::ControlVoltage => "control_voltage",
            Metric::ShortFuelTrim1 => "short_fuel_trim1",
            Metric::ShortFuelTrim2 => "short_fuel_trim2",
            Metric::LongFuelTrim1 => "long_fuel_trim1",
            Metric::LongFuelTrim2 => "long_fuel_trim2",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Rpm => "Engine RPM",
            Metric::Speed => "Speed",
            Metric::Coolant => "Coolant Temp",
            Metric::FuelLevel => "Fuel Level",
            Metric::EngineLoad => "Engine Load",
            Metric::ThrottlePosition => "Throttle Position",
            Metric::MafFlow => "MAF Flow Rate",
            Metric::IntakeTemp => "Intake Temp",
            Metric::FuelPressure => "Fuel Pressure",
            Metric::FuelRailPressure => "Fuel Rail Pressure",
            Metric::O2Sensor1 => "O2 Sensor 1",
            Metric::O2Sensor2 => "O2 Sensor 2",
            Metric::O2Sensor3 => "O2 Sensor 3",
            Metric::O2Sensor4 => "O2 Sensor 4",
            Metric::AmbientTemp => "Ambient Temp",
            Metric::BarometricPressure => "Barometric Press",
            Metric::ManifoldPressure => "Manifold Press",
            Metric::ControlVoltage => "Control Voltage",
            Metric::ShortFuelTrim1 => "Short Fuel Trim 1",
            Metric::ShortFuelTrim2 => "Short Fuel Trim 2",
            Metric::LongFuelTrim1 => "Long Fuel Trim 1",
            Metric::LongFuelTrim2 => "Long Fuel Trim 2",
        }
    }

    /// Display unit
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Rpm => "RPM",
            Metric::Speed => "km/h",
            Metric::Coolant | Metric::IntakeTemp | Metric::AmbientTemp => "°C",
            Metric::FuelLevel
            | Metric::EngineLoad
            | Metric::ThrottlePosition
            | Metric::ShortFuelTrim1
            | Metric::ShortFuelTrim2
            | Metric::LongFuelTrim1
            | Metric::LongFuelTrim2 => "%",
            Metric::MafFlow => "g/s",
            Metric::FuelPressure | Metric::FuelRailPressure => "bar",
            Metric::O2Sensor1
            | Metric::O2Sensor2
            | Metric::O2Sensor3
            | Metric::O2Sensor4
            | Metric::ControlVoltage => "V",
            Metric::BarometricPressure | Metric::ManifoldPressure => "kPa",
        }
    }

    /// Whether this is one of the three metrics with free-text aliases
    pub fn is_primary(&self) -> bool {
        matches!(self, Metric::Rpm | Metric::Speed | Metric::Coolant)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = ParseMetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Metric::ALL
            .iter()
            .copied()
            .find(|m| {
                m.name().eq_ignore_ascii_case(wanted)
                    || m.name().replace('_', "").eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| ParseMetricError(wanted.to_string()))
    }
}

/// A single decoded value for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricUpdate {
    /// The metric being updated
    pub metric: Metric,
    /// New value
    pub value: f32,
}

impl MetricUpdate {
    pub fn new(metric: Metric, value: f32) -> Self {
        Self { metric, value }
    }
}

/// Latest value of every metric
///
/// All values start at 0.0. Serializes as a map keyed by [`Metric::name`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    values: [f32; Metric::COUNT],
}

impl MetricsSnapshot {
    /// Create a snapshot with every metric at 0.0
    pub fn new() -> Self {
        Self {
            values: [0.0; Metric::COUNT],
        }
    }

    /// Current value of a metric
    pub fn get(&self, metric: Metric) -> f32 {
        self.values[metric.index()]
    }

    /// Overwrite a metric, returning true if the stored value changed
    pub fn set(&mut self, metric: Metric, value: f32) -> bool {
        let slot = &mut self.values[metric.index()];
        if slot.to_bits() == value.to_bits() {
            return false;
        }
        *slot = value;
        true
    }

    /// Apply updates in order (last write wins), returning the number of values changed
    pub fn apply(&mut self, updates: &[MetricUpdate]) -> usize {
        updates
            .iter()
            .filter(|u| self.set(u.metric, u.value))
            .count()
    }

    /// Iterate over (metric, value) pairs in snapshot order
    pub fn iter(&self) -> impl Iterator<Item = (Metric, f32)> + '_ {
        Metric::ALL.iter().map(move |m| (*m, self.values[m.index()]))
    }
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for MetricsSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Metric::COUNT))?;
        for (metric, value) in self.iter() {
            map.serialize_entry(metric.name(), &value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_in_index_order() {
        for (i, metric) in Metric::ALL.iter().enumerate() {
            assert_eq!(metric.index(), i);
        }
    }

    #[test]
    fn test_parse_metric_names() {
        assert_eq!("rpm".parse::<Metric>().unwrap(), Metric::Rpm);
        assert_eq!("O2_SENSOR3".parse::<Metric>().unwrap(), Metric::O2Sensor3);
        assert_eq!("fuelRailPressure".parse::<Metric>().unwrap(), Metric::FuelRailPressure);
        assert!("boost".parse::<Metric>().is_err());
    }

    #[test]
    fn test_serde_name_matches_name() {
        for metric in Metric::ALL {
            let json = serde_json::to_string(&metric).unwrap();
            assert_eq!(json, format!("\"{}\"", metric.name()));
        }
    }

    #[test]
    fn test_snapshot_starts_at_zero() {
        let snapshot = MetricsSnapshot::new();
        assert!(snapshot.iter().all(|(_, v)| v == 0.0));
        assert_eq!(snapshot.iter().count(), 22);
    }

    #[test]
    fn test_snapshot_last_write_wins() {
        let mut snapshot = MetricsSnapshot::new();
        let changed = snapshot.apply(&[
            MetricUpdate::new(Metric::Rpm, 800.0),
            MetricUpdate::new(Metric::Speed, 40.0),
            MetricUpdate::new(Metric::Rpm, 900.0),
        ]);
        assert_eq!(changed, 3);
        assert_eq!(snapshot.get(Metric::Rpm), 900.0);
        assert_eq!(snapshot.get(Metric::Speed), 40.0);
        assert_eq!(snapshot.get(Metric::Coolant), 0.0);
    }

    #[test]
    fn test_snapshot_serializes_as_map() {
        let mut snapshot = MetricsSnapshot::new();
        snapshot.set(Metric::ControlVoltage, 13.5);
        let value = serde_json::to_value(snapshot).unwrap();
        assert_eq!(value["control_voltage"], 13.5);
        assert_eq!(value["rpm"], 0.0);
        assert_eq!(value.as_object().unwrap().len(), 22);
    }
}
