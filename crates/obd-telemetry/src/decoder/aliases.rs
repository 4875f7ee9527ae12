//! Alias Tables
//!
//! Maps the textual key variants seen in scanner firmware output to metrics.

use crate::metric::Metric;
use crate::MPH_TO_KMH;

/// Free-text aliases for the three primary metrics
///
/// Used by the keyed scan and the single keyed scalar strategies, matched
/// case-insensitively. Order within a group does not matter: the earliest
/// occurrence in the line wins.
pub const TEXT_ALIASES: &[(Metric, &[&str])] = &[
    (Metric::Rpm, &["rpm", "engine rpm"]),
    (Metric::Speed, &["speed", "vehicle speed", "spd"]),
    (Metric::Coolant, &["coolant", "engine coolant", "ect"]),
];

/// A key recognized inside a brace-delimited object line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectKey {
    /// Key as it appears in the payload (case-sensitive)
    pub key: &'static str,
    /// Metric the value is written to
    pub metric: Metric,
    /// Multiplier applied to the raw value
    pub scale: f32,
    /// Keys whose presence suppresses this one
    pub yields_to: &'static [&'static str],
}

impl ObjectKey {
    const fn new(key: &'static str, metric: Metric) -> Self {
        Self::scaled(key, metric, 1.0)
    }

    const fn scaled(key: &'static str, metric: Metric, scale: f32) -> Self {
        Self {
            key,
            metric,
            scale,
            yields_to: &[],
        }
    }

    const fn yielding(self, keys: &'static [&'static str]) -> Self {
        Self {
            yields_to: keys,
            ..self
        }
    }
}

/// Bare coolant keys whose values are written to [`LEGACY_COOLANT_TARGET`]
///
/// Scanner builds in the field rely on `coolant` and `ect` object keys feeding
/// the RPM channel. Change the target here to route them to
/// [`Metric::Coolant`] instead.
pub const COOLANT_KEYS_ROUTED_TO_RPM: &[&str] = &["coolant", "ect"];

/// Coolant keys that take precedence over `ect`
///
/// `ect` is the last resort of the coolant key group: it is only read when
/// none of these is present, wherever its value is routed.
pub const COOLANT_KEYS_BEFORE_ECT: &[&str] = &["coolant", "coolantTemp", "engineCoolantTemp", "ECT"];

/// Destination of [`COOLANT_KEYS_ROUTED_TO_RPM`]
pub const LEGACY_COOLANT_TARGET: Metric = Metric::Rpm;

/// Object keys in priority order; the first key present wins for its metric
pub const OBJECT_KEYS: &[ObjectKey] = &[
    // Rpm
    ObjectKey::new("engineRPM", Metric::Rpm),
    ObjectKey::new("EngineRPM", Metric::Rpm),
    ObjectKey::new("rpm", Metric::Rpm),
    ObjectKey::new("RPM", Metric::Rpm),
    ObjectKey::new(COOLANT_KEYS_ROUTED_TO_RPM[0], LEGACY_COOLANT_TARGET),
    ObjectKey::new(COOLANT_KEYS_ROUTED_TO_RPM[1], LEGACY_COOLANT_TARGET)
        .yielding(COOLANT_KEYS_BEFORE_ECT),
    // Speed, mph-denominated keys first
    ObjectKey::scaled("mph", Metric::Speed, MPH_TO_KMH),
    ObjectKey::scaled("speed_mph", Metric::Speed, MPH_TO_KMH),
    ObjectKey::scaled("speedMph", Metric::Speed, MPH_TO_KMH),
    ObjectKey::new("kmh", Metric::Speed),
    ObjectKey::new("speed_kmh", Metric::Speed),
    ObjectKey::new("speedKmh", Metric::Speed),
    ObjectKey::new("vehicleSpeed", Metric::Speed),
    ObjectKey::new("VehicleSpeed", Metric::Speed),
    ObjectKey::new("speed", Metric::Speed),
    // Coolant
    ObjectKey::new("coolantTemp", Metric::Coolant),
    ObjectKey::new("engineCoolantTemp", Metric::Coolant),
    ObjectKey::new("ECT", Metric::Coolant),
    // Single canonical keys
    ObjectKey::new("fuelLevel", Metric::FuelLevel),
    ObjectKey::new("engineLoad", Metric::EngineLoad),
    ObjectKey::new("throttlePos", Metric::ThrottlePosition),
    ObjectKey::new("mafFlow", Metric::MafFlow),
    ObjectKey::new("intakeTemp", Metric::IntakeTemp),
    ObjectKey::new("fuelPressure", Metric::FuelPressure),
    ObjectKey::new("fuelRailPressure", Metric::FuelRailPressure),
    ObjectKey::new("o2Voltage1", Metric::O2Sensor1),
    ObjectKey::new("o2Voltage2", Metric::O2Sensor2),
    ObjectKey::new("o2Voltage3", Metric::O2Sensor3),
    ObjectKey::new("o2Voltage4", Metric::O2Sensor4),
    ObjectKey::new("ambientTemp", Metric::AmbientTemp),
    ObjectKey::new("barometricPressure", Metric::BarometricPressure),
    ObjectKey::new("manifoldPressure", Metric::ManifoldPressure),
    ObjectKey::new("controlVoltage", Metric::ControlVoltage),
    ObjectKey::new("shortFuelTrim1", Metric::ShortFuelTrim1),
    ObjectKey::new("longFuelTrim1", Metric::LongFuelTrim1),
    ObjectKey::new("shortFuelTrim2", Metric::ShortFuelTrim2),
    ObjectKey::new("longFuelTrim2", Metric::LongFuelTrim2),
];

/// Primary metric whose alias appears in `key`, checked in Rpm, Speed, Coolant order
pub fn primary_for_key(key: &str) -> Option<Metric> {
    let key = key.to_lowercase();
    TEXT_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.iter().any(|a| key.contains(a)))
        .map(|(metric, _)| *metric)
}
