//! Line Decoder
//!
//! Turns one line of scanner output into metric updates. Strategies are tried
//! in a fixed order:
//!
//! 1. keyed scan (`Engine RPM: 850 speed=10`), stops the chain on any match
//! 2. flat object (`{"engineRPM":850}`), stops the chain whenever the line is braced
//! 3. comma-separated (`850,10,87`), stops the chain on any match
//! 4. single keyed scalar (`Vehicle Speed (km/h): 55`)
//! 5. fallback positional (`850 10 87`)
//!
//! Steps 4 and 5 can both fire on one line; their updates are applied in that
//! order so step 5 wins on overlap. Nothing here fails: a line that matches no
//! strategy yields no updates.

pub mod aliases;
mod number;
pub mod strategies;

use crate::metric::MetricUpdate;
use serde::Serialize;
use strategies::Step;
use tracing::trace;

/// Line encoding that produced the first update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineFormat {
    /// `alias [:=] number` pairs anywhere in the line
    Keyed,
    /// Brace-delimited flat object
    Object,
    /// Comma-separated values
    Csv,
    /// One `key: ... number` pair
    KeyValue,
    /// Three or more bare numbers
    Positional,
    /// No strategy matched
    Unrecognized,
}

/// A strategy and the format it recognizes
struct Strategy {
    format: LineFormat,
    run: fn(&str) -> Step,
}

const STRATEGIES: [Strategy; 5] = [
    Strategy {
        format: LineFormat::Keyed,
        run: strategies::keyed_scan,
    },
    Strategy {
        format: LineFormat::Object,
        run: strategies::flat_object,
    },
    Strategy {
        format: LineFormat::Csv,
        run: strategies::comma_separated,
    },
    Strategy {
        format: LineFormat::KeyValue,
        run: strategies::single_keyed,
    },
    Strategy {
        format: LineFormat::Positional,
        run: strategies::fallback_positional,
    },
];

/// Outcome of decoding one line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decoded {
    /// Format of the first strategy that matched (or halted the chain)
    pub format: LineFormat,
    /// Updates to apply in order
    pub updates: Vec<MetricUpdate>,
}

impl Decoded {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Decode a line and report which format recognized it
pub fn decode_line(line: &str) -> Decoded {
    let line = line.trim();
    let mut decoded = Decoded {
        format: LineFormat::Unrecognized,
        updates: Vec::new(),
    };
    if line.is_empty() {
        return decoded;
    }

    for strategy in &STRATEGIES {
        let step = (strategy.run)(line);
        if decoded.format == LineFormat::Unrecognized && (step.halt || !step.updates.is_empty()) {
            decoded.format = strategy.format;
        }
        decoded.updates.extend(step.updates);
        if step.halt {
            break;
        }
    }

    trace!(
        format = ?decoded.format,
        updates = decoded.updates.len(),
        "Decoded line: {}",
        line
    );
    decoded
}

/// Decode a line into metric updates, in application order
pub fn decode(line: &str) -> Vec<MetricUpdate> {
    decode_line(line).updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{Metric, MetricsSnapshot};
    use proptest::prelude::*;

    fn apply(line: &str) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::new();
        snapshot.apply(&decode(line));
        snapshot
    }

    fn touched(line: &str) -> Vec<Metric> {
        decode(line).iter().map(|u| u.metric).collect()
    }

    #[test]
    fn test_object_line_with_misrouted_coolant() {
        let line = r#"{"engineRPM":850,"speed_mph":10,"coolant":87}"#;
        let decoded = decode_line(line);
        assert_eq!(decoded.format, LineFormat::Object);

        let snapshot = apply(line);
        assert_eq!(snapshot.get(Metric::Rpm), 850.0);
        assert!((snapshot.get(Metric::Speed) - 16.0934).abs() < 1e-3);
        assert!(!touched(line).contains(&Metric::Coolant));
    }

    #[test]
    fn test_object_line_bare_coolant_feeds_rpm() {
        let snapshot = apply(r#"{"coolant":87}"#);
        assert_eq!(snapshot.get(Metric::Rpm), 87.0);
        assert_eq!(snapshot.get(Metric::Coolant), 0.0);
    }

    #[test]
    fn test_object_line_canonical_coolant_key() {
        let snapshot = apply(r#"{"engineRPM":850,"coolant":87,"coolantTemp":91}"#);
        assert_eq!(snapshot.get(Metric::Rpm), 850.0);
        assert_eq!(snapshot.get(Metric::Coolant), 91.0);
    }

    #[test]
    fn test_object_line_ect_is_last_coolant_key() {
        let snapshot = apply(r#"{"ECT":88,"ect":5}"#);
        assert_eq!(snapshot.get(Metric::Coolant), 88.0);
        assert_eq!(snapshot.get(Metric::Rpm), 0.0);
        assert_eq!(touched(r#"{"ECT":88,"ect":5}"#), vec![Metric::Coolant]);

        let snapshot = apply(r#"{"coolantTemp":90,"ect":5}"#);
        assert_eq!(snapshot.get(Metric::Rpm), 0.0);
        assert_eq!(snapshot.get(Metric::Coolant), 90.0);
    }

    #[test]
    fn test_object_line_lone_ect_feeds_rpm() {
        let snapshot = apply(r#"{"ect":5}"#);
        assert_eq!(snapshot.get(Metric::Rpm), 5.0);
        assert_eq!(snapshot.get(Metric::Coolant), 0.0);
    }

    #[test]
    fn test_object_line_full_payload() {
        let line = r#"{"engineRPM":2100,"kmh":64,"ECT":88,"fuelLevel":55.5,"engineLoad":32,"throttlePos":18.4,"mafFlow":7.9,"intakeTemp":31,"fuelPressure":3.4,"fuelRailPressure":350,"o2Voltage1":0.45,"o2Voltage2":0.71,"o2Voltage3":0.12,"o2Voltage4":0.9,"ambientTemp":22,"barometricPressure":101,"manifoldPressure":45,"controlVoltage":14.2,"shortFuelTrim1":-2.3,"longFuelTrim1":1.6,"shortFuelTrim2":0.8,"longFuelTrim2":-0.4}"#;
        let snapshot = apply(line);
        assert_eq!(snapshot.get(Metric::Rpm), 2100.0);
        assert_eq!(snapshot.get(Metric::Speed), 64.0);
        assert_eq!(snapshot.get(Metric::Coolant), 88.0);
        assert_eq!(snapshot.get(Metric::FuelLevel), 55.5);
        assert_eq!(snapshot.get(Metric::ThrottlePosition), 18.4);
        assert_eq!(snapshot.get(Metric::O2Sensor4), 0.9);
        assert_eq!(snapshot.get(Metric::ControlVoltage), 14.2);
        assert_eq!(snapshot.get(Metric::ShortFuelTrim1), -2.3);
        assert_eq!(snapshot.get(Metric::LongFuelTrim2), -0.4);
        assert_eq!(decode(line).len(), 22);
    }

    #[test]
    fn test_csv_line() {
        let decoded = decode_line("850,10,87");
        assert_eq!(decoded.format, LineFormat::Csv);
        let snapshot = apply("850,10,87");
        assert_eq!(snapshot.get(Metric::Rpm), 850.0);
        assert_eq!(snapshot.get(Metric::Speed), 10.0);
        assert_eq!(snapshot.get(Metric::Coolant), 87.0);
    }

    #[test]
    fn test_keyed_lines() {
        assert_eq!(apply("Engine RPM: 850").get(Metric::Rpm), 850.0);
        assert_eq!(apply("rpm=850").get(Metric::Rpm), 850.0);
        assert_eq!(decode_line("rpm=850").format, LineFormat::Keyed);
    }

    #[test]
    fn test_bare_numbers_positional() {
        let line = "850 10 87 99";
        let decoded = decode_line(line);
        assert_eq!(decoded.format, LineFormat::Positional);
        assert_eq!(decoded.updates.len(), 3);
        let snapshot = apply(line);
        assert_eq!(snapshot.get(Metric::Rpm), 850.0);
        assert_eq!(snapshot.get(Metric::Speed), 10.0);
        assert_eq!(snapshot.get(Metric::Coolant), 87.0);
    }

    #[test]
    fn test_keyed_scan_takes_priority_over_bare_numbers() {
        let decoded = decode_line("rpm 900 1 2 3");
        assert_eq!(decoded.format, LineFormat::Keyed);
        assert_eq!(decoded.updates, vec![MetricUpdate::new(Metric::Rpm, 900.0)]);
    }

    #[test]
    fn test_single_keyed_and_positional_both_fire() {
        // Step 4 sets speed to 55, step 5 then overwrites rpm/speed/coolant
        let line = "Vehicle Speed (km/h): 55 / 120 / 7";
        let decoded = decode_line(line);
        assert_eq!(decoded.format, LineFormat::KeyValue);
        assert_eq!(decoded.updates.len(), 4);
        assert_eq!(decoded.updates[0], MetricUpdate::new(Metric::Speed, 55.0));

        let snapshot = apply(line);
        assert_eq!(snapshot.get(Metric::Rpm), 55.0);
        assert_eq!(snapshot.get(Metric::Speed), 120.0);
        assert_eq!(snapshot.get(Metric::Coolant), 7.0);
    }

    #[test]
    fn test_unrecognized_lines() {
        for line in ["", "   ", "OK", "SEARCHING...", "{}", "ELM327 v1.5"] {
            let decoded = decode_line(line);
            assert!(decoded.is_empty(), "{line:?} decoded to {decoded:?}");
        }
        assert_eq!(decode_line("OK").format, LineFormat::Unrecognized);
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(decode("  rpm=850\r"), decode("rpm=850"));
    }

    proptest! {
        #[test]
        fn prop_decode_is_deterministic(line in ".{0,120}") {
            prop_assert_eq!(decode_line(&line), decode_line(&line));
        }

        #[test]
        fn prop_decoded_values_are_finite(line in "[ -~]{0,120}") {
            for update in decode(&line) {
                prop_assert!(update.value.is_finite());
            }
        }

        #[test]
        fn prop_bare_number_lines_only_touch_primaries(
            a in -9999i32..9999, b in 0u16..300, c in -40i16..215
        ) {
            let line = format!("{a} {b} {c}");
            for update in decode(&line) {
                prop_assert!(update.metric.is_primary());
            }
            let snapshot = apply(&line);
            prop_assert_eq!(snapshot.get(Metric::Rpm), a as f32);
            prop_assert_eq!(snapshot.get(Metric::Speed), b as f32);
            prop_assert_eq!(snapshot.get(Metric::Coolant), c as f32);
        }
    }
}
