//! Decode Strategies
//!
//! Each strategy is a pure function over one trimmed line. It returns the
//! updates it recognized and whether the chain should stop after it.

use super::aliases::{primary_for_key, ObjectKey, OBJECT_KEYS, TEXT_ALIASES};
use super::number::{all_numbers, first_number, parse_number, NUMBER_PATTERN};
use crate::metric::{Metric, MetricUpdate};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Result of running one strategy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    /// Updates recognized, in application order
    pub updates: Vec<MetricUpdate>,
    /// Skip the remaining strategies
    pub halt: bool,
}

impl Step {
    fn skip() -> Self {
        Self::default()
    }

    /// Halt the chain only if something matched
    fn halt_on_match(updates: Vec<MetricUpdate>) -> Self {
        let halt = !updates.is_empty();
        Self { updates, halt }
    }

    fn continue_with(updates: Vec<MetricUpdate>) -> Self {
        Self {
            updates,
            halt: false,
        }
    }
}

/// One `alias [:=]? number` pattern per primary metric
static KEYED_PATTERNS: Lazy<Vec<(Metric, Regex)>> = Lazy::new(|| {
    TEXT_ALIASES
        .iter()
        .map(|(metric, aliases)| {
            let joined = aliases
                .iter()
                .map(|a| regex::escape(a))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!(r"(?:{joined})\s*[:=]?\s*({NUMBER_PATTERN})");
            let regex = RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .expect("Invalid regex");
            (*metric, regex)
        })
        .collect()
});

/// `"key" : number` scanners for every object key
static OBJECT_PATTERNS: Lazy<Vec<(ObjectKey, Regex)>> = Lazy::new(|| {
    OBJECT_KEYS
        .iter()
        .map(|key| {
            // The key must not be the tail of a longer identifier.
            let pattern = format!(
                r#"(?:^|[^A-Za-z0-9_])"?{}"?\s*:\s*"?({NUMBER_PATTERN})"#,
                regex::escape(key.key)
            );
            (*key, Regex::new(&pattern).expect("Invalid regex"))
        })
        .collect()
});

/// Step 1: search the whole line for `alias [:=]? number` for each primary metric
pub fn keyed_scan(line: &str) -> Step {
    let updates = KEYED_PATTERNS
        .iter()
        .filter_map(|(metric, regex)| {
            let caps = regex.captures(line)?;
            let value = parse_number(caps.get(1)?.as_str())?;
            Some(MetricUpdate::new(*metric, value))
        })
        .collect();
    Step::halt_on_match(updates)
}

/// Step 2: permissive key scan over a `{...}` line
///
/// Always halts when the line is brace-delimited, even if nothing matched.
pub fn flat_object(line: &str) -> Step {
    if !(line.starts_with('{') && line.ends_with('}')) {
        return Step::skip();
    }

    let mut assigned = [false; Metric::COUNT];
    let mut updates = Vec::new();
    for (key, regex) in OBJECT_PATTERNS.iter() {
        if assigned[key.metric.index()] {
            continue;
        }
        if key
            .yields_to
            .iter()
            .any(|other| object_value(line, other).is_some())
        {
            continue;
        }
        if let Some(value) = capture_number(regex, line) {
            assigned[key.metric.index()] = true;
            updates.push(MetricUpdate::new(key.metric, value * key.scale));
        }
    }

    Step {
        updates,
        halt: true,
    }
}

fn capture_number(regex: &Regex, line: &str) -> Option<f32> {
    regex
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_number(m.as_str()))
}

/// Value of the object key `name`, if present and numeric
fn object_value(line: &str, name: &str) -> Option<f32> {
    OBJECT_PATTERNS
        .iter()
        .find(|(key, _)| key.key == name)
        .and_then(|(_, regex)| capture_number(regex, line))
}

/// Step 3: `rpm,speed,coolant` when at least three fields are numeric
pub fn comma_separated(line: &str) -> Step {
    let values: Vec<f32> = line
        .split(',')
        .filter_map(|field| parse_number(field.trim()))
        .collect();
    Step::halt_on_match(positional(&values))
}

/// Step 4: key before the first `:` or `=`, value is the first number in the line
pub fn single_keyed(line: &str) -> Step {
    let key = match line.find([':', '=']) {
        Some(idx) => &line[..idx],
        None => line,
    };
    let update = primary_for_key(key)
        .zip(first_number(line))
        .map(|(metric, value)| MetricUpdate::new(metric, value));
    Step::continue_with(update.into_iter().collect())
}

/// Step 5: first three signed decimals anywhere in the line
pub fn fallback_positional(line: &str) -> Step {
    Step::continue_with(positional(&all_numbers(line)))
}

fn positional(values: &[f32]) -> Vec<MetricUpdate> {
    match values {
        [rpm, speed, coolant, ..] => vec![
            MetricUpdate::new(Metric::Rpm, *rpm),
            MetricUpdate::new(Metric::Speed, *speed),
            MetricUpdate::new(Metric::Coolant, *coolant),
        ],
        _ => Vec::new(),
    }
}
