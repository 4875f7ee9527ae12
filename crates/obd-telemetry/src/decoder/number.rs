//! Signed decimal scanning shared by every decode strategy

use once_cell::sync::Lazy;
use regex::Regex;

/// Pattern for a signed decimal: optional `-`, digits, optional fraction
pub(crate) const NUMBER_PATTERN: &str = r"-?[0-9]+(?:\.[0-9]+)?";

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(NUMBER_PATTERN).expect("Invalid regex"));

static WHOLE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{NUMBER_PATTERN}$")).expect("Invalid regex"));

/// Parse a token that must be exactly one signed decimal
///
/// Exponents, `inf`, `NaN` and leading `+` are rejected.
pub(crate) fn parse_number(token: &str) -> Option<f32> {
    if !WHOLE_NUMBER.is_match(token) {
        return None;
    }
    token.parse::<f32>().ok().filter(|v| v.is_finite())
}

/// First signed decimal anywhere in the text
pub(crate) fn first_number(text: &str) -> Option<f32> {
    NUMBER
        .find_iter(text)
        .find_map(|m| parse_number(m.as_str()))
}

/// Every signed decimal in the text, in order of appearance
pub(crate) fn all_numbers(text: &str) -> Vec<f32> {
    NUMBER
        .find_iter(text)
        .filter_map(|m| parse_number(m.as_str()))
        .collect()
}
